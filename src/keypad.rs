use std::time::{Duration, Instant};

pub const KEY_COUNT: usize = 16;

/// How long a key must stay released (or unreported) before `first_held`
/// will report it again.
const DEFAULT_COOLDOWN: Duration = Duration::from_millis(200);

/// Logical hex keypad, keys 0x0 through 0xF. The host polls once per tick
/// and feeds `set_down` for every key; the previous sample is retained so
/// a down-edge is visible for exactly one tick.
///
/// Key values above 0xF can turn up in Ex9E/ExA1 (register values are
/// 8-bit); those queries answer "not down" rather than aliasing onto a
/// real key.
pub struct Keypad {
    down: [bool; KEY_COUNT],
    edge: [bool; KEY_COUNT],
    last_fire: [Option<Instant>; KEY_COUNT],
    cooldown: Duration,
}

impl Keypad {
    pub fn new() -> Self {
        Self::with_cooldown(DEFAULT_COOLDOWN)
    }

    pub fn with_cooldown(cooldown: Duration) -> Self {
        Self {
            down: [false; KEY_COUNT],
            edge: [false; KEY_COUNT],
            last_fire: [None; KEY_COUNT],
            cooldown,
        }
    }

    pub fn set_down(&mut self, key: u8, down: bool) {
        let k = key as usize;
        if k >= KEY_COUNT {
            return;
        }
        self.edge[k] = down && !self.down[k];
        self.down[k] = down;
    }

    pub fn is_down(&self, key: u8) -> bool {
        self.down.get(key as usize).copied().unwrap_or(false)
    }

    /// True only on the tick the key went from up to down.
    pub fn just_pressed(&self, key: u8) -> bool {
        self.edge.get(key as usize).copied().unwrap_or(false)
    }

    /// Lowest-numbered key currently held, reported at most once per
    /// cooldown window per key. Without the cooldown a held key would
    /// register as a fresh press on every poll while Fx0A is waiting.
    pub fn first_held(&mut self) -> Option<u8> {
        let now = Instant::now();
        for key in 0..KEY_COUNT {
            if !self.down[key] {
                continue;
            }
            let ready = match self.last_fire[key] {
                Some(fired) => now.duration_since(fired) >= self.cooldown,
                None => true,
            };
            if ready {
                self.last_fire[key] = Some(now);
                return Some(key as u8);
            }
        }
        None
    }
}

impl Default for Keypad {
    fn default() -> Self {
        Self::new()
    }
}
