use rand::Rng;
use std::collections::VecDeque;

use crate::decode::Opcode;
use crate::framebuffer::FrameBuffer;
use crate::keypad::Keypad;
use crate::memory::{Memory, PROGRAM_BASE};
use crate::registers::{Registers, FLAG};
use crate::timer::Timers;
use crate::Fault;

/// Call frames the stack can hold.
const STACK_DEPTH: usize = 16;

/// Fetched words kept around for diagnostics, most recent first.
const HISTORY_LEN: usize = 10;

/// Legacy-vs-modern behavior toggles. Both variants are baked into
/// programs people still run, so neither is hardcoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct Quirks {
    /// 8xy6/8xyE shift Vy into Vx (COSMAC VIP) instead of shifting Vx in
    /// place and ignoring Vy.
    pub shift_uses_vy: bool,
    /// Fx55/Fx65 leave I advanced by x + 1 afterwards (COSMAC VIP).
    pub increment_index: bool,
}

/// Free-running, or parked on Fx0A until the driver delivers a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Running,
    AwaitingKey { target: usize },
}

pub struct Cpu {
    pub mem: Memory,
    pub fb: FrameBuffer,
    pub keypad: Keypad,
    pub timers: Timers,
    pub quirks: Quirks,
    regs: Registers,
    i: u16,
    pc: u16,
    stack: [u16; STACK_DEPTH],
    sp: i8,
    mode: Mode,
    fault: Option<Fault>,
    history: VecDeque<u16>,
}

impl Cpu {
    pub fn new() -> Self {
        Self {
            mem: Memory::new(),
            fb: FrameBuffer::new(),
            keypad: Keypad::new(),
            timers: Timers::new(),
            quirks: Quirks::default(),
            regs: Registers::new(),
            i: 0,
            pc: PROGRAM_BASE,
            stack: [0; STACK_DEPTH],
            sp: -1,
            mode: Mode::Running,
            fault: None,
            history: VecDeque::with_capacity(HISTORY_LEN),
        }
    }

    /// One fetch-decode-execute cycle. A latched fault or a pending key
    /// wait makes this a no-op; the driver owns resolving both.
    pub fn step(&mut self) {
        if self.fault.is_some() || self.mode != Mode::Running {
            return;
        }
        let word = self.fetch();
        self.record(word);
        match Opcode::decode(word) {
            Ok(op) => self.execute(op),
            Err(fault) => self.fault = Some(fault),
        }
    }

    /// The "run a burst" entry point for a frame-paced driver.
    pub fn run_cycles(&mut self, cycles: u32) {
        for _ in 0..cycles {
            self.step();
        }
    }

    /// 60 Hz decrement hook, driven externally and independent of the
    /// cycle rate.
    pub fn tick_timers(&mut self) {
        self.timers.tick();
    }

    /// Resolves a pending Fx0A in one transition: the key value lands in
    /// the target register and PC moves past the instruction.
    pub fn complete_key_wait(&mut self, key: u8) {
        if let Mode::AwaitingKey { target } = self.mode {
            self.regs.set(target, key);
            self.mode = Mode::Running;
            self.pc += 2;
        }
    }

    pub fn is_waiting_for_key(&self) -> bool {
        matches!(self.mode, Mode::AwaitingKey { .. })
    }

    /// Back to power-on defaults. Memory and the framebuffer stay as they
    /// are; the caller clears those explicitly. Quirk settings survive.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.i = 0;
        self.pc = PROGRAM_BASE;
        self.stack = [0; STACK_DEPTH];
        self.sp = -1;
        self.timers = Timers::new();
        self.mode = Mode::Running;
        self.fault = None;
        self.history.clear();
    }

    pub fn registers(&self) -> &[u8; 16] {
        self.regs.all()
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn index(&self) -> u16 {
        self.i
    }

    pub fn sp(&self) -> i8 {
        self.sp
    }

    pub fn stack(&self) -> &[u16; STACK_DEPTH] {
        &self.stack
    }

    pub fn fault(&self) -> Option<&Fault> {
        self.fault.as_ref()
    }

    /// Fetched instruction words, most recent first, at most ten.
    pub fn opcode_history(&self) -> impl Iterator<Item = u16> + '_ {
        self.history.iter().copied()
    }

    /// One-screen text dump of the architectural state, for the driver to
    /// print when the machine halts.
    pub fn status_report(&self) -> String {
        let mut out = String::new();
        for (idx, value) in self.regs.all().iter().enumerate() {
            out.push_str(&format!("V{idx:X}: {value:02X}\n"));
        }
        out.push_str(&format!("PC: {:04X}  I: {:04X}\n", self.pc, self.i));
        out.push_str(&format!(
            "DT: {:02X}  ST: {:02X}  SP: {}\n",
            self.timers.delay, self.timers.sound, self.sp
        ));
        out.push_str(&format!("stack: {:04X?}\n", self.stack));
        out.push_str("last opcodes:");
        for word in &self.history {
            out.push_str(&format!(" {word:04X}"));
        }
        out.push('\n');
        out
    }

    fn fetch(&self) -> u16 {
        (self.mem.read(self.pc) as u16) << 8 | self.mem.read(self.pc.wrapping_add(1)) as u16
    }

    fn record(&mut self, word: u16) {
        self.history.push_front(word);
        self.history.truncate(HISTORY_LEN);
    }

    /// Exactly one handler per call. Handlers advance PC by 2 themselves
    /// unless they are control transfers.
    fn execute(&mut self, op: Opcode) {
        match op {
            Opcode::ClearScreen => {
                self.fb.clear();
                self.pc += 2;
            }
            Opcode::Return => {
                if self.sp < 0 {
                    self.fault = Some(Fault::StackUnderflow {
                        pc: self.pc,
                        sp: self.sp,
                    });
                    return;
                }
                self.pc = self.stack[self.sp as usize];
                self.stack[self.sp as usize] = 0;
                self.sp -= 1;
            }
            Opcode::Jump(addr) => {
                self.pc = addr;
            }
            Opcode::Call(addr) => {
                // refuse before touching anything so a faulted machine
                // still shows the state that caused the overflow
                if self.sp >= STACK_DEPTH as i8 - 1 {
                    self.fault = Some(Fault::StackOverflow {
                        pc: self.pc,
                        sp: self.sp,
                    });
                    return;
                }
                self.sp += 1;
                self.stack[self.sp as usize] = self.pc + 2;
                self.pc = addr;
            }
            Opcode::SkipEqImm(x, kk) => {
                self.pc += if self.regs.get(x) == kk { 4 } else { 2 };
            }
            Opcode::SkipNeImm(x, kk) => {
                self.pc += if self.regs.get(x) != kk { 4 } else { 2 };
            }
            Opcode::SkipEqReg(x, y) => {
                self.pc += if self.regs.get(x) == self.regs.get(y) { 4 } else { 2 };
            }
            Opcode::LoadImm(x, kk) => {
                self.regs.set(x, kk);
                self.pc += 2;
            }
            Opcode::AddImm(x, kk) => {
                // the immediate add carries no flag
                self.regs.set(x, self.regs.get(x).wrapping_add(kk));
                self.pc += 2;
            }
            Opcode::Copy(x, y) => {
                self.regs.set(x, self.regs.get(y));
                self.pc += 2;
            }
            Opcode::Or(x, y) => {
                self.regs.set(x, self.regs.get(x) | self.regs.get(y));
                self.pc += 2;
            }
            Opcode::And(x, y) => {
                self.regs.set(x, self.regs.get(x) & self.regs.get(y));
                self.pc += 2;
            }
            Opcode::Xor(x, y) => {
                self.regs.set(x, self.regs.get(x) ^ self.regs.get(y));
                self.pc += 2;
            }
            Opcode::AddCarry(x, y) => {
                let (sum, carry) = self.regs.get(x).overflowing_add(self.regs.get(y));
                self.regs.set(FLAG, carry as u8);
                self.regs.set(x, sum);
                self.pc += 2;
            }
            Opcode::SubBorrow(x, y) => {
                let (diff, borrow) = self.regs.get(x).overflowing_sub(self.regs.get(y));
                self.regs.set(FLAG, !borrow as u8);
                self.regs.set(x, diff);
                self.pc += 2;
            }
            Opcode::ShiftRight(x, y) => {
                let src = if self.quirks.shift_uses_vy {
                    self.regs.get(y)
                } else {
                    self.regs.get(x)
                };
                self.regs.set(FLAG, src & 1);
                self.regs.set(x, src >> 1);
                self.pc += 2;
            }
            Opcode::SubReverse(x, y) => {
                let (diff, borrow) = self.regs.get(y).overflowing_sub(self.regs.get(x));
                self.regs.set(FLAG, !borrow as u8);
                self.regs.set(x, diff);
                self.pc += 2;
            }
            Opcode::ShiftLeft(x, y) => {
                let src = if self.quirks.shift_uses_vy {
                    self.regs.get(y)
                } else {
                    self.regs.get(x)
                };
                self.regs.set(FLAG, src >> 7);
                self.regs.set(x, src << 1);
                self.pc += 2;
            }
            Opcode::SkipNeReg(x, y) => {
                self.pc += if self.regs.get(x) != self.regs.get(y) { 4 } else { 2 };
            }
            Opcode::LoadIndex(addr) => {
                self.i = addr;
                self.pc += 2;
            }
            Opcode::JumpOffset(addr) => {
                self.pc = addr + self.regs.get(0) as u16;
            }
            Opcode::Random(x, kk) => {
                // the machine's sole source of nondeterminism
                let byte: u8 = rand::thread_rng().gen_range(0..=255);
                self.regs.set(x, byte & kk);
                self.pc += 2;
            }
            Opcode::Draw(x, y, n) => {
                let ox = self.regs.get(x) as usize;
                let oy = self.regs.get(y) as usize;
                self.regs.set(FLAG, 0);
                for row in 0..n as u16 {
                    let sprite = self.mem.read(self.i + row);
                    for col in 0..8usize {
                        if sprite & (0x80 >> col) != 0
                            && self.fb.set_pixel(ox + col, oy + row as usize)
                        {
                            self.regs.set(FLAG, 1);
                        }
                    }
                }
                self.pc += 2;
            }
            Opcode::SkipKeyDown(x) => {
                self.pc += if self.keypad.is_down(self.regs.get(x)) { 4 } else { 2 };
            }
            Opcode::SkipKeyUp(x) => {
                self.pc += if self.keypad.is_down(self.regs.get(x)) { 2 } else { 4 };
            }
            Opcode::ReadDelay(x) => {
                self.regs.set(x, self.timers.delay);
                self.pc += 2;
            }
            Opcode::WaitKey(x) => {
                // completion spans polling ticks; PC stays put until the
                // driver calls complete_key_wait
                self.mode = Mode::AwaitingKey { target: x };
            }
            Opcode::SetDelay(x) => {
                self.timers.delay = self.regs.get(x);
                self.pc += 2;
            }
            Opcode::SetSound(x) => {
                self.timers.sound = self.regs.get(x);
                self.pc += 2;
            }
            Opcode::AddIndex(x) => {
                let sum = self.i as u32 + self.regs.get(x) as u32;
                self.regs.set(FLAG, (sum > 0xFFF) as u8);
                self.i = (sum & 0x0FFF) as u16;
                self.pc += 2;
            }
            Opcode::FontGlyph(x) => {
                self.i = (self.regs.get(x) as u16 * 5) & 0x0FFF;
                self.pc += 2;
            }
            Opcode::StoreBcd(x) => {
                let value = self.regs.get(x);
                self.mem.write(self.i, value / 100);
                self.mem.write(self.i + 1, value % 100 / 10);
                self.mem.write(self.i + 2, value % 10);
                self.pc += 2;
            }
            Opcode::StoreRegs(x) => {
                for r in 0..=x {
                    self.mem.write(self.i + r as u16, self.regs.get(r));
                }
                if self.quirks.increment_index {
                    self.i = (self.i + x as u16 + 1) & 0x0FFF;
                }
                self.pc += 2;
            }
            Opcode::LoadRegs(x) => {
                for r in 0..=x {
                    self.regs.set(r, self.mem.read(self.i + r as u16));
                }
                if self.quirks.increment_index {
                    self.i = (self.i + x as u16 + 1) & 0x0FFF;
                }
                self.pc += 2;
            }
        }
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}
