use minifb::{Key, Window};

use crate::keypad::Keypad;

/// Conventional QWERTY block for the 4x4 pad:
///   1 2 3 4        1 2 3 C
///   Q W E R   ->   4 5 6 D
///   A S D F        7 8 9 E
///   Z X C V        A 0 B F
const KEYMAP: [(Key, u8); 16] = [
    (Key::Key1, 0x1),
    (Key::Key2, 0x2),
    (Key::Key3, 0x3),
    (Key::Key4, 0xC),
    (Key::Q, 0x4),
    (Key::W, 0x5),
    (Key::E, 0x6),
    (Key::R, 0xD),
    (Key::A, 0x7),
    (Key::S, 0x8),
    (Key::D, 0x9),
    (Key::F, 0xE),
    (Key::Z, 0xA),
    (Key::X, 0x0),
    (Key::C, 0xB),
    (Key::V, 0xF),
];

/// Samples the host keyboard into the logical keypad. Call once per frame,
/// before any key-wait resolution or stepping, so every key has a fresh
/// down/edge state for the tick.
pub fn scan(window: &Window, keypad: &mut Keypad) {
    for (host, code) in KEYMAP {
        keypad.set_down(code, window.is_key_down(host));
    }
}
