use std::env;
use std::fs;
use std::process;

use minifb::Key;

use chipvm::cpu::Cpu;
use chipvm::display::Screen;
use chipvm::input;
use chipvm::memory::PROGRAM_BASE;

// The CPU runs decoupled from the frame rate: a burst of cycles per frame,
// one timer tick per frame.
const TARGET_FPS: u32 = 60;
const CLOCK_HZ: u32 = 700;
const CYCLES_PER_FRAME: u32 = CLOCK_HZ / TARGET_FPS;

fn main() {
    let rom_path = match env::args().nth(1) {
        Some(path) => path,
        None => {
            eprintln!("usage: chipvm <rom>");
            process::exit(1);
        }
    };
    let rom = match fs::read(&rom_path) {
        Ok(bytes) => bytes,
        Err(err) => {
            eprintln!("failed to read {rom_path}: {err}");
            process::exit(1);
        }
    };

    let mut cpu = Cpu::new();
    cpu.mem.load(&rom, PROGRAM_BASE);

    let mut screen = Screen::new(
        "chipvm - ESC exit, P pause, Backspace reset",
        cpu.fb.width(),
        cpu.fb.height(),
    );
    let mut paused = false;
    let mut fault_reported = false;

    while screen.is_open() && !screen.is_key_down(Key::Escape) {
        input::scan(screen.window(), &mut cpu.keypad);

        if screen.is_key_pressed(Key::P) {
            paused = !paused;
        }
        if screen.is_key_pressed(Key::Backspace) {
            cpu.reset();
            cpu.mem.clear();
            cpu.mem.load(&rom, PROGRAM_BASE);
            cpu.fb.clear();
            fault_reported = false;
        }

        if !paused {
            if let Some(fault) = cpu.fault() {
                if !fault_reported {
                    eprintln!("halted: {fault}");
                    eprint!("{}", cpu.status_report());
                    fault_reported = true;
                }
            } else {
                if cpu.is_waiting_for_key() {
                    if let Some(key) = cpu.keypad.first_held() {
                        cpu.complete_key_wait(key);
                    }
                } else {
                    cpu.run_cycles(CYCLES_PER_FRAME);
                }
                cpu.tick_timers();
            }
        }

        screen.present(&cpu.fb);
    }
}
