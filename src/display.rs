use minifb::{Key, KeyRepeat, Scale, Window, WindowOptions};

use crate::framebuffer::FrameBuffer;

const ON_COLOR: u32 = from_u16_rgb(0x20, 0xE0, 0x60);
const OFF_COLOR: u32 = from_u16_rgb(0, 0, 0);

const fn from_u16_rgb(r: u16, g: u16, b: u16) -> u32 {
    let (r, g, b) = (r as u32, g as u32, b as u32);
    (r << 16) | (g << 8) | b
}

/// Host window for the logical pixel grid. All it knows is how to turn
/// the framebuffer snapshot into colored pixels once per frame.
pub struct Screen {
    window: Window,
    pixels: Vec<u32>,
}

impl Screen {
    pub fn new(title: &str, width: usize, height: usize) -> Self {
        let mut window = Window::new(
            title,
            width,
            height,
            WindowOptions {
                scale: Scale::X16,
                ..WindowOptions::default()
            },
        )
        .unwrap();
        window.set_position(500, 300);
        // Limit to max ~60 fps update rate
        window.limit_update_rate(Some(std::time::Duration::from_micros(16600)));
        Self {
            window,
            pixels: vec![0; width * height],
        }
    }

    pub fn is_open(&self) -> bool {
        self.window.is_open()
    }

    pub fn is_key_down(&self, key: Key) -> bool {
        self.window.is_key_down(key)
    }

    /// Edge-triggered host key, for driver controls like pause and reset.
    pub fn is_key_pressed(&self, key: Key) -> bool {
        self.window.is_key_pressed(key, KeyRepeat::No)
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn present(&mut self, fb: &FrameBuffer) {
        for (slot, lit) in self.pixels.iter_mut().zip(fb.cells()) {
            *slot = if *lit { ON_COLOR } else { OFF_COLOR };
        }
        self.window
            .update_with_buffer(&self.pixels, fb.width(), fb.height())
            .unwrap();
    }
}
