use crate::machine::InvadersMachine;
use crate::sound::SoundManager;
use crate::{SCREEN_HEIGHT, SCREEN_SCALE, SCREEN_WIDTH};
use retro80_common::app::App;
use retro80_common::color::Color;
use retro80_common::key::Key;

/// Frontend-facing wrapper for the Space Invaders machine.
///
/// Implements the shared `App` trait so the SDL2 frontend can drive the
/// emulator one frame per `update`.
#[derive(Default)]
pub struct InvadersApp {
    should_exit: bool,
    paused: bool,
    pub machine: InvadersMachine,
    sound: Option<SoundManager>,
}

impl App for InvadersApp {
    fn init(&mut self) {
        log::info!("Space Invaders init");
        // Bring up audio for the discrete sound effects. If this fails the
        // game still runs, just silently.
        if self.sound.is_none() {
            self.sound = SoundManager::new();
        }
    }

    fn update(&mut self, screen_state: &mut [u8]) {
        if !self.paused {
            self.machine.step_frame();

            if let Some(sound) = &mut self.sound {
                let (out3, out5) = self.machine.outputs();
                sound.update(out3, out5);
            }
        }

        render_video(self.machine.video_ram(), screen_state);

        if self.paused {
            overlay_pause_banner(screen_state);
        }
    }

    fn handle_key_event(&mut self, key: Key, is_pressed: bool) {
        if is_pressed {
            match key {
                Key::Escape => {
                    self.should_exit = true;
                    return;
                }
                Key::P => {
                    self.paused = !self.paused;
                    return;
                }
                // Any other key press unpauses.
                _ if self.paused => {
                    self.paused = false;
                }
                _ => {}
            }
        }

        self.machine.handle_key(key, is_pressed);
    }

    fn should_exit(&self) -> bool {
        self.should_exit
    }

    fn exit(&mut self) {
        log::info!("Space Invaders exit");
    }

    fn width(&self) -> u32 {
        SCREEN_WIDTH as u32
    }

    fn height(&self) -> u32 {
        SCREEN_HEIGHT as u32
    }

    fn scale(&self) -> u32 {
        SCREEN_SCALE
    }

    fn title(&self) -> String {
        "retro80 Space Invaders".to_string()
    }
}

/// Expand the rotated 1bpp framebuffer into RGB24.
///
/// Video RAM holds 224 columns of 32 bytes; each byte encodes 8 vertical
/// pixels, bottom of the screen first. The classic cabinet overlay tints
/// the player strip red and the shield/ground strip green.
fn render_video(vram: &[u8], screen_state: &mut [u8]) {
    let width = SCREEN_WIDTH;
    let height = SCREEN_HEIGHT;

    debug_assert_eq!(vram.len(), 0x1c00);
    debug_assert_eq!(screen_state.len(), width * height * 3);

    let mut i = 0usize;
    for x in 0..width {
        for iy in (0..height).step_by(8) {
            let mut byte = vram[i];
            i += 1;
            for b in 0..8 {
                let pixel_on = (byte & 1) != 0;
                byte >>= 1;

                let screen_y = height - (iy + b) - 1;
                let idx = (screen_y * width + x) * 3;
                let color = if !pixel_on {
                    Color::BLACK
                } else if iy > 200 && iy < 220 {
                    Color::RED
                } else if iy < 80 {
                    Color::GREEN
                } else {
                    Color::WHITE
                };

                screen_state[idx] = color.r;
                screen_state[idx + 1] = color.g;
                screen_state[idx + 2] = color.b;
            }
        }
    }
}

/// Striped band at the top of the screen so a paused game is obvious.
fn overlay_pause_banner(screen_state: &mut [u8]) {
    let width = SCREEN_WIDTH;
    let height = SCREEN_HEIGHT;
    debug_assert_eq!(screen_state.len(), width * height * 3);

    let banner_height = 12usize.min(height);

    for y in 0..banner_height {
        for x in 0..width {
            let idx = (y * width + x) * 3;
            let color = if y % 2 == 0 { Color::WHITE } else { Color::BLACK };
            screen_state[idx] = color.r;
            screen_state[idx + 1] = color.g;
            screen_state[idx + 2] = color.b;
        }
    }
}
