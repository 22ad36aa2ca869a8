//! The I/O core's side of the demo: a menu, a bouncing sprite, a test tone
//! and now and then a flash erase that needs the bus to itself.

use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use rtm_core::audio::AudioSample;
use rtm_core::color::Rgb565;
use rtm_core::config::{MediaConfig, SourceKind};
use rtm_core::coordinator::SpinPolicy;
use rtm_core::engine::IoCore;
use rtm_core::render::Overlay;
use tracing::{debug, info, warn};

/// About a second of spinning on a desktop machine.
const WAIT: SpinPolicy = SpinPolicy::bounded(200_000_000);
const FRAMES_PER_SECOND: u32 = 60;
const SPRITE: u16 = 24;

#[derive(Copy, Clone, Debug)]
pub struct DemoOptions {
    pub tone_hz: f32,
    /// Frames between flash erases, 0 for never.
    pub flash_every: u32,
    pub flash_duration: Duration,
}

#[derive(Copy, Clone, Debug, Default)]
pub struct DemoStats {
    pub frames: u32,
    pub dropped_audio: u32,
    pub flashes: u32,
    pub flash_timeouts: u32,
    pub dropped_lines: u32,
}

struct Tone {
    phase: f32,
    step: f32,
    /// Samples owed from the fractional part of `rate / 60`.
    carry: u32,
    rate: u32,
}

impl Tone {
    fn new(hz: f32, rate: u32) -> Self {
        Self { phase: 0.0, step: TAU * hz / rate as f32, carry: 0, rate }
    }

    fn next(&mut self) -> AudioSample {
        let v = (self.phase.sin() * i16::MAX as f32 * 0.25) as i16;
        self.phase = (self.phase + self.step) % TAU;
        AudioSample::new(v, v)
    }

    fn samples_this_frame(&mut self) -> u32 {
        self.carry += self.rate;
        let n = self.carry / FRAMES_PER_SECOND;
        self.carry %= FRAMES_PER_SECOND;
        n
    }
}

struct Bounce {
    x: i32,
    y: i32,
    dx: i32,
    dy: i32,
    max_x: i32,
    max_y: i32,
}

impl Bounce {
    fn step(&mut self) -> (u16, u16) {
        if !(0..=self.max_x).contains(&(self.x + self.dx)) {
            self.dx = -self.dx;
        }
        if !(0..=self.max_y).contains(&(self.y + self.dy)) {
            self.dy = -self.dy;
        }
        self.x += self.dx;
        self.y += self.dy;
        (self.x as u16, self.y as u16)
    }
}

fn sprite() -> Overlay {
    let n = SPRITE as usize;
    let pixels = (0..n * n)
        .map(|i| {
            let (x, y) = (i % n, i / n);
            let edge = x == 0 || y == 0 || x == n - 1 || y == n - 1;
            if edge {
                Rgb565::WHITE.raw()
            } else {
                Rgb565::from_rgb888((x * 10) as u8, 64, (y * 10) as u8).raw()
            }
        })
        .collect();
    Overlay { x: 0, y: 0, width: SPRITE, height: SPRITE, pixels, moving: true }
}

fn draw_frame(px: &mut [u16], width: usize, frame: u32) {
    let bar = frame as usize % width;
    for (i, p) in px.iter_mut().enumerate() {
        let (x, y) = (i % width, i / width);
        *p = if x == bar {
            Rgb565::WHITE.raw()
        } else {
            Rgb565::from_rgb888((x * 255 / width) as u8, (y % 256) as u8, 96).raw()
        };
    }
}

pub fn run(mut io: IoCore<'_>, config: MediaConfig, options: DemoOptions, stop: &AtomicBool) -> DemoStats {
    let mut stats = DemoStats::default();
    let mut tone = Tone::new(options.tone_hz, config.sample_rate);
    let mut bounce = Bounce {
        x: 0,
        y: 0,
        dx: 2,
        dy: 1,
        max_x: config.source_width.saturating_sub(SPRITE) as i32,
        max_y: config.source_height.saturating_sub(SPRITE) as i32,
    };
    let width = config.source_width as usize;
    let row = vec![Rgb565::from_rgb888(0, 96, 160).raw(); width];
    let mut next_row = 0u16;

    io.set_overlay(Some(sprite()));

    while !stop.load(Ordering::Acquire) {
        let frame = match io.wait_for_vblank(WAIT) {
            Ok(frame) => frame,
            Err(e) => {
                debug!("no vblank: {e}");
                continue;
            }
        };
        stats.frames += 1;

        for _ in 0..tone.samples_this_frame() {
            if !io.push_audio_sample(tone.next()) {
                stats.dropped_audio += 1;
            }
        }

        match config.source {
            SourceKind::Text => {
                io.publish_text(|grid| {
                    grid.print(2, 2, "RTM DEMO", 15, 1);
                    grid.print(2, 4, &format!("FRAME {frame:>8}"), 14, 1);
                    grid.print(2, 5, &format!("FLASH {:>8}", stats.flashes), 14, 1);
                    grid.selected = Some((frame / FRAMES_PER_SECOND % 3) as u16 + 7);
                });
            }
            SourceKind::Frame => {
                io.publish_frame(|px| draw_frame(px, width, frame));
            }
            SourceKind::Lines => {
                // the ring only holds a few lines; give it what fits
                while io.publish_line(next_row, &row) {
                    next_row = (next_row + 1) % config.source_height;
                }
            }
            SourceKind::Blank => {}
        }

        let (x, y) = bounce.step();
        io.move_overlay(x, y);
        io.collect_reclaimed();

        if options.flash_every > 0 && frame % options.flash_every == 0 {
            match io.request_exclusive(WAIT) {
                Ok(guard) => {
                    // stand-in for erasing a flash sector with XIP off
                    thread::sleep(options.flash_duration);
                    IoCore::release_exclusive(guard);
                    stats.flashes += 1;
                }
                Err(e) => {
                    warn!("flash erase skipped: {e}");
                    stats.flash_timeouts += 1;
                }
            }
        }
    }

    stats.dropped_lines = io.dropped_lines();
    info!("io core done after {} frames", stats.frames);
    stats
}
