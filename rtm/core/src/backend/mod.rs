//! # Output backends
//!
//! A backend owns everything on the render core that depends on the kind of
//! output: how an active line is turned into words for the transmitter,
//! what goes into the blanking, and where audio ends up. The engine only
//! sees [`OutputBackend`]; the hardware only sees a [`LinkSink`].
//!
//! Audio is the other half of the split: the I/O core gets the matching
//! [`AudioPath`] when the session is built.

mod hdmi;
mod vga;

pub use hdmi::{island_sync, HdmiBackend};
pub use vga::VgaBackend;

use rtm_ring::Producer;

use crate::audio::AudioSample;
use crate::link::{DataIsland, SyncLevels};
use crate::mux::IslandProducer;
use crate::render::{Renderer, Source};
use crate::{DAC_SLOTS, ISLAND_SLOTS};

/// The transmitter. On hardware this queues DMA; in tests and on the host
/// it records or counts.
pub trait LinkSink {
    /// Horizontal blanking of `line`, with the data islands placed in it.
    fn hblank(&mut self, line: u16, sync: SyncLevels, islands: &[DataIsland]) {
        let _ = (line, sync, islands);
    }

    /// Active video as serializer words, guard band first.
    fn active_words(&mut self, line: u16, words: &[u32]) {
        let _ = (line, words);
    }

    /// Active video as RGB565.
    fn active_pixels(&mut self, line: u16, pixels: &[u16]) {
        let _ = (line, pixels);
    }

    /// One sample for the PWM/DAC.
    fn dac_sample(&mut self, sample: AudioSample) {
        let _ = sample;
    }
}

impl<S: LinkSink + ?Sized> LinkSink for &mut S {
    fn hblank(&mut self, line: u16, sync: SyncLevels, islands: &[DataIsland]) {
        (**self).hblank(line, sync, islands)
    }

    fn active_words(&mut self, line: u16, words: &[u32]) {
        (**self).active_words(line, words)
    }

    fn active_pixels(&mut self, line: u16, pixels: &[u16]) {
        (**self).active_pixels(line, pixels)
    }

    fn dac_sample(&mut self, sample: AudioSample) {
        (**self).dac_sample(sample)
    }
}

/// Render-core half of an output.
pub trait OutputBackend {
    /// An active line, `0..active`.
    fn render_line(&mut self, line: u16, source: Source<'_, '_>);
    /// Any line of the vertical blanking.
    fn blank_line(&mut self, line: u16);
    fn set_scanlines(&mut self, enabled: bool);
    /// Frames sent since the session started.
    fn frame_counter(&self) -> u32;
    /// Called once per frame, at the boundary.
    fn end_frame(&mut self);
    /// Restart the schedules after the output was stopped.
    fn rearm(&mut self);
    fn renderer(&mut self) -> &mut Renderer;
}

/// Counted in islands on the link and in samples on the DAC.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct AudioStats {
    pub audio: u32,
    /// Underruns filled with silence.
    pub silence: u32,
    pub realigned: u32,
}

pub enum Backend<'a, S> {
    Hdmi(HdmiBackend<'a, S>),
    Vga(VgaBackend<'a, S>),
}

impl<S> Backend<'_, S> {
    pub fn audio_stats(&self) -> AudioStats {
        match self {
            Backend::Hdmi(b) => b.audio_stats(),
            Backend::Vga(b) => b.audio_stats(),
        }
    }

    pub fn sink(&self) -> &S {
        match self {
            Backend::Hdmi(b) => b.sink(),
            Backend::Vga(b) => b.sink(),
        }
    }
}

impl<S: LinkSink> OutputBackend for Backend<'_, S> {
    fn render_line(&mut self, line: u16, source: Source<'_, '_>) {
        match self {
            Backend::Hdmi(b) => b.render_line(line, source),
            Backend::Vga(b) => b.render_line(line, source),
        }
    }

    fn blank_line(&mut self, line: u16) {
        match self {
            Backend::Hdmi(b) => b.blank_line(line),
            Backend::Vga(b) => b.blank_line(line),
        }
    }

    fn set_scanlines(&mut self, enabled: bool) {
        match self {
            Backend::Hdmi(b) => b.set_scanlines(enabled),
            Backend::Vga(b) => b.set_scanlines(enabled),
        }
    }

    fn frame_counter(&self) -> u32 {
        match self {
            Backend::Hdmi(b) => b.frame_counter(),
            Backend::Vga(b) => b.frame_counter(),
        }
    }

    fn end_frame(&mut self) {
        match self {
            Backend::Hdmi(b) => b.end_frame(),
            Backend::Vga(b) => b.end_frame(),
        }
    }

    fn rearm(&mut self) {
        match self {
            Backend::Hdmi(b) => b.rearm(),
            Backend::Vga(b) => b.rearm(),
        }
    }

    fn renderer(&mut self) -> &mut Renderer {
        match self {
            Backend::Hdmi(b) => b.renderer(),
            Backend::Vga(b) => b.renderer(),
        }
    }
}

/// I/O-core half of an output: where audio samples go.
pub enum AudioPath<'a> {
    /// Encoded into islands for the link.
    Hdmi(IslandProducer<'a, ISLAND_SLOTS>),
    /// Raw samples for the PWM/DAC.
    Dac(Producer<'a, AudioSample, DAC_SLOTS>),
    /// DVI: nothing carries audio.
    Muted,
}

impl AudioPath<'_> {
    /// Queue four samples. `false` means they were dropped.
    pub fn enqueue_audio(&mut self, samples: [AudioSample; 4]) -> bool {
        match self {
            AudioPath::Hdmi(p) => p.enqueue(samples),
            AudioPath::Dac(p) => {
                if p.free_space() < samples.len() {
                    return false;
                }
                samples.into_iter().all(|s| p.push(s).is_ok())
            }
            AudioPath::Muted => false,
        }
    }

    pub fn push_audio_sample(&mut self, sample: AudioSample) -> bool {
        match self {
            AudioPath::Hdmi(p) => p.push_sample(sample),
            AudioPath::Dac(p) => p.push(sample).is_ok(),
            AudioPath::Muted => false,
        }
    }

    /// Samples or islands waiting for the render core.
    pub fn queued(&self) -> usize {
        match self {
            AudioPath::Hdmi(p) => p.queued(),
            AudioPath::Dac(p) => p.used_space(),
            AudioPath::Muted => 0,
        }
    }
}
