use log::info;
use rtm_ring::Consumer;

use super::{AudioStats, LinkSink};
use crate::audio::{AudioSample, RateAccumulator};
use crate::config::MediaConfig;
use crate::render::{Font, LineSlots, Renderer, Source};
use crate::DAC_SLOTS;

/// RGB565 lines straight to a resistor DAC, audio to a PWM.
///
/// The PWM is fed from the line interrupt too: each line plays however many
/// samples the sample clock has advanced by, so the two stay locked without
/// a second timer.
pub struct VgaBackend<'a, S> {
    renderer: Renderer,
    slots: LineSlots,
    dac: Consumer<'a, AudioSample, DAC_SLOTS>,
    rate: RateAccumulator,
    sample_rate: u32,
    line_rate: u32,
    played: u32,
    underruns: u32,
    frames: u32,
    sink: S,
}

impl<'a, S: LinkSink> VgaBackend<'a, S> {
    pub fn new(config: &MediaConfig, font: Font, dac: Consumer<'a, AudioSample, DAC_SLOTS>, sink: S) -> Self {
        let timing = config.mode.timing();
        let line_rate = timing.line_rate_hz();
        info!("vga {}x{}, {} Hz pwm audio", timing.h.active, timing.v.active, config.sample_rate);

        Self {
            renderer: Renderer::new(config, font),
            slots: LineSlots::new(timing.h.active as usize),
            dac,
            rate: RateAccumulator::for_samples(config.sample_rate, line_rate),
            sample_rate: config.sample_rate,
            line_rate,
            played: 0,
            underruns: 0,
            frames: 0,
            sink,
        }
    }

    fn feed_dac(&mut self) {
        self.rate.tick();
        while self.rate.fire() {
            let sample = match self.dac.pop() {
                Some(s) => {
                    self.played = self.played.wrapping_add(1);
                    s
                }
                None => {
                    self.underruns = self.underruns.wrapping_add(1);
                    AudioSample::default()
                }
            };
            self.sink.dac_sample(sample);
        }
    }

    pub fn render_line(&mut self, line: u16, source: Source<'_, '_>) {
        self.renderer.render_line(line, source, self.slots.back_mut());
        self.slots.publish();

        self.feed_dac();
        self.sink.active_pixels(line, self.slots.front());
    }

    pub fn blank_line(&mut self, _line: u16) {
        self.feed_dac();
    }

    pub fn set_scanlines(&mut self, enabled: bool) {
        self.renderer.set_scanlines(enabled);
    }

    #[inline(always)]
    pub fn frame_counter(&self) -> u32 {
        self.frames
    }

    pub fn end_frame(&mut self) {
        self.frames = self.frames.wrapping_add(1);
    }

    pub fn rearm(&mut self) {
        self.rate = RateAccumulator::for_samples(self.sample_rate, self.line_rate);
    }

    #[inline(always)]
    pub fn renderer(&mut self) -> &mut Renderer {
        &mut self.renderer
    }
}

impl<S> VgaBackend<'_, S> {
    #[inline(always)]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn audio_stats(&self) -> AudioStats {
        AudioStats { audio: self.played, silence: self.underruns, realigned: 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputKind;
    use alloc::vec::Vec;
    use rtm_ring::RingBuffer;

    const FONT: Font = Font { glyphs: &[], height: 8, first: 0, count: 0 };

    #[derive(Default)]
    struct Dac {
        samples: Vec<AudioSample>,
        lines: u32,
    }

    impl LinkSink for Dac {
        fn active_pixels(&mut self, _line: u16, pixels: &[u16]) {
            assert_eq!(pixels.len(), 640);
            self.lines += 1;
        }

        fn dac_sample(&mut self, sample: AudioSample) {
            self.samples.push(sample);
        }
    }

    #[test]
    fn plays_queued_samples_then_silence() {
        let config = MediaConfig { output: OutputKind::Vga, ..MediaConfig::default() };
        let mut rb = RingBuffer::<AudioSample, DAC_SLOTS>::new();
        let (mut tx, rx) = rb.split();
        let mut vga = VgaBackend::new(&config, FONT, rx, Dac::default());

        for i in 0..10 {
            assert!(tx.push(AudioSample::new(i, -i)).is_ok());
        }

        // 525 lines of 48 kHz at 31.5 kHz lines: 799 or 800 samples
        for line in 0..525 {
            if line < 480 {
                vga.render_line(line, Source::Blank);
            } else {
                vga.blank_line(line);
            }
        }

        let dac = vga.sink();
        assert_eq!(dac.lines, 480);
        assert_eq!(dac.samples[..10].iter().map(|s| s.left).collect::<Vec<_>>(), (0..10).collect::<Vec<i16>>());
        assert!(dac.samples[10..].iter().all(|s| *s == AudioSample::default()));

        let stats = vga.audio_stats();
        assert_eq!(stats.audio, 10);
        assert_eq!(stats.audio + stats.silence, dac.samples.len() as u32);
        assert!((799..=800).contains(&dac.samples.len()));
    }
}
