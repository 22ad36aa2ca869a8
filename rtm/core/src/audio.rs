use bytemuck::{Pod, Zeroable};

use crate::link::packet::FRAMES_PER_BLOCK;
use crate::link::{DataIsland, Packet, SyncLevels};

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct AudioSample {
    pub left: i16,
    pub right: i16,
}

impl AudioSample {
    pub const fn new(left: i16, right: i16) -> Self {
        Self { left, right }
    }
}

/// Samples carried by one audio island.
pub const SAMPLES_PER_ISLAND: u32 = 4;
pub const FRAC_BITS: u32 = 16;
/// Accumulator credit for one audio island, in 16.16.
pub const ISLAND_THRESHOLD: u32 = SAMPLES_PER_ISLAND << FRAC_BITS;

/// Leaky-bucket rate converter between the line clock and a sample clock.
///
/// Every tick adds `step` (samples per line, 16.16); every time the credit
/// reaches `threshold` one event fires and the threshold is subtracted, so
/// the remainder carries over and the long-run rate is exact to the
/// precision of `step`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RateAccumulator {
    acc: u32,
    step: u32,
    threshold: u32,
}

impl RateAccumulator {
    pub const fn new(step: u32, threshold: u32, initial: u32) -> Self {
        Self { acc: initial, step, threshold }
    }

    /// One event per `SAMPLES_PER_ISLAND` samples at `sample_rate`, ticked
    /// at `line_rate_hz`.
    pub fn for_islands(sample_rate: u32, line_rate_hz: u32) -> Self {
        Self::new(Self::step_for(sample_rate, line_rate_hz), ISLAND_THRESHOLD, 0)
    }

    /// One event per sample.
    pub fn for_samples(sample_rate: u32, line_rate_hz: u32) -> Self {
        Self::new(Self::step_for(sample_rate, line_rate_hz), 1 << FRAC_BITS, 0)
    }

    pub fn step_for(sample_rate: u32, line_rate_hz: u32) -> u32 {
        (((sample_rate as u64) << FRAC_BITS) / line_rate_hz.max(1) as u64) as u32
    }

    #[inline(always)]
    pub fn tick(&mut self) {
        self.acc = self.acc.saturating_add(self.step);
    }

    #[inline(always)]
    pub fn fire(&mut self) -> bool {
        if self.acc >= self.threshold {
            self.acc -= self.threshold;
            true
        } else {
            false
        }
    }

    #[inline(always)]
    pub fn step(&self) -> u32 {
        self.step
    }

    #[inline(always)]
    pub fn credit(&self) -> u32 {
        self.acc
    }
}

/// An encoded audio island and the framing phase it was encoded with.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AudioIsland {
    pub odd: bool,
    pub island: DataIsland,
}

/// Producer-side encoder. Keeps the running IEC 60958 frame number and the
/// framing phase of the next island.
#[derive(Copy, Clone, Debug)]
pub struct AudioEncoder {
    frame: u8,
    odd: bool,
    sync: SyncLevels,
}

impl AudioEncoder {
    pub const fn new(sync: SyncLevels) -> Self {
        Self { frame: 0, odd: false, sync }
    }

    pub fn encode(&mut self, samples: &[AudioSample; 4]) -> AudioIsland {
        let odd = self.odd;
        let island = Packet::audio_sample(samples, self.frame, odd).encode(self.sync);

        self.frame = (self.frame + SAMPLES_PER_ISLAND as u8) % FRAMES_PER_BLOCK;
        self.odd = !odd;

        AudioIsland { odd, island }
    }

    #[inline(always)]
    pub fn next_odd(&self) -> bool {
        self.odd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulator_keeps_the_remainder() {
        let mut acc = RateAccumulator::new(3 << FRAC_BITS, ISLAND_THRESHOLD, 0);
        let fired: [bool; 4] = core::array::from_fn(|_| {
            acc.tick();
            acc.fire()
        });
        // 3, 6 -> fire (2 left), 5 -> fire (1 left), 4 -> fire (0 left)
        assert_eq!(fired, [false, true, true, true]);
        assert_eq!(acc.credit(), 0);
    }

    #[test]
    fn vga_48k_step() {
        // 48000 / 31500 = 1.5238 samples per line
        let acc = RateAccumulator::for_islands(48_000, 31_500);
        assert_eq!(acc.step(), 99_864);
    }

    #[test]
    fn encoder_alternates_and_wraps_the_block() {
        let sync = SyncLevels { hsync: false, vsync: true };
        let mut enc = AudioEncoder::new(sync);
        let samples = [AudioSample::new(1, -1); 4];

        for i in 0..100 {
            let a = enc.encode(&samples);
            assert_eq!(a.odd, i % 2 == 1);
            assert_eq!(a.island.framing_odd(), a.odd);
            // block start on island 0 and 48
            let b_flags = a.island.header()[2] >> 4;
            assert_eq!(b_flags != 0, i % 48 == 0, "island {i}");
        }
    }
}
