//! # Audio/video multiplexer
//!
//! Schedules audio data islands into the horizontal blanking of video lines.
//! Video (line rate) and audio (sample rate) are unrelated clocks, so a
//! [`RateAccumulator`] decides once per line whether an island is due.
//!
//! The queue between the cores holds islands already encoded by the I/O
//! core ([`IslandProducer`]). When an island is due and nothing is queued, a
//! silence island is sent instead: the receiver must never see a gap.
//!
//! Audio islands carry an even/odd framing flag that has to alternate across
//! everything actually transmitted, silence included. Silence is taken from
//! a table holding one island per phase, picked by the phase the stream
//! expects next. Right after a silence run the head of the queue can be out
//! of phase; one more silence island is sent and the queued island goes out
//! on the following slot.

use heapless::Vec;
use log::{debug, warn};
use rtm_ring::{Consumer, Producer};

use crate::audio::{AudioEncoder, AudioIsland, AudioSample, RateAccumulator, SAMPLES_PER_ISLAND};
use crate::link::{DataIsland, Packet, SyncLevels};

/// Pre-encoded silence, one island per framing phase.
#[derive(Copy, Clone, Debug)]
pub struct SilenceTable {
    islands: [DataIsland; 2],
}

impl SilenceTable {
    pub fn new(sync: SyncLevels) -> Self {
        Self {
            islands: [
                Packet::audio_silence(false).encode(sync),
                Packet::audio_silence(true).encode(sync),
            ],
        }
    }

    #[inline(always)]
    pub fn get(&self, odd: bool) -> &DataIsland {
        &self.islands[odd as usize]
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MuxStats {
    pub audio: u32,
    pub silence: u32,
    /// Silence islands sent only to bring a queued island back into phase.
    pub realigned: u32,
}

/// Render-side half: runs in the scanline interrupt.
pub struct Multiplexer<'a, const N: usize> {
    rate: RateAccumulator,
    queue: Consumer<'a, AudioIsland, N>,
    silence: SilenceTable,
    expect_odd: bool,
    current: DataIsland,
    stats: MuxStats,
}

impl<'a, const N: usize> Multiplexer<'a, N> {
    pub fn new(rate: RateAccumulator, queue: Consumer<'a, AudioIsland, N>, sync: SyncLevels) -> Self {
        let silence = SilenceTable::new(sync);
        let current = *silence.get(false);
        Self { rate, queue, silence, expect_odd: false, current, stats: MuxStats::default() }
    }

    /// Once per scanline.
    #[inline(always)]
    pub fn tick(&mut self) {
        self.rate.tick();
    }

    /// The island to send on this line, if one is due.
    pub fn packet_due(&mut self) -> Option<&DataIsland> {
        if !self.rate.fire() {
            return None;
        }

        let phase = self.expect_odd;
        self.expect_odd = !phase;

        let in_phase = match self.queue.peek() {
            Some(head) if head.odd == phase => true,
            Some(_) => {
                self.stats.realigned += 1;
                false
            }
            None => false,
        };

        if in_phase {
            if let Some(next) = self.queue.pop() {
                self.stats.audio += 1;
                self.current = next.island;
                return Some(&self.current);
            }
        }

        self.stats.silence += 1;
        Some(self.silence.get(phase))
    }

    /// Framing phase of the next island that will be sent.
    #[inline(always)]
    pub fn expected_odd(&self) -> bool {
        self.expect_odd
    }

    #[inline(always)]
    pub fn queued(&self) -> usize {
        self.queue.used_space()
    }

    #[inline(always)]
    pub fn stats(&self) -> MuxStats {
        self.stats
    }

    /// Restart the rate schedule, e.g. after the link was stopped.
    pub fn rearm(&mut self) {
        self.rate = RateAccumulator::new(self.rate.step(), crate::audio::ISLAND_THRESHOLD, 0);
        debug!("multiplexer re-armed, {} islands queued", self.queued());
    }
}

/// I/O-side half: encodes samples and queues islands.
pub struct IslandProducer<'a, const N: usize> {
    queue: Producer<'a, AudioIsland, N>,
    encoder: AudioEncoder,
    watermark: usize,
    pending: Vec<AudioSample, 4>,
    dropped: u32,
}

impl<'a, const N: usize> IslandProducer<'a, N> {
    /// `watermark` bounds the queued latency; pushes beyond it are rejected.
    pub fn new(queue: Producer<'a, AudioIsland, N>, sync: SyncLevels, watermark: usize) -> Self {
        let watermark = watermark.clamp(1, queue.capacity());
        Self { queue, encoder: AudioEncoder::new(sync), watermark, pending: Vec::new(), dropped: 0 }
    }

    /// Islands needed to cover one video frame at `sample_rate`.
    pub fn frame_watermark(sample_rate: u32, pixel_clock_hz: u32, pixels_per_frame: u32) -> usize {
        let samples = (sample_rate as u64 * pixels_per_frame as u64).div_ceil(pixel_clock_hz as u64);
        samples.div_ceil(SAMPLES_PER_ISLAND as u64) as usize
    }

    /// Encode and queue four samples. Returns `false`, dropping them, when the
    /// queue already holds a frame's worth of audio.
    pub fn enqueue(&mut self, samples: [AudioSample; 4]) -> bool {
        // only this side grows the queue, so a push after this check succeeds
        if self.queue.used_space() >= self.watermark {
            self.dropped = self.dropped.wrapping_add(1);
            return false;
        }

        let island = self.encoder.encode(&samples);
        if self.queue.push(island).is_err() {
            warn!("island queue full below its watermark");
            self.dropped = self.dropped.wrapping_add(1);
            return false;
        }
        true
    }

    /// Collect single samples, queueing an island every fourth.
    pub fn push_sample(&mut self, sample: AudioSample) -> bool {
        let _ = self.pending.push(sample);
        if !self.pending.is_full() {
            return true;
        }

        let samples = [self.pending[0], self.pending[1], self.pending[2], self.pending[3]];
        self.pending.clear();
        self.enqueue(samples)
    }

    #[inline(always)]
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    #[inline(always)]
    pub fn watermark(&self) -> usize {
        self.watermark
    }

    #[inline(always)]
    pub fn queued(&self) -> usize {
        self.queue.used_space()
    }
}
