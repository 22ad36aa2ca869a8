use rtm_core::audio::AudioSample;
use rtm_core::backend::LinkSink;
use rtm_core::link::packet::TYPE_AUDIO_SAMPLE;
use rtm_core::link::{DataIsland, SyncLevels};

/// Running totals of what reached the "wire".
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct LinkCounters {
    pub active_lines: u64,
    pub islands: u64,
    pub audio_islands: u64,
    /// Audio islands whose framing flag did not alternate.
    pub phase_errors: u64,
    pub dac_samples: u64,
    /// XOR of every word and pixel sent, to spot frozen output.
    pub checksum: u32,
}

/// Stands in for the HSTX/DMA hardware: counts instead of transmitting.
#[derive(Default)]
pub struct StatsSink {
    counters: LinkCounters,
    last_odd: Option<bool>,
}

impl StatsSink {
    pub fn counters(&self) -> LinkCounters {
        self.counters
    }
}

impl LinkSink for StatsSink {
    fn hblank(&mut self, _line: u16, _sync: SyncLevels, islands: &[DataIsland]) {
        self.counters.islands += islands.len() as u64;

        for island in islands.iter().filter(|i| i.header()[0] == TYPE_AUDIO_SAMPLE) {
            let odd = island.framing_odd();
            if self.last_odd == Some(odd) {
                self.counters.phase_errors += 1;
            }
            self.last_odd = Some(odd);
            self.counters.audio_islands += 1;
        }
    }

    fn active_words(&mut self, _line: u16, words: &[u32]) {
        self.counters.active_lines += 1;
        self.counters.checksum ^= words.iter().fold(0, |acc, w| acc ^ w);
    }

    fn active_pixels(&mut self, _line: u16, pixels: &[u16]) {
        self.counters.active_lines += 1;
        self.counters.checksum ^= pixels.iter().fold(0, |acc, p| acc ^ *p as u32);
    }

    fn dac_sample(&mut self, _sample: AudioSample) {
        self.counters.dac_samples += 1;
    }
}
