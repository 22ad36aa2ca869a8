use alloc::boxed::Box;
use alloc::vec;
use heapless::Vec;
use log::info;
use rtm_ring::Consumer;

use super::{AudioStats, LinkSink};
use crate::audio::{AudioIsland, RateAccumulator};
use crate::config::MediaConfig;
use crate::link::{encode_video_line, DataIsland, Packet, SyncLevels};
use crate::mux::Multiplexer;
use crate::render::{Font, LineSlots, Renderer, Source};
use crate::timing::VideoTiming;
use crate::ISLAND_SLOTS;

/// Islands ride in the horizontal sync pulse. Queued islands are encoded for
/// lines outside vertical sync and patched on the few lines inside it.
pub fn island_sync(timing: &VideoTiming) -> SyncLevels {
    SyncLevels { hsync: timing.hsync_pulse_level(), vsync: timing.vsync_level(0) }
}

/// TMDS output. With an island queue it is HDMI: audio islands on the
/// multiplexer's schedule plus clock regeneration and InfoFrames once per
/// frame. Without one it is plain DVI and the blanking stays empty.
pub struct HdmiBackend<'a, S> {
    timing: VideoTiming,
    renderer: Renderer,
    slots: LineSlots,
    words: Box<[u32]>,
    mux: Option<Multiplexer<'a, ISLAND_SLOTS>>,
    /// ACR, AVI InfoFrame and Audio InfoFrame, sent on the first three
    /// lines of the vertical blanking.
    frame_packets: Option<[DataIsland; 3]>,
    /// Sync levels the queued islands were encoded with.
    sync: SyncLevels,
    frames: u32,
    sink: S,
}

impl<'a, S: LinkSink> HdmiBackend<'a, S> {
    pub fn new(config: &MediaConfig, font: Font, audio: Option<Consumer<'a, AudioIsland, ISLAND_SLOTS>>, sink: S) -> Self {
        let timing = config.mode.timing();
        let sync = island_sync(&timing);
        let width = timing.h.active as usize;

        let (mux, frame_packets) = match audio {
            Some(queue) => {
                let rate = RateAccumulator::for_islands(config.sample_rate, timing.line_rate_hz());
                let packets = [
                    Packet::acr_for(&timing, config.sample_rate).encode(sync),
                    Packet::avi_infoframe(&timing).encode(sync),
                    Packet::audio_infoframe().encode(sync),
                ];
                info!("hdmi {}x{}, {} Hz audio", timing.h.active, timing.v.active, config.sample_rate);
                (Some(Multiplexer::new(rate, queue, sync)), Some(packets))
            }
            None => {
                info!("dvi {}x{}, no audio", timing.h.active, timing.v.active);
                (None, None)
            }
        };

        Self {
            timing,
            renderer: Renderer::new(config, font),
            slots: LineSlots::new(width),
            words: vec![0; width + 2].into_boxed_slice(),
            mux,
            frame_packets,
            sync,
            frames: 0,
            sink,
        }
    }

    fn hblank(&mut self, line: u16) {
        let sync = SyncLevels { hsync: self.timing.hsync_pulse_level(), vsync: self.timing.vsync_level(line) };
        let mut islands: Vec<DataIsland, 2> = Vec::new();

        if let Some(mux) = &mut self.mux {
            mux.tick();
            if let Some(island) = mux.packet_due() {
                let _ = islands.push(*island);
            }
        }

        if let (Some(packets), Some(k)) = (&self.frame_packets, line.checked_sub(self.timing.v.active)) {
            if let Some(packet) = packets.get(k as usize) {
                let _ = islands.push(*packet);
            }
        }

        if sync != self.sync {
            for island in islands.iter_mut() {
                *island = island.with_sync(sync);
            }
        }

        self.sink.hblank(line, sync, &islands);
    }

    pub fn render_line(&mut self, line: u16, source: Source<'_, '_>) {
        self.renderer.render_line(line, source, self.slots.back_mut());
        self.slots.publish();

        self.hblank(line);
        encode_video_line(self.slots.front(), &mut self.words);
        self.sink.active_words(line, &self.words);
    }

    pub fn blank_line(&mut self, line: u16) {
        self.hblank(line);
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
        if let Some(mux) = &mut self.mux {
            mux.rearm();
        }
    }

    #[inline(always)]
    pub fn renderer(&mut self) -> &mut Renderer {
        &mut self.renderer
    }
}

impl<S> HdmiBackend<'_, S> {
    #[inline(always)]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn audio_stats(&self) -> AudioStats {
        self.mux.as_ref().map_or(AudioStats::default(), |m| {
            let s = m.stats();
            AudioStats { audio: s.audio, silence: s.silence, realigned: s.realigned }
        })
    }
}
