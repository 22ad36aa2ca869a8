//! # Engine
//!
//! [`Shared`] is everything the two cores have in common. It is built once
//! per session, before either core starts, and split into the two handles:
//!
//! - [`RenderCore`] lives in the scanline interrupt. `on_scanline` is called
//!   once per line and never blocks or allocates.
//! - [`IoCore`] is used by the menu, the emulator and storage code on the
//!   other core. Everything it hands over is picked up at the next frame
//!   boundary.
//!
//! ```ignore
//! let mut shared = Shared::new(config)?;
//! let (mut render, mut io) = shared.split(sink, FONT);
//! // render core, per line:
//! render.on_scanline();
//! // io core:
//! io.publish_text(|grid| grid.print(0, 0, "hello", 15, 0));
//! let guard = io.request_exclusive(SpinPolicy::FOREVER)?;
//! ```

use alloc::boxed::Box;
use alloc::vec;
use core::sync::atomic::{AtomicU32, Ordering};
use log::{debug, info, warn};
use rtm_ring::{Consumer, Producer, RingBuffer};

use crate::audio::{AudioIsland, AudioSample};
use crate::backend::{island_sync, AudioPath, AudioStats, Backend, HdmiBackend, LinkSink, OutputBackend, VgaBackend};
use crate::config::{ConfigError, MediaConfig, OutputKind, SourceKind};
use crate::coordinator::{ExclusiveRequest, ExclusiveState, Observation, SpinPolicy, SpinTimeout, SwapChain, VsyncFlag};
use crate::mux::IslandProducer;
use crate::render::{Font, LineFeed, Overlay, RenderSettings, Source, SourceLine, TextGrid};
use crate::timing::VideoTiming;
use crate::{COMMAND_SLOTS, DAC_SLOTS, ISLAND_SLOTS, LINE_SLOTS};

/// Changes the I/O core asks for, applied at the next frame boundary.
#[derive(Debug)]
pub enum Command {
    SelectSource(SourceKind),
    /// Install an overlay, or remove it with `None`.
    SetOverlay(Option<Overlay>),
    MoveOverlay { x: u16, y: u16 },
}

pub struct Shared {
    config: MediaConfig,
    islands: RingBuffer<AudioIsland, ISLAND_SLOTS>,
    dac: RingBuffer<AudioSample, DAC_SLOTS>,
    lines: RingBuffer<SourceLine, LINE_SLOTS>,
    commands: RingBuffer<Command, COMMAND_SLOTS>,
    /// Overlays the render core is done with, freed by the I/O core.
    reclaim: RingBuffer<Overlay, COMMAND_SLOTS>,
    frames: SwapChain<Box<[u16]>>,
    text: SwapChain<TextGrid>,
    settings: AtomicU32,
    vsync: VsyncFlag,
    exclusive: ExclusiveRequest,
}

impl Shared {
    pub fn new(config: MediaConfig) -> Result<Box<Self>, ConfigError> {
        config.validate()?;

        let pixels = config.source_width as usize * config.source_height as usize;
        let frame = || vec![0u16; pixels].into_boxed_slice();
        let grid = || TextGrid::new(config.text_cols, config.text_rows);

        Ok(Box::new(Self {
            config,
            islands: RingBuffer::new(),
            dac: RingBuffer::new(),
            lines: RingBuffer::new(),
            commands: RingBuffer::new(),
            reclaim: RingBuffer::new(),
            frames: SwapChain::new(frame(), frame()),
            text: SwapChain::new(grid(), grid()),
            settings: AtomicU32::new(config.settings.bits()),
            vsync: VsyncFlag::new(),
            exclusive: ExclusiveRequest::new(),
        }))
    }

    #[inline(always)]
    pub fn config(&self) -> &MediaConfig {
        &self.config
    }

    pub fn split<S: LinkSink>(&mut self, sink: S, font: Font) -> (RenderCore<'_, S>, IoCore<'_>) {
        let Shared { config, islands, dac, lines, commands, reclaim, frames, text, settings, vsync, exclusive } = self;
        let config = *config;
        let timing = config.mode.timing();

        let (backend, audio) = match config.output {
            OutputKind::Hdmi => {
                let (tx, rx) = islands.split();
                let watermark = IslandProducer::<ISLAND_SLOTS>::frame_watermark(
                    config.sample_rate,
                    timing.pixel_clock_hz,
                    timing.pixels_per_frame(),
                );
                let producer = IslandProducer::new(tx, island_sync(&timing), watermark);
                (Backend::Hdmi(HdmiBackend::new(&config, font, Some(rx), sink)), AudioPath::Hdmi(producer))
            }
            OutputKind::Dvi => (Backend::Hdmi(HdmiBackend::new(&config, font, None, sink)), AudioPath::Muted),
            OutputKind::Vga => {
                let (tx, rx) = dac.split();
                (Backend::Vga(VgaBackend::new(&config, font, rx, sink)), AudioPath::Dac(tx))
            }
        };

        let (line_tx, line_rx) = lines.split();
        let (command_tx, command_rx) = commands.split();
        let (reclaim_tx, reclaim_rx) = reclaim.split();
        let (frames, text, settings, vsync, exclusive) = (&*frames, &*text, &*settings, &*vsync, &*exclusive);

        let render = RenderCore {
            timing,
            backend,
            source: config.source,
            feed: LineFeed::new(line_rx, config.source_height),
            commands: command_rx,
            reclaim: reclaim_tx,
            frames,
            text,
            settings,
            settings_seen: config.settings.bits(),
            vsync,
            exclusive,
            line: 0,
            parked: false,
            stats: RenderStats::default(),
        };

        let io = IoCore {
            audio,
            lines: line_tx,
            commands: command_tx,
            reclaim: reclaim_rx,
            frames,
            text,
            settings,
            vsync,
            exclusive,
            dropped_lines: 0,
        };

        (render, io)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScanlineOutcome {
    Active,
    Blank,
    /// First line after the picture: flips, settings and commands applied.
    FrameBoundary,
    /// Output stopped for an exclusive-access window.
    Parked,
    /// The window closed; output restarted at the top of the blanking.
    Resumed,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub frames: u32,
    pub active_lines: u32,
    pub blank_lines: u32,
    pub parks: u32,
    /// Calls made while parked.
    pub parked_polls: u32,
    pub commands: u32,
}

/// Builds the current source out of disjoint fields, so the backend can be
/// borrowed mutably at the same time.
fn current_source<'s, 'a>(
    kind: SourceKind,
    text: &'s SwapChain<TextGrid>,
    frames: &'s SwapChain<Box<[u16]>>,
    feed: &'s mut LineFeed<'a>,
) -> Source<'s, 'a> {
    match kind {
        SourceKind::Text => Source::Text(text.front()),
        SourceKind::Frame => Source::Frame(&frames.front()[..]),
        SourceKind::Lines => Source::Lines(feed),
        SourceKind::Blank => Source::Blank,
    }
}

pub struct RenderCore<'a, S> {
    timing: VideoTiming,
    backend: Backend<'a, S>,
    source: SourceKind,
    feed: LineFeed<'a>,
    commands: Consumer<'a, Command, COMMAND_SLOTS>,
    reclaim: Producer<'a, Overlay, COMMAND_SLOTS>,
    frames: &'a SwapChain<Box<[u16]>>,
    text: &'a SwapChain<TextGrid>,
    settings: &'a AtomicU32,
    /// Last word taken from `settings`.
    settings_seen: u32,
    vsync: &'a VsyncFlag,
    exclusive: &'a ExclusiveRequest,
    line: u16,
    parked: bool,
    stats: RenderStats,
}

impl<'a, S: LinkSink> RenderCore<'a, S> {
    /// Handle the line the beam is on and move to the next one.
    pub fn on_scanline(&mut self) -> ScanlineOutcome {
        if self.parked {
            return self.poll_parked();
        }

        let line = self.line;
        let v = self.timing.v;
        let outcome = if line < v.active {
            let source = current_source(self.source, self.text, self.frames, &mut self.feed);
            self.backend.render_line(line, source);
            self.stats.active_lines = self.stats.active_lines.wrapping_add(1);
            ScanlineOutcome::Active
        } else if line == v.active {
            if self.frame_boundary() {
                return ScanlineOutcome::Parked;
            }
            self.backend.blank_line(line);
            self.stats.blank_lines = self.stats.blank_lines.wrapping_add(1);
            ScanlineOutcome::FrameBoundary
        } else {
            self.backend.blank_line(line);
            self.stats.blank_lines = self.stats.blank_lines.wrapping_add(1);
            ScanlineOutcome::Blank
        };

        self.advance();
        outcome
    }

    fn advance(&mut self) {
        self.line += 1;
        if self.line >= self.timing.v.total() {
            self.line = 0;
            self.vsync.exit();
        }
    }

    /// Returns `true` when the render core parked.
    fn frame_boundary(&mut self) -> bool {
        self.vsync.enter();
        self.backend.end_frame();
        self.stats.frames = self.stats.frames.wrapping_add(1);

        let bits = self.settings.load(Ordering::Acquire);
        if bits != self.settings_seen {
            self.settings_seen = bits;
            self.backend.renderer().apply_settings(RenderSettings::from_bits(bits));
        }
        self.drain_commands();
        self.text.apply_flip();
        self.frames.apply_flip();

        if self.exclusive.observe() == Observation::Granted {
            self.parked = true;
            self.stats.parks = self.stats.parks.wrapping_add(1);
            debug!("parked for exclusive access after frame {}", self.stats.frames);
            return true;
        }

        self.prepare_source();
        false
    }

    fn prepare_source(&mut self) {
        let source = current_source(self.source, self.text, self.frames, &mut self.feed);
        self.backend.renderer().prepare(&source);
    }

    fn drain_commands(&mut self) {
        // each command gives back at most one overlay
        while !self.reclaim.is_full() {
            let Some(command) = self.commands.pop() else {
                break;
            };
            self.stats.commands = self.stats.commands.wrapping_add(1);

            let retired = match command {
                Command::SelectSource(kind) => {
                    if kind != self.source {
                        debug!("source {:?} -> {:?}", self.source, kind);
                        self.source = kind;
                    }
                    None
                }
                Command::SetOverlay(overlay) => self.backend.renderer().set_overlay(overlay),
                Command::MoveOverlay { x, y } => self.backend.renderer().move_overlay(x, y),
            };

            if let Some(overlay) = retired {
                if self.reclaim.push(overlay).is_err() {
                    warn!("reclaim queue full");
                }
            }
        }
    }

    fn poll_parked(&mut self) -> ScanlineOutcome {
        if self.exclusive.observe() != Observation::Withdrawn {
            self.stats.parked_polls = self.stats.parked_polls.wrapping_add(1);
            return ScanlineOutcome::Parked;
        }

        self.parked = false;
        self.backend.rearm();
        debug!("resumed after exclusive access");

        // restart at the top of the vertical blanking
        let line = self.timing.v.active;
        self.prepare_source();
        self.backend.blank_line(line);
        self.stats.blank_lines = self.stats.blank_lines.wrapping_add(1);
        self.line = line;
        self.advance();
        ScanlineOutcome::Resumed
    }

    /// `on_scanline` for a loop that owns the core: while parked, spin until
    /// the I/O core releases instead of returning on every call. On timeout
    /// the render core stays parked.
    pub fn service(&mut self, policy: SpinPolicy) -> Result<ScanlineOutcome, SpinTimeout> {
        if self.parked {
            let exclusive = self.exclusive;
            policy.spin_until(|| exclusive.state() != ExclusiveState::Granted)?;
        }
        Ok(self.on_scanline())
    }

    /// Apply a scanline setting right away. Meant for the render core's own
    /// startup. It holds until the I/O core calls [`IoCore::configure`],
    /// whose settings replace it at the next frame boundary.
    pub fn set_scanlines(&mut self, enabled: bool) {
        self.backend.set_scanlines(enabled);
    }

    /// Next line to be handled.
    #[inline(always)]
    pub fn line(&self) -> u16 {
        self.line
    }

    #[inline(always)]
    pub fn is_parked(&self) -> bool {
        self.parked
    }

    #[inline(always)]
    pub fn exclusive_state(&self) -> ExclusiveState {
        self.exclusive.state()
    }

    #[inline(always)]
    pub fn source(&self) -> SourceKind {
        self.source
    }

    #[inline(always)]
    pub fn frame_counter(&self) -> u32 {
        self.backend.frame_counter()
    }

    #[inline(always)]
    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    #[inline(always)]
    pub fn audio_stats(&self) -> AudioStats {
        self.backend.audio_stats()
    }

    /// Source rows shown twice because their streamed line was missing.
    #[inline(always)]
    pub fn repeated_lines(&self) -> u32 {
        self.feed.repeated()
    }

    #[inline(always)]
    pub fn timing(&self) -> &VideoTiming {
        &self.timing
    }

    #[inline(always)]
    pub fn backend(&self) -> &Backend<'a, S> {
        &self.backend
    }

    pub fn overlay_rejections(&mut self) -> u32 {
        self.backend.renderer().overlay_rejections()
    }
}

/// Held while the render core is parked. Dropping it ends the window.
///
/// The guard borrows the [`IoCore`] it came from, so there is only ever one.
#[must_use = "dropping the guard releases exclusive access immediately"]
#[derive(Debug)]
pub struct ExclusiveGuard<'a> {
    exclusive: &'a ExclusiveRequest,
}

impl ExclusiveGuard<'_> {
    pub fn release(self) {}

    #[inline(always)]
    pub fn state(&self) -> ExclusiveState {
        self.exclusive.state()
    }
}

impl Drop for ExclusiveGuard<'_> {
    fn drop(&mut self) {
        self.exclusive.release();
    }
}

pub struct IoCore<'a> {
    audio: AudioPath<'a>,
    lines: Producer<'a, SourceLine, LINE_SLOTS>,
    commands: Producer<'a, Command, COMMAND_SLOTS>,
    reclaim: Consumer<'a, Overlay, COMMAND_SLOTS>,
    frames: &'a SwapChain<Box<[u16]>>,
    text: &'a SwapChain<TextGrid>,
    settings: &'a AtomicU32,
    vsync: &'a VsyncFlag,
    exclusive: &'a ExclusiveRequest,
    dropped_lines: u32,
}

impl<'a> IoCore<'a> {
    /// Draw the next full frame. `false`, without calling `draw`, while the
    /// previous frame is still waiting for its flip.
    pub fn publish_frame(&mut self, draw: impl FnOnce(&mut [u16])) -> bool {
        // SAFETY: IoCore is the only writer of the chain and is not Clone
        unsafe { self.frames.publish(|back, _| draw(&mut back[..])) }
    }

    /// Edit the text grid. `draw` sees a copy of what is on screen.
    pub fn publish_text(&mut self, draw: impl FnOnce(&mut TextGrid)) -> bool {
        // SAFETY: as for publish_frame
        unsafe {
            self.text.publish(|back, shown| {
                let generation = shown.generation().wrapping_add(1);
                back.copy_from(shown);
                draw(back);
                back.set_generation(generation);
            })
        }
    }

    /// Hand over one source row for the streaming source. `false` when the
    /// render core is behind and the line was dropped.
    pub fn publish_line(&mut self, index: u16, pixels: &[u16]) -> bool {
        if self.lines.push(SourceLine::new(index, pixels)).is_err() {
            self.dropped_lines = self.dropped_lines.wrapping_add(1);
            return false;
        }
        true
    }

    pub fn enqueue_audio(&mut self, samples: [AudioSample; 4]) -> bool {
        self.audio.enqueue_audio(samples)
    }

    pub fn push_audio_sample(&mut self, sample: AudioSample) -> bool {
        self.audio.push_audio_sample(sample)
    }

    #[inline(always)]
    pub fn audio(&self) -> &AudioPath<'a> {
        &self.audio
    }

    pub fn select_source(&mut self, kind: SourceKind) -> bool {
        self.commands.push(Command::SelectSource(kind)).is_ok()
    }

    pub fn set_overlay(&mut self, overlay: Option<Overlay>) -> bool {
        self.commands.push(Command::SetOverlay(overlay)).is_ok()
    }

    pub fn move_overlay(&mut self, x: u16, y: u16) -> bool {
        self.commands.push(Command::MoveOverlay { x, y }).is_ok()
    }

    /// New render settings, taking effect at the next frame boundary.
    pub fn configure(&mut self, settings: RenderSettings) {
        self.settings.store(settings.bits(), Ordering::Release);
    }

    /// Free overlays the render core has let go of.
    pub fn collect_reclaimed(&mut self) -> usize {
        let mut n = 0;
        while let Some(overlay) = self.reclaim.pop() {
            drop(overlay);
            n += 1;
        }
        n
    }

    /// Stop the render core at its next frame boundary and wait until it
    /// has. On timeout the request is withdrawn.
    ///
    /// The guard keeps `self` borrowed, so a second request can't start
    /// while one window is open:
    ///
    /// ```compile_fail
    /// # use rtm_core::backend::LinkSink;
    /// # use rtm_core::config::MediaConfig;
    /// # use rtm_core::coordinator::SpinPolicy;
    /// # use rtm_core::engine::Shared;
    /// # use rtm_core::render::Font;
    /// # struct Null;
    /// # impl LinkSink for Null {}
    /// # const FONT: Font = Font { glyphs: &[], height: 8, first: 0, count: 0 };
    /// let mut shared = Shared::new(MediaConfig::default()).unwrap();
    /// let (_render, mut io) = shared.split(Null, FONT);
    /// let first = io.request_exclusive(SpinPolicy::bounded(1));
    /// let second = io.request_exclusive(SpinPolicy::bounded(1));
    /// drop((first, second));
    /// ```
    pub fn request_exclusive(&mut self, policy: SpinPolicy) -> Result<ExclusiveGuard<'_>, SpinTimeout> {
        let exclusive = self.exclusive;
        exclusive.request();
        match policy.spin_until(|| exclusive.is_granted()) {
            Ok(spins) => {
                info!("exclusive access granted after {spins} spins");
                Ok(ExclusiveGuard { exclusive })
            }
            Err(e) => {
                exclusive.release();
                warn!("exclusive access not granted: {e}");
                Err(e)
            }
        }
    }

    /// End the window. Same as dropping `guard`.
    pub fn release_exclusive(guard: ExclusiveGuard<'_>) {
        guard.release();
    }

    #[inline(always)]
    pub fn exclusive_state(&self) -> ExclusiveState {
        self.exclusive.state()
    }

    /// Wait for the start of the next vertical blanking. Returns the frame
    /// number.
    pub fn wait_for_vblank(&self, policy: SpinPolicy) -> Result<u32, SpinTimeout> {
        let vsync = self.vsync;
        let start = vsync.frame();
        policy.spin_until(|| vsync.frame() != start)?;
        Ok(vsync.frame())
    }

    #[inline(always)]
    pub fn is_blanking(&self) -> bool {
        self.vsync.is_blanking()
    }

    #[inline(always)]
    pub fn frame(&self) -> u32 {
        self.vsync.frame()
    }

    #[inline(always)]
    pub fn dropped_lines(&self) -> u32 {
        self.dropped_lines
    }
}
