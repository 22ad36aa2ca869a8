use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use rtm_core::audio::AudioSample;
use rtm_core::backend::LinkSink;
use rtm_core::config::{MediaConfig, OutputKind, SourceKind};
use rtm_core::coordinator::{ExclusiveState, SpinPolicy};
use rtm_core::engine::{IoCore, ScanlineOutcome, Shared};
use rtm_core::link::packet::TYPE_AUDIO_SAMPLE;
use rtm_core::link::{DataIsland, SyncLevels};
use rtm_core::render::Font;

const FONT: Font = Font { glyphs: &[], height: 8, first: 0, count: 0 };

#[derive(Default)]
struct Recorder {
    audio_phases: Vec<bool>,
    active_lines: u32,
    dac: Vec<AudioSample>,
}

impl LinkSink for Recorder {
    fn hblank(&mut self, _line: u16, _sync: SyncLevels, islands: &[DataIsland]) {
        for island in islands.iter().filter(|i| i.header()[0] == TYPE_AUDIO_SAMPLE) {
            self.audio_phases.push(island.framing_odd());
        }
    }

    fn active_words(&mut self, _line: u16, _words: &[u32]) {
        self.active_lines += 1;
    }

    fn active_pixels(&mut self, _line: u16, _pixels: &[u16]) {
        self.active_lines += 1;
    }

    fn dac_sample(&mut self, sample: AudioSample) {
        self.dac.push(sample);
    }
}

#[test]
fn hdmi_audio_alternates_across_frames() {
    let mut shared = Shared::new(MediaConfig::default()).unwrap();
    let (mut render, mut io) = shared.split(Recorder::default(), FONT);

    // a bit less audio than the link carries, so silence fills the gaps
    for frame in 0..10 {
        for i in 0..150 {
            let s = AudioSample::new(frame * 150 + i, 0);
            assert!(io.enqueue_audio([s; 4]));
        }
        for _ in 0..525 {
            render.on_scanline();
        }
    }

    let rec = render.backend().sink();
    assert_eq!(rec.active_lines, 4800);
    for (i, pair) in rec.audio_phases.windows(2).enumerate() {
        assert_ne!(pair[0], pair[1], "island {i}");
    }

    let stats = render.audio_stats();
    assert_eq!(stats.audio, 1500);
    assert_eq!((stats.audio + stats.silence) as usize, rec.audio_phases.len());
    assert!((1995..=2000).contains(&rec.audio_phases.len()));
}

#[test]
fn dvi_drops_audio() {
    let config = MediaConfig { output: OutputKind::Dvi, ..MediaConfig::default() };
    let mut shared = Shared::new(config).unwrap();
    let (mut render, mut io) = shared.split(Recorder::default(), FONT);

    assert!(!io.enqueue_audio([AudioSample::default(); 4]));
    for _ in 0..525 {
        render.on_scanline();
    }
    assert!(render.backend().sink().audio_phases.is_empty());
}

#[test]
fn vga_plays_what_the_io_core_pushes() {
    let config = MediaConfig { output: OutputKind::Vga, ..MediaConfig::default() };
    let mut shared = Shared::new(config).unwrap();
    let (mut render, mut io) = shared.split(Recorder::default(), FONT);

    for i in 0..700 {
        assert!(io.push_audio_sample(AudioSample::new(i, -i)));
    }
    for _ in 0..525 {
        render.on_scanline();
    }

    let rec = render.backend().sink();
    assert_eq!(rec.active_lines, 480);
    assert_eq!(rec.dac[699], AudioSample::new(699, -699));
    assert_eq!(render.audio_stats().audio, 700);
}

#[test]
fn streamed_lines_fill_the_picture() {
    let config = MediaConfig { source: SourceKind::Lines, ..MediaConfig::default() };
    let mut shared = Shared::new(config).unwrap();
    let (mut render, mut io) = shared.split(Recorder::default(), FONT);

    let row = [0x1234u16; 320];
    // each source row covers two output lines
    for line in 0..480u16 {
        if line % 2 == 0 {
            assert!(io.publish_line(line / 2, &row));
        }
        assert_eq!(render.on_scanline(), ScanlineOutcome::Active);
    }
    assert_eq!(render.repeated_lines(), 0);
    assert_eq!(io.dropped_lines(), 0);
}

#[test]
fn bounded_exclusive_request_gives_up() {
    let mut shared = Shared::new(MediaConfig::default()).unwrap();
    let (mut render, mut io) = shared.split(Recorder::default(), FONT);

    render.on_scanline();
    let err = io.request_exclusive(SpinPolicy::bounded(100)).unwrap_err();
    assert_eq!(err.spins, 100);
    assert_eq!(io.exclusive_state(), ExclusiveState::Idle);

    // the withdrawn request never parks the render core
    for _ in 1..525 {
        assert_ne!(render.on_scanline(), ScanlineOutcome::Parked);
    }
}

#[test]
fn exclusive_access_parks_at_the_frame_boundary() {
    let mut shared = Shared::new(MediaConfig::default()).unwrap();
    let (mut render, mut io) = shared.split(Recorder::default(), FONT);
    let held = &AtomicBool::new(false);

    for _ in 0..100 {
        render.on_scanline();
    }

    thread::scope(|s| {
        s.spawn(move || {
            let guard = io.request_exclusive(SpinPolicy::FOREVER).unwrap();
            // the window: the render core is parked until the guard goes
            assert_eq!(guard.state(), ExclusiveState::Granted);
            held.store(true, Ordering::Release);
            drop(guard);
        });

        SpinPolicy::FOREVER.spin_until(|| render.exclusive_state() != ExclusiveState::Idle).unwrap();

        // the request waits for the end of the picture
        for line in 100..480 {
            assert_eq!(render.on_scanline(), ScanlineOutcome::Active, "line {line}");
        }
        assert_eq!(render.on_scanline(), ScanlineOutcome::Parked);
        assert!(render.is_parked());

        assert_eq!(render.service(SpinPolicy::FOREVER).unwrap(), ScanlineOutcome::Resumed);
        assert!(held.load(Ordering::Acquire));
        assert_eq!(render.line(), 481);
    });

    for _ in 481..525 {
        assert_eq!(render.on_scanline(), ScanlineOutcome::Blank);
    }
    assert_eq!(render.on_scanline(), ScanlineOutcome::Active);
    assert_eq!(render.stats().parks, 1);
    assert_eq!(render.exclusive_state(), ExclusiveState::Idle);
}

#[test]
fn window_stays_open_until_the_guard_is_released() {
    let mut shared = Shared::new(MediaConfig::default()).unwrap();
    let (mut render, mut io) = shared.split(Recorder::default(), FONT);
    let close = &AtomicBool::new(false);

    thread::scope(|s| {
        s.spawn(move || {
            let guard = io.request_exclusive(SpinPolicy::FOREVER).unwrap();
            SpinPolicy::FOREVER.spin_until(|| close.load(Ordering::Acquire)).unwrap();
            assert_eq!(guard.state(), ExclusiveState::Granted);
            IoCore::release_exclusive(guard);
            assert_ne!(io.exclusive_state(), ExclusiveState::Granted);
        });

        SpinPolicy::FOREVER.spin_until(|| render.exclusive_state() != ExclusiveState::Idle).unwrap();
        while render.on_scanline() != ScanlineOutcome::Parked {}

        for _ in 0..1000 {
            assert_eq!(render.on_scanline(), ScanlineOutcome::Parked);
            assert_eq!(render.exclusive_state(), ExclusiveState::Granted);
        }
        assert_eq!(render.service(SpinPolicy::bounded(1000)).unwrap_err().spins, 1000);

        close.store(true, Ordering::Release);
        assert_eq!(render.service(SpinPolicy::FOREVER).unwrap(), ScanlineOutcome::Resumed);
    });

    assert_eq!(render.stats().parks, 1);
    assert_eq!(render.exclusive_state(), ExclusiveState::Idle);
}
