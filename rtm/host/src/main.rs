mod font;
mod io_sim;
mod sink;

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use crossbeam_channel::{Receiver, Sender};
use rtm_core::backend::AudioStats;
use rtm_core::config::{MediaConfig, OutputKind, SourceKind};
use rtm_core::coordinator::SpinPolicy;
use rtm_core::engine::{RenderCore, RenderStats, ScanlineOutcome, Shared};
use rtm_core::render::{Deployment, Margins, RenderSettings};
use rtm_core::timing::VideoMode;
use tracing::{info, warn};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::io_sim::DemoOptions;
use crate::sink::{LinkCounters, StatsSink};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Output {
    Hdmi,
    Dvi,
    Vga,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Mode {
    #[value(name = "640x480")]
    Vga,
    #[value(name = "720x480")]
    Sd,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Source {
    Text,
    Frame,
    Lines,
    Blank,
}

#[derive(Parser, Debug)]
#[command(name = "rtm-host")]
#[command(version, about = "Drive the media engine with a render thread and an I/O thread", long_about = None)]
struct Cli {
    #[arg(long, value_enum, default_value_t = Output::Hdmi)]
    output: Output,

    #[arg(long, value_enum, default_value_t = Mode::Vga)]
    mode: Mode,

    #[arg(long, value_enum, default_value_t = Source::Text)]
    source: Source,

    /// Compose the whole picture once per frame instead of per line
    #[arg(long)]
    framebuffer: bool,

    /// Stretch to the 8:7 pixel aspect ratio
    #[arg(long)]
    aspect: bool,

    /// Darken every other output line
    #[arg(long)]
    scanlines: bool,

    #[arg(long, default_value_t = 0)]
    margin_left: u16,

    #[arg(long, default_value_t = 0)]
    margin_top: u16,

    #[arg(long, default_value_t = 320)]
    width: u16,

    #[arg(long, default_value_t = 240)]
    height: u16,

    #[arg(long, default_value_t = 48_000)]
    sample_rate: u32,

    /// Frames to run before stopping
    #[arg(short, long, default_value_t = 300)]
    frames: u32,

    /// Run as fast as possible instead of at the mode's frame rate
    #[arg(long)]
    unpaced: bool,

    /// Frames between simulated flash erases, 0 to disable
    #[arg(long, default_value_t = 120)]
    flash_every: u32,

    #[arg(long, default_value_t = 4)]
    flash_ms: u64,

    #[arg(long, default_value_t = 440.0)]
    tone_hz: f32,
}

impl Cli {
    fn media_config(&self) -> MediaConfig {
        MediaConfig {
            mode: match self.mode {
                Mode::Vga => VideoMode::Vga640x480,
                Mode::Sd => VideoMode::Sd720x480,
            },
            output: match self.output {
                Output::Hdmi => OutputKind::Hdmi,
                Output::Dvi => OutputKind::Dvi,
                Output::Vga => OutputKind::Vga,
            },
            deployment: if self.framebuffer { Deployment::Framebuffer } else { Deployment::Streaming },
            settings: RenderSettings::new(
                self.aspect,
                self.scanlines,
                Margins { left: self.margin_left, top: self.margin_top },
            ),
            source: match self.source {
                Source::Text => SourceKind::Text,
                Source::Frame => SourceKind::Frame,
                Source::Lines => SourceKind::Lines,
                Source::Blank => SourceKind::Blank,
            },
            source_width: self.width,
            source_height: self.height,
            sample_rate: self.sample_rate,
            text_cols: self.width / 8,
            text_rows: self.height / 8,
            ..MediaConfig::default()
        }
    }
}

/// Sent by the render thread once per frame.
#[derive(Copy, Clone, Debug)]
struct Report {
    frame: u32,
    render: RenderStats,
    audio: AudioStats,
    link: LinkCounters,
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .compact()
        .finish()
        .init();
}

fn render_loop(mut render: RenderCore<'_, StatsSink>, tx: Sender<Report>, stop: &AtomicBool, paced: bool) {
    #[cfg(not(target_arch = "wasm32"))]
    {
        use thread_priority::*;
        // if it didn't work, oh well
        let _ = set_current_thread_priority(ThreadPriority::Max);
    }

    let timing = *render.timing();
    let frame_time = Duration::from_secs_f64(timing.pixels_per_frame() as f64 / timing.pixel_clock_hz as f64);
    let start = Instant::now();

    while !stop.load(Ordering::Acquire) {
        let outcome = match render.service(SpinPolicy::bounded(10_000_000)) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("still parked: {e}");
                continue;
            }
        };

        if outcome != ScanlineOutcome::FrameBoundary {
            continue;
        }

        let frame = render.frame_counter();
        let report = Report {
            frame,
            render: render.stats(),
            audio: render.audio_stats(),
            link: render.backend().sink().counters(),
        };
        if tx.try_send(report).is_err() {
            warn!("report queue full, frame {frame} not reported");
        }

        if paced {
            let due = start + frame_time * frame;
            if let Some(wait) = due.checked_duration_since(Instant::now()) {
                thread::sleep(wait);
            }
        }
    }

    info!(
        "render core done: {} frames, {} lines repeated, {} overlays rejected",
        render.frame_counter(),
        render.repeated_lines(),
        render.overlay_rejections()
    );
}

/// Logs once a second of frames and returns the last report.
fn watch(rx: &Receiver<Report>, frames: u32, stop: &AtomicBool) -> Result<Report> {
    loop {
        let report = rx.recv_timeout(Duration::from_secs(5)).context("render thread stopped reporting")?;

        if report.frame % 60 == 0 {
            info!(
                "frame {} | parks {} | audio {} silence {} realigned {} | dac {} | phase errors {} | checksum {:08x}",
                report.frame,
                report.render.parks,
                report.audio.audio,
                report.audio.silence,
                report.audio.realigned,
                report.link.dac_samples,
                report.link.phase_errors,
                report.link.checksum,
            );
        }

        if report.frame >= frames {
            stop.store(true, Ordering::Release);
            return Ok(report);
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.media_config();
    let mut shared = Shared::new(config).map_err(|e| anyhow!("invalid configuration: {e}"))?;
    let (render, io) = shared.split(StatsSink::default(), font::DEBUG_FONT);

    let options = DemoOptions {
        tone_hz: cli.tone_hz,
        flash_every: cli.flash_every,
        flash_duration: Duration::from_millis(cli.flash_ms),
    };
    let (frames, paced) = (cli.frames, !cli.unpaced);
    let stop = AtomicBool::new(false);
    let (tx, rx) = crossbeam_channel::bounded(256);

    let (last, demo) = thread::scope(|s| {
        let stop = &stop;
        let render_thread = s.spawn(move || render_loop(render, tx, stop, paced));
        let io_thread = s.spawn(move || io_sim::run(io, config, options, stop));

        let last = watch(&rx, frames, stop);
        // stop both threads even when the watcher gave up
        stop.store(true, Ordering::Release);

        let render_done = render_thread.join();
        let io_done = io_thread.join();
        match (render_done, io_done) {
            (Ok(()), Ok(demo)) => Ok((last, demo)),
            _ => Err(anyhow!("a core thread panicked")),
        }
    })?;
    let last = last?;

    info!(
        "{} frames, {} active lines, {} islands ({} audio), {} flashes ({} timed out), {} samples dropped, {} lines dropped",
        last.frame,
        last.link.active_lines,
        last.link.islands,
        last.link.audio_islands,
        demo.flashes,
        demo.flash_timeouts,
        demo.dropped_audio,
        demo.dropped_lines,
    );

    if last.link.phase_errors > 0 {
        return Err(anyhow!("{} audio islands broke the framing alternation", last.link.phase_errors));
    }
    Ok(())
}

fn main() -> Result<()> {
    setup_logging();
    run(Cli::parse())
}
