//! # Scanline renderer
//!
//! Produces one output line per call from whatever source is published:
//! a character grid, a full RGB565 frame, or lines streamed by the I/O core.
//!
//! Scaling is done through two precomputed maps from output position to
//! source position (`BORDER` for margin pixels), rebuilt only when the
//! settings change at a frame boundary. The scanline effect is applied last,
//! on the output line number, so a doubled source row comes out as one
//! bright and one dark line.
//!
//! Text sources are composed row by row: the line is cleared if the overlay
//! is animating, the overlay row is copied in, and the text is drawn around
//! it. In the `Framebuffer` deployment the composed rows are kept in a full
//! source-sized buffer and redrawn only when the grid or the overlay changes.

pub mod line;
pub mod overlay;
pub mod text;

use alloc::boxed::Box;
use alloc::vec;
use bitfield::bitfield;
use log::{debug, warn};

use crate::color::darken;
use crate::config::MediaConfig;
pub use line::{LineFeed, LineSlots, SourceLine};
pub use overlay::{Overlay, OverlayError};
pub use text::{Cell, Font, TextGrid, GLYPH_WIDTH};

/// Map entry for output pixels and lines outside the picture.
pub const BORDER: u16 = u16::MAX;

/// Pixel aspect as horizontal and vertical duplication ratios.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AspectRatio {
    pub h_num: u8,
    pub h_den: u8,
    pub v_num: u8,
    pub v_den: u8,
}

impl AspectRatio {
    /// 8:7 pixels on a line-doubled image.
    pub const PAR_8_7: AspectRatio = AspectRatio { h_num: 16, h_den: 7, v_num: 2, v_den: 1 };
}

impl Default for AspectRatio {
    fn default() -> Self {
        Self::PAR_8_7
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScaleMode {
    /// Largest integer factor that fits, centred.
    Native,
    /// Non-uniform duplication placed at the configured margins.
    Aspect(AspectRatio),
}

/// Offset of the picture in `Aspect` mode, in output pixels.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Margins {
    pub left: u16,
    pub top: u16,
}

bitfield! {
    /// Render options that may change during a session, packed into one
    /// word so the I/O core can hand a change over with a single store.
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct RenderSettings(u32);
    impl Debug;
    pub aspect, set_aspect: 0;
    pub scanlines, set_scanlines: 1;
    pub u16, margin_left, set_margin_left: 11, 2;
    pub u16, margin_top, set_margin_top: 21, 12;
}

impl RenderSettings {
    /// Largest margin the packed word can carry.
    pub const MAX_MARGIN: u16 = 0x3FF;

    pub fn new(aspect: bool, scanlines: bool, margins: Margins) -> Self {
        let mut s = RenderSettings(0);
        s.set_aspect(aspect);
        s.set_scanlines(scanlines);
        s.set_margin_left(margins.left.min(Self::MAX_MARGIN));
        s.set_margin_top(margins.top.min(Self::MAX_MARGIN));
        s
    }

    #[inline(always)]
    pub const fn from_bits(bits: u32) -> Self {
        RenderSettings(bits)
    }

    #[inline(always)]
    pub const fn bits(self) -> u32 {
        self.0
    }

    pub fn margins(&self) -> Margins {
        Margins { left: self.margin_left(), top: self.margin_top() }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Deployment {
    /// Compose every source row when it is scanned out.
    #[default]
    Streaming,
    /// Keep a composed copy of the whole source and re-sample it.
    Framebuffer,
}

/// What the current frame is drawn from.
pub enum Source<'s, 'a> {
    Blank,
    Text(&'s TextGrid),
    /// Row-major RGB565, `source_width * source_height` pixels.
    Frame(&'s [u16]),
    Lines(&'s mut LineFeed<'a>),
}

pub struct Renderer {
    out_w: u16,
    out_h: u16,
    src_w: u16,
    src_h: u16,
    font: Font,
    aspect: AspectRatio,
    settings: RenderSettings,
    deployment: Deployment,

    x_map: Box<[u16]>,
    y_map: Box<[u16]>,
    row: Box<[u16]>,

    composed: Box<[u16]>,
    /// Grid and overlay generation the composed buffer was drawn from.
    composed_key: Option<(u32, u32)>,

    overlay: Option<Overlay>,
    overlay_generation: u32,
    overlay_warned: bool,
    rejected: u32,
}

impl Renderer {
    pub fn new(config: &MediaConfig, font: Font) -> Self {
        let timing = config.mode.timing();
        let (src_w, src_h) = (config.source_width, config.source_height);
        let composed = match config.deployment {
            Deployment::Streaming => Box::default(),
            Deployment::Framebuffer => vec![0; src_w as usize * src_h as usize].into_boxed_slice(),
        };

        let mut renderer = Self {
            out_w: timing.h.active,
            out_h: timing.v.active,
            src_w,
            src_h,
            font,
            aspect: config.aspect,
            settings: config.settings,
            deployment: config.deployment,
            x_map: vec![BORDER; timing.h.active as usize].into_boxed_slice(),
            y_map: vec![BORDER; timing.v.active as usize].into_boxed_slice(),
            row: vec![0; src_w as usize].into_boxed_slice(),
            composed,
            composed_key: None,
            overlay: None,
            overlay_generation: 0,
            overlay_warned: false,
            rejected: 0,
        };
        renderer.build_maps();
        renderer
    }

    #[inline(always)]
    pub fn output_width(&self) -> usize {
        self.out_w as usize
    }

    #[inline(always)]
    pub fn settings(&self) -> RenderSettings {
        self.settings
    }

    pub fn scale_mode(&self) -> ScaleMode {
        if self.settings.aspect() {
            ScaleMode::Aspect(self.aspect)
        } else {
            ScaleMode::Native
        }
    }

    /// Frame boundary only.
    pub fn apply_settings(&mut self, settings: RenderSettings) {
        if settings == self.settings {
            return;
        }
        debug!("render settings {:?} -> {:?}", self.settings, settings);
        let remap = settings.aspect() != self.settings.aspect() || settings.margins() != self.settings.margins();
        self.settings = settings;
        if remap {
            self.build_maps();
        }
    }

    pub fn set_scanlines(&mut self, enabled: bool) {
        let mut settings = self.settings;
        settings.set_scanlines(enabled);
        self.apply_settings(settings);
    }

    /// The source position shown at output pixel `x`, or `BORDER`.
    #[inline(always)]
    pub fn x_map(&self, x: usize) -> u16 {
        self.x_map.get(x).copied().unwrap_or(BORDER)
    }

    /// The source row shown on output line `y`, or `BORDER`.
    #[inline(always)]
    pub fn y_map(&self, y: usize) -> u16 {
        self.y_map.get(y).copied().unwrap_or(BORDER)
    }

    fn build_maps(&mut self) {
        let (sw, sh) = (self.src_w as u32, self.src_h as u32);
        let (ow, oh) = (self.out_w as u32, self.out_h as u32);
        match self.scale_mode() {
            ScaleMode::Native => {
                let f = (ow / sw.max(1)).min(oh / sh.max(1)).max(1);
                let left = ow.saturating_sub(sw * f) / 2;
                let top = oh.saturating_sub(sh * f) / 2;
                fill_map(&mut self.x_map, left, sw, f, 1);
                fill_map(&mut self.y_map, top, sh, f, 1);
            }
            ScaleMode::Aspect(r) => {
                let m = self.settings.margins();
                fill_map(&mut self.x_map, m.left as u32, sw, r.h_num as u32, r.h_den as u32);
                fill_map(&mut self.y_map, m.top as u32, sh, r.v_num as u32, r.v_den as u32);
            }
        }
    }

    /// Install an overlay, or remove it with `None`. Returns the overlay the
    /// renderer let go of: the previous one, or `overlay` itself when it
    /// does not fit the source.
    pub fn set_overlay(&mut self, overlay: Option<Overlay>) -> Option<Overlay> {
        if let Some(o) = &overlay {
            if let Err(e) = o.validate(self.src_w, self.src_h) {
                self.reject(e);
                return overlay;
            }
        }
        self.overlay_generation = self.overlay_generation.wrapping_add(1);
        core::mem::replace(&mut self.overlay, overlay)
    }

    /// Move the overlay. A position that pushes it past the source disables
    /// it; the disabled overlay is returned.
    pub fn move_overlay(&mut self, x: u16, y: u16) -> Option<Overlay> {
        let o = self.overlay.as_mut()?;
        let (old_x, old_y) = (o.x, o.y);
        o.x = x;
        o.y = y;
        if let Err(e) = o.validate(self.src_w, self.src_h) {
            o.x = old_x;
            o.y = old_y;
            self.reject(e);
            self.overlay_generation = self.overlay_generation.wrapping_add(1);
            return self.overlay.take();
        }
        self.overlay_generation = self.overlay_generation.wrapping_add(1);
        None
    }

    fn reject(&mut self, e: OverlayError) {
        self.rejected = self.rejected.wrapping_add(1);
        if !self.overlay_warned {
            self.overlay_warned = true;
            warn!("overlay disabled: {e}");
        }
    }

    #[inline(always)]
    pub fn overlay(&self) -> Option<&Overlay> {
        self.overlay.as_ref()
    }

    /// Overlays turned away this session.
    #[inline(always)]
    pub fn overlay_rejections(&self) -> u32 {
        self.rejected
    }

    /// Frame boundary work: bring the composed copy of a text source up to
    /// date. No-op in the streaming deployment.
    pub fn prepare(&mut self, source: &Source<'_, '_>) {
        if let Source::Text(grid) = source {
            if self.deployment == Deployment::Framebuffer {
                self.ensure_composed(grid);
            }
        }
    }

    fn ensure_composed(&mut self, grid: &TextGrid) {
        let key = (grid.generation(), self.overlay_generation);
        if self.composed_key == Some(key) {
            return;
        }
        let w = self.src_w as usize;
        for (y, row) in self.composed.chunks_exact_mut(w).enumerate() {
            compose_text(grid, &self.font, self.overlay.as_ref(), y, row);
        }
        self.composed_key = Some(key);
    }

    /// Render output line `line` into `out`, which holds at least one
    /// output line.
    pub fn render_line(&mut self, line: u16, source: Source<'_, '_>, out: &mut [u16]) {
        let out = &mut out[..self.out_w as usize];
        let sy = self.y_map(line as usize);
        if sy == BORDER {
            out.fill(0);
            return;
        }

        let w = self.src_w as usize;
        let y = sy as usize;
        match source {
            Source::Blank => {
                out.fill(0);
                return;
            }
            Source::Frame(frame) => match frame.get(y * w..).and_then(|r| r.get(..w)) {
                Some(row) => scale_row(&self.x_map, row, out),
                None => out.fill(0),
            },
            Source::Lines(feed) => scale_row(&self.x_map, &feed.fetch(sy)[..w], out),
            Source::Text(grid) => match self.deployment {
                Deployment::Streaming => {
                    compose_text(grid, &self.font, self.overlay.as_ref(), y, &mut self.row);
                    scale_row(&self.x_map, &self.row, out);
                }
                Deployment::Framebuffer => {
                    self.ensure_composed(grid);
                    scale_row(&self.x_map, &self.composed[y * w..][..w], out);
                }
            },
        }

        if self.settings.scanlines() && line & 1 == 1 {
            for px in out.iter_mut() {
                *px = darken(*px);
            }
        }
    }
}

/// Map `span = src * num / den` output positions starting at `start` onto
/// `0..src`; everything else is `BORDER`.
fn fill_map(map: &mut [u16], start: u32, src: u32, num: u32, den: u32) {
    let (num, den) = (num.max(1), den.max(1));
    let span = src * num / den;
    for (i, m) in map.iter_mut().enumerate() {
        let i = i as u32;
        *m = if i >= start && i < start + span {
            ((i - start) * den / num).min(src.saturating_sub(1)) as u16
        } else {
            BORDER
        };
    }
}

#[inline(always)]
fn scale_row(x_map: &[u16], row: &[u16], out: &mut [u16]) {
    for (px, sx) in out.iter_mut().zip(x_map) {
        *px = row.get(*sx as usize).copied().unwrap_or(0);
    }
}

/// Clear (animated overlay only), then overlay, then text around it.
fn compose_text(grid: &TextGrid, font: &Font, overlay: Option<&Overlay>, y: usize, out: &mut [u16]) {
    let mut skip = 0..0;
    if let Some(o) = overlay {
        if o.moving {
            out.fill(0);
        }
        if let Some(pixels) = o.row(y) {
            out[o.columns()].copy_from_slice(pixels);
            skip = o.columns();
        }
    }
    grid.raster_row(font, y, out, skip);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::VideoMode;

    const FONT: Font = Font { glyphs: &[], height: 8, first: 0, count: 0 };

    fn config(w: u16, h: u16) -> MediaConfig {
        MediaConfig { source_width: w, source_height: h, ..MediaConfig::default() }
    }

    #[test]
    fn native_doubles_320x240_without_border() {
        let r = Renderer::new(&config(320, 240), FONT);
        assert_eq!(r.x_map(0), 0);
        assert_eq!(r.x_map(1), 0);
        assert_eq!(r.x_map(639), 319);
        assert_eq!(r.y_map(479), 239);
    }

    #[test]
    fn native_centres_on_wider_modes() {
        let mut c = config(320, 240);
        c.mode = VideoMode::Sd720x480;
        let r = Renderer::new(&c, FONT);
        assert_eq!(r.x_map(39), BORDER);
        assert_eq!(r.x_map(40), 0);
        assert_eq!(r.x_map(679), 319);
        assert_eq!(r.x_map(680), BORDER);
    }

    #[test]
    fn aspect_uses_configured_margins() {
        let mut c = config(256, 224);
        c.settings = RenderSettings::new(true, false, Margins { left: 27, top: 16 });
        let r = Renderer::new(&c, FONT);

        // 256 * 16 / 7 = 585 columns, 224 * 2 = 448 lines
        assert_eq!(r.x_map(26), BORDER);
        assert_eq!(r.x_map(27), 0);
        assert_eq!(r.x_map(27 + 584), 255);
        assert_eq!(r.x_map(27 + 585), BORDER);
        assert_eq!(r.y_map(15), BORDER);
        assert_eq!(r.y_map(16), 0);
        assert_eq!(r.y_map(16 + 447), 223);
        assert_eq!(r.y_map(16 + 448), BORDER);
    }

    #[test]
    fn settings_round_trip_through_the_packed_word() {
        let s = RenderSettings::new(true, true, Margins { left: 40, top: 1000 });
        let back = RenderSettings::from_bits(s.bits());
        assert!(back.aspect());
        assert!(back.scanlines());
        assert_eq!(back.margins(), Margins { left: 40, top: 1000 });
    }

    #[test]
    fn blank_source_is_black() {
        let mut r = Renderer::new(&config(320, 240), FONT);
        let mut out = [0xFFFFu16; 640];
        r.render_line(0, Source::Blank, &mut out);
        assert!(out.iter().all(|p| *p == 0));
    }

    #[test]
    fn overlay_outside_the_source_is_turned_away_once() {
        let mut r = Renderer::new(&config(320, 240), FONT);
        let big = Overlay { x: 0, y: 0, width: 400, height: 10, pixels: vec![0; 4000].into(), moving: false };
        let back = r.set_overlay(Some(big.clone()));
        assert_eq!(back, Some(big));
        assert!(r.overlay().is_none());

        let ok = Overlay { x: 300, y: 0, width: 10, height: 10, pixels: vec![0; 100].into(), moving: false };
        assert_eq!(r.set_overlay(Some(ok)), None);
        // moving it past the right edge disables it
        assert!(r.move_overlay(315, 0).is_some());
        assert!(r.overlay().is_none());
        assert_eq!(r.overlay_rejections(), 2);
    }
}
