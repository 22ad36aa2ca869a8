use core::fmt::{Display, Formatter};

use crate::audio::{RateAccumulator, ISLAND_THRESHOLD};
use crate::render::{AspectRatio, Deployment, RenderSettings, GLYPH_WIDTH};
use crate::timing::VideoMode;
use crate::{MAX_SOURCE_HEIGHT, MAX_SOURCE_WIDTH};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputKind {
    /// TMDS video with audio islands.
    #[default]
    Hdmi,
    /// TMDS video only.
    Dvi,
    /// Analog RGB, audio through a PWM/DAC.
    Vga,
}

impl OutputKind {
    #[inline(always)]
    pub fn has_link_audio(self) -> bool {
        self == OutputKind::Hdmi
    }
}

/// The initial source shown when a session starts.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum SourceKind {
    #[default]
    Text,
    Frame,
    Lines,
    Blank,
}

/// Everything fixed for the length of a session.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MediaConfig {
    pub mode: VideoMode,
    pub output: OutputKind,
    pub deployment: Deployment,
    pub settings: RenderSettings,
    pub aspect: AspectRatio,
    pub source_width: u16,
    pub source_height: u16,
    pub source: SourceKind,
    pub sample_rate: u32,
    pub text_cols: u16,
    pub text_rows: u16,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            mode: VideoMode::default(),
            output: OutputKind::default(),
            deployment: Deployment::default(),
            settings: RenderSettings::default(),
            aspect: AspectRatio::default(),
            source_width: MAX_SOURCE_WIDTH as u16,
            source_height: MAX_SOURCE_HEIGHT as u16,
            source: SourceKind::default(),
            sample_rate: 48_000,
            text_cols: 40,
            text_rows: 30,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    SourceSize { width: u16, height: u16 },
    /// The source does not fit the output at 1:1.
    SourceLargerThanOutput,
    Aspect(AspectRatio),
    /// Margin past the edge of the output.
    Margin { left: u16, top: u16 },
    SampleRate(u32),
    /// More than one audio island per line would be needed.
    SampleRateTooHigh { sample_rate: u32, line_rate: u32 },
    TextGrid { cols: u16, rows: u16 },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            ConfigError::SourceSize { width, height } => {
                write!(f, "source size {width}x{height} outside 1x1..{MAX_SOURCE_WIDTH}x{MAX_SOURCE_HEIGHT}")
            }
            ConfigError::SourceLargerThanOutput => write!(f, "source is larger than the output picture"),
            ConfigError::Aspect(a) => write!(f, "invalid aspect ratio {a:?}"),
            ConfigError::Margin { left, top } => write!(f, "margins ({left}, {top}) are outside the picture"),
            ConfigError::SampleRate(r) => write!(f, "unsupported sample rate {r} Hz"),
            ConfigError::SampleRateTooHigh { sample_rate, line_rate } => {
                write!(f, "{sample_rate} Hz needs more than one audio island per line at {line_rate} lines/s")
            }
            ConfigError::TextGrid { cols, rows } => write!(f, "text grid of {cols}x{rows} cells does not fit the source"),
        }
    }
}

impl MediaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let timing = self.mode.timing();
        let (w, h) = (self.source_width, self.source_height);

        if w == 0 || h == 0 || w as usize > MAX_SOURCE_WIDTH || h as usize > MAX_SOURCE_HEIGHT {
            return Err(ConfigError::SourceSize { width: w, height: h });
        }
        if w > timing.h.active || h > timing.v.active {
            return Err(ConfigError::SourceLargerThanOutput);
        }

        let a = self.aspect;
        if a.h_num == 0 || a.h_den == 0 || a.v_num == 0 || a.v_den == 0 {
            return Err(ConfigError::Aspect(a));
        }

        let m = self.settings.margins();
        if m.left >= timing.h.active || m.top >= timing.v.active {
            return Err(ConfigError::Margin { left: m.left, top: m.top });
        }

        if self.output != OutputKind::Dvi {
            if !(8_000..=192_000).contains(&self.sample_rate) {
                return Err(ConfigError::SampleRate(self.sample_rate));
            }
            let line_rate = timing.line_rate_hz();
            if self.output == OutputKind::Hdmi && RateAccumulator::step_for(self.sample_rate, line_rate) >= ISLAND_THRESHOLD {
                return Err(ConfigError::SampleRateTooHigh { sample_rate: self.sample_rate, line_rate });
            }
        }

        if self.text_cols == 0 || self.text_rows == 0 || self.text_cols as usize * GLYPH_WIDTH > w as usize {
            return Err(ConfigError::TextGrid { cols: self.text_cols, rows: self.text_rows });
        }

        Ok(())
    }
}
