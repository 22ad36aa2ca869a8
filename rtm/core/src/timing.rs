//! Display timings.
//!
//! Line numbers used throughout the engine count from the first active line:
//! `0..active` is picture, then front porch, sync pulse and back porch. The
//! frame boundary is the first line after the picture.

/// One axis of a video timing, in pixels (horizontal) or lines (vertical).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Axis {
    pub active: u16,
    pub front_porch: u16,
    pub sync: u16,
    pub back_porch: u16,
}

impl Axis {
    #[inline(always)]
    pub const fn total(&self) -> u16 {
        self.active + self.front_porch + self.sync + self.back_porch
    }

    #[inline(always)]
    pub const fn blanking(&self) -> u16 {
        self.total() - self.active
    }

    /// Whether position `p` falls inside the sync pulse.
    #[inline(always)]
    pub const fn in_sync(&self, p: u16) -> bool {
        let start = self.active + self.front_porch;
        p >= start && p < start + self.sync
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PictureAspect {
    FourThree,
    SixteenNine,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VideoTiming {
    pub h: Axis,
    pub v: Axis,
    pub pixel_clock_hz: u32,
    pub h_sync_positive: bool,
    pub v_sync_positive: bool,
    pub aspect: PictureAspect,
    /// CEA-861 video identification code, sent in the AVI InfoFrame.
    pub vic: u8,
}

impl VideoTiming {
    pub const VGA_640X480: VideoTiming = VideoTiming {
        h: Axis { active: 640, front_porch: 16, sync: 96, back_porch: 48 },
        v: Axis { active: 480, front_porch: 10, sync: 2, back_porch: 33 },
        pixel_clock_hz: 25_200_000,
        h_sync_positive: false,
        v_sync_positive: false,
        aspect: PictureAspect::FourThree,
        vic: 1,
    };

    pub const SD_720X480: VideoTiming = VideoTiming {
        h: Axis { active: 720, front_porch: 16, sync: 62, back_porch: 60 },
        v: Axis { active: 480, front_porch: 9, sync: 6, back_porch: 30 },
        pixel_clock_hz: 27_000_000,
        h_sync_positive: false,
        v_sync_positive: false,
        aspect: PictureAspect::FourThree,
        vic: 2,
    };

    #[inline(always)]
    pub const fn line_rate_hz(&self) -> u32 {
        self.pixel_clock_hz / self.h.total() as u32
    }

    #[inline(always)]
    pub const fn pixels_per_frame(&self) -> u32 {
        self.h.total() as u32 * self.v.total() as u32
    }

    /// Level of the vsync wire on `line`.
    #[inline(always)]
    pub const fn vsync_level(&self, line: u16) -> bool {
        self.v.in_sync(line) == self.v_sync_positive
    }

    /// Level of the hsync wire during the horizontal sync pulse, which is
    /// where data islands are placed.
    #[inline(always)]
    pub const fn hsync_pulse_level(&self) -> bool {
        self.h_sync_positive
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum VideoMode {
    #[default]
    Vga640x480,
    Sd720x480,
}

impl VideoMode {
    pub const fn timing(self) -> VideoTiming {
        match self {
            VideoMode::Vga640x480 => VideoTiming::VGA_640X480,
            VideoMode::Sd720x480 => VideoTiming::SD_720X480,
        }
    }
}
