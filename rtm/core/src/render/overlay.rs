use alloc::boxed::Box;
use core::fmt::{Display, Formatter};
use core::ops::Range;

/// A still or animated image (box art) drawn over a text source, in source
/// coordinates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Overlay {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    /// Row-major RGB565, `width * height` pixels.
    pub pixels: Box<[u16]>,
    /// An animated overlay gets its lines cleared before drawing so that the
    /// previous position does not ghost.
    pub moving: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OverlayError {
    Empty,
    /// Bigger than the source area in either dimension.
    TooLarge { width: u16, height: u16 },
    /// Fits, but extends past the right or bottom edge at its position.
    OutOfBounds { x: u16, y: u16 },
    /// The pixel buffer does not hold `width * height` pixels.
    PixelCount { expected: usize, actual: usize },
}

impl Display for OverlayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            OverlayError::Empty => write!(f, "overlay has no pixels"),
            OverlayError::TooLarge { width, height } => write!(f, "overlay of {width}x{height} is larger than the source"),
            OverlayError::OutOfBounds { x, y } => write!(f, "overlay at ({x}, {y}) extends past the source"),
            OverlayError::PixelCount { expected, actual } => {
                write!(f, "overlay needs {expected} pixels, got {actual}")
            }
        }
    }
}

impl Overlay {
    pub fn validate(&self, src_w: u16, src_h: u16) -> Result<(), OverlayError> {
        if self.width == 0 || self.height == 0 {
            return Err(OverlayError::Empty);
        }
        if self.width > src_w || self.height > src_h {
            return Err(OverlayError::TooLarge { width: self.width, height: self.height });
        }
        if self.x as u32 + self.width as u32 > src_w as u32 || self.y as u32 + self.height as u32 > src_h as u32 {
            return Err(OverlayError::OutOfBounds { x: self.x, y: self.y });
        }
        let expected = self.width as usize * self.height as usize;
        if self.pixels.len() != expected {
            return Err(OverlayError::PixelCount { expected, actual: self.pixels.len() });
        }
        Ok(())
    }

    #[inline(always)]
    pub fn rows(&self) -> Range<usize> {
        self.y as usize..self.y as usize + self.height as usize
    }

    #[inline(always)]
    pub fn columns(&self) -> Range<usize> {
        self.x as usize..self.x as usize + self.width as usize
    }

    /// Source row `y` of the overlay's pixels, if the overlay covers it.
    #[inline(always)]
    pub fn row(&self, y: usize) -> Option<&[u16]> {
        if !self.rows().contains(&y) {
            return None;
        }
        let w = self.width as usize;
        self.pixels.get((y - self.y as usize) * w..)?.get(..w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn overlay(x: u16, y: u16, width: u16, height: u16) -> Overlay {
        Overlay {
            x,
            y,
            width,
            height,
            pixels: vec![0xF800; width as usize * height as usize].into_boxed_slice(),
            moving: false,
        }
    }

    #[test]
    fn rejects_what_does_not_fit() {
        assert_eq!(overlay(0, 0, 320, 240).validate(320, 240), Ok(()));
        assert_eq!(overlay(0, 0, 321, 10).validate(320, 240), Err(OverlayError::TooLarge { width: 321, height: 10 }));
        assert_eq!(overlay(300, 0, 40, 10).validate(320, 240), Err(OverlayError::OutOfBounds { x: 300, y: 0 }));
        assert_eq!(overlay(0, 0, 0, 10).validate(320, 240), Err(OverlayError::Empty));

        let mut short = overlay(0, 0, 4, 4);
        short.pixels = vec![0; 15].into_boxed_slice();
        assert_eq!(short.validate(320, 240), Err(OverlayError::PixelCount { expected: 16, actual: 15 }));
    }

    #[test]
    fn rows_are_offset_by_position() {
        let mut o = overlay(2, 3, 2, 2);
        o.pixels = vec![1, 2, 3, 4].into_boxed_slice();
        assert_eq!(o.row(2), None);
        assert_eq!(o.row(3), Some(&[1u16, 2][..]));
        assert_eq!(o.row(4), Some(&[3u16, 4][..]));
        assert_eq!(o.row(5), None);
    }
}
