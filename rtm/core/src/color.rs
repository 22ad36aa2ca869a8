use bitfield::bitfield;

bitfield! {
    /// A 16-bit `RRRRRGGGGGGBBBBB` pixel, the format of every line buffer.
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct Rgb565(u16);
    impl Debug;
    pub u8, blue, set_blue: 4, 0;
    pub u8, green, set_green: 10, 5;
    pub u8, red, set_red: 15, 11;
}

impl Rgb565 {
    pub const BLACK: Rgb565 = Rgb565(0x0000);
    pub const WHITE: Rgb565 = Rgb565(0xFFFF);

    pub const fn from_rgb888(r: u8, g: u8, b: u8) -> Self {
        Rgb565(((r as u16 >> 3) << 11) | ((g as u16 >> 2) << 5) | (b as u16 >> 3))
    }

    /// Expand to 8 bits per channel by replicating the high bits, so that
    /// full-scale channels map to 255.
    #[inline(always)]
    pub fn to_rgb888(self) -> [u8; 3] {
        let (r, g, b) = (self.red(), self.green(), self.blue());
        [(r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2)]
    }

    #[inline(always)]
    pub const fn from_raw(raw: u16) -> Self {
        Rgb565(raw)
    }

    #[inline(always)]
    pub const fn raw(self) -> u16 {
        self.0
    }
}

/// Halve every channel of a packed RGB565 pixel.
///
/// A plain shift drags the low bit of red into green and the low bit of
/// green into blue; the mask drops those.
#[inline(always)]
pub const fn darken(pixel: u16) -> u16 {
    (pixel >> 1) & 0x7BEF
}

/// Text-mode colours, indexed by the 4-bit attributes of a character cell.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Palette(pub [u16; 16]);

impl Palette {
    #[inline(always)]
    pub fn get(&self, index: u8) -> u16 {
        self.0[(index & 0x0F) as usize]
    }
}

impl Default for Palette {
    fn default() -> Self {
        const fn c(r: u8, g: u8, b: u8) -> u16 {
            Rgb565::from_rgb888(r, g, b).raw()
        }

        Palette([
            c(0x00, 0x00, 0x00), c(0x00, 0x00, 0xAA), c(0x00, 0xAA, 0x00), c(0x00, 0xAA, 0xAA),
            c(0xAA, 0x00, 0x00), c(0xAA, 0x00, 0xAA), c(0xAA, 0x55, 0x00), c(0xAA, 0xAA, 0xAA),
            c(0x55, 0x55, 0x55), c(0x55, 0x55, 0xFF), c(0x55, 0xFF, 0x55), c(0x55, 0xFF, 0xFF),
            c(0xFF, 0x55, 0x55), c(0xFF, 0x55, 0xFF), c(0xFF, 0xFF, 0x55), c(0xFF, 0xFF, 0xFF),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn darken_halves_each_channel() {
        for raw in [0xFFFF_u16, 0x8410, 0xF800, 0x07E0, 0x001F, 0x1234, 0xABCD] {
            let p = Rgb565(raw);
            let d = Rgb565(darken(raw));
            assert_eq!(d.red(), p.red() / 2, "red of {raw:#06x}");
            assert_eq!(d.green(), p.green() / 2, "green of {raw:#06x}");
            assert_eq!(d.blue(), p.blue() / 2, "blue of {raw:#06x}");
        }
    }

    #[test]
    fn full_scale_expands_to_255() {
        assert_eq!(Rgb565::WHITE.to_rgb888(), [255, 255, 255]);
        assert_eq!(Rgb565::BLACK.to_rgb888(), [0, 0, 0]);
        assert_eq!(Rgb565::from_rgb888(0xFF, 0x00, 0x00).to_rgb888(), [255, 0, 0]);
    }
}
