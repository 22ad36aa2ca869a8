use alloc::boxed::Box;
use alloc::vec;

use crate::color::Palette;

/// Glyphs are always 8 pixels wide.
pub const GLYPH_WIDTH: usize = 8;

/// A 1 bit per pixel bitmap font, `height` bytes per glyph, most significant
/// bit on the left.
#[derive(Copy, Clone, Debug)]
pub struct Font {
    pub glyphs: &'static [u8],
    pub height: u8,
    /// Character code of the first glyph.
    pub first: u8,
    pub count: u16,
}

impl Font {
    /// One row of the glyph for `ch`. Characters the font does not cover
    /// render as blank.
    #[inline(always)]
    pub fn row(&self, ch: u8, y: usize) -> u8 {
        let Some(index) = ch.checked_sub(self.first) else {
            return 0;
        };
        if index as u16 >= self.count {
            return 0;
        }
        let h = self.height as usize;
        self.glyphs.get(index as usize * h + y).copied().unwrap_or(0)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Cell {
    pub ch: u8,
    /// Palette indices.
    pub fg: u8,
    pub bg: u8,
}

impl Cell {
    pub const fn new(ch: u8, fg: u8, bg: u8) -> Self {
        Self { ch, fg, bg }
    }
}

/// A character-cell screen, the menu's source image.
///
/// `generation` changes on every publish so that a composed copy of the
/// grid can tell when it went stale.
#[derive(Debug)]
pub struct TextGrid {
    cols: u16,
    rows: u16,
    cells: Box<[Cell]>,
    pub palette: Palette,
    /// Row drawn with foreground and background swapped.
    pub selected: Option<u16>,
    generation: u32,
}

impl TextGrid {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            cols,
            rows,
            cells: vec![Cell::new(b' ', 15, 0); cols as usize * rows as usize].into_boxed_slice(),
            palette: Palette::default(),
            selected: None,
            generation: 0,
        }
    }

    #[inline(always)]
    pub fn cols(&self) -> u16 {
        self.cols
    }

    #[inline(always)]
    pub fn rows(&self) -> u16 {
        self.rows
    }

    #[inline(always)]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub(crate) fn set_generation(&mut self, generation: u32) {
        self.generation = generation;
    }

    pub fn cell(&self, col: u16, row: u16) -> Option<&Cell> {
        if col >= self.cols || row >= self.rows {
            return None;
        }
        self.cells.get(row as usize * self.cols as usize + col as usize)
    }

    pub fn set(&mut self, col: u16, row: u16, cell: Cell) {
        if col >= self.cols || row >= self.rows {
            return;
        }
        self.cells[row as usize * self.cols as usize + col as usize] = cell;
    }

    pub fn clear(&mut self, fg: u8, bg: u8) {
        self.cells.fill(Cell::new(b' ', fg, bg));
    }

    /// Write `text` starting at `col`, clipped at the right edge.
    pub fn print(&mut self, col: u16, row: u16, text: &str, fg: u8, bg: u8) {
        for (i, ch) in text.bytes().enumerate() {
            self.set(col.saturating_add(i as u16), row, Cell::new(ch, fg, bg));
        }
    }

    /// Make this grid a copy of `other`, without reallocating. Both grids
    /// must have the same dimensions.
    pub(crate) fn copy_from(&mut self, other: &TextGrid) {
        self.cells.copy_from_slice(&other.cells);
        self.palette = other.palette;
        self.selected = other.selected;
        self.generation = other.generation;
    }

    /// Rasterize source row `y` into `out`, leaving the pixels in `skip`
    /// untouched. Pixels past the right or bottom edge of the grid are black.
    pub fn raster_row(&self, font: &Font, y: usize, out: &mut [u16], skip: core::ops::Range<usize>) {
        let h = font.height.max(1) as usize;
        let row = y / h;
        let covered = if row < self.rows as usize { (self.cols as usize * GLYPH_WIDTH).min(out.len()) } else { 0 };
        for (x, px) in out.iter_mut().enumerate().skip(covered) {
            if !skip.contains(&x) {
                *px = 0;
            }
        }
        if covered == 0 {
            return;
        }
        let gy = y % h;
        let inverted = self.selected == Some(row as u16);

        let cells = &self.cells[row * self.cols as usize..][..self.cols as usize];
        for (c, cell) in cells.iter().enumerate() {
            let x0 = c * GLYPH_WIDTH;
            if x0 >= out.len() {
                break;
            }

            let (mut fg, mut bg) = (self.palette.get(cell.fg), self.palette.get(cell.bg));
            if inverted {
                core::mem::swap(&mut fg, &mut bg);
            }

            let bits = font.row(cell.ch, gy);
            let end = (x0 + GLYPH_WIDTH).min(out.len());
            for x in x0..end {
                if skip.contains(&x) {
                    continue;
                }
                let lit = bits & (0x80 >> (x - x0)) != 0;
                out[x] = if lit { fg } else { bg };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb565;

    // 'A'..='B', 8 rows each
    const GLYPHS: [u8; 16] = [
        0x18, 0x24, 0x42, 0x7E, 0x42, 0x42, 0x42, 0x00,
        0xFC, 0x42, 0x42, 0x7C, 0x42, 0x42, 0xFC, 0x00,
    ];
    const FONT: Font = Font { glyphs: &GLYPHS, height: 8, first: b'A', count: 2 };

    #[test]
    fn glyph_bits_select_fg_and_bg() {
        let mut grid = TextGrid::new(2, 1);
        grid.print(0, 0, "AB", 15, 0);

        let mut out = [0x1234u16; 16];
        grid.raster_row(&FONT, 0, &mut out, 0..0);

        let white = Rgb565::WHITE.raw();
        // 0x18 = 00011000
        assert_eq!(&out[..8], &[0, 0, 0, white, white, 0, 0, 0]);
        // 0xFC = 11111100
        assert_eq!(&out[8..], &[white, white, white, white, white, white, 0, 0]);
    }

    #[test]
    fn selected_row_is_inverted() {
        let mut grid = TextGrid::new(1, 2);
        grid.selected = Some(1);
        grid.set(0, 1, Cell::new(b' ', 15, 0));

        let mut out = [0u16; 8];
        grid.raster_row(&FONT, 8, &mut out, 0..0);
        assert!(out.iter().all(|p| *p == Rgb565::WHITE.raw()));
    }

    #[test]
    fn skipped_columns_and_unknown_glyphs() {
        let mut grid = TextGrid::new(2, 1);
        grid.print(0, 0, "?B", 15, 4);

        let mut out = [7u16; 16];
        grid.raster_row(&FONT, 0, &mut out, 2..6);

        let bg = grid.palette.get(4);
        assert_eq!(&out[..2], &[bg, bg]);
        assert_eq!(&out[2..6], &[7, 7, 7, 7]);
        assert_eq!(&out[6..8], &[bg, bg]);
    }

    #[test]
    fn outside_the_grid_is_black() {
        let grid = TextGrid::new(1, 1);
        let mut out = [9u16; 12];
        grid.raster_row(&FONT, 8, &mut out, 0..0);
        assert_eq!(out, [0; 12]);

        let mut out = [9u16; 12];
        grid.raster_row(&FONT, 0, &mut out, 0..0);
        assert_eq!(&out[8..], &[0; 4]);

        // the skipped range still wins
        let mut out = [9u16; 12];
        grid.raster_row(&FONT, 8, &mut out, 10..12);
        assert_eq!(&out[..10], &[0; 10]);
        assert_eq!(&out[10..], &[9, 9]);
    }
}
