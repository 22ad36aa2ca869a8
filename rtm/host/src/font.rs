use rtm_core::render::Font;

const FIRST: u8 = 0x20;
const COUNT: u8 = 96;
const HEIGHT: usize = 8;

/// Debug glyphs: an outlined cell with the character code drawn in binary,
/// high nibble on row 2, low nibble on row 4. Space is empty.
const fn build() -> [u8; COUNT as usize * HEIGHT] {
    let mut glyphs = [0u8; COUNT as usize * HEIGHT];
    let mut i = 1;
    while i < COUNT as usize {
        let code = FIRST as usize + i;
        let g = i * HEIGHT;
        glyphs[g] = 0b0111_1110;
        glyphs[g + 1] = 0b0100_0010;
        glyphs[g + 2] = 0b0100_0010 | ((code >> 4) as u8 & 0xF) << 1 & 0b0011_1100;
        glyphs[g + 3] = 0b0100_0010;
        glyphs[g + 4] = 0b0100_0010 | ((code & 0xF) as u8) << 1 & 0b0011_1100;
        glyphs[g + 5] = 0b0100_0010;
        glyphs[g + 6] = 0b0111_1110;
        i += 1;
    }
    glyphs
}

const GLYPHS: [u8; COUNT as usize * HEIGHT] = build();

pub const DEBUG_FONT: Font = Font { glyphs: &GLYPHS, height: HEIGHT as u8, first: FIRST, count: COUNT as u16 };
