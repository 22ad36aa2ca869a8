//! TMDS symbol coding: 8b/10b video characters, control symbols, TERC4.
//!
//! Symbols are 10 bits, LSB transmitted first. Three lane symbols travel
//! together in one serializer word: `lane0 | lane1 << 10 | lane2 << 20`.

/// Control period symbols, indexed by `c0 | c1 << 1`.
pub const CTRL: [u16; 4] = [0b1101010100, 0b0010101011, 0b0101010100, 0b1010101011];

/// TERC4 data-island symbols, indexed by the 4-bit value they carry.
pub const TERC4: [u16; 16] = [
    0b1010011100, 0b1001100011, 0b1011100100, 0b1011100010,
    0b0101110001, 0b0100011110, 0b0110001110, 0b0100111100,
    0b1011001100, 0b0100111001, 0b0110011100, 0b1011000110,
    0b1010001110, 0b1001110001, 0b0101100011, 0b1011000011,
];

/// Guard band before active video, lanes 0, 1, 2.
pub const VIDEO_GUARD: [u16; 3] = [0b1011001100, 0b0100110011, 0b1011001100];

/// Guard band on lanes 1 and 2 around a data island. Lane 0 carries
/// `TERC4[0b1100 | vsync << 1 | hsync]`.
pub const ISLAND_GUARD: u16 = 0b0100110011;

#[inline(always)]
pub const fn word(lane0: u16, lane1: u16, lane2: u16) -> u32 {
    lane0 as u32 | (lane1 as u32) << 10 | (lane2 as u32) << 20
}

#[inline(always)]
pub const fn lane(word: u32, lane: usize) -> u16 {
    ((word >> (10 * lane)) & 0x3FF) as u16
}

/// Value carried by a TERC4 symbol, if it is one.
pub fn terc4_value(symbol: u16) -> Option<u8> {
    TERC4.iter().position(|&s| s == symbol).map(|v| v as u8)
}

/// One lane's 8b/10b encoder. The running disparity restarts at zero after
/// every control period, so a fresh encoder is used for each active line.
#[derive(Copy, Clone, Debug, Default)]
pub struct TmdsEncoder {
    disparity: i16,
}

impl TmdsEncoder {
    pub const fn new() -> Self {
        Self { disparity: 0 }
    }

    /// Ones minus zeros over everything emitted so far.
    #[inline(always)]
    pub fn disparity(&self) -> i16 {
        self.disparity
    }

    pub fn encode(&mut self, d: u8) -> u16 {
        // stage 1: transition minimisation
        let ones = d.count_ones();
        let use_xnor = ones > 4 || (ones == 4 && d & 1 == 0);

        let mut q_m: u16 = (d & 1) as u16;
        for i in 1..8 {
            let prev = (q_m >> (i - 1)) & 1;
            let bit = ((d >> i) & 1) as u16;
            let next = if use_xnor { !(prev ^ bit) & 1 } else { prev ^ bit };
            q_m |= next << i;
        }
        if !use_xnor {
            q_m |= 1 << 8;
        }

        // stage 2: DC balance
        let q8 = (q_m >> 8) & 1;
        let n1 = (q_m & 0xFF).count_ones() as i16;
        let n0 = 8 - n1;
        let data = q_m & 0xFF;

        if self.disparity == 0 || n1 == n0 {
            if q8 == 1 {
                self.disparity += n1 - n0;
                data | 1 << 8
            } else {
                self.disparity += n0 - n1;
                (!data & 0xFF) | 1 << 9
            }
        } else if (self.disparity > 0 && n1 > n0) || (self.disparity < 0 && n0 > n1) {
            self.disparity += 2 * q8 as i16 + (n0 - n1);
            (!data & 0xFF) | q8 << 8 | 1 << 9
        } else {
            self.disparity += -2 * (1 - q8 as i16) + (n1 - n0);
            data | q8 << 8
        }
    }
}

/// Inverse of [`TmdsEncoder::encode`] for a 10-bit video character.
pub fn decode(symbol: u16) -> u8 {
    let mut q = symbol & 0xFF;
    if symbol & (1 << 9) != 0 {
        q = !q & 0xFF;
    }
    let xor = symbol & (1 << 8) != 0;

    let mut d = (q & 1) as u8;
    for i in 1..8 {
        let cur = (q >> i) & 1;
        let prev = (q >> (i - 1)) & 1;
        let bit = if xor { cur ^ prev } else { !(cur ^ prev) & 1 };
        d |= (bit as u8) << i;
    }
    d
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_byte_survives_encoding() {
        let mut enc = TmdsEncoder::new();
        for d in 0..=255u8 {
            assert_eq!(decode(enc.encode(d)), d);
        }
    }

    #[test]
    fn disparity_tracks_emitted_bits_and_stays_bounded() {
        let mut enc = TmdsEncoder::new();
        let mut balance = 0i32;
        for i in 0..4096u32 {
            let d = (i.wrapping_mul(2_654_435_761) >> 24) as u8;
            let s = enc.encode(d);
            balance += 2 * s.count_ones() as i32 - 10;
            assert_eq!(balance, enc.disparity() as i32);
            assert!(enc.disparity().abs() <= 16);
        }
    }

    #[test]
    fn terc4_symbols_are_distinct() {
        for (v, &s) in TERC4.iter().enumerate() {
            assert_eq!(terc4_value(s), Some(v as u8));
        }
        assert_eq!(terc4_value(CTRL[0]), None);
    }

    #[test]
    fn words_pack_three_lanes() {
        let w = word(CTRL[0], CTRL[1], CTRL[3]);
        assert_eq!(lane(w, 0), CTRL[0]);
        assert_eq!(lane(w, 1), CTRL[1]);
        assert_eq!(lane(w, 2), CTRL[3]);
    }
}
