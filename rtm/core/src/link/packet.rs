//! HDMI auxiliary packets: the 3-byte header plus four 7-byte sub-packets
//! that a data island carries.

use bit_field::BitField;
use heapless::Vec;

use crate::audio::AudioSample;
use crate::timing::{PictureAspect, VideoTiming};

pub const TYPE_NULL: u8 = 0x00;
pub const TYPE_ACR: u8 = 0x01;
pub const TYPE_AUDIO_SAMPLE: u8 = 0x02;
pub const TYPE_AVI_INFOFRAME: u8 = 0x82;
pub const TYPE_AUDIO_INFOFRAME: u8 = 0x84;

/// Bit of HB1 carrying the even/odd framing flag of audio sample packets.
pub const FRAMING_BIT: usize = 7;

/// IEC 60958 frames per channel-status block.
pub const FRAMES_PER_BLOCK: u8 = 192;

/// BCH ECC over `bytes`, LSB first, generator `1 + x^6 + x^7 + x^8`.
pub fn ecc(bytes: &[u8]) -> u8 {
    let mut ecc = 0u8;
    for &b in bytes {
        for i in 0..8 {
            let feedback = (ecc ^ (b >> i)) & 1 != 0;
            ecc >>= 1;
            if feedback {
                ecc ^= 0x83;
            }
        }
    }
    ecc
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Packet {
    pub header: [u8; 3],
    pub subpackets: [[u8; 7]; 4],
}

impl Packet {
    pub const fn null() -> Self {
        Packet { header: [TYPE_NULL, 0, 0], subpackets: [[0; 7]; 4] }
    }

    /// Four stereo samples in layout 0.
    ///
    /// `frame` is the IEC 60958 frame number of the first sample; the block
    /// start flag is raised on whichever sub-packet lands on frame 0.
    pub fn audio_sample(samples: &[AudioSample; 4], frame: u8, odd: bool) -> Self {
        let mut header = [TYPE_AUDIO_SAMPLE, 0b0000_1111, 0];
        header[1].set_bit(FRAMING_BIT, odd);

        let mut subpackets = [[0u8; 7]; 4];
        for (i, (sample, sub)) in samples.iter().zip(subpackets.iter_mut()).enumerate() {
            let frame_no = (frame as u16 + i as u16) % FRAMES_PER_BLOCK as u16;
            header[2].set_bit(4 + i, frame_no == 0);
            *sub = Self::sample_subpacket(sample);
        }

        Packet { header, subpackets }
    }

    /// Zero-valued samples that never start a channel-status block.
    pub fn audio_silence(odd: bool) -> Self {
        let mut header = [TYPE_AUDIO_SAMPLE, 0b0000_1111, 0];
        header[1].set_bit(FRAMING_BIT, odd);
        let silent = Self::sample_subpacket(&AudioSample::default());
        Packet { header, subpackets: [silent; 4] }
    }

    fn sample_subpacket(sample: &AudioSample) -> [u8; 7] {
        // 16-bit samples sit in the top of the 24-bit slot
        let l = (sample.left as u16).to_le_bytes();
        let r = (sample.right as u16).to_le_bytes();
        let parity = |s: i16| (s as u16).count_ones() & 1 == 1;

        // V, U and C are all zero, so P is the parity of the sample alone
        let mut flags = 0u8;
        flags.set_bit(3, parity(sample.left));
        flags.set_bit(7, parity(sample.right));

        [0, l[0], l[1], 0, r[0], r[1], flags]
    }

    /// Audio clock regeneration: lets the sink rebuild the sample clock
    /// from the TMDS clock, `fs = f_tmds * N / (128 * CTS)`.
    pub fn acr(n: u32, cts: u32) -> Self {
        let sub = [
            0,
            (cts >> 16) as u8 & 0x0F,
            (cts >> 8) as u8,
            cts as u8,
            (n >> 16) as u8 & 0x0F,
            (n >> 8) as u8,
            n as u8,
        ];
        Packet { header: [TYPE_ACR, 0, 0], subpackets: [sub; 4] }
    }

    /// Recommended N for the common rates, `128 * fs / 1000` otherwise.
    pub fn acr_n(sample_rate: u32) -> u32 {
        match sample_rate {
            32_000 => 4096,
            44_100 => 6272,
            88_200 => 12544,
            176_400 => 25088,
            48_000 => 6144,
            96_000 => 12288,
            192_000 => 24576,
            other => (128 * other + 500) / 1000,
        }
    }

    pub fn acr_for(timing: &VideoTiming, sample_rate: u32) -> Self {
        let n = Self::acr_n(sample_rate);
        let cts = (timing.pixel_clock_hz as u64 * n as u64 / (128 * sample_rate as u64)) as u32;
        Self::acr(n, cts)
    }

    pub fn avi_infoframe(timing: &VideoTiming) -> Self {
        let aspect = match timing.aspect {
            PictureAspect::FourThree => 0b01,
            PictureAspect::SixteenNine => 0b10,
        };

        let mut body: Vec<u8, 13> = Vec::new();
        // PB1: RGB, active format info present, no bar info, no scan info
        let _ = body.push(0b0001_0000);
        // PB2: no colorimetry, picture aspect, active format same as picture
        let _ = body.push(aspect << 4 | 0b1000);
        // PB3: default quantization, no scaling
        let _ = body.push(0);
        let _ = body.push(timing.vic);
        // PB5: no pixel repetition, rest zero
        while body.push(0).is_ok() {}

        Self::infoframe(TYPE_AVI_INFOFRAME, 2, &body)
    }

    pub fn audio_infoframe() -> Self {
        let mut body: Vec<u8, 10> = Vec::new();
        // PB1: coding type from stream, 2 channels
        let _ = body.push(0x01);
        while body.push(0).is_ok() {}

        Self::infoframe(TYPE_AUDIO_INFOFRAME, 1, &body)
    }

    /// Builds an InfoFrame; PB0 is the checksum making header plus body sum
    /// to zero.
    fn infoframe(kind: u8, version: u8, body: &[u8]) -> Self {
        let header = [kind, version, body.len() as u8];

        let sum = header.iter().chain(body).fold(0u8, |acc, &b| acc.wrapping_add(b));
        let mut bytes: Vec<u8, 28> = Vec::new();
        let _ = bytes.push(0u8.wrapping_sub(sum));
        let _ = bytes.extend_from_slice(body);

        let mut subpackets = [[0u8; 7]; 4];
        for (i, b) in bytes.iter().enumerate() {
            subpackets[i / 7][i % 7] = *b;
        }
        Packet { header, subpackets }
    }

    #[inline(always)]
    pub fn framing_odd(&self) -> bool {
        self.header[1].get_bit(FRAMING_BIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn infoframe_sum(p: &Packet) -> u8 {
        let len = p.header[2] as usize + 1;
        let body = p.subpackets.iter().flatten().take(len);
        p.header.iter().chain(body).fold(0u8, |a, &b| a.wrapping_add(b))
    }

    #[test]
    fn ecc_is_linear_and_detects_single_bit_errors() {
        let a = [0x02, 0x0F, 0x10, 0x55, 0xAA, 0x00, 0x7E];
        let b = [0x84, 0x01, 0x0A, 0x33, 0x01, 0xF0, 0x12];
        let x: [u8; 7] = core::array::from_fn(|i| a[i] ^ b[i]);

        assert_eq!(ecc(&[0; 7]), 0);
        assert_eq!(ecc(&x), ecc(&a) ^ ecc(&b));

        for bit in 0..56 {
            let mut flipped = a;
            flipped[bit / 8] ^= 1 << (bit % 8);
            assert_ne!(ecc(&flipped), ecc(&a), "bit {bit}");
        }
    }

    #[test]
    fn infoframes_checksum_to_zero() {
        assert_eq!(infoframe_sum(&Packet::avi_infoframe(&VideoTiming::VGA_640X480)), 0);
        assert_eq!(infoframe_sum(&Packet::audio_infoframe()), 0);
    }

    #[test]
    fn acr_uses_recommended_n() {
        let p = Packet::acr_for(&VideoTiming::VGA_640X480, 48_000);
        let n = (p.subpackets[0][4] as u32) << 16 | (p.subpackets[0][5] as u32) << 8 | p.subpackets[0][6] as u32;
        let cts = (p.subpackets[0][1] as u32) << 16 | (p.subpackets[0][2] as u32) << 8 | p.subpackets[0][3] as u32;
        assert_eq!(n, 6144);
        assert_eq!(cts, 25_200);
    }

    #[test]
    fn block_start_flag_follows_frame_number() {
        let samples = [AudioSample::default(); 4];
        assert_eq!(Packet::audio_sample(&samples, 0, false).header[2], 0b0001_0000);
        assert_eq!(Packet::audio_sample(&samples, 188, false).header[2], 0);
        assert_eq!(Packet::audio_sample(&samples, 190, false).header[2], 0b0100_0000);
        assert!(Packet::audio_sample(&samples, 4, true).framing_odd());
        assert!(!Packet::audio_silence(false).framing_odd());
    }
}
