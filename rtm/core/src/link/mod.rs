//! # HDMI/DVI link coding
//!
//! Everything needed to turn pixels and audio into serializer words:
//!
//! - [`tmds`]: 8b/10b video characters, control symbols, TERC4.
//! - [`packet`]: auxiliary packets (audio samples, clock regeneration,
//!   InfoFrames) and their BCH error correction.
//! - [`island`]: packets laid out over the three lanes with guard bands.
//!
//! Video lines are encoded on the fly; islands are encoded ahead of time,
//! on the I/O core or at session start, so the scanline interrupt only
//! copies them.

pub mod island;
pub mod packet;
pub mod tmds;

pub use island::{DataIsland, SyncLevels, ISLAND_WORDS};
pub use packet::Packet;
pub use tmds::TmdsEncoder;

use crate::color::Rgb565;

/// Encode one active line: the video guard band followed by one word per
/// pixel. `out` must hold `pixels.len() + 2` words.
pub fn encode_video_line(pixels: &[u16], out: &mut [u32]) {
    let [g0, g1, g2] = tmds::VIDEO_GUARD;
    out[0] = tmds::word(g0, g1, g2);
    out[1] = out[0];

    // channel 0 is blue, 1 green, 2 red
    let mut lanes = [TmdsEncoder::new(); 3];
    for (px, w) in pixels.iter().zip(out[2..].iter_mut()) {
        let [r, g, b] = Rgb565::from_raw(*px).to_rgb888();
        *w = tmds::word(lanes[0].encode(b), lanes[1].encode(g), lanes[2].encode(r));
    }
}
