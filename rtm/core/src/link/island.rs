use bit_field::BitField;
use bytemuck::{Pod, Zeroable};

use super::packet::{ecc, Packet};
use super::tmds::{lane, terc4_value, word, ISLAND_GUARD, TERC4};

/// Characters in an island: 2 guard, 32 packet, 2 guard.
pub const ISLAND_WORDS: usize = 36;
const GUARD: usize = 2;
const PACKET_CHARS: usize = 32;

/// Sync wire levels an island is encoded for. They ride on lane 0.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SyncLevels {
    pub hsync: bool,
    pub vsync: bool,
}

impl SyncLevels {
    #[inline(always)]
    fn bits(self) -> u8 {
        self.hsync as u8 | (self.vsync as u8) << 1
    }
}

/// A fully encoded data island, ready to be copied into the horizontal
/// blanking of a line.
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, Pod, Zeroable)]
pub struct DataIsland {
    pub words: [u32; ISLAND_WORDS],
}

impl core::fmt::Debug for DataIsland {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DataIsland").field("header", &self.header()).finish()
    }
}

impl Packet {
    pub fn encode(&self, sync: SyncLevels) -> DataIsland {
        let mut header = [0u8; 4];
        header[..3].copy_from_slice(&self.header);
        header[3] = ecc(&self.header);
        let header = u32::from_le_bytes(header);

        let mut subs = [0u64; 4];
        for (sub, bytes) in subs.iter_mut().zip(&self.subpackets) {
            let mut full = [0u8; 8];
            full[..7].copy_from_slice(bytes);
            full[7] = ecc(bytes);
            *sub = u64::from_le_bytes(full);
        }

        let sync_bits = sync.bits();
        let guard = word(TERC4[(0b1100 | sync_bits) as usize], ISLAND_GUARD, ISLAND_GUARD);

        let mut words = [guard; ISLAND_WORDS];
        for c in 0..PACKET_CHARS {
            let mut lane0 = sync_bits;
            lane0.set_bit(2, header.get_bit(c));
            lane0.set_bit(3, c != 0);

            let mut lane1 = 0u8;
            let mut lane2 = 0u8;
            for (i, sub) in subs.iter().enumerate() {
                lane1.set_bit(i, sub.get_bit(2 * c));
                lane2.set_bit(i, sub.get_bit(2 * c + 1));
            }

            words[GUARD + c] = word(
                TERC4[lane0 as usize],
                TERC4[lane1 as usize],
                TERC4[lane2 as usize],
            );
        }

        DataIsland { words }
    }
}

impl DataIsland {
    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    /// Re-encode lane 0 for different sync levels. Used for islands that land
    /// on the vertical sync lines.
    pub fn with_sync(&self, sync: SyncLevels) -> DataIsland {
        let mut out = *self;
        for w in out.words.iter_mut() {
            if let Some(mut v) = terc4_value(lane(*w, 0)) {
                v = (v & 0b1100) | sync.bits();
                *w = word(TERC4[v as usize], lane(*w, 1), lane(*w, 2));
            }
        }
        out
    }

    /// Header bytes (HB0..HB2 and the ECC byte) read back from lane 0.
    pub fn header(&self) -> [u8; 4] {
        let mut header = 0u32;
        for c in 0..PACKET_CHARS {
            let v = terc4_value(lane(self.words[GUARD + c], 0)).unwrap_or(0);
            header.set_bit(c, v.get_bit(2));
        }
        header.to_le_bytes()
    }

    pub fn sync(&self) -> SyncLevels {
        let v = terc4_value(lane(self.words[GUARD], 0)).unwrap_or(0);
        SyncLevels { hsync: v.get_bit(0), vsync: v.get_bit(1) }
    }

    #[inline(always)]
    pub fn framing_odd(&self) -> bool {
        self.header()[1].get_bit(super::packet::FRAMING_BIT)
    }
}
