use alloc::boxed::Box;
use alloc::vec;

use rtm_ring::Consumer;

use crate::{LINE_SLOTS, MAX_SOURCE_WIDTH};

/// The double-buffered handoff between the renderer and the transmitter.
///
/// The renderer fills the back slot while the transmitter drains the front
/// one; `publish` swaps them once the line is complete.
pub struct LineSlots {
    slots: [Box<[u16]>; 2],
    write: u8,
}

impl LineSlots {
    pub fn new(width: usize) -> Self {
        Self {
            slots: [vec![0; width].into_boxed_slice(), vec![0; width].into_boxed_slice()],
            write: 0,
        }
    }

    #[inline(always)]
    pub fn back_mut(&mut self) -> &mut [u16] {
        &mut self.slots[self.write as usize]
    }

    /// Hand the back slot to the transmitter.
    #[inline(always)]
    pub fn publish(&mut self) {
        self.write ^= 1;
    }

    /// The most recently published line.
    #[inline(always)]
    pub fn front(&self) -> &[u16] {
        &self.slots[(self.write ^ 1) as usize]
    }

    #[inline(always)]
    pub fn width(&self) -> usize {
        self.slots[0].len()
    }
}

/// One source row handed over by the I/O core.
#[derive(Copy, Clone)]
pub struct SourceLine {
    pub index: u16,
    pub pixels: [u16; MAX_SOURCE_WIDTH],
}

impl SourceLine {
    pub fn new(index: u16, pixels: &[u16]) -> Self {
        let mut line = SourceLine { index, pixels: [0; MAX_SOURCE_WIDTH] };
        let n = pixels.len().min(MAX_SOURCE_WIDTH);
        line.pixels[..n].copy_from_slice(&pixels[..n]);
        line
    }
}

/// Render side of the streaming source.
///
/// Lines arrive in order; the renderer asks for the row it needs. Lines for
/// rows already passed are thrown away, and when the wanted row has not
/// arrived the last good line is shown again.
pub struct LineFeed<'a> {
    queue: Consumer<'a, SourceLine, LINE_SLOTS>,
    height: u16,
    last: Box<SourceLine>,
    repeated: u32,
}

impl<'a> LineFeed<'a> {
    pub fn new(queue: Consumer<'a, SourceLine, LINE_SLOTS>, height: u16) -> Self {
        Self {
            queue,
            height: height.max(1),
            last: Box::new(SourceLine { index: 0, pixels: [0; MAX_SOURCE_WIDTH] }),
            repeated: 0,
        }
    }

    pub fn fetch(&mut self, row: u16) -> &[u16] {
        let h = self.height;
        loop {
            let Some(head) = self.queue.peek() else {
                break;
            };
            // distance back from the wanted row, within one frame
            let behind = (row % h + h - head.index % h) % h;
            if behind == 0 {
                if let Some(line) = self.queue.pop() {
                    *self.last = line;
                }
                return &self.last.pixels;
            }
            if behind > h / 2 {
                // ahead of the beam, keep it for later
                break;
            }
            self.queue.pop();
        }

        if self.last.index != row {
            self.repeated = self.repeated.wrapping_add(1);
        }
        &self.last.pixels
    }

    /// Rows shown from an older line because theirs was missing.
    #[inline(always)]
    pub fn repeated(&self) -> u32 {
        self.repeated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtm_ring::RingBuffer;

    #[test]
    fn slots_swap_on_publish() {
        let mut slots = LineSlots::new(4);
        slots.back_mut().fill(7);
        assert_eq!(slots.front(), &[0; 4]);
        slots.publish();
        assert_eq!(slots.front(), &[7; 4]);
        slots.back_mut().fill(9);
        assert_eq!(slots.front(), &[7; 4]);
    }

    #[test]
    fn feed_takes_matching_row_and_drops_stale_ones() {
        let mut rb = RingBuffer::<SourceLine, LINE_SLOTS>::new();
        let (mut tx, rx) = rb.split();
        let mut feed = LineFeed::new(rx, 240);

        assert!(tx.push(SourceLine::new(0, &[1; 4])).is_ok());
        assert!(tx.push(SourceLine::new(1, &[2; 4])).is_ok());
        assert!(tx.push(SourceLine::new(2, &[3; 4])).is_ok());

        // row 0 was missed, row 1 is taken
        assert_eq!(&feed.fetch(1)[..4], &[2; 4]);
        // row 1 again (line doubling): row 2 is ahead, stays queued
        assert_eq!(&feed.fetch(1)[..4], &[2; 4]);
        assert_eq!(feed.repeated(), 0);
        assert_eq!(&feed.fetch(2)[..4], &[3; 4]);

        // nothing for row 3
        assert_eq!(&feed.fetch(3)[..4], &[3; 4]);
        assert_eq!(feed.repeated(), 1);
    }

    #[test]
    fn feed_wraps_at_the_frame_end() {
        let mut rb = RingBuffer::<SourceLine, LINE_SLOTS>::new();
        let (mut tx, rx) = rb.split();
        let mut feed = LineFeed::new(rx, 240);

        assert!(tx.push(SourceLine::new(239, &[5; 4])).is_ok());
        assert!(tx.push(SourceLine::new(0, &[6; 4])).is_ok());
        assert_eq!(&feed.fetch(0)[..4], &[6; 4]);
    }
}
