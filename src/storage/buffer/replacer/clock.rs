use parking_lot::Mutex;

use crate::common::types::FrameId;
use crate::storage::buffer::replacer::Replacer;

/// Clock page replacement policy. Each tracked frame carries a reference
/// bit set on unpin; the hand sweeps the frame array clearing set bits
/// until it finds one already clear, which becomes the victim.
pub struct ClockReplacer {
    inner: Mutex<ClockInner>,
}

struct ClockInner {
    // slot per frame id: None = untracked, Some(ref_bit) = tracked
    slots: Vec<Option<bool>>,
    hand: usize,
    tracked: usize,
}

impl ClockReplacer {
    pub fn new(num_pages: usize) -> Self {
        Self {
            inner: Mutex::new(ClockInner {
                slots: vec![None; num_pages],
                hand: 0,
                tracked: 0,
            }),
        }
    }
}

impl Replacer for ClockReplacer {
    fn victim(&self) -> Option<FrameId> {
        let mut inner = self.inner.lock();
        if inner.tracked == 0 {
            return None;
        }
        loop {
            let idx = inner.hand;
            inner.hand = (inner.hand + 1) % inner.slots.len();
            match inner.slots[idx] {
                Some(true) => inner.slots[idx] = Some(false),
                Some(false) => {
                    inner.slots[idx] = None;
                    inner.tracked -= 1;
                    return Some(idx as FrameId);
                }
                None => {}
            }
        }
    }

    fn pin(&self, frame_id: FrameId) {
        let mut inner = self.inner.lock();
        if inner.slots[frame_id as usize].take().is_some() {
            inner.tracked -= 1;
        }
    }

    fn unpin(&self, frame_id: FrameId) {
        let mut inner = self.inner.lock();
        if inner.slots[frame_id as usize].is_none() {
            inner.slots[frame_id as usize] = Some(true);
            inner.tracked += 1;
        }
    }

    fn len(&self) -> usize {
        self.inner.lock().tracked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_clears_reference_bits_before_evicting() {
        let replacer = ClockReplacer::new(3);
        replacer.unpin(0);
        replacer.unpin(1);
        replacer.unpin(2);

        // First sweep clears all three bits, second pass evicts frame 0.
        assert_eq!(replacer.victim(), Some(0));
        assert_eq!(replacer.victim(), Some(1));
        assert_eq!(replacer.victim(), Some(2));
        assert_eq!(replacer.victim(), None);
    }

    #[test]
    fn test_pin_and_duplicate_unpin() {
        let replacer = ClockReplacer::new(4);
        replacer.unpin(1);
        replacer.unpin(1);
        assert_eq!(replacer.len(), 1);

        replacer.pin(1);
        assert_eq!(replacer.len(), 0);
        assert_eq!(replacer.victim(), None);
    }

    #[test]
    fn test_every_tracked_frame_is_eventually_evicted() {
        let replacer = ClockReplacer::new(2);
        replacer.unpin(0);
        assert_eq!(replacer.victim(), Some(0));

        replacer.unpin(0);
        replacer.unpin(1);
        let mut victims = vec![replacer.victim().unwrap(), replacer.victim().unwrap()];
        victims.sort_unstable();
        assert_eq!(victims, vec![0, 1]);
        assert_eq!(replacer.victim(), None);
    }
}
