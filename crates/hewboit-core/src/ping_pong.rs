//! Frame-parity double buffering.
//!
//! Two explicitly named slots alternate roles each frame: one is written by
//! this frame's passes, the other holds last frame's result and is only read.
//! Nothing here aliases a single mutable resource.

/// Parity of the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrameParity {
    #[default]
    Even,
    Odd,
}

impl FrameParity {
    pub fn flip(self) -> Self {
        match self {
            FrameParity::Even => FrameParity::Odd,
            FrameParity::Odd => FrameParity::Even,
        }
    }

    /// 0 for even frames, 1 for odd frames.
    pub fn index(self) -> usize {
        match self {
            FrameParity::Even => 0,
            FrameParity::Odd => 1,
        }
    }
}

/// A pair of resources selected by frame parity.
///
/// Even frames write `slot_a` and read `slot_b`; odd frames the reverse.
#[derive(Debug, Clone, Default)]
pub struct PingPong<T> {
    pub slot_a: T,
    pub slot_b: T,
}

impl<T> PingPong<T> {
    pub fn new(slot_a: T, slot_b: T) -> Self {
        Self { slot_a, slot_b }
    }

    /// Build both slots with the same constructor.
    pub fn from_fn(mut make: impl FnMut() -> T) -> Self {
        let slot_a = make();
        let slot_b = make();
        Self { slot_a, slot_b }
    }

    /// The slot this frame writes.
    pub fn write_slot(&self, parity: FrameParity) -> &T {
        match parity {
            FrameParity::Even => &self.slot_a,
            FrameParity::Odd => &self.slot_b,
        }
    }

    /// The slot holding last frame's result.
    pub fn read_slot(&self, parity: FrameParity) -> &T {
        match parity {
            FrameParity::Even => &self.slot_b,
            FrameParity::Odd => &self.slot_a,
        }
    }

    pub fn write_slot_mut(&mut self, parity: FrameParity) -> &mut T {
        match parity {
            FrameParity::Even => &mut self.slot_a,
            FrameParity::Odd => &mut self.slot_b,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parity_flip() {
        assert_eq!(FrameParity::Even.flip(), FrameParity::Odd);
        assert_eq!(FrameParity::Odd.flip().flip(), FrameParity::Odd);
    }

    #[test]
    fn test_read_and_write_never_alias() {
        let pp = PingPong::new("a", "b");
        for parity in [FrameParity::Even, FrameParity::Odd] {
            assert_ne!(pp.read_slot(parity), pp.write_slot(parity));
        }
    }

    #[test]
    fn test_last_write_becomes_next_read() {
        let mut pp = PingPong::new(0u32, 0u32);
        let mut parity = FrameParity::Even;
        for frame in 1..=4u32 {
            *pp.write_slot_mut(parity) = frame;
            parity = parity.flip();
            assert_eq!(*pp.read_slot(parity), frame);
        }
    }
}
