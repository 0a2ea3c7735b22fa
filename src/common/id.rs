//! Ring identifiers and the m-bit modular identifier space.
use rand::Rng;
use std::fmt::{self, Display, Formatter};

use crate::{Error, Result};

/// A point in the identifier space. Both node identities and keys live here.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Id(pub u64);

impl Display for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The m-bit modular identifier space `[0, 2^m)` shared by node ids and keys.
///
/// All routing decisions reduce to [IdSpace::in_interval]; everything else
/// here is modular arithmetic around the `2^m` wrap.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct IdSpace {
    bits: u32,
}

impl IdSpace {
    /// Creates an m-bit identifier space. Returns [Error::InvalidBits] unless
    /// `1 <= bits <= 64`.
    pub fn new(bits: u32) -> Result<IdSpace> {
        if bits == 0 || bits > 64 {
            return Err(Error::InvalidBits(bits));
        }

        Ok(IdSpace { bits })
    }

    // === Getters ===

    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Number of finger-table slots per node, one per bit of the space.
    pub fn slots(&self) -> usize {
        self.bits as usize
    }

    // === Public Methods ===

    /// Whether `id` fits in this space.
    pub fn contains(&self, id: Id) -> bool {
        id.0 <= self.mask()
    }

    /// `(id + 1) mod 2^m`, the join-time bootstrap lookup target.
    pub fn next(&self, id: Id) -> Id {
        Id(id.0.wrapping_add(1) & self.mask())
    }

    /// Start of finger slot `slot` for `owner`: `(owner + 2^(slot-1)) mod 2^m`.
    pub fn finger_start(&self, owner: Id, slot: usize) -> Id {
        Id(owner.0.wrapping_add(1u64.wrapping_shl(slot as u32 - 1)) & self.mask())
    }

    /// `(owner - 2^(slot-1)) mod 2^m`: the identifier whose slot-`slot` finger
    /// could point at `owner`. Used to seed the repair walks.
    pub fn finger_mirror(&self, owner: Id, slot: usize) -> Id {
        Id(owner.0.wrapping_sub(1u64.wrapping_shl(slot as u32 - 1)) & self.mask())
    }

    /// True iff `x` lies strictly after `start` and before `end` (at-or-before
    /// when `inclusive_end`), walking clockwise around the modular ring.
    ///
    /// `start >= end` denotes an interval wrapping through zero. `start == end`
    /// denotes the full circle (minus `start` itself).
    pub fn in_interval(&self, x: Id, start: Id, end: Id, inclusive_end: bool) -> bool {
        if start < end {
            x > start && (x < end || (inclusive_end && x == end))
        } else {
            x > start || x < end || (inclusive_end && x == end)
        }
    }

    /// A uniformly random member of the space.
    pub fn random_id(&self) -> Id {
        let mut rng = rand::thread_rng();

        Id(rng.gen::<u64>() & self.mask())
    }

    // === Private Methods ===

    fn mask(&self) -> u64 {
        if self.bits == 64 {
            u64::MAX
        } else {
            (1u64 << self.bits) - 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_bits() {
        assert_eq!(IdSpace::new(0), Err(Error::InvalidBits(0)));
        assert_eq!(IdSpace::new(65), Err(Error::InvalidBits(65)));
        assert!(IdSpace::new(1).is_ok());
        assert!(IdSpace::new(64).is_ok());
    }

    #[test]
    fn contains() {
        let space = IdSpace::new(8).unwrap();

        assert!(space.contains(Id(0)));
        assert!(space.contains(Id(255)));
        assert!(!space.contains(Id(256)));
    }

    #[test]
    fn interval_without_wrap() {
        let space = IdSpace::new(8).unwrap();

        assert!(space.in_interval(Id(5), Id(3), Id(10), false));
        assert!(!space.in_interval(Id(3), Id(3), Id(10), false));
        assert!(!space.in_interval(Id(10), Id(3), Id(10), false));
        assert!(space.in_interval(Id(10), Id(3), Id(10), true));
        assert!(!space.in_interval(Id(11), Id(3), Id(10), true));
    }

    #[test]
    fn interval_with_wrap() {
        let space = IdSpace::new(8).unwrap();

        // (230, 30] wraps through zero.
        assert!(space.in_interval(Id(255), Id(230), Id(30), true));
        assert!(space.in_interval(Id(0), Id(230), Id(30), true));
        assert!(space.in_interval(Id(3), Id(230), Id(30), true));
        assert!(space.in_interval(Id(30), Id(230), Id(30), true));
        assert!(!space.in_interval(Id(30), Id(230), Id(30), false));
        assert!(!space.in_interval(Id(100), Id(230), Id(30), true));
        assert!(!space.in_interval(Id(230), Id(230), Id(30), true));
    }

    #[test]
    fn interval_full_circle() {
        let space = IdSpace::new(8).unwrap();

        // start == end is everything but the start point itself.
        assert!(space.in_interval(Id(0), Id(42), Id(42), true));
        assert!(space.in_interval(Id(41), Id(42), Id(42), false));
        assert!(space.in_interval(Id(43), Id(42), Id(42), false));
        assert!(space.in_interval(Id(42), Id(42), Id(42), true));
        assert!(!space.in_interval(Id(42), Id(42), Id(42), false));
    }

    #[test]
    fn finger_start_wraps() {
        let space = IdSpace::new(8).unwrap();

        assert_eq!(space.finger_start(Id(0), 1), Id(1));
        assert_eq!(space.finger_start(Id(0), 8), Id(128));
        assert_eq!(space.finger_start(Id(230), 8), Id(102));
    }

    #[test]
    fn finger_mirror_wraps() {
        let space = IdSpace::new(8).unwrap();

        assert_eq!(space.finger_mirror(Id(0), 1), Id(255));
        assert_eq!(space.finger_mirror(Id(30), 8), Id(158));
        assert_eq!(space.finger_mirror(Id(128), 8), Id(0));
    }

    #[test]
    fn next_wraps() {
        let space = IdSpace::new(8).unwrap();

        assert_eq!(space.next(Id(0)), Id(1));
        assert_eq!(space.next(Id(255)), Id(0));
    }

    #[test]
    fn full_width_space() {
        let space = IdSpace::new(64).unwrap();

        assert!(space.contains(Id(u64::MAX)));
        assert_eq!(space.next(Id(u64::MAX)), Id(0));
        assert_eq!(space.finger_start(Id(u64::MAX), 1), Id(0));
        assert_eq!(space.finger_mirror(Id(0), 1), Id(u64::MAX));
    }

    #[test]
    fn random_id_stays_in_space() {
        let space = IdSpace::new(4).unwrap();

        for _ in 0..64 {
            assert!(space.contains(space.random_id()));
        }
    }
}
