//! # Memory Range Keys
//!
//! Registry keys ordered so that overlapping ranges compare equal.
//!
//! Insertion keys are full allocation ranges while lookups and removals
//! use a one-byte probe. Both go through the same predicate, so an
//! interior address of a tracked range finds (and removes) that range.
//! The ordering is only total over disjoint ranges, which is what the
//! registry stores.

use core::cmp::Ordering;
use core::fmt;

use amtrack_core::MemAddr;

/// Half-open byte range `[base, base + size)`
///
/// Stored as an inclusive last byte so that a range touching the top of
/// the address space stays representable.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemRange {
    base: MemAddr,
    last: MemAddr,
}

impl MemRange {
    /// Create a range
    ///
    /// `None` if `size` is zero or the range runs past the top of the
    /// address space.
    pub fn new(base: MemAddr, size: u64) -> Option<Self> {
        if size == 0 {
            return None;
        }
        let last = base.raw().checked_add(size - 1)?;
        Some(Self {
            base,
            last: MemAddr::new(last),
        })
    }

    /// One-byte probe at `addr`
    pub const fn probe(addr: MemAddr) -> Self {
        Self {
            base: addr,
            last: addr,
        }
    }

    /// First byte
    #[inline]
    pub const fn base(&self) -> MemAddr {
        self.base
    }

    /// Last byte (inclusive)
    #[inline]
    pub const fn last(&self) -> MemAddr {
        self.last
    }

    /// Size in bytes
    #[inline]
    pub fn size(&self) -> u64 {
        (self.last - self.base) + 1
    }

    /// Check if address is in range
    #[inline]
    pub fn contains(&self, addr: MemAddr) -> bool {
        addr >= self.base && addr <= self.last
    }

    /// Check if ranges overlap
    #[inline]
    pub fn overlaps(&self, other: &MemRange) -> bool {
        self.base <= other.last && other.base <= self.last
    }
}

impl Ord for MemRange {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.last < other.base {
            Ordering::Less
        } else if other.last < self.base {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }
}

impl PartialOrd for MemRange {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for MemRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemRange({}...{})", self.base, self.last)
    }
}

impl fmt::Display for MemRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}...{}", self.base, self.last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(base: u64, size: u64) -> MemRange {
        MemRange::new(MemAddr::new(base), size).unwrap()
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(MemRange::new(MemAddr::new(0x1000), 0).is_none());
    }

    #[test]
    fn test_bounds() {
        let r = range(0x1000, 0x1000);
        assert_eq!(r.last(), MemAddr::new(0x1fff));
        assert_eq!(r.size(), 0x1000);
        assert!(r.contains(MemAddr::new(0x1000)));
        assert!(r.contains(MemAddr::new(0x1fff)));
        assert!(!r.contains(MemAddr::new(0x2000)));
        assert!(!r.contains(MemAddr::new(0xfff)));
    }

    #[test]
    fn test_probe_ordering() {
        let r = range(0x1000, 0x100);
        assert_eq!(MemRange::probe(MemAddr::new(0x1080)).cmp(&r), Ordering::Equal);
        assert_eq!(MemRange::probe(MemAddr::new(0x10ff)).cmp(&r), Ordering::Equal);
        assert_eq!(MemRange::probe(MemAddr::new(0x1100)).cmp(&r), Ordering::Greater);
        assert_eq!(MemRange::probe(MemAddr::new(0x0fff)).cmp(&r), Ordering::Less);
    }

    #[test]
    fn test_overlap_is_equality() {
        let a = range(0x1000, 0x100);
        let b = range(0x10f0, 0x100);
        let c = range(0x1100, 0x100);
        assert!(a.overlaps(&b));
        assert_eq!(a.cmp(&b), Ordering::Equal);
        assert!(!a.overlaps(&c));
        assert_eq!(a.cmp(&c), Ordering::Less);
    }

    #[test]
    fn test_top_of_address_space() {
        let r = range(u64::MAX - 0xf, 0x10);
        assert_eq!(r.last(), MemAddr::new(u64::MAX));
        assert_eq!(r.size(), 0x10);
        assert!(r.contains(MemAddr::new(u64::MAX)));
    }

    #[test]
    fn test_wrapping_range_rejected() {
        assert!(MemRange::new(MemAddr::new(u64::MAX - 0xf), 0x11).is_none());
        assert!(MemRange::new(MemAddr::new(u64::MAX - 0xfff), 0x2000).is_none());
        assert!(MemRange::new(MemAddr::new(1), u64::MAX).is_none());
        assert!(MemRange::new(MemAddr::null(), u64::MAX).is_some());
    }
}
