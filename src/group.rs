//! Group-wide control byte matching.
//!
//! A group is a window of [`GROUP_WIDTH`] consecutive control bytes. Every
//! probe step loads one group and asks a [`GroupMatch`] implementation for a
//! [`BitMask`] of the positions that hold a given tag, are empty, are
//! tombstones, and so on. Bit `i` of a mask refers to byte `i` of the window.
//!
//! Two implementations exist: [`Portable`] compares byte by byte and works
//! everywhere, while the SSE2 implementation answers each query with a single
//! compare and `movemask`. [`GroupKind::detect`] picks one when a table is
//! created.

use cfg_if::cfg_if;

use crate::control::DELETED;
use crate::control::EMPTY;
use crate::control::SENTINEL;

/// Number of control bytes examined per probe step.
pub(crate) const GROUP_WIDTH: usize = 16;

/// Set of positions within a group, one bit per control byte.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct BitMask(pub(crate) u16);

impl BitMask {
    #[inline(always)]
    pub(crate) fn any_bit_set(self) -> bool {
        self.0 != 0
    }

    #[inline(always)]
    pub(crate) fn lowest_set_bit(self) -> Option<usize> {
        if self.0 == 0 {
            None
        } else {
            Some(self.0.trailing_zeros() as usize)
        }
    }

    #[inline(always)]
    pub(crate) fn highest_set_bit(self) -> Option<usize> {
        if self.0 == 0 {
            None
        } else {
            Some(15 - self.0.leading_zeros() as usize)
        }
    }

    /// Number of clear bits below the lowest set bit.
    #[inline(always)]
    pub(crate) fn trailing_zeros(self) -> usize {
        self.0.trailing_zeros() as usize
    }

    /// Number of clear bits above the highest set bit.
    #[inline(always)]
    pub(crate) fn leading_zeros(self) -> usize {
        self.0.leading_zeros() as usize
    }

    /// Keeps only the first `len` positions.
    #[inline(always)]
    pub(crate) fn truncate(self, len: usize) -> Self {
        if len >= GROUP_WIDTH {
            self
        } else {
            BitMask(self.0 & ((1u16 << len) - 1))
        }
    }
}

impl Iterator for BitMask {
    type Item = usize;

    #[inline(always)]
    fn next(&mut self) -> Option<usize> {
        let bit = self.lowest_set_bit()?;
        self.0 &= self.0 - 1;
        Some(bit)
    }
}

/// The byte-matching capability a probe step needs from a group of control
/// bytes.
pub(crate) trait GroupMatch: Copy {
    /// Loads a group starting at `ctrl`.
    ///
    /// # Safety
    ///
    /// `ctrl` must be valid for reads of [`GROUP_WIDTH`] bytes.
    unsafe fn load(ctrl: *const u8) -> Self;

    /// Positions whose byte equals `byte`.
    fn match_byte(self, byte: u8) -> BitMask;

    fn match_empty(self) -> BitMask {
        self.match_byte(EMPTY)
    }

    fn match_deleted(self) -> BitMask {
        self.match_byte(DELETED)
    }

    /// Positions that can receive a new element.
    fn match_empty_or_deleted(self) -> BitMask;

    /// Positions that hold an element.
    fn match_full(self) -> BitMask;
}

/// Byte-at-a-time fallback usable on every target.
#[derive(Clone, Copy)]
pub(crate) struct Portable([u8; GROUP_WIDTH]);

impl GroupMatch for Portable {
    #[inline(always)]
    unsafe fn load(ctrl: *const u8) -> Self {
        // SAFETY: The caller guarantees `GROUP_WIDTH` readable bytes.
        Portable(unsafe { core::ptr::read_unaligned(ctrl as *const [u8; GROUP_WIDTH]) })
    }

    #[inline(always)]
    fn match_byte(self, byte: u8) -> BitMask {
        let mut bits: u16 = 0;
        for i in 0..GROUP_WIDTH {
            if self.0[i] == byte {
                bits |= 1 << i;
            }
        }
        BitMask(bits)
    }

    #[inline(always)]
    fn match_empty_or_deleted(self) -> BitMask {
        let mut bits: u16 = 0;
        for i in 0..GROUP_WIDTH {
            let b = self.0[i];
            if b & 0x80 != 0 && b != SENTINEL {
                bits |= 1 << i;
            }
        }
        BitMask(bits)
    }

    #[inline(always)]
    fn match_full(self) -> BitMask {
        let mut bits: u16 = 0;
        for i in 0..GROUP_WIDTH {
            if self.0[i] & 0x80 == 0 {
                bits |= 1 << i;
            }
        }
        BitMask(bits)
    }
}

cfg_if! {
    if #[cfg(all(
        any(target_arch = "x86", target_arch = "x86_64"),
        target_feature = "sse2",
        not(feature = "portable-group")
    ))] {
        #[cfg(target_arch = "x86")]
        use core::arch::x86 as arch;
        #[cfg(target_arch = "x86_64")]
        use core::arch::x86_64 as arch;

        /// SSE2 matcher: one compare and one `movemask` per query.
        #[derive(Clone, Copy)]
        pub(crate) struct Sse2(arch::__m128i);

        impl GroupMatch for Sse2 {
            #[inline(always)]
            unsafe fn load(ctrl: *const u8) -> Self {
                // SAFETY: The caller guarantees `GROUP_WIDTH` readable bytes,
                // and `loadu` has no alignment requirement.
                Sse2(unsafe { arch::_mm_loadu_si128(ctrl as *const arch::__m128i) })
            }

            #[inline(always)]
            fn match_byte(self, byte: u8) -> BitMask {
                // SAFETY: This impl is only compiled when SSE2 is enabled.
                unsafe {
                    let cmp = arch::_mm_cmpeq_epi8(self.0, arch::_mm_set1_epi8(byte as i8));
                    BitMask(arch::_mm_movemask_epi8(cmp) as u16)
                }
            }

            #[inline(always)]
            fn match_empty_or_deleted(self) -> BitMask {
                // SAFETY: This impl is only compiled when SSE2 is enabled.
                // EMPTY and DELETED are the only bytes below SENTINEL (-1) as
                // signed values.
                unsafe {
                    let special = arch::_mm_set1_epi8(SENTINEL as i8);
                    let cmp = arch::_mm_cmpgt_epi8(special, self.0);
                    BitMask(arch::_mm_movemask_epi8(cmp) as u16)
                }
            }

            #[inline(always)]
            fn match_full(self) -> BitMask {
                // SAFETY: This impl is only compiled when SSE2 is enabled.
                unsafe { BitMask(!(arch::_mm_movemask_epi8(self.0) as u16)) }
            }
        }

        const HAS_SSE2: bool = true;
    } else {
        const HAS_SSE2: bool = false;
    }
}

macro_rules! dispatch {
    ($kind:expr, $ctrl:expr, |$g:ident| $body:expr) => {
        match $kind {
            #[cfg(all(
                any(target_arch = "x86", target_arch = "x86_64"),
                target_feature = "sse2",
                not(feature = "portable-group")
            ))]
            GroupKind::Sse2 => {
                let $g = Sse2::load($ctrl);
                $body
            }
            #[cfg(not(all(
                any(target_arch = "x86", target_arch = "x86_64"),
                target_feature = "sse2",
                not(feature = "portable-group")
            )))]
            GroupKind::Sse2 => {
                let $g = Portable::load($ctrl);
                $body
            }
            GroupKind::Portable => {
                let $g = Portable::load($ctrl);
                $body
            }
        }
    };
}

/// Which [`GroupMatch`] implementation a table probes with.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GroupKind {
    /// Byte-by-byte comparisons.
    Portable,
    /// 128-bit SSE2 comparisons.
    Sse2,
}

impl GroupKind {
    /// Picks the fastest implementation the running CPU supports.
    ///
    /// The SSE2 path is only available when the crate was compiled for an
    /// x86 target with SSE2 enabled and without the `portable-group`
    /// feature; with `std` the CPU is also asked at runtime.
    pub fn detect() -> Self {
        if HAS_SSE2 && cpu_has_sse2() {
            GroupKind::Sse2
        } else {
            GroupKind::Portable
        }
    }

    /// # Safety
    ///
    /// `ctrl` must be valid for reads of [`GROUP_WIDTH`] bytes.
    #[inline(always)]
    pub(crate) unsafe fn match_byte(self, ctrl: *const u8, byte: u8) -> BitMask {
        // SAFETY: Forwarded caller guarantee.
        unsafe { dispatch!(self, ctrl, |g| g.match_byte(byte)) }
    }

    /// # Safety
    ///
    /// `ctrl` must be valid for reads of [`GROUP_WIDTH`] bytes.
    #[inline(always)]
    pub(crate) unsafe fn match_empty(self, ctrl: *const u8) -> BitMask {
        // SAFETY: Forwarded caller guarantee.
        unsafe { dispatch!(self, ctrl, |g| g.match_empty()) }
    }

    /// # Safety
    ///
    /// `ctrl` must be valid for reads of [`GROUP_WIDTH`] bytes.
    #[inline(always)]
    #[cfg_attr(not(any(test, feature = "stats")), allow(dead_code))]
    pub(crate) unsafe fn match_deleted(self, ctrl: *const u8) -> BitMask {
        // SAFETY: Forwarded caller guarantee.
        unsafe { dispatch!(self, ctrl, |g| g.match_deleted()) }
    }

    /// # Safety
    ///
    /// `ctrl` must be valid for reads of [`GROUP_WIDTH`] bytes.
    #[inline(always)]
    pub(crate) unsafe fn match_empty_or_deleted(self, ctrl: *const u8) -> BitMask {
        // SAFETY: Forwarded caller guarantee.
        unsafe { dispatch!(self, ctrl, |g| g.match_empty_or_deleted()) }
    }

    /// # Safety
    ///
    /// `ctrl` must be valid for reads of [`GROUP_WIDTH`] bytes.
    #[inline(always)]
    pub(crate) unsafe fn match_full(self, ctrl: *const u8) -> BitMask {
        // SAFETY: Forwarded caller guarantee.
        unsafe { dispatch!(self, ctrl, |g| g.match_full()) }
    }
}

#[cfg(all(feature = "std", any(target_arch = "x86", target_arch = "x86_64")))]
fn cpu_has_sse2() -> bool {
    std::is_x86_feature_detected!("sse2")
}

#[cfg(not(all(feature = "std", any(target_arch = "x86", target_arch = "x86_64"))))]
fn cpu_has_sse2() -> bool {
    HAS_SSE2
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;

    use rand::Rng;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    fn bits(mask: BitMask) -> Vec<usize> {
        mask.collect()
    }

    fn sample_group() -> [u8; GROUP_WIDTH] {
        let mut group = [EMPTY; GROUP_WIDTH];
        group[1] = 0x12;
        group[3] = DELETED;
        group[4] = 0x12;
        group[7] = SENTINEL;
        group[9] = 0x00;
        group[15] = 0x7F;
        group
    }

    #[test]
    fn bitmask_queries() {
        let mask = BitMask(0b1000_0000_0010_0100);
        assert!(mask.any_bit_set());
        assert_eq!(mask.lowest_set_bit(), Some(2));
        assert_eq!(mask.highest_set_bit(), Some(15));
        assert_eq!(mask.trailing_zeros(), 2);
        assert_eq!(mask.leading_zeros(), 0);
        assert_eq!(bits(mask), vec![2, 5, 15]);
        assert_eq!(bits(mask.truncate(6)), vec![2, 5]);

        let empty = BitMask(0);
        assert!(!empty.any_bit_set());
        assert_eq!(empty.lowest_set_bit(), None);
        assert_eq!(empty.highest_set_bit(), None);
    }

    #[test]
    fn portable_matches() {
        let bytes = sample_group();
        let group = unsafe { Portable::load(bytes.as_ptr()) };

        assert_eq!(bits(group.match_byte(0x12)), vec![1, 4]);
        assert_eq!(bits(group.match_deleted()), vec![3]);
        assert_eq!(
            bits(group.match_empty()),
            vec![0, 2, 5, 6, 8, 10, 11, 12, 13, 14]
        );
        assert_eq!(
            bits(group.match_empty_or_deleted()),
            vec![0, 2, 3, 5, 6, 8, 10, 11, 12, 13, 14]
        );
        assert_eq!(bits(group.match_full()), vec![1, 4, 9, 15]);
    }

    #[test]
    fn sentinel_never_matches() {
        let bytes = [SENTINEL; GROUP_WIDTH];
        for kind in [GroupKind::Portable, GroupKind::detect()] {
            unsafe {
                assert!(!kind.match_empty(bytes.as_ptr()).any_bit_set());
                assert!(!kind.match_empty_or_deleted(bytes.as_ptr()).any_bit_set());
                assert!(!kind.match_full(bytes.as_ptr()).any_bit_set());
                for tag in 0..=0x7Fu8 {
                    assert!(!kind.match_byte(bytes.as_ptr(), tag).any_bit_set());
                }
            }
        }
    }

    #[test]
    fn detected_kind_agrees_with_portable() {
        let detected = GroupKind::detect();
        let mut rng = SmallRng::seed_from_u64(0x5EED);
        let choices = [EMPTY, DELETED, SENTINEL, 0x00, 0x01, 0x3C, 0x7F];

        for _ in 0..2000 {
            let mut bytes = [0u8; GROUP_WIDTH];
            for b in &mut bytes {
                *b = choices[rng.random_range(0..choices.len())];
            }
            let ptr = bytes.as_ptr();
            unsafe {
                assert_eq!(
                    detected.match_empty(ptr),
                    GroupKind::Portable.match_empty(ptr)
                );
                assert_eq!(
                    detected.match_empty_or_deleted(ptr),
                    GroupKind::Portable.match_empty_or_deleted(ptr)
                );
                assert_eq!(
                    detected.match_full(ptr),
                    GroupKind::Portable.match_full(ptr)
                );
                assert_eq!(
                    detected.match_byte(ptr, 0x3C),
                    GroupKind::Portable.match_byte(ptr, 0x3C)
                );
            }
        }
    }

    #[test]
    #[cfg(all(
        any(target_arch = "x86", target_arch = "x86_64"),
        target_feature = "sse2",
        not(feature = "portable-group")
    ))]
    fn detects_sse2() {
        assert_eq!(GroupKind::detect(), GroupKind::Sse2);
    }
}
