use crate::group::GROUP_WIDTH;

/// Triangular probe sequence over the groups of a table.
///
/// Starting at `h1 & mask`, each step jumps one group further than the
/// previous one: offsets advance by `W`, `2W`, `3W`, ... modulo the table
/// size. Because the table size (`mask + 1`) is a power of two, the sequence
/// visits every group exactly once before it would repeat, and the iterator
/// ends after that many groups.
///
/// Offsets are slot indices, not group indices; a group load at any yielded
/// offset reads `GROUP_WIDTH` control bytes, spilling into the mirrored bytes
/// past the sentinel near the end of the table.
#[derive(Clone, Debug)]
pub(crate) struct ProbeSeq {
    mask: usize,
    offset: usize,
    stride: usize,
    remaining: usize,
}

impl ProbeSeq {
    #[inline(always)]
    pub(crate) fn new(h1: usize, mask: usize) -> Self {
        debug_assert!(mask & mask.wrapping_add(1) == 0);
        ProbeSeq {
            mask,
            offset: h1 & mask,
            stride: 0,
            remaining: (mask.wrapping_add(1) / GROUP_WIDTH).max(1),
        }
    }
}

impl Iterator for ProbeSeq {
    type Item = usize;

    #[inline(always)]
    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let current = self.offset;
        self.stride += GROUP_WIDTH;
        self.offset = (self.offset + self.stride) & self.mask;
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

/// Index of the group, counted along `h1`'s probe sequence, that covers
/// slot `index`. Two slots in the same probe group are interchangeable
/// positions for an element with this seed.
#[inline(always)]
pub(crate) fn probe_group_index(h1: usize, mask: usize, index: usize) -> usize {
    (index.wrapping_sub(h1 & mask) & mask) / GROUP_WIDTH
}
