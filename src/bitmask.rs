//! Tracks which non-repair (source) symbols of a block have arrived.
//!
//! Grounded on `examples/original_source/.../util/Bitmask.hpp`: a growable
//! `Vec<bool>` plus a running hole count, rather than the alternate
//! `sizeof(size_t)`-bitpacked `Bitmask.cpp` variant.

/// `true` at index `i` means non-repair symbol `i` has been received (or,
/// for repair-range indices, that the slot has been consumed).
#[derive(Debug, Clone)]
pub struct Bitmask {
    mask: Vec<bool>,
    max_nonrepair: usize,
    holes: usize,
}

impl Bitmask {
    pub fn new(max_nonrepair: usize) -> Self {
        Bitmask {
            mask: Vec::new(),
            max_nonrepair,
            holes: max_nonrepair,
        }
    }

    /// Marks `id` as received. No-op if already set.
    pub fn add(&mut self, id: usize) {
        if id >= self.mask.len() {
            self.mask.resize(id + 1, false);
        }
        if !self.mask[id] {
            self.mask[id] = true;
            if id < self.max_nonrepair && self.holes > 0 {
                self.holes -= 1;
            }
        }
    }

    /// Marks `id` as missing again. No-op if already clear.
    pub fn drop(&mut self, id: usize) {
        if id < self.mask.len() && self.mask[id] {
            self.mask[id] = false;
            if id < self.max_nonrepair {
                self.holes += 1;
            }
        }
    }

    pub fn exists(&self, id: usize) -> bool {
        id < self.mask.len() && self.mask[id]
    }

    pub fn get_holes(&self) -> usize {
        self.holes
    }

    pub fn get_bitmask(&self) -> &[bool] {
        &self.mask
    }

    /// Resets to the all-missing state, as after a block is fully consumed.
    pub fn free(&mut self) {
        self.mask.clear();
        self.holes = self.max_nonrepair;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_decrements_holes_only_within_nonrepair_range() {
        let mut bm = Bitmask::new(4);
        assert_eq!(bm.get_holes(), 4);
        bm.add(0);
        assert_eq!(bm.get_holes(), 3);
        bm.add(0);
        assert_eq!(bm.get_holes(), 3, "re-adding must not double count");
        bm.add(10);
        assert_eq!(bm.get_holes(), 3, "repair-range index doesn't affect holes");
    }

    #[test]
    fn drop_reverses_add() {
        let mut bm = Bitmask::new(4);
        bm.add(1);
        assert!(bm.exists(1));
        bm.drop(1);
        assert!(!bm.exists(1));
        assert_eq!(bm.get_holes(), 4);
    }

    #[test]
    fn free_resets_to_all_missing() {
        let mut bm = Bitmask::new(3);
        bm.add(0);
        bm.add(1);
        bm.free();
        assert_eq!(bm.get_holes(), 3);
        assert!(!bm.exists(0));
    }
}
