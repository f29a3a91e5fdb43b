//! Shared decoded-plan cache: a decaying-least-frequency (DLF) store keyed
//! by block shape, so repeated loss patterns across blocks of the same
//! size reuse a previously solved operation log instead of re-running the
//! five-phase solver.
//!
//! Grounded on
//! `examples/original_source/.../Shared_Computation/Decaying_LF.hpp`
//! (`Cache_Key`, `DLF<User_Data, Key>`) and `caches.hpp`/`caches.cpp`
//! (`local_cache_size`). Singleton shape follows the teacher's
//! `lazy_static`/`once_cell` usage elsewhere in the codebase.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Mutex;

use crate::operation::Operation;

/// Mirrors `common.hpp::Compress`. Only `None` and `Lz4` are modeled; the
/// reference enum's bitwise-OR combinators aren't needed since a cached
/// plan is compressed with at most one algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Compress {
    None,
    Lz4,
}

/// Identifies a block shape + loss/repair pattern a cached plan was solved
/// for. Grounded on `Cache_Key`: `mt_size` is `L`, `lost` is the hole
/// count, `repair` is the number of repair symbols used, and the two
/// bitmasks are MSB-first bit vectors of which non-repair/repair indices
/// were missing/present.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CacheKey {
    pub mt_size: u32,
    pub lost: u32,
    pub repair: u32,
    pub lost_bitmask: Vec<bool>,
    pub repair_bitmask: Vec<bool>,
}

/// MSB-first lexicographic comparison of two same-or-different-length bit
/// vectors: shorter-length loses first, then compare from the highest
/// index down to 0.
fn cmp_bitmask(a: &[bool], b: &[bool]) -> Ordering {
    match a.len().cmp(&b.len()) {
        Ordering::Equal => {}
        other => return other,
    }
    for i in (0..a.len()).rev() {
        match a[i].cmp(&b[i]) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

impl Ord for CacheKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.mt_size
            .cmp(&other.mt_size)
            .then_with(|| self.lost.cmp(&other.lost))
            .then_with(|| cmp_bitmask(&self.lost_bitmask, &other.lost_bitmask))
            .then_with(|| cmp_bitmask(&self.repair_bitmask, &other.repair_bitmask))
    }
}

impl PartialOrd for CacheKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A cached plan: the operation log needed to replay a solved elimination
/// against a fresh `D` matrix of the same shape, serialized and optionally
/// LZ4-compressed (`Decaying_LF`'s value type, grounded on
/// `Shared_Computation/LZ4_Wrapper.hpp`).
#[derive(Debug, Clone)]
pub struct CachedPlan {
    payload: Vec<u8>,
    compression: Compress,
}

impl CachedPlan {
    /// Serializes `ops` (length-prefixed, then each `Operation::encode`),
    /// applying LZ4 if `compression` asks for it.
    pub fn encode(ops: &[Operation], compression: Compress) -> Self {
        let mut raw = Vec::with_capacity(4 + ops.iter().map(Operation::size).sum::<usize>());
        raw.extend_from_slice(&(ops.len() as u32).to_le_bytes());
        for op in ops {
            op.encode(&mut raw);
        }
        let payload = match compression {
            Compress::None => raw,
            Compress::Lz4 => lz4_flex::compress_prepend_size(&raw),
        };
        CachedPlan {
            payload,
            compression,
        }
    }

    /// Reverses `encode`, decompressing first if needed.
    pub fn decode(&self) -> Vec<Operation> {
        let raw = match self.compression {
            Compress::None => std::borrow::Cow::Borrowed(&self.payload),
            Compress::Lz4 => std::borrow::Cow::Owned(
                lz4_flex::decompress_size_prepended(&self.payload)
                    .expect("cached plan payload is corrupt"),
            ),
        };
        let count = u32::from_le_bytes(raw[0..4].try_into().unwrap()) as usize;
        let mut ops = Vec::with_capacity(count);
        let mut off = 4;
        for _ in 0..count {
            let (op, consumed) =
                Operation::decode(&raw[off..]).expect("cached plan operation is corrupt");
            off += consumed;
            ops.push(op);
        }
        ops
    }

    pub fn byte_size(&self) -> usize {
        self.payload.len()
    }
}

struct Entry {
    key: CacheKey,
    plan: CachedPlan,
    tick: u64,
    score: u64,
    byte_size: usize,
}

/// Decaying-least-frequency cache, a direct transcription of `DLF`'s
/// scoring/eviction rules.
pub struct PlanCache {
    data: Vec<Entry>,
    global_tick: u64,
    till_overflow: u64,
    max_bytes: usize,
    used_bytes: usize,
}

impl PlanCache {
    fn new(max_bytes: usize) -> Self {
        PlanCache {
            data: Vec::new(),
            global_tick: 0,
            till_overflow: u64::MAX - (1 << 20),
            max_bytes,
            used_bytes: 0,
        }
    }

    fn test_and_reset_scores(&mut self) {
        if self.global_tick != 0 {
            return;
        }
        for e in self.data.iter_mut() {
            let abs_score = e.score.saturating_sub(e.tick);
            e.score = if abs_score > self.till_overflow {
                abs_score - self.till_overflow
            } else {
                0
            };
            e.tick = 0;
        }
    }

    fn update_element(&mut self, idx: usize) {
        self.global_tick = self.global_tick.wrapping_add(1);
        self.test_and_reset_scores();
        let g_tick = self.global_tick;
        let data_len = self.data.len() as u64;
        let e = &mut self.data[idx];
        let tick_diff = g_tick.saturating_sub(e.tick);
        let raw_abs = e.score.saturating_sub(e.tick);
        let abs_score = if raw_abs < tick_diff { 0 } else { raw_abs - tick_diff };
        e.tick = g_tick;
        e.score = e.tick + abs_score + (1 + tick_diff).min(data_len.max(1));
        self.data.sort_by(|a, b| a.score.cmp(&b.score));
    }

    /// Looks up `key`; on a hit, bumps its score and returns a clone of the
    /// cached plan. Returns `None` on a miss, matching `DLF::get`'s
    /// `(Compress::NONE, {})` miss sentinel.
    pub fn get(&mut self, key: &CacheKey) -> Option<CachedPlan> {
        let idx = self.data.iter().position(|e| &e.key == key)?;
        self.update_element(idx);
        let idx = self.data.iter().position(|e| &e.key == key)?;
        Some(self.data[idx].plan.clone())
    }

    /// Inserts or refreshes `key`'s plan. Returns `false` if there was no
    /// room and no evictable entry scored low enough to make room,
    /// matching `DLF::add`'s silent-failure contract.
    pub fn add(&mut self, key: CacheKey, plan: CachedPlan, byte_size: usize) -> bool {
        if let Some(idx) = self.data.iter().position(|e| e.key == key) {
            self.update_element(idx);
            return true;
        }

        while self.used_bytes + byte_size > self.max_bytes && !self.data.is_empty() {
            let tail = &self.data[0];
            let evictable = self.global_tick.saturating_sub(tail.tick)
                > tail.score.saturating_sub(tail.tick);
            if !evictable {
                break;
            }
            let removed = self.data.remove(0);
            self.used_bytes = self.used_bytes.saturating_sub(removed.byte_size);
        }

        if self.used_bytes + byte_size > self.max_bytes {
            return false;
        }

        self.global_tick = self.global_tick.wrapping_add(1);
        self.test_and_reset_scores();
        let entry = Entry {
            key,
            plan,
            tick: self.global_tick,
            score: self.global_tick + self.data.len() as u64,
            byte_size,
        };
        self.data.push(entry);
        self.data.sort_by(|a, b| a.score.cmp(&b.score));
        self.used_bytes += byte_size;
        true
    }

    pub fn resize(&mut self, new_max_bytes: usize) {
        self.max_bytes = new_max_bytes;
        while self.used_bytes > self.max_bytes && !self.data.is_empty() {
            let removed = self.data.remove(0);
            self.used_bytes = self.used_bytes.saturating_sub(removed.byte_size);
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

static GLOBAL_CACHE: once_cell::sync::Lazy<Mutex<PlanCache>> =
    once_cell::sync::Lazy::new(|| Mutex::new(PlanCache::new(16 * 1024 * 1024)));

/// Process-wide plan cache handle, mirroring `caches.hpp`'s free functions
/// over the `DLF` singleton.
pub fn global() -> &'static Mutex<PlanCache> {
    &GLOBAL_CACHE
}

/// `local_cache_size(new_size)`: resizes the process-wide cache and
/// returns the size that was set.
pub fn local_cache_size(new_size: usize) -> usize {
    global().lock().unwrap().resize(new_size);
    new_size
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(mt_size: u32, lost: u32) -> CacheKey {
        CacheKey {
            mt_size,
            lost,
            repair: lost,
            lost_bitmask: vec![true, false, true],
            repair_bitmask: vec![false, true],
        }
    }

    #[test]
    fn bitmask_ordering_is_msb_first() {
        let a = vec![true, false];
        let b = vec![false, true];
        // MSB (index 1) differs first: a has false, b has true at index 1.
        assert_eq!(cmp_bitmask(&a, &b), Ordering::Less);
    }

    #[test]
    fn shorter_bitmask_sorts_first() {
        let a = vec![true];
        let b = vec![true, true];
        assert_eq!(cmp_bitmask(&a, &b), Ordering::Less);
    }

    #[test]
    fn miss_then_hit_round_trips_plan() {
        let mut cache = PlanCache::new(1 << 20);
        let k = key(100, 2);
        assert!(cache.get(&k).is_none());
        let ops = vec![Operation::Div { row: 0, scalar: 1 }];
        let plan = CachedPlan::encode(&ops, Compress::None);
        let byte_size = plan.byte_size();
        assert!(cache.add(k.clone(), plan, byte_size));
        let fetched = cache.get(&k).expect("should hit after add");
        assert_eq!(fetched.decode().len(), 1);
    }

    #[test]
    fn lz4_round_trips_plan() {
        let ops = vec![
            Operation::Swap { row_1: 1, row_2: 2 },
            Operation::Div { row: 3, scalar: 9 },
        ];
        let plan = CachedPlan::encode(&ops, Compress::Lz4);
        let decoded = plan.decode();
        assert_eq!(decoded.len(), 2);
    }

    #[test]
    fn resize_down_evicts_entries() {
        let mut cache = PlanCache::new(1 << 20);
        for i in 0..4u32 {
            let plan = CachedPlan::encode(&[], Compress::None);
            cache.add(key(10 + i, 1), plan, 1024);
        }
        assert_eq!(cache.len(), 4);
        cache.resize(1024);
        assert!(cache.len() <= 1);
    }
}
