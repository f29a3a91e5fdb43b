//! Per-block decoder state machine: accepts source/repair symbols as they
//! arrive, decides when a solve attempt is worthwhile, and hands the
//! result back to callers.
//!
//! Grounded on `examples/original_source/.../Decoder.hpp`'s
//! `Raw_Decoder<In_It>`: the `add_symbol`/`decode` pair, the
//! `can_retry`/`holes`/`received_repair` bookkeeping, and the
//! lock-release-relock pattern around the expensive solve so concurrent
//! `add_symbol` calls aren't blocked by it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::bitmask::Bitmask;
use crate::cache::{self, CacheKey, CachedPlan, Compress};
use crate::error::{RaptorqError, Result};
use crate::matrix::DenseMatrix;
use crate::mempool::SymbolPool;
use crate::params::Parameters;
use crate::precode::PrecodeMatrix;
use crate::solver::{self, SolveOutcome};
use crate::work_state::KeepWorking;

const MAX_ESI: u32 = 1 << 20;

/// Maps a received repair symbol's external ESI to its internal ISI, the
/// same shift `Encoder::encode` uses to generate it in the first place.
fn repair_isi(esi: u32, symbols: u32, k_padded: u32) -> u32 {
    esi + (k_padded - symbols)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeResult {
    Decoded,
    Stopped,
    CanRetry,
    NeedData,
}

struct Inner {
    mask: Bitmask,
    source_symbols: DenseMatrix,
    received_repair: Vec<(u32, Vec<u8>)>,
    can_retry: bool,
    end_of_input: bool,
}

/// Decodes one block: `symbols` source symbols of `symbol_size` bytes
/// each, reconstructed from whatever subset of source/repair symbols
/// arrives.
pub struct BlockDecoder {
    params: Parameters,
    symbols: u32,
    symbol_size: usize,
    keep_working: KeepWorking,
    concurrent: AtomicUsize,
    max_concurrent: AtomicUsize,
    compress: Compress,
    inner: Mutex<Inner>,
}

impl BlockDecoder {
    pub fn new(symbols: u32, symbol_size: usize) -> Self {
        let params = Parameters::new(symbols);
        let k_padded = params.k_padded as usize;
        BlockDecoder {
            params,
            symbols,
            symbol_size,
            keep_working: KeepWorking::new(),
            concurrent: AtomicUsize::new(0),
            max_concurrent: AtomicUsize::new(1),
            compress: Compress::None,
            inner: Mutex::new(Inner {
                mask: Bitmask::new(symbols as usize),
                source_symbols: DenseMatrix::zero(k_padded, symbol_size),
                received_repair: Vec::new(),
                can_retry: false,
                end_of_input: false,
            }),
        }
    }

    pub fn set_max_concurrency(&self, n: usize) {
        self.max_concurrent.store(n.max(1), Ordering::SeqCst);
    }

    pub fn add_concurrent(&self) -> bool {
        let max = self.max_concurrent.load(Ordering::SeqCst);
        let mut cur = self.concurrent.load(Ordering::SeqCst);
        loop {
            if cur >= max {
                return false;
            }
            match self.concurrent.compare_exchange(
                cur,
                cur + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return true,
                Err(seen) => cur = seen,
            }
        }
    }

    pub fn drop_concurrent(&self) {
        self.concurrent.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn has_symbol(&self, esi: u32) -> bool {
        let guard = self.inner.lock().unwrap();
        if esi < self.symbols {
            guard.mask.exists(esi as usize)
        } else {
            guard.received_repair.iter().any(|(e, _)| *e == esi)
        }
    }

    pub fn needed_symbols(&self) -> usize {
        let guard = self.inner.lock().unwrap();
        guard.mask.get_holes().saturating_sub(guard.received_repair.len())
    }

    pub fn can_decode(&self) -> bool {
        let guard = self.inner.lock().unwrap();
        guard.mask.get_holes() == 0 || guard.received_repair.len() >= guard.mask.get_holes()
    }

    pub fn ready(&self) -> bool {
        let guard = self.inner.lock().unwrap();
        guard.mask.get_holes() == 0
    }

    /// Ingests one received symbol. `esi < symbols` is a source symbol;
    /// `esi >= symbols` is a repair symbol, keyed by its distance past the
    /// source range.
    pub fn add_symbol(&self, esi: u32, data: &[u8]) -> Result<()> {
        if esi >= MAX_ESI {
            return Err(RaptorqError::wrong_input("esi exceeds the 2^20 object limit"));
        }
        let mut guard = self.inner.lock().unwrap();
        if guard.mask.get_holes() == 0 {
            return Err(RaptorqError::NotNeeded);
        }
        if esi < self.symbols {
            if guard.mask.exists(esi as usize) {
                return Err(RaptorqError::NotNeeded);
            }
            if data.len() > self.symbol_size {
                return Err(RaptorqError::wrong_input("symbol longer than block symbol size"));
            }
            let row = guard.source_symbols.row_mut(esi as usize);
            row[..data.len()].copy_from_slice(data);
            row[data.len()..].fill(0);
            guard.mask.add(esi as usize);
        } else {
            if guard.received_repair.iter().any(|(e, _)| *e == esi) {
                return Err(RaptorqError::NotNeeded);
            }
            if data.len() != self.symbol_size {
                return Err(RaptorqError::wrong_input("repair symbol size mismatch"));
            }
            let pos = guard
                .received_repair
                .iter()
                .position(|(e, _)| *e > esi)
                .unwrap_or(guard.received_repair.len());
            guard.received_repair.insert(pos, (esi, data.to_vec()));
        }
        if guard.mask.get_holes() <= guard.received_repair.len() {
            guard.can_retry = true;
            log::debug!(
                "block esi={esi} received, holes={} repair={} -> can_retry",
                guard.mask.get_holes(),
                guard.received_repair.len()
            );
        }
        Ok(())
    }

    /// Attempts a solve if enough symbols are present. May release the
    /// block lock for the expensive part of the solve, matching the
    /// teacher's decoder so concurrent `add_symbol` calls aren't blocked.
    pub fn decode(&self) -> Result<DecodeResult> {
        if self.keep_working.is_stopped() {
            log::debug!("decode() called on a stopped block");
            return Err(RaptorqError::Exiting);
        }

        let (key, mut d, overhead, holes, row_isi) = {
            let mut guard = self.inner.lock().unwrap();
            if guard.mask.get_holes() == 0 {
                return Ok(DecodeResult::Decoded);
            }
            if guard.received_repair.len() < guard.mask.get_holes() {
                return Ok(DecodeResult::NeedData);
            }
            if !guard.can_retry {
                return Err(RaptorqError::Working);
            }
            guard.can_retry = false;

            let holes = guard.mask.get_holes();
            let overhead = guard.received_repair.len() - holes;
            let s = self.params.s as usize;
            let h = self.params.h as usize;
            let l = self.params.l as usize;

            let mut d = DenseMatrix::zero(l + overhead, self.symbol_size);
            // Every G_ENC row must match the data actually placed in its D
            // row: present source symbols keep their own ISI, but a
            // missing source symbol's row is replaced wholesale by a
            // received repair symbol's real ISI and bytes (decode_phase0),
            // not left pointing at the (unknown) source ISI.
            let mut row_isi: Vec<u32> = (0..(self.params.k_padded + overhead as u32)).collect();
            for r in 0..(self.params.k_padded as usize) {
                if r < self.symbols as usize {
                    if guard.mask.exists(r) {
                        d.row_mut(s + h + r).copy_from_slice(guard.source_symbols.row(r));
                    }
                } else {
                    d.row_mut(s + h + r).copy_from_slice(guard.source_symbols.row(r));
                }
            }

            let mut lost_bitmask = vec![false; self.symbols as usize];
            let mut repair_used = 0usize;
            for (r, slot) in lost_bitmask.iter_mut().enumerate() {
                let missing = !guard.mask.exists(r);
                *slot = missing;
                if missing {
                    let (esi, bytes) = &guard.received_repair[repair_used];
                    d.row_mut(s + h + r).copy_from_slice(bytes);
                    row_isi[r] = repair_isi(*esi, self.symbols, self.params.k_padded);
                    repair_used += 1;
                }
            }
            for extra in 0..overhead {
                let (esi, bytes) = &guard.received_repair[repair_used + extra];
                d.row_mut(l + extra).copy_from_slice(bytes);
                row_isi[self.params.k_padded as usize + extra] =
                    repair_isi(*esi, self.symbols, self.params.k_padded);
            }

            let repair_bitmask: Vec<bool> = match guard.received_repair.last() {
                Some(&(max_esi, _)) => {
                    let span = (max_esi - self.symbols + 1) as usize;
                    let mut bm = vec![false; span];
                    for (esi, _) in &guard.received_repair {
                        bm[(*esi - self.symbols) as usize] = true;
                    }
                    bm
                }
                None => Vec::new(),
            };

            let key = CacheKey {
                mt_size: l as u32,
                lost: holes as u32,
                repair: guard.received_repair.len() as u32,
                lost_bitmask,
                repair_bitmask,
            };
            (key, d, overhead, holes, row_isi)
        };

        let cached = cache::global().lock().unwrap().get(&key);
        let (outcome, ops) = if let Some(plan) = cached {
            log::trace!("plan cache hit for L={} holes={}", key.mt_size, key.lost);
            let ops = plan.decode();
            for op in &ops {
                op.build(&mut d);
            }
            (SolveOutcome::Done, ops)
        } else {
            log::trace!("plan cache miss for L={} holes={}, solving", key.mt_size, key.lost);
            let pm = PrecodeMatrix::gen_with_isis(self.params, overhead as u32, &row_isi);
            let (outcome, ops) = solver::intermediate(pm.a, &mut d, &self.params, &self.keep_working);
            if outcome == SolveOutcome::Done {
                let plan = CachedPlan::encode(&ops, self.compress);
                let byte_size = plan.byte_size();
                cache::global().lock().unwrap().add(key, plan, byte_size);
            }
            (outcome, ops)
        };
        let _ = ops;

        let mut guard = self.inner.lock().unwrap();
        match outcome {
            SolveOutcome::Stopped => {
                if guard.mask.get_holes() == 0 {
                    Ok(DecodeResult::Decoded)
                } else {
                    Ok(DecodeResult::Stopped)
                }
            }
            SolveOutcome::Failed => {
                log::debug!("solve failed for this received set, holes={holes}");
                if guard.mask.get_holes() <= guard.received_repair.len() {
                    guard.can_retry = true;
                    Ok(DecodeResult::CanRetry)
                } else {
                    Ok(DecodeResult::NeedData)
                }
            }
            SolveOutcome::Done => {
                let s = self.params.s as usize;
                let h = self.params.h as usize;
                for r in 0..self.symbols as usize {
                    if !guard.mask.exists(r) {
                        guard.source_symbols.row_mut(r).copy_from_slice(d.row(s + h + r));
                        guard.mask.add(r);
                    }
                }
                guard.received_repair.clear();
                let _ = holes;
                log::debug!("block decoded, {} source symbols now known", self.symbols);
                Ok(DecodeResult::Decoded)
            }
        }
    }

    /// Reads out symbol `esi`, source or reconstructed, once decoded.
    pub fn read_symbol(&self, esi: u32, out: &mut [u8]) -> Result<()> {
        let guard = self.inner.lock().unwrap();
        if esi >= self.symbols || !guard.mask.exists(esi as usize) {
            return Err(RaptorqError::NeedData);
        }
        let row = guard.source_symbols.row(esi as usize);
        let n = row.len().min(out.len());
        out[..n].copy_from_slice(&row[..n]);
        Ok(())
    }

    /// Ends the input stream: any still-missing source symbols are
    /// zero-filled and reported as not-actually-received, matching
    /// `fill_with_zeros`.
    pub fn fill_with_zeros(&self) -> Vec<bool> {
        self.keep_working.stop();
        let mut guard = self.inner.lock().unwrap();
        let mut received = vec![false; self.symbols as usize];
        for r in 0..self.symbols as usize {
            received[r] = guard.mask.exists(r);
            if !received[r] {
                guard.source_symbols.zero_row(r);
            }
        }
        guard.received_repair.clear();
        guard.end_of_input = true;
        self.keep_working.reset();
        received
    }

    pub fn stop(&self) {
        self.keep_working.stop();
    }

    /// Resets the block for a fresh round of input (same K/symbol size).
    pub fn clear_data(&self) {
        let mut guard = self.inner.lock().unwrap();
        guard.mask.free();
        guard.received_repair.clear();
        guard.can_retry = false;
        guard.end_of_input = false;
        self.keep_working.reset();
    }

    pub fn set_compression(&mut self, compress: Compress) {
        self.compress = compress;
    }

    pub fn symbols(&self) -> u32 {
        self.symbols
    }

    pub fn symbol_size(&self) -> usize {
        self.symbol_size
    }
}

/// How a `Decoder` reports progress to a caller polling it before the whole
/// block is done. Grounded on the teacher's `libraptorq`-style
/// `poll`/`wait_sync` split rather than the lower-level `BlockDecoder`
/// (which only ever reports block-wide outcomes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportMode {
    /// Report source symbols strictly in index order, only once every
    /// symbol before it is also known.
    PartialFromBeginning,
    /// Report any newly-known source symbol, in whatever order it becomes
    /// available.
    PartialAny,
    /// Never report partial progress; only the final outcome.
    Complete,
}

/// The `{error, symbol_index}` shape `poll`/`wait_sync`/`wait` return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollResult {
    pub error: Option<RaptorqError>,
    pub symbol_index: u32,
}

/// Public decoding surface over a `BlockDecoder`: adds incremental-progress
/// reporting and byte-range reads on top of the raw symbol-level API.
pub struct Decoder {
    block: BlockDecoder,
    report_mode: ReportMode,
    reported_through: AtomicUsize,
    reported_any: Mutex<Vec<bool>>,
    pool: SymbolPool,
}

impl Decoder {
    pub fn new(symbols: u32, symbol_size: usize, report_mode: ReportMode) -> Self {
        Decoder {
            reported_any: Mutex::new(vec![false; symbols as usize]),
            block: BlockDecoder::new(symbols, symbol_size),
            report_mode,
            reported_through: AtomicUsize::new(0),
            pool: SymbolPool::new(4, symbol_size),
        }
    }

    pub fn add_symbol(&self, esi: u32, data: &[u8]) -> Result<()> {
        self.block.add_symbol(esi, data)
    }

    pub fn stop(&self) {
        self.block.stop();
    }

    pub fn clear_data(&self) {
        self.block.clear_data();
        self.reported_through.store(0, Ordering::SeqCst);
        let mut reported = self.reported_any.lock().unwrap();
        reported.iter_mut().for_each(|r| *r = false);
    }

    pub fn set_compression(&mut self, compress: Compress) {
        self.block.set_compression(compress);
    }

    pub fn end_of_input(&self) -> Vec<bool> {
        self.block.fill_with_zeros()
    }

    fn next_reportable_index(&self) -> Option<u32> {
        match self.report_mode {
            ReportMode::PartialFromBeginning => {
                let idx = self.reported_through.load(Ordering::SeqCst);
                if idx < self.block.symbols() as usize && self.block.has_symbol(idx as u32) {
                    self.reported_through.store(idx + 1, Ordering::SeqCst);
                    Some(idx as u32)
                } else {
                    None
                }
            }
            ReportMode::PartialAny => {
                let mut reported = self.reported_any.lock().unwrap();
                reported
                    .iter_mut()
                    .enumerate()
                    .find(|(i, seen)| !**seen && self.block.has_symbol(*i as u32))
                    .map(|(i, seen)| {
                        *seen = true;
                        i as u32
                    })
            }
            ReportMode::Complete => None,
        }
    }

    /// Non-blocking: attempts one solve if enough symbols have arrived,
    /// then reports whatever progress `report_mode` calls for.
    pub fn poll(&self) -> PollResult {
        match self.block.decode() {
            Ok(DecodeResult::Decoded) => PollResult {
                error: None,
                symbol_index: self.block.symbols(),
            },
            Ok(DecodeResult::Stopped) => PollResult {
                error: Some(RaptorqError::Exiting),
                symbol_index: 0,
            },
            Ok(DecodeResult::NeedData) | Ok(DecodeResult::CanRetry) => {
                match self.next_reportable_index() {
                    Some(idx) => PollResult {
                        error: None,
                        symbol_index: idx,
                    },
                    None => PollResult {
                        error: Some(RaptorqError::NeedData),
                        symbol_index: 0,
                    },
                }
            }
            Err(e) => PollResult {
                error: Some(e),
                symbol_index: 0,
            },
        }
    }

    /// Blocks the calling thread, retrying the solve until the block
    /// finishes, is stopped, or genuinely needs more symbols than have
    /// arrived so far.
    pub fn wait_sync(&self) -> PollResult {
        loop {
            match self.block.decode() {
                Ok(DecodeResult::Decoded) => {
                    return PollResult {
                        error: None,
                        symbol_index: self.block.symbols(),
                    }
                }
                Ok(DecodeResult::Stopped) => {
                    return PollResult {
                        error: Some(RaptorqError::Exiting),
                        symbol_index: 0,
                    }
                }
                Ok(DecodeResult::NeedData) => {
                    return PollResult {
                        error: Some(RaptorqError::NeedData),
                        symbol_index: 0,
                    }
                }
                Ok(DecodeResult::CanRetry) => continue,
                Err(e) => return PollResult {
                    error: Some(e),
                    symbol_index: 0,
                },
            }
        }
    }

    /// Alias for `wait_sync`; this crate carries no async runtime, so there
    /// is no separate future-based path to offer.
    pub fn wait(&self) -> PollResult {
        self.wait_sync()
    }

    /// Reads `out.len()` bytes of the reconstructed source object starting
    /// at absolute byte offset `from_byte + skip`, stopping early if a
    /// needed symbol isn't decoded yet. Returns `(written, next_from_byte)`.
    pub fn decode_bytes(
        &self,
        out: &mut [u8],
        from_byte: usize,
        skip: usize,
    ) -> Result<(usize, usize)> {
        let symbol_size = self.block.symbol_size();
        if symbol_size == 0 {
            return Ok((0, from_byte));
        }
        let total_bytes = self.block.symbols() as usize * symbol_size;
        let mut written = 0usize;
        let mut byte_pos = from_byte;
        let mut buf = self.pool.alloc();
        while written < out.len() && byte_pos < total_bytes {
            let esi = (byte_pos / symbol_size) as u32;
            let in_symbol = byte_pos % symbol_size;
            let offset = if byte_pos == from_byte {
                in_symbol + skip
            } else {
                in_symbol
            };
            if offset >= symbol_size {
                byte_pos += symbol_size - in_symbol;
                continue;
            }
            if !self.block.has_symbol(esi) {
                break;
            }
            self.block.read_symbol(esi, &mut buf)?;
            let avail = symbol_size - offset;
            let n = avail.min(out.len() - written);
            out[written..written + n].copy_from_slice(&buf[offset..offset + n]);
            written += n;
            byte_pos += n;
        }
        self.pool.free(buf);
        Ok((written, byte_pos))
    }

    /// Reads a single encoding symbol (`esi` must be a source index already
    /// known), returning the number of bytes written.
    pub fn decode_symbol(&self, out: &mut [u8], esi: u32) -> Result<usize> {
        self.block.read_symbol(esi, out)?;
        Ok(self.block.symbol_size().min(out.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::Encoder;

    #[test]
    fn reconstructs_missing_source_symbols_from_arbitrary_repair_esis() {
        let symbols = 8u32;
        let symbol_size = 4usize;
        let mut enc = Encoder::new(symbols, symbol_size).unwrap();
        let data: Vec<u8> = (0..(symbols as usize * symbol_size) as u32)
            .map(|v| v as u8)
            .collect();
        enc.set_data(data.iter().copied()).unwrap();

        let dec = BlockDecoder::new(symbols, symbol_size);
        // Keep only every other source symbol; the rest must come back via
        // repair symbols drawn from high, non-sequential ESIs.
        let present: Vec<u32> = vec![0, 2, 4, 6];
        for &esi in &present {
            let mut buf = vec![0u8; symbol_size];
            enc.encode(esi, &mut buf).unwrap();
            dec.add_symbol(esi, &buf).unwrap();
        }
        let repair_esis: Vec<u32> = vec![symbols + 50, symbols + 51, symbols + 52, symbols + 53];
        for &esi in &repair_esis {
            let mut buf = vec![0u8; symbol_size];
            enc.encode(esi, &mut buf).unwrap();
            dec.add_symbol(esi, &buf).unwrap();
        }

        let result = dec.decode().unwrap();
        assert_eq!(result, DecodeResult::Decoded);
        for esi in 0..symbols {
            let mut out = vec![0u8; symbol_size];
            dec.read_symbol(esi, &mut out).unwrap();
            let expected = &data[(esi as usize * symbol_size)..(esi as usize * symbol_size + symbol_size)];
            assert_eq!(out, expected, "symbol {esi} mismatch after reconstruction");
        }
    }

    #[test]
    fn decode_reports_need_data_before_enough_symbols_arrive() {
        let dec = BlockDecoder::new(10, 8);
        assert_eq!(dec.decode().unwrap(), DecodeResult::NeedData);
    }

    #[test]
    fn full_source_set_decodes_immediately() {
        let dec = BlockDecoder::new(4, 8);
        for esi in 0..4u32 {
            let data = vec![esi as u8; 8];
            dec.add_symbol(esi, &data).unwrap();
        }
        assert_eq!(dec.decode().unwrap(), DecodeResult::Decoded);
        let mut out = vec![0u8; 8];
        dec.read_symbol(2, &mut out).unwrap();
        assert_eq!(out, vec![2u8; 8]);
    }

    #[test]
    fn duplicate_symbol_is_rejected() {
        let dec = BlockDecoder::new(4, 8);
        dec.add_symbol(0, &[1u8; 8]).unwrap();
        assert!(matches!(dec.add_symbol(0, &[2u8; 8]), Err(RaptorqError::NotNeeded)));
    }

    #[test]
    fn oversized_esi_is_rejected() {
        let dec = BlockDecoder::new(4, 8);
        let err = dec.add_symbol(1 << 20, &[0u8; 8]).unwrap_err();
        assert!(matches!(err, RaptorqError::WrongInput { .. }));
    }

    #[test]
    fn fill_with_zeros_reports_which_symbols_were_real() {
        let dec = BlockDecoder::new(4, 8);
        dec.add_symbol(0, &[9u8; 8]).unwrap();
        let received = dec.fill_with_zeros();
        assert_eq!(received, vec![true, false, false, false]);
    }

    #[test]
    fn concurrency_gate_respects_max() {
        let dec = BlockDecoder::new(4, 8);
        dec.set_max_concurrency(1);
        assert!(dec.add_concurrent());
        assert!(!dec.add_concurrent());
        dec.drop_concurrent();
        assert!(dec.add_concurrent());
    }

    #[test]
    fn decoder_wait_sync_reports_full_block() {
        let dec = Decoder::new(4, 8, ReportMode::Complete);
        for esi in 0..4u32 {
            dec.add_symbol(esi, &[esi as u8; 8]).unwrap();
        }
        let result = dec.wait_sync();
        assert_eq!(result.error, None);
        assert_eq!(result.symbol_index, 4);
    }

    #[test]
    fn decoder_partial_from_beginning_reports_in_order() {
        let dec = Decoder::new(4, 8, ReportMode::PartialFromBeginning);
        dec.add_symbol(0, &[0u8; 8]).unwrap();
        dec.add_symbol(1, &[1u8; 8]).unwrap();
        let first = dec.poll();
        assert_eq!(first.symbol_index, 0);
        let second = dec.poll();
        assert_eq!(second.symbol_index, 1);
    }

    #[test]
    fn decoder_decode_bytes_reads_known_range() {
        let dec = Decoder::new(4, 8, ReportMode::Complete);
        for esi in 0..4u32 {
            dec.add_symbol(esi, &[esi as u8; 8]).unwrap();
        }
        dec.wait_sync();
        let mut out = vec![0u8; 16];
        let (written, offset) = dec.decode_bytes(&mut out, 8, 0).unwrap();
        assert_eq!(written, 16);
        assert_eq!(offset, 24);
        assert_eq!(&out[..8], &[1u8; 8]);
        assert_eq!(&out[8..], &[2u8; 8]);
    }
}
