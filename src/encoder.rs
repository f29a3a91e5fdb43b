//! Encoder: derives the L intermediate symbols from a complete set of K
//! source symbols exactly once, then emits any source or repair encoding
//! symbol on demand.
//!
//! Grounded on `examples/original_source/.../RaptorQ/v1/Encoder.hpp`'s
//! `Raw_Encoder`: `gen_intermediate_symbols` (always a full, hole-free
//! solve of `G_ENC`-ordered source data, which the RFC guarantees succeeds
//! for K <= 56403) and `encode`. The teacher's `src/fec/encoder.rs` shape
//! (a `set_data`-then-lazily-`precompute` struct, pool-backed output
//! buffers) is followed for the surrounding plumbing.

use crate::encode_symbol;
use crate::error::{RaptorqError, Result};
use crate::matrix::DenseMatrix;
use crate::mempool::SymbolPool;
use crate::params::Parameters;
use crate::precode::PrecodeMatrix;
use crate::solver::{self, SolveOutcome};
use crate::work_state::KeepWorking;

/// Encodes one block of `symbols` source symbols, each `symbol_size` bytes.
pub struct Encoder {
    params: Parameters,
    symbols: u32,
    symbol_size: usize,
    source: DenseMatrix,
    intermediate: Option<DenseMatrix>,
    pool: SymbolPool,
}

impl Encoder {
    /// `symbols` is K; it is looked up against the 477-entry ladder
    /// (`Parameters::new`), so any K up to the ladder's span is accepted.
    pub fn new(symbols: u32, symbol_size: usize) -> Result<Self> {
        if symbols == 0 {
            return Err(RaptorqError::initialization("K must be >= 1"));
        }
        if symbol_size == 0 {
            return Err(RaptorqError::initialization("T must be >= 1"));
        }
        let params = Parameters::new(symbols);
        if params.k_padded > 56403 {
            return Err(RaptorqError::initialization(
                "K exceeds the 56403 encoder ladder limit",
            ));
        }
        log::debug!(
            "Encoder::new symbols={symbols} symbol_size={symbol_size} k_padded={} l={}",
            params.k_padded,
            params.l
        );
        Ok(Encoder {
            params,
            symbols,
            symbol_size,
            source: DenseMatrix::zero(params.k_padded as usize, symbol_size),
            intermediate: None,
            pool: SymbolPool::new(4, symbol_size),
        })
    }

    /// Copies `symbols * symbol_size` bytes from `data` into the source
    /// region; the K'-K zero-pad rows past it stay zero. Invalidates any
    /// previously computed intermediate symbols.
    pub fn set_data<I>(&mut self, data: I) -> Result<()>
    where
        I: IntoIterator<Item = u8>,
    {
        let mut iter = data.into_iter();
        for r in 0..self.symbols as usize {
            let row = self.source.row_mut(r);
            for b in row.iter_mut().take(self.symbol_size) {
                *b = iter
                    .next()
                    .ok_or_else(|| RaptorqError::wrong_input("not enough source bytes"))?;
            }
        }
        self.intermediate = None;
        Ok(())
    }

    /// Synchronously derives C from the current source data. Idempotent.
    pub fn precompute(&mut self) -> Result<()> {
        if self.intermediate.is_some() {
            return Ok(());
        }
        log::trace!("Encoder::precompute solving for L={}", self.params.l);
        let pm = PrecodeMatrix::gen(self.params, 0);
        let l = self.params.l as usize;
        let s = self.params.s as usize;
        let h = self.params.h as usize;
        let mut d = DenseMatrix::zero(l, self.symbol_size);
        for r in 0..self.params.k_padded as usize {
            d.row_mut(s + h + r).copy_from_slice(self.source.row(r));
        }
        let kw = KeepWorking::new();
        let (outcome, _ops) = solver::intermediate(pm.a, &mut d, &self.params, &kw);
        if outcome != SolveOutcome::Done {
            // A full, hole-free set of source symbols always solves for
            // K <= 56403 (RFC 6330 §5.4.2's failure probability bound);
            // reaching here means the precode tables are internally
            // inconsistent, a library invariant violation (§7), not a
            // caller error.
            panic!("encoder precode solve failed: library invariant violated");
        }
        self.intermediate = Some(d);
        Ok(())
    }

    /// Alias for `precompute`; kept distinct in the public API per §6,
    /// though both run synchronously (this crate carries no async runtime).
    pub fn compute(&mut self) -> Result<()> {
        self.precompute()
    }

    /// Writes encoding symbol `id` into `out`, returning the number of
    /// bytes written. `id < K` returns source bytes directly; `id >= K`
    /// generates a repair symbol from the intermediate symbols, computing
    /// them first on demand if `precompute` hasn't run yet.
    pub fn encode(&mut self, id: u32, out: &mut [u8]) -> Result<usize> {
        if id < self.symbols {
            let row = self.source.row(id as usize);
            let n = self.symbol_size.min(out.len());
            out[..n].copy_from_slice(&row[..n]);
            return Ok(n);
        }
        self.precompute()?;
        let isi = id + (self.params.k_padded - self.symbols);
        let c = self
            .intermediate
            .as_ref()
            .expect("precompute populates intermediate");
        let mut buf = self.pool.alloc();
        encode_symbol::encode_symbol(c, &self.params, isi, &mut buf);
        let n = self.symbol_size.min(out.len());
        out[..n].copy_from_slice(&buf[..n]);
        self.pool.free(buf);
        Ok(n)
    }

    /// `2^32 - L`: the largest repair-symbol count before the repair ISI
    /// range would overflow a u32.
    pub fn max_repair(&self) -> u64 {
        (1u64 << 32) - self.params.l as u64
    }

    pub fn symbols(&self) -> u32 {
        self.symbols
    }

    pub fn symbol_size(&self) -> usize {
        self.symbol_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_symbols_round_trip_without_precompute() {
        let mut enc = Encoder::new(4, 8).unwrap();
        let data: Vec<u8> = (0..32u8).collect();
        enc.set_data(data.iter().copied()).unwrap();
        let mut out = vec![0u8; 8];
        enc.encode(2, &mut out).unwrap();
        assert_eq!(out, data[16..24]);
    }

    #[test]
    fn repair_symbol_is_deterministic() {
        let mut enc = Encoder::new(10, 4).unwrap();
        let data: Vec<u8> = (0..40u8).collect();
        enc.set_data(data.iter().copied()).unwrap();
        let mut a = vec![0u8; 4];
        let mut b = vec![0u8; 4];
        enc.encode(10, &mut a).unwrap();
        enc.encode(10, &mut b).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn max_repair_is_bounded_by_l() {
        let enc = Encoder::new(10, 4).unwrap();
        assert_eq!(enc.max_repair(), (1u64 << 32) - enc.params.l as u64);
    }

    #[test]
    fn short_input_is_rejected() {
        let mut enc = Encoder::new(10, 4).unwrap();
        let err = enc.set_data(vec![0u8; 4].into_iter()).unwrap_err();
        assert!(matches!(err, RaptorqError::WrongInput { .. }));
    }
}
