//! RFC 6330 RaptorQ forward error correction.
//!
//! A precode-and-LT fountain code: source symbols plus any repair symbols
//! generated past them let a receiver reconstruct the original object from
//! any sufficiently large subset, in any order. This crate implements the
//! block-level machinery (parameter derivation, precode matrix assembly,
//! structured Gaussian elimination, and the symbol generator) plus the
//! ambient stack (config, logging, plan caching, a shared solve pool)
//! around it; object-level packetization and FEC scheduling are left to
//! callers, as they are tied to the transport.

pub mod bitmask;
pub mod cache;
pub mod config;
pub mod cpu;
pub mod decoder;
pub mod encode_symbol;
pub mod encoder;
pub mod error;
pub mod gf256;
pub mod matrix;
pub mod mempool;
pub mod operation;
pub mod params;
pub mod pool;
pub mod precode;
pub mod solver;
mod tables;
pub mod work_state;

pub use cache::{local_cache_size, Compress};
pub use config::RaptorqConfig;
pub use decoder::{BlockDecoder, Decoder, DecodeResult, PollResult, ReportMode};
pub use encoder::Encoder;
pub use error::{RaptorqError, Result};
pub use params::Parameters;
pub use pool::set_thread_pool;
pub use work_state::WorkState;
