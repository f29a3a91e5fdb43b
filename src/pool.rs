//! Process-wide worker pool the block decoders submit solve jobs to.
//!
//! Grounded on the teacher's `rayon`-backed thread pool plumbing
//! (`optimize.rs`'s use of `rayon::prelude::par_iter_mut` and the
//! app-level `ThreadPoolBuilder` setup); generalized here into an
//! explicit, swappable singleton so `set_thread_pool` (SPEC_FULL §6) can
//! replace it at runtime.

use std::sync::{Arc, Mutex, OnceLock};

use rayon::{ThreadPool, ThreadPoolBuilder};

fn default_pool() -> ThreadPool {
    ThreadPoolBuilder::new()
        .thread_name(|i| format!("raptorq-solve-{i}"))
        .build()
        .expect("failed to build default raptorq thread pool")
}

static POOL: OnceLock<Mutex<Arc<ThreadPool>>> = OnceLock::new();

fn slot() -> &'static Mutex<Arc<ThreadPool>> {
    POOL.get_or_init(|| Mutex::new(Arc::new(default_pool())))
}

/// Replaces the process-wide solve pool, e.g. to size it from
/// `RaptorqConfig::threads` at startup.
pub fn set_thread_pool(threads: usize) {
    let pool = ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("raptorq-solve-{i}"))
        .build()
        .expect("failed to build raptorq thread pool");
    *slot().lock().unwrap() = Arc::new(pool);
}

/// Runs `f` on the shared pool and blocks for its result, matching the
/// teacher's `rayon::scope`-style submission pattern. Only clones the
/// `Arc` under the lock so concurrent `submit` calls (several blocks
/// decoding at once) actually run in parallel instead of serializing on
/// the pool handle itself.
pub fn submit<F, T>(f: F) -> T
where
    F: FnOnce() -> T + Send,
    T: Send,
{
    let pool = slot().lock().unwrap().clone();
    pool.install(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_runs_closure_on_pool() {
        let result = submit(|| 2 + 2);
        assert_eq!(result, 4);
    }

    #[test]
    fn set_thread_pool_replaces_default() {
        set_thread_pool(2);
        let result = submit(|| rayon::current_num_threads());
        assert_eq!(result, 2);
    }
}
