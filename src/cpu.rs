//! Runtime SIMD backend selection for the matrix kernel.
//!
//! Grounded on the teacher's `optimize::FeatureDetector` (`Once`-guarded
//! singleton over a capability set) narrowed to the {avx2, ssse3, none}
//! set the RaptorQ matrix kernel actually dispatches on.

use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuFeature {
    Avx2,
    Ssse3,
    Scalar,
}

fn detect_uncached() -> CpuFeature {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") {
            return CpuFeature::Avx2;
        }
        if is_x86_feature_detected!("ssse3") {
            return CpuFeature::Ssse3;
        }
    }
    CpuFeature::Scalar
}

/// Returns the best SIMD backend available on this host, detected once and
/// cached for the lifetime of the process.
pub fn detect() -> CpuFeature {
    static DETECTED: OnceLock<CpuFeature> = OnceLock::new();
    *DETECTED.get_or_init(detect_uncached)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_is_stable() {
        assert_eq!(detect(), detect());
    }
}
