//! # Partitioning parameters
//!
//! [`PartitionParams`] fixes the two resolutions of the adaptive scheme and the density
//! threshold that decides between them. It is built through [`PartitionParamsBuilder`],
//! which validates every value before any point is processed.
//!
//! | Field               | Default  | Constraint                                    |
//! |---------------------|----------|-----------------------------------------------|
//! | `base_nside`        | 64       | power of two, `1 ≤ nside ≤ 2^14`              |
//! | `fine_nside`        | 256      | power of two, `≤ 2^14`, strictly above base   |
//! | `density_threshold` | 10 000   | non-negative; `0` refines every occupied cell |
//!
//! ## Example
//!
//! ```rust
//! use skypart::partitioning::PartitionParams;
//!
//! let params = PartitionParams::builder()
//!     .base_nside(64)
//!     .fine_nside(256)
//!     .density_threshold(5_000)
//!     .build()
//!     .unwrap();
//! assert_eq!(params.depth_delta(), 2);
//! ```
use std::fmt;

use serde::Deserialize;

use crate::constants::{DEFAULT_DENSITY_THRESHOLD, DEFAULT_NSIDE_BASE, DEFAULT_NSIDE_FINE};
use crate::healpix::Nside;
use crate::skypart_errors::SkyPartError;

/// Validated parameters of the adaptive partitioner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "PartitionParamsBuilder")]
pub struct PartitionParams {
    base_nside: Nside,
    fine_nside: Nside,
    density_threshold: u32,
}

impl PartitionParams {
    /// Create a new [`PartitionParamsBuilder`] initialised with the defaults.
    pub fn builder() -> PartitionParamsBuilder {
        PartitionParamsBuilder::new()
    }

    #[inline]
    pub fn base_nside(&self) -> Nside {
        self.base_nside
    }

    #[inline]
    pub fn fine_nside(&self) -> Nside {
        self.fine_nside
    }

    /// Maximum number of points a base cell may hold and stay unrefined.
    #[inline]
    pub fn density_threshold(&self) -> u32 {
        self.density_threshold
    }

    /// Number of nested levels between the two resolutions (`log2(fine / base)`).
    #[inline]
    pub fn depth_delta(&self) -> u8 {
        self.fine_nside.depth() - self.base_nside.depth()
    }

    /// Number of fine cells inside one base cell.
    #[inline]
    pub fn children_per_cell(&self) -> u64 {
        1 << (2 * self.depth_delta())
    }

    /// `true` when a base cell with `count` points must be refined.
    #[inline]
    pub fn needs_refinement(&self, count: u32) -> bool {
        count > self.density_threshold
    }
}

impl Default for PartitionParams {
    fn default() -> Self {
        PartitionParams {
            base_nside: Nside::DEFAULT_BASE,
            fine_nside: Nside::DEFAULT_FINE,
            density_threshold: DEFAULT_DENSITY_THRESHOLD,
        }
    }
}

impl fmt::Display for PartitionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "nside {} → {} ({} cells → {} cells), refine above {} points",
            self.base_nside,
            self.fine_nside,
            self.base_nside.npix(),
            self.fine_nside.npix(),
            self.density_threshold
        )
    }
}

/// Builder for [`PartitionParams`], with validation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PartitionParamsBuilder {
    base_nside: u32,
    fine_nside: u32,
    density_threshold: i64,
}

impl Default for PartitionParamsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PartitionParamsBuilder {
    pub fn new() -> Self {
        Self {
            base_nside: DEFAULT_NSIDE_BASE,
            fine_nside: DEFAULT_NSIDE_FINE,
            density_threshold: DEFAULT_DENSITY_THRESHOLD as i64,
        }
    }

    pub fn base_nside(mut self, v: u32) -> Self {
        self.base_nside = v;
        self
    }
    pub fn fine_nside(mut self, v: u32) -> Self {
        self.fine_nside = v;
        self
    }
    pub fn density_threshold(mut self, v: u32) -> Self {
        self.density_threshold = v as i64;
        self
    }

    /// Threshold coming from an untyped source; negative values are rejected by
    /// [`PartitionParamsBuilder::build`].
    pub fn density_threshold_signed(mut self, v: i64) -> Self {
        self.density_threshold = v;
        self
    }

    /// Validate and produce the parameters.
    ///
    /// Errors
    /// -----------------
    /// * [`SkyPartError::InvalidConfiguration`] when a resolution is not a power of two in
    ///   `[1, 2^14]`, when `fine_nside ≤ base_nside`, or when the threshold is negative or
    ///   does not fit in 32 bits.
    pub fn build(self) -> Result<PartitionParams, SkyPartError> {
        let base_nside = Nside::new(self.base_nside)?;
        let fine_nside = Nside::new(self.fine_nside)?;

        if fine_nside <= base_nside {
            return Err(SkyPartError::InvalidConfiguration(format!(
                "fine_nside ({fine_nside}) must be greater than base_nside ({base_nside})"
            )));
        }

        let density_threshold = u32::try_from(self.density_threshold).map_err(|_| {
            SkyPartError::InvalidConfiguration(format!(
                "density_threshold must be in [0, {}], got {}",
                u32::MAX,
                self.density_threshold
            ))
        })?;

        Ok(PartitionParams {
            base_nside,
            fine_nside,
            density_threshold,
        })
    }
}

impl TryFrom<PartitionParamsBuilder> for PartitionParams {
    type Error = SkyPartError;

    fn try_from(builder: PartitionParamsBuilder) -> Result<Self, Self::Error> {
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let p = PartitionParams::builder().build().unwrap();
        assert_eq!(p, PartitionParams::default());
        assert_eq!(p.base_nside().get(), 64);
        assert_eq!(p.fine_nside().get(), 256);
        assert_eq!(p.density_threshold(), 10_000);
        assert_eq!(p.children_per_cell(), 16);
    }

    #[test]
    fn test_rejects_bad_resolutions() {
        assert!(PartitionParams::builder().base_nside(0).build().is_err());
        assert!(PartitionParams::builder().base_nside(100).build().is_err());
        assert!(PartitionParams::builder().fine_nside(1 << 15).build().is_err());
        assert!(PartitionParams::builder()
            .base_nside(256)
            .fine_nside(256)
            .build()
            .is_err());
        assert!(PartitionParams::builder()
            .base_nside(256)
            .fine_nside(64)
            .build()
            .is_err());
    }

    #[test]
    fn test_rejects_negative_threshold() {
        let err = PartitionParams::builder()
            .density_threshold_signed(-1)
            .build()
            .unwrap_err();
        assert!(matches!(err, SkyPartError::InvalidConfiguration(_)));
        assert!(PartitionParams::builder()
            .density_threshold_signed(0)
            .build()
            .is_ok());
    }

    #[test]
    fn test_needs_refinement_is_strict() {
        let p = PartitionParams::builder()
            .density_threshold(5)
            .build()
            .unwrap();
        assert!(!p.needs_refinement(5));
        assert!(p.needs_refinement(6));
    }
}
