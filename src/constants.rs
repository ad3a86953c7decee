//! # Constants and type definitions for skypart
//!
//! This module centralizes the **conversion factors**, **tessellation limits** and
//! **common type aliases** used throughout the crate.
//!
//! ## Overview
//!
//! - Unit conversions (degrees ↔ radians)
//! - Limits of the composite partition key layout
//! - Default partitioning / ingestion parameters (taken from the production configuration)
//! - Core type aliases used across the crate

// -------------------------------------------------------------------------------------------------
// Unit conversions
// -------------------------------------------------------------------------------------------------

/// 2π, useful for trigonometric conversions
pub const DPI: f64 = 2. * std::f64::consts::PI;

/// Degrees → radians
pub const RADEG: f64 = std::f64::consts::PI / 180.0;

/// Numerical slack added to angular comparisons (radians)
pub const ANGLE_EPS: f64 = 1e-12;

// -------------------------------------------------------------------------------------------------
// Composite key layout
// -------------------------------------------------------------------------------------------------

/// Bit offset of the base pixel id inside a refined [`PartitionKey`](crate::partitioning::PartitionKey).
pub const KEY_SHIFT: u32 = 32;

/// Mask selecting the fine pixel id (low 32 bits) of a composite key.
pub const FINE_MASK: u64 = (1 << KEY_SHIFT) - 1;

/// Deepest HEALPix order whose pixel count still fits in the low 32 bits of a key
/// (`12 · 4^14 = 3_221_225_472 < 2^32`).
pub const MAX_DEPTH: u8 = 14;

// -------------------------------------------------------------------------------------------------
// Defaults
// -------------------------------------------------------------------------------------------------

/// Default coarse resolution (49 152 cells).
pub const DEFAULT_NSIDE_BASE: u32 = 64;

/// Default refinement resolution (786 432 cells).
pub const DEFAULT_NSIDE_FINE: u32 = 256;

/// Default maximum number of points tolerated in one base cell before refinement.
pub const DEFAULT_DENSITY_THRESHOLD: u32 = 10_000;

/// Default number of rows per insert statement.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Default number of groups between two progress reports.
pub const DEFAULT_PROGRESS_INTERVAL: usize = 100;

/// Columns every observation source must provide.
pub const REQUIRED_COLUMNS: [&str; 6] = ["ts", "ra", "dec", "mag", "jd_tcb", "source_id"];

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Angle in degrees
pub type Degree = f64;
/// Angle in radians
pub type Radian = f64;
/// Nested HEALPix pixel index
pub type PixelId = u64;
/// Identifier of an observed source (the logical entity of the store)
pub type SourceId = i64;
/// Julian date (days)
pub type JulianDate = f64;
