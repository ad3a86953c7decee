//! # skypart
//!
//! Density-adaptive HEALPix partitioning of sky observations, partition-aware query planning
//! and fault-isolating batch ingestion into a partitioned time-series store.
//!
//! Pipeline
//! -----------------
//! 1. [`observations::csv_reader`] reads records, [`observations::validation`] checks them.
//! 2. [`partitioning::AdaptivePartitioner`] keys every record: base cell where the sky is
//!    sparse, `(base, fine)` composite key where it is dense.
//! 3. [`ingest::IngestRouter`] writes the keyed records group by group into an
//!    [`store::ObservationStore`], dropping only the rows the store refuses.
//! 4. [`query::SkyQuery`] answers nearest, cone and time-window questions by selecting the
//!    few partitions a region can touch.
pub mod config;
pub mod constants;
pub mod coordinates;
pub mod healpix;
pub mod ingest;
pub mod observations;
pub mod partitioning;
pub mod query;
pub mod skypart_errors;
pub mod store;

pub use config::SkyPartConfig;
pub use coordinates::SkyPoint;
pub use ingest::{IngestParams, IngestRouter, IngestSummary};
pub use observations::{KeyedObservation, Observation};
pub use partitioning::{AdaptivePartitioner, PartitionKey, PartitionLayout, PartitionParams};
pub use query::SkyQuery;
pub use skypart_errors::SkyPartError;
pub use store::{MemoryStore, ObservationStore};
