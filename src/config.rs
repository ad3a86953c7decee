//! # Run configuration
//!
//! [`SkyPartConfig`] gathers every tunable of a partition → ingest → query run. It derives
//! [`serde::Deserialize`] with defaults on every section, so a caller can load it from any
//! serde format and only spell out what differs from the production settings:
//!
//! | Section      | Type                 | Validated by                     |
//! |--------------|----------------------|----------------------------------|
//! | `partition`  | [`PartitionParams`]  | [`PartitionParamsBuilder::build`](crate::partitioning::PartitionParamsBuilder::build) |
//! | `ingest`     | [`IngestParams`]     | [`IngestParamsBuilder::build`](crate::ingest::IngestParamsBuilder::build) |
//! | `validation` | [`ValidationRanges`] | –                                |
//! | `store`      | [`StoreConfig`]      | opaque, handed to the store      |
//!
//! Invalid values are rejected while deserializing, before any record is read.
use serde::Deserialize;

use crate::ingest::IngestParams;
use crate::observations::validation::ValidationRanges;
use crate::partitioning::{AdaptivePartitioner, EntityPolicy, PartitionParams};
use crate::store::StoreConfig;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SkyPartConfig {
    pub partition: PartitionParams,
    pub ingest: IngestParams,
    pub validation: ValidationRanges,
    pub store: StoreConfig,
    pub entity_policy: EntityPolicy,
}

impl SkyPartConfig {
    /// Partitioner set up with the partition section and the entity policy.
    pub fn partitioner(&self) -> AdaptivePartitioner {
        AdaptivePartitioner::new(self.partition).with_policy(self.entity_policy)
    }
}
