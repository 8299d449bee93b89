//! Spatial-subsystem error type.

use thiserror::Error;

use sd_core::NodeId;

/// Errors produced by `sd-spatial`.
#[derive(Debug, Error, PartialEq)]
pub enum SpatialError {
    #[error("no route between the requested endpoints")]
    NoRoute,

    #[error("no route within the cost limit {limit}")]
    CostLimitExceeded { limit: u32 },

    #[error("node {0} not found in network")]
    NodeNotFound(NodeId),
}

pub type SpatialResult<T> = Result<T, SpatialError>;
