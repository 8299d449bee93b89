use thiserror::Error;

use sd_core::{AgentId, FacilityId, SiteId};
use sd_spatial::SpatialError;

#[derive(Debug, Error, PartialEq)]
pub enum WorldError {
    #[error("agent {0} not found")]
    AgentNotFound(AgentId),

    #[error("site {0} not found")]
    SiteNotFound(SiteId),

    #[error("facility {0} not found")]
    FacilityNotFound(FacilityId),
}

pub type WorldResult<T> = Result<T, WorldError>;

/// Synchronous rejection of a path request.  Asynchronous failures are
/// reported through [`PathStatus::Failed`](crate::PathStatus::Failed).
#[derive(Debug, Error, PartialEq)]
pub enum PathError {
    #[error("path request has no start or no end position")]
    EmptyRequest,

    #[error("routing failed: {0}")]
    Routing(#[from] SpatialError),
}
