use thiserror::Error;

use sd_core::FacilityId;
use sd_world::WorldError;

#[derive(Debug, Error, PartialEq)]
pub enum DispatchError {
    #[error(transparent)]
    World(#[from] WorldError),

    #[error("no service area for facility {0}")]
    UnknownArea(FacilityId),
}

pub type DispatchResult<T> = Result<T, DispatchError>;
