use sd_core::CoreError;
use sd_dispatch::DispatchError;
use sd_world::WorldError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("orchestrator configuration error: {0}")]
    Config(String),

    #[error("policy file error: {0}")]
    Policy(#[from] CoreError),

    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("world error: {0}")]
    World(#[from] WorldError),
}

pub type SimResult<T> = Result<T, SimError>;
