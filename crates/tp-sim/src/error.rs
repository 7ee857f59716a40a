use thiserror::Error;

use tp_network::NetworkError;
use tp_stage::StageError;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("simulation configuration error: {0}")]
    Config(String),

    #[error("stage error for agent '{agent}': {source}")]
    Stage {
        agent:  String,
        #[source]
        source: StageError,
    },

    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings parse error: {0}")]
    Settings(#[from] serde_json::Error),
}

pub type SimResult<T> = Result<T, SimError>;
