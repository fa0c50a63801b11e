pub mod codec;
pub mod config;
pub mod dispatch;
pub mod transport;

pub use codec::CodecError;
pub use config::ConfigError;
pub use dispatch::{DispatchError, ListenerError};
pub use transport::TransportError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
