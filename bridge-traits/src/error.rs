use thiserror::Error;

use crate::player::NativeItemId;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Native item {0} is not known to the player")]
    UnknownItem(NativeItemId),

    #[error("Native item {0} is already enqueued")]
    AlreadyEnqueued(NativeItemId),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
