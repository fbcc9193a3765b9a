//! Operations rejected before any filesystem access.

use crate::models::InstanceId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidOperation {
    #[error("Instance '{0}' is active; deactivate it first")]
    InstanceActive(InstanceId),

    #[error("Instance '{0}' is being activated")]
    InstanceBusy(InstanceId),

    #[error("Another activation is already in progress")]
    ActivationInProgress,
}
