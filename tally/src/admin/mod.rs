//! Administrative transport messages.

mod delete_model_snapshot;
pub mod wire;

pub use delete_model_snapshot::{AcknowledgedResponse, DeleteModelSnapshotRequest, ACTION_NAME};
