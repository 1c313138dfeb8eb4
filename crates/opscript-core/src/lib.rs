//! Core types for opscript.
//!
//! This crate provides the value types shared by the script builder and the
//! worker: selection snapshots, build configuration, operations, operation
//! scripts and the per-run build state. Nothing here touches the file system.

mod attrs;
mod config;
mod error;
mod mask;
mod operation;
mod paths;
mod script;
mod snapshot;
mod state;

pub use attrs::Attributes;
pub use config::{BuildConfig, BuildConfigBuilder};
pub use error::BuildError;
pub use mask::{apply_mask, is_identity_mask};
pub use operation::{
    COPY_MIN_FILE_WEIGHT, CREATE_DIR_WEIGHT, DELETE_DIR_LINK_WEIGHT, DELETE_DIR_WEIGHT,
    DELETE_FILE_WEIGHT, OpPath, Opcode, Operation, OperationStatus,
};
pub use paths::{LONG_PATH_THRESHOLD, MAX_LONG_PATH, PathStyle, has_long_prefix};
pub use script::{ExecutionPolicy, OperationScript};
pub use snapshot::{
    Action, AttrChange, CaseChange, ConvertTable, SelectionSnapshot, SelectionSnapshotBuilder,
    SnapshotItem, SnapshotOptions,
};
pub use state::BuildState;
