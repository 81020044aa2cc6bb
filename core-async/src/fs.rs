//! Async filesystem helpers.
//!
//! Re-exports the subset of `tokio::fs` the workspace touches: token and
//! client-secret files, and the staging copy made for uploads.

pub use tokio::fs::{
    canonicalize, copy, create_dir_all, metadata, read, read_to_string, remove_file, rename,
    set_permissions, try_exists, write, File,
};
