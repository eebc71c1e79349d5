//! Read-only serving of files from one allowed directory

pub mod manager;

pub use manager::{FileManager, ServedFile};
