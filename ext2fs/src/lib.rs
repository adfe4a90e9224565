//! The ext2 metadata engine shared by every tool in this workspace.
//!
//! Each binary crate (`dump`, `mkdir`, `cp`, `ln`, `rm`, `restore`, `check`) is a thin
//! argument-parsing shell around the operations exposed here.

pub mod alloc;
pub mod bitmap;
pub mod check;
pub mod dirent;
pub mod error;
#[cfg(test)]
pub mod fixture;
pub mod image;
pub mod layout;
pub mod ops;
pub mod path;

pub use error::Error;
pub use error::Result;
