//! File system helpers: tree walking, file stamps, atomic writes.

pub mod atomic;
pub mod metadata;
pub mod walker;
