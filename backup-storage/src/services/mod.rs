pub mod digest;
pub mod ingest;
pub mod manifest_watcher;
pub mod retention;
