pub mod archive_history;
