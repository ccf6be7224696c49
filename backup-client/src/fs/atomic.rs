//! Crash-safe file replacement.

use std::fs;
use std::path::Path;

/// Write `content` next to `path` and rename it into place, so readers never
/// observe a partially written file.
pub fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = Path::new(&temp_name);

    let written = fs::write(temp_path, content).and_then(|()| fs::rename(temp_path, path));
    if written.is_err() {
        let _ = fs::remove_file(temp_path);
    }
    written
}
