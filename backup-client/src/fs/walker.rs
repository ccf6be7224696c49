//! Directory traversal for snapshot building.
//!
//! One pass over the tree collects every subdirectory and every file (with
//! its stamp). Symbolic links are not followed; a link is recorded as a file
//! carrying its own metadata.

use super::metadata::FileStamp;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

/// Information about a file discovered during walking
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// Relative path from the root, `/`-separated
    pub relative_path: String,

    /// Size and modification time
    pub stamp: FileStamp,
}

/// Everything found below a root directory
#[derive(Debug, Clone, Default)]
pub struct TreeListing {
    /// Relative subdirectory paths, sorted
    pub subdirs: Vec<String>,

    /// Files sorted by relative path
    pub files: Vec<FileInfo>,
}

/// Walk a directory tree and collect all subdirectories and files
///
/// # Arguments
/// * `root` - Root directory to start walking from
///
/// # Returns
/// * `Ok(TreeListing)` - Sorted subdirectories and files
/// * `Err(io::Error)` - If any entry cannot be read during the walk
///
/// # Example
/// ```no_run
/// use backup_client::fs::walker::walk_tree;
/// use std::path::Path;
///
/// let listing = walk_tree(Path::new("/data")).unwrap();
/// println!("Found {} files", listing.files.len());
/// ```
pub fn walk_tree(root: &Path) -> std::io::Result<TreeListing> {
    let mut listing = TreeListing::default();

    for entry in WalkDir::new(root).follow_links(false).min_depth(1) {
        let entry = entry?;
        let relative_path = relative_path(&entry, root);

        if entry.file_type().is_dir() {
            listing.subdirs.push(relative_path);
            continue;
        }

        let metadata = entry.metadata()?;
        let stamp = FileStamp::from_metadata(&metadata)?;

        listing.files.push(FileInfo { relative_path, stamp });
    }

    listing.subdirs.sort();
    listing.files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    Ok(listing)
}

fn relative_path(entry: &DirEntry, root: &Path) -> String {
    let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
