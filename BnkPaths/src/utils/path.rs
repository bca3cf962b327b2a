//! Path utilities

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Characters not allowed in output filenames
const INVALID_CHARS: [char; 7] = ['*', '?', ':', '<', '>', '|', '"'];

/// Find all bank dumps (.xml) under the given paths
///
/// Files are returned as-is; directories are walked recursively.
/// The result is sorted and deduplicated.
pub fn find_dump_files<P: AsRef<Path>>(inputs: &[P]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        let input = input.as_ref();
        if input.is_file() {
            files.push(input.to_path_buf());
            continue;
        }

        files.extend(
            WalkDir::new(input)
                .follow_links(true)
                .into_iter()
                .filter_map(std::result::Result::ok)
                .filter(|e| {
                    e.path().is_file()
                        && e.path()
                            .extension()
                            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
                })
                .map(|e| e.path().to_path_buf()),
        );
    }

    files.sort();
    files.dedup();
    files
}

/// Replace characters that can't be part of a filename
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| if INVALID_CHARS.contains(&c) || c == '/' || c == '\\' { '_' } else { c })
        .collect()
}
