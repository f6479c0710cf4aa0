//! Local filesystem scan feeding a directory tree

use std::path::Path;

use walkdir::WalkDir;

/// Lists regular files under `root`, optionally restricted to `extension`
///
/// Yields absolute path strings lazily. The extension match ignores ASCII
/// case. Unreadable entries and non-UTF-8 names are logged and skipped; a
/// missing root yields nothing.
pub fn scan_directory<'a>(
    root: &Path,
    extension: Option<&'a str>,
) -> impl Iterator<Item = String> + Send + 'a {
    WalkDir::new(root)
        .follow_links(false)
        .min_depth(1)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                if e.io_error().map(|io| io.kind()) != Some(std::io::ErrorKind::NotFound) {
                    tracing::warn!(error = %e, "Skipping unreadable entry during scan");
                }
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(move |entry| match extension {
            Some(wanted) => entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(wanted)),
            None => true,
        })
        .filter_map(|entry| match entry.path().to_str() {
            Some(path) => Some(path.to_string()),
            None => {
                tracing::warn!(path = %entry.path().display(), "Skipping non UTF-8 path");
                None
            }
        })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn scan_filters_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Movies/A")).unwrap();
        fs::write(dir.path().join("Movies/A/a.strm"), "x").unwrap();
        fs::write(dir.path().join("Movies/A/a.srt"), "x").unwrap();
        fs::write(dir.path().join("Movies/B.STRM"), "x").unwrap();

        let mut found: Vec<String> = scan_directory(dir.path(), Some("strm")).collect();
        found.sort();

        let root = dir.path().to_str().unwrap();
        assert_eq!(
            found,
            vec![
                format!("{root}/Movies/A/a.strm"),
                format!("{root}/Movies/B.STRM"),
            ]
        );
    }

    #[test]
    fn scan_without_filter_lists_all_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("x/y")).unwrap();
        fs::write(dir.path().join("x/y/z.nfo"), "x").unwrap();
        fs::write(dir.path().join("top.strm"), "x").unwrap();

        assert_eq!(scan_directory(dir.path(), None).count(), 2);
    }

    #[test]
    fn missing_root_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(scan_directory(&dir.path().join("nope"), Some("strm")).count(), 0);
    }
}
