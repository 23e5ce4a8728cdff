//! Filename generation and manipulation.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Replaces each run of unsafe characters in a title.
pub const TITLE_FILLER: &str = "_";

/// Suffix of a segment file that is still being written.
pub const PART_SUFFIX: &str = "part";

/// Validate a filename taken from untrusted input.
///
/// Returns an error if the filename is a relative path component or
/// contains a path separator.
pub fn sanitize_filename(name: &str) -> Result<String> {
    if name == "." || name == ".." {
        return Err(Error::InvalidFilename(format!(
            "Path traversal detected: '{}'",
            name
        )));
    }

    if name.contains('/') || name.contains('\\') {
        return Err(Error::InvalidFilename(format!(
            "Path separators not allowed in filename: '{}'",
            name
        )));
    }

    if name.contains('\0') {
        return Err(Error::InvalidFilename(format!(
            "Null bytes not allowed in filename: '{}'",
            name
        )));
    }

    let sanitized: String = name
        .chars()
        .map(|c| match c {
            ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.trim().is_empty() {
        return Err(Error::InvalidFilename(
            "Filename cannot be empty or whitespace-only".to_string(),
        ));
    }

    Ok(sanitized)
}

/// Make a space title safe to use as a file stem.
///
/// Every run of characters outside word/space classes becomes a single filler.
/// Applying it twice gives the same result as applying it once.
pub fn sanitize_title(title: &str) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    let unsafe_run =
        UNSAFE.get_or_init(|| Regex::new(r"[^\w\s]+").expect("title pattern is valid"));

    unsafe_run.replace_all(title, TITLE_FILLER).into_owned()
}

/// Name of the MP3 produced for a space.
pub fn output_file_name(title: &str, fallback: &str) -> String {
    let stem = sanitize_title(title.trim());
    let stem = if stem.trim().is_empty() {
        sanitize_title(fallback)
    } else {
        stem
    };
    format!("{}.mp3", stem)
}

/// File name a segment is stored under: the last path component of its URL.
pub fn segment_file_name(url: &str) -> Result<String> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let base = path.rsplit('/').next().unwrap_or_default();
    sanitize_filename(base)
}

/// Temporary sibling a segment is written to before being renamed into place.
pub fn part_path(final_path: &Path) -> PathBuf {
    let mut name = final_path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(PART_SUFFIX);
    final_path.with_file_name(name)
}

/// Generate a unique filename by appending a number if the file exists.
pub fn make_unique_filename(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let parent = path.parent().unwrap_or(Path::new("."));

    let mut counter = 1;
    loop {
        let new_name = if ext.is_empty() {
            format!("{}_{}", stem, counter)
        } else {
            format!("{}_{}.{}", stem, counter, ext)
        };

        let new_path = parent.join(&new_name);
        if !new_path.exists() {
            return new_path;
        }

        counter += 1;
        if counter > 1000 {
            // Safety limit
            return new_path;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename_valid() {
        assert_eq!(sanitize_filename("chunk_001.aac").unwrap(), "chunk_001.aac");
        assert_eq!(sanitize_filename("file:name.ts").unwrap(), "file_name.ts");
    }

    #[test]
    fn test_sanitize_filename_path_traversal() {
        assert!(sanitize_filename("../etc/passwd").is_err());
        assert!(sanitize_filename("..\\windows\\system32").is_err());
        assert!(sanitize_filename("foo/../bar").is_err());
        assert!(sanitize_filename("..").is_err());
        assert!(sanitize_filename(".").is_err());
    }

    #[test]
    fn test_sanitize_filename_allows_inner_dots() {
        assert_eq!(sanitize_filename("seg..aac").unwrap(), "seg..aac");
        assert_eq!(segment_file_name("https://cdn/x/seg..aac").unwrap(), "seg..aac");
        assert!(segment_file_name("https://cdn/x/..").is_err());
    }

    #[test]
    fn test_sanitize_filename_empty() {
        assert!(sanitize_filename("").is_err());
        assert!(sanitize_filename("   ").is_err());
    }

    #[test]
    fn test_sanitize_title_collapses_runs() {
        assert_eq!(sanitize_title("Hello, world!!"), "Hello_ world_");
        assert_eq!(sanitize_title("AMA 🔥🔥 w/ devs"), "AMA _ w_ devs");
        assert_eq!(sanitize_title("plain title"), "plain title");
    }

    #[test]
    fn test_sanitize_title_output_is_safe_and_idempotent() {
        let safe = Regex::new(r"^[\w\s]+$").unwrap();
        for title in [
            "What's next? (Part 2)",
            "🚀🚀🚀 launch",
            "a/b\\c:d*e",
            "#1 — the \"big\" one",
            "...",
        ] {
            let once = sanitize_title(title);
            assert!(safe.is_match(&once), "unsafe output {:?}", once);
            assert!(!once.contains("__"), "run not collapsed in {:?}", once);
            assert_eq!(sanitize_title(&once), once);
        }
    }

    #[test]
    fn test_output_file_name_fallback() {
        assert_eq!(output_file_name("Weekly: sync", "1abc"), "Weekly_ sync.mp3");
        assert_eq!(output_file_name("   ", "1abc"), "1abc.mp3");
    }

    #[test]
    fn test_segment_file_name() {
        assert_eq!(
            segment_file_name("https://cdn/x/chunk_1700_0_a.aac?type=replay").unwrap(),
            "chunk_1700_0_a.aac"
        );
        assert_eq!(segment_file_name("c.ts").unwrap(), "c.ts");
        assert!(segment_file_name("https://cdn/x/").is_err());
    }

    #[test]
    fn test_part_path() {
        let path = Path::new("/tmp/task/chunks/a.ts");
        assert_eq!(part_path(path), PathBuf::from("/tmp/task/chunks/a.ts.part"));
    }

    #[test]
    fn test_make_unique_filename() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Space.mp3");
        assert_eq!(make_unique_filename(&path), path);

        std::fs::write(&path, b"x").unwrap();
        assert_eq!(make_unique_filename(&path), dir.path().join("Space_1.mp3"));
    }
}
