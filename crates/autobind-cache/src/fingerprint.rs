//! File fingerprints and include discovery

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use autobind_core::config::FingerprintMode;
use sha2::{Digest, Sha256};
use tracing::debug;

/// Fingerprint recorded for files that cannot be read
pub const UNREADABLE: &str = "error";

/// Directory prefix of system headers; these are fingerprinted but not followed
const SYSTEM_INCLUDE_DIR: &str = "/usr/include/";

/// Fingerprint a file, or [`UNREADABLE`] if it cannot be inspected
///
/// A missing header must not fail key construction; it only has to make the
/// key differ from the one computed while the file existed.
pub fn fingerprint_file(path: &Path, mode: FingerprintMode) -> String {
    match try_fingerprint(path, mode) {
        Ok(fp) => fp,
        Err(e) => {
            debug!("Cannot fingerprint {:?}: {}", path, e);
            UNREADABLE.to_string()
        }
    }
}

fn try_fingerprint(path: &Path, mode: FingerprintMode) -> io::Result<String> {
    match mode {
        FingerprintMode::Metadata => {
            let metadata = fs::metadata(path)?;
            let mtime = metadata
                .modified()?
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos();
            Ok(format!("mtime:{}:size:{}", mtime, metadata.len()))
        }
        FingerprintMode::Content => {
            let bytes = fs::read(path)?;
            let mut hasher = Sha256::new();
            hasher.update(&bytes);
            Ok(format!("sha256:{:x}", hasher.finalize()))
        }
    }
}

/// Collect `roots` plus every header reachable through `#include "..."`
///
/// Quoted includes resolve relative to the including file. Headers under
/// `/usr/include/` are kept but their own includes are not followed. The
/// result is sorted and free of duplicates.
pub fn scan_includes(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut found = include_order(roots);
    found.sort();
    found
}

/// `roots` and their local includes, every header after the ones it includes
///
/// Each header appears once, at its first visit; include cycles are cut
/// there. Unreadable headers are kept so reading them reports the error.
pub fn include_order(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut visited = BTreeSet::new();
    let mut order = Vec::new();
    for root in roots {
        visit(&normalize(root), &mut visited, &mut order);
    }
    order
}

fn visit(path: &Path, visited: &mut BTreeSet<PathBuf>, order: &mut Vec<PathBuf>) {
    if !visited.insert(path.to_path_buf()) {
        return;
    }
    if !path.to_string_lossy().contains(SYSTEM_INCLUDE_DIR) {
        if let Ok(content) = fs::read_to_string(path) {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            for line in content.lines() {
                if let Some(include) = local_include(line) {
                    let full = dir.join(include);
                    if full.exists() {
                        visit(&normalize(&full), visited, order);
                    }
                }
            }
        }
    }
    order.push(path.to_path_buf());
}

/// Target of a quoted `#include`, if the line is one
fn local_include(line: &str) -> Option<&str> {
    let rest = line.trim().strip_prefix('#')?.trim_start();
    let rest = rest.strip_prefix("include")?.trim();
    let start = rest.find('"')?;
    let end = rest.rfind('"')?;
    (end > start + 1).then(|| &rest[start + 1..end])
}

fn normalize(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_local_include() {
        assert_eq!(local_include("#include \"foo.h\""), Some("foo.h"));
        assert_eq!(local_include("  #  include \"sub/bar.h\" // x"), Some("sub/bar.h"));
        assert_eq!(local_include("#include <stdio.h>"), None);
        assert_eq!(local_include("int x;"), None);
    }

    #[test]
    fn test_scan_follows_local_includes_once() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("a.h"), "#include \"b.h\"\n#include \"sub/c.h\"\n#include <stdio.h>\n").unwrap();
        fs::write(root.join("b.h"), "#include \"a.h\"\n").unwrap();
        fs::write(root.join("sub/c.h"), "#include \"../b.h\"\n#include \"missing.h\"\n").unwrap();

        let found = scan_includes(&[root.join("a.h")]);
        let mut expected: Vec<PathBuf> = ["a.h", "b.h", "sub/c.h"]
            .iter()
            .map(|p| fs::canonicalize(root.join(p)).unwrap())
            .collect();
        expected.sort();
        assert_eq!(found, expected);
    }

    #[test]
    fn test_include_order_puts_dependencies_first() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(root.join("main.h"), "#include \"types.h\"\n#include \"api.h\"\n").unwrap();
        fs::write(root.join("api.h"), "#include \"types.h\"\n#include \"main.h\"\n").unwrap();
        fs::write(root.join("types.h"), "typedef int myint;\n").unwrap();

        let order = include_order(&[root.join("main.h"), root.join("types.h")]);
        let expected: Vec<PathBuf> = ["types.h", "api.h", "main.h"]
            .iter()
            .map(|p| fs::canonicalize(root.join(p)).unwrap())
            .collect();
        assert_eq!(order, expected);
    }

    #[test]
    fn test_metadata_fingerprint_tracks_size() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("x.h");
        fs::write(&path, "int a;").unwrap();
        let before = fingerprint_file(&path, FingerprintMode::Metadata);
        fs::write(&path, "int a; int b;").unwrap();
        let after = fingerprint_file(&path, FingerprintMode::Metadata);
        assert_ne!(before, after);
        assert!(before.starts_with("mtime:"));
    }

    #[test]
    fn test_content_fingerprint() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.h");
        let b = temp.path().join("b.h");
        fs::write(&a, "same").unwrap();
        fs::write(&b, "same").unwrap();
        assert_eq!(
            fingerprint_file(&a, FingerprintMode::Content),
            fingerprint_file(&b, FingerprintMode::Content)
        );
    }

    #[test]
    fn test_missing_file_fingerprint() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope.h");
        assert_eq!(fingerprint_file(&missing, FingerprintMode::Metadata), UNREADABLE);
    }
}
