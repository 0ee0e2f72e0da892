//! Integration tests for two modules sharing one registry and cache directory

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use autobind_core::{Config, Registry, Value};
use autobind_parser::{LoadSource, ModuleLoader};

const PNG_H: &str = r#"
#define PNG_LIBPNG_VER 10643
#define PNG_COLOR_MASK_ALPHA 4
typedef struct png_color_struct {
    unsigned char red;
    unsigned char green;
    unsigned char blue;
} png_color;
int png_access_version_number(void);
"#;

const CURL_H: &str = r#"
#define CURL_MAX_WRITE_SIZE 16384
#define CURL_ERROR_SIZE 256
typedef enum { CURLE_OK, CURLE_UNSUPPORTED_PROTOCOL } CURLcode;
CURLcode curl_global_init(long flags);
"#;

fn loader(cache_dir: &Path) -> ModuleLoader {
    let mut config = Config::default();
    config.cache.directory = cache_dir.to_path_buf();
    ModuleLoader::with_defaults(config).unwrap()
}

fn write(dir: &TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, text).unwrap();
    path
}

#[test]
fn png_snapshot_never_contains_curl_tables() {
    let work = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    let png_h = write(&work, "png.h", PNG_H);
    let curl_h = write(&work, "curl.h", CURL_H);
    let png_lib = write(&work, "libpng16.so", "ELF png");
    let curl_lib = write(&work, "libcurl.so", "ELF curl");

    let loader = loader(cache.path());
    let registry = Registry::new();
    let png = loader.load(&registry, "png", &png_lib, &[png_h.clone()]).unwrap();
    let curl = loader.load(&registry, "curl", &curl_lib, &[curl_h]).unwrap();
    assert_eq!(png.source, LoadSource::Parsed);
    assert_eq!(curl.source, LoadSource::Parsed);
    assert_eq!(registry.constant("curl", "CURL_ERROR_SIZE"), Some(Value::Int(256)));

    let png_file = png.cache_file.expect("png snapshot written");
    let raw = fs::read_to_string(&png_file).unwrap();
    assert!(raw.contains("PNG_LIBPNG_VER"));
    assert!(!raw.contains("CURL_"));

    let fresh = Registry::new();
    let again = loader.load(&fresh, "png", &png_lib, &[png_h]).unwrap();
    assert_eq!(again.source, LoadSource::Cache);
    assert_eq!(fresh.constant("png", "PNG_LIBPNG_VER"), Some(Value::Int(10643)));
    assert!(fresh.constants("curl").is_empty());
    assert!(fresh.signatures("curl").is_empty());
    assert!(fresh.signature("png", "png_access_version_number").is_some());
    assert!(fresh.struct_def("png_color").is_some());
}

#[test]
fn corrupted_snapshot_is_replaced() {
    let work = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    let header = write(&work, "curl.h", CURL_H);
    let lib = write(&work, "libcurl.so", "ELF curl");
    let loader = loader(cache.path());

    let first = loader.load(&Registry::new(), "curl", &lib, &[header.clone()]).unwrap();
    let path = first.cache_file.expect("snapshot written");
    fs::write(&path, b"\x00\x01 truncated").unwrap();

    let registry = Registry::new();
    let second = loader.load(&registry, "curl", &lib, &[header.clone()]).unwrap();
    assert_eq!(second.source, LoadSource::Parsed);
    assert_eq!(registry.constant("curl", "CURL_MAX_WRITE_SIZE"), Some(Value::Int(16384)));
    assert_eq!(second.cache_file.as_deref(), Some(path.as_path()));

    let third = loader.load(&Registry::new(), "curl", &lib, &[header]).unwrap();
    assert_eq!(third.source, LoadSource::Cache);
}

#[test]
fn disabled_cache_writes_nothing() {
    let work = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    let header = write(&work, "png.h", PNG_H);
    let lib = write(&work, "libpng16.so", "ELF png");

    let mut config = Config::default();
    config.cache.directory = cache.path().join("ffi");
    config.cache.enabled = false;
    let loader = ModuleLoader::with_defaults(config).unwrap();

    let report = loader.load(&Registry::new(), "png", &lib, &[header]).unwrap();
    assert_eq!(report.source, LoadSource::Parsed);
    assert!(report.cache_file.is_none());
    assert!(!cache.path().join("ffi").exists());
}
