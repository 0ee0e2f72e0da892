//! Error types for autobind

use std::path::PathBuf;

use thiserror::Error;

/// autobind error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("Declaration error: {0}")]
    Declaration(String),

    #[error("no header files found for module '{alias}' (searched: {})", join_paths(.searched))]
    NoHeaders { alias: String, searched: Vec<PathBuf> },

    #[error("Function not found: {0}")]
    FunctionNotFound(String),

    #[error("Invocation error: {0}")]
    Invocation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type alias for autobind
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_headers_lists_searched_paths() {
        let err = Error::NoHeaders {
            alias: "png".into(),
            searched: vec![PathBuf::from("/usr/include/png.h"), PathBuf::from("/usr/local/include/png.h")],
        };
        let msg = err.to_string();
        assert!(msg.contains("'png'"));
        assert!(msg.contains("/usr/include/png.h, /usr/local/include/png.h"));
    }
}
