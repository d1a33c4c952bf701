//! Configuration error types.

use thiserror::Error;

/// Errors raised while loading, merging or decoding configuration.
///
/// Every variant tied to a source names the offending path; the underlying
/// cause is kept as the error source so callers can print the full chain.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config at {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("read config directory at {path}")]
    ReadDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("convert YAML to JSON at {path}")]
    YamlConversion {
        path: String,
        #[source]
        source: YamlError,
    },

    #[error("decode config at {path}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("merge config at {path}")]
    Merge {
        path: String,
        #[source]
        source: MergeError,
    },

    #[error("unmarshal merged config")]
    Unmarshal(#[source] serde_json::Error),

    #[error("no configuration found")]
    Empty,
}

/// YAML to JSON conversion failures.
#[derive(Debug, Error)]
pub enum YamlError {
    #[error("YAML content is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_saphyr::Error),

    #[error("YAML value has no JSON representation: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A structural conflict found while deep-merging two JSON documents.
#[derive(Debug, Error)]
#[error("cannot merge {source_kind} into json object at {}", display_key_path(.key_path))]
pub struct MergeError {
    /// Keys leading to the conflict, outermost first.
    pub key_path: Vec<String>,
    /// JSON type of the value that could not be merged.
    pub source_kind: &'static str,
}

fn display_key_path(key_path: &[String]) -> String {
    if key_path.is_empty() {
        "<root>".to_string()
    } else {
        key_path.join(".")
    }
}

/// Render an error together with all of its sources, outermost first.
///
/// `read config at a.json: No such file or directory (os error 2)`
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
