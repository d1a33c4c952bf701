//! Configuration loading from disk and stdin.

use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::config::error::{ConfigError, YamlError};
use crate::config::schema::Options;

/// Path value that selects standard input instead of the filesystem.
pub const STDIN_PATH: &str = "stdin";

/// Suffixes picked up when scanning a configuration directory.
///
/// Matching is exact: `CONFIG.JSON` in a directory is ignored.
const DIRECTORY_SUFFIXES: [&str; 3] = [".json", ".yaml", ".yml"];

/// Where configuration fragments come from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSources {
    /// Explicit files, loaded in the given order. `"stdin"` reads standard input.
    pub paths: Vec<String>,
    /// Directories whose matching files are all loaded.
    pub directories: Vec<PathBuf>,
}

impl ConfigSources {
    pub fn new(paths: Vec<String>, directories: Vec<PathBuf>) -> Self {
        Self { paths, directories }
    }

    /// Sources with a single file.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            paths: vec![path.into()],
            directories: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty() && self.directories.is_empty()
    }
}

/// One configuration source's parsed output, tagged with its origin.
#[derive(Debug, Clone)]
pub struct ConfigFragment {
    path: String,
    content: Vec<u8>,
    raw: Value,
    options: Options,
}

impl ConfigFragment {
    /// Source path, or `"stdin"`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Bytes exactly as read from the source.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// JSON representation used for merging.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn into_options(self) -> Options {
        self.options
    }
}

/// Whether the path has a `.yaml`/`.yml` extension, ignoring case.
pub fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
        .unwrap_or(false)
}

fn convert_yaml_to_json(content: &[u8]) -> Result<Vec<u8>, YamlError> {
    let text = std::str::from_utf8(content)?;
    let value: Value = serde_saphyr::from_str(text)?;
    Ok(serde_json::to_vec(&value)?)
}

/// Decode a fragment's JSON into [`Options`]. `null` (an empty YAML file)
/// decodes to empty options.
pub(crate) fn decode_options(raw: &Value) -> Result<Options, serde_json::Error> {
    if raw.is_null() {
        return Ok(Options::default());
    }
    Options::deserialize(raw)
}

/// Lexically clean a path: drop `.` components and resolve `..` against
/// preceding normal components. Trailing and repeated separators vanish.
fn clean_path(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match cleaned.components().next_back() {
                Some(Component::Normal(_)) => {
                    cleaned.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => cleaned.push(".."),
            },
            other => cleaned.push(other),
        }
    }
    if cleaned.as_os_str().is_empty() {
        cleaned.push(".");
    }
    cleaned
}

/// Load a single fragment.
pub fn read_config_at(path: &str) -> Result<ConfigFragment, ConfigError> {
    let read = if path == STDIN_PATH {
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf).map(|_| buf)
    } else {
        fs::read(path)
    };
    let content = read.map_err(|source| ConfigError::Read {
        path: path.to_string(),
        source,
    })?;

    let json = if path != STDIN_PATH && is_yaml_file(Path::new(path)) {
        convert_yaml_to_json(&content).map_err(|source| ConfigError::YamlConversion {
            path: path.to_string(),
            source,
        })?
    } else {
        content.clone()
    };

    let decode_err = |source| ConfigError::Decode {
        path: path.to_string(),
        source,
    };
    let raw: Value = serde_json::from_slice(&json).map_err(decode_err)?;
    let options = decode_options(&raw).map_err(decode_err)?;

    tracing::debug!(path, bytes = content.len(), "Loaded config fragment");

    Ok(ConfigFragment {
        path: path.to_string(),
        content,
        raw,
        options,
    })
}

/// Load every fragment named by `sources`, sorted ascending by path.
pub fn read_config(sources: &ConfigSources) -> Result<Vec<ConfigFragment>, ConfigError> {
    let mut fragments = Vec::new();

    for path in &sources.paths {
        fragments.push(read_config_at(path)?);
    }

    for directory in &sources.directories {
        for path in scan_directory(directory)? {
            fragments.push(read_config_at(&path)?);
        }
    }

    fragments.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(fragments)
}

/// List the loadable files of a config directory.
fn scan_directory(directory: &Path) -> Result<Vec<String>, ConfigError> {
    let dir_err = |source| ConfigError::ReadDirectory {
        path: directory.display().to_string(),
        source,
    };

    let base = clean_path(directory);
    let mut paths = Vec::new();
    for entry in fs::read_dir(directory).map_err(dir_err)? {
        let entry = entry.map_err(dir_err)?;
        if entry.file_type().map_err(dir_err)?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            tracing::warn!(directory = %directory.display(), "Skipping non UTF-8 file name");
            continue;
        };
        if !DIRECTORY_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)) {
            continue;
        }
        paths.push(clean_path(&base.join(name)).display().to_string());
    }
    Ok(paths)
}
