//! Loading pipeline: reads graph and config documents, detects their format,
//! resolves them into core types and validates graph structure.

use std::path::{Path, PathBuf};

use blueprint_core::config::RunnerConfig;
use blueprint_core::graph::CompiledGraph;
use blueprint_core::validation::{LoadError, validate_graph};
use serde::de::DeserializeOwned;

use crate::schema::GraphDocument;

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur while loading documents.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {source_name}: {detail}")]
    Parse { source_name: String, detail: String },

    /// A value parsed but is not meaningful (e.g. an unknown operator).
    #[error("invalid value in {context}: {detail}")]
    InvalidValue { context: String, detail: String },

    /// The graph decoded but failed structural validation.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// Deserialization
// ===========================================================================

/// Deserialize `content` in `format`. `source_name` labels parse errors.
pub fn deserialize_str<T: DeserializeOwned>(
    content: &str,
    format: Format,
    source_name: &str,
) -> Result<T, DataLoadError> {
    let parse_error = |detail: String| DataLoadError::Parse {
        source_name: source_name.to_string(),
        detail,
    };
    match format {
        Format::Ron => ron::from_str(content).map_err(|e| parse_error(e.to_string())),
        Format::Json => serde_json::from_str(content).map_err(|e| parse_error(e.to_string())),
        Format::Toml => toml::from_str(content).map_err(|e| parse_error(e.to_string())),
    }
}

/// Read a file and deserialize it according to its format (detected from
/// the extension).
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    deserialize_str(&content, format, &path.display().to_string())
}

// ===========================================================================
// Graphs
// ===========================================================================

/// Decode, resolve and validate a graph document held in memory.
pub fn load_graph_str(content: &str, format: Format) -> Result<CompiledGraph, DataLoadError> {
    let document: GraphDocument = deserialize_str(content, format, "<string>")?;
    resolve_and_validate(document)
}

/// Decode, resolve and validate a graph file.
pub fn load_graph_file(path: &Path) -> Result<CompiledGraph, DataLoadError> {
    let document: GraphDocument = deserialize_file(path)?;
    let graph = resolve_and_validate(document)?;
    tracing::info!(
        path = %path.display(),
        actions = graph.action_count(),
        transitions = graph.transition_count(),
        "graph document loaded"
    );
    Ok(graph)
}

fn resolve_and_validate(document: GraphDocument) -> Result<CompiledGraph, DataLoadError> {
    let graph = document.into_graph()?;
    validate_graph(&graph)?;
    Ok(graph)
}

// ===========================================================================
// Runner configuration
// ===========================================================================

/// Load a [`RunnerConfig`]. Absent fields keep their defaults.
pub fn load_runner_config(path: &Path) -> Result<RunnerConfig, DataLoadError> {
    let config: RunnerConfig = deserialize_file(path)?;
    tracing::debug!(path = %path.display(), ?config, "runner config loaded");
    Ok(config)
}

// ===========================================================================
// Tests
// ===========================================================================
