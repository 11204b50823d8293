//! Data-driven graph loading for the blueprint runner.
//!
//! Graph documents and runner configuration are read from RON, JSON or TOML
//! files (format chosen by extension), resolved into core types and
//! validated before a runner ever sees them.

pub mod loader;
pub mod schema;

pub use loader::{
    DataLoadError, Format, detect_format, load_graph_file, load_graph_str, load_runner_config,
};
pub use schema::GraphDocument;
