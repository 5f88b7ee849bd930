//! Graph, config and result documents for the command line
//!
//! Inputs are JSON or YAML, chosen by file extension. Bundled output is
//! always JSON.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bundler::BundledGraph;
use crate::config::BundleConfig;
use crate::graph::Graph;

/// Errors that can occur during reading or writing
#[derive(Error, Debug)]
pub enum IoError {
    /// The file format is not supported
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The file extension could not be determined
    #[error("could not determine file format from path: {0}")]
    UnknownExtension(String),

    /// An I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type for reader/writer operations
pub type IoResult<T> = Result<T, IoError>;

/// Document formats accepted on input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    /// Format for a file extension, case-insensitive
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "json" => Some(Format::Json),
            "yaml" | "yml" => Some(Format::Yaml),
            _ => None,
        }
    }

    /// Format for a path based on its extension
    pub fn from_path(path: &Path) -> IoResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| IoError::UnknownExtension(path.display().to_string()))?;
        Self::from_extension(ext).ok_or_else(|| IoError::UnsupportedFormat(ext.to_string()))
    }

    pub fn parse<T: DeserializeOwned>(self, text: &str) -> IoResult<T> {
        Ok(match self {
            Format::Json => serde_json::from_str(text)?,
            Format::Yaml => serde_yaml::from_str(text)?,
        })
    }
}

fn read_document<T: DeserializeOwned>(path: &Path) -> IoResult<T> {
    let format = Format::from_path(path)?;
    let text = std::fs::read_to_string(path)?;
    format.parse(&text)
}

/// Read a graph document (`{ "nodes": [...], "edges": [...] }`)
pub fn read_graph(path: &Path) -> IoResult<Graph> {
    read_document(path)
}

/// Read a config document; absent fields take their defaults
pub fn read_config(path: &Path) -> IoResult<BundleConfig> {
    read_document(path)
}

/// One bundled edge in the output document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundledEdgeDocument {
    pub source: String,
    pub target: String,
    pub points: Vec<[f64; 3]>,
}

/// The output document: bundled polylines labelled with their node ids
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BundledDocument {
    pub edges: Vec<BundledEdgeDocument>,
}

impl BundledDocument {
    /// Label each bundled edge with the ids of its input edge
    pub fn new(graph: &Graph, bundled: &BundledGraph) -> Self {
        let edges = bundled
            .edges
            .iter()
            .filter_map(|edge| {
                let input = graph.edges.get(edge.input_index)?;
                Some(BundledEdgeDocument {
                    source: input.source.clone(),
                    target: input.target.clone(),
                    points: edge.points.iter().map(|p| p.to_array()).collect(),
                })
            })
            .collect();
        Self { edges }
    }

    pub fn to_json(&self) -> IoResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the document as JSON to `output`
    pub fn write(&self, output: &Path) -> IoResult<()> {
        std::fs::write(output, self.to_json()?)?;
        Ok(())
    }
}
