use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CloverMergeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML parse error at position {position}: {source}")]
    Xml {
        source: quick_xml::Error,
        position: usize,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("{0}")]
    Config(String),

    #[error("Input file not found: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("Unable to parse {}: {source}", path.display())]
    Document {
        path: PathBuf,
        source: Box<CloverMergeError>,
    },

    #[error("Unable to write output file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, CloverMergeError>;
