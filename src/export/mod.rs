mod html;
mod kml;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use html::{render_html, write_html, HTML_FILE_NAME};
pub use kml::{render_kml, write_kml, KML_FILE_NAME};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialize error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Where the exporters put their files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub kml: PathBuf,
    pub html: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Emit a sensor-to-target look vector every this many records, to
    /// bound output size on long flights.
    pub look_vector_stride: usize,
    /// Tile layer URL template for the HTML map; the one external
    /// dependency of the exported page.
    pub tile_url: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            look_vector_stride: 10,
            tile_url: "https://tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
        }
    }
}
