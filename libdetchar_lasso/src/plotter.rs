use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::config::{sanitize_channel_name, PlotStyle};
use super::error::PlotError;

const PLOT_DIRECTORY: &str = "plots";

/// Opaque handle to a generated artifact: a path relative to the output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactHandle(pub PathBuf);

impl ArtifactHandle {
    pub fn path(&self) -> &Path {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotKind {
    TrendOverlay,
    SignCorrectedComparison,
    ScatterWithFit,
    ClusterComparison,
    Model,
}

impl PlotKind {
    fn tag(&self) -> &'static str {
        match self {
            Self::TrendOverlay => "trend",
            Self::SignCorrectedComparison => "compare",
            Self::ScatterWithFit => "scatter",
            Self::ClusterComparison => "cluster",
            Self::Model => "model",
        }
    }
}

/// One line or point cloud of a plot
#[derive(Debug, Clone, PartialEq)]
pub struct PlotSeries {
    pub label: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl PlotSeries {
    pub fn new(label: &str, x: Vec<f64>, y: Vec<f64>) -> Self {
        Self {
            label: label.to_string(),
            x,
            y,
        }
    }
}

/// Everything a plotting backend needs to draw one figure
#[derive(Debug, Clone, PartialEq)]
pub struct PlotRequest {
    pub kind: PlotKind,
    pub channel: String,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub series: Vec<PlotSeries>,
}

impl PlotRequest {
    /// File stem derived from the channel and plot kind
    pub fn file_stem(&self) -> String {
        format!("{}-{}", sanitize_channel_name(&self.channel), self.kind.tag())
    }
}

/// The plotting collaborator. Implementations must be shareable across pool workers.
pub trait Plotter: Send + Sync {
    fn plot(&self, request: &PlotRequest, style: &PlotStyle) -> Result<ArtifactHandle, PlotError>;
}

/// Writes the data behind each figure as a tab-separated table under `<root>/plots/`.
///
/// Handy as a default backend and for feeding external plotting tools.
#[derive(Debug, Clone)]
pub struct TablePlotter {
    root: PathBuf,
}

impl TablePlotter {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

impl Plotter for TablePlotter {
    fn plot(&self, request: &PlotRequest, style: &PlotStyle) -> Result<ArtifactHandle, PlotError> {
        if request.series.is_empty() {
            return Err(PlotError::NoSeries);
        }
        if let Some(bad) = request.series.iter().find(|s| s.x.len() != s.y.len()) {
            return Err(PlotError::MismatchedSeries(bad.label.clone()));
        }

        let relative = PathBuf::from(PLOT_DIRECTORY).join(format!("{}.tsv", request.file_stem()));
        let full_path = self.root.join(&relative);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut w = BufWriter::new(File::create(&full_path)?);
        writeln!(w, "# title: {}", request.title)?;
        writeln!(w, "# x: {}", request.x_label)?;
        writeln!(w, "# y: {}", request.y_label)?;
        writeln!(
            w,
            "# figure: {}x{} colors: {},{},{} tex: {}",
            style.figure_width,
            style.figure_height,
            style.primary_color,
            style.auxiliary_color,
            style.fit_color,
            style.use_tex
        )?;
        writeln!(w, "series\tx\ty")?;
        for series in request.series.iter() {
            for (x, y) in series.x.iter().zip(series.y.iter()) {
                writeln!(w, "{}\t{}\t{}", series.label, x, y)?;
            }
        }
        w.flush()?;

        Ok(ArtifactHandle(relative))
    }
}
