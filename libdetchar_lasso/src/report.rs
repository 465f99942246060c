use fxhash::FxHashMap;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::analyzer::{AnalysisRecord, AnalysisStatus, Artifacts};
use super::cluster::{ClusterMember, ClusterOutcome};
use super::config::{Config, PlotStyle, TrendType};
use super::error::ReportError;
use super::plotter::ArtifactHandle;
use super::ranking::Selection;

pub const NO_SIGNIFICANT_CHANNELS: &str = "No significant correlations found";

/// Run-level numbers shown at the top of the report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Headline {
    pub ifo: String,
    pub primary_channel: String,
    pub gps_start: u64,
    pub gps_end: u64,
    pub duration: u64,
    pub trend: TrendType,
    pub alpha: Option<f64>,
    pub alpha_from_cv: bool,
    pub threshold: f64,
    pub cluster_threshold: f64,
    pub n_requested: usize,
    pub n_retained: usize,
    pub n_selected: usize,
    pub n_zeroed: usize,
    pub n_flat: usize,
    pub n_bad: usize,
    pub model_correlation: Option<f64>,
    pub model_artifact: Option<ArtifactHandle>,
    pub generated_unix: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopChannel {
    pub rank: usize,
    pub channel: String,
    pub coefficient: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelSection {
    pub channel: String,
    pub coefficient: f64,
    pub correlation: f64,
    pub status: AnalysisStatus,
    pub artifacts: Option<Artifacts>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSection {
    pub anchor: String,
    pub no_correlated_channels: bool,
    pub n_members: usize,
    pub members: Vec<ClusterMember>,
    pub truncated: bool,
    pub full_table: Option<PathBuf>,
    pub artifact: Option<ArtifactHandle>,
}

/// Relative paths of the flat result tables
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutputTables {
    pub selected: PathBuf,
    pub zeroed: PathBuf,
    pub flat: PathBuf,
    pub bad: PathBuf,
}

/// The report model handed to a renderer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub headline: Headline,
    pub message: Option<String>,
    pub top_channels: Vec<TopChannel>,
    pub details: Vec<ChannelSection>,
    pub clusters: Vec<ClusterSection>,
    pub flat_channels: Vec<String>,
    pub bad_channels: Vec<String>,
    pub tables: OutputTables,
    pub plot_style: PlotStyle,
}

/// Everything the assembler joins
pub struct ReportInputs<'a> {
    pub config: &'a Config,
    pub headline: Headline,
    pub selection: &'a Selection,
    pub analyses: &'a FxHashMap<String, AnalysisRecord>,
    pub clusters: &'a FxHashMap<String, ClusterOutcome>,
    pub flat_channels: Vec<String>,
    pub bad_channels: Vec<String>,
    pub tables: OutputTables,
}

/// Join the ranking, analysis records and clusters by channel name.
///
/// Sections come out in the ranked order of the selected channels. Every selected
/// channel must have both an analysis record and a cluster outcome.
pub fn assemble(inputs: ReportInputs) -> Result<Report, ReportError> {
    let mut top_channels = Vec::with_capacity(inputs.selection.selected.len());
    let mut details = Vec::new();
    let mut clusters = Vec::with_capacity(inputs.selection.selected.len());

    for (idx, result) in inputs.selection.selected.iter().enumerate() {
        let record = inputs
            .analyses
            .get(&result.channel)
            .ok_or_else(|| ReportError::MissingAnalysis(result.channel.clone()))?;
        let cluster = inputs
            .clusters
            .get(&result.channel)
            .ok_or_else(|| ReportError::MissingCluster(result.channel.clone()))?;

        top_channels.push(TopChannel {
            rank: idx + 1,
            channel: result.channel.clone(),
            coefficient: result.coefficient,
        });

        if record.status != AnalysisStatus::BelowThreshold {
            details.push(ChannelSection {
                channel: record.channel.clone(),
                coefficient: record.coefficient,
                correlation: record.correlation,
                status: record.status.clone(),
                artifacts: record.artifacts.clone(),
            });
        }

        clusters.push(match cluster {
            ClusterOutcome::Correlated(entry) => ClusterSection {
                anchor: entry.anchor.clone(),
                no_correlated_channels: false,
                n_members: entry.members.len(),
                members: entry.displayed().to_vec(),
                truncated: entry.is_truncated(),
                full_table: entry.full_table.clone(),
                artifact: entry.artifact.clone(),
            },
            ClusterOutcome::NoCorrelatedChannels { anchor } => ClusterSection {
                anchor: anchor.clone(),
                no_correlated_channels: true,
                n_members: 0,
                members: Vec::new(),
                truncated: false,
                full_table: None,
                artifact: None,
            },
        });
    }

    let message = if inputs.selection.is_empty() {
        Some(String::from(NO_SIGNIFICANT_CHANNELS))
    } else {
        None
    };

    Ok(Report {
        headline: inputs.headline,
        message,
        top_channels,
        details,
        clusters,
        flat_channels: inputs.flat_channels,
        bad_channels: inputs.bad_channels,
        tables: inputs.tables,
        plot_style: inputs.config.plot_style.clone(),
    })
}

/// The document rendering collaborator
pub trait ReportRenderer {
    fn render(&self, report: &Report, path: &Path) -> Result<(), ReportError>;
}

/// Renders the report model as a YAML document
#[derive(Debug, Clone, Default)]
pub struct YamlRenderer;

impl ReportRenderer for YamlRenderer {
    fn render(&self, report: &Report, path: &Path) -> Result<(), ReportError> {
        let yaml_str = serde_yaml::to_string(report)?;
        let mut file = File::create(path)?;
        file.write_all(yaml_str.as_bytes())?;
        Ok(())
    }
}
