use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::error::ConfigError;

/// Trend granularity of the requested channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendType {
    Second,
    #[default]
    Minute,
}

impl std::fmt::Display for TrendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Second => write!(f, "second"),
            Self::Minute => write!(f, "minute"),
        }
    }
}

impl std::str::FromStr for TrendType {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "second" | "s" => Ok(Self::Second),
            "minute" | "m" => Ok(Self::Minute),
            _ => Err(ConfigError::InvalidValue("trend", s.to_string())),
        }
    }
}

/// Styling handed to the plotter and report renderer.
///
/// Passed explicitly with every plot request; nothing in the library keeps global
/// plot state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotStyle {
    pub figure_width: f64,
    pub figure_height: f64,
    pub primary_color: String,
    pub auxiliary_color: String,
    pub fit_color: String,
    pub use_tex: bool,
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            figure_width: 12.0,
            figure_height: 6.0,
            primary_color: String::from("#1f77b4"),
            auxiliary_color: String::from("#ff7f0e"),
            fit_color: String::from("#d62728"),
            use_tex: false,
        }
    }
}

/// Structure representing the application configuration. Contains pathing, time window and
/// analysis parameters. Configs are seralizable and deserializable to YAML using serde and
/// serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub ifo: String,
    pub primary_channel: String,
    pub data_path: PathBuf,
    pub channel_list_path: Option<PathBuf>,
    pub frame_type: Option<String>,
    pub output_path: PathBuf,
    pub gps_start: u64,
    pub gps_end: u64,
    pub trend: TrendType,
    pub alpha: Option<f64>,
    pub remove_outliers: Option<f64>,
    pub bad_sentinel: Option<f64>,
    pub threshold: f64,
    pub cluster_threshold: f64,
    pub max_cluster_display: usize,
    pub correlate_second_trends: bool,
    pub cv_folds: usize,
    pub n_alphas: usize,
    pub seed: u64,
    pub n_threads: i32,
    pub plot_style: PlotStyle,
}

impl Default for Config {
    /// Generate a new Config object. Paths and channels will be empty/invalid
    fn default() -> Self {
        Self {
            ifo: String::from("L1"),
            primary_channel: String::from(""),
            data_path: PathBuf::from("None"),
            channel_list_path: None,
            frame_type: None,
            output_path: PathBuf::from("None"),
            gps_start: 0,
            gps_end: 0,
            trend: TrendType::Minute,
            alpha: None,
            remove_outliers: None,
            bad_sentinel: None,
            threshold: 0.0001,
            cluster_threshold: 0.85,
            max_cluster_display: 20,
            correlate_second_trends: false,
            cv_folds: 5,
            n_alphas: 100,
            seed: 0,
            n_threads: 0,
            plot_style: PlotStyle::default(),
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Check that every parameter without a derivable default is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.primary_channel.is_empty() {
            return Err(ConfigError::InvalidValue(
                "primary_channel",
                String::from("no primary channel given"),
            ));
        }
        if self.ifo.is_empty() {
            return Err(ConfigError::InvalidValue("ifo", String::from("empty")));
        }
        if self.gps_end <= self.gps_start {
            return Err(ConfigError::InvalidValue(
                "gps_end",
                format!("{} is not after gps_start {}", self.gps_end, self.gps_start),
            ));
        }
        if !self.data_path.exists() {
            return Err(ConfigError::BadFilePath(self.data_path.clone()));
        }
        if let Some(alpha) = self.alpha {
            if !alpha.is_finite() || alpha < 0.0 {
                return Err(ConfigError::InvalidValue("alpha", alpha.to_string()));
            }
        }
        if let Some(sigma) = self.remove_outliers {
            if !sigma.is_finite() || sigma <= 0.0 {
                return Err(ConfigError::InvalidValue("remove_outliers", sigma.to_string()));
            }
        }
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(ConfigError::InvalidValue(
                "threshold",
                self.threshold.to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.cluster_threshold) {
            return Err(ConfigError::InvalidValue(
                "cluster_threshold",
                self.cluster_threshold.to_string(),
            ));
        }
        if self.max_cluster_display == 0 {
            return Err(ConfigError::InvalidValue(
                "max_cluster_display",
                String::from("0"),
            ));
        }
        if self.cv_folds < 2 {
            return Err(ConfigError::InvalidValue(
                "cv_folds",
                self.cv_folds.to_string(),
            ));
        }
        if self.n_alphas == 0 {
            return Err(ConfigError::InvalidValue("n_alphas", String::from("0")));
        }
        if !self.is_n_threads_valid() {
            return Err(ConfigError::InvalidValue(
                "n_threads",
                self.n_threads.to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_n_threads_valid(&self) -> bool {
        self.n_threads >= 0
    }

    /// Number of pool workers; zero in the config means one per available core
    pub fn n_workers(&self) -> usize {
        if self.n_threads > 0 {
            self.n_threads as usize
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }

    pub fn duration(&self) -> u64 {
        self.gps_end.saturating_sub(self.gps_start)
    }

    /// Whether correlations with the primary are meaningful for the configured trend
    pub fn correlate_with_primary(&self) -> bool {
        match self.trend {
            TrendType::Minute => true,
            TrendType::Second => self.correlate_second_trends,
        }
    }

    /// Read the auxiliary channel list, if one was given.
    ///
    /// One channel per line; blank lines and lines starting with `#` are ignored. The
    /// primary channel is never returned as an auxiliary channel.
    pub fn read_channel_list(&self) -> Result<Option<Vec<String>>, ConfigError> {
        let path = match &self.channel_list_path {
            Some(p) => p,
            None => return Ok(None),
        };
        if !path.exists() {
            return Err(ConfigError::BadFilePath(path.clone()));
        }
        let contents = std::fs::read_to_string(path)?;
        let mut channels: Vec<String> = Vec::new();
        for line in contents.lines() {
            let name = line.trim();
            if name.is_empty() || name.starts_with('#') || name == self.primary_channel {
                continue;
            }
            if !channels.iter().any(|c| c == name) {
                channels.push(name.to_string());
            }
        }
        Ok(Some(channels))
    }

    /// Construct the `{ifo}-{start}-{duration}` prefix shared by all outputs
    pub fn get_output_prefix(&self) -> String {
        format!("{}-{}-{}", self.ifo, self.gps_start, self.duration())
    }

    /// Get the path to a result table of a given kind (SELECTED, ZEROED, ...)
    pub fn get_table_path(&self, kind: &str) -> PathBuf {
        self.output_path
            .join(format!("{}-{}.txt", self.get_output_prefix(), kind))
    }

    /// Get the relative path (from the output directory) to the full cluster table of an anchor
    pub fn get_cluster_table_name(&self, anchor: &str) -> PathBuf {
        PathBuf::from(format!(
            "{}-CLUSTER-{}.txt",
            self.get_output_prefix(),
            sanitize_channel_name(anchor)
        ))
    }

    /// Get the path to the output report
    pub fn get_report_path(&self) -> PathBuf {
        self.output_path
            .join(format!("{}-REPORT.yml", self.get_output_prefix()))
    }
}

/// Channel names contain `:` and `-` which are unfriendly in file names
pub fn sanitize_channel_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_names() {
        let config = Config {
            ifo: String::from("H1"),
            gps_start: 1_186_741_000,
            gps_end: 1_186_744_600,
            output_path: PathBuf::from("/tmp/out"),
            ..Default::default()
        };
        assert_eq!(config.get_output_prefix(), "H1-1186741000-3600");
        assert_eq!(
            config.get_table_path("SELECTED"),
            PathBuf::from("/tmp/out/H1-1186741000-3600-SELECTED.txt")
        );
        assert_eq!(
            config.get_cluster_table_name("H1:ASC-X_TR_A"),
            PathBuf::from("H1-1186741000-3600-CLUSTER-H1_ASC_X_TR_A.txt")
        );
    }

    #[test]
    fn test_yaml_roundtrip_defaults() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let back: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.trend, TrendType::Minute);
        assert_eq!(back.max_cluster_display, 20);
        assert_eq!(back.plot_style, PlotStyle::default());
    }

    #[test]
    fn test_validate_rejects_missing_primary() {
        let config = Config::default();
        match config.validate() {
            Err(ConfigError::InvalidValue(field, _)) => assert_eq!(field, "primary_channel"),
            other => panic!("unexpected validation result {other:?}"),
        }
    }

    #[test]
    fn test_second_trend_correlation_toggle() {
        let mut config = Config {
            trend: TrendType::Second,
            ..Default::default()
        };
        assert!(!config.correlate_with_primary());
        config.correlate_second_trends = true;
        assert!(config.correlate_with_primary());
        assert_eq!("m".parse::<TrendType>().unwrap(), TrendType::Minute);
    }

    #[test]
    fn test_channel_list_skips_primary_and_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("channels.txt");
        std::fs::write(&path, "# aux\nL1:A\n\nL1:PRIMARY\nL1:B\nL1:A\n").unwrap();
        let config = Config {
            primary_channel: String::from("L1:PRIMARY"),
            channel_list_path: Some(path),
            ..Default::default()
        };
        let channels = config.read_channel_list().unwrap().unwrap();
        assert_eq!(channels, vec![String::from("L1:A"), String::from("L1:B")]);
    }
}
