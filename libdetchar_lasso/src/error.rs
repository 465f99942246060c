use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChannelDataError {
    #[error("Channel {0} contains no samples")]
    Empty(String),
    #[error("Channel {0} contains a non-finite sample at index {1}")]
    NonFinite(String, usize),
    #[error("Channel {0} contains the sentinel value {1} at index {2}")]
    Sentinel(String, f64, usize),
    #[error("Channel {0} has {1} samples; expected {2}")]
    LengthMismatch(String, usize, usize),
    #[error("Channel {0} has a variance too large to represent")]
    VarianceOverflow(String),
    #[error("Channel {0} is flat (zero variance)")]
    Flat(String),
}

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Attempted to standardize channel {0} which has zero or non-finite variance")]
    DegenerateChannel(String),
}

#[derive(Debug, Error)]
pub enum DataSourceError {
    #[error("DataSource failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Could not open data table because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error(
        "DataSource was given a table with the incorrect format at line {0}; most likely the number of columns is incorrect"
    )]
    BadFileFormat(usize),
    #[error("DataSource failed to parse a sample: {0}")]
    ParsingError(#[from] std::num::ParseFloatError),
    #[error("DataSource could not find channels {0:?}")]
    MissingChannels(Vec<String>),
    #[error("DataSource has no samples in the window [{0}, {1})")]
    EmptyWindow(f64, f64),
}

#[derive(Debug, Error)]
pub enum RegressionError {
    #[error("Regression was given no auxiliary channels to fit")]
    NoChannels,
    #[error("Regression was given no samples to fit")]
    NoSamples,
    #[error("Regression design matrix has {0} rows but the target has {1} samples")]
    ShapeMismatch(usize, usize),
    #[error("Cross-validation requires at least {0} samples; only {1} were given")]
    TooFewSamples(usize, usize),
    #[error("Regression was given an invalid alpha {0}")]
    InvalidAlpha(f64),
}

#[derive(Debug, Error)]
pub enum PlotError {
    #[error("Plotter failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Plotter was given series {0} with mismatched x and y lengths")]
    MismatchedSeries(String),
    #[error("Plotter was given a request with no series")]
    NoSeries,
}

#[derive(Debug, Error)]
pub enum ChannelAnalysisError {
    #[error("{0}")]
    Data(#[from] ChannelDataError),
    #[error("Plotting failed: {0}")]
    Plot(#[from] PlotError),
}

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("Analysis failed because the primary channel is invalid: {0}")]
    Primary(ChannelDataError),
}

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Worker {0} panicked during the {1} fan-out")]
    WorkerPanic(usize, String),
}

#[derive(Debug, Error)]
pub enum TableWriterError {
    #[error("TableWriter failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Report assembly found no analysis record for selected channel {0}")]
    MissingAnalysis(String),
    #[error("Report assembly found no cluster for selected channel {0}")]
    MissingCluster(String),
    #[error("Report failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Report failed to convert to yaml: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config has an invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to DataSource error: {0}")]
    DataSourceError(#[from] DataSourceError),
    #[error("Processor failed because the primary channel is invalid: {0}")]
    PrimaryChannel(ChannelDataError),
    #[error("Processor failed due to Preprocess error: {0}")]
    PreprocessError(#[from] PreprocessError),
    #[error("Processor failed due to Regression error: {0}")]
    RegressionError(#[from] RegressionError),
    #[error("Processor failed due to Analyzer error: {0}")]
    AnalyzerError(#[from] AnalyzerError),
    #[error("Processor failed due to WorkerPool error: {0}")]
    PoolError(#[from] PoolError),
    #[error("Processor failed due to TableWriter error: {0}")]
    TableError(#[from] TableWriterError),
    #[error("Processor failed due to Report error: {0}")]
    ReportError(#[from] ReportError),
    #[error("Processor failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
}
