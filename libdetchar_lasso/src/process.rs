use fxhash::FxHashMap;
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::sync::Arc;

use super::analyzer::{analyze_channel, check_primary, AnalysisContext, AnalysisRecord};
use super::cluster::{build_cluster, ClusterContext, ClusterOutcome};
use super::config::Config;
use super::data_source::DataSource;
use super::error::{DataSourceError, ProcessorError};
use super::plotter::{ArtifactHandle, PlotKind, PlotRequest, PlotSeries, Plotter};
use super::preprocess::{check_channel, remove_bad, remove_flat, remove_outliers, standardize};
use super::ranking::{partition, rank_results, RegressionResult, Selection};
use super::regression::{design_matrix, fit, LassoFit, LassoParams};
use super::report::{assemble, Headline, OutputTables, Report, ReportInputs, ReportRenderer};
use super::series::{ChannelSeries, ChannelSet, StandardizedSeries};
use super::stats;
use super::table_writer::{
    write_channel_list, write_cluster_table, write_coefficient_table, BAD_TABLE, FLAT_TABLE,
    SELECTED_TABLE, ZEROED_TABLE,
};
use super::worker_pool::WorkerPool;
use super::worker_status::{PoolStage, WorkerStatus};

/// The collaborators a run talks to
pub struct Collaborators<'a> {
    pub source: &'a dyn DataSource,
    pub plotter: &'a dyn Plotter,
    pub renderer: &'a dyn ReportRenderer,
}

/// Fetch the auxiliary channels, dropping any the source does not know about.
///
/// The source reports every unknown channel at once, so this fetches at most twice. Returns
/// the fetched set and the names that could not be found.
fn fetch_auxiliary(
    config: &Config,
    source: &dyn DataSource,
    mut names: Vec<String>,
) -> Result<(ChannelSet, Vec<String>), ProcessorError> {
    let mut missing: Vec<String> = Vec::new();
    loop {
        if names.is_empty() {
            return Ok((ChannelSet::new(), missing));
        }
        match source.fetch(
            &names,
            config.gps_start as f64,
            config.gps_end as f64,
            config.frame_type.as_deref(),
        ) {
            Ok(set) => return Ok((set, missing)),
            Err(DataSourceError::MissingChannels(absent)) => {
                let before = names.len();
                names.retain(|n| !absent.contains(n));
                if names.len() == before {
                    return Err(DataSourceError::MissingChannels(absent).into());
                }
                for name in absent.iter() {
                    spdlog::warn!("Channel {name} is not available from the data source, skipping");
                }
                missing.extend(absent);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Fetch and validate the primary channel. Any problem here is fatal.
fn fetch_primary(
    config: &Config,
    source: &dyn DataSource,
) -> Result<ChannelSeries, ProcessorError> {
    let names = vec![config.primary_channel.clone()];
    let mut primary = source
        .fetch(
            &names,
            config.gps_start as f64,
            config.gps_end as f64,
            config.frame_type.as_deref(),
        )?
        .into_iter()
        .find(|series| series.name == config.primary_channel)
        .ok_or_else(|| DataSourceError::MissingChannels(names.clone()))?;
    check_channel(&primary, None, None).map_err(ProcessorError::PrimaryChannel)?;
    if let Some(sigma) = config.remove_outliers {
        let replaced = remove_outliers(&mut primary, sigma);
        spdlog::info!("Replaced {replaced} outlier samples in {}", primary.name);
    }
    Ok(primary)
}

fn lasso_params(config: &Config) -> LassoParams {
    LassoParams {
        n_alphas: config.n_alphas,
        cv_folds: config.cv_folds,
        seed: config.seed,
        ..Default::default()
    }
}

/// Plot the model prediction over the primary channel, in primary units
fn plot_model(
    config: &Config,
    plotter: &dyn Plotter,
    primary: &StandardizedSeries,
    times: &[f64],
    prediction: &[f64],
) -> Option<ArtifactHandle> {
    let request = PlotRequest {
        kind: PlotKind::Model,
        channel: primary.name.clone(),
        title: format!("Lasso model of {}", primary.name),
        x_label: String::from("GPS time [s]"),
        y_label: primary.name.clone(),
        series: vec![
            PlotSeries::new(&primary.name, times.to_vec(), primary.descale()),
            PlotSeries::new(
                "model",
                times.to_vec(),
                prediction.iter().map(|v| primary.descale_value(*v)).collect(),
            ),
        ],
    };
    match plotter.plot(&request, &config.plot_style) {
        Ok(handle) => Some(handle),
        Err(e) => {
            spdlog::warn!("Could not plot the Lasso model: {e}");
            None
        }
    }
}

fn relative_table(config: &Config, kind: &str) -> PathBuf {
    config
        .get_table_path(kind)
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_default()
}

/// The main loop of detchar_lasso.
///
/// Fetches data, filters and standardizes it, fits the Lasso model, runs the analysis
/// and clustering fan-outs, writes the result tables and renders the report. Progress of
/// the fan-outs is sent through `tx` if given.
pub fn process(
    config: &Config,
    collaborators: &Collaborators,
    tx: Option<Sender<WorkerStatus>>,
) -> Result<Report, ProcessorError> {
    config.validate()?;
    std::fs::create_dir_all(&config.output_path)?;

    // Channel list: explicit file, or everything the source offers
    let aux_names: Vec<String> = match config.read_channel_list()? {
        Some(list) => list,
        None => collaborators
            .source
            .available_channels(config.frame_type.as_deref())?
            .into_iter()
            .filter(|name| *name != config.primary_channel)
            .collect(),
    };
    let n_requested = aux_names.len();
    spdlog::info!("Requested {n_requested} auxiliary channels");

    let primary = fetch_primary(config, collaborators.source)?;
    let (aux, missing) = fetch_auxiliary(config, collaborators.source, aux_names)?;
    spdlog::info!(
        "Fetched {} channels ({})",
        aux.len(),
        human_bytes::human_bytes((aux.total_size_bytes() + primary.size_bytes()) as f64)
    );

    let times = primary.times();
    let std_primary = standardize(&primary)?;
    check_primary(&std_primary, &times).map_err(ProcessorError::PrimaryChannel)?;

    // Preprocess
    let flat = remove_flat(aux);
    let bad = remove_bad(flat.kept, config.bad_sentinel, Some(primary.len()));
    let retained = bad.kept;
    let flat_channels = flat.removed;
    let mut bad_channels = bad.removed;
    bad_channels.extend(missing);

    // An auxiliary channel that cannot be standardized is bad, never fatal
    let mut standardized: Vec<Arc<StandardizedSeries>> = Vec::with_capacity(retained.len());
    let mut retained_names: Vec<String> = Vec::with_capacity(retained.len());
    for series in retained.iter() {
        match standardize(series) {
            Ok(scaled) => {
                retained_names.push(series.name.clone());
                standardized.push(Arc::new(scaled));
            }
            Err(e) => {
                spdlog::warn!("Removing bad channel: {e}");
                bad_channels.push(series.name.clone());
            }
        }
    }
    drop(retained);
    spdlog::info!(
        "Removed {} flat and {} bad channels; {} remain",
        flat_channels.len(),
        bad_channels.len(),
        standardized.len()
    );

    // Regression
    let mut lasso: Option<LassoFit> = None;
    let mut model_correlation = None;
    let mut model_artifact = None;
    let selection = if standardized.is_empty() {
        spdlog::warn!("No auxiliary channels survived preprocessing");
        Selection::default()
    } else {
        let refs: Vec<&StandardizedSeries> = standardized.iter().map(|s| s.as_ref()).collect();
        let x = design_matrix(&refs)?;
        spdlog::info!(
            "Fitting Lasso model over {} channels and {} samples...",
            x.ncols(),
            x.nrows()
        );
        let result = fit(&x, &std_primary.values, config.alpha, &lasso_params(config))?;
        spdlog::info!("Lasso alpha: {:e}", result.alpha);
        let prediction = result.predict(&x);
        model_correlation = Some(stats::pearson(&prediction, &std_primary.values));
        model_artifact = plot_model(
            config,
            collaborators.plotter,
            &std_primary,
            &times,
            &prediction,
        );
        let selection = partition(rank_results(&retained_names, &result.coefficients));
        lasso = Some(result);
        selection
    };
    spdlog::info!(
        "Lasso selected {} channels and zeroed {}",
        selection.selected.len(),
        selection.zeroed.len()
    );

    write_coefficient_table(&config.get_table_path(SELECTED_TABLE), &selection.selected)?;
    write_coefficient_table(&config.get_table_path(ZEROED_TABLE), &selection.zeroed)?;
    write_channel_list(&config.get_table_path(FLAT_TABLE), &flat_channels)?;
    write_channel_list(&config.get_table_path(BAD_TABLE), &bad_channels)?;

    let by_name: FxHashMap<&str, Arc<StandardizedSeries>> = standardized
        .iter()
        .map(|s| (s.name.as_str(), s.clone()))
        .collect();
    let tasks: Vec<(RegressionResult, Arc<StandardizedSeries>)> = selection
        .selected
        .iter()
        .filter_map(|r| by_name.get(r.channel.as_str()).map(|s| (r.clone(), s.clone())))
        .collect();

    let pool = WorkerPool::new(config.n_workers(), tx);

    // Per-channel analysis
    spdlog::info!(
        "Analyzing {} channels with {} workers...",
        tasks.len(),
        pool.n_workers()
    );
    let analysis_ctx = AnalysisContext {
        primary: &std_primary,
        times: &times,
        threshold: config.threshold,
        correlate: config.correlate_with_primary(),
        plotter: collaborators.plotter,
        style: &config.plot_style,
    };
    let records = pool.run(PoolStage::Analysis, tasks.clone(), |(result, series)| {
        analyze_channel(&analysis_ctx, result, series.clone())
    })?;
    let mut analyses: FxHashMap<String, AnalysisRecord> = FxHashMap::default();
    for record in records {
        let record = record?;
        analyses.insert(record.channel.clone(), record);
    }
    spdlog::info!("Done with analysis.");

    // Clusters
    spdlog::info!("Clustering {} channels...", tasks.len());
    let cluster_ctx = ClusterContext {
        channels: &standardized,
        times: &times,
        threshold: config.cluster_threshold,
        max_display: config.max_cluster_display,
        plotter: collaborators.plotter,
        style: &config.plot_style,
    };
    let outcomes = pool.run(PoolStage::Clustering, tasks, |(result, series)| {
        build_cluster(&cluster_ctx, result, series)
    })?;
    let mut clusters: FxHashMap<String, ClusterOutcome> = FxHashMap::default();
    for mut outcome in outcomes {
        if let ClusterOutcome::Correlated(entry) = &mut outcome {
            let table = config.get_cluster_table_name(&entry.anchor);
            write_cluster_table(&config.output_path.join(&table), entry)?;
            entry.full_table = Some(table);
        }
        clusters.insert(outcome.anchor().to_string(), outcome);
    }
    spdlog::info!("Done with clustering.");

    let headline = Headline {
        ifo: config.ifo.clone(),
        primary_channel: config.primary_channel.clone(),
        gps_start: config.gps_start,
        gps_end: config.gps_end,
        duration: config.duration(),
        trend: config.trend,
        alpha: lasso.as_ref().map(|l| l.alpha),
        alpha_from_cv: lasso.as_ref().is_some_and(|l| l.alpha_from_cv),
        threshold: config.threshold,
        cluster_threshold: config.cluster_threshold,
        n_requested,
        n_retained: retained_names.len(),
        n_selected: selection.selected.len(),
        n_zeroed: selection.zeroed.len(),
        n_flat: flat_channels.len(),
        n_bad: bad_channels.len(),
        model_correlation,
        model_artifact,
        generated_unix: time::OffsetDateTime::now_utc().unix_timestamp(),
    };
    let tables = OutputTables {
        selected: relative_table(config, SELECTED_TABLE),
        zeroed: relative_table(config, ZEROED_TABLE),
        flat: relative_table(config, FLAT_TABLE),
        bad: relative_table(config, BAD_TABLE),
    };

    let report = assemble(ReportInputs {
        config,
        headline,
        selection: &selection,
        analyses: &analyses,
        clusters: &clusters,
        flat_channels,
        bad_channels,
        tables,
    })?;
    let report_path = config.get_report_path();
    collaborators.renderer.render(&report, &report_path)?;
    spdlog::info!("Report written to {}", report_path.display());

    Ok(report)
}
