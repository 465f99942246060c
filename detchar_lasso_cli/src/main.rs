use clap::{value_parser, Arg, ArgMatches, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::sync::Arc;

use libdetchar_lasso::config::{Config, TrendType};
use libdetchar_lasso::data_source::CsvDataSource;
use libdetchar_lasso::plotter::TablePlotter;
use libdetchar_lasso::process::{process, Collaborators};
use libdetchar_lasso::report::YamlRenderer;
use libdetchar_lasso::worker_status::{PoolStage, WorkerStatus};

const LOG_FILE: &str = "./detchar_lasso.log";

fn make_template_config(path: &Path) {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config).unwrap();
    let mut file = File::create(path).expect("Could create template config file!");
    file.write_all(yaml_str.as_bytes())
        .expect("Failed to write yaml data to file!");
}

/// The library logs through spdlog; send it to a file so the terminal stays readable
fn init_library_log() {
    let file_sink = Arc::new(
        spdlog::sink::FileSink::builder()
            .path(PathBuf::from(LOG_FILE))
            .formatter(Box::new(spdlog::formatter::PatternFormatter::new(
                spdlog::formatter::pattern!(
                    "[{date_short} {time_short}] - [thread: {tid}] - [{^{level}}] - {payload}{eol}"
                ),
            )))
            .truncate(true)
            .build()
            .expect("Could not create the log file!"),
    );
    let logger = Arc::new(
        spdlog::Logger::builder()
            .flush_level_filter(spdlog::LevelFilter::All)
            .sink(file_sink)
            .build()
            .expect("Could not create the library logger!"),
    );
    spdlog::set_default_logger(logger);
}

/// Command line flags override the matching config file fields
fn apply_overrides(config: &mut Config, matches: &ArgMatches) -> Result<(), String> {
    if let Some(start) = matches.get_one::<u64>("start") {
        config.gps_start = *start;
    }
    if let Some(end) = matches.get_one::<u64>("end") {
        config.gps_end = *end;
    }
    if let Some(primary) = matches.get_one::<String>("primary") {
        config.primary_channel = primary.clone();
    }
    if let Some(ifo) = matches.get_one::<String>("ifo") {
        config.ifo = ifo.clone();
    }
    if let Some(channels) = matches.get_one::<String>("channels") {
        config.channel_list_path = Some(PathBuf::from(channels));
    }
    if let Some(data) = matches.get_one::<String>("data") {
        config.data_path = PathBuf::from(data);
    }
    if let Some(output) = matches.get_one::<String>("output") {
        config.output_path = PathBuf::from(output);
    }
    if let Some(trend) = matches.get_one::<String>("trend") {
        config.trend = trend.parse::<TrendType>().map_err(|e| e.to_string())?;
    }
    if let Some(alpha) = matches.get_one::<f64>("alpha") {
        config.alpha = Some(*alpha);
    }
    if let Some(sigma) = matches.get_one::<f64>("remove-outliers") {
        config.remove_outliers = Some(*sigma);
    }
    if let Some(threshold) = matches.get_one::<f64>("threshold") {
        config.threshold = *threshold;
    }
    if let Some(threshold) = matches.get_one::<f64>("cluster-threshold") {
        config.cluster_threshold = *threshold;
    }
    if let Some(workers) = matches.get_one::<i32>("workers") {
        config.n_threads = *workers;
    }
    if let Some(seed) = matches.get_one::<u64>("seed") {
        config.seed = *seed;
    }
    Ok(())
}

fn stage_bar(pb_manager: &MultiProgress, status: &WorkerStatus) -> ProgressBar {
    let pb = pb_manager.add(ProgressBar::new(status.total as u64));
    if let Ok(style) = ProgressStyle::with_template("{msg:>10} [{bar:40}] {pos}/{len}") {
        pb.set_style(style);
    }
    pb.set_message(status.stage.to_string());
    pb
}

fn main() {
    // Create a cli
    let matches = Command::new("detchar_lasso_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .help("Path to the config file"),
        )
        .arg(
            Arg::new("start")
                .long("start")
                .value_parser(value_parser!(u64))
                .help("GPS start time"),
        )
        .arg(
            Arg::new("end")
                .long("end")
                .value_parser(value_parser!(u64))
                .help("GPS end time"),
        )
        .arg(
            Arg::new("primary")
                .long("primary")
                .help("Primary channel name"),
        )
        .arg(Arg::new("ifo").long("ifo").help("Interferometer prefix"))
        .arg(
            Arg::new("channels")
                .long("channels")
                .help("Path to the auxiliary channel list"),
        )
        .arg(
            Arg::new("data")
                .long("data")
                .help("Path to the trend data table"),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .help("Output directory"),
        )
        .arg(
            Arg::new("trend")
                .long("trend")
                .help("Trend type, second or minute"),
        )
        .arg(
            Arg::new("alpha")
                .long("alpha")
                .value_parser(value_parser!(f64))
                .help("Fixed Lasso regularization; cross validated if not given"),
        )
        .arg(
            Arg::new("remove-outliers")
                .long("remove-outliers")
                .value_parser(value_parser!(f64))
                .help("Replace primary samples beyond this many sigma"),
        )
        .arg(
            Arg::new("threshold")
                .long("threshold")
                .value_parser(value_parser!(f64))
                .help("Minimum |coefficient| for a detailed channel section"),
        )
        .arg(
            Arg::new("cluster-threshold")
                .long("cluster-threshold")
                .value_parser(value_parser!(f64))
                .help("Minimum |r| for cluster membership"),
        )
        .arg(
            Arg::new("workers")
                .long("workers")
                .short('j')
                .value_parser(value_parser!(i32))
                .help("Number of worker threads, 0 for one per core"),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_parser(value_parser!(u64))
                .help("Seed of the cross validation fold split"),
        )
        .get_matches();

    // Initialize feedback
    let logger = simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    LogWrapper::new(pb_manager.clone(), logger)
        .try_init()
        .expect("Could not create logging/progress!");

    // Parse the cli
    let config_path = PathBuf::from(matches.get_one::<String>("path").expect("We require args"));

    if let Some(("new", _)) = matches.subcommand() {
        log::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );

        make_template_config(&config_path);
        log::info!("Done.");
        return;
    }

    // Load our config
    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let mut config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    if let Err(e) = apply_overrides(&mut config, &matches) {
        log::error!("{e}");
        return;
    }
    log::info!("Config successfully loaded.");
    log::info!("Primary Channel: {}", config.primary_channel);
    log::info!("Data Path: {}", config.data_path.to_string_lossy());
    log::info!("Output Path: {}", config.output_path.to_string_lossy());
    log::info!(
        "GPS Start: {} GPS End: {} ({} trends)",
        config.gps_start,
        config.gps_end,
        config.trend
    );
    match config.alpha {
        Some(alpha) => log::info!("Alpha: {alpha}"),
        None => log::info!("Alpha: cross validated with {} folds", config.cv_folds),
    }
    log::info!("Workers: {}", config.n_workers());

    let source = match CsvDataSource::new(&config.data_path) {
        Ok(s) => s,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };

    init_library_log();
    log::info!("Detailed log written to {LOG_FILE}");

    let report_path = config.get_report_path();

    // Spawn the task!
    let (tx, rx) = channel::<WorkerStatus>();
    let handle = std::thread::spawn(move || {
        let plotter = TablePlotter::new(&config.output_path);
        let collaborators = Collaborators {
            source: &source,
            plotter: &plotter,
            renderer: &YamlRenderer,
        };
        process(&config, &collaborators, Some(tx))
    });

    // The sender lives in the worker pool, so this ends once the run is over
    let mut current: Option<(PoolStage, ProgressBar)> = None;
    for status in rx.iter() {
        let same_stage = matches!(&current, Some((stage, _)) if *stage == status.stage);
        if !same_stage {
            if let Some((_, pb)) = current.take() {
                pb.finish();
            }
            current = Some((status.stage, stage_bar(&pb_manager, &status)));
        }
        if let Some((_, pb)) = &current {
            pb.set_position(status.completed as u64);
        }
    }
    if let Some((_, pb)) = current.take() {
        pb.finish();
    }

    match handle.join() {
        Ok(result) => match result {
            Ok(report) => {
                log::info!(
                    "Lasso selected {} of {} channels.",
                    report.headline.n_selected,
                    report.headline.n_retained
                );
                if let Some(message) = report.message {
                    log::info!("{message}");
                }
                log::info!("Report written to {}", report_path.to_string_lossy());
            }
            Err(e) => log::error!("Analysis failed with error: {e}"),
        },
        Err(_) => log::error!("Failed to join analysis task!"),
    }

    log::info!("Done.");
}
