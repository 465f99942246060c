//! # detchar_lasso
//!
//! detchar_lasso is a Lasso correlation and clustering tool for gravitational-wave detector
//! characterization, written in Rust. It takes one primary channel (typically a figure of
//! merit such as the binary neutron star range) and a large set of auxiliary channels
//! over a GPS time window, fits a sparse L1-regularized linear model of the primary in
//! terms of the auxiliary channels, and reports which channels the model selected, how
//! each of them correlates with the primary, and which other channels move together with
//! each selected channel.
//!
//! ## Installation
//!
//! Currently the only method of install is from source.
//!
//! ### Rust
//!
//! If you have not used Rust before, you will most likely need to install the Rust tool
//! chain. See the [Rust docs](https://www.rust-lang.org/tools/install) for installation
//! instructions.
//!
//! ### Building & Install
//!
//! To build and install the CLI use `cargo install --path ./detchar_lasso_cli` from the top
//! level detchar_lasso repository. The binary will be installed to your cargo install
//! location (typically something like `~/.cargo/bin/`).
//!
//! ## Configuration
//!
//! A template configuration can be generated with `detchar_lasso_cli new -p config.yml`.
//! The YAML format of a configuration file is as follows:
//!
//! ```yml
//! ifo: L1
//! primary_channel: L1:DMT-SNSH_EFFECTIVE_RANGE_MPC.mean
//! data_path: /path/to/trends.csv
//! channel_list_path: null
//! frame_type: null
//! output_path: /path/to/output
//! gps_start: 1262304018
//! gps_end: 1262390418
//! trend: minute
//! alpha: null
//! remove_outliers: null
//! bad_sentinel: null
//! threshold: 0.0001
//! cluster_threshold: 0.85
//! max_cluster_display: 20
//! correlate_second_trends: false
//! cv_folds: 5
//! n_alphas: 100
//! seed: 0
//! n_threads: 0
//! plot_style:
//!   figure_width: 12.0
//!   figure_height: 6.0
//!   primary_color: '#1f77b4'
//!   auxiliary_color: '#ff7f0e'
//!   fit_color: '#d62728'
//!   use_tex: false
//! ```
//!
//! - `alpha: null` selects the regularization strength by seeded K-fold cross validation
//! (`cv_folds`, `n_alphas`, `seed`). Otherwise the given alpha is used as is.
//! - `channel_list_path: null` uses every channel the data source offers.
//! - `remove_outliers` is a sigma multiplier. Samples of the primary channel further than
//! that from the mean are replaced by the mean.
//! - `n_threads: 0` uses one worker per available core.
//!
//! ## Output
//!
//! All outputs are written to `output_path` and share the `{ifo}-{start}-{duration}` prefix:
//!
//! ```text
//! L1-1262304018-86400-SELECTED.txt     channels with a non-zero coefficient, ranked
//! L1-1262304018-86400-ZEROED.txt       channels the model zeroed
//! L1-1262304018-86400-FLAT.txt         constant channels removed before the fit
//! L1-1262304018-86400-BAD.txt          non-finite, sentinel or missing channels
//! L1-1262304018-86400-CLUSTER-*.txt    full member list of each cluster
//! L1-1262304018-86400-REPORT.yml       the report document
//! plots/                               plot artifacts referenced by the report
//! ```
pub mod analyzer;
pub mod cluster;
pub mod config;
pub mod data_source;
pub mod error;
pub mod plotter;
pub mod preprocess;
pub mod process;
pub mod ranking;
pub mod regression;
pub mod report;
pub mod series;
pub mod stats;
pub mod table_writer;
pub mod worker_pool;
pub mod worker_status;
