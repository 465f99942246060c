use serde::Serialize;
use std::sync::Arc;

use super::config::PlotStyle;
use super::error::{AnalyzerError, ChannelAnalysisError, ChannelDataError};
use super::plotter::{ArtifactHandle, PlotKind, PlotRequest, PlotSeries, Plotter};
use super::ranking::RegressionResult;
use super::series::StandardizedSeries;
use super::stats;

/// Shared, read-only inputs of the per-channel analysis fan-out
pub struct AnalysisContext<'a> {
    pub primary: &'a StandardizedSeries,
    pub times: &'a [f64],
    pub threshold: f64,
    pub correlate: bool,
    pub plotter: &'a dyn Plotter,
    pub style: &'a PlotStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Analyzed,
    BelowThreshold,
    Failed(String),
}

/// The three figures made for every channel above threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Artifacts {
    pub trend: ArtifactHandle,
    pub comparison: ArtifactHandle,
    pub scatter: ArtifactHandle,
}

/// Per-channel output of the analysis fan-out
#[derive(Debug, Clone)]
pub struct AnalysisRecord {
    pub channel: String,
    pub coefficient: f64,
    pub correlation: f64,
    pub artifacts: Option<Artifacts>,
    pub status: AnalysisStatus,
    pub series: Arc<StandardizedSeries>,
}

/// Problems with the primary channel are fatal for the whole batch
pub fn check_primary(primary: &StandardizedSeries, times: &[f64]) -> Result<(), ChannelDataError> {
    if primary.is_empty() {
        return Err(ChannelDataError::Empty(primary.name.clone()));
    }
    if let Some(idx) = stats::first_non_finite(&primary.values) {
        return Err(ChannelDataError::NonFinite(primary.name.clone(), idx));
    }
    if times.len() != primary.len() {
        return Err(ChannelDataError::LengthMismatch(
            primary.name.clone(),
            primary.len(),
            times.len(),
        ));
    }
    Ok(())
}

/// Analyze one selected channel.
///
/// A failure confined to this channel is logged and returned as a `Failed` record with
/// no artifacts; only a broken primary channel is an error.
pub fn analyze_channel(
    ctx: &AnalysisContext,
    result: &RegressionResult,
    series: Arc<StandardizedSeries>,
) -> Result<AnalysisRecord, AnalyzerError> {
    check_primary(ctx.primary, ctx.times).map_err(AnalyzerError::Primary)?;

    let mut record = AnalysisRecord {
        channel: result.channel.clone(),
        coefficient: result.coefficient,
        correlation: 0.0,
        artifacts: None,
        status: AnalysisStatus::BelowThreshold,
        series,
    };

    match try_analyze(ctx, result, &record.series) {
        Ok((correlation, artifacts)) => {
            record.correlation = correlation;
            if artifacts.is_some() {
                record.status = AnalysisStatus::Analyzed;
            }
            record.artifacts = artifacts;
        }
        Err(e) => {
            spdlog::warn!("Skipping channel {}: {e}", result.channel);
            record.status = AnalysisStatus::Failed(e.to_string());
        }
    }
    Ok(record)
}

fn try_analyze(
    ctx: &AnalysisContext,
    result: &RegressionResult,
    series: &StandardizedSeries,
) -> Result<(f64, Option<Artifacts>), ChannelAnalysisError> {
    if series.len() != ctx.primary.len() {
        return Err(ChannelDataError::LengthMismatch(
            series.name.clone(),
            series.len(),
            ctx.primary.len(),
        )
        .into());
    }
    if let Some(idx) = stats::first_non_finite(&series.values) {
        return Err(ChannelDataError::NonFinite(series.name.clone(), idx).into());
    }

    let correlation = if ctx.correlate {
        stats::pearson(&series.values, &ctx.primary.values)
    } else {
        0.0
    };

    if result.rank() < ctx.threshold {
        return Ok((correlation, None));
    }

    let trend = ctx.plotter.plot(&trend_request(ctx, result, series), ctx.style)?;
    let comparison = ctx
        .plotter
        .plot(&comparison_request(ctx, result, series), ctx.style)?;
    let scatter = ctx.plotter.plot(&scatter_request(ctx, result, series), ctx.style)?;

    Ok((
        correlation,
        Some(Artifacts {
            trend,
            comparison,
            scatter,
        }),
    ))
}

fn trend_request(
    ctx: &AnalysisContext,
    result: &RegressionResult,
    series: &StandardizedSeries,
) -> PlotRequest {
    PlotRequest {
        kind: PlotKind::TrendOverlay,
        channel: result.channel.clone(),
        title: format!("{} (coefficient {:.4})", result.channel, result.coefficient),
        x_label: String::from("GPS time [s]"),
        y_label: result.channel.clone(),
        series: vec![PlotSeries::new(
            &result.channel,
            ctx.times.to_vec(),
            series.descale(),
        )],
    }
}

// Flip anti-correlated channels so both traces move the same way
fn comparison_request(
    ctx: &AnalysisContext,
    result: &RegressionResult,
    series: &StandardizedSeries,
) -> PlotRequest {
    let sign = result.coefficient.signum();
    let label = if sign < 0.0 {
        format!("-1 x {}", result.channel)
    } else {
        result.channel.clone()
    };
    PlotRequest {
        kind: PlotKind::SignCorrectedComparison,
        channel: result.channel.clone(),
        title: format!("{} vs {}", ctx.primary.name, result.channel),
        x_label: String::from("GPS time [s]"),
        y_label: String::from("Standardized amplitude"),
        series: vec![
            PlotSeries::new(&ctx.primary.name, ctx.times.to_vec(), ctx.primary.values.clone()),
            PlotSeries::new(
                &label,
                ctx.times.to_vec(),
                series.values.iter().map(|v| v * sign).collect(),
            ),
        ],
    }
}

fn scatter_request(
    ctx: &AnalysisContext,
    result: &RegressionResult,
    series: &StandardizedSeries,
) -> PlotRequest {
    let (slope, intercept) = stats::linear_fit(&series.values, &ctx.primary.values);
    let lo = series.values.iter().cloned().fold(f64::INFINITY, f64::min);
    let hi = series.values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    PlotRequest {
        kind: PlotKind::ScatterWithFit,
        channel: result.channel.clone(),
        title: format!("{} vs {}", ctx.primary.name, result.channel),
        x_label: result.channel.clone(),
        y_label: ctx.primary.name.clone(),
        series: vec![
            PlotSeries::new("data", series.values.clone(), ctx.primary.values.clone()),
            PlotSeries::new(
                "fit",
                vec![lo, hi],
                vec![slope * lo + intercept, slope * hi + intercept],
            ),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlotError;
    use crate::preprocess::standardize;
    use crate::series::ChannelSeries;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPlotter {
        requests: Mutex<Vec<PlotRequest>>,
    }

    impl Plotter for RecordingPlotter {
        fn plot(
            &self,
            request: &PlotRequest,
            _style: &PlotStyle,
        ) -> Result<ArtifactHandle, PlotError> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(ArtifactHandle(format!("{}.png", request.file_stem()).into()))
        }
    }

    fn series(name: &str, values: Vec<f64>) -> StandardizedSeries {
        standardize(&ChannelSeries::new(name, 0.0, 1.0, values)).unwrap()
    }

    fn primary() -> StandardizedSeries {
        series("L1:RANGE", vec![1.0, 2.0, 3.0, 2.0, 1.0, 0.0])
    }

    #[test]
    fn test_above_threshold_makes_three_artifacts() {
        let primary = primary();
        let times: Vec<f64> = (0..6).map(|i| i as f64 * 60.0).collect();
        let plotter = RecordingPlotter::default();
        let style = PlotStyle::default();
        let ctx = AnalysisContext {
            primary: &primary,
            times: &times,
            threshold: 0.01,
            correlate: true,
            plotter: &plotter,
            style: &style,
        };
        let aux = Arc::new(series("L1:AUX", vec![-1.0, -2.0, -3.0, -2.0, -1.0, 0.0]));
        let record = analyze_channel(&ctx, &RegressionResult::new("L1:AUX", -0.4), aux).unwrap();
        assert_eq!(record.status, AnalysisStatus::Analyzed);
        assert!((record.correlation + 1.0).abs() < 1e-12);
        assert!(record.artifacts.is_some());

        let requests = plotter.requests.lock().unwrap();
        assert_eq!(requests.len(), 3);
        let comparison = requests
            .iter()
            .find(|r| r.kind == PlotKind::SignCorrectedComparison)
            .unwrap();
        // sign correction lines the auxiliary trace up with the primary
        assert_eq!(comparison.series[0].y, comparison.series[1].y);
    }

    #[test]
    fn test_below_threshold_and_second_trend() {
        let primary = primary();
        let times: Vec<f64> = (0..6).map(|i| i as f64).collect();
        let plotter = RecordingPlotter::default();
        let style = PlotStyle::default();
        let ctx = AnalysisContext {
            primary: &primary,
            times: &times,
            threshold: 0.5,
            correlate: false,
            plotter: &plotter,
            style: &style,
        };
        let aux = Arc::new(series("L1:AUX", vec![1.0, 2.0, 3.0, 2.0, 1.0, 0.5]));
        let record = analyze_channel(&ctx, &RegressionResult::new("L1:AUX", 0.2), aux).unwrap();
        assert_eq!(record.status, AnalysisStatus::BelowThreshold);
        assert_eq!(record.correlation, 0.0);
        assert!(record.artifacts.is_none());
        assert!(plotter.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn test_channel_failure_is_downgraded() {
        let primary = primary();
        let times: Vec<f64> = (0..6).map(|i| i as f64).collect();
        let plotter = RecordingPlotter::default();
        let style = PlotStyle::default();
        let ctx = AnalysisContext {
            primary: &primary,
            times: &times,
            threshold: 0.0,
            correlate: true,
            plotter: &plotter,
            style: &style,
        };
        let mut broken = series("L1:AUX", vec![1.0, 2.0, 3.0, 2.0, 1.0, 0.5]);
        broken.values[3] = f64::NAN;
        let record =
            analyze_channel(&ctx, &RegressionResult::new("L1:AUX", 0.2), Arc::new(broken)).unwrap();
        assert!(matches!(record.status, AnalysisStatus::Failed(_)));
        assert!(record.artifacts.is_none());
    }

    #[test]
    fn test_bad_primary_is_fatal() {
        let mut primary = primary();
        primary.values[0] = f64::INFINITY;
        let times: Vec<f64> = (0..6).map(|i| i as f64).collect();
        let plotter = RecordingPlotter::default();
        let style = PlotStyle::default();
        let ctx = AnalysisContext {
            primary: &primary,
            times: &times,
            threshold: 0.0,
            correlate: true,
            plotter: &plotter,
            style: &style,
        };
        let aux = Arc::new(series("L1:AUX", vec![1.0, 2.0, 3.0, 2.0, 1.0, 0.5]));
        assert!(matches!(
            analyze_channel(&ctx, &RegressionResult::new("L1:AUX", 0.2), aux),
            Err(AnalyzerError::Primary(_))
        ));
    }
}
