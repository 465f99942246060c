use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use super::config::PlotStyle;
use super::plotter::{ArtifactHandle, PlotKind, PlotRequest, PlotSeries, Plotter};
use super::ranking::RegressionResult;
use super::series::StandardizedSeries;
use super::stats;

/// Shared, read-only inputs of the clustering fan-out
pub struct ClusterContext<'a> {
    /// Every retained auxiliary channel, selected or not
    pub channels: &'a [Arc<StandardizedSeries>],
    pub times: &'a [f64],
    pub threshold: f64,
    pub max_display: usize,
    pub plotter: &'a dyn Plotter,
    pub style: &'a PlotStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterMember {
    pub channel: String,
    pub correlation: f64,
}

/// Channels correlated with an anchor, sorted by |r| descending then by name
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterEntry {
    pub anchor: String,
    pub anchor_coefficient: f64,
    pub members: Vec<ClusterMember>,
    pub max_display: usize,
    pub full_table: Option<PathBuf>,
    pub artifact: Option<ArtifactHandle>,
}

impl ClusterEntry {
    /// The members shown inline
    pub fn displayed(&self) -> &[ClusterMember] {
        &self.members[..self.members.len().min(self.max_display)]
    }

    pub fn is_truncated(&self) -> bool {
        self.members.len() > self.max_display
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClusterOutcome {
    Correlated(ClusterEntry),
    NoCorrelatedChannels { anchor: String },
}

impl ClusterOutcome {
    pub fn anchor(&self) -> &str {
        match self {
            Self::Correlated(entry) => &entry.anchor,
            Self::NoCorrelatedChannels { anchor } => anchor,
        }
    }
}

/// Sorted members of the cluster around `anchor`, excluding the anchor itself
pub fn find_members(
    anchor: &StandardizedSeries,
    channels: &[Arc<StandardizedSeries>],
    threshold: f64,
) -> Vec<ClusterMember> {
    let mut members: Vec<ClusterMember> = channels
        .iter()
        .filter(|other| other.name != anchor.name)
        .filter_map(|other| {
            let correlation = stats::pearson(&anchor.values, &other.values);
            if correlation.abs() >= threshold {
                Some(ClusterMember {
                    channel: other.name.clone(),
                    correlation,
                })
            } else {
                None
            }
        })
        .collect();
    members.sort_by(|a, b| {
        b.correlation
            .abs()
            .total_cmp(&a.correlation.abs())
            .then_with(|| a.channel.cmp(&b.channel))
    });
    members
}

/// Build the cluster for one selected channel
pub fn build_cluster(
    ctx: &ClusterContext,
    anchor: &RegressionResult,
    anchor_series: &StandardizedSeries,
) -> ClusterOutcome {
    let members = find_members(anchor_series, ctx.channels, ctx.threshold);
    if members.is_empty() {
        return ClusterOutcome::NoCorrelatedChannels {
            anchor: anchor.channel.clone(),
        };
    }

    let mut entry = ClusterEntry {
        anchor: anchor.channel.clone(),
        anchor_coefficient: anchor.coefficient,
        members,
        max_display: ctx.max_display,
        full_table: None,
        artifact: None,
    };
    match ctx.plotter.plot(&comparison_request(ctx, &entry, anchor_series), ctx.style) {
        Ok(handle) => entry.artifact = Some(handle),
        Err(e) => spdlog::warn!("Could not plot cluster of {}: {e}", entry.anchor),
    }
    ClusterOutcome::Correlated(entry)
}

// Anti-correlated members are negated so every trace lines up with the anchor
fn comparison_request(
    ctx: &ClusterContext,
    entry: &ClusterEntry,
    anchor_series: &StandardizedSeries,
) -> PlotRequest {
    let anchor_sign = entry.anchor_coefficient.signum();
    let mut series = vec![PlotSeries::new(
        &entry.anchor,
        ctx.times.to_vec(),
        anchor_series.values.iter().map(|v| v * anchor_sign).collect(),
    )];
    for member in entry.displayed() {
        let Some(other) = ctx.channels.iter().find(|c| c.name == member.channel) else {
            continue;
        };
        let sign = anchor_sign * member.correlation.signum();
        let label = if sign < 0.0 {
            format!("-1 x {}", member.channel)
        } else {
            member.channel.clone()
        };
        series.push(PlotSeries::new(
            &label,
            ctx.times.to_vec(),
            other.values.iter().map(|v| v * sign).collect(),
        ));
    }
    PlotRequest {
        kind: PlotKind::ClusterComparison,
        channel: entry.anchor.clone(),
        title: format!("Channels correlated with {}", entry.anchor),
        x_label: String::from("GPS time [s]"),
        y_label: String::from("Standardized amplitude"),
        series,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlotError;
    use crate::preprocess::standardize;
    use crate::series::ChannelSeries;

    struct NullPlotter;

    impl Plotter for NullPlotter {
        fn plot(
            &self,
            request: &PlotRequest,
            _style: &PlotStyle,
        ) -> Result<ArtifactHandle, PlotError> {
            Ok(ArtifactHandle(PathBuf::from(request.file_stem())))
        }
    }

    fn channel(name: &str, values: Vec<f64>) -> Arc<StandardizedSeries> {
        Arc::new(standardize(&ChannelSeries::new(name, 0.0, 1.0, values)).unwrap())
    }

    fn channels(n_extra: usize) -> Vec<Arc<StandardizedSeries>> {
        let base: Vec<f64> = (0..32).map(|i| (i as f64 * 0.4).sin()).collect();
        let mut out = vec![
            channel("L1:A", base.clone()),
            channel("L1:B", base.clone()),
            channel("L1:C", base.iter().map(|v| -v).collect()),
            channel("L1:D", (0..32).map(|i| ((i * 7919) % 13) as f64).collect()),
        ];
        for k in 0..n_extra {
            out.push(channel(
                &format!("L1:E{k:02}"),
                base.iter().map(|v| v * (k + 1) as f64).collect(),
            ));
        }
        out
    }

    #[test]
    fn test_cluster_symmetry() {
        let mut set = channels(0);
        let base: Vec<f64> = (0..32).map(|i| (i as f64 * 0.4).sin()).collect();
        let noisy: Vec<f64> = base
            .iter()
            .enumerate()
            .map(|(i, v)| 2.0 * v + 0.05 * ((i % 3) as f64 - 1.0))
            .collect();
        set.push(channel("L1:F", noisy));
        let a_members = find_members(&set[0], &set, 0.85);
        let f_members = find_members(&set[4], &set, 0.85);
        assert!(a_members.iter().any(|m| m.channel == "L1:F"));
        assert!(f_members.iter().any(|m| m.channel == "L1:A"));
        assert!(!a_members.iter().any(|m| m.channel == "L1:A"));
        assert!(!a_members.iter().any(|m| m.channel == "L1:D"));
    }

    #[test]
    fn test_members_sorted_by_magnitude_then_name() {
        let set = channels(0);
        let members = find_members(&set[0], &set, 0.85);
        let names: Vec<&str> = members.iter().map(|m| m.channel.as_str()).collect();
        // B is a copy of A and C its negation, so |r| ties exactly
        assert_eq!(names, vec!["L1:B", "L1:C"]);
        assert!(members[1].correlation < 0.0);
    }

    #[test]
    fn test_truncated_display() {
        let set = channels(25);
        let times: Vec<f64> = (0..32).map(|i| i as f64).collect();
        let style = PlotStyle::default();
        let ctx = ClusterContext {
            channels: &set,
            times: &times,
            threshold: 0.85,
            max_display: 20,
            plotter: &NullPlotter,
            style: &style,
        };
        let anchor = RegressionResult::new("L1:A", 0.3);
        match build_cluster(&ctx, &anchor, &set[0]) {
            ClusterOutcome::Correlated(entry) => {
                assert_eq!(entry.members.len(), 27);
                assert_eq!(entry.displayed().len(), 20);
                assert!(entry.is_truncated());
                assert!(entry.artifact.is_some());
            }
            other => panic!("expected a cluster, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_cluster_is_explicit() {
        let set = channels(0);
        let times: Vec<f64> = (0..32).map(|i| i as f64).collect();
        let style = PlotStyle::default();
        let ctx = ClusterContext {
            channels: &set,
            times: &times,
            threshold: 0.85,
            max_display: 20,
            plotter: &NullPlotter,
            style: &style,
        };
        let anchor = RegressionResult::new("L1:D", 0.3);
        assert_eq!(
            build_cluster(&ctx, &anchor, &set[3]),
            ClusterOutcome::NoCorrelatedChannels {
                anchor: String::from("L1:D")
            }
        );
    }
}
