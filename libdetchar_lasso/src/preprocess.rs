use super::error::{ChannelDataError, PreprocessError};
use super::series::{ChannelSeries, ChannelSet, StandardizedSeries};
use super::stats;

// Passes of the outlier suppression before giving up
const MAX_OUTLIER_PASSES: usize = 5;

/// Result of a channel filter: the surviving set and the names that were dropped, in
/// input order.
#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    pub kept: ChannelSet,
    pub removed: Vec<String>,
}

/// A channel is flat when its finite samples have no usable spread.
///
/// Either every sample equals the first one, or the variance underflows to zero, which is
/// exactly the case `standardize` rejects. Channels with non-finite samples are never flat;
/// they belong to `remove_bad`.
pub fn is_flat(series: &ChannelSeries) -> bool {
    let first = match series.values.first() {
        Some(first) => first,
        None => return false,
    };
    if stats::first_non_finite(&series.values).is_some() {
        return false;
    }
    series.values.iter().all(|v| v == first) || stats::variance(&series.values) == 0.0
}

/// Check a single channel for samples the analysis cannot use.
///
/// `expected_len` is the length of the primary channel; auxiliary channels must match
/// it sample for sample.
pub fn check_channel(
    series: &ChannelSeries,
    sentinel: Option<f64>,
    expected_len: Option<usize>,
) -> Result<(), ChannelDataError> {
    if series.is_empty() {
        return Err(ChannelDataError::Empty(series.name.clone()));
    }
    if let Some(idx) = stats::first_non_finite(&series.values) {
        return Err(ChannelDataError::NonFinite(series.name.clone(), idx));
    }
    if let Some(bad) = sentinel {
        if let Some(idx) = series.values.iter().position(|v| *v == bad) {
            return Err(ChannelDataError::Sentinel(series.name.clone(), bad, idx));
        }
    }
    if !series.variance().is_finite() {
        return Err(ChannelDataError::VarianceOverflow(series.name.clone()));
    }
    if let Some(len) = expected_len {
        if series.len() != len {
            return Err(ChannelDataError::LengthMismatch(
                series.name.clone(),
                series.len(),
                len,
            ));
        }
    }
    Ok(())
}

/// Remove channels whose value never changes over the span
pub fn remove_flat(channels: ChannelSet) -> FilterOutcome {
    let (kept, dropped) = channels.partition(|series| !is_flat(series));
    for series in dropped.iter() {
        spdlog::warn!("{}", ChannelDataError::Flat(series.name.clone()));
    }
    FilterOutcome {
        kept,
        removed: dropped.names(),
    }
}

/// Remove channels with non-finite samples, sentinel values, or a length that does not
/// match the primary channel. An empty result is valid.
pub fn remove_bad(
    channels: ChannelSet,
    sentinel: Option<f64>,
    expected_len: Option<usize>,
) -> FilterOutcome {
    let (kept, dropped) =
        channels.partition(|series| match check_channel(series, sentinel, expected_len) {
            Ok(()) => true,
            Err(e) => {
                spdlog::warn!("Removing bad channel: {e}");
                false
            }
        });
    FilterOutcome {
        kept,
        removed: dropped.names(),
    }
}

/// Replace samples further than `sigma` standard deviations from the mean by the mean.
///
/// Repeats until nothing is replaced (at most a handful of passes) and returns the total
/// number of replaced samples.
pub fn remove_outliers(series: &mut ChannelSeries, sigma: f64) -> usize {
    let mut total = 0;
    for _ in 0..MAX_OUTLIER_PASSES {
        let mean = stats::mean(&series.values);
        let limit = sigma * stats::variance(&series.values).sqrt();
        let mut replaced = 0;
        for value in series.values.iter_mut() {
            if (*value - mean).abs() > limit {
                *value = mean;
                replaced += 1;
            }
        }
        total += replaced;
        if replaced == 0 {
            break;
        }
    }
    total
}

/// Zero-mean, unit-variance copy of a series
pub fn standardize(series: &ChannelSeries) -> Result<StandardizedSeries, PreprocessError> {
    let mean = stats::mean(&series.values);
    let std = stats::variance(&series.values).sqrt();
    if std == 0.0 || !std.is_finite() {
        return Err(PreprocessError::DegenerateChannel(series.name.clone()));
    }
    Ok(StandardizedSeries {
        name: series.name.clone(),
        mean,
        std,
        values: series.values.iter().map(|v| (v - mean) / std).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_set() -> ChannelSet {
        vec![
            ChannelSeries::new("L1:FLAT", 0.0, 1.0, vec![0.1; 8]),
            ChannelSeries::new("L1:RAMP", 0.0, 1.0, (0..8).map(|i| i as f64).collect()),
            ChannelSeries::new(
                "L1:NAN",
                0.0,
                1.0,
                vec![1.0, 2.0, f64::NAN, 4.0, 1.0, 2.0, 3.0, 4.0],
            ),
            ChannelSeries::new("L1:ZERO", 0.0, 1.0, vec![0.0; 8]),
            ChannelSeries::new("L1:SHORT", 0.0, 1.0, vec![1.0, 2.0, 3.0]),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_remove_flat_partitions_input() {
        let input = make_set();
        let input_names = input.names();
        let outcome = remove_flat(input);
        assert_eq!(outcome.removed, vec!["L1:FLAT", "L1:ZERO"]);
        for series in outcome.kept.iter() {
            assert!(!is_flat(series));
            assert!(series.variance() != 0.0);
        }
        let mut union: Vec<String> = outcome.kept.names();
        union.extend(outcome.removed.iter().cloned());
        union.sort();
        let mut expected = input_names;
        expected.sort();
        assert_eq!(union, expected);
    }

    #[test]
    fn test_remove_bad() {
        let outcome = remove_bad(remove_flat(make_set()).kept, None, Some(8));
        assert_eq!(outcome.kept.names(), vec!["L1:RAMP"]);
        assert_eq!(outcome.removed, vec!["L1:NAN", "L1:SHORT"]);

        let sentinel = ChannelSet::from_iter(vec![ChannelSeries::new(
            "L1:ERR",
            0.0,
            1.0,
            vec![1.0, -999.0, 2.0],
        )]);
        let outcome = remove_bad(sentinel, Some(-999.0), None);
        assert!(outcome.kept.is_empty());
        assert_eq!(outcome.removed, vec!["L1:ERR"]);
    }

    #[test]
    fn test_extreme_magnitudes_never_reach_standardize() {
        let tiny: Vec<f64> = (0..8).map(|i| if i % 2 == 0 { 1e-200 } else { 2e-200 }).collect();
        let huge: Vec<f64> = (0..8).map(|i| if i % 2 == 0 { 1e200 } else { -1e200 }).collect();
        let set: ChannelSet = vec![
            ChannelSeries::new("L1:TINY", 0.0, 1.0, tiny),
            ChannelSeries::new("L1:HUGE", 0.0, 1.0, huge),
            ChannelSeries::new("L1:RAMP", 0.0, 1.0, (0..8).map(|i| i as f64).collect()),
        ]
        .into_iter()
        .collect();

        let flat = remove_flat(set);
        assert_eq!(flat.removed, vec!["L1:TINY"]);
        let bad = remove_bad(flat.kept, None, Some(8));
        assert_eq!(bad.removed, vec!["L1:HUGE"]);
        for series in bad.kept.iter() {
            assert!(standardize(series).is_ok());
        }
    }

    #[test]
    fn test_infinite_channel_is_bad_not_flat() {
        let series = ChannelSeries::new("L1:INF", 0.0, 1.0, vec![f64::INFINITY; 4]);
        assert!(!is_flat(&series));
        assert_eq!(
            check_channel(&series, None, None),
            Err(ChannelDataError::NonFinite(String::from("L1:INF"), 0))
        );
    }

    #[test]
    fn test_standardize_roundtrip() {
        let series = ChannelSeries::new("L1:X", 0.0, 1.0, vec![3.5, -1.25, 7.0, 2.0, 1e3]);
        let scaled = standardize(&series).unwrap();
        assert!(stats::mean(&scaled.values).abs() < 1e-12);
        assert!((stats::variance(&scaled.values) - 1.0).abs() < 1e-12);
        for (a, b) in scaled.descale().iter().zip(series.values.iter()) {
            assert!((a - b).abs() <= 1e-9 * b.abs().max(1.0));
        }
    }

    #[test]
    fn test_standardize_flat_is_degenerate() {
        let series = ChannelSeries::new("L1:FLAT", 0.0, 1.0, vec![2.0; 4]);
        assert!(matches!(
            standardize(&series),
            Err(PreprocessError::DegenerateChannel(_))
        ));
    }

    #[test]
    fn test_remove_outliers() {
        let mut values = vec![1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0];
        values.push(100.0);
        let mut series = ChannelSeries::new("L1:GLITCH", 0.0, 1.0, values);
        let replaced = remove_outliers(&mut series, 3.0);
        assert_eq!(replaced, 1);
        assert!(series.values.iter().all(|v| v.abs() < 100.0));
    }
}
