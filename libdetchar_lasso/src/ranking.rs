use serde::Serialize;

/// One auxiliary channel's Lasso coefficient
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegressionResult {
    pub channel: String,
    pub coefficient: f64,
}

impl RegressionResult {
    pub fn new(channel: &str, coefficient: f64) -> Self {
        Self {
            channel: channel.to_string(),
            coefficient,
        }
    }

    /// Ordering key only; never stored apart from the signed coefficient
    pub fn rank(&self) -> f64 {
        self.coefficient.abs()
    }

    pub fn is_selected(&self) -> bool {
        self.coefficient != 0.0
    }
}

/// Ranked channels split by whether the Lasso kept them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub selected: Vec<RegressionResult>,
    pub zeroed: Vec<RegressionResult>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn len(&self) -> usize {
        self.selected.len() + self.zeroed.len()
    }
}

/// Pair channel names with their coefficients and sort by |coefficient|, descending.
///
/// The sort is stable, so equal magnitudes keep the order the channels were given in.
pub fn rank_results(channels: &[String], coefficients: &[f64]) -> Vec<RegressionResult> {
    let mut results: Vec<RegressionResult> = channels
        .iter()
        .zip(coefficients.iter())
        .map(|(name, coef)| RegressionResult::new(name, *coef))
        .collect();
    results.sort_by(|a, b| b.rank().total_cmp(&a.rank()));
    results
}

/// Split ranked results into selected (nonzero) and zeroed (exactly zero)
pub fn partition(ranked: Vec<RegressionResult>) -> Selection {
    let (selected, zeroed) = ranked.into_iter().partition(|r| r.is_selected());
    Selection { selected, zeroed }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("L1:CH{i}")).collect()
    }

    #[test]
    fn test_rank_is_stable_on_ties() {
        let ranked = rank_results(&names(5), &[0.0, -0.5, 0.5, 0.1, 0.0]);
        let order: Vec<&str> = ranked.iter().map(|r| r.channel.as_str()).collect();
        assert_eq!(order, vec!["L1:CH1", "L1:CH2", "L1:CH3", "L1:CH0", "L1:CH4"]);
        assert_eq!(ranked[0].coefficient, -0.5);
    }

    #[test]
    fn test_partition_is_exact() {
        let coefficients = [0.0, 1e-300, -0.2, 0.0, -0.0, 3.0];
        let selection = partition(rank_results(&names(6), &coefficients));
        assert_eq!(selection.len(), 6);
        assert_eq!(selection.selected.len(), 3);
        assert_eq!(selection.zeroed.len(), 3);
        for r in selection.selected.iter() {
            assert!(!selection.zeroed.iter().any(|z| z.channel == r.channel));
            assert!(r.coefficient != 0.0);
        }
        assert!(selection.zeroed.iter().all(|z| z.coefficient == 0.0));
    }

    #[test]
    fn test_empty_selection_is_valid() {
        let selection = partition(rank_results(&names(3), &[0.0, 0.0, 0.0]));
        assert!(selection.is_empty());
        assert_eq!(selection.zeroed.len(), 3);
    }
}
