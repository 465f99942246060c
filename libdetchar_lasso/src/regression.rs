use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::error::RegressionError;
use super::series::StandardizedSeries;

/// Solver and model-selection parameters for the Lasso fit
#[derive(Debug, Clone)]
pub struct LassoParams {
    pub max_iter: usize,
    pub tol: f64,
    pub n_alphas: usize,
    pub eps: f64,
    pub cv_folds: usize,
    pub seed: u64,
}

impl Default for LassoParams {
    fn default() -> Self {
        Self {
            max_iter: 10_000,
            tol: 1.0e-6,
            n_alphas: 100,
            eps: 1.0e-3,
            cv_folds: 5,
            seed: 0,
        }
    }
}

/// The outcome of a Lasso fit. Coefficients are in the same order as the design matrix
/// columns.
#[derive(Debug, Clone, PartialEq)]
pub struct LassoFit {
    pub alpha: f64,
    pub alpha_from_cv: bool,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub n_iter: usize,
    pub converged: bool,
}

impl LassoFit {
    /// Model prediction for each row of the design matrix
    pub fn predict(&self, x: &Array2<f64>) -> Vec<f64> {
        let coef = Array1::from(self.coefficients.clone());
        (x.dot(&coef) + self.intercept).to_vec()
    }
}

struct DescentOutcome {
    coefficients: Array1<f64>,
    intercept: f64,
    n_iter: usize,
    converged: bool,
}

/// Soft thresholding operator. Returns an exact zero inside `[-gamma, gamma]`.
pub fn soft_threshold(value: f64, gamma: f64) -> f64 {
    if value > gamma {
        value - gamma
    } else if value < -gamma {
        value + gamma
    } else {
        0.0
    }
}

/// Build the `samples x channels` design matrix from standardized auxiliary channels
pub fn design_matrix(aux: &[&StandardizedSeries]) -> Result<Array2<f64>, RegressionError> {
    let n_samples = match aux.first() {
        Some(first) => first.len(),
        None => return Err(RegressionError::NoChannels),
    };
    if let Some(bad) = aux.iter().find(|s| s.len() != n_samples) {
        return Err(RegressionError::ShapeMismatch(n_samples, bad.len()));
    }
    Ok(Array2::from_shape_fn((n_samples, aux.len()), |(i, j)| {
        aux[j].values[i]
    }))
}

/// Fit `y ~ X` with an L1 penalty, minimizing `(1/2n)|y - Xb|^2 + alpha |b|_1`.
///
/// If no alpha is given it is chosen by seeded K-fold cross-validation over a log-spaced
/// path, so the result is deterministic for a fixed seed.
pub fn fit(
    x: &Array2<f64>,
    y: &[f64],
    alpha: Option<f64>,
    params: &LassoParams,
) -> Result<LassoFit, RegressionError> {
    if x.ncols() == 0 {
        return Err(RegressionError::NoChannels);
    }
    if x.nrows() == 0 {
        return Err(RegressionError::NoSamples);
    }
    if x.nrows() != y.len() {
        return Err(RegressionError::ShapeMismatch(x.nrows(), y.len()));
    }
    let y = ArrayView1::from(y);

    let (alpha, alpha_from_cv) = match alpha {
        Some(a) if a.is_finite() && a >= 0.0 => (a, false),
        Some(a) => return Err(RegressionError::InvalidAlpha(a)),
        None => (select_alpha(x.view(), y, params)?, true),
    };

    let outcome = fit_centered(x.view(), y, alpha, None, params);
    if !outcome.converged {
        spdlog::warn!(
            "Lasso did not converge after {} iterations at alpha {alpha:e}",
            outcome.n_iter
        );
    }
    Ok(LassoFit {
        alpha,
        alpha_from_cv,
        coefficients: outcome.coefficients.to_vec(),
        intercept: outcome.intercept,
        n_iter: outcome.n_iter,
        converged: outcome.converged,
    })
}

/// Largest useful penalty: above it every coefficient is zero
pub fn alpha_max(x: ArrayView2<f64>, y: ArrayView1<f64>) -> f64 {
    let (xc, _) = center_columns(x);
    let yc = &y - y.sum() / y.len() as f64;
    let n = x.nrows() as f64;
    xc.t()
        .dot(&yc)
        .iter()
        .fold(0.0_f64, |acc, v| acc.max(v.abs()))
        / n
}

/// Log-spaced alphas from `alpha_max` down to `eps * alpha_max`
pub fn alpha_grid(alpha_max: f64, eps: f64, n_alphas: usize) -> Vec<f64> {
    if n_alphas <= 1 {
        return vec![alpha_max];
    }
    let log_max = alpha_max.log10();
    let log_min = (alpha_max * eps).log10();
    let step = (log_max - log_min) / (n_alphas - 1) as f64;
    (0..n_alphas)
        .map(|idx| 10.0_f64.powf(log_max - step * idx as f64))
        .collect()
}

/// Choose alpha by K-fold cross-validation.
///
/// Fold membership is shuffled with a seeded generator. Ties in held-out error go to
/// the larger alpha.
pub fn select_alpha(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    params: &LassoParams,
) -> Result<f64, RegressionError> {
    let n = x.nrows();
    if n < params.cv_folds || params.cv_folds < 2 {
        return Err(RegressionError::TooFewSamples(params.cv_folds.max(2), n));
    }
    let top = alpha_max(x, y);
    if top <= 0.0 {
        spdlog::warn!("No auxiliary channel correlates with the primary; using alpha = 0");
        return Ok(0.0);
    }
    let alphas = alpha_grid(top, params.eps, params.n_alphas);

    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(params.seed);
    order.shuffle(&mut rng);
    let mut fold_of = vec![0; n];
    for (pos, row) in order.iter().enumerate() {
        fold_of[*row] = pos % params.cv_folds;
    }

    let mut mse = vec![0.0; alphas.len()];
    for fold in 0..params.cv_folds {
        let train: Vec<usize> = (0..n).filter(|r| fold_of[*r] != fold).collect();
        let test: Vec<usize> = (0..n).filter(|r| fold_of[*r] == fold).collect();
        let x_train = x.select(Axis(0), &train);
        let y_train = y.select(Axis(0), &train);
        let x_test = x.select(Axis(0), &test);
        let y_test = y.select(Axis(0), &test);

        let mut warm: Option<Array1<f64>> = None;
        for (idx, alpha) in alphas.iter().enumerate() {
            let outcome = fit_centered(
                x_train.view(),
                y_train.view(),
                *alpha,
                warm.as_ref(),
                params,
            );
            let prediction = x_test.dot(&outcome.coefficients) + outcome.intercept;
            let err = (&y_test - &prediction).mapv(|r| r * r).sum() / test.len() as f64;
            mse[idx] += err / params.cv_folds as f64;
            warm = Some(outcome.coefficients);
        }
    }

    let mut best = 0;
    for idx in 1..alphas.len() {
        if mse[idx] < mse[best] {
            best = idx;
        }
    }
    spdlog::info!(
        "Cross-validation chose alpha {:e} (mean held-out MSE {:.4e})",
        alphas[best],
        mse[best]
    );
    Ok(alphas[best])
}

fn center_columns(x: ArrayView2<f64>) -> (Array2<f64>, Array1<f64>) {
    let means = x.sum_axis(Axis(0)) / x.nrows().max(1) as f64;
    (&x - &means, means)
}

fn fit_centered(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    alpha: f64,
    warm: Option<&Array1<f64>>,
    params: &LassoParams,
) -> DescentOutcome {
    let (xc, x_means) = center_columns(x);
    let y_mean = y.sum() / y.len().max(1) as f64;
    let yc = &y - y_mean;
    let (coefficients, n_iter, converged) =
        coordinate_descent(xc.view(), yc.view(), alpha, warm, params);
    let intercept = y_mean - x_means.dot(&coefficients);
    DescentOutcome {
        coefficients,
        intercept,
        n_iter,
        converged,
    }
}

/// Cyclic coordinate descent on centered data.
///
/// Returns the coefficients, the number of sweeps, and whether the largest update
/// fell below `tol` relative to the largest coefficient.
pub fn coordinate_descent(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    alpha: f64,
    warm: Option<&Array1<f64>>,
    params: &LassoParams,
) -> (Array1<f64>, usize, bool) {
    let n_features = x.ncols();
    let gamma = alpha * x.nrows() as f64;
    let mut beta = match warm {
        Some(w) if w.len() == n_features => w.clone(),
        _ => Array1::zeros(n_features),
    };
    let col_norms: Vec<f64> = x.columns().into_iter().map(|c| c.dot(&c)).collect();
    let mut residual = &y - &x.dot(&beta);

    for sweep in 0..params.max_iter {
        let mut max_delta: f64 = 0.0;
        let mut max_beta: f64 = 0.0;
        for j in 0..n_features {
            let norm = col_norms[j];
            if norm == 0.0 {
                beta[j] = 0.0;
                continue;
            }
            let column = x.column(j);
            let old = beta[j];
            let rho = column.dot(&residual) + norm * old;
            let new = soft_threshold(rho, gamma) / norm;
            if new != old {
                residual.scaled_add(old - new, &column);
            }
            beta[j] = new;
            max_delta = max_delta.max((new - old).abs());
            max_beta = max_beta.max(new.abs());
        }
        if max_beta == 0.0 || max_delta / max_beta < params.tol {
            return (beta, sweep + 1, true);
        }
    }
    (beta, params.max_iter, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::standardize;
    use crate::series::ChannelSeries;
    use rand::Rng;

    fn noise(seed: u64, n: usize) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect()
    }

    fn standardized(name: &str, values: Vec<f64>) -> StandardizedSeries {
        standardize(&ChannelSeries::new(name, 0.0, 1.0, values)).unwrap()
    }

    fn copy_and_noise(n: usize) -> (StandardizedSeries, Vec<StandardizedSeries>) {
        let primary: Vec<f64> = (0..n)
            .map(|i| (i as f64 * 0.05).sin() + 0.1 * (i as f64 * 0.31).cos())
            .collect();
        let y = standardized("L1:PRIMARY", primary.clone());
        let aux = vec![
            standardized("L1:COPY", primary),
            standardized("L1:NOISE_A", noise(1, n)),
            standardized("L1:NOISE_B", noise(2, n)),
        ];
        (y, aux)
    }

    #[test]
    fn test_soft_threshold_is_exact_zero() {
        assert_eq!(soft_threshold(0.5, 1.0), 0.0);
        assert_eq!(soft_threshold(-1.0, 1.0), 0.0);
        assert_eq!(soft_threshold(3.0, 1.0), 2.0);
        assert_eq!(soft_threshold(-3.0, 1.0), -2.0);
    }

    #[test]
    fn test_identical_channel_selected_noise_zeroed() {
        let (y, aux) = copy_and_noise(400);
        let refs: Vec<&StandardizedSeries> = aux.iter().collect();
        let x = design_matrix(&refs).unwrap();
        let params = LassoParams::default();
        for alpha in [0.01, 0.1, 0.5] {
            let fit = fit(&x, &y.values, Some(alpha), &params).unwrap();
            assert!(fit.converged);
            assert!((fit.coefficients[0] - (1.0 - alpha)).abs() < 1e-6);
            assert_eq!(fit.coefficients[1], 0.0);
            assert_eq!(fit.coefficients[2], 0.0);
        }
    }

    #[test]
    fn test_noise_contribution_shrinks_with_alpha() {
        let n = 400;
        let signal: Vec<f64> = (0..n).map(|i| (i as f64 * 0.05).sin()).collect();
        let wiggle = noise(7, n);
        let primary: Vec<f64> = signal
            .iter()
            .zip(wiggle.iter())
            .map(|(s, w)| s + 0.3 * w)
            .collect();
        let y = standardized("L1:PRIMARY", primary);
        let aux = [
            standardized("L1:SIGNAL", signal),
            standardized("L1:WIGGLE", wiggle),
        ];
        let refs: Vec<&StandardizedSeries> = aux.iter().collect();
        let x = design_matrix(&refs).unwrap();
        let params = LassoParams::default();
        let small = fit(&x, &y.values, Some(0.001), &params).unwrap();
        let medium = fit(&x, &y.values, Some(0.05), &params).unwrap();
        let large = fit(&x, &y.values, Some(1.0), &params).unwrap();
        assert!(small.coefficients[1].abs() > medium.coefficients[1].abs());
        assert!(small.coefficients[1] != 0.0);
        assert!(large.coefficients.iter().all(|c| *c == 0.0));
    }

    #[test]
    fn test_cross_validation_is_deterministic() {
        let (y, aux) = copy_and_noise(200);
        let refs: Vec<&StandardizedSeries> = aux.iter().collect();
        let x = design_matrix(&refs).unwrap();
        let params = LassoParams {
            n_alphas: 20,
            seed: 42,
            ..Default::default()
        };
        let first = fit(&x, &y.values, None, &params).unwrap();
        let second = fit(&x, &y.values, None, &params).unwrap();
        assert!(first.alpha_from_cv);
        assert_eq!(first, second);
        assert!(first.coefficients[0] > 0.0);
        let top = alpha_max(x.view(), ArrayView1::from(&y.values));
        assert!(first.alpha <= top * 1.000_001 && first.alpha >= top * params.eps * 0.999);
    }

    #[test]
    fn test_alpha_grid() {
        let grid = alpha_grid(1.0, 1e-3, 4);
        assert_eq!(grid.len(), 4);
        assert!((grid[0] - 1.0).abs() < 1e-12);
        assert!((grid[3] - 1e-3).abs() < 1e-12);
        assert!(grid.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_shape_errors() {
        let aux = [standardized("L1:A", vec![1.0, 2.0, 3.0])];
        let refs: Vec<&StandardizedSeries> = aux.iter().collect();
        let x = design_matrix(&refs).unwrap();
        assert!(matches!(
            fit(&x, &[1.0, 2.0], Some(0.1), &LassoParams::default()),
            Err(RegressionError::ShapeMismatch(3, 2))
        ));
        assert!(matches!(design_matrix(&[]), Err(RegressionError::NoChannels)));
        assert!(matches!(
            fit(&x, &[1.0, 2.0, 3.0], Some(-1.0), &LassoParams::default()),
            Err(RegressionError::InvalidAlpha(_))
        ));
    }
}
