// L2-regularized logistic regression
// Newton (IRLS) solver with backtracking, suited to small trial counts

use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::decoding::scaler::StandardScaler;
use crate::decoding::types::{DecodeError, DecodeResult};

/// Ridge added to the intercept curvature so the Newton system stays positive definite
const INTERCEPT_RIDGE: f64 = 1e-8;

/// Smallest step fraction tried by the line search
const MIN_STEP: f64 = 1e-10;

/// Solver settings
///
/// Minimizes the L2-penalized logistic loss
/// `0.5 * |w|^2 + c * sum(log(1 + exp(-y_i * (w . x_i + b))))`.
/// The intercept `b` is not penalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticConfig {
    /// Inverse regularization strength (larger = weaker penalty)
    pub c: f64,

    /// Maximum Newton iterations
    pub max_iter: usize,

    /// Stop once the largest parameter update falls below this
    pub tolerance: f64,
}

impl Default for LogisticConfig {
    fn default() -> Self {
        LogisticConfig {
            c: 1.0,
            max_iter: 100,
            tolerance: 1e-6,
        }
    }
}

/// A fitted binary logistic model
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    weights: Array1<f64>,
    intercept: f64,
    iterations: usize,
    converged: bool,
}

impl LogisticRegression {
    /// Fit on rows of `x` with boolean targets
    ///
    /// A training set holding a single class yields a constant model whose
    /// decision function scores every row identically.
    pub fn fit(x: ArrayView2<'_, f64>, y: &[bool], config: &LogisticConfig) -> DecodeResult<Self> {
        let (n, d) = x.dim();
        if y.len() != n {
            return Err(DecodeError::LabelLengthMismatch {
                labels: y.len(),
                trials: n,
            });
        }

        let positives = y.iter().filter(|&&l| l).count();
        if positives == 0 || positives == n {
            return Ok(Self::constant(d));
        }

        let design = DMatrix::from_fn(n, d + 1, |i, j| if j < d { x[[i, j]] } else { 1.0 });
        let targets = DVector::from_iterator(n, y.iter().map(|&l| if l { 1.0 } else { 0.0 }));
        let c = config.c;

        let mut beta = DVector::<f64>::zeros(d + 1);
        let mut loss = objective(&design, &targets, &beta, c, d);
        let mut iterations = 0;
        let mut converged = false;

        while iterations < config.max_iter {
            iterations += 1;

            let probabilities = (&design * &beta).map(sigmoid);
            let residual = &probabilities - &targets;

            let mut gradient = design.transpose() * &residual * c;
            for j in 0..d {
                gradient[j] += beta[j];
            }

            let curvature = probabilities.map(|p| (p * (1.0 - p)).max(1e-12) * c);
            let weighted = DMatrix::from_fn(n, d + 1, |i, j| design[(i, j)] * curvature[i]);
            let mut hessian = design.transpose() * weighted;
            for j in 0..d {
                hessian[(j, j)] += 1.0;
            }
            hessian[(d, d)] += INTERCEPT_RIDGE;

            let direction = match hessian.cholesky() {
                Some(cholesky) => cholesky.solve(&gradient),
                None => gradient.clone(),
            };

            // Backtrack until the objective does not increase
            let mut step = 1.0;
            let mut candidate = &beta - &direction * step;
            let mut candidate_loss = objective(&design, &targets, &candidate, c, d);
            while candidate_loss > loss && step > MIN_STEP {
                step *= 0.5;
                candidate = &beta - &direction * step;
                candidate_loss = objective(&design, &targets, &candidate, c, d);
            }

            let change = (&candidate - &beta).amax();
            if candidate_loss <= loss {
                beta = candidate;
                loss = candidate_loss;
            }

            if change < config.tolerance || step <= MIN_STEP {
                converged = change < config.tolerance;
                break;
            }
        }

        if !converged {
            log::debug!(
                "Logistic regression stopped after {} iterations without converging",
                iterations
            );
        }

        Ok(LogisticRegression {
            weights: Array1::from_iter(beta.rows(0, d).iter().copied()),
            intercept: beta[d],
            iterations,
            converged,
        })
    }

    fn constant(n_features: usize) -> Self {
        LogisticRegression {
            weights: Array1::zeros(n_features),
            intercept: 0.0,
            iterations: 0,
            converged: true,
        }
    }

    /// Signed distance to the decision boundary (log-odds of the positive class)
    pub fn decision_function(&self, x: ArrayView2<'_, f64>) -> Array1<f64> {
        x.dot(&self.weights) + self.intercept
    }

    /// Probability of the positive class
    pub fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Array1<f64> {
        self.decision_function(x).mapv(sigmoid)
    }

    pub fn weights(&self) -> &Array1<f64> {
        &self.weights
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn converged(&self) -> bool {
        self.converged
    }
}

/// Standardization followed by logistic regression, fitted as one unit
#[derive(Debug, Clone)]
pub struct ScaledLogistic {
    scaler: StandardScaler,
    model: LogisticRegression,
}

impl ScaledLogistic {
    pub fn fit(x: ArrayView2<'_, f64>, y: &[bool], config: &LogisticConfig) -> DecodeResult<Self> {
        let scaler = StandardScaler::fit(x);
        let scaled = scaler.transform(x);
        let model = LogisticRegression::fit(scaled.view(), y, config)?;
        Ok(ScaledLogistic { scaler, model })
    }

    pub fn decision_function(&self, x: ArrayView2<'_, f64>) -> Array1<f64> {
        let scaled = self.scaler.transform(x);
        self.model.decision_function(scaled.view())
    }

    pub fn model(&self) -> &LogisticRegression {
        &self.model
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// log(1 + exp(z)) without overflow
fn log1p_exp(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}

fn objective(
    design: &DMatrix<f64>,
    targets: &DVector<f64>,
    beta: &DVector<f64>,
    c: f64,
    n_features: usize,
) -> f64 {
    let logits = design * beta;
    let data_term: f64 = logits
        .iter()
        .zip(targets.iter())
        .map(|(&z, &y)| log1p_exp(z) - y * z)
        .sum();
    let penalty = 0.5 * beta.rows(0, n_features).norm_squared();
    penalty + c * data_term
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};

    #[test]
    fn test_sigmoid_is_stable() {
        assert_abs_diff_eq!(sigmoid(0.0), 0.5, epsilon = 1e-15);
        assert!(sigmoid(800.0) <= 1.0);
        assert!(sigmoid(-800.0) >= 0.0);
        assert_abs_diff_eq!(log1p_exp(-800.0), 0.0, epsilon = 1e-15);
        assert_abs_diff_eq!(log1p_exp(800.0), 800.0, epsilon = 1e-9);
    }

    #[test]
    fn test_separable_data_ranks_correctly() {
        let x = array![[-2.0], [-1.5], [-1.0], [1.0], [1.5], [2.0]];
        let y = [false, false, false, true, true, true];

        let model = LogisticRegression::fit(x.view(), &y, &LogisticConfig::default()).unwrap();

        assert!(model.converged());
        assert!(model.weights()[0] > 0.0);
        let scores = model.decision_function(x.view());
        assert!(scores[2] < scores[3]);
        let probabilities = model.predict_proba(x.view());
        assert!(probabilities[0] < 0.5 && probabilities[5] > 0.5);
    }

    #[test]
    fn test_regularization_bounds_weights() {
        let x = array![[-1.0], [1.0]];
        let y = [false, true];

        let weak = LogisticRegression::fit(
            x.view(),
            &y,
            &LogisticConfig {
                c: 100.0,
                ..LogisticConfig::default()
            },
        )
        .unwrap();
        let strong = LogisticRegression::fit(
            x.view(),
            &y,
            &LogisticConfig {
                c: 0.01,
                ..LogisticConfig::default()
            },
        )
        .unwrap();

        assert!(weak.weights()[0].is_finite());
        assert!(strong.weights()[0] < weak.weights()[0]);
        assert_abs_diff_eq!(strong.intercept(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_gradient_vanishes_at_optimum() {
        let x = array![[0.2, 1.0], [1.1, -0.3], [-0.7, 0.4], [0.5, 0.5], [-1.2, -0.8], [0.9, 1.3]];
        let y = [true, true, false, false, false, true];
        let config = LogisticConfig::default();

        let model = LogisticRegression::fit(x.view(), &y, &config).unwrap();
        let p = model.predict_proba(x.view());

        // d/dw_j = w_j + c * sum((p_i - y_i) x_ij), d/db = c * sum(p_i - y_i)
        for j in 0..2 {
            let grad: f64 = model.weights()[j]
                + (0..6)
                    .map(|i| (p[i] - if y[i] { 1.0 } else { 0.0 }) * x[[i, j]])
                    .sum::<f64>();
            assert_abs_diff_eq!(grad, 0.0, epsilon = 1e-6);
        }
        let grad_b: f64 = (0..6).map(|i| p[i] - if y[i] { 1.0 } else { 0.0 }).sum();
        assert_abs_diff_eq!(grad_b, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_single_class_gives_constant_model() {
        let x = Array2::from_shape_fn((4, 3), |(i, j)| (i * j) as f64);
        let model = LogisticRegression::fit(x.view(), &[true; 4], &LogisticConfig::default()).unwrap();

        let scores = model.decision_function(x.view());
        assert!(scores.iter().all(|&s| s == scores[0]));
    }

    #[test]
    fn test_label_length_mismatch() {
        let x = Array2::<f64>::zeros((3, 1));
        let result = LogisticRegression::fit(x.view(), &[true, false], &LogisticConfig::default());
        assert!(matches!(
            result,
            Err(DecodeError::LabelLengthMismatch { labels: 2, trials: 3 })
        ));
    }

    #[test]
    fn test_scaled_pipeline_handles_large_offsets() {
        let x = array![[1000.0], [1000.5], [1001.0], [1003.0], [1003.5], [1004.0]];
        let y = [false, false, false, true, true, true];

        let pipeline = ScaledLogistic::fit(x.view(), &y, &LogisticConfig::default()).unwrap();
        let scores = pipeline.decision_function(array![[999.0], [1005.0]].view());

        assert!(scores[0] < 0.0);
        assert!(scores[1] > 0.0);
    }
}
