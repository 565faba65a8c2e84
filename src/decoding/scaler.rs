// Feature standardization
// Per-channel zero-mean / unit-variance scaling fitted on training trials only

use ndarray::{Array1, Array2, ArrayView2, Axis};

/// Columns with a standard deviation below this are left unscaled
const MIN_SCALE: f64 = 1e-12;

/// Standard scaler over the channel (column) axis
#[derive(Debug, Clone)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    /// Learn per-column mean and population standard deviation
    /// Constant columns get a scale of 1 so they map to zero.
    pub fn fit(x: ArrayView2<'_, f64>) -> Self {
        let n_features = x.ncols();
        if x.nrows() == 0 {
            return StandardScaler {
                mean: Array1::zeros(n_features),
                scale: Array1::ones(n_features),
            };
        }

        let mean = x
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(n_features));
        let scale = x
            .var_axis(Axis(0), 0.0)
            .mapv(|var| {
                let std = var.sqrt();
                if std.is_finite() && std > MIN_SCALE {
                    std
                } else {
                    1.0
                }
            });

        StandardScaler { mean, scale }
    }

    /// Apply the learned scaling to new rows
    pub fn transform(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        (&x - &self.mean) / &self.scale
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn scale(&self) -> &Array1<f64> {
        &self.scale
    }
}
