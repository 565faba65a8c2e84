// Decoding module
// Cross-validated, time-resolved logistic-regression decoding scored by ROC-AUC

pub mod decoder;
pub mod folds;
pub mod logistic;
pub mod metrics;
pub mod scaler;
pub mod types;

pub use decoder::{DecoderConfig, TimeResolvedDecoder};
pub use folds::{make_folds, Fold, FoldStrategy};
pub use logistic::{LogisticConfig, LogisticRegression, ScaledLogistic};
pub use metrics::roc_auc;
pub use scaler::StandardScaler;
pub use types::{AccuracyCurve, DecodeError, DecodeResult, CHANCE_LEVEL};
