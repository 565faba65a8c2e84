// Epoch resampling
// FFT-based (band-limited) resampling along the time axis of every trial and channel

use ndarray::{s, Array3, ArrayView1};
use realfft::num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use std::sync::Arc;

use crate::epochs::types::{time_axis, EpochError, EpochResult, TrialCollection};

/// Rates closer than this are treated as equal and resampling is skipped
const RATE_TOLERANCE_HZ: f64 = 1e-9;

/// Resamples fixed-length signals from `n_in` to `n_out` samples
///
/// Truncates (downsampling) or zero-pads (upsampling) the real spectrum and
/// transforms back. The Nyquist bin is folded when downsampling and split
/// when upsampling, so a band-limited signal keeps its amplitude.
pub struct Resampler {
    n_in: usize,
    n_out: usize,
    forward: Arc<dyn RealToComplex<f64>>,
    inverse: Arc<dyn ComplexToReal<f64>>,
}

impl Resampler {
    /// Plan the forward and inverse transforms once for a given length pair
    pub fn new(n_in: usize, n_out: usize) -> EpochResult<Self> {
        if n_in == 0 || n_out == 0 {
            return Err(EpochError::Resample(format!(
                "cannot resample {} samples to {}",
                n_in, n_out
            )));
        }

        let mut planner = RealFftPlanner::<f64>::new();
        let forward = planner.plan_fft_forward(n_in);
        let inverse = planner.plan_fft_inverse(n_out);

        Ok(Resampler {
            n_in,
            n_out,
            forward,
            inverse,
        })
    }

    /// Resample one signal of length `n_in`
    pub fn process(&self, signal: &[f64]) -> EpochResult<Vec<f64>> {
        if signal.len() != self.n_in {
            return Err(EpochError::Resample(format!(
                "expected {} samples, got {}",
                self.n_in,
                signal.len()
            )));
        }

        let mut input = signal.to_vec();
        let mut spectrum = self.forward.make_output_vec();
        self.forward
            .process(&mut input, &mut spectrum)
            .map_err(|e| EpochError::Resample(e.to_string()))?;

        let mut resized = self.inverse.make_input_vec();
        let keep = spectrum.len().min(resized.len());
        resized[..keep].copy_from_slice(&spectrum[..keep]);

        let shorter = self.n_in.min(self.n_out);
        if shorter % 2 == 0 {
            let nyquist = shorter / 2;
            if self.n_out < self.n_in {
                // Fold the dropped negative-frequency half into the new Nyquist bin
                resized[nyquist] *= 2.0;
            } else if self.n_out > self.n_in {
                // Old Nyquist energy is split between +N/2 and -N/2
                resized[nyquist] *= 0.5;
            }
        }

        // The inverse real transform requires purely real DC and Nyquist bins
        resized[0].im = 0.0;
        if self.n_out % 2 == 0 {
            let last = resized.len() - 1;
            resized[last] = Complex::new(resized[last].re, 0.0);
        }

        let mut output = self.inverse.make_output_vec();
        self.inverse
            .process(&mut resized, &mut output)
            .map_err(|e| EpochError::Resample(e.to_string()))?;

        // realfft is unnormalized: forward then inverse scales by n_out,
        // the amplitude correction n_out / n_in leaves a factor 1 / n_in
        let scale = 1.0 / self.n_in as f64;
        output.iter_mut().for_each(|v| *v *= scale);

        Ok(output)
    }
}

/// Number of samples after resampling `n_times` samples from `sfreq` to `target_sfreq`
pub fn resampled_len(n_times: usize, sfreq: f64, target_sfreq: f64) -> usize {
    (n_times as f64 * target_sfreq / sfreq).round() as usize
}

/// Resample every trial and channel of a collection in place
///
/// The time axis is rebuilt from the original first timestamp at the new rate.
/// A no-op when the collection is already at `target_sfreq`.
pub fn resample(collection: &mut TrialCollection, target_sfreq: f64) -> EpochResult<()> {
    if !target_sfreq.is_finite() || target_sfreq <= 0.0 {
        return Err(EpochError::InvalidSamplingRate(target_sfreq));
    }

    let sfreq = collection.sfreq();
    if (sfreq - target_sfreq).abs() < RATE_TOLERANCE_HZ {
        return Ok(());
    }

    let (n_trials, n_channels, n_times) = collection.data().dim();
    let n_out = resampled_len(n_times, sfreq, target_sfreq);

    if n_trials == 0 || n_times == 0 {
        let times = time_axis(collection.tmin(), target_sfreq, 0);
        collection.replace_signal(Array3::zeros((n_trials, n_channels, 0)), times, target_sfreq);
        return Ok(());
    }

    let resampler = Resampler::new(n_times, n_out)?;
    let mut resampled = Array3::<f64>::zeros((n_trials, n_channels, n_out));

    for trial in 0..n_trials {
        for channel in 0..n_channels {
            let row = collection.data().slice(s![trial, channel, ..]).to_vec();
            let out = resampler.process(&row)?;
            resampled
                .slice_mut(s![trial, channel, ..])
                .assign(&ArrayView1::from(&out[..]));
        }
    }

    log::debug!(
        "Resampled {} trials x {} channels from {} Hz ({} samples) to {} Hz ({} samples)",
        n_trials,
        n_channels,
        sfreq,
        n_times,
        target_sfreq,
        n_out
    );

    let times = time_axis(collection.tmin(), target_sfreq, n_out);
    collection.replace_signal(resampled, times, target_sfreq);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epochs::types::TrialMetadata;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    fn sine(n: usize, sfreq: f64, freq: f64) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / sfreq).sin())
            .collect()
    }

    #[test]
    fn test_resampled_len() {
        assert_eq!(resampled_len(1000, 1000.0, 100.0), 100);
        assert_eq!(resampled_len(301, 512.0, 100.0), 59);
        assert_eq!(resampled_len(50, 100.0, 200.0), 100);
    }

    #[test]
    fn test_downsample_preserves_low_frequency_sine() {
        // 2 Hz sine, 1 s at 1000 Hz -> 100 Hz; whole number of periods so no leakage
        let signal = sine(1000, 1000.0, 2.0);
        let resampler = Resampler::new(1000, 100).unwrap();
        let out = resampler.process(&signal).unwrap();

        let expected = sine(100, 100.0, 2.0);
        assert_eq!(out.len(), 100);
        for (got, want) in out.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*got, *want, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_upsample_preserves_low_frequency_sine() {
        let signal = sine(64, 64.0, 3.0);
        let resampler = Resampler::new(64, 128).unwrap();
        let out = resampler.process(&signal).unwrap();

        let expected = sine(128, 128.0, 3.0);
        for (got, want) in out.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*got, *want, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_constant_signal_keeps_level() {
        let resampler = Resampler::new(30, 7).unwrap();
        let out = resampler.process(&[2.5; 30]).unwrap();
        for v in out {
            assert_abs_diff_eq!(v, 2.5, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_wrong_length_rejected() {
        let resampler = Resampler::new(10, 5).unwrap();
        assert!(resampler.process(&[0.0; 9]).is_err());
        assert!(Resampler::new(0, 5).is_err());
    }

    #[test]
    fn test_resample_collection_rebuilds_time_axis() {
        let data = Array3::from_shape_fn((2, 3, 200), |(trial, ch, t)| {
            (trial + ch) as f64 + (2.0 * PI * 5.0 * t as f64 / 1000.0).sin()
        });
        let mut collection = TrialCollection::with_tmin(
            data,
            -0.1,
            1000.0,
            vec!["a".into(), "b".into(), "c".into()],
            vec![TrialMetadata::new(); 2],
        )
        .unwrap();

        resample(&mut collection, 100.0).unwrap();

        assert_eq!(collection.n_times(), 20);
        assert_eq!(collection.n_trials(), 2);
        assert_eq!(collection.n_channels(), 3);
        assert_eq!(collection.sfreq(), 100.0);
        assert_abs_diff_eq!(collection.tmin(), -0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(collection.times()[19], 0.09, epsilon = 1e-12);
        // Channel offsets survive as the DC component
        let mean: f64 = collection.data().slice(s![1, 2, ..]).mean().unwrap();
        assert_abs_diff_eq!(mean, 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_resample_same_rate_is_noop() {
        let data = Array3::from_shape_fn((1, 1, 10), |(_, _, t)| t as f64);
        let mut collection = TrialCollection::with_tmin(
            data.clone(),
            0.0,
            100.0,
            vec!["a".into()],
            vec![TrialMetadata::new()],
        )
        .unwrap();

        resample(&mut collection, 100.0).unwrap();
        assert_eq!(collection.data(), &data);
    }
}
