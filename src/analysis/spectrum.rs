use rustfft::{num_complex::Complex, FftPlanner};
use serde::Deserialize;

use super::types::FrequencyBar;

/// Display scale applied to the mean bin magnitude of every bar.
const LEVEL_SCALE: f32 = 2.0;
const LEVEL_MAX: f32 = 255.0;

/// Largest window the analyzer accepts (2^20 samples).
pub const MAX_WINDOW_SIZE: usize = 1 << 20;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SpectrumMethod {
    /// Radix FFT, O(N log N)
    #[default]
    Fft,
    /// Direct DFT, O(N^2)
    Direct,
}

/// Compute display bars for the first `window_size` samples using the FFT.
#[allow(dead_code)]
pub fn compute_frequency_bars(
    samples: &[f32],
    window_size: usize,
    bar_count: usize,
) -> Vec<FrequencyBar> {
    let mut planner = FftPlanner::new();
    compute_frequency_bars_with(&mut planner, samples, window_size, bar_count, SpectrumMethod::Fft)
}

/// Callers must keep `window_size` within [`MAX_WINDOW_SIZE`].
pub fn compute_frequency_bars_with(
    planner: &mut FftPlanner<f32>,
    samples: &[f32],
    window_size: usize,
    bar_count: usize,
    method: SpectrumMethod,
) -> Vec<FrequencyBar> {
    if window_size == 0 || bar_count == 0 {
        return Vec::new();
    }

    let magnitudes = match method {
        SpectrumMethod::Fft => fft_magnitudes(planner, samples, window_size),
        SpectrumMethod::Direct => direct_dft_magnitudes(samples, window_size),
    };

    aggregate_bars(&magnitudes, bar_count)
}

/// Zero-padded (or truncated) copy of the leading `window_size` samples.
fn window_of(samples: &[f32], window_size: usize) -> Vec<f32> {
    let mut window = vec![0.0f32; window_size];
    let n = samples.len().min(window_size);
    window[..n].copy_from_slice(&samples[..n]);
    window
}

/// One-sided magnitude spectrum (`window_size / 2` bins) via rustfft.
///
/// The planner is passed in so repeated callers can reuse cached plans.
pub fn fft_magnitudes(
    planner: &mut FftPlanner<f32>,
    samples: &[f32],
    window_size: usize,
) -> Vec<f32> {
    let half = window_size / 2;
    if half == 0 {
        return Vec::new();
    }

    let mut buffer: Vec<Complex<f32>> = window_of(samples, window_size)
        .into_iter()
        .map(|s| Complex::new(s, 0.0))
        .collect();

    let fft = planner.plan_fft_forward(window_size);
    fft.process(&mut buffer);

    buffer[..half].iter().map(|c| c.norm()).collect()
}

/// One-sided magnitude spectrum by direct summation. Reference for the FFT path.
pub fn direct_dft_magnitudes(samples: &[f32], window_size: usize) -> Vec<f32> {
    let half = window_size / 2;
    let x = window_of(samples, window_size);
    let n_total = window_size as f64;

    (0..half)
        .map(|k| {
            let mut re = 0.0f64;
            let mut im = 0.0f64;
            for (n, &sample) in x.iter().enumerate() {
                let angle = 2.0 * std::f64::consts::PI * k as f64 * n as f64 / n_total;
                re += sample as f64 * angle.cos();
                im -= sample as f64 * angle.sin();
            }
            (re * re + im * im).sqrt() as f32
        })
        .collect()
}

/// Group consecutive bins into at most `bar_count` bars.
pub fn aggregate_bars(magnitudes: &[f32], bar_count: usize) -> Vec<FrequencyBar> {
    let bin_count = magnitudes.len();
    if bar_count == 0 {
        return Vec::new();
    }
    let step = (bin_count / bar_count).max(1);

    let mut bars = Vec::with_capacity(bar_count.min(bin_count));
    for i in 0..bar_count {
        let start = i * step;
        if start >= bin_count {
            break;
        }
        let end = (start + step).min(bin_count);
        let slice = &magnitudes[start..end];
        let average = if slice.is_empty() {
            0.0
        } else {
            slice.iter().sum::<f32>() / slice.len() as f32
        };

        bars.push(FrequencyBar {
            band_label: (i + 1).to_string(),
            level: (average * LEVEL_SCALE).clamp(0.0, LEVEL_MAX),
        });
    }

    bars
}

/// Index of the strongest bin, ignoring DC.
pub fn peak_bin(magnitudes: &[f32]) -> Option<usize> {
    magnitudes
        .iter()
        .enumerate()
        .skip(1)
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
}

/// Centre frequency in Hz of bin `k`.
pub fn bin_frequency(k: usize, sample_rate: f64, window_size: usize) -> f64 {
    k as f64 * sample_rate / window_size as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn fft_matches_direct_dft() {
        let samples: Vec<f32> = sine(1_000.0, 44_100.0, 256)
            .iter()
            .zip(sine(7_300.0, 44_100.0, 256))
            .map(|(&a, b)| 0.6 * a + 0.3 * b)
            .collect();

        let mut planner = FftPlanner::new();
        let fast = fft_magnitudes(&mut planner, &samples, 256);
        let slow = direct_dft_magnitudes(&samples, 256);

        assert_eq!(fast.len(), 128);
        assert_eq!(slow.len(), 128);
        for (k, (a, b)) in fast.iter().zip(slow.iter()).enumerate() {
            assert!((a - b).abs() < 1e-2, "bin {k}: fft={a} dft={b}");
        }
    }

    #[test]
    fn sine_peak_lands_on_expected_bin() {
        let sr = 8_000.0;
        for freq in [250.0f32, 500.0, 1_000.0, 2_750.0] {
            let samples = sine(freq, sr, 256);
            let magnitudes = direct_dft_magnitudes(&samples, 256);
            let expected = (freq * 256.0 / sr).round() as usize;
            assert_eq!(peak_bin(&magnitudes), Some(expected), "freq={freq}");
        }
    }

    #[test]
    fn one_khz_bar_dominates_neighbours() {
        let samples = sine(1_000.0, 44_100.0, 256);
        let bars = compute_frequency_bars(&samples, 256, 32);
        assert_eq!(bars.len(), 32);

        // 128 bins over 32 bars: step 4, bin 6 (~1033 Hz) lives in bar index 1.
        let peak = bars[1].level;
        for i in 3..bars.len() {
            assert!(peak > bars[i].level * 10.0, "bar {i}: {} vs {}", bars[i].level, peak);
        }
        assert!(peak > bars[0].level);
        assert!(peak > bars[2].level);
    }

    #[test]
    fn empty_input_gives_zero_bars() {
        let bars = compute_frequency_bars(&[], 256, 32);
        assert_eq!(bars.len(), 32);
        assert!(bars.iter().all(|b| b.level == 0.0));
        assert_eq!(bars[0].band_label, "1");
        assert_eq!(bars[31].band_label, "32");
    }

    #[test]
    fn zero_bar_count_or_window() {
        assert!(compute_frequency_bars(&[0.5; 64], 64, 0).is_empty());
        assert!(compute_frequency_bars(&[0.5; 64], 0, 8).is_empty());
    }

    #[test]
    fn fewer_bins_than_bars() {
        let bars = compute_frequency_bars(&[0.1; 16], 16, 32);
        assert_eq!(bars.len(), 8);
    }

    #[test]
    fn levels_are_clamped() {
        let loud = vec![1.0f32; 256];
        let bars = compute_frequency_bars(&loud, 256, 32);
        assert!(bars.len() <= 32);
        assert!(bars.iter().all(|b| (0.0..=255.0).contains(&b.level)));
        // DC of 256 ones is 256, averaged over 4 bins = 64, doubled = 128
        assert!((bars[0].level - 128.0).abs() < 1e-3);

        let huge = vec![10.0f32; 256];
        let bars = compute_frequency_bars(&huge, 256, 32);
        assert_eq!(bars[0].level, 255.0);
    }

    #[test]
    fn methods_agree_on_bars() {
        let samples = sine(3_000.0, 22_050.0, 300);
        let mut planner = FftPlanner::new();
        let fast = compute_frequency_bars_with(&mut planner, &samples, 256, 16, SpectrumMethod::Fft);
        let slow =
            compute_frequency_bars_with(&mut planner, &samples, 256, 16, SpectrumMethod::Direct);
        assert_eq!(fast.len(), slow.len());
        for (a, b) in fast.iter().zip(slow.iter()) {
            assert_eq!(a.band_label, b.band_label);
            assert!((a.level - b.level).abs() < 1e-2);
        }
    }

    #[test]
    fn bin_frequency_scale() {
        assert_eq!(bin_frequency(0, 44_100.0, 256), 0.0);
        assert!((bin_frequency(6, 44_100.0, 256) - 1033.59).abs() < 0.01);
    }
}
