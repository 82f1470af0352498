//! Hann-windowed radix-2 FFT
//!
//! The transform runs in place over a caller-owned scratch buffer so the
//! per-frame hot loops never allocate. Twiddles and the bit-reversal
//! permutation are computed once per frame size.

use rustfft::num_complex::Complex;
use std::f32::consts::PI;

use crate::error::AnalysisError;

/// In-place radix-2 Cooley–Tukey FFT of a fixed power-of-two size.
#[derive(Debug, Clone)]
pub struct Fft {
    size: usize,
    /// `e^{-2πik/size}` for `k in 0..size/2`
    twiddles: Vec<Complex<f32>>,
    /// Swap partner of each index under bit reversal
    bit_reversed: Vec<usize>,
}

impl Fft {
    pub fn new(size: usize) -> Result<Self, AnalysisError> {
        if !size.is_power_of_two() {
            return Err(AnalysisError::FrameSizeNotPowerOfTwo(size));
        }

        let twiddles = (0..size / 2)
            .map(|k| {
                let angle = -2.0 * PI * k as f32 / size as f32;
                Complex::new(angle.cos(), angle.sin())
            })
            .collect();

        let bits = size.trailing_zeros();
        let bit_reversed = (0..size)
            .map(|i| if bits == 0 { 0 } else { i.reverse_bits() >> (usize::BITS - bits) })
            .collect();

        Ok(Self {
            size,
            twiddles,
            bit_reversed,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Forward transform of `buffer` in place. `buffer` must hold exactly
    /// the planned number of points.
    pub fn process(&self, buffer: &mut [Complex<f32>]) -> Result<(), AnalysisError> {
        if buffer.len() != self.size {
            return Err(AnalysisError::InvalidInput(format!(
                "FFT planned for {} points, got {}",
                self.size,
                buffer.len()
            )));
        }

        for (i, &j) in self.bit_reversed.iter().enumerate() {
            if i < j {
                buffer.swap(i, j);
            }
        }

        let mut len = 2;
        while len <= self.size {
            let half = len / 2;
            let stride = self.size / len;
            for block in buffer.chunks_exact_mut(len) {
                let (even, odd) = block.split_at_mut(half);
                for k in 0..half {
                    let t = self.twiddles[k * stride] * odd[k];
                    odd[k] = even[k] - t;
                    even[k] += t;
                }
            }
            len <<= 1;
        }
        Ok(())
    }
}

/// `w[i] = 0.5·(1 − cos(2πi/(N−1)))`
pub fn hann_window(size: usize) -> Vec<f32> {
    if size < 2 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / (size - 1) as f32).cos()))
        .collect()
}

/// Windowing plus FFT for one frame size. Shared read-only across workers;
/// each worker brings its own scratch buffer.
#[derive(Debug, Clone)]
pub struct SpectralEngine {
    fft: Fft,
    window: Vec<f32>,
}

impl SpectralEngine {
    pub fn new(frame_size: usize) -> Result<Self, AnalysisError> {
        Ok(Self {
            fft: Fft::new(frame_size)?,
            window: hann_window(frame_size),
        })
    }

    pub fn frame_size(&self) -> usize {
        self.fft.size()
    }

    /// Bins `0..=frame_size/2` carry information for real input.
    pub fn num_bins(&self) -> usize {
        self.fft.size() / 2 + 1
    }

    pub fn scratch(&self) -> Vec<Complex<f32>> {
        vec![Complex::new(0.0, 0.0); self.fft.size()]
    }

    /// Window `frame` into `scratch` and transform it. A short frame is zero padded.
    ///
    /// `scratch` must come from [`SpectralEngine::scratch`] or have the same length.
    pub fn transform(&self, frame: &[f32], scratch: &mut [Complex<f32>]) -> Result<(), AnalysisError> {
        for (i, slot) in scratch.iter_mut().enumerate() {
            let sample = frame.get(i).copied().unwrap_or(0.0);
            *slot = Complex::new(sample * self.window.get(i).copied().unwrap_or(0.0), 0.0);
        }
        self.fft.process(scratch)
    }
}

/// Bin whose center is nearest to `hz`.
pub fn hz_to_bin(hz: f32, frame_size: usize, sample_rate: u32) -> usize {
    let bin = (hz as f64 * frame_size as f64 / sample_rate as f64).round();
    if bin <= 0.0 {
        0
    } else {
        bin as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustfft::FftPlanner;

    fn sine(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    fn peak_bin(spectrum: &[Complex<f32>]) -> usize {
        spectrum[..spectrum.len() / 2 + 1]
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.norm().total_cmp(&b.1.norm()))
            .map(|(i, _)| i)
            .unwrap()
    }

    #[test]
    fn rejects_non_power_of_two() {
        assert!(Fft::new(1000).is_err());
        assert!(Fft::new(0).is_err());
        assert!(Fft::new(1).is_ok());
        assert!(SpectralEngine::new(3).is_err());
    }

    #[test]
    fn matches_reference_fft() {
        let n = 256;
        let input: Vec<Complex<f32>> = (0..n)
            .map(|i| Complex::new(((i * 7919) % 97) as f32 / 97.0 - 0.5, 0.0))
            .collect();

        let mut ours = input.clone();
        Fft::new(n).unwrap().process(&mut ours).unwrap();

        let mut reference = input;
        FftPlanner::<f32>::new().plan_fft_forward(n).process(&mut reference);

        for (a, b) in ours.iter().zip(&reference) {
            assert!((a - b).norm() < 1e-3, "bin mismatch: {} vs {}", a, b);
        }
    }

    #[test]
    fn impulse_has_flat_spectrum() {
        let mut buffer = vec![Complex::new(0.0f32, 0.0); 64];
        buffer[0] = Complex::new(1.0, 0.0);
        Fft::new(64).unwrap().process(&mut buffer).unwrap();
        for c in &buffer {
            assert!((c.norm() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn sinusoid_peaks_at_expected_bin() {
        let sample_rate = 44100;
        let frame_size = 2048;
        let engine = SpectralEngine::new(frame_size).unwrap();
        let mut scratch = engine.scratch();

        for freq in [440.0f32, 1000.0, 5512.5, 12000.0] {
            engine.transform(&sine(freq, sample_rate, frame_size), &mut scratch).unwrap();
            let expected = hz_to_bin(freq, frame_size, sample_rate);
            let got = peak_bin(&scratch);
            assert!(
                got.abs_diff(expected) <= 1,
                "{} Hz peaked at bin {}, expected {}",
                freq,
                got,
                expected
            );
        }
    }

    #[test]
    fn wrong_buffer_length_is_an_error() {
        let fft = Fft::new(64).unwrap();
        let mut short = vec![Complex::new(0.0f32, 0.0); 32];
        assert!(matches!(fft.process(&mut short), Err(AnalysisError::InvalidInput(_))));

        let engine = SpectralEngine::new(1024).unwrap();
        let mut scratch = vec![Complex::new(0.0f32, 0.0); 2048];
        assert!(engine.transform(&[0.5; 1024], &mut scratch).is_err());
    }

    #[test]
    fn hann_window_shape() {
        let w = hann_window(9);
        assert!(w[0].abs() < 1e-6);
        assert!(w[8].abs() < 1e-6);
        assert!((w[4] - 1.0).abs() < 1e-6);
        assert!((w[2] - w[6]).abs() < 1e-6);
    }

    #[test]
    fn hz_to_bin_rounds() {
        // 50 Hz · 2048 / 44100 = 2.32
        assert_eq!(hz_to_bin(50.0, 2048, 44100), 2);
        // 80 Hz → 3.71
        assert_eq!(hz_to_bin(80.0, 2048, 44100), 4);
        assert_eq!(hz_to_bin(22050.0, 2048, 44100), 1024);
    }
}
