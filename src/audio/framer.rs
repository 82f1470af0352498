//! Mono downmix and overlapping analysis frames

use crate::error::AnalysisError;

/// Decoded audio, one `Vec<f32>` per channel.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl SampleBuffer {
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            channels: vec![samples],
            sample_rate,
        }
    }

    /// Samples per channel
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn duration_ms(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64 * 1000.0
    }
}

/// Average all channels into one. A single channel passes through untouched.
pub fn downmix(buffer: &SampleBuffer) -> Result<Vec<f32>, AnalysisError> {
    let len = buffer.len();
    match buffer.channels.as_slice() {
        [] => Err(AnalysisError::InvalidInput("sample buffer has no channels".into())),
        [only] => Ok(only.clone()),
        channels => {
            if let Some(bad) = channels.iter().position(|c| c.len() != len) {
                return Err(AnalysisError::InvalidInput(format!(
                    "channel {} has {} samples, expected {}",
                    bad,
                    channels[bad].len(),
                    len
                )));
            }
            let scale = 1.0 / channels.len() as f32;
            let mut mono = vec![0.0f32; len];
            for channel in channels {
                for (out, &s) in mono.iter_mut().zip(channel) {
                    *out += s * scale;
                }
            }
            Ok(mono)
        }
    }
}

/// Number of full frames that fit in `len` samples.
pub fn frame_count(len: usize, frame_size: usize, hop_size: usize) -> usize {
    if len < frame_size || hop_size == 0 {
        return 0;
    }
    (len - frame_size) / hop_size + 1
}

/// Timestamp of a frame's temporal center in milliseconds.
pub fn frame_time_ms(index: usize, frame_size: usize, hop_size: usize, sample_rate: u32) -> f64 {
    let center = (index * hop_size) as f64 + frame_size as f64 / 2.0;
    center / sample_rate as f64 * 1000.0
}

/// Frame geometry over one mono buffer.
#[derive(Debug, Clone, Copy)]
pub struct Framer<'a> {
    samples: &'a [f32],
    frame_size: usize,
    hop_size: usize,
    sample_rate: u32,
}

impl<'a> Framer<'a> {
    pub fn new(samples: &'a [f32], frame_size: usize, hop_size: usize, sample_rate: u32) -> Self {
        Self {
            samples,
            frame_size,
            hop_size,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        frame_count(self.samples.len(), self.frame_size, self.hop_size)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Samples `[index·hop, index·hop + frame_size)`
    pub fn frame(&self, index: usize) -> &'a [f32] {
        let start = index * self.hop_size;
        &self.samples[start..start + self.frame_size]
    }

    pub fn time_ms(&self, index: usize) -> f64 {
        frame_time_ms(index, self.frame_size, self.hop_size, self.sample_rate)
    }

    pub fn times_ms(&self) -> Vec<f64> {
        (0..self.len()).map(|i| self.time_ms(i)).collect()
    }

    pub fn frames(&self) -> impl Iterator<Item = &'a [f32]> + '_ {
        (0..self.len()).map(move |i| self.frame(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_passes_through() {
        let buffer = SampleBuffer::mono(vec![0.1, -0.2, 0.3], 8000);
        assert_eq!(downmix(&buffer).unwrap(), vec![0.1, -0.2, 0.3]);
    }

    #[test]
    fn stereo_is_averaged() {
        let buffer = SampleBuffer {
            channels: vec![vec![1.0, 0.0, -1.0], vec![0.0, 0.5, -1.0]],
            sample_rate: 8000,
        };
        let mono = downmix(&buffer).unwrap();
        assert_eq!(mono.len(), 3);
        assert!((mono[0] - 0.5).abs() < 1e-6);
        assert!((mono[1] - 0.25).abs() < 1e-6);
        assert!((mono[2] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn ragged_channels_are_rejected() {
        let buffer = SampleBuffer {
            channels: vec![vec![0.0; 4], vec![0.0; 3]],
            sample_rate: 8000,
        };
        assert!(downmix(&buffer).is_err());

        let empty = SampleBuffer { channels: vec![], sample_rate: 8000 };
        assert!(downmix(&empty).is_err());
    }

    #[test]
    fn frame_count_matches_formula() {
        assert_eq!(frame_count(2048, 2048, 512), 1);
        assert_eq!(frame_count(2047, 2048, 512), 0);
        assert_eq!(frame_count(2048 + 511, 2048, 512), 1);
        assert_eq!(frame_count(2048 + 512, 2048, 512), 2);
        assert_eq!(frame_count(44100, 2048, 512), (44100 - 2048) / 512 + 1);
    }

    #[test]
    fn frames_are_centered_in_time() {
        // frame 0 centers at sample 1024, frame 1 at 1536
        assert!((frame_time_ms(0, 2048, 512, 44100) - 1024.0 / 44.1).abs() < 1e-9);
        assert!((frame_time_ms(1, 2048, 512, 44100) - 1536.0 / 44.1).abs() < 1e-9);
    }

    #[test]
    fn framer_slices_with_hop() {
        let samples: Vec<f32> = (0..10).map(|i| i as f32).collect();
        let framer = Framer::new(&samples, 4, 3, 1000);
        assert_eq!(framer.len(), 3);
        let frames: Vec<&[f32]> = framer.frames().collect();
        assert_eq!(frames[0], &[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(frames[2], &[6.0, 7.0, 8.0, 9.0]);
        assert_eq!(framer.times_ms(), vec![2.0, 5.0, 8.0]);
    }

    #[test]
    fn short_buffer_has_no_frames() {
        let samples = vec![0.0f32; 100];
        let framer = Framer::new(&samples, 2048, 512, 44100);
        assert!(framer.is_empty());
        assert_eq!(framer.frames().count(), 0);
    }
}
