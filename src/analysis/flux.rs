//! Broadband spectral flux

use super::Envelope;
use crate::audio::framer::Framer;
use crate::audio::spectrum::SpectralEngine;
use crate::error::AnalysisError;

/// Half-wave-rectified frame-to-frame magnitude increase summed over all non-DC bins.
///
/// The previous-magnitude buffer starts at zero, so frame 0 reports its raw
/// magnitude sum.
pub fn compute_spectral_flux(
    samples: &[f32],
    sample_rate: u32,
    frame_size: usize,
    hop_size: usize,
) -> Result<Envelope, AnalysisError> {
    if sample_rate == 0 {
        return Err(AnalysisError::InvalidInput("sample rate must be non-zero".into()));
    }
    let engine = SpectralEngine::new(frame_size)?;
    let framer = Framer::new(samples, frame_size, hop_size, sample_rate);

    let mut scratch = engine.scratch();
    let mut prev_mag = vec![0.0f32; engine.num_bins()];
    let mut values = Vec::with_capacity(framer.len());

    for frame in framer.frames() {
        engine.transform(frame, &mut scratch)?;
        let mut flux = 0.0f32;
        for (bin, prev) in prev_mag.iter_mut().enumerate().skip(1) {
            let mag = scratch[bin].norm();
            flux += (mag - *prev).max(0.0);
            *prev = mag;
        }
        values.push(flux);
    }

    Ok(Envelope {
        values,
        times_ms: framer.times_ms(),
    })
}
