use std::path::{Path, PathBuf};
use symphonia::core::audio::SampleBuffer as InterleavedBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::framer::SampleBuffer;
use crate::error::AnalysisError;

/// Anything the pipeline's decode stage can turn into samples.
pub trait AudioSource {
    fn decode(self) -> Result<SampleBuffer, AnalysisError>;
}

/// Already-decoded audio decodes to itself.
impl AudioSource for SampleBuffer {
    fn decode(self) -> Result<SampleBuffer, AnalysisError> {
        Ok(self)
    }
}

/// An audio file on disk, decoded with symphonia.
#[derive(Debug, Clone)]
pub struct FileSource(pub PathBuf);

impl AudioSource for FileSource {
    fn decode(self) -> Result<SampleBuffer, AnalysisError> {
        decode_file(&self.0)
    }
}

/// Decode every packet of the first audio track into planar channels.
pub fn decode_file(path: &Path) -> Result<SampleBuffer, AnalysisError> {
    let file = std::fs::File::open(path)?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| AnalysisError::Decode(format!("no audio tracks in {}", path.display())))?;

    let track_id = track.id;
    let channel_count = track.codec_params.channels.map_or(1, |c| c.count()).max(1);
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| AnalysisError::Decode("unknown sample rate".into()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())?;

    let mut channels: Vec<Vec<f32>> = vec![Vec::new(); channel_count];

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(msg)) => {
                log::debug!("Skipping undecodable packet: {}", msg);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();

        let mut sample_buf = InterleavedBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        // De-interleave; downmixing belongs to the framer
        for frame in sample_buf.samples().chunks(channel_count) {
            for (channel, &s) in channels.iter_mut().zip(frame) {
                channel.push(s);
            }
        }
    }

    let buffer = SampleBuffer {
        channels,
        sample_rate,
    };

    log::info!(
        "Decoded audio: {} samples x {} channels, {}Hz, {:.1}s",
        buffer.len(),
        channel_count,
        sample_rate,
        buffer.duration_ms() / 1000.0
    );

    Ok(buffer)
}
