use std::{fs::File, io, path::Path, path::PathBuf, sync::Arc};

use symphonia::core::formats::FormatOptions;
use symphonia::core::{audio::AudioBuffer, conv::IntoSample, probe::Hint, sample::Sample};
use symphonia::core::{audio::AudioBufferRef, meta::MetadataOptions};
use symphonia::core::{audio::Signal, io::MediaSourceStream};
use symphonia::core::{codecs::DecoderOptions, errors::Error};

use thiserror::Error;

use crate::ChannelCount;

use self::resample::SincResampler;

use super::DEFAULT_BASE_KEY;

pub mod resample;

#[derive(Debug, Error)]
pub enum AudioLoadError {
    #[error("IO Error")]
    IOError(#[from] io::Error),

    #[error("Audio decoding failed for {0}")]
    AudioDecodingFailed(PathBuf, Error),

    #[error("Audio file {0} has an invalid channel count")]
    InvalidChannelCount(PathBuf),

    #[error("Audio file {0} has no tracks")]
    NoTracks(PathBuf),

    #[error("Audio file {0} contains no audio frames")]
    EmptyAudio(PathBuf),
}

/// A fully decoded audio file, converted to `f32` PCM and resampled to the
/// output stream rate. Mono files are duplicated to stereo.
pub struct DecodedSample {
    pub channels: Arc<[Arc<[f32]>]>,
    /// The file's native rate, before resampling.
    pub sample_rate: u32,
}

/// Reads the base MIDI key from the trailing integer of the file name, e.g.
/// `piano-C3-48.wav` maps to key 48. Files without a usable pitch tag fall
/// back to middle C.
pub fn base_key_from_path(path: &Path) -> u8 {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    let digits: String = stem
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    match digits.parse::<u8>() {
        Ok(key) if key <= 127 => key,
        _ => DEFAULT_BASE_KEY,
    }
}

/// Decodes an audio file into per-channel `f32` PCM at the given stream rate.
///
/// This runs entirely on the caller's (non-real-time) thread; only the
/// finished buffer is handed to the engine.
pub fn load_audio_file(
    path: &Path,
    new_sample_rate: f32,
) -> Result<DecodedSample, AudioLoadError> {
    let extension = path.extension().and_then(|ext| ext.to_str());

    let file = Box::new(File::open(path)?);
    let mss = MediaSourceStream::new(file, Default::default());

    // A hint from the file extension helps the format registry guess the
    // appropriate reader.
    let mut hint = Hint::new();
    if let Some(extension) = extension {
        hint.with_extension(extension);
    }

    let format_opts: FormatOptions = Default::default();
    let metadata_opts: MetadataOptions = Default::default();
    let decoder_opts: DecoderOptions = Default::default();

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &format_opts, &metadata_opts)
        .map_err(|x| AudioLoadError::AudioDecodingFailed(path.to_path_buf(), x))?;

    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| AudioLoadError::NoTracks(path.to_path_buf()))?;

    let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
    let channel_count = track.codec_params.channels.map(|c| c.count()).unwrap_or(1);

    let channel_count_value = ChannelCount::from_count(channel_count as u16)
        .ok_or_else(|| AudioLoadError::InvalidChannelCount(path.to_path_buf()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &decoder_opts)
        .map_err(|x| AudioLoadError::AudioDecodingFailed(path.to_path_buf(), x))?;

    let track_id = track.id;

    let mut channels = ChannelVecs::new(channel_count);

    loop {
        let packet = match format.next_packet() {
            Err(symphonia::core::errors::Error::IoError(error))
                if error.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                // Audio source ended. Currently the lib has no cleaner way of
                // detecting this.
                break;
            }
            Err(error) => {
                return Err(AudioLoadError::AudioDecodingFailed(
                    path.to_path_buf(),
                    error,
                ))
            }
            Ok(packet) => packet,
        };

        if packet.track_id() != track_id {
            continue;
        }

        // Decode the packet into audio samples, skipping over recoverable
        // decode errors.
        match decoder.decode(&packet) {
            Ok(audio_buf) => channels.push(audio_buf),
            Err(Error::DecodeError(_)) => (),
            Err(e) => return Err(AudioLoadError::AudioDecodingFailed(path.to_path_buf(), e)),
        }
    }

    if channels.is_empty() {
        return Err(AudioLoadError::EmptyAudio(path.to_path_buf()));
    }

    let built = channels.finish(sample_rate as f32, new_sample_rate);

    Ok(DecodedSample {
        channels: match channel_count_value {
            ChannelCount::Mono => vec![built[0].clone(), built[0].clone()]
                .into_iter()
                .collect(),
            ChannelCount::Stereo => built,
        },
        sample_rate,
    })
}

struct ChannelVecs {
    vecs: Vec<Vec<f32>>,
}

impl ChannelVecs {
    fn new(channels: usize) -> Self {
        Self {
            vecs: vec![Vec::new(); channels],
        }
    }

    fn is_empty(&self) -> bool {
        self.vecs[0].is_empty()
    }

    fn push(&mut self, buffer: AudioBufferRef) {
        match buffer {
            AudioBufferRef::U8(buf) => self.push_buffer(&buf),
            AudioBufferRef::U16(buf) => self.push_buffer(&buf),
            AudioBufferRef::U24(buf) => self.push_buffer(&buf),
            AudioBufferRef::U32(buf) => self.push_buffer(&buf),
            AudioBufferRef::S8(buf) => self.push_buffer(&buf),
            AudioBufferRef::S16(buf) => self.push_buffer(&buf),
            AudioBufferRef::S24(buf) => self.push_buffer(&buf),
            AudioBufferRef::S32(buf) => self.push_buffer(&buf),
            AudioBufferRef::F32(buf) => self.push_buffer(&buf),
            AudioBufferRef::F64(buf) => self.push_buffer(&buf),
        }
    }

    fn push_buffer(&mut self, buffer: &AudioBuffer<impl Sample + IntoSample<f32>>) {
        let channels = buffer.spec().channels.count();

        for c in 0..channels {
            let channel = buffer.chan(c);
            self.vecs[c].reserve(channel.len());
            for &sample in channel.iter() {
                self.vecs[c].push(sample.into_sample());
            }
        }
    }

    fn finish(self, sample_rate: f32, new_sample_rate: f32) -> Arc<[Arc<[f32]>]> {
        // Resampling at load time keeps the render path's pitch ratio purely
        // musical: a voice at the sample's base key always advances its
        // cursor by exactly 1.0.
        if (sample_rate - new_sample_rate).abs() < f32::EPSILON {
            return self.vecs.into_iter().map(Arc::from).collect();
        }

        let resampler = SincResampler::new(10000, sample_rate, 32);
        self.vecs
            .into_iter()
            .map(|samples| resampler.resample_vec(&samples, new_sample_rate).into())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_key_from_path() {
        assert_eq!(base_key_from_path(Path::new("piano-48.wav")), 48);
        assert_eq!(base_key_from_path(Path::new("/tmp/kick60.flac")), 60);
        assert_eq!(base_key_from_path(Path::new("strings.wav")), 60);
        // Out of MIDI range falls back to the default
        assert_eq!(base_key_from_path(Path::new("take-2024.wav")), 60);
        assert_eq!(base_key_from_path(Path::new("127.wav")), 127);
    }
}
