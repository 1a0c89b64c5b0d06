use std::io::Cursor;

use crate::error::ClientError;

/// A single captured voice message, mono f32 PCM.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceClip {
    pub sample_rate: u32,
    pub samples: Vec<f32>,
}

impl VoiceClip {
    pub fn new(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self { sample_rate, samples }
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as u64 * 1000) / self.sample_rate as u64
    }

    /// Encodes the clip for upload. A clip that cannot be encoded is a
    /// capture failure.
    pub fn encode(&self) -> Result<EncodedClip, ClientError> {
        if self.sample_rate == 0 {
            return Err(ClientError::CaptureDenied("clip has no sample rate".into()));
        }
        let wav = self
            .to_wav_bytes()
            .map_err(|e| ClientError::CaptureDenied(format!("could not encode clip: {e}")))?;
        Ok(EncodedClip {
            wav,
            duration_ms: self.duration_ms(),
        })
    }

    /// Encodes the clip as a 16-bit PCM WAV file.
    pub fn to_wav_bytes(&self) -> Result<Vec<u8>, hound::Error> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
            for &sample in &self.samples {
                let clamped = sample.clamp(-1.0, 1.0);
                writer.write_sample((clamped * i16::MAX as f32) as i16)?;
            }
            writer.finalize()?;
        }
        Ok(cursor.into_inner())
    }
}

/// WAV bytes ready for the call endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedClip {
    wav: Vec<u8>,
    duration_ms: u64,
}

impl EncodedClip {
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn len(&self) -> usize {
        self.wav.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wav.is_empty()
    }

    pub fn into_wav(self) -> Vec<u8> {
        self.wav
    }
}

/// Folds interleaved frames down to mono by averaging channels.
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_bytes_decode_back_to_same_length() {
        let clip = VoiceClip::new(16_000, vec![0.0, 0.5, -0.5, 2.0]);
        let bytes = clip.to_wav_bytes().unwrap();
        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.spec().sample_rate, 16_000);
        assert_eq!(reader.spec().channels, 1);
        let samples: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples.len(), 4);
        assert_eq!(samples[3], i16::MAX, "out-of-range samples are clamped");
    }

    #[test]
    fn encode_keeps_duration_and_rejects_zero_rate() {
        let encoded = VoiceClip::new(8_000, vec![0.0; 800]).encode().unwrap();
        assert_eq!(encoded.duration_ms(), 100);
        assert!(!encoded.is_empty());

        let broken = VoiceClip::new(0, vec![0.0; 800]);
        assert!(matches!(broken.encode(), Err(ClientError::CaptureDenied(_))));
    }

    #[test]
    fn downmix_averages_frames() {
        let mono = downmix(&[1.0, 0.0, 0.5, 0.5], 2);
        assert_eq!(mono, vec![0.5, 0.5]);
    }

    #[test]
    fn duration_from_sample_count() {
        let clip = VoiceClip::new(8_000, vec![0.0; 4_000]);
        assert_eq!(clip.duration_ms(), 500);
    }
}
