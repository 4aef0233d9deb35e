/*!
 * WAV decoding and chapter audio assembly.
 */

use std::io::Cursor;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::errors::BackendError;
use crate::file_utils::FileManager;
use crate::synthesis::SynthesizedAudio;

/// Decode WAV bytes into mono f32 samples, averaging channels
pub fn decode_wav(bytes: &[u8]) -> Result<SynthesizedAudio, BackendError> {
    let mut reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };

    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    Ok(SynthesizedAudio::new(samples, spec.sample_rate))
}

/// Encode mono samples as 16-bit PCM WAV
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut buffer = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut buffer, spec)?;
        for sample in samples {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
            writer.write_sample(value)?;
        }
        writer.finalize()?;
    }
    Ok(buffer.into_inner())
}

/// Linear resampling
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = (samples.len() as f64 * to_rate as f64 / from_rate as f64).round() as usize;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let index = (pos.floor() as usize).min(last);
            let next = (index + 1).min(last);
            let frac = (pos - index as f64) as f32;
            samples[index] * (1.0 - frac) + samples[next] * frac
        })
        .collect()
}

/// Assembles a chapter's audio by placing clips at absolute offsets
#[derive(Debug, Clone)]
pub struct ChapterAudio {
    sample_rate: u32,
    samples: Vec<f32>,
}

impl ChapterAudio {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            samples: Vec::new(),
        }
    }

    fn offset(&self, seconds: f64) -> usize {
        (seconds.max(0.0) * self.sample_rate as f64).round() as usize
    }

    /// Place `audio` so it starts at `start` seconds
    pub fn place(&mut self, start: f64, audio: &SynthesizedAudio) {
        let offset = self.offset(start);
        // Rounding can put the previous clip at most a sample past `offset`
        self.samples.resize(offset, 0.0);
        if audio.sample_rate == self.sample_rate {
            self.samples.extend_from_slice(&audio.samples);
        } else {
            self.samples
                .extend(resample(&audio.samples, audio.sample_rate, self.sample_rate));
        }
    }

    /// Extend with silence up to `end` seconds
    pub fn pad_to(&mut self, end: f64) {
        let offset = self.offset(end);
        if self.samples.len() < offset {
            self.samples.resize(offset, 0.0);
        }
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Scale to the target RMS level in dBFS, clipping to [-1, 1]
    pub fn normalize(&mut self, target_db: f64) {
        if self.samples.is_empty() {
            return;
        }
        let mean_square = self
            .samples
            .iter()
            .map(|s| (*s as f64) * (*s as f64))
            .sum::<f64>()
            / self.samples.len() as f64;
        if mean_square <= 0.0 {
            return;
        }

        let current_db = 10.0 * mean_square.log10();
        let gain = 10f64.powf((target_db - current_db) / 20.0) as f32;
        for sample in &mut self.samples {
            *sample = (*sample * gain).clamp(-1.0, 1.0);
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Write the chapter as a 16-bit WAV file
    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        let bytes = encode_wav(&self.samples, self.sample_rate)?;
        FileManager::write_atomic(path, &bytes)
    }
}
