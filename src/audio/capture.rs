//! Microphone capture for speech-to-text
//!
//! Records mono 16-bit PCM from the default input device and packages it as
//! a WAV file for the `/speech-to-text` endpoint.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use parking_lot::Mutex;
use std::io::Cursor;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::ChatError;

/// Captured microphone audio (mono, 16-bit PCM)
#[derive(Debug, Clone)]
pub struct Recording {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl Recording {
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// WAV file bytes for upload
    pub fn to_wav(&self) -> Result<Vec<u8>, ChatError> {
        encode_wav(&self.samples, self.sample_rate)
    }
}

/// Encode mono 16-bit samples as an in-memory WAV file
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>, ChatError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let wav_error = |e: hound::Error| {
        ChatError::UnsupportedAudioFormat(format!("failed to encode WAV: {e}"))
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(wav_error)?;
        for &sample in samples {
            writer.write_sample(sample).map_err(wav_error)?;
        }
        writer.finalize().map_err(wav_error)?;
    }

    Ok(cursor.into_inner())
}

/// Records from the default input device
///
/// Holds a `cpal::Stream`, which is `!Send` on some platforms: keep the
/// recorder on the thread that created it.
pub struct MicrophoneRecorder {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    stream: Option<Stream>,
    buffer: Arc<Mutex<Vec<i16>>>,
}

impl MicrophoneRecorder {
    /// Open the default input device
    pub fn new() -> Result<Self, ChatError> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| ChatError::MicrophoneUnavailable("no input device available".into()))?;

        let supported = device.default_input_config().map_err(|e| {
            ChatError::MicrophoneUnavailable(format!("failed to get input config: {e}"))
        })?;

        info!(
            "Using input device: {} ({}Hz, {} channel(s))",
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            supported.sample_rate().0,
            supported.channels()
        );

        Ok(Self {
            device,
            sample_format: supported.sample_format(),
            config: supported.into(),
            stream: None,
            buffer: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn is_recording(&self) -> bool {
        self.stream.is_some()
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    /// Start capturing; a second call while recording is ignored
    pub fn start(&mut self) -> Result<(), ChatError> {
        if self.is_recording() {
            warn!("Already recording, ignoring start request");
            return Ok(());
        }

        self.buffer.lock().clear();

        let stream = match self.sample_format {
            SampleFormat::F32 => self.build_stream::<f32>()?,
            SampleFormat::I16 => self.build_stream::<i16>()?,
            SampleFormat::U16 => self.build_stream::<u16>()?,
            other => {
                return Err(ChatError::MicrophoneUnavailable(format!(
                    "unsupported sample format {other:?}"
                )))
            }
        };

        stream.play().map_err(|e| {
            ChatError::MicrophoneUnavailable(format!("failed to start input stream: {e}"))
        })?;

        self.stream = Some(stream);
        info!("Microphone recording started");

        Ok(())
    }

    /// Stop capturing and hand back everything recorded since `start`
    pub fn stop(&mut self) -> Recording {
        if self.stream.take().is_some() {
            info!("Microphone recording stopped");
        }

        let samples = std::mem::take(&mut *self.buffer.lock());
        Recording {
            samples,
            sample_rate: self.sample_rate(),
        }
    }

    fn build_stream<T>(&self) -> Result<Stream, ChatError>
    where
        T: SizedSample,
        f32: FromSample<T>,
    {
        let channels = self.config.channels.max(1) as usize;
        let buffer = Arc::clone(&self.buffer);

        self.device
            .build_input_stream(
                &self.config,
                move |data: &[T], _: &cpal::InputCallbackInfo| {
                    let mut buffer = buffer.lock();
                    for frame in data.chunks(channels) {
                        let mono = frame
                            .iter()
                            .map(|&s| <f32 as FromSample<T>>::from_sample_(s))
                            .sum::<f32>()
                            / frame.len() as f32;
                        buffer.push((mono.clamp(-1.0, 1.0) * i16::MAX as f32) as i16);
                    }
                },
                |err| error!("Audio input stream error: {}", err),
                None,
            )
            .map_err(|e| {
                ChatError::MicrophoneUnavailable(format!("failed to build input stream: {e}"))
            })
    }
}
