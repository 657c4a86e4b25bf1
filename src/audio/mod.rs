pub mod capture;
pub mod decode;
pub mod engine;
pub mod output;
pub mod payload;

pub use capture::{encode_wav, MicrophoneRecorder, Recording};
pub use decode::{decode_audio, DecodedAudio};
pub use engine::{AudioPlaybackEngine, PlaybackOutcome};
pub use output::{OutputContext, OutputFactory, RodioOutput, RodioOutputFactory};
pub use payload::{AudioEncoding, AudioPayload};
