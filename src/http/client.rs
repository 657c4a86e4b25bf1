use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

use crate::codec::LanguageCode;
use crate::error::ChatError;

/// A selectable target language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    /// Language code, e.g. "fr"
    pub language: String,
    /// Display name, e.g. "French"
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct LanguagesResponse {
    languages: Vec<Language>,
}

/// The service answers `{"text": ...}` on success and `{"error": ...}` on failure
#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: Option<String>,
    error: Option<String>,
}

/// Client for the service's REST endpoints
#[derive(Debug, Clone)]
pub struct ServiceClient {
    client: reqwest::Client,
    base_url: String,
}

impl ServiceClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the languages the service can translate into
    pub async fn languages(&self) -> Result<Vec<Language>, ChatError> {
        let url = format!("{}/languages", self.base_url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::Service(format!("GET {url} returned {status}")));
        }

        let body: LanguagesResponse = response.json().await?;
        info!("Fetched {} languages", body.languages.len());

        Ok(body.languages)
    }

    /// Upload a WAV recording and return the transcribed text
    pub async fn speech_to_text(
        &self,
        wav: Vec<u8>,
        language: &LanguageCode,
    ) -> Result<String, ChatError> {
        let url = format!("{}/speech-to-text", self.base_url);
        let size = wav.len();

        let audio = Part::bytes(wav)
            .file_name("recording.wav")
            .mime_str("audio/wav")?;
        let form = Form::new().part("audio", audio);

        let response = self
            .client
            .post(&url)
            .query(&[("language_code", language.as_str())])
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::Service(format!("POST {url} returned {status}")));
        }

        let body: TranscriptionResponse = response.json().await?;
        match (body.text, body.error) {
            (_, Some(error)) => Err(ChatError::Service(error)),
            (Some(text), None) => {
                info!("Transcribed {} bytes of audio ({} chars)", size, text.len());
                Ok(text)
            }
            (None, None) => Err(ChatError::Service(
                "transcription response has no text".to_string(),
            )),
        }
    }
}
