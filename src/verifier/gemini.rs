use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::Deserialize;

use crate::{
    config::VerifierConfig,
    error::VerifyError,
    types::GestureKind,
    verifier::{
        GestureVerifier, VerificationRequest,
        crop::{CropSettings, encode_hand_jpeg},
    },
};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Deserialize, Debug)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Deserialize, Debug)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Deserialize, Debug)]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Deserialize, Debug)]
struct GeminiPart {
    text: Option<String>,
}

impl GeminiResponse {
    fn text(self) -> Option<String> {
        let text: String = self
            .candidates?
            .into_iter()
            .filter_map(|c| c.content)
            .filter_map(|c| c.parts)
            .flatten()
            .filter_map(|p| p.text)
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

/// Yes/no gesture confirmation through the Gemini `generateContent` API.
pub struct GeminiVerifier {
    client: reqwest::blocking::Client,
    api_key: String,
    model: String,
    crop: CropSettings,
}

impl GeminiVerifier {
    pub fn new(api_key: String, config: &VerifierConfig) -> Result<Self, VerifyError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;
        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            crop: CropSettings {
                padding: config.crop_padding,
                max_dimension: config.max_dimension,
                jpeg_quality: config.jpeg_quality,
            },
        })
    }

    /// Reads the API key from the environment variable named in `config`.
    /// `None` when the variable is unset or empty.
    pub fn from_env(config: &VerifierConfig) -> Option<Result<Self, VerifyError>> {
        let key = std::env::var(&config.api_key_env).ok()?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        Some(Self::new(key.to_string(), config))
    }
}

impl GestureVerifier for GeminiVerifier {
    fn verify(&mut self, request: &VerificationRequest) -> Result<bool, VerifyError> {
        let jpeg = encode_hand_jpeg(&request.frame, request.hand_bounds, &self.crop)?;
        let body = serde_json::json!({
            "contents": [{
                "parts": [
                    {
                        "inline_data": {
                            "mime_type": "image/jpeg",
                            "data": BASE64.encode(&jpeg),
                        }
                    },
                    { "text": verification_prompt(request.gesture) }
                ]
            }]
        });

        let url = format!("{API_BASE}/{}:generateContent?key={}", self.model, self.api_key);
        log::debug!(
            "asking {} to confirm {} ({} byte crop)",
            self.model,
            request.gesture,
            jpeg.len()
        );
        let response = self.client.post(&url).json(&body).send()?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(VerifyError::Status {
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            });
        }

        let parsed: GeminiResponse = response.json()?;
        let answer = parsed.text().ok_or(VerifyError::EmptyResponse)?;
        Ok(is_affirmative(&answer))
    }
}

pub fn verification_prompt(gesture: GestureKind) -> String {
    format!(
        "Is the right hand making a {} gesture ({})? Answer ONLY 'yes' or 'no'.",
        gesture.as_str().replace('_', " "),
        gesture.shape_description()
    )
}

pub fn is_affirmative(answer: &str) -> bool {
    answer.trim().to_lowercase().starts_with("yes")
}
