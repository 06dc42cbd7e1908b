use futures::future::{BoxFuture, FutureExt};
use log::{debug, Logger};
use serde::{Deserialize, Serialize};

use crate::errors::BackendError;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// A request to a text generator.
#[derive(Clone, Debug)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Something that turns a prompt into text.
pub trait TextGenerator {
    fn generate(&self, prompt: &Prompt) -> BoxFuture<Result<String, BackendError>>;
}

/// Generates text through the Gemini `generateContent` endpoint.
pub struct GeminiGenerator {
    logger: Logger,
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiGenerator {
    pub fn new(
        logger: Logger,
        client: reqwest::Client,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        GeminiGenerator {
            logger,
            client,
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", GEMINI_BASE_URL, self.model)
    }
}

impl TextGenerator for GeminiGenerator {
    fn generate(&self, prompt: &Prompt) -> BoxFuture<Result<String, BackendError>> {
        let request = GenerateRequest {
            system_instruction: Content::text(None, &prompt.system),
            contents: vec![Content::text(Some("user"), &prompt.user)],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };

        async move {
            debug!(self.logger, "Requesting generation..."; "model" => &self.model);

            let response: GenerateResponse = self
                .client
                .post(self.endpoint())
                .header(API_KEY_HEADER, &self.api_key)
                .json(&request)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|source| BackendError::GeneratorService { source })?
                .json()
                .await
                .map_err(|source| BackendError::GeneratorService { source })?;

            response.into_text().ok_or(BackendError::EmptyGeneration)
        }
        .boxed()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,

    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn text(role: Option<&str>, text: &str) -> Self {
        Content {
            role: role.map(str::to_owned),
            parts: vec![Part {
                text: Some(text.to_owned()),
            }],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

impl GenerateResponse {
    /// The concatenated text of the first candidate, if it has any.
    fn into_text(self) -> Option<String> {
        let candidate = self.candidates.into_iter().next()?;

        let text: String = candidate
            .content
            .parts
            .into_iter()
            .filter_map(|p| p.text)
            .collect();

        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Content, GenerateRequest, GenerateResponse, GenerationConfig};

    #[test]
    fn requests_use_the_wire_names() {
        let request = GenerateRequest {
            system_instruction: Content::text(None, "be brief"),
            contents: vec![Content::text(Some("user"), "plan it")],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "systemInstruction": { "parts": [{ "text": "be brief" }] },
                "contents": [{ "role": "user", "parts": [{ "text": "plan it" }] }],
                "generationConfig": { "responseMimeType": "application/json" },
            })
        );
    }

    #[test]
    fn text_comes_from_the_first_candidate() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [
                { "content": { "role": "model", "parts": [{ "text": "{\"a\":" }, { "text": "1}" }] } },
                { "content": { "parts": [{ "text": "ignored" }] } },
            ],
        }))
        .unwrap();

        assert_eq!(response.into_text().as_deref(), Some("{\"a\":1}"));

        let empty: GenerateResponse = serde_json::from_value(json!({ "candidates": [] })).unwrap();
        assert_eq!(empty.into_text(), None);
    }
}
