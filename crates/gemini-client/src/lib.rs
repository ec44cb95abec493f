//! Summarize and translate through the Gemini `generateContent` API.
//!
//! Calls are blocking; hosts run `AiRequest::execute` off their UI thread and
//! report the result back to the popup controller.

use doc_model::TargetLang;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use viewer_core::{AiError, AiService};

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

const TEMPERATURE: f32 = 0.3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    agent: ureq::Agent,
    api_key: Option<String>,
    model: String,
    endpoint: String,
    summary_lang: TargetLang,
}

impl GeminiClient {
    /// A client with no key fails every call with `AiError::MissingApiKey`.
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            model: DEFAULT_MODEL.to_owned(),
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            summary_lang: TargetLang::Ko,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Language summaries are written in.
    pub fn with_summary_lang(mut self, lang: TargetLang) -> Self {
        self.summary_lang = lang;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn generate(&self, prompt: &str) -> Result<String, AiError> {
        let api_key = self.api_key.as_deref().ok_or(AiError::MissingApiKey)?;

        let url = format!("{}/{}:generateContent", self.endpoint.trim_end_matches('/'), self.model);
        let body = serde_json::to_string(&GenerateRequest {
            contents: vec![Content { parts: vec![Part { text: prompt }] }],
            generation_config: GenerationConfig { temperature: TEMPERATURE },
        })
        .map_err(|e| AiError::InvalidResponse(e.to_string()))?;

        debug!(model = %self.model, prompt_len = prompt.len(), "calling Gemini");
        let response = self
            .agent
            .post(&url)
            .query("key", api_key)
            .set("Content-Type", "application/json")
            .send_string(&body);

        let body = match response {
            Ok(resp) => resp.into_string().map_err(|e| AiError::InvalidResponse(e.to_string()))?,
            // Error statuses still carry the API's JSON error payload.
            Err(ureq::Error::Status(code, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                return Err(match parse_response(&body) {
                    Err(AiError::Api(message)) => AiError::Api(message),
                    _ => AiError::Api(format!("HTTP {code}")),
                });
            }
            Err(e) => return Err(AiError::Network(e.to_string())),
        };

        parse_response(&body)
    }
}

impl AiService for GeminiClient {
    fn summarize(&self, text: &str) -> Result<String, AiError> {
        let text = non_empty(text)?;
        self.generate(&summary_prompt(text, self.summary_lang))
    }

    fn translate(&self, text: &str, target: TargetLang) -> Result<String, AiError> {
        let text = non_empty(text)?;
        self.generate(&translation_prompt(text, target))
    }
}

fn non_empty(text: &str) -> Result<&str, AiError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AiError::EmptyInput);
    }
    Ok(trimmed)
}

pub fn summary_prompt(text: &str, lang: TargetLang) -> String {
    let language = match lang {
        TargetLang::Ko => "Korean",
        TargetLang::En => "English",
    };

    format!(
        "Summarize the following academic text concisely in {language}. \
         Cover only the key points in 3-5 sentences. \
         Keep technical terms as they are, but explain them so they are easy to follow.\n\n\
         ---\n{text}\n---"
    )
}

pub fn translation_prompt(text: &str, target: TargetLang) -> String {
    let language = match target {
        TargetLang::Ko => "Korean",
        TargetLang::En => "English",
    };

    format!(
        "Translate the following academic text into {language}. \
         Keep academic terminology accurate.\n\n---\n{text}\n---"
    )
}

/// Extracts the first candidate's text, or the API's error message.
pub fn parse_response(body: &str) -> Result<String, AiError> {
    let response: GenerateResponse =
        serde_json::from_str(body).map_err(|e| AiError::InvalidResponse(e.to_string()))?;

    if let Some(error) = response.error {
        return Err(AiError::Api(error.message));
    }

    response
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .and_then(|candidate| candidate.content.parts.into_iter().find_map(|part| part.text))
        .ok_or_else(|| AiError::InvalidResponse("response contained no text".to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_candidate_text() {
        let body = r#"{
            "candidates": [
                { "content": { "parts": [{ "text": "A short summary." }], "role": "model" } },
                { "content": { "parts": [{ "text": "ignored" }] } }
            ],
            "usageMetadata": { "totalTokenCount": 42 }
        }"#;

        assert_eq!(parse_response(body), Ok("A short summary.".to_owned()));
    }

    #[test]
    fn api_error_payload_is_reported() {
        let body = r#"{
            "error": { "code": 400, "message": "API key not valid.", "status": "INVALID_ARGUMENT" }
        }"#;
        assert_eq!(parse_response(body), Err(AiError::Api("API key not valid.".to_owned())));
    }

    #[test]
    fn empty_or_malformed_responses_are_invalid() {
        assert!(matches!(
            parse_response(r#"{ "candidates": [] }"#),
            Err(AiError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_response(r#"{ "candidates": [{ "content": { "parts": [] } }] }"#),
            Err(AiError::InvalidResponse(_))
        ));
        assert!(matches!(parse_response("<html>"), Err(AiError::InvalidResponse(_))));
    }

    #[test]
    fn request_body_matches_generate_content_shape() {
        let body = serde_json::to_value(GenerateRequest {
            contents: vec![Content { parts: vec![Part { text: "hi" }] }],
            generation_config: GenerationConfig { temperature: TEMPERATURE },
        })
        .expect("serialize request");

        assert_eq!(body["contents"][0]["parts"][0]["text"], "hi");
        let temperature = body["generationConfig"]["temperature"].as_f64().expect("number");
        assert!((temperature - 0.3).abs() < 1e-6);
    }

    #[test]
    fn prompts_embed_text_and_language() {
        let korean = translation_prompt("attention", TargetLang::Ko);
        assert!(korean.contains("into Korean"));
        assert!(korean.ends_with("---\nattention\n---"));

        assert!(translation_prompt("x", TargetLang::En).contains("into English"));
        assert!(summary_prompt("x", TargetLang::En).contains("3-5 sentences"));
    }

    #[test]
    fn input_and_key_are_checked_before_any_request() {
        let client = GeminiClient::new(Some("key".to_owned()));
        assert_eq!(client.summarize("   "), Err(AiError::EmptyInput));

        let keyless = GeminiClient::new(Some("  ".to_owned()));
        assert_eq!(keyless.translate("hello", TargetLang::En), Err(AiError::MissingApiKey));
        assert_eq!(GeminiClient::new(None).summarize("hello"), Err(AiError::MissingApiKey));
    }
}
