use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::expand::{ExpandError, Expander};
use super::tree::ConceptNode;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// Expands concepts through the Gemini `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct GeminiExpander {
    client: Client,
    model: String,
}

impl GeminiExpander {
    pub fn new(model: impl Into<String>, timeout: Duration) -> Result<Self, ExpandError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            model: model.into(),
        })
    }

    fn generate(&self, prompt: String, credential: &str) -> Result<String, ExpandError> {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: 1.0,
                top_p: 0.95,
                top_k: 40,
                max_output_tokens: 8192,
            },
        };

        let url = format!("{BASE_URL}/{}:generateContent", self.model);
        debug!(%url, "sending expansion prompt");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", credential)
            .json(&body)
            .send()?;

        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            return Err(classify_failure(status, text));
        }

        let parsed: GenerateResponse = serde_json::from_str(&text)
            .map_err(|error| ExpandError::MalformedResponse(error.to_string()))?;

        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text)
            .ok_or_else(|| ExpandError::MalformedResponse("no candidates returned".to_owned()))
    }
}

impl Expander for GeminiExpander {
    fn expand(
        &self,
        concept: &str,
        parent_context: &str,
        credential: &str,
    ) -> Result<ConceptNode, ExpandError> {
        let prompt = build_prompt(concept, parent_context);
        let text = self.generate(prompt, credential)?;
        let node = parse_concept_tree(&text)?;
        info!(
            concept,
            parent_context,
            children = node.children.len(),
            "model expanded concept"
        );
        Ok(node)
    }
}

fn classify_failure(status: StatusCode, body: String) -> ExpandError {
    let credential_rejected = matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
        || (status == StatusCode::BAD_REQUEST && body.contains("API_KEY_INVALID"));

    if credential_rejected {
        ExpandError::InvalidCredential(format!("HTTP {}", status.as_u16()))
    } else {
        ExpandError::Api {
            status: status.as_u16(),
            body,
        }
    }
}

pub(super) fn build_prompt(concept: &str, parent_context: &str) -> String {
    if parent_context.is_empty() {
        format!(
            r#"Break down the concept "{concept}" into 5-8 main components or aspects. Format the response as a JSON object like this:
{{
  "name": "{concept}",
  "children": [
    {{"name": "component-1", "value": 1}},
    {{"name": "component-2", "value": 1}}
  ]
}}
Focus on primary, direct components or aspects."#
        )
    } else {
        format!(
            r#"Given the concept "{concept}" in the context of "{parent_context}", generate 3-5 direct sub-components or related concepts. Format the response as a JSON object like this:
{{
  "name": "{concept}",
  "children": [
    {{"name": "sub-component-1", "value": 1}},
    {{"name": "sub-component-2", "value": 1}}
  ]
}}
Keep responses focused and directly related to the parent concept."#
        )
    }
}

/// Slice from the first `{` to the last `}`; models like to wrap JSON in prose
/// or markdown fences.
pub(super) fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

pub(super) fn parse_concept_tree(text: &str) -> Result<ConceptNode, ExpandError> {
    let json = extract_json_object(text)
        .ok_or_else(|| ExpandError::MalformedResponse("no JSON object in reply".to_owned()))?;
    let node: ConceptNode = serde_json::from_str(json)
        .map_err(|error| ExpandError::MalformedResponse(error.to_string()))?;
    Ok(node.sanitized())
}
