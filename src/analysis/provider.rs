use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use super::AnalysisResult;
use crate::config::{AnalysisConfig, AnalysisProviderType};
use crate::journal::{ChatRole, ChatTurn};

const REQUEST_TIMEOUT_SECS: u64 = 120;

/// System instruction for the sighting-report analysis. The response must be
/// a single JSON object matching [`AnalysisResult`]'s wire format.
const ANALYSIS_INSTRUCTION: &str = r#"You are an AI Field Biologist for a nature journaling app. Analyze the submitted media and return a "Sighting Report" as a single JSON object with exactly these keys:
  isAnimalOrPlant (boolean), subjectName (string), description (string),
  conservationStatus (one of "LC","NT","VU","EN","CR","EW","EX","DD","NE"),
  populationTrend (one of "Increasing","Decreasing","Stable","Unknown"),
  primaryThreats (array of 2-3 strings), estimatedLocation (string),
  ecosystem (string), coordinates ({"latitude": number, "longitude": number}),
  suggestedMissions (array of {"title","description","type","emoji","xp"} where
  type is one of "plasticPatrol","pollinatorPledge","artForAwareness","general"
  and xp is an integer between 20 and 50).

If the subject IS an animal or plant: write a rich field-biologist narrative in description, fill in real conservation data, estimate a plausible location from the environment, and suggest 2-3 actionable kid-friendly field missions.
If the subject is NOT wildlife: set isAnimalOrPlant to false, name the object in subjectName, write a friendly message in description explaining you identify wildlife, use "NE" and "Unknown" for the conservation fields, and suggest no missions.
Respond ONLY with the JSON object."#;

const SPOTLIGHT_INSTRUCTION: &str = "You are an optimistic AI conservationist. Tell a concise, uplifting, true story (3-4 sentences) about a real-world conservation success for the given species or a similar one, highlighting how human effort led to a positive outcome. Plain text, no JSON.";

const CHECK_IN_INSTRUCTION: &str = "You are a friendly AI field biologist companion for a young eco-scout. Write a warm, imaginative 2-3 sentence check-in message about one of their animal friends. Plain text, no JSON.";

fn chat_instruction(subject: &str, persona: &str) -> String {
    format!(
        "You are {subject}, a friendly animal talking to a young explorer. Your personality is based on this description: \"{persona}\". Keep replies short, fun, in character, and easy for a child to understand. Speak in the first person as the animal and never break character."
    )
}

/// A provider that can run the analysis prompts against some model API.
pub trait AnalysisProvider: Send + Sync {
    /// Analyze a media payload (base64 data URL) into a sighting report.
    fn analyze_media(&self, data_url: &str, mime_type: &str) -> Result<AnalysisResult>;

    /// Fetch an uplifting conservation story for a hope-spotlight subject.
    fn hope_spotlight_story(&self, subject: &str) -> Result<String>;

    /// In-character reply for the per-entry chat.
    fn chat_reply(
        &self,
        subject: &str,
        persona: &str,
        history: &[ChatTurn],
        message: &str,
    ) -> Result<String>;

    /// Welcome-back message about a previously logged favorite.
    fn check_in(&self, subject: &str) -> Result<String>;

    /// Provider name for display.
    fn provider_name(&self) -> &'static str;
}

/// Strip a markdown code fence the model may wrap around JSON output.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

fn parse_report(text: &str) -> Result<AnalysisResult> {
    serde_json::from_str(strip_code_fences(text)).map_err(|e| {
        tracing::error!(error = %e, raw = text, "Unparseable sighting report");
        anyhow!("The AI field biologist gave an unexpected response. Please try another file.")
    })
}

/// The base64 payload of a data URL, without the `data:<mime>;base64,` head.
fn data_url_payload(data_url: &str) -> &str {
    data_url
        .split_once("base64,")
        .map(|(_, payload)| payload)
        .unwrap_or(data_url)
}

fn agent() -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
}

// ============================================================================
// Gemini provider
// ============================================================================

pub struct GeminiProvider {
    endpoint: String,
    model: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
enum GeminiPart {
    #[serde(rename = "text")]
    Text(String),
    #[serde(rename = "inline_data")]
    InlineData { mime_type: String, data: String },
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    response_mime_type: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiResponseContent,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

impl GeminiProvider {
    pub fn new(endpoint: &str, model: &str, api_key: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn generate(&self, request: &GeminiRequest) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.endpoint, self.model);

        let response = agent()
            .post(&url)
            .set("Content-Type", "application/json")
            .set("x-goog-api-key", &self.api_key)
            .send_json(request)
            .map_err(|e| anyhow!("Analysis request failed: {}", e))?;

        let gemini_response: GeminiResponse = response
            .into_json()
            .map_err(|e| anyhow!("Failed to parse analysis response: {}", e))?;

        gemini_response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .and_then(|p| p.text.clone())
            .ok_or_else(|| anyhow!("No response from analysis service"))
    }

    fn text_request(instruction: &str, prompt: &str) -> GeminiRequest {
        GeminiRequest {
            system_instruction: Some(GeminiContent {
                role: None,
                parts: vec![GeminiPart::Text(instruction.to_string())],
            }),
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart::Text(prompt.to_string())],
            }],
            generation_config: None,
        }
    }
}

impl AnalysisProvider for GeminiProvider {
    fn analyze_media(&self, data_url: &str, mime_type: &str) -> Result<AnalysisResult> {
        let request = GeminiRequest {
            system_instruction: Some(GeminiContent {
                role: None,
                parts: vec![GeminiPart::Text(ANALYSIS_INSTRUCTION.to_string())],
            }),
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart::InlineData {
                    mime_type: mime_type.to_string(),
                    data: data_url_payload(data_url).to_string(),
                }],
            }],
            generation_config: Some(GeminiGenerationConfig {
                response_mime_type: "application/json".to_string(),
            }),
        };
        parse_report(&self.generate(&request)?)
    }

    fn hope_spotlight_story(&self, subject: &str) -> Result<String> {
        let prompt = format!(
            "Tell me a hope-filled conservation success story related to an animal like the {subject}."
        );
        self.generate(&Self::text_request(SPOTLIGHT_INSTRUCTION, &prompt))
    }

    fn chat_reply(
        &self,
        subject: &str,
        persona: &str,
        history: &[ChatTurn],
        message: &str,
    ) -> Result<String> {
        let mut contents: Vec<GeminiContent> = history
            .iter()
            .map(|turn| GeminiContent {
                role: Some(
                    match turn.role {
                        ChatRole::User => "user",
                        ChatRole::Agent => "model",
                    }
                    .to_string(),
                ),
                parts: vec![GeminiPart::Text(turn.text.clone())],
            })
            .collect();
        contents.push(GeminiContent {
            role: Some("user".to_string()),
            parts: vec![GeminiPart::Text(message.to_string())],
        });

        let request = GeminiRequest {
            system_instruction: Some(GeminiContent {
                role: None,
                parts: vec![GeminiPart::Text(chat_instruction(subject, persona))],
            }),
            contents,
            generation_config: None,
        };
        self.generate(&request)
    }

    fn check_in(&self, subject: &str) -> Result<String> {
        let prompt = format!("Generate a check-in message for my animal friend, a {subject}.");
        self.generate(&Self::text_request(CHECK_IN_INSTRUCTION, &prompt))
    }

    fn provider_name(&self) -> &'static str {
        "Gemini"
    }
}

// ============================================================================
// OpenAI-compatible provider (works with OpenAI, LM Studio, and Ollama's
// /v1 endpoint)
// ============================================================================

pub struct OpenAICompatibleProvider {
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct OpenAIChatRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: OpenAIContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum OpenAIContent {
    Text(String),
    Parts(Vec<OpenAIContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum OpenAIContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIChatResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: String,
}

impl OpenAICompatibleProvider {
    pub fn new(endpoint: &str, model: &str, api_key: Option<&str>) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.map(|s| s.to_string()),
        }
    }

    fn chat(&self, messages: Vec<OpenAIMessage>) -> Result<String> {
        let request = OpenAIChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens: 1500,
            temperature: 0.7,
        };

        let url = format!("{}/chat/completions", self.endpoint);

        let mut req = agent().post(&url).set("Content-Type", "application/json");
        if let Some(ref api_key) = self.api_key {
            req = req.set("Authorization", &format!("Bearer {}", api_key));
        }

        let response = req
            .send_json(&request)
            .map_err(|e| anyhow!("Analysis request failed: {}", e))?;

        let chat_response: OpenAIChatResponse = response
            .into_json()
            .map_err(|e| anyhow!("Failed to parse analysis response: {}", e))?;

        chat_response
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| anyhow!("No response from analysis service"))
    }

    fn system(text: impl Into<String>) -> OpenAIMessage {
        OpenAIMessage {
            role: "system".to_string(),
            content: OpenAIContent::Text(text.into()),
        }
    }

    fn user(text: impl Into<String>) -> OpenAIMessage {
        OpenAIMessage {
            role: "user".to_string(),
            content: OpenAIContent::Text(text.into()),
        }
    }
}

impl AnalysisProvider for OpenAICompatibleProvider {
    fn analyze_media(&self, data_url: &str, _mime_type: &str) -> Result<AnalysisResult> {
        let messages = vec![
            Self::system(ANALYSIS_INSTRUCTION),
            OpenAIMessage {
                role: "user".to_string(),
                content: OpenAIContent::Parts(vec![
                    OpenAIContentPart::Text {
                        text: "Analyze this sighting.".to_string(),
                    },
                    OpenAIContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: data_url.to_string(),
                        },
                    },
                ]),
            },
        ];
        parse_report(&self.chat(messages)?)
    }

    fn hope_spotlight_story(&self, subject: &str) -> Result<String> {
        self.chat(vec![
            Self::system(SPOTLIGHT_INSTRUCTION),
            Self::user(format!(
                "Tell me a hope-filled conservation success story related to an animal like the {subject}."
            )),
        ])
    }

    fn chat_reply(
        &self,
        subject: &str,
        persona: &str,
        history: &[ChatTurn],
        message: &str,
    ) -> Result<String> {
        let mut messages = vec![Self::system(chat_instruction(subject, persona))];
        for turn in history {
            messages.push(OpenAIMessage {
                role: match turn.role {
                    ChatRole::User => "user",
                    ChatRole::Agent => "assistant",
                }
                .to_string(),
                content: OpenAIContent::Text(turn.text.clone()),
            });
        }
        messages.push(Self::user(message));
        self.chat(messages)
    }

    fn check_in(&self, subject: &str) -> Result<String> {
        self.chat(vec![
            Self::system(CHECK_IN_INSTRUCTION),
            Self::user(format!(
                "Generate a check-in message for my animal friend, a {subject}."
            )),
        ])
    }

    fn provider_name(&self) -> &'static str {
        "OpenAI-compatible"
    }
}

/// Create an analysis provider based on configuration.
pub fn create_provider(config: &AnalysisConfig) -> Box<dyn AnalysisProvider> {
    match config.provider {
        AnalysisProviderType::Gemini => Box::new(GeminiProvider::new(
            &config.endpoint,
            &config.model,
            config.api_key.as_deref().unwrap_or(""),
        )),
        AnalysisProviderType::OpenAI => Box::new(OpenAICompatibleProvider::new(
            "https://api.openai.com/v1",
            &config.model,
            config.api_key.as_deref(),
        )),
        AnalysisProviderType::LmStudio | AnalysisProviderType::Ollama => {
            Box::new(OpenAICompatibleProvider::new(
                &config.endpoint,
                &config.model,
                config.api_key.as_deref(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn test_data_url_payload() {
        assert_eq!(
            data_url_payload("data:image/jpeg;base64,AAAA"),
            "AAAA"
        );
        // Already-bare payloads pass through.
        assert_eq!(data_url_payload("AAAA"), "AAAA");
    }

    #[test]
    fn test_parse_report_fenced() {
        let fenced = "```json\n{\"isAnimalOrPlant\": true, \"subjectName\": \"Red Fox\", \"description\": \"x\", \"conservationStatus\": \"LC\"}\n```";
        let report = parse_report(fenced).unwrap();
        assert_eq!(report.subject_name, "Red Fox");
    }

    #[test]
    fn test_parse_report_rejects_garbage() {
        assert!(parse_report("I am not JSON").is_err());
    }
}
