//! Lesson generator backed by a chat-completion service.
//!
//! Builds one prompt per skill, posts it to the completion endpoint, and
//! parses the returned text into [`LessonContent`]. The service is not
//! guaranteed to return bare JSON, so code fences are stripped first.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use lessongen_shared::{GeneratorSettings, LessonContent, LessonGenError, Result, Skill};

/// User-Agent string for completion requests.
const USER_AGENT: &str = concat!("lessongen/", env!("CARGO_PKG_VERSION"));

/// Lessons are long; give the service time to finish.
const REQUEST_TIMEOUT_SECS: u64 = 180;

/// Minimum items requested per collection.
const MIN_ITEMS_PER_SECTION: usize = 3;

// ---------------------------------------------------------------------------
// Protocol types (OpenAI-compatible chat completions)
// ---------------------------------------------------------------------------

/// Request body sent to the completion endpoint.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Response body from the completion endpoint.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageResponse,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    content: Option<String>,
}

/// Token accounting reported by the completion service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

/// Parsed lesson plus the tokens it cost.
#[derive(Debug, Clone)]
pub struct GeneratedLesson {
    pub content: LessonContent,
    pub usage: Option<TokenUsage>,
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Client for the completion service.
pub struct LessonGenerator {
    client: Client,
    settings: GeneratorSettings,
}

impl LessonGenerator {
    /// Build a generator from resolved settings.
    pub fn new(settings: &GeneratorSettings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| LessonGenError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            settings: settings.clone(),
        })
    }

    /// Model identifier used for requests.
    pub fn model(&self) -> &str {
        &self.settings.model
    }

    /// Generate lesson content for one skill. No retries.
    #[instrument(skip_all, fields(skill = %skill.label(), model = %self.settings.model))]
    pub async fn generate(&self, skill: &Skill) -> Result<GeneratedLesson> {
        let prompt = build_prompt(skill);
        let request = ChatRequest {
            model: &self.settings.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &prompt,
            }],
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        let endpoint = &self.settings.endpoint;
        let response = self
            .client
            .post(endpoint)
            .bearer_auth(&self.settings.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LessonGenError::Network(format!("{endpoint}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(200).collect();
            return Err(LessonGenError::Network(format!(
                "completion API error: HTTP {status}: {excerpt}"
            )));
        }

        let data: ChatResponse = response.json().await.map_err(|e| {
            LessonGenError::Generation(format!("invalid completion response: {e}"))
        })?;

        let text = data
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                LessonGenError::Generation("completion response contained no message".into())
            })?;

        let content = parse_lesson(&text)?;
        debug!(
            items = content.item_count(),
            usage = ?data.usage,
            "lesson content parsed"
        );

        Ok(GeneratedLesson {
            content,
            usage: data.usage,
        })
    }
}

// ---------------------------------------------------------------------------
// Prompt & parsing
// ---------------------------------------------------------------------------

/// Build the instruction sent for `skill`.
pub fn build_prompt(skill: &Skill) -> String {
    let n = MIN_ITEMS_PER_SECTION;
    format!(
        r#"You are an expert K-12 curriculum designer. Generate comprehensive lesson content for:

SKILL: {name}
SUBJECT: {subject}
SKILL CODE: {code}
DESCRIPTION: {description}

Generate JSON with this EXACT structure:
{{
  "rules_text": "2-3 clear paragraphs explaining the concept in simple language",
  "rules_audio_script": "A conversational script for audio narration (150-200 words)",
  "demo_problems": [
    {{"problem": "example problem text", "steps": ["step 1", "step 2"], "answer": "final answer", "explanation": "why this works"}}
  ],
  "guided_practice": [
    {{"problem": "practice problem", "hints": ["hint 1", "hint 2"], "answer": "correct answer", "explanation": "detailed solution"}}
  ],
  "independent_practice": [
    {{"problem": "independent problem", "answer": "correct answer", "difficulty": "easy", "wrong_answers": ["wrong 1", "wrong 2", "wrong 3"]}}
  ],
  "challenge_problems": [
    {{"problem": "challenging problem", "answer": "correct answer", "explanation": "solution approach"}}
  ],
  "quiz_questions": [
    {{"question": "quiz question", "answer": "correct answer", "wrong_answers": ["wrong 1", "wrong 2", "wrong 3"], "points": 10}}
  ],
  "review_questions": [
    {{"question": "review question", "answer": "correct answer", "explanation": "why this is correct"}}
  ]
}}

Include at least {n} items in each array. Return ONLY valid JSON, no markdown formatting."#,
        name = skill.skill_name,
        subject = skill.subject_code,
        code = skill.skill_code,
        description = skill.description_or_name(),
    )
}

/// Remove a leading ```` ```json ```` / ```` ``` ```` fence and a trailing
/// ```` ``` ````, plus surrounding whitespace.
pub fn strip_code_fences(text: &str) -> &str {
    let mut s = text.trim();
    if let Some(rest) = s.strip_prefix("```json") {
        s = rest;
    } else if let Some(rest) = s.strip_prefix("```") {
        s = rest;
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

/// Parse completion text into lesson content.
///
/// The payload must be a JSON object; missing keys default (see
/// [`LessonContent`]).
pub fn parse_lesson(text: &str) -> Result<LessonContent> {
    let cleaned = strip_code_fences(text);
    let value: serde_json::Value = serde_json::from_str(cleaned).map_err(|e| {
        let preview: String = cleaned.chars().take(80).collect();
        LessonGenError::parse(format!("generator returned invalid JSON: {e} (got: {preview})"))
    })?;

    if !value.is_object() {
        return Err(LessonGenError::parse("generator JSON is not an object"));
    }

    serde_json::from_value(value)
        .map_err(|e| LessonGenError::parse(format!("unexpected lesson field type: {e}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
