//! Core domain types: curriculum skills and the lessons generated for them.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// One element of a lesson collection (problem, question, ...).
///
/// Items are kept verbatim as the generator produced them; their inner
/// shape is not validated.
pub type LessonItem = serde_json::Value;

// ---------------------------------------------------------------------------
// Skill
// ---------------------------------------------------------------------------

/// A curriculum learning objective, as stored in the skills collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    /// Unique skill identifier.
    pub id: String,
    /// Subject the skill belongs to (e.g. `MATH`, `ELA`).
    pub subject_code: String,
    /// Subject-scoped skill code (e.g. `phonics-short-vowels`). Legacy rows
    /// carry `null` here; it reads as `""`.
    #[serde(default, deserialize_with = "lenient_default")]
    pub skill_code: String,
    /// Human-readable skill name.
    pub skill_name: String,
    /// Optional longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_grade: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_grade: Option<i32>,
}

impl Skill {
    /// `subject/code - name`, used in progress output.
    pub fn label(&self) -> String {
        format!(
            "{}/{} - {}",
            self.subject_code, self.skill_code, self.skill_name
        )
    }

    /// The description, or the skill name when none is stored.
    pub fn description_or_name(&self) -> &str {
        self.skill_description
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or(&self.skill_name)
    }
}

// ---------------------------------------------------------------------------
// LessonContent
// ---------------------------------------------------------------------------

/// The teaching package returned by the generator.
///
/// Every field defaults when the key is missing, `null`, or of the wrong
/// type: strings to `""`, collections to `[]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LessonContent {
    #[serde(default, deserialize_with = "lenient_default")]
    pub rules_text: String,
    #[serde(default, deserialize_with = "lenient_default")]
    pub rules_audio_script: String,
    #[serde(default, deserialize_with = "lenient_default")]
    pub demo_problems: Vec<LessonItem>,
    #[serde(default, deserialize_with = "lenient_default")]
    pub guided_practice: Vec<LessonItem>,
    #[serde(default, deserialize_with = "lenient_default")]
    pub independent_practice: Vec<LessonItem>,
    #[serde(default, deserialize_with = "lenient_default")]
    pub challenge_problems: Vec<LessonItem>,
    #[serde(default, deserialize_with = "lenient_default")]
    pub quiz_questions: Vec<LessonItem>,
    #[serde(default, deserialize_with = "lenient_default")]
    pub review_questions: Vec<LessonItem>,
}

impl LessonContent {
    /// Total number of items across all collections.
    pub fn item_count(&self) -> usize {
        self.demo_problems.len()
            + self.guided_practice.len()
            + self.independent_practice.len()
            + self.challenge_problems.len()
            + self.quiz_questions.len()
            + self.review_questions.len()
    }
}

/// Read any JSON value, keeping it only if it has the expected type.
fn lenient_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

// ---------------------------------------------------------------------------
// LessonRecord
// ---------------------------------------------------------------------------

/// A row in the lessons collection: the content plus denormalized skill fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonRecord {
    pub skill_id: String,
    pub subject_code: String,
    pub skill_name: String,
    #[serde(flatten)]
    pub content: LessonContent,
}

impl LessonRecord {
    /// Attach generated content to the skill it was generated for.
    pub fn new(skill: &Skill, content: LessonContent) -> Self {
        Self {
            skill_id: skill.id.clone(),
            subject_code: skill.subject_code.clone(),
            skill_name: skill.skill_name.clone(),
            content,
        }
    }
}
