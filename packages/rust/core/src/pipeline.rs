//! End-to-end generation flows: the batch run over every skill, and the
//! single-skill regeneration.
//!
//! Batch item lifecycle:
//! `pending -> skipped | generating -> persisting -> done | failed`.
//! A failed item is counted and the loop moves on; nothing is retried.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use lessongen_shared::{LessonGenError, LessonRecord, Result, Skill};
use lessongen_storage::RecordStore;

use crate::generator::{LessonGenerator, TokenUsage};
use crate::idempotence;
use crate::pacing::PacingPolicy;

// ---------------------------------------------------------------------------
// Outcomes & summary
// ---------------------------------------------------------------------------

/// Non-terminal step an item is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStage {
    /// Looking for an existing lesson.
    Checking,
    /// Waiting on the completion service.
    Generating,
    /// Writing the lesson to the store.
    Persisting,
    /// Pacing pause before the next item.
    Waiting,
}

/// Terminal state of one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Lesson generated and stored.
    Generated { usage: Option<TokenUsage> },
    /// A lesson already existed.
    Skipped,
    /// Generation or persistence failed.
    Failed { error: String },
}

/// Counters for a completed batch run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Skills loaded from the store.
    pub total: usize,
    pub success: usize,
    pub skipped: usize,
    pub error: usize,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

impl RunSummary {
    fn new(total: usize, started_at: DateTime<Utc>) -> Self {
        Self {
            total,
            success: 0,
            skipped: 0,
            error: 0,
            tokens_in: 0,
            tokens_out: 0,
            started_at,
            elapsed: Duration::ZERO,
        }
    }

    /// Count one terminal outcome.
    fn record(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Generated { usage } => {
                self.success += 1;
                if let Some(u) = usage {
                    self.tokens_in += u.prompt_tokens;
                    self.tokens_out += u.completion_tokens;
                }
            }
            ItemOutcome::Skipped => self.skipped += 1,
            ItemOutcome::Failed { .. } => self.error += 1,
        }
    }

    /// Number of items that reached a terminal state.
    pub fn processed(&self) -> usize {
        self.success + self.skipped + self.error
    }
}

/// Result of regenerating a single skill.
#[derive(Debug, Clone)]
pub struct SingleResult {
    pub skill: Skill,
    pub item_count: usize,
    pub usage: Option<TokenUsage>,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called once the skill list is loaded.
    fn run_started(&self, total: usize);
    /// Called when an item leaves `pending`. `index` is 1-based.
    fn item_started(&self, index: usize, total: usize, skill: &Skill);
    /// Called on each stage transition of the current item.
    fn item_stage(&self, stage: ItemStage);
    /// Called when the current item reaches a terminal state.
    fn item_finished(&self, skill: &Skill, outcome: &ItemOutcome);
    /// Called when the batch completes.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn run_started(&self, _total: usize) {}
    fn item_started(&self, _index: usize, _total: usize, _skill: &Skill) {}
    fn item_stage(&self, _stage: ItemStage) {}
    fn item_finished(&self, _skill: &Skill, _outcome: &ItemOutcome) {}
    fn done(&self, _summary: &RunSummary) {}
}

// ---------------------------------------------------------------------------
// Batch run
// ---------------------------------------------------------------------------

/// Generate lessons for every skill that lacks one.
///
/// 1. Load all skills (a failure here is returned before any item runs)
/// 2. For each skill: check, generate, persist
/// 3. Pause via `pacing` after each non-skipped item except the last
#[instrument(skip_all)]
pub async fn run_batch<P: PacingPolicy>(
    store: &RecordStore,
    generator: &LessonGenerator,
    pacing: &P,
    progress: &dyn ProgressReporter,
) -> Result<RunSummary> {
    let start = Instant::now();
    let started_at = Utc::now();

    let skills = store.list_skills().await?;
    let total = skills.len();
    info!(total, model = generator.model(), "starting generation run");
    progress.run_started(total);

    let mut summary = RunSummary::new(total, started_at);

    for (i, skill) in skills.iter().enumerate() {
        let index = i + 1;
        progress.item_started(index, total, skill);

        let outcome = process_skill(store, generator, skill, progress).await;
        summary.record(&outcome);
        progress.item_finished(skill, &outcome);

        if outcome != ItemOutcome::Skipped && index < total {
            progress.item_stage(ItemStage::Waiting);
            pacing.pause().await;
        }
    }

    summary.elapsed = start.elapsed();
    debug_assert_eq!(summary.processed(), summary.total);

    info!(
        success = summary.success,
        skipped = summary.skipped,
        errors = summary.error,
        total = summary.total,
        tokens_in = summary.tokens_in,
        tokens_out = summary.tokens_out,
        elapsed_ms = summary.elapsed.as_millis(),
        "generation run complete"
    );

    progress.done(&summary);
    Ok(summary)
}

/// Drive one skill to a terminal state. Never returns an error.
pub async fn process_skill(
    store: &RecordStore,
    generator: &LessonGenerator,
    skill: &Skill,
    progress: &dyn ProgressReporter,
) -> ItemOutcome {
    progress.item_stage(ItemStage::Checking);
    if idempotence::has_existing_content(store, &skill.id).await {
        return ItemOutcome::Skipped;
    }

    match generate_and_store(store, generator, skill, progress).await {
        Ok(usage) => ItemOutcome::Generated { usage },
        Err(e) => {
            warn!(skill = %skill.label(), error = %e, "skill failed");
            ItemOutcome::Failed {
                error: e.to_string(),
            }
        }
    }
}

async fn generate_and_store(
    store: &RecordStore,
    generator: &LessonGenerator,
    skill: &Skill,
    progress: &dyn ProgressReporter,
) -> Result<Option<TokenUsage>> {
    progress.item_stage(ItemStage::Generating);
    let lesson = generator.generate(skill).await?;

    progress.item_stage(ItemStage::Persisting);
    store
        .insert_lesson(&LessonRecord::new(skill, lesson.content))
        .await?;

    Ok(lesson.usage)
}

// ---------------------------------------------------------------------------
// Single skill
// ---------------------------------------------------------------------------

/// Regenerate one skill by code, replacing any stored lesson.
#[instrument(skip(store, generator))]
pub async fn generate_one(
    store: &RecordStore,
    generator: &LessonGenerator,
    skill_code: &str,
    subject_code: &str,
) -> Result<SingleResult> {
    let start = Instant::now();

    let skill = store
        .find_skill(skill_code, subject_code)
        .await?
        .ok_or_else(|| {
            LessonGenError::validation(format!("skill not found: {subject_code}/{skill_code}"))
        })?;

    info!(skill = %skill.label(), "generating single skill");
    let lesson = generator.generate(&skill).await?;
    let item_count = lesson.content.item_count();

    store
        .upsert_lesson(&LessonRecord::new(&skill, lesson.content))
        .await?;

    Ok(SingleResult {
        skill,
        item_count,
        usage: lesson.usage,
        elapsed: start.elapsed(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use url::Url;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use lessongen_shared::{GeneratorSettings, StoreSettings};

    use super::*;

    const LESSON: &str = r#"{
        "rules_text": "rules",
        "rules_audio_script": "script",
        "demo_problems": [{"problem": "1+1", "answer": "2"}],
        "guided_practice": [{"problem": "2+1", "answer": "3"}],
        "independent_practice": [{"problem": "3+1", "answer": "4"}],
        "challenge_problems": [{"problem": "9+9", "answer": "18"}],
        "quiz_questions": [{"question": "1+2", "answer": "3"}],
        "review_questions": [{"question": "2+2", "answer": "4"}]
    }"#;

    /// Counts pauses instead of sleeping.
    #[derive(Default)]
    struct CountingPacer(AtomicUsize);

    impl PacingPolicy for CountingPacer {
        fn pause(&self) -> impl std::future::Future<Output = ()> + Send {
            self.0.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    /// Records every callback as a line.
    #[derive(Default)]
    struct RecordingProgress(Mutex<Vec<String>>);

    impl RecordingProgress {
        fn push(&self, line: String) {
            self.0.lock().unwrap().push(line);
        }
        fn lines(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    impl ProgressReporter for RecordingProgress {
        fn run_started(&self, total: usize) {
            self.push(format!("start {total}"));
        }
        fn item_started(&self, index: usize, total: usize, skill: &Skill) {
            self.push(format!("item {index}/{total} {}", skill.id));
        }
        fn item_stage(&self, stage: ItemStage) {
            self.push(format!("stage {stage:?}"));
        }
        fn item_finished(&self, skill: &Skill, outcome: &ItemOutcome) {
            let tag = match outcome {
                ItemOutcome::Generated { .. } => "generated",
                ItemOutcome::Skipped => "skipped",
                ItemOutcome::Failed { .. } => "failed",
            };
            self.push(format!("finished {} {tag}", skill.id));
        }
        fn done(&self, summary: &RunSummary) {
            self.push(format!("done {}", summary.total));
        }
    }

    fn skill_row(id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "subject_code": "MATH",
            "skill_code": format!("code-{id}"),
            "skill_name": format!("Skill {id}"),
        })
    }

    fn completion(text: &str) -> serde_json::Value {
        json!({
            "choices": [{"message": {"role": "assistant", "content": text}}],
            "usage": {"prompt_tokens": 100, "completion_tokens": 50}
        })
    }

    fn clients(server: &MockServer) -> (RecordStore, LessonGenerator) {
        let store = RecordStore::new(&StoreSettings {
            base_url: Url::parse(&server.uri()).unwrap(),
            service_key: "service-key".into(),
            skills_table: "curriculum_skills".into(),
            lessons_table: "lesson_content".into(),
        })
        .unwrap();
        let generator = LessonGenerator::new(&GeneratorSettings {
            endpoint: format!("{}/v1/chat/completions", server.uri()),
            api_key: "xai-key".into(),
            model: "grok-beta".into(),
            temperature: 0.7,
            max_tokens: 4000,
        })
        .unwrap();
        (store, generator)
    }

    async fn mount_skills(server: &MockServer, ids: &[&str]) {
        let rows: Vec<_> = ids.iter().map(|id| skill_row(id)).collect();
        Mock::given(method("GET"))
            .and(path("/rest/v1/curriculum_skills"))
            .respond_with(ResponseTemplate::new(200).set_body_json(rows))
            .mount(server)
            .await;
    }

    async fn mount_existing(server: &MockServer, id: &str, exists: bool) {
        let body = if exists { json!([{"id": 1}]) } else { json!([]) };
        Mock::given(method("GET"))
            .and(path("/rest/v1/lesson_content"))
            .and(query_param("skill_id", format!("eq.{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    async fn mount_completion(server: &MockServer, id: &str, text: &str) {
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_string_contains(format!("SKILL: Skill {id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(text)))
            .mount(server)
            .await;
    }

    async fn mount_lesson_insert(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/rest/v1/lesson_content"))
            .respond_with(ResponseTemplate::new(201))
            .mount(server)
            .await;
    }

    async fn inserted_skill_ids(server: &MockServer) -> Vec<String> {
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.method.as_str() == "POST" && r.url.path() == "/rest/v1/lesson_content")
            .map(|r| {
                let body: serde_json::Value = serde_json::from_slice(&r.body).unwrap();
                body["skill_id"].as_str().unwrap_or_default().to_string()
            })
            .collect()
    }

    #[tokio::test]
    async fn skip_success_and_error_are_counted() {
        let server = MockServer::start().await;
        mount_skills(&server, &["a", "b", "c"]).await;
        mount_existing(&server, "a", true).await;
        mount_existing(&server, "b", false).await;
        mount_existing(&server, "c", false).await;
        mount_completion(&server, "b", &format!("```json\n{LESSON}\n```")).await;
        mount_completion(&server, "c", "not json").await;
        mount_lesson_insert(&server).await;

        let (store, generator) = clients(&server);
        let pacer = CountingPacer::default();
        let progress = RecordingProgress::default();

        let summary = run_batch(&store, &generator, &pacer, &progress)
            .await
            .expect("run");

        assert_eq!(summary.success, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.error, 1);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.processed(), summary.total);
        assert_eq!(summary.tokens_in, 100);
        assert_eq!(summary.tokens_out, 50);

        // Only b was written.
        assert_eq!(inserted_skill_ids(&server).await, vec!["b".to_string()]);

        // b paused; a was skipped and c was last.
        assert_eq!(pacer.0.load(Ordering::SeqCst), 1);

        let lines = progress.lines();
        assert!(lines.contains(&"finished a skipped".to_string()));
        assert!(lines.contains(&"finished b generated".to_string()));
        assert!(lines.contains(&"finished c failed".to_string()));
        assert_eq!(lines.last().map(String::as_str), Some("done 3"));
    }

    #[tokio::test]
    async fn pauses_after_failures_but_not_skips() {
        let server = MockServer::start().await;
        mount_skills(&server, &["x", "y", "z", "w"]).await;
        mount_existing(&server, "x", false).await;
        mount_existing(&server, "y", true).await;
        mount_existing(&server, "z", false).await;
        mount_existing(&server, "w", false).await;
        mount_completion(&server, "x", "oops").await;
        mount_completion(&server, "z", "{broken").await;
        mount_completion(&server, "w", LESSON).await;
        mount_lesson_insert(&server).await;

        let (store, generator) = clients(&server);
        let pacer = CountingPacer::default();
        let summary = run_batch(&store, &generator, &pacer, &SilentProgress)
            .await
            .expect("run");

        assert_eq!((summary.success, summary.skipped, summary.error), (1, 1, 2));
        assert_eq!(pacer.0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn persistence_failure_counts_as_error_and_continues() {
        let server = MockServer::start().await;
        mount_skills(&server, &["p", "q"]).await;
        mount_existing(&server, "p", false).await;
        mount_existing(&server, "q", false).await;
        mount_completion(&server, "p", LESSON).await;
        mount_completion(&server, "q", LESSON).await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/lesson_content"))
            .and(body_string_contains("\"skill_id\":\"p\""))
            .respond_with(ResponseTemplate::new(500).set_body_string("insert failed"))
            .mount(&server)
            .await;
        mount_lesson_insert(&server).await;

        let (store, generator) = clients(&server);
        let progress = RecordingProgress::default();
        let summary = run_batch(&store, &generator, &CountingPacer::default(), &progress)
            .await
            .expect("run");

        assert_eq!((summary.success, summary.skipped, summary.error), (1, 0, 1));
        let lines = progress.lines();
        let p_stages: Vec<&String> = lines
            .iter()
            .skip_while(|l| *l != "item 1/2 p")
            .take_while(|l| !l.starts_with("finished"))
            .collect();
        assert!(p_stages.contains(&&"stage Persisting".to_string()));
    }

    #[tokio::test]
    async fn null_skill_code_row_is_still_processed() {
        let server = MockServer::start().await;
        let mut legacy = skill_row("n");
        legacy["skill_code"] = serde_json::Value::Null;
        Mock::given(method("GET"))
            .and(path("/rest/v1/curriculum_skills"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([skill_row("k"), legacy])))
            .mount(&server)
            .await;
        mount_existing(&server, "k", true).await;
        mount_existing(&server, "n", false).await;
        mount_completion(&server, "n", LESSON).await;
        mount_lesson_insert(&server).await;

        let (store, generator) = clients(&server);
        let progress = RecordingProgress::default();
        let summary = run_batch(&store, &generator, &CountingPacer::default(), &progress)
            .await
            .expect("run");

        assert_eq!((summary.success, summary.skipped, summary.error), (1, 1, 0));
        assert!(progress.lines().contains(&"finished n generated".to_string()));
        assert_eq!(inserted_skill_ids(&server).await, vec!["n".to_string()]);
    }

    #[tokio::test]
    async fn skill_fetch_failure_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/curriculum_skills"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let (store, generator) = clients(&server);
        let progress = RecordingProgress::default();
        let err = run_batch(&store, &generator, &CountingPacer::default(), &progress)
            .await
            .expect_err("should fail");

        assert!(err.to_string().contains("401"));
        assert!(progress.lines().is_empty());
    }

    #[tokio::test]
    async fn empty_skill_list_yields_zero_summary() {
        let server = MockServer::start().await;
        mount_skills(&server, &[]).await;

        let (store, generator) = clients(&server);
        let summary = run_batch(&store, &generator, &CountingPacer::default(), &SilentProgress)
            .await
            .expect("run");
        assert_eq!(summary.total, 0);
        assert_eq!(summary.processed(), 0);
    }

    #[tokio::test]
    async fn generate_one_upserts_even_when_content_exists() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/curriculum_skills"))
            .and(query_param("skill_code", "eq.code-s"))
            .and(query_param("subject_code", "eq.MATH"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([skill_row("s")])))
            .mount(&server)
            .await;
        mount_completion(&server, "s", LESSON).await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/lesson_content"))
            .and(query_param("on_conflict", "skill_id"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let (store, generator) = clients(&server);
        let result = generate_one(&store, &generator, "code-s", "MATH")
            .await
            .expect("single");

        assert_eq!(result.skill.id, "s");
        assert_eq!(result.item_count, 6);
    }

    #[tokio::test]
    async fn generate_one_reports_unknown_skill() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/curriculum_skills"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let (store, generator) = clients(&server);
        let err = generate_one(&store, &generator, "nope", "ELA")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("skill not found: ELA/nope"));
    }
}
