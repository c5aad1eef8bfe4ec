//! Plain-text rendering of run progress and the final summary.

use std::fmt::Write as _;

use lessongen_shared::Skill;

use crate::pipeline::{ItemOutcome, ItemStage, RunSummary, SingleResult};

/// `[index/total] SUBJECT/CODE - Name`
pub fn progress_line(index: usize, total: usize, skill: &Skill) -> String {
    format!("[{index}/{total}] {}", skill.label())
}

pub fn stage_line(stage: ItemStage) -> &'static str {
    match stage {
        ItemStage::Checking => "checking for existing content...",
        ItemStage::Generating => "generating with the completion API...",
        ItemStage::Persisting => "saving to store...",
        ItemStage::Waiting => "waiting before next request...",
    }
}

pub fn outcome_line(outcome: &ItemOutcome) -> String {
    match outcome {
        ItemOutcome::Generated { .. } => "  ✅ success".to_string(),
        ItemOutcome::Skipped => "  ⏭️  content already exists, skipping".to_string(),
        ItemOutcome::Failed { error } => format!("  ❌ error: {error}"),
    }
}

/// Multi-line run summary.
pub fn format_summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Generation complete");
    let _ = writeln!(out, "  Generated: {}", summary.success);
    let _ = writeln!(out, "  Skipped:   {}", summary.skipped);
    let _ = writeln!(out, "  Errors:    {}", summary.error);
    let _ = writeln!(out, "  Total:     {}", summary.total);
    if summary.tokens_in > 0 || summary.tokens_out > 0 {
        let _ = writeln!(
            out,
            "  Tokens:    {} in / {} out",
            summary.tokens_in, summary.tokens_out
        );
    }
    let _ = writeln!(
        out,
        "  Started:   {}",
        summary.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = write!(out, "  Time:      {:.1}s", summary.elapsed.as_secs_f64());
    out
}

/// Summary for a single-skill regeneration.
pub fn format_single(result: &SingleResult) -> String {
    let mut out = format!(
        "Generated {} ({} items) in {:.1}s",
        result.skill.label(),
        result.item_count,
        result.elapsed.as_secs_f64()
    );
    if let Some(usage) = result.usage {
        let _ = write!(
            out,
            "\n  Tokens: {} in / {} out",
            usage.prompt_tokens, usage.completion_tokens
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};

    use crate::generator::TokenUsage;

    use super::*;

    fn skill() -> Skill {
        Skill {
            id: "1".into(),
            subject_code: "MATH".into(),
            skill_code: "ADD-1".into(),
            skill_name: "Adding within 10".into(),
            skill_description: None,
            min_grade: None,
            max_grade: None,
        }
    }

    fn summary() -> RunSummary {
        RunSummary {
            total: 3,
            success: 1,
            skipped: 1,
            error: 1,
            tokens_in: 0,
            tokens_out: 0,
            started_at: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
            elapsed: Duration::from_millis(6250),
        }
    }

    #[test]
    fn progress_line_uses_label() {
        assert_eq!(
            progress_line(2, 10, &skill()),
            "[2/10] MATH/ADD-1 - Adding within 10"
        );
    }

    #[test]
    fn failed_outcome_carries_message() {
        let line = outcome_line(&ItemOutcome::Failed {
            error: "HTTP 429".into(),
        });
        assert_eq!(line, "  ❌ error: HTTP 429");
    }

    #[test]
    fn summary_lists_counters() {
        let text = format_summary(&summary());
        assert!(text.contains("Generated: 1"));
        assert!(text.contains("Skipped:   1"));
        assert!(text.contains("Errors:    1"));
        assert!(text.contains("Total:     3"));
        assert!(text.contains("Started:   2026-01-02 03:04:05 UTC"));
        assert!(text.ends_with("Time:      6.2s") || text.ends_with("Time:      6.3s"));
        assert!(!text.contains("Tokens"));
    }

    #[test]
    fn summary_shows_tokens_when_reported() {
        let mut s = summary();
        s.tokens_in = 1200;
        s.tokens_out = 800;
        assert!(format_summary(&s).contains("Tokens:    1200 in / 800 out"));
    }

    #[test]
    fn single_summary() {
        let result = SingleResult {
            skill: skill(),
            item_count: 18,
            usage: Some(TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 20,
            }),
            elapsed: Duration::from_secs(2),
        };
        let text = format_single(&result);
        assert!(text.starts_with("Generated MATH/ADD-1 - Adding within 10 (18 items) in 2.0s"));
        assert!(text.contains("Tokens: 10 in / 20 out"));
    }
}
