//! Existing-content check run before generating a skill.

use tracing::warn;

use lessongen_storage::RecordStore;

/// Whether the store already holds a lesson for `skill_id`.
///
/// Fails open: any store error is logged and reported as "no content", so
/// the caller goes on to generate. Errors never reach the caller.
pub async fn has_existing_content(store: &RecordStore, skill_id: &str) -> bool {
    match store.lesson_exists(skill_id).await {
        Ok(exists) => exists,
        Err(e) => {
            warn!(skill_id, error = %e, "existing-content check failed, treating as absent");
            false
        }
    }
}
