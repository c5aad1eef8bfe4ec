//! REST client for the remote record store (PostgREST-style interface).
//!
//! The [`RecordStore`] struct wraps a `reqwest` client for generic collection
//! reads and writes, plus the skill and lesson operations the pipeline uses.
//!
//! **Wire rules:**
//! - Every request carries the service key twice: `apikey` header and bearer token
//! - Writes ask for an empty response body (`Prefer: return=minimal`)
//! - Any non-2xx status is returned as an error; nothing is retried

mod query;

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use lessongen_shared::{LessonGenError, LessonRecord, Result, Skill, StoreSettings};

pub use query::Query;

/// User-Agent string for store requests.
const USER_AGENT: &str = concat!("lessongen/", env!("CARGO_PKG_VERSION"));

/// Per-request timeout for store calls.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Max characters of an error body kept in error messages.
const ERROR_BODY_LIMIT: usize = 200;

/// Handle to the remote record store.
pub struct RecordStore {
    client: Client,
    /// Base URL without trailing slash.
    base: String,
    service_key: String,
    skills_table: String,
    lessons_table: String,
}

impl RecordStore {
    /// Build a store client from resolved settings.
    pub fn new(settings: &StoreSettings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| LessonGenError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base: settings.base_url.as_str().trim_end_matches('/').to_string(),
            service_key: settings.service_key.clone(),
            skills_table: settings.skills_table.clone(),
            lessons_table: settings.lessons_table.clone(),
        })
    }

    // -----------------------------------------------------------------------
    // Generic collection operations
    // -----------------------------------------------------------------------

    /// Read all records of `collection` matching `query`, in store order.
    #[instrument(skip(self, query), fields(query = %query))]
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        collection: &str,
        query: &Query,
    ) -> Result<Vec<T>> {
        let url = self.collection_url(collection, query)?;
        debug!(%url, "store read");

        let response = self
            .request(Method::GET, url.clone())
            .send()
            .await
            .map_err(|e| LessonGenError::Network(format!("{url}: {e}")))?;
        let response = check_status(&url, response).await?;

        response.json::<Vec<T>>().await.map_err(|e| {
            LessonGenError::Storage(format!("{url}: unexpected response body: {e}"))
        })
    }

    /// Insert one record into `collection`. Exactly one network write.
    #[instrument(skip(self, record))]
    pub async fn create<T: Serialize + ?Sized>(&self, collection: &str, record: &T) -> Result<()> {
        let url = self.collection_url(collection, &Query::new())?;
        debug!(%url, "store create");

        let response = self
            .request(Method::POST, url.clone())
            .header("Prefer", "return=minimal")
            .json(record)
            .send()
            .await
            .map_err(|e| LessonGenError::Network(format!("{url}: {e}")))?;
        check_status(&url, response).await?;
        Ok(())
    }

    /// Insert or replace one record, resolving conflicts on `on_conflict`.
    #[instrument(skip(self, record))]
    pub async fn upsert<T: Serialize + ?Sized>(
        &self,
        collection: &str,
        record: &T,
        on_conflict: &str,
    ) -> Result<()> {
        let mut url = self.collection_url(collection, &Query::new())?;
        url.query_pairs_mut().append_pair("on_conflict", on_conflict);
        debug!(%url, "store upsert");

        let response = self
            .request(Method::POST, url.clone())
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(record)
            .send()
            .await
            .map_err(|e| LessonGenError::Network(format!("{url}: {e}")))?;
        check_status(&url, response).await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Skill operations
    // -----------------------------------------------------------------------

    /// All skills, ordered by subject then skill code.
    pub async fn list_skills(&self) -> Result<Vec<Skill>> {
        let query = Query::new().select("*").order("subject_code,skill_code");
        self.fetch(&self.skills_table, &query).await
    }

    /// Look up a single skill by its code within a subject.
    pub async fn find_skill(&self, skill_code: &str, subject_code: &str) -> Result<Option<Skill>> {
        let query = Query::new()
            .select("*")
            .eq("skill_code", skill_code)
            .eq("subject_code", subject_code)
            .limit(1);
        let mut rows: Vec<Skill> = self.fetch(&self.skills_table, &query).await?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.swap_remove(0))
        })
    }

    // -----------------------------------------------------------------------
    // Lesson operations
    // -----------------------------------------------------------------------

    /// Whether at least one lesson row references `skill_id`.
    pub async fn lesson_exists(&self, skill_id: &str) -> Result<bool> {
        let query = Query::new().eq("skill_id", skill_id).select("id");
        let rows: Vec<serde_json::Value> = self.fetch(&self.lessons_table, &query).await?;
        Ok(!rows.is_empty())
    }

    /// Insert a freshly generated lesson.
    pub async fn insert_lesson(&self, record: &LessonRecord) -> Result<()> {
        self.create(&self.lessons_table, record).await
    }

    /// Insert or replace the lesson for `record.skill_id`.
    pub async fn upsert_lesson(&self, record: &LessonRecord) -> Result<()> {
        self.upsert(&self.lessons_table, record, "skill_id").await
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn collection_url(&self, collection: &str, query: &Query) -> Result<Url> {
        let raw = format!("{}/rest/v1/{collection}", self.base);
        let mut url = Url::parse(&raw)
            .map_err(|e| LessonGenError::validation(format!("invalid store URL {raw}: {e}")))?;
        query.apply(&mut url);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
    }
}

/// Turn a non-2xx response into a `Network` error carrying a body excerpt.
async fn check_status(url: &Url, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let excerpt: String = body.chars().take(ERROR_BODY_LIMIT).collect();
    Err(LessonGenError::Network(if excerpt.is_empty() {
        format!("{url}: HTTP {status}")
    } else {
        format!("{url}: HTTP {status}: {excerpt}")
    }))
}
