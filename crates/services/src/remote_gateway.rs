use std::collections::BTreeMap;
use std::env;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};

use course_core::model::{CompletedSections, CourseId, QuizAnswers, QuizId, SectionId};

use crate::error::GatewayError;

//
// ─── CONFIG ────────────────────────────────────────────────────────────────────
//

#[derive(Clone, Debug)]
pub struct RemoteConfig {
    pub base_url: String,
    pub auth_token: Option<String>,
}

impl RemoteConfig {
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("COURSE_API_BASE_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        let auth_token = env::var("COURSE_API_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());
        Some(Self {
            base_url,
            auth_token,
        })
    }
}

//
// ─── GATEWAY CONTRACT ──────────────────────────────────────────────────────────
//

/// Acknowledgement for a remote mark-complete write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkCompleteAck {
    pub message: Option<String>,
    pub progress_percentage: Option<f64>,
}

/// Acknowledgement for a remote quiz submission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuizAck {
    pub score: Option<u8>,
    pub passed: Option<bool>,
    pub passing_score: Option<u8>,
}

/// Acknowledgement for a remote notes write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotesAck {
    pub message: Option<String>,
}

/// Best-effort remote I/O for progress. Never the sole source of truth:
/// every caller must be prepared for any of these to fail and fall back to
/// the local store.
#[async_trait]
pub trait ProgressGateway: Send + Sync {
    /// Reads the remote completion state, normalized to the canonical
    /// sparse map.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` when unconfigured, on transport failure, or
    /// when the response cannot be parsed.
    async fn fetch_progress(&self, course: CourseId) -> Result<CompletedSections, GatewayError>;

    /// Records a section completion remotely.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` when unconfigured, on transport failure, or
    /// when the remote reports `success: false`.
    async fn mark_complete(
        &self,
        course: CourseId,
        section: SectionId,
    ) -> Result<MarkCompleteAck, GatewayError>;

    /// Posts a scored quiz submission remotely.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` when unconfigured, on transport failure, or
    /// when the remote reports `success: false`.
    async fn submit_quiz(
        &self,
        course: CourseId,
        quiz: QuizId,
        score: u8,
        answers: &QuizAnswers,
    ) -> Result<QuizAck, GatewayError>;

    /// Stores section notes remotely.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` when unconfigured, on transport failure, or
    /// when the remote reports `success: false`.
    async fn save_notes(
        &self,
        course: CourseId,
        section: SectionId,
        notes: &str,
    ) -> Result<NotesAck, GatewayError>;
}

//
// ─── RESPONSE SHAPES ───────────────────────────────────────────────────────────
//

/// The remote read endpoint has answered in several shapes over its history;
/// each tolerated shape is an explicit variant here.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProgressBody {
    Wrapped { results: Box<ProgressBody> },
    Sections { sections: Vec<SectionRef> },
    // Keys stay strings here: untagged deserialization buffers map keys as
    // strings, so numeric ids are parsed when normalizing.
    Map { progress: BTreeMap<String, bool> },
}

/// Section references arrive either as objects or as bare ids.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SectionRef {
    Object { id: SectionId },
    Bare(SectionId),
}

impl SectionRef {
    fn id(&self) -> SectionId {
        match self {
            SectionRef::Object { id } | SectionRef::Bare(id) => *id,
        }
    }
}

impl ProgressBody {
    fn into_completed(self) -> CompletedSections {
        match self {
            ProgressBody::Wrapped { results } => results.into_completed(),
            ProgressBody::Sections { sections } => sections
                .into_iter()
                .map(|section| (section.id(), true))
                .collect(),
            ProgressBody::Map { progress } => progress
                .into_iter()
                .filter_map(|(id, done)| id.parse::<SectionId>().ok().map(|id| (id, done)))
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WriteResponse {
    success: Option<bool>,
    message: Option<String>,
    progress_percentage: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct QuizResponse {
    success: Option<bool>,
    score: Option<u8>,
    passed: Option<bool>,
    passing_score: Option<u8>,
}

/// An absent `success` field counts as acceptance; only an explicit
/// `success: false` is a rejection.
fn accepted(success: Option<bool>) -> bool {
    success != Some(false)
}

#[derive(Debug, Serialize)]
struct QuizSubmission<'a> {
    score: u8,
    answers: &'a QuizAnswers,
}

#[derive(Debug, Serialize)]
struct NotesPayload<'a> {
    notes: &'a str,
}

//
// ─── HTTP GATEWAY ──────────────────────────────────────────────────────────────
//

/// `reqwest`-backed gateway. Unconfigured instances fail every call with
/// `GatewayError::Disabled`, which the reconciliation layer treats like any
/// other remote failure.
#[derive(Clone)]
pub struct RemoteProgressGateway {
    client: Client,
    config: Option<RemoteConfig>,
}

impl RemoteProgressGateway {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(RemoteConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<RemoteConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    fn config(&self) -> Result<&RemoteConfig, GatewayError> {
        self.config.as_ref().ok_or(GatewayError::Disabled)
    }

    fn endpoint(config: &RemoteConfig, path: &str) -> String {
        format!("{}/{path}", config.base_url.trim_end_matches('/'))
    }

    fn authed(builder: RequestBuilder, config: &RemoteConfig) -> RequestBuilder {
        match &config.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[async_trait]
impl ProgressGateway for RemoteProgressGateway {
    async fn fetch_progress(&self, course: CourseId) -> Result<CompletedSections, GatewayError> {
        let config = self.config()?;
        let url = Self::endpoint(config, &format!("courses/{course}/progress/"));

        let response = Self::authed(self.client.get(url), config).send().await?;
        if !response.status().is_success() {
            return Err(GatewayError::HttpStatus(response.status()));
        }

        let body: ProgressBody = response.json().await?;
        Ok(body.into_completed())
    }

    async fn mark_complete(
        &self,
        course: CourseId,
        section: SectionId,
    ) -> Result<MarkCompleteAck, GatewayError> {
        let config = self.config()?;
        let url = Self::endpoint(
            config,
            &format!("courses/{course}/sections/{section}/complete/"),
        );

        let response = Self::authed(self.client.post(url), config).send().await?;
        if !response.status().is_success() {
            return Err(GatewayError::HttpStatus(response.status()));
        }

        let body: WriteResponse = response.json().await?;
        if !accepted(body.success) {
            return Err(GatewayError::Rejected);
        }
        Ok(MarkCompleteAck {
            message: body.message,
            progress_percentage: body.progress_percentage,
        })
    }

    async fn submit_quiz(
        &self,
        course: CourseId,
        quiz: QuizId,
        score: u8,
        answers: &QuizAnswers,
    ) -> Result<QuizAck, GatewayError> {
        let config = self.config()?;
        let url = Self::endpoint(config, &format!("courses/{course}/quizzes/{quiz}/submit/"));
        let payload = QuizSubmission { score, answers };

        let response = Self::authed(self.client.post(url), config)
            .json(&payload)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(GatewayError::HttpStatus(response.status()));
        }

        let body: QuizResponse = response.json().await?;
        if !accepted(body.success) {
            return Err(GatewayError::Rejected);
        }
        Ok(QuizAck {
            score: body.score,
            passed: body.passed,
            passing_score: body.passing_score,
        })
    }

    async fn save_notes(
        &self,
        course: CourseId,
        section: SectionId,
        notes: &str,
    ) -> Result<NotesAck, GatewayError> {
        let config = self.config()?;
        let url = Self::endpoint(
            config,
            &format!("courses/{course}/sections/{section}/notes/"),
        );
        let payload = NotesPayload { notes };

        let response = Self::authed(self.client.post(url), config)
            .json(&payload)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(GatewayError::HttpStatus(response.status()));
        }

        let body: WriteResponse = response.json().await?;
        if !accepted(body.success) {
            return Err(GatewayError::Rejected);
        }
        Ok(NotesAck {
            message: body.message,
        })
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(json: &str) -> CompletedSections {
        serde_json::from_str::<ProgressBody>(json)
            .unwrap()
            .into_completed()
    }

    #[test]
    fn normalizes_section_object_list() {
        let map = normalize(r#"{"sections": [{"id": 1}, {"id": 3}]}"#);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&SectionId::new(1)), Some(&true));
        assert_eq!(map.get(&SectionId::new(3)), Some(&true));
    }

    #[test]
    fn normalizes_bare_id_list() {
        let map = normalize(r#"{"sections": [4, 5]}"#);
        assert_eq!(map.get(&SectionId::new(4)), Some(&true));
        assert_eq!(map.get(&SectionId::new(5)), Some(&true));
    }

    #[test]
    fn passes_progress_map_through() {
        let map = normalize(r#"{"progress": {"7": true, "8": false}}"#);
        assert_eq!(map.get(&SectionId::new(7)), Some(&true));
        assert_eq!(map.get(&SectionId::new(8)), Some(&false));
    }

    #[test]
    fn unwraps_results_envelope() {
        let map = normalize(r#"{"results": {"sections": [{"id": 9}]}}"#);
        assert_eq!(map.get(&SectionId::new(9)), Some(&true));
    }

    #[test]
    fn unknown_shape_is_a_parse_error() {
        assert!(serde_json::from_str::<ProgressBody>(r#"{"done": [1]}"#).is_err());
    }

    #[test]
    fn only_explicit_false_is_a_rejection() {
        assert!(accepted(None));
        assert!(accepted(Some(true)));
        assert!(!accepted(Some(false)));
    }

    #[test]
    fn unconfigured_gateway_is_disabled() {
        let gateway = RemoteProgressGateway::new(None);
        assert!(!gateway.enabled());
    }

    #[test]
    fn quiz_submission_serializes_score_and_answers() {
        use course_core::model::QuestionId;

        let mut answers = QuizAnswers::new();
        answers.select(QuestionId::new(1), 2);
        let payload = QuizSubmission {
            score: 67,
            answers: &answers,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["score"], 67);
        assert_eq!(json["answers"]["1"], 2);
    }
}
