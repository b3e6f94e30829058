//! Judge oracle: the external model that grades answers and produces lesson
//! content.
//!
//! The trait boundary keeps the engine testable without a live model. The
//! production implementation talks to a local Ollama server over HTTP.
//! Transport failures surface as [`OracleError`]; replies that arrive but
//! cannot be parsed are recovered into safe defaults instead, so a lesson
//! never stalls on a malformed model reply.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::OracleError;

//
// ─── FALLBACKS ─────────────────────────────────────────────────────────────────
//

/// Feedback shown when the oracle's reply carries no usable feedback text.
pub const FALLBACK_FEEDBACK: &str = "Thanks! Here is a short explanation and a hint.";

/// Follow-up question used when the oracle's reply carries none.
pub const FALLBACK_NEXT_QUESTION: &str = "Try 4 + 3 = ?";

/// Question used when the oracle cannot produce a diagnostic question.
pub const FALLBACK_DIAGNOSTIC_QUESTION: &str = "What is 2 + 3?";

//
// ─── VERDICTS ──────────────────────────────────────────────────────────────────
//

/// A judged answer: correctness, feedback for the learner, and the next
/// question to ask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JudgeVerdict {
    pub correct: bool,
    pub feedback: String,
    pub next_question: String,
}

/// Outcome of parsing a raw oracle reply into a verdict.
///
/// `Recovered` means the reply was degraded (not JSON, or missing fields) and
/// one or more fields were filled from fallbacks. Callers that care can log
/// the recovery; most just take the verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerdictParse {
    Parsed(JudgeVerdict),
    Recovered(JudgeVerdict),
}

impl VerdictParse {
    #[must_use]
    pub fn verdict(self) -> JudgeVerdict {
        match self {
            VerdictParse::Parsed(v) | VerdictParse::Recovered(v) => v,
        }
    }

    #[must_use]
    pub fn is_recovered(&self) -> bool {
        matches!(self, VerdictParse::Recovered(_))
    }
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    correct: Option<bool>,
    feedback: Option<String>,
    next_question: Option<String>,
}

/// Strips a Markdown code fence if the reply is wrapped in one.
///
/// Models often wrap JSON in ```json ... ``` despite being told not to.
fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// Parses a raw oracle reply into a verdict, degrading field by field.
///
/// A reply that is not JSON at all still yields a verdict: correctness falls
/// back to scanning the text for the word "correct", and the feedback and
/// next question fall back to canned strings.
#[must_use]
pub fn parse_verdict(raw: &str) -> VerdictParse {
    let body = strip_fences(raw);
    match serde_json::from_str::<RawVerdict>(body) {
        Ok(parsed) => {
            let mut recovered = false;
            let correct = parsed.correct.unwrap_or_else(|| {
                recovered = true;
                raw.to_lowercase().contains("correct")
            });
            let feedback = match parsed.feedback.filter(|f| !f.trim().is_empty()) {
                Some(f) => f,
                None => {
                    recovered = true;
                    FALLBACK_FEEDBACK.to_string()
                }
            };
            let next_question = match parsed.next_question.filter(|q| !q.trim().is_empty()) {
                Some(q) => q,
                None => {
                    recovered = true;
                    FALLBACK_NEXT_QUESTION.to_string()
                }
            };
            let verdict = JudgeVerdict {
                correct,
                feedback,
                next_question,
            };
            if recovered {
                VerdictParse::Recovered(verdict)
            } else {
                VerdictParse::Parsed(verdict)
            }
        }
        Err(_) => VerdictParse::Recovered(JudgeVerdict {
            correct: raw.to_lowercase().contains("correct"),
            feedback: FALLBACK_FEEDBACK.to_string(),
            next_question: FALLBACK_NEXT_QUESTION.to_string(),
        }),
    }
}

//
// ─── ORACLE CONTRACT ───────────────────────────────────────────────────────────
//

/// The judge oracle the engine consults for grading and content.
///
/// Implementations must not panic on bad model output; they degrade to
/// fallback verdicts and questions instead.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Judge the learner's answer to a question, returning correctness,
    /// feedback, and a follow-up question.
    ///
    /// # Errors
    ///
    /// Returns `OracleError` on transport failure only.
    async fn judge(
        &self,
        subject: &str,
        level: &str,
        lang: &str,
        question: &str,
        answer: &str,
    ) -> Result<VerdictParse, OracleError>;

    /// One diagnostic question for placement, for the given subject and
    /// question index.
    ///
    /// # Errors
    ///
    /// Returns `OracleError` on transport failure.
    async fn diagnostic_question(
        &self,
        subject: &str,
        lang: &str,
        index: usize,
    ) -> Result<String, OracleError>;

    /// A short lesson opener for a skill, ending in a question.
    ///
    /// # Errors
    ///
    /// Returns `OracleError` on transport failure.
    async fn lesson_turn(
        &self,
        subject: &str,
        level: &str,
        lang: &str,
        topic: &str,
        subtopic: &str,
    ) -> Result<String, OracleError>;

    /// One quick-fire quiz question on a skill, for the game mode.
    ///
    /// # Errors
    ///
    /// Returns `OracleError` on transport failure.
    async fn quiz_question(
        &self,
        subject: &str,
        level: &str,
        lang: &str,
        topic: &str,
        subtopic: &str,
    ) -> Result<String, OracleError>;
}

//
// ─── OLLAMA CLIENT ─────────────────────────────────────────────────────────────
//

/// Connection settings for the local Ollama server.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.1".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl OracleConfig {
    /// Reads `TUTOR_OLLAMA_URL`, `TUTOR_MODEL`, and `TUTOR_ORACLE_TIMEOUT_SECS`
    /// from the environment, falling back to defaults for anything unset or
    /// unparseable.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let base_url = std::env::var("TUTOR_OLLAMA_URL").unwrap_or(defaults.base_url);
        let model = std::env::var("TUTOR_MODEL").unwrap_or(defaults.model);
        let timeout = std::env::var("TUTOR_ORACLE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map_or(defaults.timeout, Duration::from_secs);
        Self {
            base_url,
            model,
            timeout,
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Judge oracle backed by a local Ollama server's `/api/generate` endpoint.
pub struct OllamaOracle {
    client: reqwest::Client,
    config: OracleConfig,
}

impl OllamaOracle {
    /// # Errors
    ///
    /// Returns `OracleError::Http` if the HTTP client cannot be built.
    pub fn new(config: OracleConfig) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    /// One non-streaming generate call; the raw reply text.
    async fn generate(&self, prompt: &str) -> Result<String, OracleError> {
        let url = format!("{}/api/generate", self.config.base_url.trim_end_matches('/'));
        let request = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
        };
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::Timeout
                } else {
                    OracleError::Http(e)
                }
            })?;
        if !response.status().is_success() {
            return Err(OracleError::HttpStatus(response.status()));
        }
        let body: GenerateResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                OracleError::Timeout
            } else {
                OracleError::Http(e)
            }
        })?;
        let text = body.response.trim().to_string();
        if text.is_empty() {
            return Err(OracleError::EmptyResponse);
        }
        Ok(text)
    }

    /// Generate, falling back to `fallback` on an empty reply so the lesson
    /// keeps moving.
    async fn generate_or(&self, prompt: &str, fallback: &str) -> Result<String, OracleError> {
        match self.generate(prompt).await {
            Ok(text) => Ok(text),
            Err(OracleError::EmptyResponse) => Ok(fallback.to_string()),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl Oracle for OllamaOracle {
    async fn judge(
        &self,
        subject: &str,
        level: &str,
        lang: &str,
        question: &str,
        answer: &str,
    ) -> Result<VerdictParse, OracleError> {
        let prompt = format!(
            "You are a kind tutor for children. Subject: {subject}. Level: {level}. \
             Reply in {lang}.\n\
             Question: {question}\n\
             Student answer: {answer}\n\
             Respond with strict JSON only, no code fences, with keys: \
             \"correct\" (boolean), \"feedback\" (one or two encouraging sentences), \
             \"next_question\" (one follow-up question at the same level)."
        );
        let raw = self.generate(&prompt).await?;
        Ok(parse_verdict(&raw))
    }

    async fn diagnostic_question(
        &self,
        subject: &str,
        lang: &str,
        index: usize,
    ) -> Result<String, OracleError> {
        let prompt = format!(
            "You are a kind tutor for children. Reply in {lang}.\n\
             Ask one short {subject} placement question (question {n} of 3, \
             slightly harder than the previous one). \
             Output only the question text.",
            n = index + 1
        );
        self.generate_or(&prompt, FALLBACK_DIAGNOSTIC_QUESTION).await
    }

    async fn lesson_turn(
        &self,
        subject: &str,
        level: &str,
        lang: &str,
        topic: &str,
        subtopic: &str,
    ) -> Result<String, OracleError> {
        let prompt = format!(
            "You are a kind tutor for children. Subject: {subject}. Level: {level}. \
             Reply in {lang}.\n\
             Teach the skill \"{topic}: {subtopic}\" in two or three simple \
             sentences, then end with exactly one practice question."
        );
        self.generate_or(&prompt, FALLBACK_NEXT_QUESTION).await
    }

    async fn quiz_question(
        &self,
        subject: &str,
        level: &str,
        lang: &str,
        topic: &str,
        subtopic: &str,
    ) -> Result<String, OracleError> {
        let prompt = format!(
            "You are a kind tutor for children. Subject: {subject}. Level: {level}. \
             Reply in {lang}.\n\
             Ask one very short quiz question about \"{topic}: {subtopic}\" with \
             a one-word or one-number answer. Output only the question text."
        );
        self.generate_or(&prompt, FALLBACK_DIAGNOSTIC_QUESTION).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_complete_verdict() {
        let raw = r#"{"correct": true, "feedback": "Nice work!", "next_question": "What is 5 + 2?"}"#;
        let parse = parse_verdict(raw);
        assert!(!parse.is_recovered());
        let verdict = parse.verdict();
        assert!(verdict.correct);
        assert_eq!(verdict.feedback, "Nice work!");
        assert_eq!(verdict.next_question, "What is 5 + 2?");
    }

    #[test]
    fn strips_code_fences_around_json() {
        let raw = "```json\n{\"correct\": false, \"feedback\": \"Almost!\", \"next_question\": \"Try 2 + 2 = ?\"}\n```";
        let parse = parse_verdict(raw);
        assert!(!parse.is_recovered());
        let verdict = parse.verdict();
        assert!(!verdict.correct);
        assert_eq!(verdict.feedback, "Almost!");
    }

    #[test]
    fn missing_fields_fall_back_and_mark_recovery() {
        let raw = r#"{"correct": true}"#;
        let parse = parse_verdict(raw);
        assert!(parse.is_recovered());
        let verdict = parse.verdict();
        assert!(verdict.correct);
        assert_eq!(verdict.feedback, FALLBACK_FEEDBACK);
        assert_eq!(verdict.next_question, FALLBACK_NEXT_QUESTION);
    }

    #[test]
    fn non_json_reply_scans_for_the_word_correct() {
        let parse = parse_verdict("That's correct, well done!");
        assert!(parse.is_recovered());
        assert!(parse.verdict().correct);

        let parse = parse_verdict("Not quite, the answer is 7.");
        assert!(parse.is_recovered());
        let verdict = parse.verdict();
        assert!(!verdict.correct);
        assert_eq!(verdict.feedback, FALLBACK_FEEDBACK);
        assert_eq!(verdict.next_question, FALLBACK_NEXT_QUESTION);
    }

    #[test]
    fn missing_correct_field_uses_text_scan() {
        let raw = r#"{"feedback": "Correct! Great job.", "next_question": "What is 6 + 1?"}"#;
        let parse = parse_verdict(raw);
        assert!(parse.is_recovered());
        let verdict = parse.verdict();
        assert!(verdict.correct);
        assert_eq!(verdict.feedback, "Correct! Great job.");
    }

    #[test]
    fn blank_feedback_counts_as_missing() {
        let raw = r#"{"correct": false, "feedback": "   ", "next_question": "Try 1 + 1 = ?"}"#;
        let parse = parse_verdict(raw);
        assert!(parse.is_recovered());
        assert_eq!(parse.verdict().feedback, FALLBACK_FEEDBACK);
    }

    #[test]
    fn config_defaults_are_local_ollama() {
        let config = OracleConfig::default();
        assert_eq!(config.base_url, "http://localhost:11434");
        assert_eq!(config.model, "llama3.1");
        assert_eq!(config.timeout, Duration::from_secs(60));
    }
}
