use std::collections::BTreeSet;
use std::sync::Arc;

use rand::seq::SliceRandom;

use super::backend::{BackendError, CompletionBackend, PromptMessage};
use super::{Question, OPTION_COUNT};

pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

const SYSTEM_PROMPT: &str = "You are a helpful MCQ bot that returns JSON only.";

/// Result of a generation call that reached the backend successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generation {
    Unique(Question),
    /// Every attempt was malformed or repeated a question from the history.
    NoUniqueQuestion,
}

/// Why a single reply was thrown away.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("reply is not a question payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("question text is empty")]
    EmptyQuestion,
    #[error("expected 4 options, got {0}")]
    WrongOptionCount(usize),
    #[error("correct_index {0} is out of range")]
    CorrectIndexOutOfRange(i64),
}

#[derive(serde::Deserialize)]
struct RawQuestion {
    question: String,
    options: Vec<String>,
    correct_index: i64,
}

pub struct QuestionGenerator {
    backend: Arc<dyn CompletionBackend>,
    max_attempts: usize,
    shuffle_options: bool,
}

impl QuestionGenerator {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            backend,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            shuffle_options: false,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_shuffled_options(mut self, shuffle_options: bool) -> Self {
        self.shuffle_options = shuffle_options;
        self
    }

    /// Asks the backend for one question on `topic` that is not in `excluded_texts`.
    ///
    /// Malformed and duplicate replies consume an attempt; a backend error aborts at once.
    pub async fn generate(
        &self,
        topic: &str,
        excluded_texts: &BTreeSet<String>,
    ) -> Result<Generation, BackendError> {
        let messages = build_prompt(topic, excluded_texts);

        for attempt in 1..=self.max_attempts {
            let reply = self.backend.complete(&messages).await?;

            let mut question = match parse_question(&reply) {
                Ok(question) => question,
                Err(err) => {
                    log::debug!("Attempt {attempt}: discarding reply, {err}");
                    continue;
                }
            };
            if excluded_texts.contains(&question.text) {
                log::debug!("Attempt {attempt}: duplicate question {:?}", question.text);
                continue;
            }

            if self.shuffle_options {
                shuffle_options(&mut question);
            }
            log::info!("Generated question on {topic}: {:?}", question.text);
            return Ok(Generation::Unique(question));
        }

        log::warn!(
            "No unique question on {topic} after {} attempts",
            self.max_attempts
        );
        Ok(Generation::NoUniqueQuestion)
    }
}

pub fn build_prompt(topic: &str, excluded_texts: &BTreeSet<String>) -> Vec<PromptMessage> {
    let past = serde_json::to_string(excluded_texts).unwrap_or_else(|_| "[]".to_string());
    let prompt = format!(
        "Generate a multiple-choice question about {topic}. \
        Return only JSON with keys: question (string), options ({OPTION_COUNT} strings), correct_index (0-based integer). \
        Make the question unique and different from this list:\n{past}"
    );

    vec![PromptMessage::system(SYSTEM_PROMPT), PromptMessage::user(prompt)]
}

/// Validates a model reply into an unanswered [`Question`].
pub fn parse_question(reply: &str) -> Result<Question, ParseError> {
    let raw: RawQuestion = serde_json::from_str(unfence(reply))?;

    let text = raw.question.trim().to_string();
    if text.is_empty() {
        return Err(ParseError::EmptyQuestion);
    }
    let count = raw.options.len();
    let options: [String; OPTION_COUNT] = raw
        .options
        .try_into()
        .map_err(|_| ParseError::WrongOptionCount(count))?;
    let correct_index = usize::try_from(raw.correct_index)
        .map_err(|_| ParseError::CorrectIndexOutOfRange(raw.correct_index))?;

    Question::new(text, options, correct_index)
        .ok_or(ParseError::CorrectIndexOutOfRange(raw.correct_index))
}

// Models like to wrap JSON in ```json fences even when told not to.
fn unfence(reply: &str) -> &str {
    let mut s = reply.trim();
    if let Some(rest) = s.strip_prefix("```") {
        s = match rest.find('\n') {
            Some(pos) => &rest[pos + 1..],
            None => rest,
        };
        s = s.trim_end().strip_suffix("```").unwrap_or(s);
    }
    s.trim()
}

fn shuffle_options(question: &mut Question) {
    let mut order: Vec<usize> = (0..OPTION_COUNT).collect();
    order.shuffle(&mut rand::thread_rng());

    let original = question.options.clone();
    for (slot, from) in order.iter().enumerate() {
        question.options[slot] = original[*from].clone();
    }
    if let Some(slot) = order.iter().position(|&from| from == question.correct_index) {
        question.correct_index = slot;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays canned replies in order, then keeps answering with `fallback`.
    pub(crate) struct ScriptedBackend {
        replies: Mutex<VecDeque<Result<String, BackendError>>>,
        fallback: String,
        calls: AtomicUsize,
    }

    impl ScriptedBackend {
        pub(crate) fn new(replies: Vec<Result<String, BackendError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                fallback: String::from("not json"),
                calls: AtomicUsize::new(0),
            })
        }

        pub(crate) fn repeating(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(VecDeque::new()),
                fallback: reply.to_string(),
                calls: AtomicUsize::new(0),
            })
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        async fn complete(&self, _messages: &[PromptMessage]) -> Result<String, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(self.fallback.clone()))
        }
    }

    pub(crate) fn payload(question: &str, correct_index: i64) -> String {
        serde_json::json!({
            "question": question,
            "options": ["a", "b", "c", "d"],
            "correct_index": correct_index,
        })
        .to_string()
    }

    fn excluded(texts: &[&str]) -> BTreeSet<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[tokio::test]
    async fn skips_a_duplicate_and_returns_the_next_question() {
        let backend = ScriptedBackend::new(vec![
            Ok(payload("What is overfitting?", 0)),
            Ok(payload("What is a learning rate?", 1)),
        ]);
        let generator = QuestionGenerator::new(backend.clone());

        let result = generator
            .generate("Machine Learning", &excluded(&["What is overfitting?"]))
            .await
            .unwrap();

        match result {
            Generation::Unique(q) => assert_eq!(q.text, "What is a learning rate?"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn gives_up_after_three_duplicates() {
        let backend = ScriptedBackend::repeating(&payload("What is overfitting?", 0));
        let generator = QuestionGenerator::new(backend.clone()).with_max_attempts(3);

        let result = generator
            .generate("Machine Learning", &excluded(&["What is overfitting?"]))
            .await
            .unwrap();

        assert_eq!(result, Generation::NoUniqueQuestion);
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test]
    async fn never_accepts_out_of_range_correct_index() {
        let backend = ScriptedBackend::new(vec![Ok(payload("Q", 5)), Ok(payload("Q", 2))]);
        let generator = QuestionGenerator::new(backend.clone());

        let result = generator.generate("Python", &BTreeSet::new()).await.unwrap();

        match result {
            Generation::Unique(q) => assert_eq!(q.correct_index, 2),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn malformed_replies_exhaust_into_no_unique_question() {
        let backend = ScriptedBackend::new(vec![
            Ok("Sure! Here is a question.".to_string()),
            Ok(r#"{"question": "Q", "options": ["a", "b"], "correct_index": 0}"#.to_string()),
            Ok(r#"{"question": "Q", "correct_index": 0}"#.to_string()),
        ]);
        let generator = QuestionGenerator::new(backend.clone());

        let result = generator.generate("Python", &BTreeSet::new()).await.unwrap();

        assert_eq!(result, Generation::NoUniqueQuestion);
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test]
    async fn backend_error_is_not_retried() {
        let backend = ScriptedBackend::new(vec![
            Err(BackendError::EmptyResponse),
            Ok(payload("Q", 0)),
        ]);
        let generator = QuestionGenerator::new(backend.clone());

        let result = generator.generate("Python", &BTreeSet::new()).await;

        assert!(matches!(result, Err(BackendError::EmptyResponse)));
        assert_eq!(backend.calls(), 1);
    }

    #[test]
    fn prompt_lists_past_questions() {
        let messages = build_prompt("Python", &excluded(&["What is a list?"]));
        assert_eq!(messages.len(), 2);
        assert!(messages[1].content.contains("about Python"));
        assert!(messages[1].content.contains(r#"["What is a list?"]"#));
    }

    #[test]
    fn parses_fenced_payload() {
        let reply = format!("```json\n{}\n```", payload("  What is a tuple?  ", 3));
        let q = parse_question(&reply).unwrap();
        assert_eq!(q.text, "What is a tuple?");
        assert_eq!(q.correct_index, 3);
        assert_eq!(q.selected_index, None);
        assert!(!q.answered);
    }

    #[test]
    fn rejects_structural_problems() {
        assert!(matches!(
            parse_question(&payload("   ", 0)),
            Err(ParseError::EmptyQuestion)
        ));
        assert!(matches!(
            parse_question(&payload("Q", -1)),
            Err(ParseError::CorrectIndexOutOfRange(-1))
        ));
        assert!(matches!(
            parse_question(r#"{"question": "Q", "options": ["a","b","c","d","e"], "correct_index": 0}"#),
            Err(ParseError::WrongOptionCount(5))
        ));
        assert!(matches!(
            parse_question("[1, 2, 3]"),
            Err(ParseError::InvalidJson(_))
        ));
    }

    #[test]
    fn shuffling_keeps_the_correct_option() {
        let mut q = parse_question(&payload("Q", 2)).unwrap();
        shuffle_options(&mut q);
        assert_eq!(q.correct_option(), "c");
        let mut sorted = q.options.to_vec();
        sorted.sort();
        assert_eq!(sorted, vec!["a", "b", "c", "d"]);
    }
}
