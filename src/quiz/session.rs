use std::collections::BTreeSet;
use std::fmt::Display;

use super::{Question, Topic, Verdict};

pub const POINTS_PER_QUESTION: i64 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PendingAction {
    #[default]
    None,
    RequestNew,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SessionState {
    pub history: Vec<Question>,
    pub active: Option<Question>,
    pub score: i64,
    pub correct_count: usize,
    pub incorrect_count: usize,
    pub pending_action: PendingAction,
}

impl SessionState {
    pub fn excluded_texts(&self) -> BTreeSet<String> {
        self.history.iter().map(|q| q.text.clone()).collect()
    }

    /// Books a finalized question into the history and the score.
    pub fn record(&mut self, question: Question, verdict: &Verdict) {
        match verdict {
            Verdict::Correct => {
                self.score += POINTS_PER_QUESTION;
                self.correct_count += 1;
            }
            Verdict::Incorrect { .. } => {
                self.score -= POINTS_PER_QUESTION;
                self.incorrect_count += 1;
            }
        }
        self.history.push(question);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_consistent(&self) -> bool {
        let answered = self.history.len();
        let expected_score = POINTS_PER_QUESTION * self.correct_count as i64
            - POINTS_PER_QUESTION * self.incorrect_count as i64;

        self.correct_count + self.incorrect_count == answered
            && self.score == expected_score
            && self.history.iter().all(|q| q.answered && q.is_well_formed())
            && self.active.as_ref().map_or(true, Question::is_well_formed)
    }
}

/// Everything kept per chat between interactions.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChatSession {
    pub topic: Topic,
    pub state: SessionState,
}

impl ChatSession {
    /// Rebuilds the session from whatever the store returned.
    ///
    /// Unreadable values are dropped in favour of a fresh session. An inconsistent state
    /// is re-initialized but the chosen topic is kept.
    pub fn restore<E: Display>(stored: Result<Option<ChatSession>, E>) -> ChatSession {
        match stored {
            Ok(Some(session)) if session.state.is_consistent() => session,
            Ok(Some(session)) => {
                log::warn!("Stored session violates its invariants, starting over");
                ChatSession {
                    topic: session.topic,
                    state: SessionState::default(),
                }
            }
            Ok(None) => ChatSession::default(),
            Err(err) => {
                log::warn!("Stored session is unreadable ({err}), starting over");
                ChatSession::default()
            }
        }
    }
}
