use super::generator::{Generation, QuestionGenerator};
use super::session::{ChatSession, PendingAction, SessionState};
use super::{Topic, Verdict};

/// A discrete user interaction coming from the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    SelectTopic(Topic),
    Select(usize),
    Submit,
    Reset,
}

/// Message for the user produced by a controller pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Warning(String),
    Error(String),
    Info(String),
}

impl Notice {
    pub fn text(&self) -> &str {
        match self {
            Notice::Success(text)
            | Notice::Warning(text)
            | Notice::Error(text)
            | Notice::Info(text) => text,
        }
    }
}

pub struct Controller {
    generator: QuestionGenerator,
}

impl Controller {
    pub fn new(generator: QuestionGenerator) -> Self {
        Self { generator }
    }

    /// One full interaction pass: apply the action, then fetch a question if one is due.
    pub async fn handle(&self, session: &mut ChatSession, action: Action) -> Vec<Notice> {
        let mut notices = Vec::new();
        let start_requested = apply(session, action, &mut notices);
        self.advance(session, start_requested, &mut notices).await;
        notices
    }

    /// Generates the next question when the user asked to start or a submit left a
    /// pending request. Makes at most one generator call.
    pub async fn advance(
        &self,
        session: &mut ChatSession,
        start_requested: bool,
        notices: &mut Vec<Notice>,
    ) {
        let state = &mut session.state;
        let due = start_requested || state.pending_action == PendingAction::RequestNew;
        if !due || state.active.is_some() {
            return;
        }

        let excluded = state.excluded_texts();
        match self.generator.generate(session.topic.label(), &excluded).await {
            Ok(Generation::Unique(question)) => state.active = Some(question),
            Ok(Generation::NoUniqueQuestion) => notices.push(Notice::Warning(
                "⚠️ Couldn't generate a unique question after several tries.".to_string(),
            )),
            Err(err) => {
                log::error!("Error fetching MCQ on {}: {err}", session.topic);
                notices.push(Notice::Error(format!("❌ Error fetching MCQ: {err}")));
            }
        }
        state.pending_action = PendingAction::None;
    }
}

/// Applies everything an action does short of calling the generator.
///
/// Returns `true` when the user explicitly asked for a question.
pub fn apply(session: &mut ChatSession, action: Action, notices: &mut Vec<Notice>) -> bool {
    match action {
        Action::Reset => {
            session.state.reset();
            notices.push(Notice::Info("🔄 Session reset.".to_string()));
        }
        Action::SelectTopic(topic) => {
            session.topic = topic;
            notices.push(Notice::Info(format!("Topic set to {topic}.")));
        }
        Action::Start => {
            if session.state.active.is_none() {
                return true;
            }
            notices.push(Notice::Info(
                "Answer the current question first.".to_string(),
            ));
        }
        Action::Select(index) => match session.state.active.as_mut() {
            Some(question) => {
                if !question.select(index) {
                    notices.push(Notice::Info("Pick one of the four options.".to_string()));
                }
            }
            None => notices.push(Notice::Info(
                "There is no question yet. Press start to get one.".to_string(),
            )),
        },
        Action::Submit => submit(&mut session.state, notices),
    }
    false
}

fn submit(state: &mut SessionState, notices: &mut Vec<Notice>) {
    let Some(question) = state.active.as_mut() else {
        notices.push(Notice::Info("There is nothing to submit.".to_string()));
        return;
    };
    let Some(verdict) = question.submit() else {
        return;
    };

    if let Some(question) = state.active.take() {
        state.record(question, &verdict);
    }
    state.pending_action = PendingAction::RequestNew;

    notices.push(match verdict {
        Verdict::Correct => Notice::Success("✅ Correct! +10 points".to_string()),
        Verdict::Incorrect { correct_option } => Notice::Error(format!(
            "❌ Incorrect. Correct answer: {correct_option} (-10 points)"
        )),
    });
}
