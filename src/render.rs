//! Telegram rendering of a [`ChatSession`] and parsing of button presses back into actions.

use teloxide::types::{KeyboardButton, KeyboardMarkup};
use teloxide::utils::html::escape;

use crate::quiz::controller::Action;
use crate::quiz::session::{ChatSession, SessionState};
use crate::quiz::{Question, Topic, OPTION_COUNT};

pub const START_BUTTON: &str = "🧠 Start Interview";
pub const SUBMIT_BUTTON: &str = "✅ Submit Answer";
pub const RESET_BUTTON: &str = "🔄 Reset App";

pub const GREETING_TEXT: &str = "🎓 Interview Preparation Chatbot\n\nPick a topic, press start and answer multiple-choice questions. Every correct answer is worth +10 points, every wrong one costs 10.";

const OPTION_LETTERS: [char; OPTION_COUNT] = ['A', 'B', 'C', 'D'];

fn option_button(index: usize, option: &str) -> String {
    format!("{}) {}", OPTION_LETTERS[index], option)
}

/// Maps the text of a message back to the action it stands for.
pub fn parse_action(text: &str) -> Option<Action> {
    let text = text.trim();
    match text {
        START_BUTTON => return Some(Action::Start),
        SUBMIT_BUTTON => return Some(Action::Submit),
        RESET_BUTTON => return Some(Action::Reset),
        _ => {}
    }
    if let Some(topic) = Topic::from_label(text) {
        return Some(Action::SelectTopic(topic));
    }

    // "B) some option" from the keyboard, or just "b"
    let mut chars = text.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    let rest = chars.as_str();
    if !rest.is_empty() && !rest.starts_with(')') {
        return None;
    }
    OPTION_LETTERS
        .iter()
        .position(|l| *l == letter)
        .map(Action::Select)
}

pub fn score_panel(state: &SessionState) -> String {
    format!(
        "📊 Your Score\nQuestions: {}\nCorrect: {}\nIncorrect: {}\nPoints: {}",
        state.history.len(),
        state.correct_count,
        state.incorrect_count,
        state.score
    )
}

/// HTML body for the active question, marking the current pick.
pub fn question_text(question: &Question, topic: Topic) -> String {
    let options = question
        .options
        .iter()
        .enumerate()
        .map(|(i, option)| {
            let marker = if question.selected_index == Some(i) { "👉 " } else { "" };
            format!("{marker}<b>{})</b> {}", OPTION_LETTERS[i], escape(option))
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "<i>{}</i>\n\n❓ <b>{}</b>\n\n{}",
        escape(topic.label()),
        escape(&question.text),
        options
    )
}

pub fn idle_text(session: &ChatSession) -> String {
    format!(
        "Topic: <b>{}</b>\nChoose a topic or press start.\n\n{}",
        escape(session.topic.label()),
        escape(&score_panel(&session.state))
    )
}

pub fn topic_rows() -> Vec<Vec<KeyboardButton>> {
    Topic::ALL
        .chunks(2)
        .map(|pair| pair.iter().map(|t| KeyboardButton::new(t.label())).collect())
        .collect()
}

/// Buttons for the current state. Submit only shows up once an option is picked.
pub fn keyboard(session: &ChatSession) -> KeyboardMarkup {
    let mut rows: Vec<Vec<KeyboardButton>> = Vec::new();

    match &session.state.active {
        Some(question) if !question.answered => {
            for (i, option) in question.options.iter().enumerate() {
                rows.push(vec![KeyboardButton::new(option_button(i, option))]);
            }
            if question.selected_index.is_some() {
                rows.push(vec![KeyboardButton::new(SUBMIT_BUTTON)]);
            }
        }
        _ => {
            rows.push(vec![KeyboardButton::new(START_BUTTON)]);
            rows.extend(topic_rows());
        }
    }
    rows.push(vec![KeyboardButton::new(RESET_BUTTON)]);

    KeyboardMarkup::new(rows)
}
