pub mod backend;
pub mod controller;
pub mod generator;
pub mod session;

use std::fmt;

pub const OPTION_COUNT: usize = 4;

/// Topics offered in the selector. The list is closed: free text is never sent to the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Topic {
    #[default]
    MachineLearning,
    DataStructures,
    Python,
    GenerativeAi,
    ComputerVision,
    DeepLearning,
}

impl Topic {
    pub const ALL: [Topic; 6] = [
        Topic::MachineLearning,
        Topic::DataStructures,
        Topic::Python,
        Topic::GenerativeAi,
        Topic::ComputerVision,
        Topic::DeepLearning,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Topic::MachineLearning => "Machine Learning",
            Topic::DataStructures => "Data Structures",
            Topic::Python => "Python",
            Topic::GenerativeAi => "Generative AI",
            Topic::ComputerVision => "Computer Vision",
            Topic::DeepLearning => "Deep Learning",
        }
    }

    pub fn from_label(label: &str) -> Option<Topic> {
        Topic::ALL
            .into_iter()
            .find(|t| t.label().eq_ignore_ascii_case(label.trim()))
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Question {
    pub text: String,
    pub options: [String; OPTION_COUNT],
    pub correct_index: usize,
    pub selected_index: Option<usize>,
    pub answered: bool,
}

/// Outcome of submitting the active question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Correct,
    Incorrect { correct_option: String },
}

impl Question {
    /// Returns `None` when `correct_index` does not point at one of the options.
    pub fn new(text: String, options: [String; OPTION_COUNT], correct_index: usize) -> Option<Self> {
        if correct_index >= OPTION_COUNT {
            return None;
        }
        Some(Self {
            text,
            options,
            correct_index,
            selected_index: None,
            answered: false,
        })
    }

    pub fn correct_option(&self) -> &str {
        &self.options[self.correct_index]
    }

    /// Records the user's pick. Ignored once answered or when out of range.
    pub fn select(&mut self, index: usize) -> bool {
        if self.answered || index >= OPTION_COUNT {
            return false;
        }
        self.selected_index = Some(index);
        true
    }

    /// Finalizes the question. Returns `None` if it was already submitted.
    pub fn submit(&mut self) -> Option<Verdict> {
        if self.answered {
            return None;
        }
        self.answered = true;

        if self.selected_index == Some(self.correct_index) {
            Some(Verdict::Correct)
        } else {
            Some(Verdict::Incorrect {
                correct_option: self.correct_option().to_string(),
            })
        }
    }

    pub fn is_well_formed(&self) -> bool {
        self.correct_index < OPTION_COUNT
            && self.selected_index.map_or(true, |i| i < OPTION_COUNT)
    }
}

#[cfg(test)]
pub(crate) fn sample_question(text: &str, correct_index: usize) -> Question {
    Question::new(
        text.to_string(),
        ["a".into(), "b".into(), "c".into(), "d".into()],
        correct_index,
    )
    .unwrap()
}
