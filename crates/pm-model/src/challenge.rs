//! Security challenge model.
//!
//! A challenge is the ordered list of questions a user must answer before a
//! credential reset. Each question names the directory attribute holding the
//! expected answer; the answer itself is write-only.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::username::Username;

/// A single security question.
///
/// ## Security Note
///
/// The answer is held in a [`SecretString`]. It is skipped by serde and
/// redacted from `Debug` output, so it never reaches logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeQuestion {
    /// Prompt shown to the user.
    pub prompt: String,

    /// Directory attribute holding the expected answer.
    pub answer_attribute: String,

    #[serde(skip)]
    answer: Option<SecretString>,
}

impl ChallengeQuestion {
    /// Creates an unanswered question.
    #[must_use]
    pub fn new(prompt: impl Into<String>, answer_attribute: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            answer_attribute: answer_attribute.into(),
            answer: None,
        }
    }

    /// Returns a copy of this question carrying the given answer.
    #[must_use]
    pub fn with_answer(mut self, answer: impl Into<String>) -> Self {
        self.answer = Some(SecretString::from(answer.into()));
        self
    }

    /// Returns the answer, if one was supplied.
    #[must_use]
    pub fn answer(&self) -> Option<&SecretString> {
        self.answer.as_ref()
    }

    /// Returns true if a non-blank answer was supplied.
    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.answer
            .as_ref()
            .is_some_and(|a| !a.expose_secret().trim().is_empty())
    }
}

/// The ordered set of questions for one user.
///
/// Always holds at least one question and cannot be mutated in place;
/// [`SecurityChallenge::answer`] consumes the challenge and returns a new one.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityChallenge {
    username: Username,
    questions: Vec<ChallengeQuestion>,
}

impl SecurityChallenge {
    /// Creates a challenge.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::EmptyChallenge`] if `questions` is empty.
    pub fn new(username: Username, questions: Vec<ChallengeQuestion>) -> ModelResult<Self> {
        if questions.is_empty() {
            return Err(ModelError::EmptyChallenge);
        }
        Ok(Self { username, questions })
    }

    /// The user this challenge belongs to.
    #[must_use]
    pub const fn username(&self) -> &Username {
        &self.username
    }

    /// The questions, in presentation order.
    #[must_use]
    pub fn questions(&self) -> &[ChallengeQuestion] {
        &self.questions
    }

    /// Number of questions (never zero).
    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Always false; present for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Finds the question backed by the given answer attribute.
    #[must_use]
    pub fn question(&self, answer_attribute: &str) -> Option<&ChallengeQuestion> {
        self.questions
            .iter()
            .find(|q| q.answer_attribute == answer_attribute)
    }

    /// Supplies the answer for the question backed by `answer_attribute`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownQuestion`] if no question uses that attribute.
    pub fn answer(
        mut self,
        answer_attribute: &str,
        answer: impl Into<String>,
    ) -> ModelResult<Self> {
        let index = self
            .questions
            .iter()
            .position(|q| q.answer_attribute == answer_attribute)
            .ok_or_else(|| ModelError::UnknownQuestion(answer_attribute.to_string()))?;

        let question = self.questions.remove(index).with_answer(answer);
        self.questions.insert(index, question);
        Ok(self)
    }

    /// Returns true if every question has a non-blank answer.
    #[must_use]
    pub fn is_fully_answered(&self) -> bool {
        self.questions.iter().all(ChallengeQuestion::is_answered)
    }
}
