// Interview question/answer log and suggested questions.

use serde::{Deserialize, Serialize};

use crate::error::{require_text, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewEntry {
    pub question: String,
    pub answer: String,
}

/// Ordered interview entries for one farm.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterviewLog {
    entries: Vec<InterviewEntry>,
}

impl InterviewLog {
    pub fn new(entries: Vec<InterviewEntry>) -> Self {
        Self { entries }
    }

    /// Append an entry. The question must not be blank; the answer may be
    /// (a question can be recorded before it is answered).
    pub fn push(
        &mut self,
        question: impl Into<String>,
        answer: impl Into<String>,
    ) -> Result<(), ValidationError> {
        let question = question.into();
        require_text("question", &question)?;
        self.entries.push(InterviewEntry {
            question: question.trim().to_string(),
            answer: answer.into().trim().to_string(),
        });
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Option<InterviewEntry> {
        (index < self.entries.len()).then(|| self.entries.remove(index))
    }

    pub fn entries(&self) -> &[InterviewEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A question proposed by the model (or the canned fallback).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedQuestion {
    pub id: String,
    pub question: String,
    pub reason: String,
}
