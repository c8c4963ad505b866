// Interview question suggestion.

use serde_json::Value;
use tracing::{info, warn};

use farmai_core::interview::SuggestedQuestion;
use farmai_core::report::FallbackReason;

use crate::client::{LlmClient, LlmError};
use crate::extract::json_array_span;
use crate::prompt::{self, ReportContext};

/// Suggested questions, and why the canned set was used if it was.
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestions {
    pub questions: Vec<SuggestedQuestion>,
    pub fallback: Option<FallbackReason>,
}

/// Ask the model for interview questions. Never fails: any problem yields
/// [`fallback_questions`].
pub async fn suggest_questions(
    client: &LlmClient,
    ctx: &ReportContext,
    max_tokens: u32,
) -> Suggestions {
    let system = prompt::question_system_prompt();
    let user = prompt::build_question_prompt(ctx);

    let outcome = match client.complete(&system, &user, max_tokens).await {
        Ok(text) => parse_questions(&text),
        Err(LlmError::Disabled) => Err(FallbackReason::NoApiKey),
        Err(LlmError::EmptyResponse) => Err(FallbackReason::EmptyResponse),
        Err(e) => Err(FallbackReason::Request(e.to_string())),
    };

    match outcome {
        Ok(questions) => {
            info!(farm_id = %ctx.farm.farm_id, count = questions.len(), "questions suggested");
            Suggestions {
                questions,
                fallback: None,
            }
        }
        Err(reason) => {
            warn!(farm_id = %ctx.farm.farm_id, %reason, "using default interview questions");
            Suggestions {
                questions: fallback_questions(),
                fallback: Some(reason),
            }
        }
    }
}

/// Parse the outermost `[...]` span into questions with `rec{n}` ids.
pub fn parse_questions(text: &str) -> Result<Vec<SuggestedQuestion>, FallbackReason> {
    let json = json_array_span(text)
        .ok_or_else(|| FallbackReason::Unparsable("no JSON array in response".to_string()))?;
    let items: Vec<Value> =
        serde_json::from_str(json).map_err(|e| FallbackReason::Unparsable(e.to_string()))?;
    if items.is_empty() {
        return Err(FallbackReason::Unparsable("empty question list".to_string()));
    }

    Ok(items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            let question = text_field(&item, "question")
                .unwrap_or_else(|| format!("Question {}", i + 1));
            let reason = text_field(&item, "reason")
                .unwrap_or_else(|| "Data-driven recommendation".to_string());
            SuggestedQuestion {
                id: format!("rec{}", i + 1),
                question,
                reason,
            }
        })
        .collect())
}

/// A non-blank string field of a question object. Other types count as missing.
fn text_field(item: &Value, key: &str) -> Option<String> {
    item.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

pub fn fallback_questions() -> Vec<SuggestedQuestion> {
    [
        (
            "What concerns you most about the crop's growth right now?",
            "Based on growth data",
        ),
        (
            "What is hardest about managing irrigation?",
            "Based on irrigation data",
        ),
        (
            "What would you like to know about pest and disease control?",
            "Based on pest data",
        ),
    ]
    .into_iter()
    .enumerate()
    .map(|(i, (question, reason))| SuggestedQuestion {
        id: format!("rec{}", i + 1),
        question: question.to_string(),
        reason: reason.to_string(),
    })
    .collect()
}
