// HTTP-level tests for the model client against a mock server.

use std::path::Path;
use std::time::Duration;

use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::json;
use tokio::sync::mpsc;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use farmai_core::diagnosis::{DiagnosisSheet, Level};
use farmai_core::farm::Farm;
use farmai_core::interview::InterviewLog;
use farmai_core::report::{FallbackReason, ReportSource};
use farmai_core::wizard::FarmRecords;
use farmai_llm::prompt::ReportContext;
use farmai_llm::questions::suggest_questions;
use farmai_llm::report::{draft_final_report, generate_report};
use farmai_llm::{ChatClient, ChatSettings, LlmClient, LlmError, LlmEvent};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn client(server: &MockServer) -> LlmClient {
    LlmClient::Active(ChatClient::new(ChatSettings {
        base_url: format!("{}/v1", server.uri()),
        api_key: "sk-test".into(),
        model: "gpt-test".into(),
        temperature: 0.7,
        timeout: Duration::from_secs(5),
        transcription_model: "whisper-1".into(),
        transcription_language: "ko".into(),
    }))
}

fn context() -> ReportContext {
    let at = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
    ReportContext {
        farm: Farm {
            farm_id: "f1".into(),
            name: "Sunrise Berries".into(),
            location: "Nonsan".into(),
            owner_name: "Kim".into(),
            size: Some(1650.0),
            crop: Some("Strawberry".into()),
            created_at: at,
            updated_at: at,
        },
        manual: "Keep EC below 1.8.".into(),
        previous_reports: "No previous consulting records.".into(),
        interview: InterviewLog::default(),
        records: FarmRecords::default(),
        diagnosis: None,
        consulting_date: NaiveDate::from_ymd_opt(2025, 3, 2).unwrap(),
        consultant: "Lee".into(),
        time_slot: "10:00-12:00".into(),
    }
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
    })
}

async fn mount_completion(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(response)
        .mount(server)
        .await;
}

// ---------------------------------------------------------------------------
// Report synthesis
// ---------------------------------------------------------------------------

#[tokio::test]
async fn report_parsed_from_wrapped_json() {
    let server = MockServer::start().await;
    let content = "Here is the report:\n```json\n{\"consultingInfo\": {\"target\": \"Sunrise Berries\"}, \
                   \"diagnosis\": {\"overallScore\": \"68\", \"overallStatus\": \"Good\"}}\n```";
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"model": "gpt-test", "max_tokens": 3000})))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(content)))
        .expect(1)
        .mount(&server)
        .await;

    let generated = generate_report(&client(&server), &context(), 3000).await;

    assert_eq!(
        generated.source,
        ReportSource::Generated {
            model: "gpt-test".into()
        }
    );
    assert_eq!(generated.report.consulting_info.target, "Sunrise Berries");
    assert_eq!(generated.report.diagnosis.overall_score, 68.0);
    assert!(generated.report.solutions.recommendations.is_empty());
}

#[tokio::test]
async fn server_error_yields_placeholder() {
    let server = MockServer::start().await;
    mount_completion(
        &server,
        ResponseTemplate::new(500).set_body_json(json!({"error": {"message": "overloaded"}})),
    )
    .await;

    let mut ctx = context();
    let mut sheet = DiagnosisSheet::default();
    sheet.set_level("light", Level::new(5).unwrap()).unwrap();
    ctx.diagnosis = Some(sheet);

    let generated = generate_report(&client(&server), &ctx, 3000).await;

    match &generated.source {
        ReportSource::Fallback {
            reason: FallbackReason::Request(msg),
        } => assert!(msg.contains("500") && msg.contains("overloaded"), "{msg}"),
        other => panic!("expected request fallback, got {other:?}"),
    }
    assert_eq!(generated.report.consulting_info.target, "Sunrise Berries");
    assert!(generated.report.diagnosis.overall_score > 0.0);
}

#[tokio::test]
async fn unparsable_text_yields_placeholder() {
    let server = MockServer::start().await;
    mount_completion(
        &server,
        ResponseTemplate::new(200).set_body_json(completion("I cannot produce JSON today.")),
    )
    .await;

    let generated = generate_report(&client(&server), &context(), 3000).await;
    assert!(matches!(
        generated.source,
        ReportSource::Fallback {
            reason: FallbackReason::Unparsable(_)
        }
    ));
    assert_eq!(generated.report.diagnosis.overall_status, "Not assessed");
}

#[tokio::test]
async fn missing_choices_is_empty_response() {
    let server = MockServer::start().await;
    mount_completion(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({"choices": []})),
    )
    .await;

    let generated = generate_report(&client(&server), &context(), 3000).await;
    assert_eq!(
        generated.source,
        ReportSource::Fallback {
            reason: FallbackReason::EmptyResponse
        }
    );
}

#[tokio::test]
async fn disabled_client_yields_placeholder() {
    let generated = generate_report(&LlmClient::Disabled, &context(), 3000).await;
    assert_eq!(
        generated.source,
        ReportSource::Fallback {
            reason: FallbackReason::NoApiKey
        }
    );
    assert_eq!(generated.report.consulting_info.consultant, "Lee");
}

// ---------------------------------------------------------------------------
// Questions and final report
// ---------------------------------------------------------------------------

#[tokio::test]
async fn questions_from_model() {
    let server = MockServer::start().await;
    mount_completion(
        &server,
        ResponseTemplate::new(200).set_body_json(completion(
            r#"[{"question": "When did flowering start?", "reason": "Growth stage"}, {"question": "How often do you vent?"}]"#,
        )),
    )
    .await;

    let suggestions = suggest_questions(&client(&server), &context(), 800).await;
    assert_eq!(suggestions.fallback, None);
    assert_eq!(suggestions.questions.len(), 2);
    assert_eq!(suggestions.questions[1].id, "rec2");
    assert_eq!(suggestions.questions[1].reason, "Data-driven recommendation");
}

#[tokio::test]
async fn questions_fall_back_on_error() {
    let server = MockServer::start().await;
    mount_completion(&server, ResponseTemplate::new(429)).await;

    let suggestions = suggest_questions(&client(&server), &context(), 800).await;
    assert!(matches!(suggestions.fallback, Some(FallbackReason::Request(_))));
    assert_eq!(suggestions.questions.len(), 3);
}

#[tokio::test]
async fn final_report_draft_and_failure() {
    let server = MockServer::start().await;
    mount_completion(
        &server,
        ResponseTemplate::new(200).set_body_json(completion(
            r#"{"overallSummary": "Yield improved", "nextSteps": "Expand the second house"}"#,
        )),
    )
    .await;
    let ctx = context();

    let draft = draft_final_report(&client(&server), &ctx.farm, &[], 2000)
        .await
        .unwrap();
    assert_eq!(draft.overall_summary, "Yield improved");
    assert_eq!(draft.next_steps, "Expand the second house");

    let err = draft_final_report(&LlmClient::Disabled, &ctx.farm, &[], 2000)
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::Disabled));
}

// ---------------------------------------------------------------------------
// Streaming
// ---------------------------------------------------------------------------

fn sse(chunks: &[&str]) -> String {
    let mut body = String::new();
    for chunk in chunks {
        let data = json!({"choices": [{"index": 0, "delta": {"content": chunk}}]});
        body.push_str(&format!("data: {data}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

#[tokio::test]
async fn stream_emits_tokens_then_complete() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse(&["Ventilate ", "at noon."]), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let (tx, mut rx) = mpsc::channel(16);
    client(&server)
        .stream_chat("system", "How do I lower humidity?", 500, tx, 7)
        .await;

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    assert_eq!(
        events,
        vec![
            LlmEvent::Token {
                text: "Ventilate ".into(),
                generation: 7
            },
            LlmEvent::Token {
                text: "at noon.".into(),
                generation: 7
            },
            LlmEvent::Complete {
                full_text: "Ventilate at noon.".into(),
                generation: 7
            },
        ]
    );
}

#[tokio::test]
async fn stream_http_error_is_error_event() {
    let server = MockServer::start().await;
    mount_completion(&server, ResponseTemplate::new(401)).await;

    let (tx, mut rx) = mpsc::channel(16);
    client(&server).stream_chat("s", "u", 100, tx, 2).await;

    match rx.recv().await {
        Some(LlmEvent::Error { message, generation }) => {
            assert_eq!(generation, 2);
            assert!(message.contains("401"), "{message}");
        }
        other => panic!("expected error event, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Transcription
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transcription_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/audio/transcriptions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": "Leaves are yellowing"})))
        .mount(&server)
        .await;

    let LlmClient::Active(chat) = client(&server) else {
        unreachable!()
    };
    let result = chat
        .transcribe_bytes(b"RIFF....WAVE".to_vec(), "answer.wav")
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.text, "Leaves are yellowing");
    assert_eq!(result.error, None);

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("filename=\"answer.wav\""));
    assert!(body.contains("whisper-1"));
    assert!(body.contains("name=\"language\""));
}

#[tokio::test]
async fn transcription_rejection_is_reported_inline() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/audio/transcriptions"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let LlmClient::Active(chat) = client(&server) else {
        unreachable!()
    };
    let result = chat.transcribe_bytes(vec![0u8; 16], "a.wav").await.unwrap();
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("400 Bad Request"));
}

#[tokio::test]
async fn missing_audio_file_is_error() {
    let server = MockServer::start().await;
    let err = client(&server)
        .transcribe_file(Path::new("/nonexistent/farmai/answer.wav"))
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::Audio { .. }));

    let err = LlmClient::Disabled
        .transcribe_file(Path::new("answer.wav"))
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::Disabled));
}
