// End-to-end runs of the orchestrator loop against an in-memory store and a
// mock chat-completion server.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use farmai_app::app::{run, AppState};
use farmai_app::protocol::{NoticeLevel, ScreenData, UiUpdate, UserCommand};
use farmai_app::route::Route;
use farmai_core::config::{parse_config, Config};
use farmai_core::diagnosis::{DiagnosisSheet, Level};
use farmai_core::farm::NewFarm;
use farmai_core::report::{FallbackReason, ReportSource};
use farmai_core::store::{FarmStore, SqliteStore, StateStore};
use farmai_core::wizard::DataStep;
use farmai_llm::LlmClient;

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Running {
    cmd_tx: mpsc::Sender<UserCommand>,
    ui_rx: mpsc::Receiver<UiUpdate>,
    handle: JoinHandle<anyhow::Result<()>>,
    db: Arc<SqliteStore>,
    state: StateStore,
}

fn config(server: Option<&MockServer>) -> Config {
    let main = include_str!("../../../defaults/farmai.toml");
    match server {
        Some(server) => parse_config(
            &main.replace("https://api.openai.com/v1", &format!("{}/v1", server.uri())),
            Some("openai_api_key = \"sk-test\""),
            Path::new("/nonexistent/farmai"),
        )
        .unwrap(),
        None => parse_config(main, None, Path::new("/nonexistent/farmai")).unwrap(),
    }
}

fn start(config: Config, db: Arc<SqliteStore>, initial: Route) -> Running {
    let (cmd_tx, cmd_rx) = mpsc::channel(16);
    let (llm_tx, llm_rx) = mpsc::channel(64);
    let (task_tx, task_rx) = mpsc::channel(16);
    let (ui_tx, ui_rx) = mpsc::channel(256);

    let state = StateStore::new(Arc::clone(&db));
    let llm = Arc::new(LlmClient::from_config(&config));
    let app = AppState::new(config, db.clone(), state.clone(), llm, llm_tx, task_tx);
    let handle = tokio::spawn(run(cmd_rx, llm_rx, task_rx, ui_tx, app, initial));

    Running {
        cmd_tx,
        ui_rx,
        handle,
        db,
        state,
    }
}

/// Wait for the first update matching `pred`, skipping the rest.
async fn expect_update<F>(rx: &mut mpsc::Receiver<UiUpdate>, mut pred: F) -> UiUpdate
where
    F: FnMut(&UiUpdate) -> bool,
{
    let wait = async {
        loop {
            match rx.recv().await {
                Some(update) if pred(&update) => return update,
                Some(_) => continue,
                None => panic!("ui channel closed"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("timed out waiting for update")
}

async fn expect_screen(rx: &mut mpsc::Receiver<UiUpdate>, route: &Route) -> ScreenData {
    match expect_update(rx, |u| matches!(u, UiUpdate::Screen { route: r, .. } if r == route)).await {
        UiUpdate::Screen { data, .. } => *data,
        other => panic!("unexpected {other:?}"),
    }
}

fn sunrise() -> NewFarm {
    NewFarm {
        name: "Sunrise Berries".into(),
        location: "Nonsan".into(),
        owner_name: "Kim".into(),
        size: Some(1650.0),
        crop: Some("Strawberry".into()),
    }
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
    })
}

fn sse(chunks: &[&str]) -> String {
    let mut body = String::new();
    for chunk in chunks {
        let data = json!({"choices": [{"index": 0, "delta": {"content": chunk}}]});
        body.push_str(&format!("data: {data}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

// ---------------------------------------------------------------------------
// Flows
// ---------------------------------------------------------------------------

#[tokio::test]
async fn consulting_session_from_farm_to_report() {
    let server = MockServer::start().await;
    let report = json!({
        "consultingInfo": {"target": "Sunrise Berries"},
        "diagnosis": {"overallScore": 72, "overallStatus": "Good"}
    });
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"max_tokens": 3000})))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(&report.to_string())))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse(&["Open the vents ", "before noon."]), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let db = Arc::new(SqliteStore::open(":memory:").unwrap());
    let mut app = start(config(Some(&server)), db, Route::Home);

    match expect_screen(&mut app.ui_rx, &Route::Home).await {
        ScreenData::Home { backend, llm_model } => {
            assert_eq!(backend, "sqlite");
            assert_eq!(llm_model.as_deref(), Some("gpt-4o-mini"));
        }
        other => panic!("unexpected {other:?}"),
    }

    // Register a farm.
    app.cmd_tx.send(UserCommand::CreateFarm(sunrise())).await.unwrap();
    let farm_id = match expect_screen(&mut app.ui_rx, &Route::FarmList).await {
        ScreenData::FarmList { farms } => {
            assert_eq!(farms.len(), 1);
            farms[0].farm_id.clone()
        }
        other => panic!("unexpected {other:?}"),
    };

    // Start a session and walk into the wizard.
    app.cmd_tx
        .send(UserCommand::StartConsulting {
            farm_id: farm_id.clone(),
        })
        .await
        .unwrap();
    let environment = Route::Data {
        farm_id: farm_id.clone(),
        step: DataStep::Environment,
    };
    expect_screen(&mut app.ui_rx, &environment).await;

    app.cmd_tx
        .send(UserCommand::SaveStepData {
            farm_id: farm_id.clone(),
            step: DataStep::Environment,
            inputs: vec![("humidity".into(), "72".into())],
        })
        .await
        .unwrap();
    expect_screen(
        &mut app.ui_rx,
        &Route::Data {
            farm_id: farm_id.clone(),
            step: DataStep::Irrigation,
        },
    )
    .await;
    assert!(app
        .state
        .step_data(&farm_id, DataStep::Environment)
        .unwrap()
        .is_some());

    // Diagnosis, then one interview answer.
    let mut sheet = DiagnosisSheet::default();
    sheet.set_level("light", Level::new(4).unwrap()).unwrap();
    app.cmd_tx
        .send(UserCommand::SaveDiagnosis {
            farm_id: farm_id.clone(),
            sheet,
        })
        .await
        .unwrap();
    let interview = Route::Interview {
        farm_id: farm_id.clone(),
    };
    expect_screen(&mut app.ui_rx, &interview).await;

    app.cmd_tx
        .send(UserCommand::AddInterviewEntry {
            farm_id: farm_id.clone(),
            question: "When do you vent?".into(),
            answer: "Around 2pm.".into(),
        })
        .await
        .unwrap();
    match expect_screen(&mut app.ui_rx, &interview).await {
        ScreenData::Interview { log, .. } => assert_eq!(log.len(), 1),
        other => panic!("unexpected {other:?}"),
    }

    // The session report is generated on first visit and stored.
    let sessions = app.db.list_sessions(&farm_id).await.unwrap();
    assert_eq!(sessions.len(), 1);
    let report_route = Route::Report {
        farm_id: farm_id.clone(),
        session: Some(sessions[0].consulting_id.clone()),
    };
    app.cmd_tx
        .send(UserCommand::Navigate(report_route.clone()))
        .await
        .unwrap();
    match expect_screen(&mut app.ui_rx, &report_route).await {
        ScreenData::Report { report, session, .. } => {
            assert!(report.is_none());
            assert!(session.is_some());
        }
        other => panic!("unexpected {other:?}"),
    }
    match expect_update(&mut app.ui_rx, |u| matches!(u, UiUpdate::ReportReady(_))).await {
        UiUpdate::ReportReady(generated) => {
            assert_eq!(
                generated.source,
                ReportSource::Generated {
                    model: "gpt-4o-mini".into()
                }
            );
            assert_eq!(generated.report.consulting_info.target, "Sunrise Berries");
            assert_eq!(generated.report.diagnosis.overall_score, 72.0);
        }
        other => panic!("unexpected {other:?}"),
    }

    app.cmd_tx
        .send(UserCommand::Navigate(report_route.clone()))
        .await
        .unwrap();
    match expect_screen(&mut app.ui_rx, &report_route).await {
        ScreenData::Report { report, .. } => assert!(report.is_some()),
        other => panic!("unexpected {other:?}"),
    }

    // Free-form question, streamed.
    app.cmd_tx
        .send(UserCommand::Ask {
            farm_id: farm_id.clone(),
            question: "How do I lower humidity?".into(),
        })
        .await
        .unwrap();
    let mut answer = String::new();
    loop {
        match expect_update(&mut app.ui_rx, |u| {
            matches!(u, UiUpdate::AskToken(_) | UiUpdate::AskComplete | UiUpdate::AskError(_))
        })
        .await
        {
            UiUpdate::AskToken(text) => answer.push_str(&text),
            UiUpdate::AskComplete => break,
            other => panic!("unexpected {other:?}"),
        }
    }
    assert_eq!(answer, "Open the vents before noon.");

    app.cmd_tx.send(UserCommand::Quit).await.unwrap();
    app.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn report_without_api_key_is_a_stored_placeholder() {
    let db = Arc::new(SqliteStore::open(":memory:").unwrap());
    let farm = db.create_farm(sunrise()).await.unwrap();
    let route = Route::Report {
        farm_id: farm.farm_id.clone(),
        session: None,
    };
    let mut app = start(config(None), db, route.clone());

    expect_screen(&mut app.ui_rx, &route).await;
    match expect_update(&mut app.ui_rx, |u| matches!(u, UiUpdate::Notice(_))).await {
        UiUpdate::Notice(notice) => {
            assert_eq!(notice.level, NoticeLevel::Error);
            assert!(notice.message.contains("placeholder"), "{}", notice.message);
        }
        other => panic!("unexpected {other:?}"),
    }
    match expect_update(&mut app.ui_rx, |u| matches!(u, UiUpdate::ReportReady(_))).await {
        UiUpdate::ReportReady(generated) => {
            assert_eq!(
                generated.source,
                ReportSource::Fallback {
                    reason: FallbackReason::NoApiKey
                }
            );
            assert_eq!(generated.report.consulting_info.target, "Sunrise Berries");
        }
        other => panic!("unexpected {other:?}"),
    }

    let stored = app.state.report(&farm.farm_id, None).unwrap().unwrap();
    assert!(stored.source.is_fallback());

    app.cmd_tx.send(UserCommand::Quit).await.unwrap();
    app.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn unknown_farm_and_blank_question_are_reported() {
    let db = Arc::new(SqliteStore::open(":memory:").unwrap());
    let route = Route::Consulting {
        farm_id: "missing".into(),
    };
    let mut app = start(config(None), db, route.clone());

    match expect_update(&mut app.ui_rx, |u| matches!(u, UiUpdate::LoadFailed { .. })).await {
        UiUpdate::LoadFailed { route: failed, message } => {
            assert_eq!(failed, route);
            assert!(message.contains("missing"), "{message}");
        }
        other => panic!("unexpected {other:?}"),
    }

    app.cmd_tx
        .send(UserCommand::Ask {
            farm_id: "missing".into(),
            question: "  ".into(),
        })
        .await
        .unwrap();
    match expect_update(&mut app.ui_rx, |u| {
        matches!(u, UiUpdate::Notice(n) if n.message == "Question is required")
    })
    .await
    {
        UiUpdate::Notice(notice) => assert_eq!(notice.level, NoticeLevel::Error),
        other => panic!("unexpected {other:?}"),
    }

    app.cmd_tx
        .send(UserCommand::Navigate(Route::Interview {
            farm_id: String::new(),
        }))
        .await
        .unwrap();
    expect_update(&mut app.ui_rx, |u| {
        matches!(u, UiUpdate::Notice(n) if n.message == "Farm ID is required")
    })
    .await;

    app.cmd_tx.send(UserCommand::Quit).await.unwrap();
    app.handle.await.unwrap().unwrap();
}
