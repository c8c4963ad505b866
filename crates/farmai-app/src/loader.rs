// Per-route data loaders.
//
// Each route loads everything its screen shows in one call. Routes under
// `/consulting/:farmId` all start by resolving the farm, so a blank id or an
// unknown farm fails the same way everywhere.

use chrono::NaiveDate;
use thiserror::Error;

use farmai_core::farm::Farm;
use farmai_core::plan::ConsultingPlan;
use farmai_core::store::{FarmStore, StateStore, StoreError};

use crate::protocol::ScreenData;
use crate::route::Route;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Farm ID is required")]
    MissingFarmId,

    #[error("farm `{0}` not found")]
    FarmNotFound(String),

    #[error("consulting session `{0}` not found")]
    SessionNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to read local state: {0:#}")]
    State(#[from] anyhow::Error),
}

impl LoadError {
    pub fn is_not_found(&self) -> bool {
        match self {
            LoadError::FarmNotFound(_) | LoadError::SessionNotFound(_) => true,
            LoadError::Store(e) => e.is_not_found(),
            _ => false,
        }
    }
}

/// What the loaders read from.
pub struct LoadContext<'a> {
    pub store: &'a dyn FarmStore,
    pub state: &'a StateStore,
    pub llm_model: Option<&'a str>,
    pub today: NaiveDate,
}

/// Resolve the farm a consulting route is keyed by.
pub async fn require_farm(store: &dyn FarmStore, farm_id: &str) -> Result<Farm, LoadError> {
    let farm_id = farm_id.trim();
    if farm_id.is_empty() {
        return Err(LoadError::MissingFarmId);
    }
    store
        .get_farm(farm_id)
        .await?
        .ok_or_else(|| LoadError::FarmNotFound(farm_id.to_string()))
}

pub async fn load(ctx: &LoadContext<'_>, route: &Route) -> Result<ScreenData, LoadError> {
    let Some(farm_id) = route.farm_id() else {
        return load_root(ctx, route).await;
    };

    let farm = require_farm(ctx.store, farm_id).await?;
    let id = farm.farm_id.clone();

    let data = match route {
        Route::Home | Route::FarmList => return load_root(ctx, route).await,
        Route::Consulting { .. } => ScreenData::Consulting {
            sessions: ctx.store.list_sessions(&id).await?,
            consulting_date: ctx.state.consulting_date(&id)?,
            plan: ctx.state.plan(&id)?,
            farm,
        },
        Route::Data { step, .. } => ScreenData::DataEntry {
            values: ctx.state.step_data(&id, *step)?.unwrap_or_default(),
            step: *step,
            farm,
        },
        Route::Diagnosis { .. } => ScreenData::Diagnosis {
            sheet: ctx.state.diagnosis(&id)?.unwrap_or_default(),
            farm,
        },
        Route::Interview { .. } => ScreenData::Interview {
            log: ctx.state.interview(&id)?,
            farm,
        },
        Route::Report { session, .. } => {
            let session = match session {
                Some(cid) => Some(
                    ctx.store
                        .list_sessions(&id)
                        .await?
                        .into_iter()
                        .find(|s| &s.consulting_id == cid)
                        .ok_or_else(|| LoadError::SessionNotFound(cid.clone()))?,
                ),
                None => None,
            };
            let report = ctx
                .state
                .report(&id, session.as_ref().map(|s| s.consulting_id.as_str()))?;
            ScreenData::Report {
                farm,
                session,
                report,
            }
        }
        Route::Plan { .. } => {
            let plan = match ctx.state.plan(&id)? {
                Some(plan) => plan,
                None => {
                    let existing = ctx.store.list_sessions(&id).await?.len();
                    ConsultingPlan::new_default(existing, ctx.today)
                }
            };
            ScreenData::Plan { farm, plan }
        }
        Route::FinalReport { .. } => ScreenData::FinalReport {
            sessions: ctx.store.list_sessions(&id).await?,
            report: ctx.state.final_report(&id)?.unwrap_or_default(),
            farm,
        },
        Route::Ask { .. } => ScreenData::Ask { farm },
    };
    Ok(data)
}

/// Screens that are not keyed by a farm.
async fn load_root(ctx: &LoadContext<'_>, route: &Route) -> Result<ScreenData, LoadError> {
    if *route == Route::FarmList {
        return Ok(ScreenData::FarmList {
            farms: ctx.store.list_farms().await?,
        });
    }
    Ok(ScreenData::Home {
        backend: ctx.store.backend_name().to_string(),
        llm_model: ctx.llm_model.map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use farmai_core::farm::NewFarm;
    use farmai_core::session::{NewSession, SessionStatus};
    use farmai_core::store::SqliteStore;
    use farmai_core::wizard::DataStep;

    fn stores() -> (Arc<SqliteStore>, StateStore) {
        let db = Arc::new(SqliteStore::open(":memory:").unwrap());
        let state = StateStore::new(Arc::clone(&db));
        (db, state)
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 2).unwrap()
    }

    async fn farm(db: &SqliteStore) -> Farm {
        db.create_farm(NewFarm {
            name: "Sunrise Berries".into(),
            location: "Nonsan".into(),
            owner_name: "Kim".into(),
            ..NewFarm::default()
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn blank_farm_id_is_required_error() {
        let (db, state) = stores();
        let ctx = LoadContext {
            store: &*db,
            state: &state,
            llm_model: None,
            today: today(),
        };
        let route = Route::Diagnosis {
            farm_id: "  ".into(),
        };
        let err = load(&ctx, &route).await.unwrap_err();
        assert!(matches!(err, LoadError::MissingFarmId));
        assert_eq!(err.to_string(), "Farm ID is required");
    }

    #[tokio::test]
    async fn unknown_farm_is_not_found() {
        let (db, state) = stores();
        let ctx = LoadContext {
            store: &*db,
            state: &state,
            llm_model: None,
            today: today(),
        };
        let err = load(&ctx, &Route::Ask { farm_id: "nope".into() })
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(matches!(err, LoadError::FarmNotFound(id) if id == "nope"));
    }

    #[tokio::test]
    async fn screens_default_when_nothing_saved() {
        let (db, state) = stores();
        let farm = farm(&db).await;
        let ctx = LoadContext {
            store: &*db,
            state: &state,
            llm_model: Some("gpt-test"),
            today: today(),
        };
        let id = farm.farm_id.clone();

        match load(&ctx, &Route::Data { farm_id: id.clone(), step: DataStep::Growth })
            .await
            .unwrap()
        {
            ScreenData::DataEntry { values, step, .. } => {
                assert!(values.is_empty());
                assert_eq!(step, DataStep::Growth);
            }
            other => panic!("unexpected {other:?}"),
        }

        match load(&ctx, &Route::Plan { farm_id: id.clone() }).await.unwrap() {
            ScreenData::Plan { plan, .. } => {
                assert_eq!(plan.total_sessions, 1);
                assert_eq!(plan.start_date, today());
            }
            other => panic!("unexpected {other:?}"),
        }

        match load(&ctx, &Route::Report { farm_id: id, session: None }).await.unwrap() {
            ScreenData::Report { report, session, .. } => {
                assert!(report.is_none());
                assert!(session.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }

        match load(&ctx, &Route::Home).await.unwrap() {
            ScreenData::Home { backend, llm_model } => {
                assert_eq!(backend, "sqlite");
                assert_eq!(llm_model.as_deref(), Some("gpt-test"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn report_route_resolves_session() {
        let (db, state) = stores();
        let farm = farm(&db).await;
        let session = db
            .create_session(NewSession {
                farm_id: farm.farm_id.clone(),
                consultant_id: None,
                visit_date: today(),
                status: SessionStatus::Diagnosis,
            })
            .await
            .unwrap();
        let ctx = LoadContext {
            store: &*db,
            state: &state,
            llm_model: None,
            today: today(),
        };

        let route = Route::Report {
            farm_id: farm.farm_id.clone(),
            session: Some(session.consulting_id.clone()),
        };
        match load(&ctx, &route).await.unwrap() {
            ScreenData::Report { session: found, .. } => {
                assert_eq!(found.unwrap().consulting_id, session.consulting_id)
            }
            other => panic!("unexpected {other:?}"),
        }

        let route = Route::Report {
            farm_id: farm.farm_id,
            session: Some("missing".into()),
        };
        assert!(matches!(
            load(&ctx, &route).await.unwrap_err(),
            LoadError::SessionNotFound(_)
        ));
    }
}
