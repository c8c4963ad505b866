// Screen routes and their path syntax.
//
// Every screen is addressed by a path such as `/consulting/<id>/diagnosis`.
// `Route::parse` and `Route::path` are inverse for every valid route, so a
// route can be passed on the command line and logged in the same form.
// Ids are percent-encoded in paths; surrounding whitespace typed around an
// encoded segment is ignored.

use std::fmt;

use thiserror::Error;
use urlencoding::encode;

use farmai_core::wizard::DataStep;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("Farm ID is required")]
    MissingFarmId,

    #[error("unknown data step `{0}`")]
    UnknownDataStep(String),

    #[error("no screen at `{0}`")]
    UnknownPath(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Route {
    #[default]
    Home,
    FarmList,
    Consulting { farm_id: String },
    Data { farm_id: String, step: DataStep },
    Diagnosis { farm_id: String },
    Interview { farm_id: String },
    Report { farm_id: String, session: Option<String> },
    Plan { farm_id: String },
    FinalReport { farm_id: String },
    Ask { farm_id: String },
}

impl Route {
    /// Parse a path with an optional query string. Only `session` is read
    /// from the query, and only on the report route.
    pub fn parse(input: &str) -> Result<Route, RouteError> {
        let input = input.trim();
        let (path, query) = match input.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (input, None),
        };
        let path = path.trim_end_matches('/');
        let unknown = || RouteError::UnknownPath(input.to_string());

        if path.is_empty() {
            return Ok(Route::Home);
        }
        let segments: Vec<&str> = path
            .strip_prefix('/')
            .ok_or_else(unknown)?
            .split('/')
            .collect();

        match segments.as_slice() {
            ["farms", "myfarms"] => Ok(Route::FarmList),
            ["consulting"] => Err(RouteError::MissingFarmId),
            ["consulting", farm_id, rest @ ..] => {
                let farm_id = decode_id(farm_id).ok_or_else(unknown)?;
                if farm_id.trim().is_empty() {
                    return Err(RouteError::MissingFarmId);
                }
                match rest {
                    [] => Ok(Route::Consulting { farm_id }),
                    ["data", slug] => DataStep::from_slug(slug)
                        .map(|step| Route::Data { farm_id, step })
                        .ok_or_else(|| RouteError::UnknownDataStep(slug.to_string())),
                    ["diagnosis"] => Ok(Route::Diagnosis { farm_id }),
                    ["interview"] => Ok(Route::Interview { farm_id }),
                    ["report"] => {
                        let session = match query {
                            Some(query) => session_param(query).map_err(|()| unknown())?,
                            None => None,
                        };
                        Ok(Route::Report { farm_id, session })
                    }
                    ["plan"] => Ok(Route::Plan { farm_id }),
                    ["final-report"] => Ok(Route::FinalReport { farm_id }),
                    ["ask"] => Ok(Route::Ask { farm_id }),
                    _ => Err(unknown()),
                }
            }
            _ => Err(unknown()),
        }
    }

    pub fn path(&self) -> String {
        let base = |farm_id: &str| format!("/consulting/{}", encode(farm_id));
        match self {
            Route::Home => "/".to_string(),
            Route::FarmList => "/farms/myfarms".to_string(),
            Route::Consulting { farm_id } => base(farm_id),
            Route::Data { farm_id, step } => format!("{}/data/{}", base(farm_id), step.slug()),
            Route::Diagnosis { farm_id } => format!("{}/diagnosis", base(farm_id)),
            Route::Interview { farm_id } => format!("{}/interview", base(farm_id)),
            Route::Report { farm_id, session } => match session {
                Some(id) => format!("{}/report?session={}", base(farm_id), encode(id)),
                None => format!("{}/report", base(farm_id)),
            },
            Route::Plan { farm_id } => format!("{}/plan", base(farm_id)),
            Route::FinalReport { farm_id } => format!("{}/final-report", base(farm_id)),
            Route::Ask { farm_id } => format!("{}/ask", base(farm_id)),
        }
    }

    pub fn farm_id(&self) -> Option<&str> {
        match self {
            Route::Home | Route::FarmList => None,
            Route::Consulting { farm_id }
            | Route::Data { farm_id, .. }
            | Route::Diagnosis { farm_id }
            | Route::Interview { farm_id }
            | Route::Report { farm_id, .. }
            | Route::Plan { farm_id }
            | Route::FinalReport { farm_id }
            | Route::Ask { farm_id } => Some(farm_id),
        }
    }

    /// Where "back" leads: consulting sub-screens return to the farm's
    /// detail, the detail to the farm list, the list to home.
    pub fn parent(&self) -> Route {
        match self {
            Route::Home | Route::FarmList => Route::Home,
            Route::Consulting { .. } => Route::FarmList,
            other => match other.farm_id() {
                Some(id) => Route::Consulting {
                    farm_id: id.to_string(),
                },
                None => Route::Home,
            },
        }
    }

    pub fn title(&self) -> String {
        match self {
            Route::Home => "Home".to_string(),
            Route::FarmList => "My farms".to_string(),
            Route::Consulting { .. } => "Consulting".to_string(),
            Route::Data { step, .. } => format!("Data entry: {}", step.title()),
            Route::Diagnosis { .. } => "Diagnosis".to_string(),
            Route::Interview { .. } => "Interview".to_string(),
            Route::Report { .. } => "Consulting report".to_string(),
            Route::Plan { .. } => "Consulting plan".to_string(),
            Route::FinalReport { .. } => "Final report".to_string(),
            Route::Ask { .. } => "Ask the consultant".to_string(),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Decode a trimmed path segment. `None` when it is not valid UTF-8.
fn decode_id(segment: &str) -> Option<String> {
    urlencoding::decode(segment.trim())
        .ok()
        .map(|id| id.into_owned())
}

/// The `session` query value; `Ok(None)` when absent or blank.
fn session_param(query: &str) -> Result<Option<String>, ()> {
    let Some((_, value)) = query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == "session")
    else {
        return Ok(None);
    };
    let id = decode_id(value).ok_or(())?;
    Ok(Some(id).filter(|id| !id.trim().is_empty()))
}

// ---------------------------------------------------------------------------
// Wizard navigation
// ---------------------------------------------------------------------------

/// The screen after saving `step`: the next step, or the diagnosis after
/// the last one.
pub fn wizard_next(farm_id: &str, step: DataStep) -> Route {
    let farm_id = farm_id.to_string();
    match step.next() {
        Some(step) => Route::Data { farm_id, step },
        None => Route::Diagnosis { farm_id },
    }
}

/// The screen before `step`: the previous step, or the farm's detail before
/// the first one.
pub fn wizard_previous(farm_id: &str, step: DataStep) -> Route {
    let farm_id = farm_id.to_string();
    match step.previous() {
        Some(step) => Route::Data { farm_id, step },
        None => Route::Consulting { farm_id },
    }
}
