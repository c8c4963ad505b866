// Orchestration between the farm store, the model client and the UI.

pub mod app;
pub mod loader;
pub mod protocol;
pub mod route;
