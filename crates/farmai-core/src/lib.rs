// Library root: domain types, configuration and storage shared by the
// model client, the orchestrator and the terminal UI.

pub mod config;
pub mod diagnosis;
pub mod error;
pub mod farm;
pub mod fields;
pub mod interview;
pub mod plan;
pub mod report;
pub mod session;
pub mod store;
pub mod wizard;
