pub mod config;
pub mod diagnosis;
pub mod error;
pub mod health;
pub mod inventory;
pub mod orchestrator;
pub mod output;
pub mod placement;
pub mod rules;
pub mod scoring;
