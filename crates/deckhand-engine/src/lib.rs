pub mod critic;
pub mod error;
pub mod generator;
pub mod orchestrator;
pub mod planner;
