pub mod errors;
pub mod issues;
pub mod provider;
pub mod report;
pub mod tools;
pub mod units;
