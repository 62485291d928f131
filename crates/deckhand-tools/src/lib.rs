pub mod archetypes;
pub mod content_check;
pub mod registry;
pub mod research;
pub mod runner;
pub mod schema;
pub mod trace;
pub mod visual_check;
