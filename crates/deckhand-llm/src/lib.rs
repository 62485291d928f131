pub mod anthropic;
pub mod factory;
pub mod fallback;
pub mod mock;
pub mod openai;
pub mod parse;
pub mod prompt;
