pub mod env;
pub mod ladder;
pub mod settings;
