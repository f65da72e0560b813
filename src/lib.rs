pub mod cache;
pub mod changelog;
pub mod clients;
pub mod error;
pub mod logging;
pub mod models;
pub mod ops;
pub mod pipeline;
pub mod vcs;

mod app;
pub mod commands;
pub mod config;

// Re-export App, Config and the error types from modules
pub use app::App;
pub use config::Config;
pub use error::Error;
pub use error::Result;

// Disable colors for all tests to get clean output
#[cfg(test)]
#[ctor::ctor]
fn init_tests() {
    colored::control::set_override(false);
}
