pub mod config;
pub mod context;

pub use config::ProjectConfig;
pub use context::{ProjectContext, ProjectRegistry};
