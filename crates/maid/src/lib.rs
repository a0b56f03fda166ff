pub mod config;
pub mod error;
pub mod feature;
pub mod inspect;
pub mod logging;
pub mod plex;
pub mod run;
pub mod schedule;
pub mod settings;
pub mod walker;

#[cfg(test)]
mod testing;

pub use config::{AuditPlan, MaidConfig, RunMode};
pub use error::{ConfigError, PlexError};
pub use feature::{Feature, LibraryType};
pub use run::RunReport;
