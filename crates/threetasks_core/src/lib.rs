//! Core of the three-tasks to-do app.
//! Owns task lists, their completion rules and their persistence.

pub mod app;
pub mod clock;
pub mod config;
pub mod db;
pub mod gateway;
pub mod identity;
pub mod kv;
pub mod logging;
pub mod model;
pub mod present;
pub mod store;

pub use app::{AppError, TaskApp};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AppConfig, ConfigError, ListConfig, PersistenceBackend};
pub use gateway::{
    GatewayError, GatewayResult, LocalBlobGateway, PersistenceMode, SqliteTaskGateway, TaskGateway,
};
pub use identity::{DeviceIdentity, FixedIdentity, IdentityError, IdentitySource};
pub use logging::{
    default_log_level, init_from_config, init_logging, logging_status, LoggingError,
};
pub use model::list::{ListId, ListScope, UserId};
pub use model::task::{Task, TaskId, TaskPatch};
pub use store::{ListPolicy, TaskListSnapshot, TaskStore, COMPLETION_GRACE_DELAY};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
