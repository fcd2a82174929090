//! Configuration
//!
//! Environment-driven settings for the broadcaster.

mod settings;

pub use settings::{
    BroadcasterConfig, ConfigError, DeliverySettings, QueueSettings, SchedulerSettings, Secrets,
    ServerSettings,
};
