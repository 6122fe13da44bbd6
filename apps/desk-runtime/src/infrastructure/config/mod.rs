//! Configuration Module
//!
//! Configuration loading for the desk runtime.

mod settings;

pub use settings::{
    BackendSettings, ConfigError, DEFAULT_SYMBOLS, HubSettings, RuntimeConfig, SessionSettings,
    SupervisorSettings,
};
