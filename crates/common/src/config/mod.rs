pub mod callback;
pub mod error;
pub mod loader;
pub mod update;

pub use callback::{
    CallbackConfig, ConfigKey, GeneratedKey, GeneratedKeyAuthConfig, GeneratedKeyKind,
    MessageGeneration,
};
pub use update::{TriggerStatus, UpdateDataConfig, UpdateDataMapping};
