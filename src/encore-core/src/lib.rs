pub mod cache;
pub mod config;
pub mod events;
pub mod instance;
pub mod logging;
pub mod models;
pub mod paths;

pub use cache::{CacheError, CacheResult, DiskCache, MemoryCache, TieredCache};
pub use config::{
    CacheConfig, Config, ConfigError, ConfigWatcher, LogLevel, LoggingConfig, PlayerConfig,
    PollSettings, ValidationError,
};
pub use events::{
    Event, EventBus, EventBusError, EventHandler, EventKind, EventPayload, HandlerError,
    HandlerResult, SubscriptionId,
};
pub use instance::{InstanceLock, InstanceLockError};
pub use logging::{init_logging, LoggingError, LoggingGuard};
pub use models::{PlaybackStatus, PlayerStatus, TrackInfo, MAX_VOLUME};
pub use paths::{AppDirs, DirsError};

pub const APP_NAME: &str = "encore";
pub const APP_AUTHOR: &str = "Encore";
pub const APP_QUALIFIER: &str = "io";
