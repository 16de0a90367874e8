pub mod clock;
pub mod config;
pub mod content;
pub mod credentials;
pub mod generation;
pub mod item;
pub mod metrics;
pub mod production;
pub mod publishing;
pub mod session;
pub mod testing;

pub use clock::{Clock, SystemClock};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use content::{ContentProvider, ContentRecord, ContentRequest, DurationBucket};
pub use credentials::{
    CredentialEntry, CredentialError, CredentialKind, CredentialPool, CredentialSettings,
    CredentialStore, GenerationAuth, SqliteCredentialStore,
};
pub use item::{ArtifactExport, ItemBoard, ItemEvent, ItemStatus, PublishStatus, WorkItem};
pub use production::{BatchProductionOrchestrator, ProductionError, ProductionMode, ProductionReport};
pub use publishing::{BatchPublishOrchestrator, PublishError, PublishMode, PublishReport};
pub use session::{ProductionPlan, Session, SessionBackends, SessionError, SessionEvent};
