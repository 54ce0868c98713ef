//! Generation providers and the plumbing around them.
//!
//! This crate provides:
//! - Credential rotation pools per capability class
//! - Delegated identity (service-account assertion + token exchange)
//! - Long-running operation polling with a fixed budget
//! - Provider adapters behind a registry keyed by model
//! - Best-effort record sink and scoped background tasks

pub mod background;
pub mod config;
pub mod credentials;
pub mod error;
pub mod identity;
pub mod metrics;
pub mod operation;
pub mod providers;
pub mod record_sink;
pub mod registry;

pub use background::BackgroundTasks;
pub use config::{ProviderConfig, VertexConfig};
pub use credentials::{CredentialPool, POOL_SIZE};
pub use error::{ProviderError, ProviderResult};
pub use identity::{BearerToken, ServiceAccountKey, TokenMinter};
pub use operation::{
    poll_until_done, HttpOperationSource, OperationHandle, OperationSource, OperationStatus,
    PollConfig,
};
pub use providers::{
    FlashImageProvider, GenerationProvider, ImagenProvider, TranslateClient, VeoProvider,
};
pub use record_sink::RecordSink;
pub use registry::ProviderRegistry;
