pub mod attachments;
pub mod catalog;
pub mod config;
pub mod documents;
pub mod engine;
pub mod error;
pub mod remote;
pub mod scheduler;

pub use attachments::{AttachmentAction, AttachmentOutcome, AttachmentSync};
pub use catalog::PartitionCatalog;
pub use config::{
    CategoryOutcome, ConfigError, PassReport, SyncAction, SyncConfig, SyncCredentials, SyncMode,
    SyncStatus,
};
pub use documents::{IndexDocument, PartitionDocument, INDEX_PATH, PROTOCOL_VERSION};
pub use engine::{IndexSync, SyncEngine};
pub use error::SyncError;
pub use remote::{ContentApiClient, InMemoryRemote, RemoteContent, RemoteError, RemoteFile};
pub use scheduler::AutoSync;
