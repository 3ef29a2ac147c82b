pub mod commands;
pub mod config;
pub mod error;
pub mod mapper;
pub mod remote;
pub mod sync;
pub mod ticket;

pub use config::{ConfigHandle, ConfigService, FileConfigService, Mapping, SyncConfig};
pub use error::{BridgeError, Result};
pub use mapper::FieldMapper;
pub use remote::{HttpGateway, HttpMethod, PatchOp, RemoteGateway, RemoteNote, RemoteTicket, Session};
pub use sync::{DescriptionOutcome, ResolvedBy, SyncEngine, SyncReport};
pub use ticket::{Comment, LocalTicket};
