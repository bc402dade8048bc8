pub mod archive;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fs_tree;
pub mod lock;
pub mod registry;
pub mod storage;
pub mod version;

pub use config::Config;
pub use coordinator::{PublishAction, VersionService};
pub use error::{ApiResponse, ErrorKind, HotError, Result};
pub use version::VersionId;
