pub mod client;
pub mod config;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod http;
pub mod resource;
pub mod retry;
pub mod storage;
pub mod utils;

pub use client::{Endpoints, GcsClient};
pub use error::{ErrorCategory, GcsError, HttpError, HttpErrorKind, Result};
pub use resource::{Bucket, Object, Prefix, Project, Resource};
pub use retry::{RetryParams, RetrySetting};
pub use storage::{Mode, ObjectFile, Whence, BLOCK_MULTIPLE, DEFAULT_CHUNK_SIZE};
