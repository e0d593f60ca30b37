//! Cross-cutting helpers: errors, deadlines, retries, shutdown.

pub mod deadline;
pub mod errors;
pub mod retry;
pub mod shutdown;

pub use deadline::Deadline;
pub use errors::{DomainError, DomainResult, ErrorKind};
pub use retry::{retry_read, RetryConfig};
pub use shutdown::{ShutdownCoordinator, ShutdownSignal};
