//! Session handling: credential ownership, authorized dispatch and the
//! single-flight token refresh.

pub mod coordinator;
pub mod envelope;
pub mod error;
pub mod transport;

pub use coordinator::SessionCoordinator;
pub use envelope::{ApiResponse, RequestEnvelope};
pub use error::SessionError;
pub use transport::HttpTransport;
