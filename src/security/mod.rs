//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (after routing):
//!     → transport.rs (insecure listener admits presigned requests only)
//!     → credentials.rs (parse Date, Authorization, presigned query)
//!     → [readiness gate]
//!     → authentication.rs (auth cache / key directory → Principal)
//!     → authorization.rs (metadata lookup, auth action check)
//!     → Pass to route dispatch
//! ```
//!
//! # Design Decisions
//! - Transport security is checked before any credential is looked at
//! - Fail closed: reject on any security check failure
//! - Authentication failures are 401, authorization failures are 403

pub mod authentication;
pub mod authorization;
pub mod credentials;
pub mod principal;
pub mod transport;

pub use authentication::Authenticator;
pub use authorization::{authorize, load_metadata};
pub use credentials::{Credentials, PresentedCredentials};
pub use principal::Principal;
pub use transport::enforce_secure_transport;
