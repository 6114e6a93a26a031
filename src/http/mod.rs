//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection (net)
//!     → server.rs (axum Router, request id, trace span)
//!     → pipeline.rs (ordered stages, see module docs)
//!         normalize.rs, routing, security, health::readiness
//!     → handler.rs (named route handler)
//!     → response.rs (envelope, integrity headers)
//!     → Send to client
//! ```

pub mod error;
pub mod handler;
pub mod normalize;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod server;

pub use error::GatewayError;
pub use handler::{HandlerError, HandlerSet, Reply, ReplyBody, RouteHandler};
pub use pipeline::{Pipeline, PipelineSettings};
pub use request::{ConnectionMeta, RequestContext, Transport};
pub use response::ResponseEnvelope;
pub use server::{build_router, GatewayServer};
