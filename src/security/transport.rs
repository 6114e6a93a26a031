//! Transport security enforcement.

use crate::http::error::GatewayError;
use crate::http::request::Transport;

/// Requests on the insecure listener must be presigned.
pub fn enforce_secure_transport(transport: Transport, presigned: bool) -> Result<(), GatewayError> {
    match transport {
        Transport::Secure => Ok(()),
        Transport::Insecure if presigned => Ok(()),
        Transport::Insecure => Err(GatewayError::SecureTransportRequired),
    }
}
