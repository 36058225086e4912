//! Caller identity
//!
//! Token verification happens upstream; handlers only need a stable user id.

use axum::http::{HeaderMap, HeaderName};

/// Header an authenticating gateway sets after verifying the caller
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the secret shared between the gateway and this service
pub const GATEWAY_SECRET_HEADER: &str = "x-gateway-secret";

/// Longest user id accepted from a gateway
pub const MAX_USER_ID_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: String,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Authentication credentials were not provided")]
    Missing,
    #[error("Invalid caller identity: {0}")]
    Invalid(String),
    #[error("Request did not come through the authenticating gateway")]
    UntrustedSource,
}

/// Resolves the caller of a request
pub trait IdentityVerifier: Send + Sync {
    fn verify(&self, headers: &HeaderMap) -> Result<CallerIdentity, IdentityError>;
}

/// Trusts the user id header set by an upstream gateway
///
/// Without a shared secret any client that reaches the port can claim any
/// user id, so the service must then only listen where the gateway can reach it.
#[derive(Clone)]
pub struct GatewayHeaderVerifier {
    header: HeaderName,
    secret: Option<String>,
}

impl std::fmt::Debug for GatewayHeaderVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayHeaderVerifier")
            .field("header", &self.header)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Default for GatewayHeaderVerifier {
    fn default() -> Self {
        Self::new(HeaderName::from_static(USER_ID_HEADER))
    }
}

impl GatewayHeaderVerifier {
    pub fn new(header: HeaderName) -> Self {
        Self {
            header,
            secret: None,
        }
    }

    /// Require `x-gateway-secret` to match `secret` on every request
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    fn check_secret(&self, headers: &HeaderMap) -> Result<(), IdentityError> {
        let Some(expected) = &self.secret else {
            return Ok(());
        };
        let presented = headers
            .get(GATEWAY_SECRET_HEADER)
            .map(|v| v.as_bytes())
            .unwrap_or_default();
        if constant_time_eq(presented, expected.as_bytes()) {
            Ok(())
        } else {
            Err(IdentityError::UntrustedSource)
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

impl IdentityVerifier for GatewayHeaderVerifier {
    fn verify(&self, headers: &HeaderMap) -> Result<CallerIdentity, IdentityError> {
        self.check_secret(headers)?;
        let value = headers.get(&self.header).ok_or(IdentityError::Missing)?;
        let user_id = value
            .to_str()
            .map_err(|_| IdentityError::Invalid("user id is not valid ASCII".into()))?
            .trim();

        if user_id.is_empty() {
            return Err(IdentityError::Missing);
        }
        if user_id.len() > MAX_USER_ID_LEN {
            return Err(IdentityError::Invalid(format!(
                "user id longer than {MAX_USER_ID_LEN} characters"
            )));
        }

        Ok(CallerIdentity {
            user_id: user_id.to_string(),
        })
    }
}
