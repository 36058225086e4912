//! RentSeva HTTP API
//!
//! Thin axum layer over the prediction core and storage. Caller identity is
//! resolved by an `IdentityVerifier`; rate limiting is left to the gateway.

pub mod identity;
pub mod server;

pub use identity::{
    CallerIdentity, GatewayHeaderVerifier, IdentityError, IdentityVerifier, GATEWAY_SECRET_HEADER,
    USER_ID_HEADER,
};
pub use server::{
    bind_listener, build_router, start_server, status_for, ApiError, AppState,
    PredictionCounters,
};
