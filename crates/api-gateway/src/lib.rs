//! Authenticated request gateway
//!
//! The single entry point callers use to make a request that requires a
//! valid credential. `Gateway::execute` obtains a usable access token from
//! the credential cache (refreshing through the single-flight coordinator
//! when stale), attaches it as a bearer header, dispatches the request, and
//! folds every possible failure — cache miss, refresh failure, transport
//! error, non-2xx response, malformed error body — into the four-kind
//! [`ApiFailure`] taxonomy. Nothing escapes as a panic or an untyped error.

pub mod config;
pub mod gateway;
pub mod outcome;

pub use config::GatewayConfig;
pub use gateway::Gateway;
pub use outcome::{ApiFailure, ApiResult};
