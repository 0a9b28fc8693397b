//! HTTP surface of the gateway.

pub mod auth;
pub mod request;
pub mod server;

pub use auth::BasicCredentials;
pub use request::{ApiError, ErrorBody};
pub use server::{ApiState, router, serve};
