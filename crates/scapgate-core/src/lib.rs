#![deny(unsafe_code)]

//! scapgate core: a REST gateway in front of the OpenSCAP daemon.
//!
//! HTTP requests are validated by [`api`], turned into ordered daemon call
//! sequences by [`translate`], and executed through the [`oscapd`] call
//! interface, which speaks D-Bus in production.

use std::future::Future;
use std::pin::Pin;

/// A type-erased, `Send`-safe, boxed future, used as the return type of
/// async trait methods that must stay object-safe (`dyn OscapDaemon`).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// HTTP router, request validation, and basic authentication.
pub mod api;
/// OpenSCAP daemon call interface and its D-Bus client.
pub mod oscapd;
/// Gateway startup and graceful shutdown.
pub mod runtime;
/// HTTP-to-daemon request translation.
pub mod translate;

pub use api::{ApiState, router};
pub use oscapd::{DaemonError, DbusDaemon, OscapDaemon, ResultId, TaskId};
pub use runtime::{Gateway, GatewayError, ShutdownSignal};
pub use translate::Translator;
