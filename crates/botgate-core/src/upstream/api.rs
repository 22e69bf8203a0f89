//! UpstreamApi trait and its object-safe wrapper.
//!
//! Uses RPITIT (return position impl trait in trait) for async methods,
//! which is native in Rust 2024 edition. `BoxUpstreamApi` provides dynamic
//! dispatch through the same blanket-impl pattern the other ports use.

use std::future::Future;
use std::pin::Pin;

use secrecy::SecretString;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use botgate_types::environment::Environment;
use botgate_types::upstream::OutboundCallResult;

/// One RPC-style call to the upstream API.
///
/// `bot` and `environment` are for logging only; the token alone selects the
/// upstream identity.
#[derive(Debug, Clone, Copy)]
pub struct ApiCall<'a> {
    pub bot: &'a str,
    pub environment: Environment,
    pub method: &'a str,
    pub token: &'a SecretString,
    pub params: &'a Map<String, Value>,
}

/// Client for the upstream messaging API.
///
/// Implementations are shared by every handler and must be safe to call
/// concurrently. They never fail with a Rust error: transport problems come
/// back as a synthetic `ok: false` envelope.
pub trait UpstreamApi: Send + Sync {
    /// Perform `call`, retrying per the implementation's policy.
    ///
    /// Cancelling `cancel` abandons in-flight attempts and backoff sleeps.
    fn call(
        &self,
        call: ApiCall<'_>,
        cancel: &CancellationToken,
    ) -> impl Future<Output = OutboundCallResult> + Send;

    /// URL a file stored upstream can be downloaded from. No network call.
    fn file_url(&self, token: &SecretString, file_path: &str) -> String;
}

/// Object-safe version of [`UpstreamApi`] with boxed futures.
///
/// A blanket implementation is provided for all types implementing `UpstreamApi`.
pub trait UpstreamApiDyn: Send + Sync {
    fn call_boxed<'a>(
        &'a self,
        call: ApiCall<'a>,
        cancel: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = OutboundCallResult> + Send + 'a>>;

    fn file_url(&self, token: &SecretString, file_path: &str) -> String;
}

impl<T: UpstreamApi> UpstreamApiDyn for T {
    fn call_boxed<'a>(
        &'a self,
        call: ApiCall<'a>,
        cancel: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = OutboundCallResult> + Send + 'a>> {
        Box::pin(self.call(call, cancel))
    }

    fn file_url(&self, token: &SecretString, file_path: &str) -> String {
        UpstreamApi::file_url(self, token, file_path)
    }
}

/// Type-erased upstream client, so the dispatcher and handlers do not carry
/// the adapter's concrete type.
pub struct BoxUpstreamApi {
    inner: Box<dyn UpstreamApiDyn + Send + Sync>,
}

impl BoxUpstreamApi {
    pub fn new<T: UpstreamApi + 'static>(api: T) -> Self {
        Self {
            inner: Box::new(api),
        }
    }

    pub async fn call(&self, call: ApiCall<'_>, cancel: &CancellationToken) -> OutboundCallResult {
        self.inner.call_boxed(call, cancel).await
    }

    pub fn file_url(&self, token: &SecretString, file_path: &str) -> String {
        self.inner.file_url(token, file_path)
    }
}
