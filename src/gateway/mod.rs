//! Request gateway: the single path every backend call takes.
//!
//! Attaches the cached credential, retries connection-level failures with
//! exponential backoff, evicts the credential on 401 and folds every outcome
//! into an [`ApiResponse`].

pub mod response;
pub mod retry;
pub mod transport;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::session::SessionStore;

pub use response::{
    ApiResponse, FailureKind, GENERIC_FAILURE_MESSAGE, MISSING_IDENTITY_MESSAGE,
    NETWORK_FAILURE_MESSAGE,
};
pub use retry::{RetryAttempt, RetryPolicy};
pub use transport::{HttpReply, HttpRequest, ReqwestTransport, Transport};

pub struct RequestGateway {
    transport: Arc<dyn Transport>,
    session: Arc<SessionStore>,
    retry: RetryPolicy,
}

impl RequestGateway {
    pub fn new(transport: Arc<dyn Transport>, session: Arc<SessionStore>, retry: RetryPolicy) -> Self {
        Self {
            transport,
            session,
            retry,
        }
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Perform the exchange and hand back the raw reply on any 2xx.
    pub async fn send(&self, operation: &'static str, mut request: HttpRequest) -> ApiResponse<HttpReply> {
        let mut attempt = 1;
        loop {
            // Re-read per attempt: a concurrent 401 may have evicted it.
            request.bearer = self.session.credential().await;
            debug!(
                operation,
                attempt,
                method = %request.method,
                path = %request.path,
                authenticated = request.bearer.is_some(),
                "Sending request"
            );

            let err = match self.transport.execute(&request).await {
                Ok(reply) => return self.settle(operation, reply).await,
                Err(err) => err,
            };

            let retry = if err.is_connection_level() {
                self.retry.after_failure(operation, attempt)
            } else {
                None
            };
            match retry {
                Some(next) => {
                    warn!(
                        operation = next.operation,
                        attempt = next.attempt,
                        delay_ms = next.next_delay.as_millis() as u64,
                        error = %err,
                        "Connection failed, retrying"
                    );
                    tokio::time::sleep(next.next_delay).await;
                    attempt = next.attempt;
                }
                None => {
                    warn!(operation, attempt, error = %err, "Request failed without a response");
                    return ApiResponse::network_failure();
                }
            }
        }
    }

    /// Perform the exchange and decode a 2xx body into `T`.
    pub async fn call<T: DeserializeOwned>(&self, operation: &'static str, request: HttpRequest) -> ApiResponse<T> {
        let response = self.send(operation, request).await;
        decode(operation, response)
    }

    /// Perform the exchange, ignoring any 2xx body.
    pub async fn call_empty(&self, operation: &'static str, request: HttpRequest) -> ApiResponse<()> {
        self.send(operation, request).await.discard()
    }

    async fn settle(&self, operation: &'static str, reply: HttpReply) -> ApiResponse<HttpReply> {
        if reply.is_success() {
            let status = reply.status;
            return ApiResponse::ok(reply, status);
        }
        if reply.status == 401 {
            self.session.handle_authorization_denied().await;
        }
        let response = ApiResponse::from_error_body(reply.status, &reply.body);
        debug!(
            operation,
            status = reply.status,
            message = response.message.as_deref().unwrap_or_default(),
            "Request rejected"
        );
        response
    }
}

fn decode<T: DeserializeOwned>(operation: &'static str, response: ApiResponse<HttpReply>) -> ApiResponse<T> {
    let status = response.status_code;
    match response.data {
        Some(reply) if response.success => match serde_json::from_value::<T>(reply.body) {
            Ok(data) => ApiResponse::ok(data, status),
            Err(e) => {
                warn!(operation, status, error = %e, "Unexpected response body");
                ApiResponse::failure(format!("Unexpected response from server: {e}"), status)
            }
        },
        _ => ApiResponse {
            success: response.success,
            data: None,
            message: response.message,
            status_code: status,
        },
    }
}
