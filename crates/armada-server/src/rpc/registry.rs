//! Method registry and async dispatch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use armada_core::ConnectionId;
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde_json::Value;
use tracing::warn;

use crate::metrics::{RPC_ERRORS_TOTAL, RPC_REQUESTS_TOTAL, RPC_REQUEST_DURATION_SECONDS};
use crate::rpc::context::RpcContext;
use crate::rpc::errors::{self, RpcError};
use crate::rpc::types::{RpcRequest, RpcResponse};

/// Trait implemented by every RPC method handler.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    /// Execute the handler on behalf of the calling connection.
    async fn handle(
        &self,
        conn: &ConnectionId,
        params: Option<Value>,
        ctx: &RpcContext,
    ) -> Result<Value, RpcError>;
}

/// Registry mapping method names to handlers.
pub struct MethodRegistry {
    handlers: HashMap<String, Arc<dyn MethodHandler>>,
}

impl MethodRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for a method name.
    pub fn register(&mut self, method: &str, handler: impl MethodHandler + 'static) {
        let _ = self.handlers.insert(method.to_owned(), Arc::new(handler));
    }

    /// Maximum time a single RPC handler is allowed to run. Registry
    /// mutations are synchronous, so anything near this bound is a bug.
    const HANDLER_TIMEOUT: Duration = Duration::from_secs(10);

    /// Dispatch a request to the appropriate handler.
    pub async fn dispatch(
        &self,
        request: RpcRequest,
        conn: &ConnectionId,
        ctx: &RpcContext,
    ) -> RpcResponse {
        let method = request.method.clone();
        counter!(RPC_REQUESTS_TOTAL, "method" => method.clone()).increment(1);

        let Some(handler) = self.handlers.get(&method) else {
            counter!(RPC_ERRORS_TOTAL, "method" => method.clone(), "error_type" => "method_not_found").increment(1);
            return RpcResponse::error(
                &request.id,
                errors::METHOD_NOT_FOUND,
                format!("Method '{method}' not found"),
            );
        };

        let start = std::time::Instant::now();
        let result = tokio::time::timeout(
            Self::HANDLER_TIMEOUT,
            handler.handle(conn, request.params, ctx),
        )
        .await;

        let response = match result {
            Ok(Ok(result)) => RpcResponse::success(&request.id, result),
            Ok(Err(err)) => {
                counter!(RPC_ERRORS_TOTAL, "method" => method.clone(), "error_type" => err.code().to_owned()).increment(1);
                RpcResponse {
                    id: request.id,
                    success: false,
                    result: None,
                    error: Some(err.to_error_body()),
                }
            }
            Err(_elapsed) => {
                counter!(RPC_ERRORS_TOTAL, "method" => method.clone(), "error_type" => "timeout").increment(1);
                tracing::error!(method, "RPC handler timed out after {:?}", Self::HANDLER_TIMEOUT);
                RpcResponse::error(
                    &request.id,
                    errors::INTERNAL_ERROR,
                    format!("Handler for '{method}' timed out"),
                )
            }
        };

        let duration = start.elapsed();
        histogram!(RPC_REQUEST_DURATION_SECONDS, "method" => method.clone())
            .record(duration.as_secs_f64());

        if duration.as_secs() >= 1 {
            warn!(
                method,
                duration_secs = duration.as_secs_f64(),
                "slow RPC request"
            );
        }

        response
    }

    /// List all registered method names (sorted).
    pub fn methods(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check whether a method is registered.
    pub fn has_method(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}
