//! HTTP front end
//!
//! Every method and path is forwarded to the [`RequestHandler`], so the
//! method check happens in one place. `GET /_/health` answers platform probes.

use crate::handler::{FunctionRequest, FunctionResponse, RequestHandler};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;

/// Header carrying the error classification on non-2xx responses
pub const ERROR_KIND_HEADER: &str = "x-error-kind";
/// Header telling the caller whether re-invoking may help
pub const RETRYABLE_HEADER: &str = "x-retryable";

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Function HTTP server
pub struct FunctionServer {
    listener: TcpListener,
    router: Router,
}

impl FunctionServer {
    pub async fn new(address: &str, handler: Arc<RequestHandler>) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| ServerError::Bind {
                address: address.to_string(),
                source,
            })?;

        tracing::info!(address = %address, "Function server bound");

        Ok(Self {
            listener,
            router: router(handler),
        })
    }

    /// Serve until `shutdown` resolves
    pub async fn serve<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Function server stopped");
        Ok(())
    }
}

pub fn router(handler: Arc<RequestHandler>) -> Router {
    Router::new()
        .route("/_/health", get(health_handler))
        .fallback(invoke_handler)
        .with_state(handler)
}

async fn health_handler() -> &'static str {
    "OK"
}

async fn invoke_handler(
    State(handler): State<Arc<RequestHandler>>,
    method: Method,
    body: Bytes,
) -> Response {
    let request = FunctionRequest::new(method.as_str(), body.to_vec());
    into_http(handler.handle(&request).await)
}

fn into_http(response: FunctionResponse) -> Response {
    let status = StatusCode::from_u16(response.status_code)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut http = (status, Json(response.body)).into_response();

    if let Some(kind) = response.error_kind {
        let headers = http.headers_mut();
        headers.insert(ERROR_KIND_HEADER, HeaderValue::from_static(kind.as_str()));
        headers.insert(
            RETRYABLE_HEADER,
            HeaderValue::from_static(if response.retryable { "true" } else { "false" }),
        );
    }

    http
}
