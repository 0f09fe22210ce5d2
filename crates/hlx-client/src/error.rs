//! Client error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// 4xx response. The endpoint reports a machine-readable code and a
    /// human-readable message; both are surfaced as-is.
    #[error("api error {status}: [{code}] {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// 5xx response, body passed through verbatim.
    #[error("server error {status}: {body}")]
    Server { status: u16, body: String },

    #[error(transparent)]
    Core(#[from] hlx_core::CoreError),

    #[error(transparent)]
    Signing(#[from] hlx_signing::SigningError),

    #[error(transparent)]
    Ws(#[from] hlx_ws::WsError),
}

pub type ClientResult<T> = Result<T, ClientError>;
