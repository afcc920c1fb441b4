//! Error types for the plugin gateway

use std::io;

use thiserror::Error;

/// Result type alias for the plugin gateway
pub type Result<T> = std::result::Result<T, Error>;

/// Plugin gateway errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing or malformed credential
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Upstream transport error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Protocol error (malformed request envelope)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// JSON-RPC error
    #[error("JSON-RPC error {code}: {message}")]
    JsonRpc {
        /// Error code
        code: i32,
        /// Error message
        message: String,
        /// Optional data
        data: Option<serde_json::Value>,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a JSON-RPC error
    pub fn json_rpc(code: i32, message: impl Into<String>) -> Self {
        Self::JsonRpc {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Convert to JSON-RPC error code
    #[must_use]
    pub fn to_rpc_code(&self) -> i32 {
        match self {
            Self::JsonRpc { code, .. } => *code,
            Self::Json(_) => rpc_codes::PARSE_ERROR,
            Self::Protocol(_) => rpc_codes::INVALID_REQUEST,
            Self::Auth(_) => rpc_codes::AUTH_ERROR,
            Self::Transport(_) | Self::Http(_) => rpc_codes::SERVER_ERROR_START,
            _ => rpc_codes::INTERNAL_ERROR,
        }
    }
}

/// Standard JSON-RPC error codes
pub mod rpc_codes {
    /// Parse error - Invalid JSON
    pub const PARSE_ERROR: i32 = -32700;
    /// Invalid Request - Not a valid Request object
    pub const INVALID_REQUEST: i32 = -32600;
    /// Method not found
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid params
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal error
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Server error range start
    pub const SERVER_ERROR_START: i32 = -32000;
    /// Authentication failure (missing or malformed credential)
    pub const AUTH_ERROR: i32 = -32002;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_code_mapping() {
        assert_eq!(Error::Auth("no token".into()).to_rpc_code(), -32002);
        assert_eq!(Error::Protocol("bad".into()).to_rpc_code(), -32600);
        assert_eq!(Error::Internal("boom".into()).to_rpc_code(), -32603);
        assert_eq!(Error::json_rpc(-32601, "nope").to_rpc_code(), -32601);
    }

    #[test]
    fn json_error_maps_to_parse_error() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert_eq!(err.to_rpc_code(), -32700);
    }
}
