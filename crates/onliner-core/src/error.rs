use thiserror::Error;

/// Errors produced by the gateway protocol layer.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("codec error: {0}")]
    Codec(String),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("transport error: {0}")]
    Transport(String),

    /// The peer closed the connection (close frame, end of stream, or reset).
    #[error("connection closed{}", .0.as_ref().map(|r| format!(": {r}")).unwrap_or_default())]
    ConnectionClosed(Option<String>),

    #[error("timeout")]
    Timeout,

    #[error("cancelled")]
    Cancelled,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl GatewayError {
    /// Whether this error means the remote end is gone.
    pub fn is_closed(&self) -> bool {
        matches!(self, GatewayError::ConnectionClosed(_))
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        GatewayError::Codec(e.to_string())
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_display_includes_reason() {
        let e = GatewayError::ConnectionClosed(Some("4004 authentication failed".into()));
        assert_eq!(e.to_string(), "connection closed: 4004 authentication failed");
        assert!(e.is_closed());

        let bare = GatewayError::ConnectionClosed(None);
        assert_eq!(bare.to_string(), "connection closed");
    }

    #[test]
    fn json_errors_become_codec_errors() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let e: GatewayError = err.into();
        assert!(matches!(e, GatewayError::Codec(_)));
        assert!(!e.is_closed());
    }
}
