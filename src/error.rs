use thiserror::Error;

/// Errors surfaced by the HTTP request path.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("session still expired after re-authentication")]
    SessionExpired,
    #[error("network error: {0}")]
    Network(String),
    #[error("http status {0}")]
    Http(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Errors surfaced by the on-chain submission path.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("call reverted during simulation")]
    SimulatedRevert,
    #[error("transaction mined but reverted")]
    ConfirmedRevert,
    #[error("{0} timed out")]
    Timeout(&'static str),
    #[error("transport error: {0}")]
    Transport(String),
}

impl ChainError {
    /// A revert means the chain state already satisfies (or rejects) the
    /// action, so retrying the same submission only burns gas.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::SimulatedRevert | Self::ConfirmedRevert)
    }
}

/// Coarse transport-error classes consumed by both retry loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The bearer token is no longer accepted (HTTP 401/403).
    Auth,
    /// No response: connection refused/reset, timeout, proxy failure.
    Network,
    /// Anything else. Retried without touching the transport.
    Other,
}

/// Classify a transport-level `reqwest` failure.
pub fn classify_transport(err: &reqwest::Error) -> ErrorClass {
    if let Some(status) = err.status() {
        return classify_status(status.as_u16());
    }
    if err.is_timeout() || err.is_connect() || err.is_request() {
        return ErrorClass::Network;
    }
    ErrorClass::Other
}

/// Classify a plain HTTP status code the same way.
pub fn classify_status(status: u16) -> ErrorClass {
    match status {
        401 | 403 => ErrorClass::Auth,
        _ => ErrorClass::Other,
    }
}

/// Whether an RPC error message reports a revert. Node implementations vary
/// in wording, so this matches the common variants.
pub fn looks_like_revert(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("revert") || lower.contains("always failing transaction")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_401_and_403_are_auth() {
        assert_eq!(classify_status(401), ErrorClass::Auth);
        assert_eq!(classify_status(403), ErrorClass::Auth);
    }

    #[test]
    fn other_statuses_are_not_auth() {
        assert_eq!(classify_status(400), ErrorClass::Other);
        assert_eq!(classify_status(429), ErrorClass::Other);
        assert_eq!(classify_status(500), ErrorClass::Other);
    }

    #[test]
    fn revert_detection() {
        assert!(looks_like_revert("execution reverted: already submitted"));
        assert!(looks_like_revert("VM Exception: revert"));
        assert!(looks_like_revert(
            "gas required exceeds allowance or always failing transaction"
        ));
        assert!(!looks_like_revert("connection reset by peer"));
        assert!(!looks_like_revert("nonce too low"));
    }

    #[test]
    fn revert_terminality() {
        assert!(ChainError::SimulatedRevert.is_terminal());
        assert!(ChainError::ConfirmedRevert.is_terminal());
        assert!(!ChainError::Timeout("broadcast").is_terminal());
        assert!(!ChainError::Transport("reset".into()).is_terminal());
    }
}
