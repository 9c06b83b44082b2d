use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayErrorKind {
    InvalidInput,
    ExternalService,
    Timeout,
    Transport,
}

impl GatewayErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            GatewayErrorKind::InvalidInput => "invalid_input",
            GatewayErrorKind::ExternalService => "external_service",
            GatewayErrorKind::Timeout => "timeout",
            GatewayErrorKind::Transport => "transport",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct GatewayError {
    pub kind: GatewayErrorKind,
    pub message: String,
}

impl GatewayError {
    pub fn new(kind: GatewayErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

pub fn invalid_input(message: impl Into<String>) -> GatewayError {
    GatewayError::new(GatewayErrorKind::InvalidInput, message)
}

pub fn external_service(message: impl Into<String>) -> GatewayError {
    GatewayError::new(GatewayErrorKind::ExternalService, message)
}

pub fn timeout(message: impl Into<String>) -> GatewayError {
    GatewayError::new(GatewayErrorKind::Timeout, message)
}

pub fn transport(message: impl Into<String>) -> GatewayError {
    GatewayError::new(GatewayErrorKind::Transport, message)
}
