use thiserror::Error;

/// A message tag that is not part of the closed protocol vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("unknown member notification mode '{0}' (expected Add or Update)")]
    UnknownMode(String),
    #[error("unknown control notification kind '{0}' (expected Delete)")]
    UnknownControlKind(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} must not be blank")]
    Blank(&'static str),
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("malformed email address '{0}'")]
    MalformedEmail(String),
    #[error("unknown membership status '{0}'")]
    UnknownStatus(String),
    #[error("malformed member id '{0}'")]
    MalformedId(String),
}
