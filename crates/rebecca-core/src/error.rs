use std::time::Duration;

use thiserror::Error;

/// Failure of a single send. Every variant leaves the session idle again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("not signed in")]
    NotSignedIn,
    #[error("could not reach the chat server: {0}")]
    Transport(String),
    #[error("chat server returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("chat server returned no reply stream")]
    MissingBody,
    #[error("reply stalled for more than {0:?}")]
    Stalled(Duration),
    #[error("reply interrupted: {0}")]
    Interrupted(String),
    #[error("reply contained {0} malformed byte sequence(s)")]
    Malformed(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("could not reach the server: {0}")]
    Transport(String),
    #[error("{0}")]
    Rejected(String),
    #[error("server accepted the login but sent no token")]
    MissingToken,
}

/// Client-side validation of the login and registration forms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("Username is required")]
    MissingUsername,
    #[error("Password is required")]
    MissingPassword,
    #[error("Passwords do not match!")]
    PasswordMismatch,
}
