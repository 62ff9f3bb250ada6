use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{error_message, ApiClient, LOGIN_PATH, REGISTER_PATH};
use crate::credentials::Credential;
use crate::error::AuthError;

/// Login and registration are small requests; give up rather than hang the form
const AUTH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct AuthRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize, Default)]
struct AuthResponse {
    token: Option<String>,
    message: Option<String>,
}

impl ApiClient {
    /// Exchange a username and password for a bearer credential
    pub async fn login(&self, username: &str, password: &str) -> Result<Credential, AuthError> {
        let body = self.post_auth(LOGIN_PATH, username, password).await?;

        match (body.token, body.message) {
            (Some(token), _) if !token.is_empty() => Ok(Credential {
                username: username.to_string(),
                token,
            }),
            // Without a token the server's own wording is all the user can act on
            (_, Some(message)) if !message.trim().is_empty() => Err(AuthError::Rejected(message)),
            _ => Err(AuthError::MissingToken),
        }
    }

    /// Create an account. Returns the server's confirmation message.
    pub async fn register(&self, username: &str, password: &str) -> Result<String, AuthError> {
        let body = self.post_auth(REGISTER_PATH, username, password).await?;
        Ok(body
            .message
            .unwrap_or_else(|| "Registration successful".to_string()))
    }

    async fn post_auth(
        &self,
        path: &str,
        username: &str,
        password: &str,
    ) -> Result<AuthResponse, AuthError> {
        let response = self
            .client
            .post(self.url(path))
            .timeout(AUTH_TIMEOUT)
            .json(&AuthRequest { username, password })
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(AuthError::Rejected(error_message(status, &text)));
        }

        // An empty or non-JSON success body still counts as success
        Ok(serde_json::from_str(&text).unwrap_or_default())
    }
}
