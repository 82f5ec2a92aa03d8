//! Firebase Authentication over the Identity Toolkit REST API.
//!
//! Sign-in exchanges a Google ID token via `accounts:signInWithIdp`; the
//! resulting identity is published on a `watch` channel so the app shell can
//! react to auth changes the same way it reacts to any other remote state.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, info};

use client_core::{AuthGateway, ClientError, ClientErrorCategory, Identity, classify_http_status};

const DEFAULT_AUTH_BASE_URL: &str = "https://identitytoolkit.googleapis.com";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Source of the bearer token used for Firestore requests.
///
/// Implemented by [`FirebaseAuth`]; kept as a trait so the store can be
/// exercised against a fixed token in tests.
pub trait TokenProvider: Send + Sync {
    /// Current Firebase ID token, `None` when signed out.
    fn bearer_token(&self) -> Option<String>;
}

#[derive(Debug, Clone)]
pub struct FirebaseAuthConfig {
    pub api_key: String,
    /// Override for tests; defaults to the public Identity Toolkit endpoint.
    pub base_url: String,
}

impl FirebaseAuthConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_AUTH_BASE_URL.to_owned(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    photo_url: Option<String>,
    id_token: String,
}

/// Firebase-backed [`AuthGateway`].
pub struct FirebaseAuth {
    http: reqwest::Client,
    config: FirebaseAuthConfig,
    identity_tx: watch::Sender<Option<Identity>>,
    session_token: RwLock<Option<String>>,
}

impl FirebaseAuth {
    pub fn new(config: FirebaseAuthConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|err| {
                ClientError::new(
                    ClientErrorCategory::Config,
                    "http_client_build",
                    err.to_string(),
                )
            })?;
        let (identity_tx, _) = watch::channel(None);
        Ok(Self {
            http,
            config,
            identity_tx,
            session_token: RwLock::new(None),
        })
    }
}

#[async_trait]
impl AuthGateway for FirebaseAuth {
    async fn sign_in_with_google(&self, id_token: &str) -> Result<Identity, ClientError> {
        let url = format!(
            "{}/v1/accounts:signInWithIdp?key={}",
            self.config.base_url, self.config.api_key
        );
        let body = json!({
            "postBody": format!("id_token={id_token}&providerId=google.com"),
            "requestUri": "http://localhost",
            "returnSecureToken": true,
            "returnIdpCredential": true,
        });

        debug!("exchanging google id token");
        let response = self.http.post(&url).json(&body).send().await.map_err(|err| {
            ClientError::new(ClientErrorCategory::Network, "auth_request", err.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ClientError::new(
                classify_http_status(status.as_u16()),
                "sign_in_failed",
                format!("sign-in rejected with status {status}: {detail}"),
            ));
        }

        let payload: SignInResponse = response.json().await.map_err(|err| {
            ClientError::new(
                ClientErrorCategory::Serialization,
                "auth_response_decode",
                err.to_string(),
            )
        })?;

        let identity = Identity {
            id: payload.local_id,
            display_name: payload.display_name,
            avatar_url: payload.photo_url,
        };
        info!(user_id = %identity.id, "signed in");

        *self
            .session_token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(payload.id_token);
        let _ = self.identity_tx.send(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), ClientError> {
        // Firebase sessions are token based; dropping the token ends them.
        *self
            .session_token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        let _ = self.identity_tx.send(None);
        info!("signed out");
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.identity_tx.subscribe()
    }
}

impl TokenProvider for FirebaseAuth {
    fn bearer_token(&self) -> Option<String> {
        self.session_token
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_in_response_decodes_optional_fields() {
        let payload: SignInResponse = serde_json::from_value(json!({
            "localId": "uid-a",
            "idToken": "token",
        }))
        .expect("minimal payload should decode");
        assert_eq!(payload.local_id, "uid-a");
        assert_eq!(payload.display_name, None);
        assert_eq!(payload.photo_url, None);
    }

    #[tokio::test]
    async fn sign_out_clears_token_and_publishes_none() {
        let auth = FirebaseAuth::new(FirebaseAuthConfig::new("key")).expect("client builds");
        *auth.session_token.write().unwrap() = Some("token".to_owned());
        let _ = auth.identity_tx.send(Some(Identity {
            id: "uid-a".to_owned(),
            display_name: None,
            avatar_url: None,
        }));

        let mut rx = auth.subscribe();
        auth.sign_out().await.expect("sign out is infallible");
        assert_eq!(auth.bearer_token(), None);
        rx.changed().await.expect("sender is alive");
        assert!(rx.borrow().is_none());
    }
}
