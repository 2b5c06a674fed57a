//! OAuth2 credentials for the Drive API
//!
//! Reads the client secret descriptor and the refreshable token artifact,
//! refreshes expired tokens and, when allowed, runs the installed-app
//! loopback flow to obtain new ones.

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{DriveError, Result};

pub const DRIVE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Seconds before the real expiry at which a token counts as expired
const EXPIRY_BUFFER_SECS: i64 = 300;

/// Supplies bearer tokens to the Drive client
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// A fixed token, never refreshed
pub struct StaticToken(pub String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// OAuth client registration, as downloaded from the cloud console
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

impl ClientSecret {
    pub fn parse(json: &str) -> Result<Self> {
        let file: ClientSecretFile = serde_json::from_str(json)
            .map_err(|e| DriveError::auth(format!("Invalid client secret file: {}", e)))?;
        file.installed
            .or(file.web)
            .ok_or_else(|| DriveError::auth("Client secret file has no 'installed' or 'web' section"))
    }

    pub async fn read(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            DriveError::auth(format!("Cannot read client secret {}: {}", path.display(), e))
        })?;
        Self::parse(&json)
    }
}

/// Refreshable token artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredToken {
    pub token: String,
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub expiry: Option<DateTime<Utc>>,
}

impl StoredToken {
    /// Check if the token is expired (with 5 min buffer)
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => expiry <= now + Duration::seconds(EXPIRY_BUFFER_SECS),
            None => false,
        }
    }
}

/// Token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
}

fn expiry_from(expires_in: Option<i64>) -> Option<DateTime<Utc>> {
    expires_in
        .and_then(Duration::try_seconds)
        .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
}

/// Session credentials handle
///
/// Constructed explicitly and initialized once per session with
/// [`Authenticator::initialize`]; afterwards it hands out access tokens and
/// refreshes them when they run out.
pub struct Authenticator {
    http: Client,
    credentials_path: PathBuf,
    token_path: PathBuf,
    token: RwLock<Option<StoredToken>>,
}

impl Authenticator {
    pub fn new(credentials_path: impl Into<PathBuf>, token_path: impl Into<PathBuf>) -> Self {
        Self {
            http: Client::new(),
            credentials_path: credentials_path.into(),
            token_path: token_path.into(),
            token: RwLock::new(None),
        }
    }

    /// Load the token artifact, refreshing it if expired
    ///
    /// When there is no usable token and `interactive` is set, the browser
    /// consent flow is run; otherwise `DriveError::Auth` is returned.
    pub async fn initialize(&self, interactive: bool) -> Result<()> {
        let token = match self.load_token().await? {
            Some(token) if !token.is_expired() => {
                debug!(path = %self.token_path.display(), "using stored token");
                token
            }
            Some(token) if token.refresh_token.is_some() => self.refresh(&token).await?,
            _ if interactive => self.run_consent_flow().await?,
            _ => {
                return Err(DriveError::auth(format!(
                    "No valid token at {}; authorize first",
                    self.token_path.display()
                )))
            }
        };

        *self.token.write().await = Some(token);
        Ok(())
    }

    /// Run the consent flow regardless of any stored token
    pub async fn authorize(&self) -> Result<()> {
        let token = self.run_consent_flow().await?;
        *self.token.write().await = Some(token);
        Ok(())
    }

    async fn load_token(&self) -> Result<Option<StoredToken>> {
        let json = match tokio::fs::read_to_string(&self.token_path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(DriveError::Io(e)),
        };

        match serde_json::from_str(&json) {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                warn!(path = %self.token_path.display(), "ignoring unreadable token file: {}", e);
                Ok(None)
            }
        }
    }

    async fn store_token(&self, token: &StoredToken) -> Result<()> {
        let json = serde_json::to_string_pretty(token)?;
        tokio::fs::write(&self.token_path, json).await?;
        debug!(path = %self.token_path.display(), "stored token");
        Ok(())
    }

    async fn refresh(&self, stored: &StoredToken) -> Result<StoredToken> {
        let refresh_token = stored
            .refresh_token
            .as_deref()
            .ok_or_else(|| DriveError::auth("Token expired and no refresh token available"))?;

        let response = self
            .http
            .post(&stored.token_uri)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", stored.client_id.as_str()),
                ("client_secret", stored.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| DriveError::auth(format!("Token refresh failed: {}", e)))?;

        let body = token_response(response, "Token refresh").await?;

        let token = StoredToken {
            token: body.access_token,
            // Keep the old refresh token if none is returned
            refresh_token: body.refresh_token.or_else(|| stored.refresh_token.clone()),
            expiry: expiry_from(body.expires_in),
            ..stored.clone()
        };
        self.store_token(&token).await?;

        info!("OAuth2 token refreshed");
        Ok(token)
    }

    async fn run_consent_flow(&self) -> Result<StoredToken> {
        let secret = ClientSecret::read(&self.credentials_path).await?;

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| DriveError::auth(format!("Failed to bind callback listener: {}", e)))?;
        let port = listener.local_addr()?.port();
        let redirect_uri = format!("http://127.0.0.1:{}/", port);

        let (verifier, challenge) = pkce_pair();
        let state = random_string(32);
        let url = consent_url(&secret, &redirect_uri, &state, &challenge);

        info!("OAuth callback listener bound on port {}", port);
        eprintln!("Open this URL in a browser to authorize access:\n\n{}\n", url);
        if let Err(e) = open::that(&url) {
            warn!("Failed to open browser: {}", e);
        }

        let (code, returned_state) = wait_for_callback(listener).await?;
        if returned_state != state {
            return Err(DriveError::auth("Callback state does not match the request"));
        }

        let response = self
            .http
            .post(&secret.token_uri)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code.as_str()),
                ("client_id", secret.client_id.as_str()),
                ("client_secret", secret.client_secret.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("code_verifier", verifier.as_str()),
            ])
            .send()
            .await
            .map_err(|e| DriveError::auth(format!("Token exchange failed: {}", e)))?;

        let body = token_response(response, "Token exchange").await?;

        let token = StoredToken {
            token: body.access_token,
            refresh_token: body.refresh_token,
            token_uri: secret.token_uri,
            client_id: secret.client_id,
            client_secret: secret.client_secret,
            scopes: vec![DRIVE_READONLY_SCOPE.to_string()],
            expiry: expiry_from(body.expires_in),
        };
        self.store_token(&token).await?;

        info!(path = %self.token_path.display(), "OAuth2 token obtained");
        Ok(token)
    }
}

#[async_trait]
impl TokenSource for Authenticator {
    async fn access_token(&self) -> Result<String> {
        {
            let guard = self.token.read().await;
            match guard.as_ref() {
                Some(token) if !token.is_expired() => return Ok(token.token.clone()),
                Some(_) => {}
                None => return Err(DriveError::auth("Authenticator is not initialized")),
            }
        }

        let mut guard = self.token.write().await;
        let current = guard
            .clone()
            .ok_or_else(|| DriveError::auth("Authenticator is not initialized"))?;
        if !current.is_expired() {
            return Ok(current.token);
        }
        let refreshed = self.refresh(&current).await?;
        let access = refreshed.token.clone();
        *guard = Some(refreshed);
        Ok(access)
    }
}

async fn token_response(response: reqwest::Response, action: &str) -> Result<TokenResponse> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(DriveError::auth(format!("{} failed ({}): {}", action, status, text)));
    }
    response
        .json()
        .await
        .map_err(|e| DriveError::auth(format!("{} returned an unreadable response: {}", action, e)))
}

fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// PKCE verifier and its S256 challenge
fn pkce_pair() -> (String, String) {
    let verifier = random_string(64);
    let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
    (verifier, challenge)
}

fn consent_url(secret: &ClientSecret, redirect_uri: &str, state: &str, challenge: &str) -> String {
    let params = [
        ("response_type", "code"),
        ("client_id", secret.client_id.as_str()),
        ("redirect_uri", redirect_uri),
        ("scope", DRIVE_READONLY_SCOPE),
        ("state", state),
        ("code_challenge", challenge),
        ("code_challenge_method", "S256"),
        ("access_type", "offline"),
        ("prompt", "consent"),
    ];
    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}?{}", secret.auth_uri, query)
}

/// Accept connections until one carries the OAuth redirect
///
/// Returns (code, state) extracted from the callback request.
async fn wait_for_callback(listener: TcpListener) -> Result<(String, String)> {
    loop {
        let (mut socket, _) = listener
            .accept()
            .await
            .map_err(|e| DriveError::auth(format!("Failed to accept connection: {}", e)))?;

        let mut buffer = vec![0u8; 4096];
        let n = socket.read(&mut buffer).await?;
        let request = String::from_utf8_lossy(&buffer[..n]);

        // Browsers may probe for a favicon before or after the redirect
        let is_redirect = request
            .lines()
            .next()
            .map(|line| line.contains('?'))
            .unwrap_or(false);
        if !is_redirect {
            let _ = socket
                .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .await;
            continue;
        }

        let result = parse_callback_request(&request);
        let body = match &result {
            Ok(_) => "Authorization complete. You can close this window.",
            Err(_) => "Authorization failed. Check the terminal for details.",
        };
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        let _ = socket.write_all(response.as_bytes()).await;
        return result;
    }
}

/// Parse OAuth callback request to extract code and state
fn parse_callback_request(request: &str) -> Result<(String, String)> {
    let first_line = request
        .lines()
        .next()
        .ok_or_else(|| DriveError::auth("Empty request"))?;

    // GET /?state=yyy&code=xxx&scope=... HTTP/1.1
    let path = first_line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| DriveError::auth("Invalid request format"))?;
    let (_, query) = path
        .split_once('?')
        .ok_or_else(|| DriveError::auth("No query parameters"))?;

    let mut code = None;
    let mut state = None;

    for param in query.split('&') {
        let (key, value) = param.split_once('=').unwrap_or((param, ""));
        let value = urlencoding::decode(value)
            .map(|v| v.into_owned())
            .unwrap_or_default();

        match key {
            "code" => code = Some(value),
            "state" => state = Some(value),
            "error" => return Err(DriveError::auth(format!("OAuth error: {}", value))),
            _ => {}
        }
    }

    let code = code.ok_or_else(|| DriveError::auth("Missing code"))?;
    let state = state.ok_or_else(|| DriveError::auth("Missing state"))?;
    Ok((code, state))
}
