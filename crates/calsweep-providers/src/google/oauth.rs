//! OAuth 2.0 authorization code flow with PKCE and a loopback redirect.
//!
//! The flow binds a listener on 127.0.0.1, sends the user's browser to the
//! Google consent page and waits for the redirect carrying the authorization
//! code. The code is then exchanged, together with the PKCE verifier, for an
//! access token and a refresh token.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng as _;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderResult, StoreOperation};

use super::config::OAuthCredentials;
use super::tokens::TokenInfo;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Random bytes in a code verifier, before base64url encoding.
const CODE_VERIFIER_BYTES: usize = 32;

const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

const SUCCESS_PAGE: &str = "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
    <html><body><h1>calsweep is authorized</h1>\
    <p>You can close this window and return to the terminal.</p></body></html>";

const FAILURE_PAGE: &str = "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
    <html><body><h1>Authorization failed</h1>\
    <p>Check the terminal for details.</p></body></html>";

fn auth_error(message: impl Into<String>) -> ProviderError {
    ProviderError::authentication(message).during(StoreOperation::Auth)
}

/// Talks to Google's OAuth endpoints.
#[derive(Debug)]
pub struct OAuthClient {
    credentials: OAuthCredentials,
    http_client: reqwest::Client,
}

impl OAuthClient {
    pub fn new(credentials: OAuthCredentials, timeout: Duration) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::internal("failed to create HTTP client").with_source(e))?;

        Ok(Self {
            credentials,
            http_client,
        })
    }

    /// Runs the interactive flow and returns fresh tokens.
    ///
    /// Fails if no port in `port_range` can be bound, if the user denies
    /// access, if the redirect does not arrive within five minutes or if the
    /// code exchange is rejected.
    pub async fn authorize(
        &self,
        scopes: &[String],
        port_range: (u16, u16),
    ) -> ProviderResult<TokenInfo> {
        let pkce = PkceFlow::new();

        let (listener, port) = bind_loopback(port_range).await?;
        let redirect_uri = format!("http://127.0.0.1:{port}/callback");
        let auth_url = pkce.build_auth_url(&self.credentials.client_id, &redirect_uri, scopes);

        info!("opening browser for Google authorization");
        debug!(url = %auth_url, "authorization URL");
        if let Err(e) = open::that(&auth_url) {
            warn!(error = %e, "could not open a browser");
            eprintln!("\nOpen this URL in your browser to continue:\n\n{auth_url}\n");
        }

        let callback = tokio::time::timeout(CALLBACK_TIMEOUT, wait_for_callback(&listener))
            .await
            .map_err(|_| auth_error("timed out waiting for the authorization redirect"))??;

        if callback.state != pkce.state {
            return Err(auth_error("OAuth state mismatch, refusing the authorization code"));
        }

        info!("exchanging authorization code for tokens");
        let response = self
            .token_request(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("code", callback.code.as_str()),
                ("code_verifier", pkce.verifier.as_str()),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri.as_str()),
            ])
            .await?;

        if response.refresh_token.is_none() {
            warn!("Google returned no refresh token; the next run may need to authorize again");
        }

        Ok(TokenInfo::new(
            response.access_token,
            response.refresh_token,
            response.expires_in,
            scopes.to_vec(),
        ))
    }

    /// Exchanges a refresh token for a new access token and its lifetime.
    pub async fn refresh(&self, refresh_token: &str) -> ProviderResult<(String, Option<i64>)> {
        let response = self
            .token_request(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .await?;

        debug!("refreshed access token");
        Ok((response.access_token, response.expires_in))
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> ProviderResult<TokenResponse> {
        let response = self
            .http_client
            .post(GOOGLE_TOKEN_URL)
            .form(params)
            .send()
            .await
            .map_err(|e| {
                ProviderError::network(format!("token request failed: {e}"))
                    .during(StoreOperation::Auth)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ProviderError::network(format!("failed to read token response: {e}"))
                .during(StoreOperation::Auth)
        })?;

        if !status.is_success() {
            return Err(token_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("invalid token response: {e}"))
                .during(StoreOperation::Auth)
        })
    }
}

/// Error body of the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

fn token_error(status: reqwest::StatusCode, body: &str) -> ProviderError {
    match serde_json::from_str::<TokenErrorBody>(body) {
        Ok(err) if err.error == "invalid_grant" => {
            auth_error("stored authorization was revoked or expired; run 'calsweep auth google --force'")
        }
        Ok(err) => auth_error(format!(
            "token endpoint returned {status}: {}{}",
            err.error,
            err.error_description
                .map(|d| format!(" ({d})"))
                .unwrap_or_default()
        )),
        Err(_) => auth_error(format!("token endpoint returned {status}: {body}")),
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

async fn bind_loopback(port_range: (u16, u16)) -> ProviderResult<(TcpListener, u16)> {
    for port in port_range.0..=port_range.1 {
        if let Ok(listener) = TcpListener::bind(("127.0.0.1", port)).await {
            let port = listener.local_addr().map(|addr| addr.port()).unwrap_or(port);
            debug!(port, "bound OAuth loopback listener");
            return Ok((listener, port));
        }
    }
    Err(ProviderError::configuration(format!(
        "no free port in {}-{} for the OAuth redirect",
        port_range.0, port_range.1
    ))
    .during(StoreOperation::Auth))
}

/// The parameters Google appends to the redirect URI.
#[derive(Debug, PartialEq, Eq)]
struct Callback {
    code: String,
    state: String,
}

/// Accepts connections until one carries the OAuth redirect.
///
/// Unrelated requests (a browser asking for `/favicon.ico`) are dropped.
async fn wait_for_callback(listener: &TcpListener) -> ProviderResult<Callback> {
    loop {
        let (mut stream, peer) = listener.accept().await.map_err(|e| {
            ProviderError::internal(format!("failed to accept redirect connection: {e}"))
                .during(StoreOperation::Auth)
        })?;
        debug!(%peer, "redirect connection");

        let mut request_line = String::new();
        {
            let mut reader = BufReader::new(&mut stream);
            if reader.read_line(&mut request_line).await.is_err() {
                continue;
            }
        }

        let Some(result) = parse_callback(&request_line) else {
            continue;
        };

        let page = if result.is_ok() { SUCCESS_PAGE } else { FAILURE_PAGE };
        if let Err(e) = stream.write_all(page.as_bytes()).await {
            debug!(error = %e, "could not answer the browser");
        }
        let _ = stream.shutdown().await;
        return result;
    }
}

/// Interprets the request line of a redirect, e.g.
/// `GET /callback?code=4/abc&state=xyz HTTP/1.1`.
///
/// Returns `None` for requests that are not the redirect at all.
fn parse_callback(request_line: &str) -> Option<ProviderResult<Callback>> {
    let mut parts = request_line.split_whitespace();
    if parts.next() != Some("GET") {
        return None;
    }
    let target = parts.next()?;
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    if path != "/callback" {
        return None;
    }

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for pair in query.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let value = urlencoding::decode(value)
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| value.to_string());
        match key {
            "code" => code = Some(value),
            "state" => state = Some(value),
            "error" => error = Some(value),
            _ => {}
        }
    }

    Some(match (error, code) {
        (Some(error), _) => Err(auth_error(format!("authorization denied: {error}"))),
        (None, Some(code)) => Ok(Callback {
            code,
            state: state.unwrap_or_default(),
        }),
        (None, None) => Err(auth_error("redirect carried no authorization code")),
    })
}

/// PKCE verifier, challenge and CSRF state for one authorization attempt (RFC 7636).
#[derive(Debug)]
pub struct PkceFlow {
    pub verifier: String,
    /// base64url(SHA-256(verifier)), sent with the authorization request.
    pub challenge: String,
    pub state: String,
}

impl PkceFlow {
    pub fn new() -> Self {
        let verifier = random_token(CODE_VERIFIER_BYTES);
        let challenge = challenge_for(&verifier);
        Self {
            verifier,
            challenge,
            state: random_token(16),
        }
    }

    /// Builds the consent page URL. `access_type=offline` with
    /// `prompt=consent` makes Google issue a refresh token every time.
    pub fn build_auth_url(&self, client_id: &str, redirect_uri: &str, scopes: &[String]) -> String {
        let scope = scopes.join(" ");
        let params = [
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("code_challenge", self.challenge.as_str()),
            ("code_challenge_method", "S256"),
            ("state", self.state.as_str()),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ];
        let query = params
            .iter()
            .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{GOOGLE_AUTH_URL}?{query}")
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rng().fill(bytes.as_mut_slice());
    URL_SAFE_NO_PAD.encode(bytes)
}

fn challenge_for(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}
