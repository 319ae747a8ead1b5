use std::fs;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::Query;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use oauth2::basic::BasicClient;
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use yt_upload::expand_tilde;

/// Both scopes must be granted or uploads fail later with an opaque
/// permission error, so the consent flow re-prompts until they are.
pub const REQUIRED_SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/youtube",
    "https://www.googleapis.com/auth/youtube.upload",
];

const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const TOKENINFO_ENDPOINT: &str = "https://oauth2.googleapis.com/tokeninfo";
pub const CALLBACK_PATH: &str = "/oauth2callback";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("could not bind the OAuth callback listener on port {port} (is another instance still running?): {source}")]
    ListenerBind { port: u16, source: io::Error },

    #[error("authorization code exchange failed: {0}")]
    Exchange(String),

    #[error("token response did not include a refresh token")]
    MissingRefreshToken,

    #[error("token endpoint rejected the refresh token: {0}")]
    Refresh(String),

    #[error(transparent)]
    InvalidUrl(#[from] url::ParseError),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// The access token lives only for this process; the refresh token is the
/// durable half and is handed back to the caller for persistence.
#[derive(Debug)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OAuthConfig {
    client_id: String,
    client_secret: String,
}

pub fn load_oauth_config(path: &str) -> anyhow::Result<OAuthConfig> {
    let expanded = expand_tilde(path);
    let content = fs::read_to_string(&expanded)
        .with_context(|| format!("failed to read OAuth config from '{expanded}'"))?;
    let config = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse OAuth config '{expanded}'"))?;
    Ok(config)
}

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
}

#[derive(Debug)]
enum CallbackOutcome {
    Code(String),
    Denied(String),
}

pub struct Authenticator {
    http: Client,
    oauth: BasicClient,
    client_id: String,
    client_secret: String,
    token_endpoint: String,
    tokeninfo_endpoint: String,
    callback_port: u16,
}

impl Authenticator {
    pub fn new(config: &OAuthConfig, callback_port: u16) -> Result<Self, AuthError> {
        let redirect_uri = format!("http://localhost:{callback_port}{CALLBACK_PATH}");
        let oauth = BasicClient::new(
            ClientId::new(config.client_id.clone()),
            Some(ClientSecret::new(config.client_secret.clone())),
            AuthUrl::new(AUTH_ENDPOINT.to_string())?,
            Some(TokenUrl::new(TOKEN_ENDPOINT.to_string())?),
        )
        .set_redirect_uri(RedirectUrl::new(redirect_uri)?);

        Ok(Self {
            http: Client::new(),
            oauth,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            token_endpoint: TOKEN_ENDPOINT.to_string(),
            tokeninfo_endpoint: TOKENINFO_ENDPOINT.to_string(),
            callback_port,
        })
    }

    /// Returns an authorized credential, silently reusing the stored refresh
    /// token when the token endpoint still accepts it and falling back to the
    /// interactive consent flow otherwise. Network failures during the silent
    /// check also fall through to consent rather than aborting the run.
    pub async fn ensure_authorized(&self, stored: Option<&str>) -> Result<Credential, AuthError> {
        if let Some(refresh_token) = stored {
            match self.refresh_access_token(refresh_token).await {
                Ok(access_token) => {
                    log::info!("stored refresh token accepted");
                    return Ok(Credential {
                        access_token,
                        refresh_token: refresh_token.to_string(),
                    });
                }
                Err(err) => {
                    log::warn!("silent refresh failed, starting consent flow: {err}");
                }
            }
        }
        self.authorize().await
    }

    /// Interactive authorization-code flow. Blocks on user action and loops
    /// until a token pair with both required scopes is obtained; only code
    /// exchange and listener failures are fatal.
    pub async fn authorize(&self) -> Result<Credential, AuthError> {
        println!("This tool needs permission to upload videos to your YouTube channel.");
        println!("A browser window will open so you can grant access.");
        print!("Press Enter to continue... ");
        io::stdout().flush()?;
        let mut ack = String::new();
        io::stdin().read_line(&mut ack)?;

        loop {
            let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
            let (auth_url, _csrf_token) = self
                .oauth
                .authorize_url(CsrfToken::new_random)
                .add_scope(Scope::new(REQUIRED_SCOPES[0].to_string()))
                .add_scope(Scope::new(REQUIRED_SCOPES[1].to_string()))
                // offline + consent forces a refresh token even on repeat grants
                .add_extra_param("access_type", "offline")
                .add_extra_param("prompt", "consent")
                .set_pkce_challenge(pkce_challenge)
                .url();

            if webbrowser::open(auth_url.as_str()).is_err() {
                println!("Could not open a browser. Visit this URL to authorize:");
                println!("{auth_url}");
            }
            println!("Waiting for authorization in the browser...");

            let code = match self.wait_for_callback().await? {
                CallbackOutcome::Code(code) => code,
                CallbackOutcome::Denied(reason) => {
                    eprintln!("Authorization was cancelled ({reason}).");
                    println!("Please approve access in the browser to continue.");
                    continue;
                }
            };

            let credential = self.exchange_code(code, pkce_verifier).await?;

            match self.granted_scopes(&credential.access_token).await {
                Ok(granted) if has_required_scopes(&granted) => return Ok(credential),
                Ok(_) => {
                    println!("Both the channel and upload permissions are required.");
                    println!("Please check every box on the consent screen.");
                    continue;
                }
                Err(err) => {
                    // soft-fail: a flaky tokeninfo lookup must not block the upload
                    log::warn!("scope validation skipped, tokeninfo lookup failed: {err}");
                    return Ok(credential);
                }
            }
        }
    }

    async fn exchange_code(
        &self,
        code: String,
        verifier: PkceCodeVerifier,
    ) -> Result<Credential, AuthError> {
        let token = self
            .oauth
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(verifier)
            .request_async(async_http_client)
            .await
            .map_err(|err| AuthError::Exchange(err.to_string()))?;

        let refresh_token = token
            .refresh_token()
            .map(|t| t.secret().clone())
            .ok_or(AuthError::MissingRefreshToken)?;

        Ok(Credential {
            access_token: token.access_token().secret().clone(),
            refresh_token,
        })
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<String, AuthError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let response = self
            .http
            .post(&self.token_endpoint)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuthError::Refresh(response.text().await.unwrap_or_default()));
        }

        let body: serde_json::Value = response.json().await?;
        body["access_token"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AuthError::Refresh("no access token in response".to_string()))
    }

    async fn granted_scopes(&self, access_token: &str) -> Result<Vec<String>, AuthError> {
        #[derive(Deserialize)]
        struct TokenInfo {
            #[serde(default)]
            scope: String,
        }

        let info: TokenInfo = self
            .http
            .get(&self.tokeninfo_endpoint)
            .query(&[("access_token", access_token)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(info.scope.split_whitespace().map(str::to_string).collect())
    }

    /// Serves exactly one authorization callback on the local port, answers it
    /// with a small HTML page, then tears the listener down. Later hits find
    /// the port closed.
    async fn wait_for_callback(&self) -> Result<CallbackOutcome, AuthError> {
        let outcome = Arc::new(Mutex::new(None::<CallbackOutcome>));
        let outcome_writer = outcome.clone();

        let handler = move |Query(params): Query<CallbackParams>| async move {
            let mut slot = outcome_writer.lock().await;
            if slot.is_some() {
                return Html("<html><body><p>You can close this window.</p></body></html>");
            }
            if let Some(error) = params.error {
                *slot = Some(CallbackOutcome::Denied(error));
                return Html(
                    "<html><body><h1>Authorization cancelled</h1>\
                     <p>You can close this window.</p></body></html>",
                );
            }
            match params.code {
                Some(code) => {
                    *slot = Some(CallbackOutcome::Code(code));
                    Html(
                        "<html><body><h1>Authorization complete</h1>\
                         <p>You can close this window and return to the terminal.</p></body></html>",
                    )
                }
                None => Html("<html><body><h1>Authorization failed</h1><p>No code received.</p></body></html>"),
            }
        };

        let app = Router::new().route(CALLBACK_PATH, get(handler));
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", self.callback_port))
            .await
            .map_err(|source| AuthError::ListenerBind {
                port: self.callback_port,
                source,
            })?;
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        let outcome = loop {
            if let Some(outcome) = outcome.lock().await.take() {
                break outcome;
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        };

        // give the in-flight response a moment to flush before the abort
        tokio::time::sleep(Duration::from_millis(100)).await;
        server.abort();

        Ok(outcome)
    }
}

fn has_required_scopes(granted: &[String]) -> bool {
    REQUIRED_SCOPES
        .iter()
        .all(|required| granted.iter().any(|scope| scope == required))
}
