//! Credential loading and access-token management for Google Drive.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use oauth2::{basic::BasicClient, ClientId, ClientSecret, RefreshToken, TokenResponse, TokenUrl};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::RwLock;

use driveup_common::{Error, Result, Secret};

/// OAuth2 token endpoint.
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
/// Drive scope limited to files created by this application.
const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";
/// Grant type for exchanging a signed service-account assertion.
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
/// Lifetime of a signed assertion (Google's maximum).
const ASSERTION_LIFETIME_SECS: i64 = 3600;

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URL.to_string()
}

/// Service account key as found in a downloaded credential file.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: Secret,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

impl ServiceAccountKey {
    fn encoding_key(&self) -> Result<EncodingKey> {
        EncodingKey::from_rsa_pem(self.private_key.expose().as_bytes())
            .map_err(|e| Error::Config(format!("Invalid service account private key: {}", e)))
    }

    /// Sign a JWT-bearer assertion issued at `now`.
    pub fn assertion(&self, now: DateTime<Utc>) -> Result<String> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();

        let iat = now.timestamp();
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: DRIVE_SCOPE,
            aud: &self.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        encode(&header, &claims, &self.encoding_key()?)
            .map_err(|e| Error::Authentication(format!("Failed to sign assertion: {}", e)))
    }
}

/// User credentials holding a long-lived refresh token.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizedUser {
    pub client_id: String,
    pub client_secret: Secret,
    pub refresh_token: Secret,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

/// Google credential file contents, tagged by its `type` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credentials {
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUser),
}

impl Credentials {
    /// Load and validate a credential file.
    ///
    /// Reads the local file only; no token is requested.
    ///
    /// # Errors
    /// - File unreadable or not a supported credential type
    /// - Private key or token URL malformed
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read credentials {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    /// Parse and validate credential JSON.
    pub fn from_json(raw: &str) -> Result<Self> {
        let credentials: Self = serde_json::from_str(raw)
            .map_err(|e| Error::Config(format!("Unsupported credential file: {}", e)))?;
        credentials.validate()?;
        Ok(credentials)
    }

    fn validate(&self) -> Result<()> {
        match self {
            Credentials::ServiceAccount(key) => {
                key.encoding_key()?;
                token_url(&key.token_uri)?;
            }
            Credentials::AuthorizedUser(user) => {
                if user.refresh_token.is_empty() {
                    return Err(Error::Config("refresh_token cannot be empty".to_string()));
                }
                token_url(&user.token_uri)?;
            }
        }
        Ok(())
    }

    /// Identity the credentials act as, for logging.
    pub fn principal(&self) -> &str {
        match self {
            Credentials::ServiceAccount(key) => &key.client_email,
            Credentials::AuthorizedUser(user) => &user.client_id,
        }
    }
}

fn token_url(uri: &str) -> Result<TokenUrl> {
    TokenUrl::new(uri.to_string())
        .map_err(|e| Error::Config(format!("Invalid token URL {}: {}", uri, e)))
}

/// Bearer token with expiration tracking.
#[derive(Clone)]
pub struct AccessToken {
    pub secret: Secret,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn expiring_in(secret: String, expires_in: std::time::Duration) -> Self {
        let expires_in = Duration::from_std(expires_in).unwrap_or_else(|_| Duration::hours(1));
        Self {
            secret: Secret::new(secret),
            expires_at: Utc::now() + expires_in,
        }
    }

    /// Check if the token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        // Less than 5 minutes remaining counts as expired
        self.expires_at < Utc::now() + Duration::minutes(5)
    }
}

#[derive(Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Hands out access tokens, requesting a new one when the cached token
/// is close to expiry.
pub struct TokenManager {
    credentials: Credentials,
    http: reqwest::Client,
    token: RwLock<Option<AccessToken>>,
}

impl TokenManager {
    /// Create a token manager. No token is requested until first use.
    pub fn new(credentials: Credentials, http: reqwest::Client) -> Self {
        Self {
            credentials,
            http,
            token: RwLock::new(None),
        }
    }

    /// Create a token manager seeded with an existing token.
    #[cfg(test)]
    pub(crate) fn with_token(credentials: Credentials, http: reqwest::Client, token: AccessToken) -> Self {
        Self {
            credentials,
            http,
            token: RwLock::new(Some(token)),
        }
    }

    /// Credentials this manager signs requests with.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Get a valid access token, requesting a new one if necessary.
    ///
    /// # Errors
    /// - Token endpoint rejected the credentials
    /// - Network errors
    pub async fn access_token(&self) -> Result<String> {
        {
            let token = self.token.read().await;
            if let Some(token) = token.as_ref().filter(|t| !t.is_expired()) {
                return Ok(token.secret.expose().to_string());
            }
        }

        let mut token = self.token.write().await;

        // Double-check after acquiring write lock
        if let Some(current) = token.as_ref().filter(|t| !t.is_expired()) {
            return Ok(current.secret.expose().to_string());
        }

        tracing::info!("Requesting access token for {}", self.credentials.principal());

        let fresh = match &self.credentials {
            Credentials::ServiceAccount(key) => self.exchange_assertion(key).await?,
            Credentials::AuthorizedUser(user) => self.refresh_user_token(user).await?,
        };
        let value = fresh.secret.expose().to_string();
        *token = Some(fresh);

        Ok(value)
    }

    async fn exchange_assertion(&self, key: &ServiceAccountKey) -> Result<AccessToken> {
        let assertion = key.assertion(Utc::now())?;

        let response = self
            .http
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| Error::Network(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Authentication(format!(
                "Token exchange failed: {} - {}",
                status, body
            )));
        }

        let body: TokenEndpointResponse = response
            .json()
            .await
            .map_err(|e| Error::Network(format!("Failed to parse token response: {}", e)))?;

        let expires_in = std::time::Duration::from_secs(body.expires_in.unwrap_or(3600));
        Ok(AccessToken::expiring_in(body.access_token, expires_in))
    }

    async fn refresh_user_token(&self, user: &AuthorizedUser) -> Result<AccessToken> {
        let client = BasicClient::new(ClientId::new(user.client_id.clone()))
            .set_client_secret(ClientSecret::new(user.client_secret.expose().to_string()))
            .set_token_uri(token_url(&user.token_uri)?);

        // Token endpoints must not be followed through redirects
        let http = oauth2::reqwest::ClientBuilder::new()
            .redirect(oauth2::reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::Network(format!("Failed to build OAuth2 client: {}", e)))?;

        let token_result = client
            .exchange_refresh_token(&RefreshToken::new(user.refresh_token.expose().to_string()))
            .request_async(&http)
            .await
            .map_err(|e| Error::Authentication(format!("Token refresh failed: {}", e)))?;

        let expires_in = token_result
            .expires_in()
            .unwrap_or_else(|| std::time::Duration::from_secs(3600));

        Ok(AccessToken::expiring_in(
            token_result.access_token().secret().clone(),
            expires_in,
        ))
    }
}
