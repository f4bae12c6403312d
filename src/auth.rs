//! Credential provider for the reporting APIs.
//!
//! AdMob is reached with a Google OAuth2 access token obtained from a
//! long-lived refresh token. App Store Connect takes a short-lived ES256 JWT
//! signed with the team's API key.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{required, AdMobConfig};
use crate::error::{check_status, SourceError};

const GOOGLE_AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
pub const ADMOB_SCOPE: &str = "https://www.googleapis.com/auth/admob.readonly";
pub const LOOPBACK_REDIRECT: &str = "http://127.0.0.1";

const APP_STORE_AUDIENCE: &str = "appstoreconnect-v1";
const CLOCK_SKEW_SECS: i64 = 10;
const TOKEN_LIFETIME_MINS: i64 = 10;

#[derive(Deserialize, Debug, Clone)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Exchanges the configured refresh token for a fresh access token.
pub async fn refresh_access_token(
    client: &Client,
    config: &AdMobConfig,
) -> Result<String, SourceError> {
    let client_id = required(&config.client_id, "AD_MOB_CLIENT_ID")?;
    let client_secret = required(&config.client_secret, "AD_MOB_CLIENT_SECRET")?;
    let refresh_token = required(&config.refresh_token, "AD_MOB_REFRESH_TOKEN")?;

    let params = [
        ("grant_type", "refresh_token"),
        ("client_id", client_id),
        ("client_secret", client_secret),
        ("refresh_token", refresh_token),
    ];
    let res = client.post(GOOGLE_TOKEN_ENDPOINT).form(&params).send().await?;
    let token: TokenResponse = check_status(res).await?.json().await?;

    debug!("Google access token refreshed, expires in {:?}s", token.expires_in);

    Ok(token.access_token)
}

/// Consent page URL asking for offline, read-only AdMob access.
pub fn consent_url(client_id: &str) -> Result<Url> {
    let params = [
        ("client_id", client_id),
        ("redirect_uri", LOOPBACK_REDIRECT),
        ("response_type", "code"),
        ("scope", ADMOB_SCOPE),
        ("access_type", "offline"),
        ("prompt", "consent"),
    ];
    Url::parse_with_params(GOOGLE_AUTH_ENDPOINT, &params).context("Invalid consent URL")
}

/// Trades an authorization code from the consent redirect for tokens.
pub async fn exchange_code(
    client: &Client,
    client_id: &str,
    client_secret: &str,
    code: &str,
) -> Result<TokenResponse, SourceError> {
    let params = [
        ("grant_type", "authorization_code"),
        ("client_id", client_id),
        ("client_secret", client_secret),
        ("code", code),
        ("redirect_uri", LOOPBACK_REDIRECT),
    ];
    let res = client.post(GOOGLE_TOKEN_ENDPOINT).form(&params).send().await?;
    Ok(check_status(res).await?.json().await?)
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AppStoreClaims {
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub aud: String,
}

impl AppStoreClaims {
    pub fn new(issuer_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            iss: issuer_id.to_string(),
            iat: now.timestamp() - CLOCK_SKEW_SECS,
            exp: (now + Duration::minutes(TOKEN_LIFETIME_MINS)).timestamp(),
            aud: APP_STORE_AUDIENCE.to_string(),
        }
    }
}

/// Signs an App Store Connect API token valid for ten minutes from `now`.
pub fn sign_app_store_token(
    issuer_id: &str,
    key_id: &str,
    private_key_pem: &str,
    now: DateTime<Utc>,
) -> Result<String> {
    let key = EncodingKey::from_ec_pem(private_key_pem.as_bytes())
        .context("APP_STORE_PRIVATE_KEY is not a valid EC private key")?;

    let mut header = Header::new(Algorithm::ES256);
    header.kid = Some(key_id.to_string());

    let claims = AppStoreClaims::new(issuer_id, now);
    encode(&header, &claims, &key).context("Could not sign App Store token")
}
