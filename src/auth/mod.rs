//! Access/refresh token handling

use crate::config::AuthConfig;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Arbitrary JSON object carried inside a token
pub type TokenData = Map<String, Value>;

const USERNAME_KEY: &str = "username";

/// Claims written by `Auth` itself; token data may not carry them.
pub const RESERVED_CLAIMS: &[&str] = &["token_type", "iat", "exp"];

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token data keys")]
    InvalidTokenDataKeys,

    #[error("Invalid public key")]
    InvalidPublicKey,

    #[error("Missing required data in token")]
    MissingTokenData,

    #[error("Missing {0} in token")]
    MissingClaim(String),

    #[error("Reserved claim {0} in token data")]
    ReservedClaim(String),

    #[error("Invalid token lifetime")]
    InvalidTokenLifetime,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token encoding failed: {0}")]
    Encoding(#[source] jsonwebtoken::errors::Error),
}

/// Token type discriminator, so a refresh token cannot be used as an access
/// token and vice versa where it matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Decoded token: registered claims plus the caller's token data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
    #[serde(flatten)]
    pub data: TokenData,
}

/// Token issuer and validator
#[derive(Clone)]
pub struct Auth {
    config: AuthConfig,
    access_ttl: Duration,
    refresh_ttl: Duration,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Auth")
            .field("token_data_keys", &self.config.token_data_keys)
            .finish_non_exhaustive()
    }
}

impl Auth {
    pub fn new(config: AuthConfig) -> Result<Self, AuthError> {
        if !config.token_data_keys.iter().any(|k| k == USERNAME_KEY)
            || config
                .token_data_keys
                .iter()
                .any(|k| RESERVED_CLAIMS.contains(&k.as_str()))
        {
            return Err(AuthError::InvalidTokenDataKeys);
        }

        let access_ttl = Duration::try_seconds(config.access_token_expire_secs)
            .ok_or(AuthError::InvalidTokenLifetime)?;
        let refresh_ttl = Duration::try_days(config.refresh_token_expire_days)
            .ok_or(AuthError::InvalidTokenLifetime)?;
        for ttl in [access_ttl, refresh_ttl] {
            expiry(Utc::now(), ttl)?;
        }

        Ok(Self {
            access_ttl,
            refresh_ttl,
            encoding_key: EncodingKey::from_secret(config.secret_key.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret_key.as_bytes()),
            config,
        })
    }

    /// A 5 second leeway instead of the default 60 keeps expiry prompt.
    fn strict_validation() -> Validation {
        let mut v = Validation::new(Algorithm::HS256);
        v.leeway = 5;
        v.validate_aud = false;
        v.set_required_spec_claims(&["exp"]);
        v
    }

    pub fn validate_public_key(&self, public_key: &str) -> Result<(), AuthError> {
        if public_key != self.config.public_key {
            return Err(AuthError::InvalidPublicKey);
        }
        Ok(())
    }

    pub fn create_access_token(&self, token_data: TokenData) -> Result<String, AuthError> {
        self.create_token(TokenType::Access, token_data, self.access_ttl)
    }

    pub fn create_refresh_token(&self, token_data: TokenData) -> Result<String, AuthError> {
        self.create_token(TokenType::Refresh, token_data, self.refresh_ttl)
    }

    fn create_token(
        &self,
        token_type: TokenType,
        token_data: TokenData,
        ttl: Duration,
    ) -> Result<String, AuthError> {
        if !self
            .config
            .token_data_keys
            .iter()
            .any(|key| token_data.contains_key(key))
        {
            return Err(AuthError::MissingTokenData);
        }
        if let Some(key) = RESERVED_CLAIMS.iter().find(|key| token_data.contains_key(**key)) {
            return Err(AuthError::ReservedClaim(key.to_string()));
        }

        let now = Utc::now();
        let claims = Claims {
            token_type,
            iat: now.timestamp(),
            exp: expiry(now, ttl)?,
            data: token_data,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(AuthError::Encoding)
    }

    /// Verify signature and expiry, returning the decoded claims.
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &Self::strict_validation())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            })
    }

    /// Issue a new access token carrying the token data of a refresh token.
    pub fn refresh_access_token(&self, refresh_token: &str) -> Result<String, AuthError> {
        let claims = self.validate_token(refresh_token)?;
        if claims.token_type != TokenType::Refresh {
            return Err(AuthError::InvalidToken);
        }

        let mut token_data = TokenData::new();
        for key in &self.config.token_data_keys {
            let value = claims
                .data
                .get(key)
                .ok_or_else(|| AuthError::MissingClaim(key.clone()))?;
            token_data.insert(key.clone(), value.clone());
        }

        self.create_access_token(token_data)
    }

    /// Username of a valid token
    pub fn current_user(&self, token: &str) -> Result<String, AuthError> {
        let claims = self.validate_token(token)?;
        claims
            .data
            .get(USERNAME_KEY)
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| AuthError::MissingClaim(USERNAME_KEY.to_string()))
    }

    pub fn access_token_ttl(&self) -> i64 {
        self.config.access_token_expire_secs
    }
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> Result<i64, AuthError> {
    now.checked_add_signed(ttl)
        .map(|exp| exp.timestamp())
        .ok_or(AuthError::InvalidTokenLifetime)
}
