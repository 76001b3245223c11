use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use rand::{Rng, distr::Alphanumeric};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{config::AppConfig, error::AppError, models::Role};

const RANDOM_TOKEN_LEN: usize = 48;

/// Distinguishes the two token families inside the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims
///
/// Payload of an access token. `sid` binds it to a session row so that
/// revoking the session invalidates the token immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id.
    pub sub: Uuid,
    /// Session the token was issued for.
    pub sid: Uuid,
    pub role: Role,
    pub typ: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

/// Payload of a refresh token. `jti` makes every rotated token distinct even
/// when two are issued in the same second.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: Uuid,
    pub sid: Uuid,
    pub jti: Uuid,
    pub typ: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

/// A freshly minted refresh token with the values the session row needs.
#[derive(Debug, Clone)]
pub struct IssuedRefresh {
    pub token: String,
    pub hash: String,
    pub expires_at: DateTime<Utc>,
}

/// TokenService
///
/// Signs and verifies access and refresh JWTs (HS256) with separate secrets.
#[derive(Clone)]
pub struct TokenService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(config.jwt_access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.jwt_access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(config.jwt_refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(config.jwt_refresh_secret.as_bytes()),
            access_ttl: Duration::seconds(config.access_token_ttl_secs),
            refresh_ttl: Duration::seconds(config.refresh_token_ttl_secs),
        }
    }

    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl.num_seconds()
    }

    pub fn issue_access(&self, user_id: Uuid, session_id: Uuid, role: Role) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            sid: session_id,
            role,
            typ: TokenKind::Access,
            iat: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.access_encoding)
            .map_err(|e| AppError::Internal(format!("failed to sign access token: {e}")))
    }

    pub fn issue_refresh(&self, user_id: Uuid, session_id: Uuid) -> Result<IssuedRefresh, AppError> {
        let now = Utc::now();
        let expires_at = now + self.refresh_ttl;
        let claims = RefreshClaims {
            sub: user_id,
            sid: session_id,
            jti: Uuid::new_v4(),
            typ: TokenKind::Refresh,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.refresh_encoding)
            .map_err(|e| AppError::Internal(format!("failed to sign refresh token: {e}")))?;
        Ok(IssuedRefresh {
            hash: hash_token(&token),
            token,
            expires_at,
        })
    }

    pub fn decode_access(&self, token: &str) -> Result<Claims, AppError> {
        let claims = decode::<Claims>(token, &self.access_decoding, &strict_validation())
            .map_err(reject)?
            .claims;
        if claims.typ != TokenKind::Access {
            return Err(AppError::unauthorized("invalid token type"));
        }
        Ok(claims)
    }

    pub fn decode_refresh(&self, token: &str) -> Result<RefreshClaims, AppError> {
        let claims = decode::<RefreshClaims>(token, &self.refresh_decoding, &strict_validation())
            .map_err(reject)?
            .claims;
        if claims.typ != TokenKind::Refresh {
            return Err(AppError::unauthorized("invalid token type"));
        }
        Ok(claims)
    }
}

fn strict_validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.leeway = 0;
    validation
}

fn reject(err: jsonwebtoken::errors::Error) -> AppError {
    match err.kind() {
        ErrorKind::ExpiredSignature => AppError::unauthorized("token expired"),
        _ => AppError::unauthorized("invalid token"),
    }
}

/// Lowercase hex SHA-256 of a bearer secret. Only this digest is persisted.
pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// An unguessable alphanumeric token for emailed links (password reset, invites).
pub fn random_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_TOKEN_LEN)
        .map(char::from)
        .collect()
}
