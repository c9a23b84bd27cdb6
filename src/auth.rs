use axum::http::{header, HeaderMap};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::Row;
use thiserror::Error;
use uuid::Uuid;

use crate::store::SetStore;

const AUTH_COOKIE_NAME: &str = "auth_token";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing token")]
    MissingToken,
    #[error("invalid token")]
    InvalidToken,
    #[error("missing JWT_SECRET")]
    MissingSecret,
    #[error("invalid JWT_EXPIRES_IN")]
    InvalidExpiresIn,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("email already registered")]
    EmailTaken,
    #[error("database error: {0}")]
    Database(String),
}

pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = get_cookie(headers, AUTH_COOKIE_NAME) {
        return Some(token);
    }

    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())?;

    auth_header
        .strip_prefix("Bearer ")
        .map(|value| value.to_string())
}

fn get_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    for pair in cookies.split(';') {
        let mut parts = pair.trim().splitn(2, '=');
        if parts.next() == Some(name) {
            return parts.next().map(|value| value.to_string());
        }
    }
    None
}

/// Create an account with a bcrypt-hashed password and return the user
/// together with a signed token.
pub async fn register_user(
    store: &SetStore,
    email: &str,
    password: &str,
    username: &str,
) -> Result<(AuthUser, String), AuthError> {
    let email = email.trim().to_lowercase();

    let existing = sqlx::query(r#"SELECT "id" FROM "users" WHERE "email" = $1"#)
        .bind(&email)
        .fetch_optional(store.pool())
        .await
        .map_err(|err| AuthError::Database(err.to_string()))?;
    if existing.is_some() {
        return Err(AuthError::EmailTaken);
    }

    let password_hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|err| AuthError::Database(err.to_string()))?;
    let user_id = Uuid::new_v4().to_string();
    let created_at = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO "users" ("id", "email", "passwordHash", "username", "createdAt")
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(&user_id)
    .bind(&email)
    .bind(&password_hash)
    .bind(username.trim())
    .bind(created_at)
    .execute(store.pool())
    .await
    .map_err(|err| AuthError::Database(err.to_string()))?;

    let user = AuthUser {
        id: user_id,
        email,
        username: username.trim().to_string(),
        created_at,
    };
    let token = open_session(store, &user.id).await?;
    Ok((user, token))
}

/// Verify credentials and open a new session.
pub async fn login_user(
    store: &SetStore,
    email: &str,
    password: &str,
) -> Result<(AuthUser, String), AuthError> {
    let email = email.trim().to_lowercase();

    let row = sqlx::query(
        r#"
        SELECT "id", "email", "passwordHash", "username", "createdAt"
        FROM "users"
        WHERE "email" = $1
        "#,
    )
    .bind(&email)
    .fetch_optional(store.pool())
    .await
    .map_err(|err| AuthError::Database(err.to_string()))?
    .ok_or(AuthError::InvalidCredentials)?;

    let password_hash: String = row
        .try_get("passwordHash")
        .map_err(|err| AuthError::Database(err.to_string()))?;
    let matches = bcrypt::verify(password, &password_hash)
        .map_err(|err| AuthError::Database(err.to_string()))?;
    if !matches {
        return Err(AuthError::InvalidCredentials);
    }

    let user = AuthUser {
        id: row
            .try_get("id")
            .map_err(|err| AuthError::Database(err.to_string()))?,
        email: row
            .try_get("email")
            .map_err(|err| AuthError::Database(err.to_string()))?,
        username: row
            .try_get("username")
            .map_err(|err| AuthError::Database(err.to_string()))?,
        created_at: row
            .try_get("createdAt")
            .map_err(|err| AuthError::Database(err.to_string()))?,
    };
    let token = open_session(store, &user.id).await?;
    Ok((user, token))
}

async fn open_session(store: &SetStore, user_id: &str) -> Result<String, AuthError> {
    let (token, expires_at) = sign_jwt_for_user(user_id)?;
    let token_hash = hash_token(&token);

    sqlx::query(
        r#"
        INSERT INTO "sessions" ("id", "userId", "token", "expiresAt", "createdAt")
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(&token_hash)
    .bind(expires_at)
    .bind(Utc::now())
    .execute(store.pool())
    .await
    .map_err(|err| AuthError::Database(err.to_string()))?;

    Ok(token)
}

/// Resolve a request token to the authenticated user: signature and claim
/// checks first, then the session row and the user record.
pub async fn verify_request_token(store: &SetStore, token: &str) -> Result<AuthUser, AuthError> {
    let secret = std::env::var("JWT_SECRET").map_err(|_| AuthError::MissingSecret)?;
    let claims = verify_jwt_hs256(token, &secret)?;
    let token_hash = hash_token(token);

    let session_row = sqlx::query(
        r#"
        SELECT "userId", "expiresAt"
        FROM "sessions"
        WHERE "token" = $1
        "#,
    )
    .bind(&token_hash)
    .fetch_optional(store.pool())
    .await
    .map_err(|err| AuthError::Database(err.to_string()))?
    .ok_or(AuthError::InvalidToken)?;

    let session_user_id: String = session_row
        .try_get("userId")
        .map_err(|err| AuthError::Database(err.to_string()))?;
    let session_expires_at: DateTime<Utc> = session_row
        .try_get("expiresAt")
        .map_err(|err| AuthError::Database(err.to_string()))?;

    if session_user_id != claims.user_id || session_expires_at < Utc::now() {
        return Err(AuthError::InvalidToken);
    }

    let user_row = sqlx::query(
        r#"
        SELECT "id", "email", "username", "createdAt"
        FROM "users"
        WHERE "id" = $1
        "#,
    )
    .bind(&claims.user_id)
    .fetch_optional(store.pool())
    .await
    .map_err(|err| AuthError::Database(err.to_string()))?
    .ok_or(AuthError::InvalidToken)?;

    Ok(AuthUser {
        id: user_row
            .try_get("id")
            .map_err(|err| AuthError::Database(err.to_string()))?,
        email: user_row
            .try_get("email")
            .map_err(|err| AuthError::Database(err.to_string()))?,
        username: user_row
            .try_get("username")
            .map_err(|err| AuthError::Database(err.to_string()))?,
        created_at: user_row
            .try_get("createdAt")
            .map_err(|err| AuthError::Database(err.to_string()))?,
    })
}

pub async fn close_session(store: &SetStore, token: &str) -> Result<(), AuthError> {
    let token_hash = hash_token(token);
    sqlx::query(r#"DELETE FROM "sessions" WHERE "token" = $1"#)
        .bind(&token_hash)
        .execute(store.pool())
        .await
        .map_err(|err| AuthError::Database(err.to_string()))?;
    Ok(())
}

#[derive(Debug, Clone)]
struct JwtClaims {
    user_id: String,
}

fn verify_jwt_hs256(token: &str, secret: &str) -> Result<JwtClaims, AuthError> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(AuthError::InvalidToken)?;
    let payload_b64 = parts.next().ok_or(AuthError::InvalidToken)?;
    let sig_b64 = parts.next().ok_or(AuthError::InvalidToken)?;
    if parts.next().is_some() {
        return Err(AuthError::InvalidToken);
    }

    let header_bytes = URL_SAFE_NO_PAD
        .decode(header_b64.as_bytes())
        .map_err(|_| AuthError::InvalidToken)?;
    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload_b64.as_bytes())
        .map_err(|_| AuthError::InvalidToken)?;
    let sig_bytes = URL_SAFE_NO_PAD
        .decode(sig_b64.as_bytes())
        .map_err(|_| AuthError::InvalidToken)?;

    let header_json: serde_json::Value =
        serde_json::from_slice(&header_bytes).map_err(|_| AuthError::InvalidToken)?;
    let alg = header_json
        .get("alg")
        .and_then(|value| value.as_str())
        .ok_or(AuthError::InvalidToken)?;
    if alg != "HS256" {
        return Err(AuthError::InvalidToken);
    }

    type HmacSha256 = Hmac<Sha256>;
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::InvalidToken)?;
    mac.update(format!("{header_b64}.{payload_b64}").as_bytes());
    mac.verify_slice(&sig_bytes)
        .map_err(|_| AuthError::InvalidToken)?;

    let payload_json: serde_json::Value =
        serde_json::from_slice(&payload_bytes).map_err(|_| AuthError::InvalidToken)?;

    let now = Utc::now().timestamp();
    if let Some(exp) = payload_json.get("exp").and_then(|value| value.as_i64()) {
        if now >= exp {
            return Err(AuthError::InvalidToken);
        }
    }
    if let Some(nbf) = payload_json.get("nbf").and_then(|value| value.as_i64()) {
        if now < nbf {
            return Err(AuthError::InvalidToken);
        }
    }

    let user_id = payload_json
        .get("userId")
        .and_then(|value| value.as_str())
        .ok_or(AuthError::InvalidToken)?
        .to_string();

    Ok(JwtClaims { user_id })
}

pub fn sign_jwt_for_user(user_id: &str) -> Result<(String, DateTime<Utc>), AuthError> {
    let secret = std::env::var("JWT_SECRET").map_err(|_| AuthError::MissingSecret)?;
    let expires_in = std::env::var("JWT_EXPIRES_IN").unwrap_or_else(|_| "24h".to_string());

    let expires_in_ms = parse_expires_in_ms(&expires_in)?;

    let issued_at = Utc::now();
    let exp = issued_at
        .checked_add_signed(chrono::Duration::milliseconds(expires_in_ms))
        .ok_or(AuthError::InvalidExpiresIn)?;

    let header_json = serde_json::json!({
        "alg": "HS256",
        "typ": "JWT",
    });
    let payload_json = serde_json::json!({
        "userId": user_id,
        "iat": issued_at.timestamp(),
        "exp": exp.timestamp(),
    });

    let header_b64 = URL_SAFE_NO_PAD
        .encode(serde_json::to_vec(&header_json).map_err(|_| AuthError::InvalidToken)?);
    let payload_b64 = URL_SAFE_NO_PAD
        .encode(serde_json::to_vec(&payload_json).map_err(|_| AuthError::InvalidToken)?);
    let signing_input = format!("{header_b64}.{payload_b64}");

    type HmacSha256 = Hmac<Sha256>;
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::InvalidToken)?;
    mac.update(signing_input.as_bytes());
    let signature = mac.finalize().into_bytes();
    let sig_b64 = URL_SAFE_NO_PAD.encode(signature);

    Ok((format!("{signing_input}.{sig_b64}"), exp))
}

pub fn parse_expires_in_ms(value: &str) -> Result<i64, AuthError> {
    let trimmed = value.trim();
    if trimmed.len() < 2 {
        return Err(AuthError::InvalidExpiresIn);
    }

    let (digits, unit) = trimmed.split_at(trimmed.len() - 1);
    let amount: i64 = digits.parse().map_err(|_| AuthError::InvalidExpiresIn)?;
    if amount <= 0 {
        return Err(AuthError::InvalidExpiresIn);
    }

    match unit {
        "s" => Ok(amount * 1000),
        "m" => Ok(amount * 60 * 1000),
        "h" => Ok(amount * 60 * 60 * 1000),
        "d" => Ok(amount * 24 * 60 * 60 * 1000),
        _ => Err(AuthError::InvalidExpiresIn),
    }
}

fn sha256_hex(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn hash_token(token: &str) -> String {
    sha256_hex(token)
}
