use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use lazy_static::lazy_static;
use rand::{rngs::OsRng, Rng};
use regex::Regex;
use time::OffsetDateTime;
use tracing::{error, info, warn};

use crate::{
    auth::{
        dto::{LoginRequest, PublicUser, SignupRequest, TokenResponse},
        jwt::JwtKeys,
        repo_types::User,
    },
    error::AppError,
    storage::{ChatStore, ChatTx, StoreError},
};

const MIN_PASSWORD_LEN: usize = 8;
/// Attempts before giving up on finding a free user id. With 9e9 candidate
/// ids a collision is unlikely until the table holds billions of rows.
const USER_ID_ATTEMPTS: usize = 100;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn hash_password(plain: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("argon2 hash_password: {e}")))
}

pub fn verify_password(plain: &str, hash: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("argon2 parse hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Random 10-digit id, rejection-sampled against existing users.
pub async fn generate_user_id(tx: &mut dyn ChatTx) -> Result<String, AppError> {
    for _ in 0..USER_ID_ATTEMPTS {
        let candidate = rand::thread_rng()
            .gen_range(1_000_000_000u64..=9_999_999_999u64)
            .to_string();
        if !tx.user_id_exists(&candidate).await? {
            return Ok(candidate);
        }
    }
    error!(attempts = USER_ID_ATTEMPTS, "no free user id found");
    Err(AppError::Internal("user id space exhausted".into()))
}

pub async fn signup(store: &dyn ChatStore, mut payload: SignupRequest) -> Result<PublicUser, AppError> {
    payload.email = payload.email.trim().to_lowercase();
    payload.username = payload.username.trim().to_string();

    if payload.username.is_empty() {
        return Err(AppError::BadRequest("Username is required".into()));
    }
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AppError::BadRequest("Invalid email".into()));
    }
    if payload.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest("Password too short".into()));
    }

    let mut tx = store.begin().await?;
    if tx.find_user_by_email(&payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(AppError::BadRequest("Email already registered".into()));
    }

    let user = User {
        id: generate_user_id(tx.as_mut()).await?,
        username: payload.username,
        email: payload.email,
        password_hash: hash_password(&payload.password)?,
        created_at: OffsetDateTime::now_utc(),
    };

    match tx.insert_user(&user).await {
        Ok(()) => {}
        Err(StoreError::Duplicate("email")) => {
            return Err(AppError::BadRequest("Email already registered".into()))
        }
        Err(StoreError::Duplicate("username")) => {
            return Err(AppError::BadRequest("Username already taken".into()))
        }
        Err(e) => return Err(e.into()),
    }
    tx.commit().await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user.into())
}

fn issue_tokens(keys: &JwtKeys, user: User) -> Result<TokenResponse, AppError> {
    let access_token = keys
        .sign_access(&user.id)
        .map_err(|e| AppError::Internal(format!("jwt sign access: {e}")))?;
    let refresh_token = keys
        .sign_refresh(&user.id)
        .map_err(|e| AppError::Internal(format!("jwt sign refresh: {e}")))?;
    Ok(TokenResponse {
        access_token,
        refresh_token,
        token_type: "bearer",
        user: user.into(),
    })
}

pub async fn login(
    store: &dyn ChatStore,
    keys: &JwtKeys,
    payload: LoginRequest,
) -> Result<TokenResponse, AppError> {
    let invalid = || AppError::Unauthorized("Invalid email or password".into());
    let email = payload.email.trim().to_lowercase();

    let mut tx = store.begin().await?;
    let user = match tx.find_user_by_email(&email).await? {
        Some(u) => u,
        None => {
            warn!(%email, "login unknown email");
            return Err(invalid());
        }
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(%email, user_id = %user.id, "login invalid password");
        return Err(invalid());
    }

    info!(user_id = %user.id, "user logged in");
    issue_tokens(keys, user)
}

pub async fn refresh(
    store: &dyn ChatStore,
    keys: &JwtKeys,
    refresh_token: &str,
) -> Result<TokenResponse, AppError> {
    let claims = keys
        .verify_refresh(refresh_token)
        .map_err(|e| AppError::Unauthorized(e.to_string()))?;
    let user = current_user(store, &claims.sub)
        .await
        .map_err(|_| AppError::Unauthorized("User not found".into()))?;
    issue_tokens(keys, user)
}

pub async fn current_user(store: &dyn ChatStore, user_id: &str) -> Result<User, AppError> {
    let mut tx = store.begin().await?;
    tx.find_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}
