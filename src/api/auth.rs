// src/api/auth.rs

use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::Error;
use actix_web::{get, post, web, HttpMessage, HttpRequest, HttpResponse};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::task::{Context, Poll};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::db;
use crate::db::billing::CreditReference;
use crate::db::users::TokenPurpose;
use crate::email::{self, Email, EmailError, Mailer};
use crate::error::{ApiError, ApiResult};
use crate::rate_limit::{client_identifier, AUTH_EMAIL_LIMIT};
use crate::security::is_valid_email;
use crate::signature::{random_hex, sha256_hex};
use crate::AppState;

pub const TOKEN_TTL_DAYS: i64 = 30;
pub const MIN_PASSWORD_LEN: usize = 8;
pub const WELCOME_CREDITS: i32 = 10;

const RESET_TOKEN_TTL_HOURS: i64 = 1;
const VERIFY_TOKEN_TTL_HOURS: i64 = 24;

pub const RESET_REQUESTED_MESSAGE: &str =
    "If an account with that email exists, we have sent a password reset link.";
pub const VERIFICATION_SENT_MESSAGE: &str =
    "If an account with that email exists and is not verified, a verification email has been sent.";

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    exp: usize,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user_id: Uuid,
    pub email_verified: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct VerifyEmailQuery {
    pub token: String,
}

fn validate_password(password: &str) -> ApiResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn hash_password(password: &str) -> ApiResult<String> {
    hash(password, DEFAULT_COST).map_err(|e| ApiError::Internal(format!("bcrypt hash: {e}")))
}

#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid data or email taken")
    )
)]
#[post("/auth/register")]
pub async fn register(
    state: web::Data<AppState>,
    payload: web::Json<RegisterRequest>,
) -> ApiResult<HttpResponse> {
    let payload = payload.into_inner();
    let email = payload.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(ApiError::Validation("Invalid email address".into()));
    }
    validate_password(&payload.password)?;

    if db::users::find_by_email(&state.pool, &email).await?.is_some() {
        return Err(ApiError::BadRequest("User already exists".into()));
    }

    let password_hash = hash_password(&payload.password)?;
    let name = payload.name.as_deref().map(str::trim).filter(|n| !n.is_empty());
    let user_id = db::users::create_user(&state.pool, &email, name, &password_hash).await?;

    let mut tx = state.pool.begin().await?;
    let user_ref = user_id.to_string();
    db::billing::grant_credits(
        &mut tx,
        user_id,
        WELCOME_CREDITS,
        "bonus",
        "Welcome bonus - 10 free credits to get started!",
        Some(CreditReference {
            id: &user_ref,
            kind: "signup",
        }),
    )
    .await?;
    tx.commit().await?;

    issue_verification_token(&state, user_id, &email, name).await?;

    log::info!("registered user {user_id}");
    let token = generate_jwt(&state.config.jwt_secret, user_id)?;
    Ok(super::ok(AuthResponse {
        token,
        user_id,
        email_verified: false,
    }))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
#[post("/auth/login")]
pub async fn login(state: web::Data<AppState>, payload: web::Json<LoginRequest>) -> ApiResult<HttpResponse> {
    let email = payload.email.trim().to_lowercase();
    let Some(user) = db::users::find_by_email(&state.pool, &email).await? else {
        return Err(ApiError::InvalidCredentials);
    };

    let matches = verify(&payload.password, &user.password_hash)
        .map_err(|e| ApiError::Internal(format!("bcrypt verify: {e}")))?;
    if !matches {
        return Err(ApiError::InvalidCredentials);
    }

    db::users::touch_login(&state.pool, user.id).await?;
    let token = generate_jwt(&state.config.jwt_secret, user.id)?;
    Ok(super::ok(AuthResponse {
        token,
        user_id: user.id,
        email_verified: user.email_verified,
    }))
}

async fn issue_token(pool: &PgPool, user_id: Uuid, purpose: TokenPurpose, ttl: Duration) -> ApiResult<String> {
    let token = random_hex(32);
    db::users::create_auth_token(pool, user_id, purpose, &sha256_hex(&token), Utc::now() + ttl).await?;
    Ok(token)
}

fn mailer(state: &AppState) -> Mailer<'_> {
    Mailer {
        api_base: state.config.resend_api_base.trim_end_matches('/'),
        api_key: state.config.resend_api_key.as_deref(),
        from: &state.config.email_from,
    }
}

/// Delivery failures are logged and never change the caller's response.
async fn deliver(state: &AppState, message: Email) {
    match email::send_email(&state.http, &mailer(state), &message).await {
        Ok(id) => log::info!("sent \"{}\" as {id}", message.subject),
        Err(EmailError::NotConfigured) => {
            log::warn!("RESEND_API_KEY not set, \"{}\" was not sent", message.subject)
        }
        Err(e) => log::error!("sending \"{}\" failed: {e}", message.subject),
    }
}

fn app_link(state: &AppState, path: &str, token: &str) -> String {
    format!("{}/{path}?token={token}", state.config.app_base_url.trim_end_matches('/'))
}

async fn issue_verification_token(
    state: &AppState,
    user_id: Uuid,
    address: &str,
    name: Option<&str>,
) -> ApiResult<()> {
    let token = issue_token(
        &state.pool,
        user_id,
        TokenPurpose::EmailVerification,
        Duration::hours(VERIFY_TOKEN_TTL_HOURS),
    )
    .await?;
    let link = app_link(state, "verify-email", &token);
    deliver(state, email::verification_email(address, name, &link)).await;
    Ok(())
}

/// Per-address limit for the unauthenticated email endpoints. A rejection is
/// reported to the caller exactly like a success.
fn within_email_limit(state: &AppState, req: &HttpRequest, route: &str, email: &str) -> bool {
    let key = format!("{route}:{}:{email}", client_identifier(req));
    state.rate_limiter.check(&key, AUTH_EMAIL_LIMIT).allowed
}

async fn send_reset_link(state: &AppState, address: &str) -> ApiResult<()> {
    let Some(user) = db::users::find_by_email(&state.pool, address).await? else {
        return Ok(());
    };
    let token = issue_token(
        &state.pool,
        user.id,
        TokenPurpose::PasswordReset,
        Duration::hours(RESET_TOKEN_TTL_HOURS),
    )
    .await?;
    let link = app_link(state, "reset-password", &token);
    deliver(state, email::password_reset_email(address, user.name.as_deref(), &link)).await;
    Ok(())
}

#[utoipa::path(
    post,
    path = "/auth/forgot-password",
    tag = "auth",
    request_body = EmailRequest,
    responses((status = 200, description = "Generic acknowledgement"))
)]
#[post("/auth/forgot-password")]
pub async fn forgot_password(
    req: HttpRequest,
    state: web::Data<AppState>,
    payload: web::Json<EmailRequest>,
) -> HttpResponse {
    let email = payload.email.trim().to_lowercase();
    if is_valid_email(&email) && within_email_limit(&state, &req, "forgot-password", &email) {
        if let Err(e) = send_reset_link(&state, &email).await {
            log::error!("forgot-password failed: {e}");
        }
    }
    super::message(RESET_REQUESTED_MESSAGE)
}

#[utoipa::path(
    post,
    path = "/auth/reset-password",
    tag = "auth",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password updated"),
        (status = 400, description = "Invalid or expired token")
    )
)]
#[post("/auth/reset-password")]
pub async fn reset_password(
    state: web::Data<AppState>,
    payload: web::Json<ResetPasswordRequest>,
) -> ApiResult<HttpResponse> {
    validate_password(&payload.password)?;
    let token_hash = sha256_hex(payload.token.trim());
    let Some(user_id) = db::users::consume_auth_token(&state.pool, TokenPurpose::PasswordReset, &token_hash).await?
    else {
        return Err(ApiError::BadRequest("Invalid or expired reset token".into()));
    };

    let password_hash = hash_password(&payload.password)?;
    db::users::set_password(&state.pool, user_id, &password_hash).await?;
    log::info!("password reset for user {user_id}");
    if let Some(user) = db::users::get_user(&state.pool, user_id).await? {
        deliver(&state, email::password_changed_email(&user.email, user.name.as_deref())).await;
    }
    Ok(super::message("Password has been reset successfully"))
}

async fn resend_verification_for(state: &AppState, email: &str) -> ApiResult<()> {
    match db::users::find_by_email(&state.pool, email).await? {
        Some(user) if !user.email_verified => {
            issue_verification_token(state, user.id, email, user.name.as_deref()).await
        }
        _ => Ok(()),
    }
}

#[utoipa::path(
    post,
    path = "/auth/resend-verification",
    tag = "auth",
    request_body = EmailRequest,
    responses((status = 200, description = "Generic acknowledgement"))
)]
#[post("/auth/resend-verification")]
pub async fn resend_verification(
    req: HttpRequest,
    state: web::Data<AppState>,
    payload: web::Json<EmailRequest>,
) -> HttpResponse {
    let email = payload.email.trim().to_lowercase();
    if is_valid_email(&email) && within_email_limit(&state, &req, "resend-verification", &email) {
        if let Err(e) = resend_verification_for(&state, &email).await {
            log::error!("resend-verification failed: {e}");
        }
    }
    super::message(VERIFICATION_SENT_MESSAGE)
}

#[utoipa::path(
    get,
    path = "/auth/verify-email",
    tag = "auth",
    params(VerifyEmailQuery),
    responses(
        (status = 200, description = "Email verified"),
        (status = 400, description = "Invalid or expired token")
    )
)]
#[get("/auth/verify-email")]
pub async fn verify_email(
    state: web::Data<AppState>,
    query: web::Query<VerifyEmailQuery>,
) -> ApiResult<HttpResponse> {
    let token_hash = sha256_hex(query.token.trim());
    let Some(user_id) =
        db::users::consume_auth_token(&state.pool, TokenPurpose::EmailVerification, &token_hash).await?
    else {
        return Err(ApiError::BadRequest("Invalid or expired verification token".into()));
    };

    db::users::mark_email_verified(&state.pool, user_id).await?;
    Ok(super::message("Email verified successfully"))
}

/// Render creation is closed to accounts that have not verified their email.
pub async fn require_verified_email(pool: &PgPool, user_id: Uuid) -> ApiResult<()> {
    let user = db::users::get_user(pool, user_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    if !user.email_verified {
        return Err(ApiError::Forbidden(
            "Please verify your email address before creating renders".into(),
        ));
    }
    Ok(())
}

pub fn generate_jwt(secret: &str, user_id: Uuid) -> ApiResult<String> {
    let expiration = (Utc::now() + Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize;

    let claims = Claims {
        sub: user_id,
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
    .map_err(|e| ApiError::Internal(format!("jwt encode: {e}")))
}

/// User id carried by a valid, unexpired session token.
pub fn decode_jwt(secret: &str, token: &str) -> Option<Uuid> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims.sub)
}

pub fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Session middleware for `/api`:
/// - reads `Authorization: Bearer <jwt>`
/// - validates the token against `JWT_SECRET`
/// - stores the user's `Uuid` in `req.extensions_mut()`
pub struct JwtMiddleware;

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = JwtMiddlewareInner<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtMiddlewareInner { service }))
    }
}

pub struct JwtMiddlewareInner<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareInner<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let Some(state) = req.app_data::<web::Data<AppState>>() else {
            return Box::pin(async { Err(Error::from(ApiError::Internal("application state missing".into()))) });
        };

        let user_id = bearer_token(req.request()).and_then(|token| decode_jwt(&state.config.jwt_secret, token));

        match user_id {
            Some(user_id) => {
                req.extensions_mut().insert(user_id);
                let fut = self.service.call(req);
                Box::pin(async move { fut.await })
            }
            None => Box::pin(async { Err(Error::from(ApiError::Unauthorized)) }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jwt_round_trips_the_user_id() {
        let user = Uuid::new_v4();
        let token = generate_jwt("secret", user).unwrap();
        assert_eq!(decode_jwt("secret", &token), Some(user));
        assert_eq!(decode_jwt("other-secret", &token), None);
    }

    #[test]
    fn short_passwords_are_rejected() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("long enough").is_ok());
    }
}
