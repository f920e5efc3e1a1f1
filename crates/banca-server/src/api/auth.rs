use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use banca_shared::validation::{is_valid_email, validate_password};
use banca_store::{Database, NewUser, User, UserUpdate};

use super::{non_blank, AppState, JsonBody};
use crate::credentials::{code_matches, generate_verification_code, hash_password, verify_password};
use crate::error::ServerError;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    email: Option<String>,
    password: Option<String>,
    username: Option<String>,
    avatar: Option<String>,
    status: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteProfileRequest {
    email: Option<String>,
    code: Option<String>,
    password: Option<String>,
    username: Option<String>,
    avatar: Option<String>,
    status: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize)]
pub struct RequestCodeRequest {
    email: Option<String>,
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    email: Option<String>,
    code: Option<String>,
}

#[derive(Serialize)]
pub struct UserResponse {
    message: &'static str,
    user: User,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeIssuedResponse {
    message: &'static str,
    expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

#[derive(Serialize)]
pub struct VerifyResponse {
    message: &'static str,
    verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<User>,
}

/// A validated sign-up form.
struct Profile {
    email: String,
    password: String,
    username: String,
}

fn validate_profile(
    email: Option<String>,
    password: Option<String>,
    username: Option<String>,
) -> Result<Profile, ServerError> {
    let email = email.unwrap_or_default().trim().to_string();
    let password = password.unwrap_or_default();
    let username = non_blank(username).map(|u| u.trim().to_string());

    let mut errors = Vec::new();
    if !is_valid_email(&email) {
        errors.push("Invalid email format".to_string());
    }
    if let Err(e) = validate_password(&password) {
        errors.push(e);
    }
    if username.is_none() {
        errors.push("Username is required".to_string());
    }

    match username {
        Some(username) if errors.is_empty() => Ok(Profile {
            email,
            password,
            username,
        }),
        _ => Err(ServerError::Validation(errors)),
    }
}

/// Why `submitted` is not accepted as the live code for `email`, if it is
/// not. An expired code is removed on the way.
fn code_rejection(
    db: &Database,
    email: &str,
    submitted: &str,
) -> banca_store::Result<Option<&'static str>> {
    let Some(stored) = db.get_verification_code(email)? else {
        return Ok(Some("No verification code found for this email"));
    };
    if stored.is_expired(Utc::now()) {
        db.delete_verification_code(email)?;
        return Ok(Some("Verification code has expired"));
    }
    if !code_matches(submitted, &stored.code) {
        return Ok(Some("Invalid verification code"));
    }
    Ok(None)
}

pub async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ServerError> {
    let profile = validate_profile(req.email, req.password, req.username)?;
    let new_user = NewUser {
        password_hash: hash_password(&profile.password),
        email: profile.email,
        username: profile.username,
        avatar: non_blank(req.avatar),
        status: non_blank(req.status),
        verified: true,
    };

    let user = state
        .store
        .call(move |db| {
            if db.get_user_by_email(&new_user.email)?.is_some() {
                return Ok(None);
            }
            db.create_user(&new_user).map(Some)
        })
        .await?
        .ok_or_else(|| ServerError::BadRequest("User with this email already exists".into()))?;

    info!(user_id = %user.id, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            message: "Registration successful",
            user,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Json<UserResponse>, ServerError> {
    let (Some(email), Some(password)) = (non_blank(req.email), req.password) else {
        return Err(ServerError::BadRequest(
            "Email and password are required".into(),
        ));
    };
    let email = email.trim().to_string();
    if !is_valid_email(&email) {
        return Err(ServerError::BadRequest("Invalid email format".into()));
    }

    let user = state
        .store
        .call(move |db| db.get_user_by_email(&email))
        .await?
        .filter(|user| verify_password(&password, &user.password_hash))
        .ok_or_else(|| ServerError::Unauthorized("Invalid email or password".into()))?;

    info!(user_id = %user.id, "User logged in");

    Ok(Json(UserResponse {
        message: "Login successful",
        user,
    }))
}

pub async fn request_code(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RequestCodeRequest>,
) -> Result<Json<CodeIssuedResponse>, ServerError> {
    let Some(email) = non_blank(req.email) else {
        return Err(ServerError::BadRequest("Email is required".into()));
    };
    let email = email.trim().to_string();
    if !is_valid_email(&email) {
        return Err(ServerError::BadRequest("Invalid email format".into()));
    }

    let ttl = chrono::Duration::from_std(state.config.verification_code_ttl)
        .map_err(|e| ServerError::Internal(format!("Invalid code lifetime: {e}")))?;
    let expires_at = Utc::now() + ttl;
    let code = generate_verification_code();

    let issued = code.clone();
    state
        .store
        .call(move |db| db.create_verification_code(&email, &issued, expires_at))
        .await?;

    info!(expires_at = %expires_at, "Verification code issued");

    Ok(Json(CodeIssuedResponse {
        message: "Verification code sent",
        expires_at,
        code: state.config.expose_verification_codes.then_some(code),
    }))
}

pub async fn verify(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<VerifyRequest>,
) -> Result<Json<VerifyResponse>, ServerError> {
    let (Some(email), Some(code)) = (non_blank(req.email), non_blank(req.code)) else {
        return Err(ServerError::BadRequest("Email and code are required".into()));
    };
    let email = email.trim().to_string();

    let outcome = state
        .store
        .call(move |db| {
            if let Some(reason) = code_rejection(db, &email, &code)? {
                return Ok(Err(reason));
            }
            // An unregistered email keeps its code for profile completion.
            let Some(user) = db.get_user_by_email(&email)? else {
                return Ok(Ok(None));
            };
            db.delete_verification_code(&email)?;
            let update = UserUpdate {
                verified: Some(true),
                ..UserUpdate::default()
            };
            Ok(Ok(db.update_user(user.id, &update)?))
        })
        .await?;

    let user = outcome.map_err(|reason| ServerError::BadRequest(reason.into()))?;

    Ok(Json(VerifyResponse {
        message: "Email verified successfully",
        verified: true,
        user,
    }))
}

pub async fn complete_profile(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CompleteProfileRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ServerError> {
    let profile = validate_profile(req.email, req.password, req.username)?;
    let Some(code) = non_blank(req.code) else {
        return Err(ServerError::BadRequest("Verification code is required".into()));
    };
    let new_user = NewUser {
        password_hash: hash_password(&profile.password),
        email: profile.email,
        username: profile.username,
        avatar: non_blank(req.avatar),
        status: non_blank(req.status),
        verified: true,
    };

    let outcome = state
        .store
        .call(move |db| {
            if db.get_user_by_email(&new_user.email)?.is_some() {
                return Ok(Err("User with this email already exists"));
            }
            if let Some(reason) = code_rejection(db, &new_user.email, &code)? {
                return Ok(Err(reason));
            }
            db.delete_verification_code(&new_user.email)?;
            Ok(Ok(db.create_user(&new_user)?))
        })
        .await?;

    let user = outcome.map_err(|reason| ServerError::BadRequest(reason.into()))?;

    info!(user_id = %user.id, "Profile completed");

    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            message: "Profile completed successfully",
            user,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::api::test_support::*;

    #[tokio::test]
    async fn test_register_and_login() {
        let state = test_state();
        let id = register(&state, "sara@example.com", "Sara").await;

        let (status, body) = send(
            &state,
            "POST",
            "/api/auth/login",
            Some(json!({"email": "sara@example.com", "password": "password123"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["id"], id);
        assert!(body["user"].get("passwordHash").is_none());

        let (status, body) = send(
            &state,
            "POST",
            "/api/auth/login",
            Some(json!({"email": "sara@example.com", "password": "wrong-password"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid email or password");
    }

    #[tokio::test]
    async fn test_register_validation() {
        let state = test_state();
        let (status, body) = send(
            &state,
            "POST",
            "/api/auth/register",
            Some(json!({"email": "nope", "password": "short", "username": " "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"].as_array().unwrap().len(), 3);

        register(&state, "sara@example.com", "Sara").await;
        let (status, body) = send(
            &state,
            "POST",
            "/api/auth/register",
            Some(json!({
                "email": "sara@example.com",
                "password": "password123",
                "username": "Other Sara"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "User with this email already exists");
    }

    #[tokio::test]
    async fn test_login_requires_fields() {
        let state = test_state();
        let (status, _) = send(&state, "POST", "/api/auth/login", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &state,
            "POST",
            "/api/auth/login",
            Some(json!({"email": "ghost@example.com", "password": "password123"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_code_sign_up_flow() {
        let state = test_state();

        let (status, body) = send(
            &state,
            "POST",
            "/api/auth/request-code",
            Some(json!({"email": "maya@example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let code = body["code"].as_str().unwrap().to_string();
        assert!(body["expiresAt"].is_string());

        let (status, body) = send(
            &state,
            "POST",
            "/api/auth/verify",
            Some(json!({"email": "maya@example.com", "code": "not-it"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid verification code");

        let (status, body) = send(
            &state,
            "POST",
            "/api/auth/verify",
            Some(json!({"email": "maya@example.com", "code": code})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["verified"], true);
        assert!(body.get("user").is_none());

        let (status, body) = send(
            &state,
            "POST",
            "/api/auth/complete-profile",
            Some(json!({
                "email": "maya@example.com",
                "code": code,
                "username": "Maya",
                "password": "password123"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["user"]["verified"], true);
        assert_eq!(body["user"]["username"], "Maya");

        // The code is consumed.
        let (status, body) = send(
            &state,
            "POST",
            "/api/auth/verify",
            Some(json!({"email": "maya@example.com", "code": code})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "No verification code found for this email");
    }

    #[tokio::test]
    async fn test_complete_profile_requires_code() {
        let state = test_state();
        let (status, body) = send(
            &state,
            "POST",
            "/api/auth/complete-profile",
            Some(json!({
                "email": "david@example.com",
                "code": "123456",
                "username": "David",
                "password": "password123"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "No verification code found for this email");
    }

    #[tokio::test]
    async fn test_verify_registered_user_consumes_code() {
        let state = test_state();
        let id = register(&state, "alex@example.com", "Alex").await;

        let (_, body) = send(
            &state,
            "POST",
            "/api/auth/request-code",
            Some(json!({"email": "alex@example.com"})),
        )
        .await;
        let code = body["code"].as_str().unwrap().to_string();

        let (status, body) = send(
            &state,
            "POST",
            "/api/auth/verify",
            Some(json!({"email": "alex@example.com", "code": code})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["id"], id);

        let (status, _) = send(
            &state,
            "POST",
            "/api/auth/verify",
            Some(json!({"email": "alex@example.com", "code": code})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
