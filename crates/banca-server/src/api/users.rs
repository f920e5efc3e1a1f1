use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;

use banca_shared::types::UserId;
use banca_store::{User, UserUpdate};

use super::{non_blank, parse_id, AppState, JsonBody};
use crate::error::ServerError;

/// Editable profile fields. Absent or blank fields stay unchanged.
#[derive(Deserialize)]
pub struct UpdateUserRequest {
    username: Option<String>,
    avatar: Option<String>,
    status: Option<String>,
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<User>, ServerError> {
    let id = UserId(parse_id(&id, "user")?);

    state
        .store
        .call(move |db| db.get_user(id))
        .await?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound("User not found".into()))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateUserRequest>,
) -> Result<Json<User>, ServerError> {
    let id = UserId(parse_id(&id, "user")?);
    let update = UserUpdate {
        username: non_blank(req.username).map(|u| u.trim().to_string()),
        avatar: non_blank(req.avatar),
        status: req.status,
        ..UserUpdate::default()
    };

    state
        .store
        .call(move |db| db.update_user(id, &update))
        .await?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound("User not found".into()))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::api::test_support::*;

    #[tokio::test]
    async fn test_get_user() {
        let state = test_state();
        let id = register(&state, "sara@example.com", "Sara").await;

        let (status, body) = send(&state, "GET", &format!("/api/users/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "sara@example.com");
        assert_eq!(body["status"], "Hey, I'm using BancaMessenger!");

        let (status, body) = send(&state, "GET", "/api/users/999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "User not found");

        let (status, body) = send(&state, "GET", "/api/users/abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid user ID");
    }

    #[tokio::test]
    async fn test_update_user() {
        let state = test_state();
        let id = register(&state, "sara@example.com", "Sara").await;

        let (status, body) = send(
            &state,
            "PATCH",
            &format!("/api/users/{id}"),
            Some(json!({"status": "Out hiking", "username": ""})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "Out hiking");
        assert_eq!(body["username"], "Sara");

        let (status, _) = send(
            &state,
            "PATCH",
            "/api/users/999",
            Some(json!({"status": "?"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
