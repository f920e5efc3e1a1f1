use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use banca_shared::types::{ConversationId, Message, UserId};
use banca_store::{Conversation, ConversationSummary};

use super::{parse_id, AppState, JsonBody};
use crate::error::ServerError;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationRequest {
    participant_a: Option<UserId>,
    participant_b: Option<UserId>,
}

#[derive(Serialize)]
pub struct ConversationResponse {
    message: &'static str,
    conversation: Conversation,
}

/// Conversation list of a user, most recently active first.
pub async fn list_conversations(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<ConversationSummary>>, ServerError> {
    let user_id = UserId(parse_id(&user_id, "user")?);

    let summaries = state
        .store
        .call(move |db| db.conversation_summaries(user_id))
        .await?;

    Ok(Json(summaries))
}

pub async fn create_conversation(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreateConversationRequest>,
) -> Result<(StatusCode, Json<ConversationResponse>), ServerError> {
    let (Some(a), Some(b)) = (req.participant_a, req.participant_b) else {
        return Err(ServerError::BadRequest(
            "participantA and participantB are required".into(),
        ));
    };
    if a == b {
        return Err(ServerError::Validation(vec![
            "A conversation needs two different participants".into(),
        ]));
    }

    let result = state
        .store
        .call(move |db| {
            if db.get_user(a)?.is_none() || db.get_user(b)?.is_none() {
                return Ok(None);
            }
            db.find_or_create_conversation(a, b).map(Some)
        })
        .await?;

    let Some((conversation, created)) = result else {
        return Err(ServerError::NotFound("User not found".into()));
    };

    if created {
        info!(conversation_id = %conversation.id, a = %a, b = %b, "Conversation created");
        Ok((
            StatusCode::CREATED,
            Json(ConversationResponse {
                message: "Conversation created successfully",
                conversation,
            }),
        ))
    } else {
        Ok((
            StatusCode::OK,
            Json(ConversationResponse {
                message: "Conversation already exists",
                conversation,
            }),
        ))
    }
}

/// Full history of a conversation, oldest first.
pub async fn list_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Result<Json<Vec<Message>>, ServerError> {
    let conversation_id = ConversationId(parse_id(&conversation_id, "conversation")?);

    let messages = state
        .store
        .call(move |db| db.list_messages(conversation_id))
        .await?;

    Ok(Json(messages))
}
