use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use banca_shared::types::UserId;
use banca_shared::validation::is_valid_email;
use banca_store::{Contact, Database, NewContact, User};

use super::{non_blank, parse_id, AppState, JsonBody};
use crate::error::ServerError;

/// A contact together with the profile of the user it points at.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactView {
    #[serde(flatten)]
    contact: Contact,
    contact_user: Option<User>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddContactRequest {
    user_id: Option<UserId>,
    contact_id: Option<UserId>,
    contact_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    user_id: Option<UserId>,
    emails: Option<Vec<String>>,
}

#[derive(Serialize)]
pub struct AddContactResponse {
    message: &'static str,
    contact: ContactView,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    message: &'static str,
    added_contacts: Vec<ContactView>,
}

#[derive(Serialize)]
pub struct DeleteResponse {
    deleted: bool,
}

fn with_user(db: &Database, contact: Contact) -> banca_store::Result<ContactView> {
    let contact_user = db.get_user(contact.contact_id)?;
    Ok(ContactView {
        contact,
        contact_user,
    })
}

pub async fn list_contacts(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<ContactView>>, ServerError> {
    let user_id = UserId(parse_id(&user_id, "user")?);

    let contacts = state
        .store
        .call(move |db| {
            db.list_contacts(user_id)?
                .into_iter()
                .map(|contact| with_user(db, contact))
                .collect::<banca_store::Result<Vec<_>>>()
        })
        .await?;

    Ok(Json(contacts))
}

enum AddOutcome {
    Added(ContactView),
    UnknownUser,
    Duplicate,
}

pub async fn add_contact(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<AddContactRequest>,
) -> Result<(StatusCode, Json<AddContactResponse>), ServerError> {
    let (Some(user_id), Some(contact_id), Some(contact_name)) =
        (req.user_id, req.contact_id, non_blank(req.contact_name))
    else {
        return Err(ServerError::BadRequest(
            "userId, contactId and contactName are required".into(),
        ));
    };
    if user_id == contact_id {
        return Err(ServerError::BadRequest(
            "Cannot add yourself as a contact".into(),
        ));
    }

    let outcome = state
        .store
        .call(move |db| {
            if db.get_user(user_id)?.is_none() || db.get_user(contact_id)?.is_none() {
                return Ok(AddOutcome::UnknownUser);
            }
            if db.contact_exists(user_id, contact_id)? {
                return Ok(AddOutcome::Duplicate);
            }
            let contact = db.create_contact(&NewContact {
                user_id,
                contact_id,
                contact_name: contact_name.trim().to_string(),
            })?;
            with_user(db, contact).map(AddOutcome::Added)
        })
        .await?;

    let contact = match outcome {
        AddOutcome::Added(contact) => contact,
        AddOutcome::UnknownUser => return Err(ServerError::NotFound("User not found".into())),
        AddOutcome::Duplicate => {
            return Err(ServerError::BadRequest("Contact already exists".into()))
        }
    };

    info!(user_id = %user_id, contact_id = %contact_id, "Contact added");

    Ok((
        StatusCode::CREATED,
        Json(AddContactResponse {
            message: "Contact added successfully",
            contact,
        }),
    ))
}

pub async fn delete_contact(
    State(state): State<AppState>,
    Path((user_id, contact_id)): Path<(String, String)>,
) -> Result<Json<DeleteResponse>, ServerError> {
    let user_id = UserId(parse_id(&user_id, "user")?);
    let contact_id = UserId(parse_id(&contact_id, "contact")?);

    let deleted = state
        .store
        .call(move |db| db.delete_contact(user_id, contact_id))
        .await?;

    if !deleted {
        return Err(ServerError::NotFound("Contact not found".into()));
    }
    Ok(Json(DeleteResponse { deleted }))
}

/// Add every registered address from `emails` that is not the caller and
/// not already a contact, named after the user's display name.
pub async fn sync_contacts(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<SyncRequest>,
) -> Result<Json<SyncResponse>, ServerError> {
    let (Some(user_id), Some(emails)) = (req.user_id, req.emails) else {
        return Err(ServerError::BadRequest(
            "User ID and emails array are required".into(),
        ));
    };
    if let Some(bad) = emails.iter().find(|email| !is_valid_email(email.trim())) {
        return Err(ServerError::BadRequest(format!(
            "Invalid email format: {bad}"
        )));
    }

    let added = state
        .store
        .call(move |db| {
            if db.get_user(user_id)?.is_none() {
                return Ok(None);
            }

            let mut added = Vec::new();
            for email in &emails {
                let Some(found) = db.get_user_by_email(email.trim())? else {
                    continue;
                };
                if found.id == user_id || db.contact_exists(user_id, found.id)? {
                    continue;
                }
                let contact = db.create_contact(&NewContact {
                    user_id,
                    contact_id: found.id,
                    contact_name: found.username.clone(),
                })?;
                added.push(ContactView {
                    contact,
                    contact_user: Some(found),
                });
            }
            Ok(Some(added))
        })
        .await?
        .ok_or_else(|| ServerError::NotFound("User not found".into()))?;

    info!(user_id = %user_id, added = added.len(), "Contacts synced");

    Ok(Json(SyncResponse {
        message: "Contacts synced successfully",
        added_contacts: added,
    }))
}
