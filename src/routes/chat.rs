use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::chat;
use crate::domain::Actor;
use crate::error::AppResult;
use crate::lifecycle;
use crate::models::{ChatAttachment, ChatMessage, ChatMessageRead};
use crate::schema::chat_message_reads;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct PostMessageRequest {
    pub body: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
    pub is_system: bool,
    pub read_by: Vec<Uuid>,
    pub created_at: NaiveDateTime,
}

impl MessageResponse {
    fn new(message: ChatMessage, read_by: Vec<Uuid>) -> Self {
        MessageResponse {
            id: message.id,
            ticket_id: message.ticket_id,
            author_id: message.author_id,
            body: message.body,
            is_system: message.is_system,
            read_by,
            created_at: message.created_at,
        }
    }
}

pub async fn list_messages(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<MessageResponse>>> {
    let actor = Actor::from_user(&user)?;
    let mut conn = state.db()?;

    let messages = chat::messages_for_ticket(&mut conn, &actor, ticket_id)?;
    let message_ids: Vec<Uuid> = messages.iter().map(|m| m.id).collect();
    let reads: Vec<ChatMessageRead> = chat_message_reads::table
        .filter(chat_message_reads::message_id.eq_any(&message_ids))
        .load(&mut conn)?;

    let response = messages
        .into_iter()
        .map(|message| {
            let read_by = reads
                .iter()
                .filter(|read| read.message_id == message.id)
                .map(|read| read.user_id)
                .collect();
            MessageResponse::new(message, read_by)
        })
        .collect();
    Ok(Json(response))
}

pub async fn post_message(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<PostMessageRequest>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    let actor = Actor::from_user(&user)?;
    let mut conn = state.db()?;

    let message = chat::post_message(&mut conn, &actor, ticket_id, &payload.body)?;
    let read_by = chat::readers_of(&mut conn, message.id)?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new(message, read_by)),
    ))
}

#[derive(Serialize)]
pub struct MarkReadResponse {
    pub marked: usize,
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<MarkReadResponse>> {
    let actor = Actor::from_user(&user)?;
    let mut conn = state.db()?;

    let marked = chat::mark_ticket_read(&mut conn, &actor, ticket_id)?;
    Ok(Json(MarkReadResponse { marked }))
}

#[derive(Serialize)]
pub struct UnreadResponse {
    pub unread: bool,
}

pub async fn unread_status(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<UnreadResponse>> {
    let actor = Actor::from_user(&user)?;
    let mut conn = state.db()?;

    lifecycle::visible_ticket(&mut conn, &actor, ticket_id)?;
    let unread = chat::has_unread(&mut conn, ticket_id, actor.id)?;
    Ok(Json(UnreadResponse { unread }))
}

pub async fn delete_message(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<StatusCode> {
    let actor = Actor::from_user(&user)?;
    let mut conn = state.db()?;

    chat::delete_message(&mut conn, &actor, message_id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct AddAttachmentRequest {
    pub file_name: String,
    pub content_type: Option<String>,
}

#[derive(Serialize)]
pub struct AttachmentResponse {
    pub id: Uuid,
    pub message_id: Uuid,
    pub file_name: String,
    pub content_type: Option<String>,
    pub created_at: NaiveDateTime,
}

impl From<ChatAttachment> for AttachmentResponse {
    fn from(attachment: ChatAttachment) -> Self {
        AttachmentResponse {
            id: attachment.id,
            message_id: attachment.message_id,
            file_name: attachment.file_name,
            content_type: attachment.content_type,
            created_at: attachment.created_at,
        }
    }
}

pub async fn add_attachment(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<AddAttachmentRequest>,
) -> AppResult<(StatusCode, Json<AttachmentResponse>)> {
    let actor = Actor::from_user(&user)?;
    let mut conn = state.db()?;

    let attachment = chat::add_attachment(
        &mut conn,
        &actor,
        message_id,
        &payload.file_name,
        payload.content_type,
    )?;
    Ok((
        StatusCode::CREATED,
        Json(AttachmentResponse::from(attachment)),
    ))
}

pub async fn delete_attachment(
    State(state): State<AppState>,
    Path(attachment_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<StatusCode> {
    let actor = Actor::from_user(&user)?;
    let mut conn = state.db()?;

    chat::delete_attachment(&mut conn, &actor, attachment_id)?;
    Ok(StatusCode::NO_CONTENT)
}
