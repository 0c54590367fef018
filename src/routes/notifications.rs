use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::Notification;
use crate::schema::notifications;
use crate::state::AppState;

#[derive(Serialize)]
pub struct NotificationResponse {
    pub id: Uuid,
    pub sender_id: Option<Uuid>,
    pub ticket_id: Option<Uuid>,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub read_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl From<Notification> for NotificationResponse {
    fn from(row: Notification) -> Self {
        NotificationResponse {
            id: row.id,
            sender_id: row.sender_id,
            ticket_id: row.ticket_id,
            title: row.title,
            message: row.message,
            kind: row.kind,
            read_at: row.read_at,
            created_at: row.created_at,
        }
    }
}

pub async fn list_notifications(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<NotificationResponse>>> {
    let mut conn = state.db()?;

    let rows: Vec<Notification> = notifications::table
        .filter(notifications::recipient_id.eq(user.user_id))
        .order(notifications::created_at.desc())
        .load(&mut conn)?;
    Ok(Json(
        rows.into_iter().map(NotificationResponse::from).collect(),
    ))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(notification_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<NotificationResponse>> {
    let mut conn = state.db()?;

    let row: Notification = notifications::table
        .find(notification_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;
    if row.recipient_id != user.user_id {
        return Err(AppError::forbidden());
    }

    if row.read_at.is_none() {
        diesel::update(notifications::table.find(notification_id))
            .set(notifications::read_at.eq(Utc::now().naive_utc()))
            .execute(&mut conn)?;
    }

    let refreshed: Notification = notifications::table.find(notification_id).first(&mut conn)?;
    Ok(Json(NotificationResponse::from(refreshed)))
}
