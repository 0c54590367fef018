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
use crate::domain::{Actor, Role, TicketPriority, TicketStatus};
use crate::error::{AppError, AppResult};
use crate::history;
use crate::lifecycle::{self, CreateTicket};
use crate::models::{Ticket, TicketFeedback, TicketHistory};
use crate::schema::{ticket_feedback, tickets};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateTicketRequest {
    pub title: String,
    pub description: String,
    pub category_id: Uuid,
    pub sub_category_id: Option<Uuid>,
    pub priority: Option<String>,
    #[serde(default)]
    pub anonymous: bool,
}

#[derive(Serialize)]
pub struct TicketResponse {
    pub id: Uuid,
    /// Hidden from non-admin viewers when the ticket is anonymous. The
    /// reveal endpoint is the only path to the token itself.
    pub owner_id: Option<Uuid>,
    pub anonymous: bool,
    pub title: String,
    pub description: String,
    pub category_id: Uuid,
    pub sub_category_id: Option<Uuid>,
    pub status: String,
    pub priority: String,
    pub assigned_to: Option<Uuid>,
    pub read_by_admin: bool,
    pub read_by_student: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl TicketResponse {
    pub fn for_viewer(ticket: Ticket, viewer: &Actor) -> Self {
        let owner_id = if ticket.anonymous && viewer.role != Role::Admin {
            None
        } else {
            ticket.owner_id
        };
        TicketResponse {
            id: ticket.id,
            owner_id,
            anonymous: ticket.anonymous,
            title: ticket.title,
            description: ticket.description,
            category_id: ticket.category_id,
            sub_category_id: ticket.sub_category_id,
            status: ticket.status,
            priority: ticket.priority,
            assigned_to: ticket.assigned_to,
            read_by_admin: ticket.read_by_admin,
            read_by_student: ticket.read_by_student,
            created_at: ticket.created_at,
            updated_at: ticket.updated_at,
        }
    }
}

#[derive(Serialize)]
pub struct TicketDetailResponse {
    #[serde(flatten)]
    pub ticket: TicketResponse,
    pub unread_chat: bool,
}

pub async fn create_ticket(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateTicketRequest>,
) -> AppResult<(StatusCode, Json<TicketResponse>)> {
    let actor = Actor::from_user(&user)?;
    let priority = payload
        .priority
        .as_deref()
        .map(|value| {
            TicketPriority::parse(value)
                .ok_or_else(|| AppError::validation(format!("unknown priority {value:?}")))
        })
        .transpose()?;

    let mut conn = state.db()?;
    let ticket = lifecycle::create(
        &mut conn,
        &actor,
        CreateTicket {
            title: payload.title,
            description: payload.description,
            category_id: payload.category_id,
            sub_category_id: payload.sub_category_id,
            priority,
            anonymous: payload.anonymous,
        },
    )?;

    Ok((
        StatusCode::CREATED,
        Json(TicketResponse::for_viewer(ticket, &actor)),
    ))
}

pub async fn list_tickets(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<TicketResponse>>> {
    let actor = Actor::from_user(&user)?;
    let mut conn = state.db()?;

    let base = tickets::table
        .filter(tickets::deleted_at.is_null())
        .order(tickets::created_at.desc());
    let rows: Vec<Ticket> = match actor.role {
        Role::Admin => base.load(&mut conn)?,
        Role::Student => base
            .filter(tickets::owner_id.eq(actor.id))
            .load(&mut conn)?,
        Role::Disposisi => base
            .filter(tickets::assigned_to.eq(actor.id))
            .load(&mut conn)?,
    };

    let response = rows
        .into_iter()
        .map(|ticket| TicketResponse::for_viewer(ticket, &actor))
        .collect();
    Ok(Json(response))
}

pub async fn get_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<TicketDetailResponse>> {
    let actor = Actor::from_user(&user)?;
    let mut conn = state.db()?;

    let ticket = lifecycle::view(&mut conn, &actor, ticket_id)?;
    let unread_chat = chat::has_unread(&mut conn, ticket_id, actor.id)?;

    Ok(Json(TicketDetailResponse {
        ticket: TicketResponse::for_viewer(ticket, &actor),
        unread_chat,
    }))
}

#[derive(Deserialize)]
pub struct ChangeStatusRequest {
    pub status: String,
    pub comment: Option<String>,
}

pub async fn change_status(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<ChangeStatusRequest>,
) -> AppResult<Json<TicketResponse>> {
    let actor = Actor::from_user(&user)?;
    let new_status = TicketStatus::parse(&payload.status)
        .ok_or_else(|| AppError::validation(format!("unknown status {:?}", payload.status)))?;

    let mut conn = state.db()?;
    let ticket = lifecycle::change_status(&mut conn, &actor, ticket_id, new_status, payload.comment)?;
    Ok(Json(TicketResponse::for_viewer(ticket, &actor)))
}

#[derive(Deserialize)]
pub struct ChangePriorityRequest {
    pub priority: String,
    pub comment: Option<String>,
}

pub async fn change_priority(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<ChangePriorityRequest>,
) -> AppResult<Json<TicketResponse>> {
    let actor = Actor::from_user(&user)?;
    let new_priority = TicketPriority::parse(&payload.priority)
        .ok_or_else(|| AppError::validation(format!("unknown priority {:?}", payload.priority)))?;

    let mut conn = state.db()?;
    let ticket =
        lifecycle::change_priority(&mut conn, &actor, ticket_id, new_priority, payload.comment)?;
    Ok(Json(TicketResponse::for_viewer(ticket, &actor)))
}

#[derive(Deserialize)]
pub struct AssignTicketRequest {
    pub assignee_id: Uuid,
    pub comment: Option<String>,
}

pub async fn assign_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<AssignTicketRequest>,
) -> AppResult<Json<TicketResponse>> {
    let actor = Actor::from_user(&user)?;
    let mut conn = state.db()?;
    let ticket = lifecycle::assign(
        &mut conn,
        &actor,
        ticket_id,
        payload.assignee_id,
        payload.comment,
    )?;
    Ok(Json(TicketResponse::for_viewer(ticket, &actor)))
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub id: Uuid,
    pub action: String,
    pub old_status: Option<String>,
    pub new_status: Option<String>,
    pub old_priority: Option<String>,
    pub new_priority: Option<String>,
    pub old_assignee: Option<Uuid>,
    pub new_assignee: Option<Uuid>,
    pub actor_id: Uuid,
    pub comment: Option<String>,
    pub created_at: NaiveDateTime,
}

impl From<TicketHistory> for HistoryResponse {
    fn from(row: TicketHistory) -> Self {
        HistoryResponse {
            id: row.id,
            action: row.action,
            old_status: row.old_status,
            new_status: row.new_status,
            old_priority: row.old_priority,
            new_priority: row.new_priority,
            old_assignee: row.old_assignee,
            new_assignee: row.new_assignee,
            actor_id: row.actor_id,
            comment: row.comment,
            created_at: row.created_at,
        }
    }
}

pub async fn list_history(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<HistoryResponse>>> {
    let actor = Actor::from_user(&user)?;
    let mut conn = state.db()?;

    lifecycle::visible_ticket(&mut conn, &actor, ticket_id)?;
    let rows = history::for_ticket(&mut conn, ticket_id)?;
    Ok(Json(rows.into_iter().map(HistoryResponse::from).collect()))
}

#[derive(Deserialize)]
pub struct FeedbackRequest {
    pub body: String,
}

#[derive(Serialize)]
pub struct FeedbackResponse {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author_role: String,
    pub body: String,
    pub created_at: NaiveDateTime,
}

impl From<TicketFeedback> for FeedbackResponse {
    fn from(row: TicketFeedback) -> Self {
        FeedbackResponse {
            id: row.id,
            author_id: row.author_id,
            author_role: row.author_role,
            body: row.body,
            created_at: row.created_at,
        }
    }
}

pub async fn add_feedback(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<FeedbackRequest>,
) -> AppResult<(StatusCode, Json<FeedbackResponse>)> {
    let actor = Actor::from_user(&user)?;
    let mut conn = state.db()?;
    let feedback = lifecycle::add_feedback(&mut conn, &actor, ticket_id, &payload.body)?;
    Ok((StatusCode::CREATED, Json(FeedbackResponse::from(feedback))))
}

pub async fn list_feedback(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<FeedbackResponse>>> {
    let actor = Actor::from_user(&user)?;
    let mut conn = state.db()?;

    lifecycle::visible_ticket(&mut conn, &actor, ticket_id)?;
    let rows: Vec<TicketFeedback> = ticket_feedback::table
        .filter(ticket_feedback::ticket_id.eq(ticket_id))
        .order(ticket_feedback::created_at.asc())
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(FeedbackResponse::from).collect()))
}

#[derive(Deserialize, Default)]
pub struct RevealRequest {
    pub password: Option<String>,
}

#[derive(Serialize)]
pub struct RevealResponse {
    pub token: String,
}

pub async fn reveal_token(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
    user: AuthenticatedUser,
    payload: Option<Json<RevealRequest>>,
) -> AppResult<Json<RevealResponse>> {
    let actor = Actor::from_user(&user)?;
    let payload = payload.map(|Json(body)| body).unwrap_or_default();

    let mut conn = state.db()?;
    let token = lifecycle::reveal_token(
        &mut conn,
        &state.reveals,
        &actor,
        ticket_id,
        payload.password.as_deref(),
    )?;
    Ok(Json(RevealResponse { token }))
}

pub async fn delete_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<StatusCode> {
    let actor = Actor::from_user(&user)?;
    let mut conn = state.db()?;
    lifecycle::soft_delete(&mut conn, &actor, ticket_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn restore_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<TicketResponse>> {
    let actor = Actor::from_user(&user)?;
    let mut conn = state.db()?;
    let ticket = lifecycle::restore(&mut conn, &actor, ticket_id)?;
    Ok(Json(TicketResponse::for_viewer(ticket, &actor)))
}
