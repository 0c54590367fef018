//! Ticket chat: message posting, per-user read tracking and the
//! closed-ticket freeze. Read state is a set per message (`ON CONFLICT DO
//! NOTHING` insert), so concurrent readers never race each other.

use diesel::pg::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::{Actor, Role, TicketStatus};
use crate::error::{AppError, AppResult};
use crate::models::{ChatAttachment, ChatMessage, NewChatAttachment, NewChatMessage,
    NewChatMessageRead, Ticket};
use crate::notify::{self, Event};
use crate::schema::{chat_attachments, chat_message_reads, chat_messages, tickets};

fn active_ticket(conn: &mut PgConnection, ticket_id: Uuid) -> AppResult<Ticket> {
    let ticket: Ticket = tickets::table
        .find(ticket_id)
        .first(conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;
    if ticket.deleted_at.is_some() {
        return Err(AppError::not_found());
    }
    Ok(ticket)
}

fn is_participant(actor: &Actor, ticket: &Ticket) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::Student => ticket.owner_id == Some(actor.id),
        Role::Disposisi => ticket.assigned_to == Some(actor.id),
    }
}

/// Closed tickets are append-only-frozen for chat, for every role.
fn ensure_not_closed(ticket: &Ticket) -> AppResult<()> {
    if ticket.status == TicketStatus::Closed.as_str() {
        return Err(AppError::forbidden());
    }
    Ok(())
}

pub fn post_message(
    conn: &mut PgConnection,
    actor: &Actor,
    ticket_id: Uuid,
    body: &str,
) -> AppResult<ChatMessage> {
    if body.trim().is_empty() {
        return Err(AppError::validation("message body must not be empty"));
    }

    conn.transaction::<ChatMessage, AppError, _>(|conn| {
        let ticket = active_ticket(conn, ticket_id)?;
        if !is_participant(actor, &ticket) {
            return Err(AppError::forbidden());
        }
        ensure_not_closed(&ticket)?;

        let message = insert_message(conn, ticket_id, actor.id, body.trim(), false)?;
        notify::dispatch(conn, actor, &ticket, Event::ChatMessage)?;
        Ok(message)
    })
}

/// Engine-internal system line (status transitions). Bypasses the closed
/// gate and fans out nothing; the caller supplies its own transaction.
pub fn post_system_message(
    conn: &mut PgConnection,
    actor: &Actor,
    ticket_id: Uuid,
    body: &str,
) -> AppResult<ChatMessage> {
    insert_message(conn, ticket_id, actor.id, body, true)
}

fn insert_message(
    conn: &mut PgConnection,
    ticket_id: Uuid,
    author_id: Uuid,
    body: &str,
    is_system: bool,
) -> AppResult<ChatMessage> {
    let new_message = NewChatMessage {
        id: Uuid::new_v4(),
        ticket_id,
        author_id,
        body: body.to_string(),
        is_system,
    };
    diesel::insert_into(chat_messages::table)
        .values(&new_message)
        .execute(conn)?;

    // A message is read by its own sender from the moment it exists.
    diesel::insert_into(chat_message_reads::table)
        .values(&NewChatMessageRead {
            message_id: new_message.id,
            user_id: author_id,
        })
        .on_conflict_do_nothing()
        .execute(conn)?;

    let message = chat_messages::table.find(new_message.id).first(conn)?;
    Ok(message)
}

/// Adds the user to the read set of every listed message. Idempotent:
/// already-read messages are untouched.
pub fn mark_read_messages(
    conn: &mut PgConnection,
    message_ids: &[Uuid],
    user_id: Uuid,
) -> AppResult<usize> {
    if message_ids.is_empty() {
        return Ok(0);
    }
    let rows: Vec<NewChatMessageRead> = message_ids
        .iter()
        .map(|message_id| NewChatMessageRead {
            message_id: *message_id,
            user_id,
        })
        .collect();
    let inserted = diesel::insert_into(chat_message_reads::table)
        .values(&rows)
        .on_conflict_do_nothing()
        .execute(conn)?;
    Ok(inserted)
}

/// Marks every live message on the ticket read for the user.
pub fn mark_ticket_read(
    conn: &mut PgConnection,
    actor: &Actor,
    ticket_id: Uuid,
) -> AppResult<usize> {
    let ticket = active_ticket(conn, ticket_id)?;
    if !is_participant(actor, &ticket) {
        return Err(AppError::forbidden());
    }
    let message_ids: Vec<Uuid> = chat_messages::table
        .filter(chat_messages::ticket_id.eq(ticket_id))
        .filter(chat_messages::deleted_at.is_null())
        .select(chat_messages::id)
        .load(conn)?;
    mark_read_messages(conn, &message_ids, actor.id)
}

/// True iff any live message on the ticket lacks the user's read entry.
pub fn has_unread(conn: &mut PgConnection, ticket_id: Uuid, user_id: Uuid) -> QueryResult<bool> {
    let unread: i64 = chat_messages::table
        .left_join(
            chat_message_reads::table.on(chat_message_reads::message_id
                .eq(chat_messages::id)
                .and(chat_message_reads::user_id.eq(user_id))),
        )
        .filter(chat_messages::ticket_id.eq(ticket_id))
        .filter(chat_messages::deleted_at.is_null())
        .filter(chat_message_reads::user_id.is_null())
        .count()
        .get_result(conn)?;
    Ok(unread > 0)
}

pub fn messages_for_ticket(
    conn: &mut PgConnection,
    actor: &Actor,
    ticket_id: Uuid,
) -> AppResult<Vec<ChatMessage>> {
    let ticket = active_ticket(conn, ticket_id)?;
    if !is_participant(actor, &ticket) {
        return Err(AppError::forbidden());
    }
    let messages = chat_messages::table
        .filter(chat_messages::ticket_id.eq(ticket_id))
        .filter(chat_messages::deleted_at.is_null())
        .order(chat_messages::created_at.asc())
        .load(conn)?;
    Ok(messages)
}

pub fn readers_of(conn: &mut PgConnection, message_id: Uuid) -> QueryResult<Vec<Uuid>> {
    chat_message_reads::table
        .filter(chat_message_reads::message_id.eq(message_id))
        .select(chat_message_reads::user_id)
        .order(chat_message_reads::read_at.asc())
        .load(conn)
}

/// Soft delete. Only the author or an admin, and never on a closed ticket.
pub fn delete_message(
    conn: &mut PgConnection,
    actor: &Actor,
    message_id: Uuid,
) -> AppResult<()> {
    conn.transaction::<(), AppError, _>(|conn| {
        let message: ChatMessage = chat_messages::table
            .find(message_id)
            .first(conn)
            .optional()?
            .ok_or_else(AppError::not_found)?;
        if message.deleted_at.is_some() {
            return Err(AppError::not_found());
        }

        let ticket = active_ticket(conn, message.ticket_id)?;
        ensure_not_closed(&ticket)?;
        if message.author_id != actor.id && actor.role != Role::Admin {
            return Err(AppError::forbidden());
        }

        let now = chrono::Utc::now().naive_utc();
        diesel::update(chat_messages::table.find(message_id))
            .set((
                chat_messages::deleted_at.eq(now),
                chat_messages::updated_at.eq(now),
            ))
            .execute(conn)?;
        Ok(())
    })
}

/// Attachment bookkeeping only; byte storage lives elsewhere.
pub fn add_attachment(
    conn: &mut PgConnection,
    actor: &Actor,
    message_id: Uuid,
    file_name: &str,
    content_type: Option<String>,
) -> AppResult<ChatAttachment> {
    if file_name.trim().is_empty() {
        return Err(AppError::validation("file_name must not be empty"));
    }

    conn.transaction::<ChatAttachment, AppError, _>(|conn| {
        let message: ChatMessage = chat_messages::table
            .find(message_id)
            .first(conn)
            .optional()?
            .ok_or_else(AppError::not_found)?;
        if message.deleted_at.is_some() {
            return Err(AppError::not_found());
        }

        let ticket = active_ticket(conn, message.ticket_id)?;
        ensure_not_closed(&ticket)?;
        if message.author_id != actor.id && actor.role != Role::Admin {
            return Err(AppError::forbidden());
        }

        let new_attachment = NewChatAttachment {
            id: Uuid::new_v4(),
            message_id,
            file_name: file_name.trim().to_string(),
            content_type,
        };
        diesel::insert_into(chat_attachments::table)
            .values(&new_attachment)
            .execute(conn)?;
        let attachment = chat_attachments::table.find(new_attachment.id).first(conn)?;
        Ok(attachment)
    })
}

pub fn delete_attachment(
    conn: &mut PgConnection,
    actor: &Actor,
    attachment_id: Uuid,
) -> AppResult<()> {
    conn.transaction::<(), AppError, _>(|conn| {
        let attachment: ChatAttachment = chat_attachments::table
            .find(attachment_id)
            .first(conn)
            .optional()?
            .ok_or_else(AppError::not_found)?;
        if attachment.deleted_at.is_some() {
            return Err(AppError::not_found());
        }

        let message: ChatMessage = chat_messages::table
            .find(attachment.message_id)
            .first(conn)?;
        let ticket = active_ticket(conn, message.ticket_id)?;
        ensure_not_closed(&ticket)?;
        if message.author_id != actor.id && actor.role != Role::Admin {
            return Err(AppError::forbidden());
        }

        diesel::update(chat_attachments::table.find(attachment_id))
            .set(chat_attachments::deleted_at.eq(chrono::Utc::now().naive_utc()))
            .execute(conn)?;
        Ok(())
    })
}
