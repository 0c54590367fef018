//! Append-only audit trail of ticket mutations. Nothing here updates or
//! deletes; rows only ever accumulate.

use diesel::pg::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::{Actor, HistoryAction, TicketPriority, TicketStatus};
use crate::models::{NewTicketHistory, TicketHistory};
use crate::schema::ticket_histories;

/// One mutation's worth of audit data. Fields not touched by the mutation
/// stay `None` and are stored as nulls, never dropped.
#[derive(Debug, Default)]
pub struct Entry {
    pub old_status: Option<TicketStatus>,
    pub new_status: Option<TicketStatus>,
    pub old_priority: Option<TicketPriority>,
    pub new_priority: Option<TicketPriority>,
    pub old_assignee: Option<Uuid>,
    pub new_assignee: Option<Uuid>,
    pub comment: Option<String>,
}

impl Entry {
    pub fn status(old: TicketStatus, new: TicketStatus) -> Self {
        Entry {
            old_status: Some(old),
            new_status: Some(new),
            ..Entry::default()
        }
    }

    pub fn priority(old: TicketPriority, new: TicketPriority) -> Self {
        Entry {
            old_priority: Some(old),
            new_priority: Some(new),
            ..Entry::default()
        }
    }

    pub fn assignment(old: Option<Uuid>, new: Uuid) -> Self {
        Entry {
            old_assignee: old,
            new_assignee: Some(new),
            ..Entry::default()
        }
    }

    pub fn with_comment(mut self, comment: Option<String>) -> Self {
        self.comment = comment;
        self
    }

    /// An assignment that auto-advanced the ticket records both pairs in
    /// the same row: one row per mutation, not per field.
    pub fn with_status(mut self, old: TicketStatus, new: TicketStatus) -> Self {
        self.old_status = Some(old);
        self.new_status = Some(new);
        self
    }
}

pub fn append(
    conn: &mut PgConnection,
    ticket_id: Uuid,
    actor: &Actor,
    action: HistoryAction,
    entry: Entry,
) -> QueryResult<TicketHistory> {
    let row = NewTicketHistory {
        id: Uuid::new_v4(),
        ticket_id,
        action: action.as_str().to_string(),
        old_status: entry.old_status.map(|s| s.as_str().to_string()),
        new_status: entry.new_status.map(|s| s.as_str().to_string()),
        old_priority: entry.old_priority.map(|p| p.as_str().to_string()),
        new_priority: entry.new_priority.map(|p| p.as_str().to_string()),
        old_assignee: entry.old_assignee,
        new_assignee: entry.new_assignee,
        actor_id: actor.id,
        comment: entry.comment,
    };

    diesel::insert_into(ticket_histories::table)
        .values(&row)
        .execute(conn)?;

    ticket_histories::table.find(row.id).first(conn)
}

pub fn for_ticket(conn: &mut PgConnection, ticket_id: Uuid) -> QueryResult<Vec<TicketHistory>> {
    ticket_histories::table
        .filter(ticket_histories::ticket_id.eq(ticket_id))
        .order(ticket_histories::created_at.asc())
        .load(conn)
}
