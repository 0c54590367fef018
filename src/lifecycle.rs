//! The ticket lifecycle engine. Every public operation runs as one
//! transaction covering the ticket mutation, its history row and the
//! notification fan-out; the ticket row is fetched `FOR UPDATE` so
//! concurrent mutations of the same ticket serialize instead of losing
//! updates.

use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

use crate::auth::password;
use crate::chat;
use crate::domain::{Actor, HistoryAction, Role, TicketPriority, TicketStatus};
use crate::error::{AppError, AppResult};
use crate::history::{self, Entry};
use crate::models::{NewTicket, NewTicketFeedback, Ticket, TicketFeedback, User};
use crate::notify::{self, Event};
use crate::reveal::RevealCache;
use crate::schema::{categories, notifications, sub_categories, ticket_feedback, tickets, users};
use crate::token;

#[derive(Debug)]
pub struct CreateTicket {
    pub title: String,
    pub description: String,
    pub category_id: Uuid,
    pub sub_category_id: Option<Uuid>,
    pub priority: Option<TicketPriority>,
    pub anonymous: bool,
}

fn locked_ticket(conn: &mut PgConnection, ticket_id: Uuid) -> AppResult<Ticket> {
    let ticket: Ticket = tickets::table
        .find(ticket_id)
        .for_update()
        .first(conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;
    Ok(ticket)
}

fn locked_active_ticket(conn: &mut PgConnection, ticket_id: Uuid) -> AppResult<Ticket> {
    let ticket = locked_ticket(conn, ticket_id)?;
    if ticket.deleted_at.is_some() {
        return Err(AppError::not_found());
    }
    Ok(ticket)
}

/// Status-transition permission table: admin sets anything; the owning
/// student may only close; everyone else is denied.
pub fn may_change_status(actor: &Actor, owner_id: Option<Uuid>, new_status: TicketStatus) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::Student => owner_id == Some(actor.id) && new_status == TicketStatus::Closed,
        Role::Disposisi => false,
    }
}

fn may_view(actor: &Actor, ticket: &Ticket) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::Student => ticket.owner_id == Some(actor.id),
        Role::Disposisi => ticket.assigned_to == Some(actor.id),
    }
}

/// A state change by one side forces the other side to re-acknowledge:
/// staff actions clear the student flag, student actions the admin flag.
fn clear_opposite_read_flag(
    conn: &mut PgConnection,
    ticket_id: Uuid,
    actor_role: Role,
) -> QueryResult<usize> {
    if actor_role.is_staff() {
        diesel::update(tickets::table.find(ticket_id))
            .set(tickets::read_by_student.eq(false))
            .execute(conn)
    } else {
        diesel::update(tickets::table.find(ticket_id))
            .set(tickets::read_by_admin.eq(false))
            .execute(conn)
    }
}

/// Visibility check without read-marking, for read-only sub-resources
/// (history, feedback, chat listings).
pub fn visible_ticket(conn: &mut PgConnection, actor: &Actor, ticket_id: Uuid) -> AppResult<Ticket> {
    let ticket: Ticket = tickets::table
        .find(ticket_id)
        .first(conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;
    if ticket.deleted_at.is_some() {
        return Err(AppError::not_found());
    }
    if !may_view(actor, &ticket) {
        return Err(AppError::forbidden());
    }
    Ok(ticket)
}

pub fn create(conn: &mut PgConnection, actor: &Actor, payload: CreateTicket) -> AppResult<Ticket> {
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(AppError::validation("title must not be empty"));
    }
    let description = payload.description.trim();
    if description.is_empty() {
        return Err(AppError::validation("description must not be empty"));
    }

    conn.transaction::<Ticket, AppError, _>(|conn| {
        let category_exists = diesel::select(diesel::dsl::exists(
            categories::table.filter(categories::id.eq(payload.category_id)),
        ))
        .get_result::<bool>(conn)?;
        if !category_exists {
            return Err(AppError::validation("category_id references no category"));
        }
        if let Some(sub_id) = payload.sub_category_id {
            let sub_ok = diesel::select(diesel::dsl::exists(
                sub_categories::table
                    .filter(sub_categories::id.eq(sub_id))
                    .filter(sub_categories::category_id.eq(payload.category_id)),
            ))
            .get_result::<bool>(conn)?;
            if !sub_ok {
                return Err(AppError::validation(
                    "sub_category_id does not belong to the category",
                ));
            }
        }

        let token = if payload.anonymous {
            Some(token::generate_unique(conn).map_err(AppError::internal)?)
        } else {
            None
        };

        let new_ticket = NewTicket {
            id: Uuid::new_v4(),
            owner_id: Some(actor.id),
            anonymous: payload.anonymous,
            token,
            title: title.to_string(),
            description: description.to_string(),
            category_id: payload.category_id,
            sub_category_id: payload.sub_category_id,
            status: TicketStatus::Open.as_str().to_string(),
            priority: payload
                .priority
                .unwrap_or(TicketPriority::Medium)
                .as_str()
                .to_string(),
            read_by_admin: actor.role == Role::Admin,
            read_by_student: true,
        };
        diesel::insert_into(tickets::table)
            .values(&new_ticket)
            .execute(conn)?;
        let ticket: Ticket = tickets::table.find(new_ticket.id).first(conn)?;

        history::append(conn, ticket.id, actor, HistoryAction::Create, Entry::default())?;
        notify::dispatch(conn, actor, &ticket, Event::NewTicket)?;

        tracing::info!(
            ticket_id = %ticket.id,
            actor_id = %actor.id,
            anonymous = ticket.anonymous,
            "ticket created"
        );
        Ok(ticket)
    })
}

/// The read-tracking side of viewing a ticket: flips the viewer side's own
/// flag and stamps the viewer's unread notifications for this ticket.
pub fn view(conn: &mut PgConnection, actor: &Actor, ticket_id: Uuid) -> AppResult<Ticket> {
    conn.transaction::<Ticket, AppError, _>(|conn| {
        let ticket = locked_active_ticket(conn, ticket_id)?;
        if !may_view(actor, &ticket) {
            return Err(AppError::forbidden());
        }

        let now = Utc::now().naive_utc();
        match actor.role {
            Role::Admin if !ticket.read_by_admin => {
                diesel::update(tickets::table.find(ticket_id))
                    .set(tickets::read_by_admin.eq(true))
                    .execute(conn)?;
            }
            Role::Student if !ticket.read_by_student => {
                diesel::update(tickets::table.find(ticket_id))
                    .set(tickets::read_by_student.eq(true))
                    .execute(conn)?;
            }
            _ => {}
        }

        diesel::update(
            notifications::table
                .filter(notifications::recipient_id.eq(actor.id))
                .filter(notifications::ticket_id.eq(ticket_id))
                .filter(notifications::read_at.is_null()),
        )
        .set(notifications::read_at.eq(now))
        .execute(conn)?;

        let refreshed = tickets::table.find(ticket_id).first(conn)?;
        Ok(refreshed)
    })
}

pub fn change_status(
    conn: &mut PgConnection,
    actor: &Actor,
    ticket_id: Uuid,
    new_status: TicketStatus,
    comment: Option<String>,
) -> AppResult<Ticket> {
    conn.transaction::<Ticket, AppError, _>(|conn| {
        let ticket = locked_active_ticket(conn, ticket_id)?;
        if !may_change_status(actor, ticket.owner_id, new_status) {
            return Err(AppError::forbidden());
        }
        let old_status = TicketStatus::parse(&ticket.status)
            .ok_or_else(|| AppError::internal(format!("corrupt status {:?}", ticket.status)))?;

        let now = Utc::now().naive_utc();
        diesel::update(tickets::table.find(ticket_id))
            .set((
                tickets::status.eq(new_status.as_str()),
                tickets::updated_at.eq(now),
            ))
            .execute(conn)?;
        clear_opposite_read_flag(conn, ticket_id, actor.role)?;

        history::append(
            conn,
            ticket_id,
            actor,
            HistoryAction::StatusChange,
            Entry::status(old_status, new_status).with_comment(comment.clone()),
        )?;
        if let Some(body) = comment.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            append_feedback_row(conn, actor, ticket_id, body)?;
        }

        chat::post_system_message(
            conn,
            actor,
            ticket_id,
            &format!(
                "Status changed from {} to {}",
                old_status.as_str(),
                new_status.as_str()
            ),
        )?;

        let updated: Ticket = tickets::table.find(ticket_id).first(conn)?;
        notify::dispatch(
            conn,
            actor,
            &updated,
            Event::StatusChange {
                old: old_status,
                new: new_status,
            },
        )?;

        tracing::info!(
            ticket_id = %ticket_id,
            actor_id = %actor.id,
            old = old_status.as_str(),
            new = new_status.as_str(),
            "ticket status changed"
        );
        Ok(updated)
    })
}

pub fn change_priority(
    conn: &mut PgConnection,
    actor: &Actor,
    ticket_id: Uuid,
    new_priority: TicketPriority,
    comment: Option<String>,
) -> AppResult<Ticket> {
    if actor.role != Role::Admin {
        return Err(AppError::forbidden());
    }

    conn.transaction::<Ticket, AppError, _>(|conn| {
        let ticket = locked_active_ticket(conn, ticket_id)?;
        let old_priority = TicketPriority::parse(&ticket.priority)
            .ok_or_else(|| AppError::internal(format!("corrupt priority {:?}", ticket.priority)))?;

        let now = Utc::now().naive_utc();
        diesel::update(tickets::table.find(ticket_id))
            .set((
                tickets::priority.eq(new_priority.as_str()),
                tickets::updated_at.eq(now),
            ))
            .execute(conn)?;
        clear_opposite_read_flag(conn, ticket_id, actor.role)?;

        history::append(
            conn,
            ticket_id,
            actor,
            HistoryAction::PriorityChange,
            Entry::priority(old_priority, new_priority).with_comment(comment.clone()),
        )?;
        if let Some(body) = comment.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            append_feedback_row(conn, actor, ticket_id, body)?;
        }

        let updated: Ticket = tickets::table.find(ticket_id).first(conn)?;
        notify::dispatch(
            conn,
            actor,
            &updated,
            Event::PriorityChange {
                old: old_priority,
                new: new_priority,
            },
        )?;

        tracing::info!(
            ticket_id = %ticket_id,
            actor_id = %actor.id,
            old = old_priority.as_str(),
            new = new_priority.as_str(),
            "ticket priority changed"
        );
        Ok(updated)
    })
}

pub fn assign(
    conn: &mut PgConnection,
    actor: &Actor,
    ticket_id: Uuid,
    assignee_id: Uuid,
    comment: Option<String>,
) -> AppResult<Ticket> {
    if actor.role != Role::Admin {
        return Err(AppError::forbidden());
    }

    conn.transaction::<Ticket, AppError, _>(|conn| {
        let ticket = locked_active_ticket(conn, ticket_id)?;

        let assignee: Option<User> = users::table
            .find(assignee_id)
            .first(conn)
            .optional()?;
        match assignee {
            Some(user) if user.role == Role::Disposisi.as_str() => {}
            Some(_) => {
                return Err(AppError::validation(
                    "assignee must hold the disposisi role",
                ))
            }
            None => return Err(AppError::validation("assignee does not exist")),
        }

        let old_status = TicketStatus::parse(&ticket.status)
            .ok_or_else(|| AppError::internal(format!("corrupt status {:?}", ticket.status)))?;
        // Assigning an untouched ticket moves it into work; the status pair
        // rides in the same history row as the assignment.
        let advance = (old_status == TicketStatus::Open).then_some(TicketStatus::InProgress);

        let now = Utc::now().naive_utc();
        diesel::update(tickets::table.find(ticket_id))
            .set((
                tickets::assigned_to.eq(Some(assignee_id)),
                tickets::status.eq(advance.unwrap_or(old_status).as_str()),
                tickets::updated_at.eq(now),
            ))
            .execute(conn)?;
        clear_opposite_read_flag(conn, ticket_id, actor.role)?;

        let mut entry = Entry::assignment(ticket.assigned_to, assignee_id).with_comment(comment);
        if let Some(new_status) = advance {
            entry = entry.with_status(old_status, new_status);
        }
        history::append(conn, ticket_id, actor, HistoryAction::Assignment, entry)?;

        let updated: Ticket = tickets::table.find(ticket_id).first(conn)?;
        notify::dispatch(
            conn,
            actor,
            &updated,
            Event::Assignment {
                assignee: assignee_id,
            },
        )?;

        tracing::info!(
            ticket_id = %ticket_id,
            actor_id = %actor.id,
            assignee_id = %assignee_id,
            advanced = advance.is_some(),
            "ticket assigned"
        );
        Ok(updated)
    })
}

pub fn add_feedback(
    conn: &mut PgConnection,
    actor: &Actor,
    ticket_id: Uuid,
    body: &str,
) -> AppResult<TicketFeedback> {
    let body = body.trim();
    if body.is_empty() {
        return Err(AppError::validation("feedback body must not be empty"));
    }

    conn.transaction::<TicketFeedback, AppError, _>(|conn| {
        let ticket = locked_active_ticket(conn, ticket_id)?;
        if !may_view(actor, &ticket) {
            return Err(AppError::forbidden());
        }

        let feedback = append_feedback_row(conn, actor, ticket_id, body)?;
        notify::dispatch(conn, actor, &ticket, Event::Feedback)?;
        Ok(feedback)
    })
}

fn append_feedback_row(
    conn: &mut PgConnection,
    actor: &Actor,
    ticket_id: Uuid,
    body: &str,
) -> AppResult<TicketFeedback> {
    let row = NewTicketFeedback {
        id: Uuid::new_v4(),
        ticket_id,
        author_id: actor.id,
        author_role: actor.role.as_str().to_string(),
        body: body.to_string(),
    };
    diesel::insert_into(ticket_feedback::table)
        .values(&row)
        .execute(conn)?;
    let feedback = ticket_feedback::table.find(row.id).first(conn)?;
    Ok(feedback)
}

/// Returns the anonymous token. Admins pass outright; the owner proves
/// their password once per cache TTL; anyone else is refused.
pub fn reveal_token(
    conn: &mut PgConnection,
    reveals: &RevealCache,
    actor: &Actor,
    ticket_id: Uuid,
    supplied_password: Option<&str>,
) -> AppResult<String> {
    let ticket: Ticket = tickets::table
        .find(ticket_id)
        .first(conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;
    if ticket.deleted_at.is_some() {
        return Err(AppError::not_found());
    }

    let token = match (&ticket.token, ticket.anonymous) {
        (Some(token), true) => token.clone(),
        _ => {
            return Err(AppError::invalid_operation(
                "ticket has no anonymous token to reveal",
            ))
        }
    };

    if actor.role == Role::Admin {
        reveals.grant(ticket_id, actor.id);
        return Ok(token);
    }

    if ticket.owner_id != Some(actor.id) {
        return Err(AppError::forbidden());
    }

    if reveals.is_granted(ticket_id, actor.id) {
        return Ok(token);
    }

    let password = supplied_password.ok_or_else(AppError::unauthorized)?;
    let owner: User = users::table.find(actor.id).first(conn)?;
    let valid = password::verify_password(password, &owner.password_hash)
        .map_err(|_| AppError::unauthorized())?;
    if !valid {
        return Err(AppError::unauthorized());
    }

    reveals.grant(ticket_id, actor.id);
    tracing::info!(ticket_id = %ticket_id, actor_id = %actor.id, "anonymous token revealed");
    Ok(token)
}

pub fn soft_delete(conn: &mut PgConnection, actor: &Actor, ticket_id: Uuid) -> AppResult<()> {
    conn.transaction::<(), AppError, _>(|conn| {
        let ticket = locked_active_ticket(conn, ticket_id)?;
        let is_owner = ticket.owner_id == Some(actor.id);
        if actor.role != Role::Admin && !is_owner {
            return Err(AppError::forbidden());
        }

        let now = Utc::now().naive_utc();
        diesel::update(tickets::table.find(ticket_id))
            .set((
                tickets::deleted_at.eq(now),
                tickets::updated_at.eq(now),
            ))
            .execute(conn)?;
        clear_opposite_read_flag(conn, ticket_id, actor.role)?;

        history::append(conn, ticket_id, actor, HistoryAction::Delete, Entry::default())?;
        tracing::info!(ticket_id = %ticket_id, actor_id = %actor.id, "ticket soft-deleted");
        Ok(())
    })
}

pub fn restore(conn: &mut PgConnection, actor: &Actor, ticket_id: Uuid) -> AppResult<Ticket> {
    if actor.role != Role::Admin {
        return Err(AppError::forbidden());
    }

    conn.transaction::<Ticket, AppError, _>(|conn| {
        let ticket = locked_ticket(conn, ticket_id)?;
        if ticket.deleted_at.is_none() {
            return Err(AppError::invalid_operation("ticket is not deleted"));
        }

        let now = Utc::now().naive_utc();
        diesel::update(tickets::table.find(ticket_id))
            .set((
                tickets::deleted_at.eq(None::<chrono::NaiveDateTime>),
                tickets::updated_at.eq(now),
            ))
            .execute(conn)?;
        clear_opposite_read_flag(conn, ticket_id, actor.role)?;

        history::append(conn, ticket_id, actor, HistoryAction::Restore, Entry::default())?;

        let restored = tickets::table.find(ticket_id).first(conn)?;
        tracing::info!(ticket_id = %ticket_id, actor_id = %actor.id, "ticket restored");
        Ok(restored)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_may_set_any_status() {
        let actor = Actor::new(Uuid::new_v4(), Role::Admin);
        for status in [
            TicketStatus::Open,
            TicketStatus::InProgress,
            TicketStatus::Resolved,
            TicketStatus::Closed,
        ] {
            assert!(may_change_status(&actor, Some(Uuid::new_v4()), status));
        }
    }

    #[test]
    fn owning_student_may_only_close() {
        let owner = Uuid::new_v4();
        let actor = Actor::new(owner, Role::Student);
        assert!(may_change_status(&actor, Some(owner), TicketStatus::Closed));
        for status in [
            TicketStatus::Open,
            TicketStatus::InProgress,
            TicketStatus::Resolved,
        ] {
            assert!(!may_change_status(&actor, Some(owner), status));
        }
    }

    #[test]
    fn non_owning_student_is_denied() {
        let actor = Actor::new(Uuid::new_v4(), Role::Student);
        assert!(!may_change_status(
            &actor,
            Some(Uuid::new_v4()),
            TicketStatus::Closed
        ));
        assert!(!may_change_status(&actor, None, TicketStatus::Closed));
    }

    #[test]
    fn disposisi_never_changes_status() {
        let staff = Uuid::new_v4();
        let actor = Actor::new(staff, Role::Disposisi);
        for status in [
            TicketStatus::Open,
            TicketStatus::InProgress,
            TicketStatus::Resolved,
            TicketStatus::Closed,
        ] {
            assert!(!may_change_status(&actor, Some(staff), status));
        }
    }
}
