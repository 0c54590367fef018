//! Rule-based notification fan-out. `recipients` is a pure decision table
//! over (event kind, actor role); the insert step runs inside the caller's
//! transaction so notifications commit or roll back with the mutation that
//! caused them.

use diesel::pg::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::{Actor, NotificationKind, Role, TicketPriority, TicketStatus};
use crate::models::{NewNotification, Ticket};
use crate::schema::{notifications, users};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    NewTicket,
    StatusChange {
        old: TicketStatus,
        new: TicketStatus,
    },
    PriorityChange {
        old: TicketPriority,
        new: TicketPriority,
    },
    Assignment {
        assignee: Uuid,
    },
    Feedback,
    ChatMessage,
}

impl Event {
    pub fn kind(&self) -> NotificationKind {
        match self {
            Event::NewTicket => NotificationKind::NewTicket,
            Event::StatusChange { .. } => NotificationKind::StatusChange,
            Event::PriorityChange { .. } => NotificationKind::PriorityChange,
            Event::Assignment { .. } => NotificationKind::Assignment,
            Event::Feedback => NotificationKind::Feedback,
            Event::ChatMessage => NotificationKind::ChatMessage,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recipient {
    pub user_id: Uuid,
    pub role: Role,
}

/// The parties a ticket event can reach. Missing parties (no assignee, no
/// admins registered) simply shrink the recipient set; that is never an
/// error.
#[derive(Debug, Clone, Default)]
pub struct FanoutContext {
    pub owner: Option<Uuid>,
    pub assignee: Option<Uuid>,
    pub admins: Vec<Uuid>,
}

impl FanoutContext {
    pub fn load(conn: &mut PgConnection, ticket: &Ticket) -> QueryResult<Self> {
        let admins: Vec<Uuid> = users::table
            .filter(users::role.eq(Role::Admin.as_str()))
            .select(users::id)
            .load(conn)?;
        Ok(FanoutContext {
            owner: ticket.owner_id,
            assignee: ticket.assigned_to,
            admins,
        })
    }
}

/// The §4.2 role matrix, one arm per (event, actor role) cell. Combinations
/// the lifecycle engine never produces resolve to an empty set rather than
/// an error, so the table stays total.
pub fn recipients(kind: NotificationKind, actor: &Actor, ctx: &FanoutContext) -> Vec<Recipient> {
    let owner = ctx.owner.map(|id| Recipient {
        user_id: id,
        role: Role::Student,
    });
    let assignee = ctx.assignee.map(|id| Recipient {
        user_id: id,
        role: Role::Disposisi,
    });
    let admins = || {
        ctx.admins.iter().map(|id| Recipient {
            user_id: *id,
            role: Role::Admin,
        })
    };

    let mut out: Vec<Recipient> = Vec::new();
    match (kind, actor.role) {
        (NotificationKind::NewTicket, Role::Student) => out.extend(admins()),

        (NotificationKind::StatusChange, Role::Student)
        | (NotificationKind::ChatMessage, Role::Student) => {
            out.extend(admins());
            out.extend(assignee);
        }
        (NotificationKind::StatusChange, Role::Disposisi)
        | (NotificationKind::ChatMessage, Role::Disposisi) => {
            out.extend(owner);
            out.extend(admins());
        }
        (NotificationKind::StatusChange, Role::Admin)
        | (NotificationKind::ChatMessage, Role::Admin) => {
            out.extend(owner);
            out.extend(assignee);
        }

        (NotificationKind::PriorityChange, Role::Admin) => out.extend(owner),

        (NotificationKind::Assignment, Role::Admin) => {
            out.extend(assignee);
            out.extend(owner);
        }

        (NotificationKind::Feedback, Role::Student) => {
            out.extend(admins());
            out.extend(assignee);
        }
        (NotificationKind::Feedback, Role::Disposisi)
        | (NotificationKind::Feedback, Role::Admin) => out.extend(owner),

        _ => {}
    }

    out.retain(|r| r.user_id != actor.id);
    let mut seen = Vec::with_capacity(out.len());
    out.retain(|r| {
        if seen.contains(&r.user_id) {
            false
        } else {
            seen.push(r.user_id);
            true
        }
    });
    out
}

fn template(event: &Event, ticket: &Ticket) -> (String, String) {
    match event {
        Event::NewTicket => (
            "New ticket".to_string(),
            format!("A new ticket \"{}\" has been submitted", ticket.title),
        ),
        Event::StatusChange { old, new } => (
            "Ticket status updated".to_string(),
            format!(
                "Ticket \"{}\" moved from {} to {}",
                ticket.title,
                old.as_str(),
                new.as_str()
            ),
        ),
        Event::PriorityChange { old, new } => (
            "Ticket priority updated".to_string(),
            format!(
                "Ticket \"{}\" priority changed from {} to {}",
                ticket.title,
                old.as_str(),
                new.as_str()
            ),
        ),
        Event::Assignment { .. } => (
            "Ticket assigned".to_string(),
            format!("Ticket \"{}\" has been assigned", ticket.title),
        ),
        Event::Feedback => (
            "New feedback".to_string(),
            format!("Ticket \"{}\" received feedback", ticket.title),
        ),
        Event::ChatMessage => (
            "New chat message".to_string(),
            format!("Ticket \"{}\" has a new chat message", ticket.title),
        ),
    }
}

/// Computes the recipient set and inserts one notification per recipient.
/// Returns how many were created; zero is a valid outcome.
pub fn dispatch(
    conn: &mut PgConnection,
    actor: &Actor,
    ticket: &Ticket,
    event: Event,
) -> QueryResult<usize> {
    let ctx = FanoutContext::load(conn, ticket)?;
    let targets = recipients(event.kind(), actor, &ctx);
    if targets.is_empty() {
        return Ok(0);
    }

    let (title, message) = template(&event, ticket);
    // An anonymous owner's identity never leaks through the sender column.
    let sender = if ticket.anonymous && ticket.owner_id == Some(actor.id) {
        None
    } else {
        Some(actor.id)
    };

    let rows: Vec<NewNotification> = targets
        .iter()
        .map(|recipient| NewNotification {
            id: Uuid::new_v4(),
            recipient_id: recipient.user_id,
            recipient_role: recipient.role.as_str().to_string(),
            sender_id: sender,
            ticket_id: Some(ticket.id),
            title: title.clone(),
            message: message.clone(),
            kind: event.kind().as_str().to_string(),
        })
        .collect();

    let inserted = diesel::insert_into(notifications::table)
        .values(&rows)
        .execute(conn)?;

    tracing::debug!(
        ticket_id = %ticket.id,
        actor_id = %actor.id,
        kind = event.kind().as_str(),
        recipients = inserted,
        "dispatched notifications"
    );
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    fn ctx(owner: Option<Uuid>, assignee: Option<Uuid>, admins: Vec<Uuid>) -> FanoutContext {
        FanoutContext {
            owner,
            assignee,
            admins,
        }
    }

    fn user_ids(recipients: &[Recipient]) -> Vec<Uuid> {
        recipients.iter().map(|r| r.user_id).collect()
    }

    #[test]
    fn new_ticket_by_student_reaches_all_admins() {
        let admins = ids(3);
        let owner = Uuid::new_v4();
        let actor = Actor::new(owner, Role::Student);
        let got = recipients(
            NotificationKind::NewTicket,
            &actor,
            &ctx(Some(owner), None, admins.clone()),
        );
        assert_eq!(user_ids(&got), admins);
        assert!(got.iter().all(|r| r.role == Role::Admin));
    }

    #[test]
    fn new_ticket_by_staff_reaches_no_one() {
        let admins = ids(2);
        let actor = Actor::new(admins[0], Role::Admin);
        let got = recipients(
            NotificationKind::NewTicket,
            &actor,
            &ctx(Some(Uuid::new_v4()), None, admins),
        );
        assert!(got.is_empty());
    }

    #[test]
    fn status_change_by_student_reaches_admins_and_assignee() {
        let admins = ids(2);
        let owner = Uuid::new_v4();
        let assignee = Uuid::new_v4();
        let actor = Actor::new(owner, Role::Student);
        let got = recipients(
            NotificationKind::StatusChange,
            &actor,
            &ctx(Some(owner), Some(assignee), admins.clone()),
        );
        let mut expected = admins;
        expected.push(assignee);
        assert_eq!(user_ids(&got), expected);
    }

    #[test]
    fn status_change_by_disposisi_reaches_owner_and_admins() {
        let admins = ids(2);
        let owner = Uuid::new_v4();
        let assignee = Uuid::new_v4();
        let actor = Actor::new(assignee, Role::Disposisi);
        let got = recipients(
            NotificationKind::StatusChange,
            &actor,
            &ctx(Some(owner), Some(assignee), admins.clone()),
        );
        let mut expected = vec![owner];
        expected.extend(admins);
        assert_eq!(user_ids(&got), expected);
    }

    #[test]
    fn status_change_by_admin_reaches_owner_and_assignee() {
        let owner = Uuid::new_v4();
        let assignee = Uuid::new_v4();
        let admin = Uuid::new_v4();
        let actor = Actor::new(admin, Role::Admin);
        let got = recipients(
            NotificationKind::StatusChange,
            &actor,
            &ctx(Some(owner), Some(assignee), vec![admin]),
        );
        assert_eq!(user_ids(&got), vec![owner, assignee]);
    }

    #[test]
    fn priority_change_by_admin_is_owner_only() {
        let owner = Uuid::new_v4();
        let assignee = Uuid::new_v4();
        let admin = Uuid::new_v4();
        let actor = Actor::new(admin, Role::Admin);
        let got = recipients(
            NotificationKind::PriorityChange,
            &actor,
            &ctx(Some(owner), Some(assignee), vec![admin, Uuid::new_v4()]),
        );
        assert_eq!(user_ids(&got), vec![owner]);
    }

    #[test]
    fn priority_change_by_student_reaches_no_one() {
        let actor = Actor::new(Uuid::new_v4(), Role::Student);
        let got = recipients(
            NotificationKind::PriorityChange,
            &actor,
            &ctx(Some(actor.id), Some(Uuid::new_v4()), ids(2)),
        );
        assert!(got.is_empty());
    }

    #[test]
    fn assignment_reaches_assignee_then_owner() {
        let owner = Uuid::new_v4();
        let assignee = Uuid::new_v4();
        let actor = Actor::new(Uuid::new_v4(), Role::Admin);
        let got = recipients(
            NotificationKind::Assignment,
            &actor,
            &ctx(Some(owner), Some(assignee), vec![actor.id]),
        );
        assert_eq!(user_ids(&got), vec![assignee, owner]);
    }

    #[test]
    fn feedback_by_student_reaches_admins_and_assignee() {
        let admins = ids(2);
        let owner = Uuid::new_v4();
        let assignee = Uuid::new_v4();
        let actor = Actor::new(owner, Role::Student);
        let got = recipients(
            NotificationKind::Feedback,
            &actor,
            &ctx(Some(owner), Some(assignee), admins.clone()),
        );
        let mut expected = admins;
        expected.push(assignee);
        assert_eq!(user_ids(&got), expected);
    }

    #[test]
    fn feedback_by_staff_reaches_owner_only() {
        let owner = Uuid::new_v4();
        let assignee = Uuid::new_v4();
        for role in [Role::Disposisi, Role::Admin] {
            let actor = Actor::new(assignee, role);
            let got = recipients(
                NotificationKind::Feedback,
                &actor,
                &ctx(Some(owner), Some(assignee), ids(2)),
            );
            assert_eq!(user_ids(&got), vec![owner]);
        }
    }

    #[test]
    fn chat_message_follows_status_change_rows() {
        let admins = ids(2);
        let owner = Uuid::new_v4();
        let assignee = Uuid::new_v4();

        let by_student = recipients(
            NotificationKind::ChatMessage,
            &Actor::new(owner, Role::Student),
            &ctx(Some(owner), Some(assignee), admins.clone()),
        );
        let mut expected = admins.clone();
        expected.push(assignee);
        assert_eq!(user_ids(&by_student), expected);

        let by_admin = recipients(
            NotificationKind::ChatMessage,
            &Actor::new(admins[0], Role::Admin),
            &ctx(Some(owner), Some(assignee), admins),
        );
        assert_eq!(user_ids(&by_admin), vec![owner, assignee]);
    }

    #[test]
    fn actor_is_never_a_recipient() {
        let admins = ids(3);
        let actor = Actor::new(admins[1], Role::Admin);
        let got = recipients(
            NotificationKind::StatusChange,
            &actor,
            &ctx(Some(Uuid::new_v4()), Some(Uuid::new_v4()), admins.clone()),
        );
        assert!(got.iter().all(|r| r.user_id != actor.id));

        // Acting admin also drops out of the all-admins set.
        let by_disposisi = recipients(
            NotificationKind::StatusChange,
            &Actor::new(admins[0], Role::Disposisi),
            &ctx(None, None, admins.clone()),
        );
        assert_eq!(user_ids(&by_disposisi), vec![admins[1], admins[2]]);
    }

    #[test]
    fn recipients_are_deduplicated() {
        // Owner doubling as assignee shows up once.
        let both = Uuid::new_v4();
        let actor = Actor::new(Uuid::new_v4(), Role::Admin);
        let got = recipients(
            NotificationKind::Assignment,
            &actor,
            &ctx(Some(both), Some(both), vec![]),
        );
        assert_eq!(user_ids(&got), vec![both]);
    }

    #[test]
    fn missing_parties_shrink_the_set_silently() {
        let actor = Actor::new(Uuid::new_v4(), Role::Student);
        let got = recipients(NotificationKind::NewTicket, &actor, &ctx(None, None, vec![]));
        assert!(got.is_empty());
    }
}
