use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Disposisi,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Disposisi => "disposisi",
            Role::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "student" => Some(Role::Student),
            "disposisi" => Some(Role::Disposisi),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Admins and disposisi staff sit on the staff side of the read-flag
    /// split; students on the other.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Disposisi | Role::Admin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Option<TicketStatus> {
        match value {
            "open" => Some(TicketStatus::Open),
            "in_progress" => Some(TicketStatus::InProgress),
            "resolved" => Some(TicketStatus::Resolved),
            "closed" => Some(TicketStatus::Closed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl TicketPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketPriority::Low => "low",
            TicketPriority::Medium => "medium",
            TicketPriority::High => "high",
            TicketPriority::Urgent => "urgent",
        }
    }

    pub fn parse(value: &str) -> Option<TicketPriority> {
        match value {
            "low" => Some(TicketPriority::Low),
            "medium" => Some(TicketPriority::Medium),
            "high" => Some(TicketPriority::High),
            "urgent" => Some(TicketPriority::Urgent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Create,
    StatusChange,
    PriorityChange,
    Assignment,
    Restore,
    Delete,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Create => "create",
            HistoryAction::StatusChange => "status_change",
            HistoryAction::PriorityChange => "priority_change",
            HistoryAction::Assignment => "assignment",
            HistoryAction::Restore => "restore",
            HistoryAction::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewTicket,
    Assignment,
    StatusChange,
    PriorityChange,
    Feedback,
    ChatMessage,
    Custom,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::NewTicket => "new_ticket",
            NotificationKind::Assignment => "assignment",
            NotificationKind::StatusChange => "status_change",
            NotificationKind::PriorityChange => "priority_change",
            NotificationKind::Feedback => "feedback",
            NotificationKind::ChatMessage => "chat_message",
            NotificationKind::Custom => "custom",
        }
    }
}

/// The authenticated user an operation runs as. Role strings come from the
/// users table, so a parse failure here means corrupted data, not bad input.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    pub fn from_user(user: &AuthenticatedUser) -> AppResult<Actor> {
        let role = Role::parse(&user.role)
            .ok_or_else(|| AppError::internal(format!("unknown role {:?}", user.role)))?;
        Ok(Actor {
            id: user.user_id,
            role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_round_trip() {
        for role in [Role::Student, Role::Disposisi, Role::Admin] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("superuser"), None);
    }

    #[test]
    fn statuses_round_trip() {
        for status in [
            TicketStatus::Open,
            TicketStatus::InProgress,
            TicketStatus::Resolved,
            TicketStatus::Closed,
        ] {
            assert_eq!(TicketStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TicketStatus::parse("reopened"), None);
    }

    #[test]
    fn priorities_round_trip() {
        for priority in [
            TicketPriority::Low,
            TicketPriority::Medium,
            TicketPriority::High,
            TicketPriority::Urgent,
        ] {
            assert_eq!(TicketPriority::parse(priority.as_str()), Some(priority));
        }
        assert_eq!(TicketPriority::parse(""), None);
    }

    #[test]
    fn staff_split() {
        assert!(!Role::Student.is_staff());
        assert!(Role::Disposisi.is_staff());
        assert!(Role::Admin.is_staff());
    }
}
