use chrono::NaiveDateTime;
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub display_name: String,
    pub role: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub display_name: String,
    pub role: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = categories)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = categories)]
pub struct NewCategory {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = sub_categories)]
#[diesel(belongs_to(Category))]
pub struct SubCategory {
    pub id: Uuid,
    pub category_id: Uuid,
    pub name: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = sub_categories)]
pub struct NewSubCategory {
    pub id: Uuid,
    pub category_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = tickets)]
#[diesel(belongs_to(Category))]
pub struct Ticket {
    pub id: Uuid,
    pub owner_id: Option<Uuid>,
    pub anonymous: bool,
    pub token: Option<String>,
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
    pub deleted_at: Option<NaiveDateTime>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = tickets)]
pub struct NewTicket {
    pub id: Uuid,
    pub owner_id: Option<Uuid>,
    pub anonymous: bool,
    pub token: Option<String>,
    pub title: String,
    pub description: String,
    pub category_id: Uuid,
    pub sub_category_id: Option<Uuid>,
    pub status: String,
    pub priority: String,
    pub read_by_admin: bool,
    pub read_by_student: bool,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = ticket_histories)]
#[diesel(belongs_to(Ticket))]
pub struct TicketHistory {
    pub id: Uuid,
    pub ticket_id: Uuid,
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

#[derive(Debug, Insertable)]
#[diesel(table_name = ticket_histories)]
pub struct NewTicketHistory {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub action: String,
    pub old_status: Option<String>,
    pub new_status: Option<String>,
    pub old_priority: Option<String>,
    pub new_priority: Option<String>,
    pub old_assignee: Option<Uuid>,
    pub new_assignee: Option<Uuid>,
    pub actor_id: Uuid,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = ticket_feedback)]
#[diesel(belongs_to(Ticket))]
pub struct TicketFeedback {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub author_id: Uuid,
    pub author_role: String,
    pub body: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = ticket_feedback)]
pub struct NewTicketFeedback {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub author_id: Uuid,
    pub author_role: String,
    pub body: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = notifications)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub recipient_role: String,
    pub sender_id: Option<Uuid>,
    pub ticket_id: Option<Uuid>,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub read_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = notifications)]
pub struct NewNotification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub recipient_role: String,
    pub sender_id: Option<Uuid>,
    pub ticket_id: Option<Uuid>,
    pub title: String,
    pub message: String,
    pub kind: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = chat_messages)]
#[diesel(belongs_to(Ticket))]
pub struct ChatMessage {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
    pub is_system: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = chat_messages)]
pub struct NewChatMessage {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
    pub is_system: bool,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Queryable, Associations)]
#[diesel(table_name = chat_message_reads)]
#[diesel(belongs_to(ChatMessage, foreign_key = message_id))]
#[diesel(primary_key(message_id, user_id))]
pub struct ChatMessageRead {
    pub message_id: Uuid,
    pub user_id: Uuid,
    pub read_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = chat_message_reads)]
pub struct NewChatMessageRead {
    pub message_id: Uuid,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = chat_attachments)]
#[diesel(belongs_to(ChatMessage, foreign_key = message_id))]
pub struct ChatAttachment {
    pub id: Uuid,
    pub message_id: Uuid,
    pub file_name: String,
    pub content_type: Option<String>,
    pub created_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = chat_attachments)]
pub struct NewChatAttachment {
    pub id: Uuid,
    pub message_id: Uuid,
    pub file_name: String,
    pub content_type: Option<String>,
}
