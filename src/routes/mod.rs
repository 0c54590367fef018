use axum::http::HeaderValue;
use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::{auth::AuthenticatedUser, state::AppState};

pub mod auth;
pub mod chat;
pub mod health;
pub mod notifications;
pub mod tickets;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| {
                    trimmed
                        .parse::<HeaderValue>()
                        .expect("invalid CORS allowed origin")
                })
            })
            .collect();

        let allow_origin = AllowOrigin::list(headers);

        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/me", get(auth::me));

    let tickets_routes = Router::new()
        .route("/", get(tickets::list_tickets).post(tickets::create_ticket))
        .route(
            "/:id",
            get(tickets::get_ticket).delete(tickets::delete_ticket),
        )
        .route("/:id/status", axum::routing::patch(tickets::change_status))
        .route(
            "/:id/priority",
            axum::routing::patch(tickets::change_priority),
        )
        .route(
            "/:id/assignee",
            axum::routing::patch(tickets::assign_ticket),
        )
        .route("/:id/history", get(tickets::list_history))
        .route(
            "/:id/feedback",
            get(tickets::list_feedback).post(tickets::add_feedback),
        )
        .route("/:id/reveal", post(tickets::reveal_token))
        .route("/:id/restore", post(tickets::restore_ticket))
        .route(
            "/:id/chat",
            get(chat::list_messages).post(chat::post_message),
        )
        .route("/:id/chat/read", post(chat::mark_read))
        .route("/:id/chat/unread", get(chat::unread_status));

    let chat_routes = Router::new()
        .route("/:message_id", delete(chat::delete_message))
        .route("/:message_id/attachments", post(chat::add_attachment))
        .route(
            "/attachments/:attachment_id",
            delete(chat::delete_attachment),
        );

    let notifications_routes = Router::new()
        .route("/", get(notifications::list_notifications))
        .route("/:id/read", post(notifications::mark_read));

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/api/tickets", tickets_routes)
        .nest("/api/chat", chat_routes)
        .nest("/api/notifications", notifications_routes)
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    Router::new()
        .merge(protected_routes)
        .nest("/api/auth", auth_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
}
