mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{acquire_db_lock, body_to_vec, TestApp};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Deserialize)]
struct TicketBody {
    id: Uuid,
}

#[derive(Deserialize)]
struct RevealBody {
    token: String,
}

async fn create_ticket(
    app: &TestApp,
    token: &str,
    category_id: Uuid,
    anonymous: bool,
) -> Result<TicketBody> {
    let response = app
        .post_json(
            "/api/tickets",
            &json!({
                "title": "Harassment report",
                "description": "Details withheld.",
                "category_id": category_id,
                "anonymous": anonymous,
            }),
            Some(token),
        )
        .await?;
    anyhow::ensure!(response.status() == StatusCode::CREATED);
    let body = body_to_vec(response.into_body()).await?;
    Ok(serde_json::from_slice(&body)?)
}

#[tokio::test]
async fn reveal_protocol_covers_all_actor_cases() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::try_new().await? else {
        return Ok(());
    };

    app.insert_user("owner", "ownerpass", "student").await?;
    app.insert_user("bystander", "bypass", "student").await?;
    app.insert_user("admin", "adminpass", "admin").await?;
    let category_id = app.insert_category("Conduct").await?;

    let owner_token = app.login_token("owner", "ownerpass").await?;
    let ticket = create_ticket(&app, &owner_token, category_id, true).await?;
    let reveal_path = format!("/api/tickets/{}/reveal", ticket.id);

    // Admin bypasses password verification entirely.
    let admin_token = app.login_token("admin", "adminpass").await?;
    let response = app.post_json(&reveal_path, &json!({}), Some(&admin_token)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_vec(response.into_body()).await?;
    let revealed: RevealBody = serde_json::from_slice(&body)?;
    assert!(helpdesk::token::validate_format(&revealed.token));

    // Wrong password is a credential failure, not a permission failure.
    let response = app
        .post_json(
            &reveal_path,
            &json!({ "password": "not-ownerpass" }),
            Some(&owner_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Missing password likewise.
    let response = app.post_json(&reveal_path, &json!({}), Some(&owner_token)).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // The owner with the right password gets the same token the admin saw.
    let response = app
        .post_json(
            &reveal_path,
            &json!({ "password": "ownerpass" }),
            Some(&owner_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_vec(response.into_body()).await?;
    let owner_view: RevealBody = serde_json::from_slice(&body)?;
    assert_eq!(owner_view.token, revealed.token);

    // A verified session skips re-verification inside the TTL.
    let response = app.post_json(&reveal_path, &json!({}), Some(&owner_token)).await?;
    assert_eq!(response.status(), StatusCode::OK);

    // Any other non-admin is refused outright, password or not.
    let bystander_token = app.login_token("bystander", "bypass").await?;
    let response = app
        .post_json(
            &reveal_path,
            &json!({ "password": "bypass" }),
            Some(&bystander_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn revealing_a_non_anonymous_ticket_is_an_invalid_operation() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::try_new().await? else {
        return Ok(());
    };

    app.insert_user("owner", "ownerpass", "student").await?;
    app.insert_user("admin", "adminpass", "admin").await?;
    let category_id = app.insert_category("Conduct").await?;

    let owner_token = app.login_token("owner", "ownerpass").await?;
    let ticket = create_ticket(&app, &owner_token, category_id, false).await?;

    let admin_token = app.login_token("admin", "adminpass").await?;
    let response = app
        .post_json(
            &format!("/api/tickets/{}/reveal", ticket.id),
            &json!({}),
            Some(&admin_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    Ok(())
}
