mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn auth_check_requires_a_token() -> Result<()> {
    if !common::database_available() {
        eprintln!("skipping: DATABASE_URL not set");
        return Ok(());
    }

    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/auth/check", server.base_url))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(format!("{}/auth/check", server.base_url))
        .header("Token", common::token_for(&["user"]))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body.get("message").and_then(|v| v.as_str()), Some("Success"));

    Ok(())
}

#[tokio::test]
async fn mutation_rejects_disjoint_roles_with_role_message() -> Result<()> {
    if !common::database_available() {
        eprintln!("skipping: DATABASE_URL not set");
        return Ok(());
    }

    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    // "user" can read but not write
    let res = client
        .post(format!("{}/protocolschemas/", server.base_url))
        .header("Token", common::token_for(&["user"]))
        .json(&json!({ "name": "x", "description": "y", "schema": { "type": "object" } }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let body = res.json::<serde_json::Value>().await?;
    let message = body.get("message").and_then(|v| v.as_str()).unwrap_or_default();
    assert_eq!(message, "not authorized for this endpoint");

    Ok(())
}

#[tokio::test]
async fn mutation_rejects_malformed_token_with_decode_message() -> Result<()> {
    if !common::database_available() {
        eprintln!("skipping: DATABASE_URL not set");
        return Ok(());
    }

    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/protocolschemas/", server.base_url))
        .header("Token", "not-a-token")
        .json(&json!({ "name": "x", "description": "y", "schema": { "type": "object" } }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let body = res.json::<serde_json::Value>().await?;
    let message = body.get("message").and_then(|v| v.as_str()).unwrap_or_default();
    assert!(message.starts_with("invalid token"), "unexpected message: {message}");

    Ok(())
}

#[tokio::test]
async fn body_token_is_accepted_when_header_is_absent() -> Result<()> {
    if !common::database_available() {
        eprintln!("skipping: DATABASE_URL not set");
        return Ok(());
    }

    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/protocolschemas/", server.base_url))
        .json(&json!({
            "token": common::token_for(&["moderator"]),
            "name": "body-token-schema",
            "description": "created with a body token",
            "schema": { "type": "object" },
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK, "body: {}", res.text().await?);

    Ok(())
}

#[tokio::test]
async fn reads_are_public() -> Result<()> {
    if !common::database_available() {
        eprintln!("skipping: DATABASE_URL not set");
        return Ok(());
    }

    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/protocols/", server.base_url))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.json::<serde_json::Value>().await?.is_array());

    Ok(())
}
