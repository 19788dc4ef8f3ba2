use reqwest::{Method, StatusCode};

use serde_json::{json, Value};

use sqlx::PgPool;

use crate::helpers::{TestApp, TestUser};

fn bulletin() -> Value {
    json!({
        "name": "Weekly bulletin",
        "description": "Sent every Friday",
        "htmlContent": "<h1>{{title}}</h1><!--IF:showEvents--><p>Events: {{events}}</p><!--ENDIF:showEvents-->",
        "editableFields": [
            { "name": "title", "type": "text", "label": "Title", "defaultValue": "This week" },
            { "name": "showEvents", "type": "boolean", "label": "Show events", "defaultValue": false },
            { "name": "events", "type": "textarea", "label": "Events" }
        ],
        "type": "newsletter"
    })
}

#[sqlx::test]
async fn templates_require_credentials(pool: PgPool) -> sqlx::Result<()> {
    let app = TestApp::spawn(&pool).await;

    let res = app
        .authorized_request(Method::GET, "admin/templates", None)
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::UNAUTHORIZED, res.status());

    Ok(())
}

#[sqlx::test]
async fn template_lifecycle(pool: PgPool) -> sqlx::Result<()> {
    let app = TestApp::spawn(&pool).await;
    let admin = TestUser::admin(&pool).await;
    let creds = admin.credentials();

    // Create
    let res = app
        .authorized_request(Method::POST, "admin/templates", Some(&creds))
        .json(&bulletin())
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(StatusCode::CREATED, res.status());
    let created: Value = res.json().await.expect("Failed to parse response");
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["editableFields"].as_array().unwrap().len(), 3);

    // Preview with defaults and supplied values
    let res = app
        .authorized_request(Method::POST, &format!("admin/templates/{}/preview", id), Some(&creds))
        .json(&json!({ "values": { "showEvents": true, "events": "Choir at 6" } }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(StatusCode::OK, res.status());
    assert_eq!(
        res.text().await.unwrap(),
        "<h1>This week</h1><p>Events: Choir at 6</p>"
    );

    // Replace the whole document
    let mut replacement = bulletin();
    replacement["name"] = json!("Easter bulletin");
    replacement["htmlContent"] = json!("<h1>{{title}}</h1>");
    let res = app
        .authorized_request(Method::PUT, &format!("admin/templates/{}", id), Some(&creds))
        .json(&replacement)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(StatusCode::OK, res.status());

    let res = app
        .authorized_request(Method::GET, &format!("admin/templates/{}", id), Some(&creds))
        .send()
        .await
        .expect("Failed to execute request");
    let fetched: Value = res.json().await.expect("Failed to parse response");
    assert_eq!(fetched["name"], "Easter bulletin");

    // Delete
    let res = app
        .authorized_request(Method::DELETE, &format!("admin/templates/{}", id), Some(&creds))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(StatusCode::NO_CONTENT, res.status());

    let res = app
        .authorized_request(Method::GET, &format!("admin/templates/{}", id), Some(&creds))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(StatusCode::NOT_FOUND, res.status());

    let actions = sqlx::query_scalar::<_, String>(
        "select action from activity_log order by created_at",
    )
    .fetch_all(&pool)
    .await?;
    assert_eq!(
        actions,
        vec!["template_created", "template_updated", "template_deleted"]
    );

    Ok(())
}

#[sqlx::test]
async fn invalid_templates_are_rejected(pool: PgPool) -> sqlx::Result<()> {
    let app = TestApp::spawn(&pool).await;
    let admin = TestUser::admin(&pool).await;

    let mut undeclared = bulletin();
    undeclared["htmlContent"] = json!("<p>{{missing}}</p>");
    let mut unnamed = bulletin();
    unnamed["name"] = json!("");
    let mut bad_type = bulletin();
    bad_type["type"] = json!("flyer");

    for (desc, body) in [("undeclared field", undeclared), ("empty name", unnamed), ("unknown type", bad_type)] {
        let res = app
            .authorized_request(Method::POST, "admin/templates", Some(&admin.credentials()))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request");

        assert_eq!(StatusCode::BAD_REQUEST, res.status(), "{}", desc);
    }

    Ok(())
}
