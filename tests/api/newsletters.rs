use reqwest::{Method, StatusCode};

use serde_json::{json, Value};

use sqlx::PgPool;

use wiremock::matchers::*;
use wiremock::{Mock, ResponseTemplate};

use crate::helpers::{NewSubscriber, TestApp, TestUser};

async fn create_subscribers(app: &TestApp, emails: &[&str]) {
    // Scoped email mock for the welcome emails
    let _mock_guard = Mock::given(path("/email"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .named("Welcome emails")
        .expect(emails.len() as u64)
        .mount_as_scoped(&app.email_server)
        .await;

    for email in emails {
        app.subscription_create(&NewSubscriber {
            name: None,
            email: Some(email.to_string()),
        })
        .await
        .expect("Failed to create subscription");
    }
}

#[sqlx::test]
async fn publishing_requires_credentials(pool: PgPool) -> sqlx::Result<()> {
    let app = TestApp::spawn(&pool).await;
    let admin = TestUser::admin(&pool).await;

    let mut wrong_password = admin.credentials();
    wrong_password.password = "not the password".into();

    let body = json!({ "subject": "Hello", "html": "<p>Hi</p>" });
    for credentials in [None, Some(&wrong_password)] {
        let res = app
            .newsletter_publish(credentials, &body)
            .await
            .expect("Failed to execute request");

        assert_eq!(StatusCode::UNAUTHORIZED, res.status());
        assert!(res.headers().contains_key("WWW-Authenticate"));
    }

    Ok(())
}

#[sqlx::test]
async fn newsletters_skip_unsubscribed_addresses(pool: PgPool) -> sqlx::Result<()> {
    let app = TestApp::spawn(&pool).await;
    let admin = TestUser::admin(&pool).await;

    create_subscribers(&app, &["ana@test.com", "luis@test.com"]).await;
    let links = app.sent_unsubscribe_links().await;
    app.client
        .get(links[1].clone())
        .send()
        .await
        .expect("Failed to unsubscribe");

    Mock::given(path("/email"))
        .and(method("POST"))
        .and(body_string_contains("ana@test.com"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&app.email_server)
        .await;

    let res = app
        .newsletter_publish(
            Some(&admin.credentials()),
            &json!({ "subject": "Advent", "html": "<html><body><p>Advent schedule</p></body></html>" }),
        )
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::OK, res.status());
    let result: Value = res.json().await.expect("Failed to parse response");
    assert_eq!(result["sent"], 1);
    assert_eq!(result["failed"], 0);

    Ok(())
}

#[sqlx::test]
async fn partial_failures_are_reported_per_recipient(pool: PgPool) -> sqlx::Result<()> {
    let app = TestApp::spawn(&pool).await;
    let admin = TestUser::admin(&pool).await;

    let emails = ["a@test.com", "b@test.com", "c@test.com", "d@test.com", "e@test.com"];
    create_subscribers(&app, &emails).await;

    Mock::given(path("/email"))
        .and(body_string_contains("c@test.com"))
        .respond_with(ResponseTemplate::new(422))
        .expect(1)
        .mount(&app.email_server)
        .await;
    Mock::given(path("/email"))
        .respond_with(ResponseTemplate::new(200))
        .expect(4)
        .mount(&app.email_server)
        .await;

    let res = app
        .newsletter_publish(
            Some(&admin.credentials()),
            &json!({ "subject": "Parish picnic", "html": "<p>Bring a dish</p>" }),
        )
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::OK, res.status());
    let result: Value = res.json().await.expect("Failed to parse response");
    assert_eq!(result["sent"], 4);
    assert_eq!(result["failed"], 1);

    let failed: Vec<&str> = result["recipients"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|r| r["status"] == "failed")
        .map(|r| r["recipient"].as_str().unwrap())
        .collect();
    assert_eq!(failed, vec!["c@test.com"]);

    let logged = sqlx::query_scalar::<_, String>(
        "select details from activity_log where action = 'newsletter_sent'",
    )
    .fetch_one(&pool)
    .await?;
    assert!(logged.contains("sent 4, failed 1"));

    Ok(())
}

#[sqlx::test]
async fn malformed_newsletters_are_rejected(pool: PgPool) -> sqlx::Result<()> {
    let app = TestApp::spawn(&pool).await;
    let admin = TestUser::admin(&pool).await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.email_server)
        .await;

    let test_cases = vec![
        ("Missing subject", json!({ "html": "<p>Body</p>" })),
        ("Empty subject", json!({ "subject": " ", "html": "<p>Body</p>" })),
        ("Missing body", json!({ "subject": "Title" })),
        ("Empty body", json!({ "subject": "Title", "html": "" })),
    ];
    for (test_name, body) in test_cases {
        let res = app
            .newsletter_publish(Some(&admin.credentials()), &body)
            .await
            .expect("Failed to execute request");

        assert_eq!(StatusCode::BAD_REQUEST, res.status(), "{}", test_name);
    }

    let res = app
        .newsletter_publish(
            Some(&admin.credentials()),
            &json!({ "subject": "Title", "templateId": uuid::Uuid::new_v4() }),
        )
        .await
        .expect("Failed to execute request");
    assert_eq!(StatusCode::NOT_FOUND, res.status());

    Ok(())
}

#[sqlx::test]
async fn activity_lists_newest_first(pool: PgPool) -> sqlx::Result<()> {
    let app = TestApp::spawn(&pool).await;
    let admin = TestUser::admin(&pool).await;

    create_subscribers(&app, &["ana@test.com"]).await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .mount(&app.email_server)
        .await;
    app.newsletter_publish(
        Some(&admin.credentials()),
        &json!({ "subject": "Vigil", "html": "<p>Saturday</p>" }),
    )
    .await
    .expect("Failed to execute request");

    let res = app
        .authorized_request(Method::GET, "admin/activity?limit=10", Some(&admin.credentials()))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::OK, res.status());
    let records: Vec<Value> = res.json().await.expect("Failed to parse response");
    let actions: Vec<&str> = records
        .iter()
        .map(|r| r["action"].as_str().unwrap())
        .collect();
    assert_eq!(actions, vec!["newsletter_sent", "subscribed"]);
    assert_eq!(records[0]["userEmail"], "admin@parish.org");

    Ok(())
}
