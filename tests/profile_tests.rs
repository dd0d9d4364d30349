mod common;

use axum::http::StatusCode;
use common::{TestRequest, create_test_app, register, register_and_login};
use serde_json::json;

#[tokio::test]
async fn test_get_profile() {
    let (app, _db) = create_test_app().await;
    let id = register(&app, "a@x.com", "Alice").await;
    let (token, _cookie) = common::login(&app, "a@x.com").await;

    let response = TestRequest::get("/api/profile")
        .bearer(&token)
        .send(&app)
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["userId"], id);
    assert_eq!(response.body["email"], "a@x.com");
    assert_eq!(response.body["fullName"], "Alice");
    assert!(response.body["bio"].is_null());
}

#[tokio::test]
async fn test_partial_update_keeps_other_fields() {
    let (app, _db) = create_test_app().await;
    let (_id, token, _cookie) = register_and_login(&app, "a@x.com").await;

    let first = TestRequest::put("/api/profile")
        .bearer(&token)
        .json(json!({ "profession": "Hairdresser", "company": "Cuts & Co" }))
        .send(&app)
        .await;
    assert_eq!(first.status, StatusCode::OK);

    let second = TestRequest::put("/api/profile")
        .bearer(&token)
        .json(json!({ "bio": "Twenty years of experience" }))
        .send(&app)
        .await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.body["profession"], "Hairdresser");
    assert_eq!(second.body["company"], "Cuts & Co");
    assert_eq!(second.body["bio"], "Twenty years of experience");
    assert_eq!(second.body["fullName"], "Test User");
}

#[tokio::test]
async fn test_update_contact_fields_changes_user() {
    let (app, _db) = create_test_app().await;
    let (_id, token, _cookie) = register_and_login(&app, "a@x.com").await;

    let response = TestRequest::put("/api/profile")
        .bearer(&token)
        .json(json!({ "fullName": " Alice Martin ", "email": "Alice@X.com", "phone": "0611" }))
        .send(&app)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["fullName"], "Alice Martin");
    assert_eq!(response.body["email"], "alice@x.com");
    assert_eq!(response.body["phone"], "0611");

    // The new email is the login email from now on.
    let login = TestRequest::post("/api/auth/login")
        .json(json!({ "email": "alice@x.com", "password": common::TEST_PASSWORD }))
        .send(&app)
        .await;
    assert_eq!(login.status, StatusCode::OK);
    assert_eq!(login.body["user"]["name"], "Alice Martin");
}

#[tokio::test]
async fn test_email_taken_by_another_user() {
    let (app, _db) = create_test_app().await;
    register(&app, "taken@x.com", "Bob").await;
    let (_id, token, _cookie) = register_and_login(&app, "a@x.com").await;

    let response = TestRequest::put("/api/profile")
        .bearer(&token)
        .json(json!({ "email": "TAKEN@x.com", "bio": "unchanged" }))
        .send(&app)
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);

    // Nothing was written.
    let profile = TestRequest::get("/api/profile")
        .bearer(&token)
        .send(&app)
        .await;
    assert_eq!(profile.body["email"], "a@x.com");
    assert!(profile.body["bio"].is_null());

    // Re-submitting one's own email is fine.
    let own = TestRequest::put("/api/profile")
        .bearer(&token)
        .json(json!({ "email": "a@x.com" }))
        .send(&app)
        .await;
    assert_eq!(own.status, StatusCode::OK);
}

#[tokio::test]
async fn test_update_validation() {
    let (app, _db) = create_test_app().await;
    let (_id, token, _cookie) = register_and_login(&app, "a@x.com").await;

    let response = TestRequest::put("/api/profile")
        .bearer(&token)
        .json(json!({ "email": "nope", "fullName": "" }))
        .send(&app)
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    let fields: Vec<&str> = response.body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, ["email", "fullName"]);
}

#[tokio::test]
async fn test_profile_requires_authentication() {
    let (app, _db) = create_test_app().await;

    let get = TestRequest::get("/api/profile").send(&app).await;
    assert_eq!(get.status, StatusCode::UNAUTHORIZED);

    let put = TestRequest::put("/api/profile")
        .json(json!({ "bio": "x" }))
        .send(&app)
        .await;
    assert_eq!(put.status, StatusCode::UNAUTHORIZED);
}
