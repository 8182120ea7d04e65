use actix_web::http::StatusCode;

use super::helpers::{json, TestContext};

#[actix_web::test]
async fn health_check() {
    let ctx = TestContext::new(vec![], vec![]).await;
    let (status, body) = ctx.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn registering_an_account_normalises_the_msisdn() {
    let ctx = TestContext::new(vec![], vec![]).await;
    let account = ctx.register("wanjiku", "0712 345 678").await;
    assert_eq!(account["msisdn"], "254712345678");
    assert_eq!(account["balance"], 0);
    assert_eq!(account["status"], "Active");
}

#[actix_web::test]
async fn a_duplicate_handle_is_a_conflict() {
    let ctx = TestContext::new(vec![], vec![]).await;
    let _ = ctx.register("wanjiku", "0712345678").await;
    let (status, body) =
        ctx.post("/api/accounts", serde_json::json!({ "handle": "wanjiku", "msisdn": "0722000111" })).await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
}

#[actix_web::test]
async fn an_invalid_msisdn_is_a_bad_request() {
    let ctx = TestContext::new(vec![], vec![]).await;
    let (status, body) =
        ctx.post("/api/accounts", serde_json::json!({ "handle": "bob", "msisdn": "not a number" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
}

#[actix_web::test]
async fn an_unknown_account_is_a_404() {
    let ctx = TestContext::new(vec![], vec![]).await;
    let (status, body) = ctx.get("/api/accounts/999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json(&body)["error"].as_str().unwrap_or_default().contains("999"));
}

#[actix_web::test]
async fn a_new_account_gets_a_welcome_notification() {
    let ctx = TestContext::new(vec![], vec![]).await;
    let account = ctx.register("karis", "0712345678").await;
    let id = account["id"].as_i64().unwrap();
    let (status, body) = ctx.get(&format!("/api/accounts/{id}/notifications")).await;
    assert_eq!(status, StatusCode::OK);
    let notifications = json(&body);
    assert_eq!(notifications.as_array().map(Vec::len), Some(1));
    assert_eq!(notifications[0]["title"], "Welcome");
}
