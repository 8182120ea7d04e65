use actix_web::http::StatusCode;

use super::{
    helpers::{json, TestContext},
    mocks::completed,
};

#[actix_web::test]
async fn admin_requests_without_a_key_are_forbidden() {
    let ctx = TestContext::new(vec![], vec![]).await;
    let (status, _) = ctx.get("/admin/stats").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn a_wrong_key_is_forbidden() {
    let ctx = TestContext::new(vec![], vec![]).await;
    let req = actix_web::test::TestRequest::get()
        .uri("/admin/stats")
        .insert_header(("X-APG-Admin-Key", "not-the-key"));
    let (status, _) = ctx.request(req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn stats_are_readable_with_the_key() {
    let ctx = TestContext::new(vec![completed("QST1")], vec![]).await;
    let account = ctx.register("wanjiku", "0712345678").await;
    let id = account["id"].as_i64().unwrap();
    let (_, body) = ctx.post("/api/deposits", serde_json::json!({ "account_id": id, "amount": 6000 })).await;
    assert_eq!(json(&body)["status"], "Success");

    let (status, body) = ctx.admin_get("/admin/stats").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let stats = json(&body);
    assert_eq!(stats["total_accounts"], 1);
    assert_eq!(stats["deposits_settled"], 1);
    assert_eq!(stats["total_balance"], 6600);
}

#[actix_web::test]
async fn settings_can_be_read_and_updated() {
    let ctx = TestContext::new(vec![], vec![]).await;
    let (status, body) = ctx.admin_get("/admin/settings").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body).as_array().map(Vec::len), Some(5));

    let update = serde_json::json!({ "name": "bonus_amount", "value": "10" });
    let (status, body) = ctx.admin_post("/admin/settings", update).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(json(&body)["value"], "10");

    let unknown = serde_json::json!({ "name": "jackpot_rate", "value": "1" });
    let (status, _) = ctx.admin_post("/admin/settings", unknown).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn an_overdrawing_adjustment_is_rejected() {
    let ctx = TestContext::new(vec![], vec![]).await;
    let account = ctx.register("karis", "0712345678").await;
    let id = account["id"].as_i64().unwrap();
    let adjustment = serde_json::json!({ "account_id": id, "delta": -5000, "reason": "chargeback" });
    let (status, body) = ctx.admin_post("/admin/adjustments", adjustment).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED, "{body}");
    let (_, body) = ctx.get(&format!("/api/accounts/{id}")).await;
    assert_eq!(json(&body)["balance"], 0);
}

#[actix_web::test]
async fn suspension_blocks_deposits() {
    let ctx = TestContext::new(vec![], vec![]).await;
    let account = ctx.register("njeri", "0712345678").await;
    let id = account["id"].as_i64().unwrap();
    let (status, body) =
        ctx.admin_post(&format!("/admin/accounts/{id}/status"), serde_json::json!({ "status": "Suspended" })).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, _) = ctx.post("/api/deposits", serde_json::json!({ "account_id": id, "amount": 6000 })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn verifications_are_approved_over_http() {
    let ctx = TestContext::new(vec![], vec![]).await;
    let account = ctx.register("otieno", "0712345678").await;
    let id = account["id"].as_i64().unwrap();
    let submission = serde_json::json!({ "account_id": id, "receipt_code": "QRX9PL22AB", "amount": 7500 });
    let (status, body) = ctx.post("/api/verifications", submission).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let request_id = json(&body)["id"].as_i64().unwrap();

    let (status, body) = ctx.admin_get("/admin/verifications").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body).as_array().map(Vec::len), Some(1));

    let review = serde_json::json!({ "reviewed_by": "ops@apg" });
    let (status, body) = ctx.admin_post(&format!("/admin/verifications/{request_id}/approve"), review).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(json(&body)["status"], "Success");

    // 75 + 6 bonus
    let (_, body) = ctx.get(&format!("/api/accounts/{id}")).await;
    assert_eq!(json(&body)["balance"], 8100);
}

#[actix_web::test]
async fn broadcasts_reach_every_account() {
    let ctx = TestContext::new(vec![], vec![]).await;
    let account = ctx.register("akinyi", "0712345678").await;
    let id = account["id"].as_i64().unwrap();
    let broadcast = serde_json::json!({
        "title": "Maintenance",
        "message": "Deposits pause at midnight for 15 minutes",
        "severity": "Warning",
    });
    let (status, body) = ctx.admin_post("/admin/broadcast", broadcast).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    let (_, body) = ctx.get(&format!("/api/accounts/{id}/notifications")).await;
    let titles: Vec<_> =
        json(&body).as_array().unwrap().iter().map(|n| n["title"].as_str().unwrap_or_default().to_string()).collect();
    assert!(titles.contains(&"Maintenance".to_string()));
}

#[actix_web::test]
async fn the_float_is_readable_with_the_key() {
    let ctx = TestContext::new(vec![], vec![]).await;
    let (status, body) = ctx.admin_get("/admin/float").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["float"], 500_000);
}
