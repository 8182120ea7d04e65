use actix_web::http::StatusCode;

use super::{
    helpers::{json, TestContext},
    mocks::{accepted, completed},
};

#[actix_web::test]
async fn a_deposit_settles_via_the_provider_callback() {
    let ctx = TestContext::new(vec![accepted("chk-100")], vec![]).await;
    let account = ctx.register("wanjiku", "0712345678").await;
    let id = account["id"].as_i64().unwrap();

    let (status, body) = ctx.post("/api/deposits", serde_json::json!({ "account_id": id, "amount": 6000 })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let txn = json(&body);
    assert_eq!(txn["status"], "Pending");
    let reference = txn["reference"].as_str().unwrap().to_string();

    let callback = serde_json::json!({
        "checkout_id": "chk-100",
        "reference": reference,
        "status": "SUCCESS",
        "receipt": "QGH7TK91XP",
        "amount": "60.00",
    });
    let (status, body) = ctx.post("/callback/paynecta", callback.clone()).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    // 60 deposited, 6 bonus
    let (_, body) = ctx.get(&format!("/api/accounts/{id}")).await;
    assert_eq!(json(&body)["balance"], 6600);

    // A provider retry is acknowledged without a second credit
    let (status, _) = ctx.post("/callback/paynecta", callback).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = ctx.get(&format!("/api/accounts/{id}")).await;
    assert_eq!(json(&body)["balance"], 6600);
}

#[actix_web::test]
async fn a_failed_callback_credits_nothing() {
    let ctx = TestContext::new(vec![accepted("chk-200")], vec![]).await;
    let account = ctx.register("karis", "0712345678").await;
    let id = account["id"].as_i64().unwrap();
    let (_, body) = ctx.post("/api/deposits", serde_json::json!({ "account_id": id, "amount": 2000 })).await;
    let reference = json(&body)["reference"].as_str().unwrap().to_string();

    let callback = serde_json::json!({
        "reference": reference,
        "status": "FAILED",
        "response_code": "1032",
        "message": "Request cancelled by user",
    });
    let (status, _) = ctx.post("/callback/paynecta", callback).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = ctx.get(&format!("/api/accounts/{id}")).await;
    assert_eq!(json(&body)["balance"], 0);
    let (_, body) = ctx.get(&format!("/api/deposits/{reference}")).await;
    assert_eq!(json(&body)["status"], "Failed");
}

#[actix_web::test]
async fn a_callback_for_an_unknown_key_is_a_404() {
    let ctx = TestContext::new(vec![], vec![]).await;
    let callback = serde_json::json!({ "reference": "DEP-DOESNOTEXIST", "status": "SUCCESS" });
    let (status, _) = ctx.post("/callback/paynecta", callback).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn a_callback_for_an_unknown_provider_is_a_404() {
    let ctx = TestContext::new(vec![], vec![]).await;
    let (status, body) = ctx.post("/callback/mpesa", serde_json::json!({ "status": "SUCCESS" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json(&body)["error"].as_str().unwrap_or_default().contains("mpesa"));
}

#[actix_web::test]
async fn deposits_below_the_minimum_are_a_400() {
    let ctx = TestContext::new(vec![], vec![]).await;
    let account = ctx.register("brian", "0712345678").await;
    let id = account["id"].as_i64().unwrap();
    let (status, body) = ctx.post("/api/deposits", serde_json::json!({ "account_id": id, "amount": 500 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
}

#[actix_web::test]
async fn a_short_balance_queues_the_purchase() {
    let ctx = TestContext::new(vec![], vec![]).await;
    let account = ctx.register("njeri", "0712345678").await;
    let id = account["id"].as_i64().unwrap();
    let request = serde_json::json!({ "account_id": id, "recipient": "0722000111", "amount": 1000 });
    let (status, body) = ctx.post("/api/airtime", request).await;
    assert_eq!(status, StatusCode::ACCEPTED, "{body}");
    let outcome = json(&body);
    assert_eq!(outcome["shortfall"], 1000);
    let (_, body) = ctx.get(&format!("/api/accounts/{id}/queue")).await;
    assert_eq!(json(&body).as_array().map(Vec::len), Some(1));
}

#[actix_web::test]
async fn a_funded_purchase_returns_the_transaction() {
    let ctx = TestContext::new(vec![completed("COLL123")], vec![completed("AIR456")]).await;
    let account = ctx.register("otieno", "0712345678").await;
    let id = account["id"].as_i64().unwrap();
    // Synchronously settled deposit of 100 (no bonus threshold issue: 100 >= 50, so +6 bonus)
    let (status, body) = ctx.post("/api/deposits", serde_json::json!({ "account_id": id, "amount": 10_000 })).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let request = serde_json::json!({ "account_id": id, "recipient": "0722000111", "amount": 5000 });
    let (status, body) = ctx.post("/api/airtime", request).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let txn = json(&body);
    assert_eq!(txn["status"], "Success");
    assert_eq!(txn["receipt_code"], "AIR456");

    // 100 + 6 bonus - 50
    let (_, body) = ctx.get(&format!("/api/accounts/{id}")).await;
    assert_eq!(json(&body)["balance"], 5600);
}

#[actix_web::test]
async fn the_receipt_of_a_settled_deposit_renders_as_html() {
    let ctx = TestContext::new(vec![completed("QLM4TE55ZP")], vec![]).await;
    let account = ctx.register("akinyi", "0712345678").await;
    let id = account["id"].as_i64().unwrap();
    let (_, body) = ctx.post("/api/deposits", serde_json::json!({ "account_id": id, "amount": 6000 })).await;
    let reference = json(&body)["reference"].as_str().unwrap().to_string();

    let (status, html) = ctx.get(&format!("/api/receipts/{reference}")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Deposit receipt"));
    assert!(html.contains("QLM4TE55ZP"));
}

#[actix_web::test]
async fn a_pending_transaction_has_no_receipt() {
    let ctx = TestContext::new(vec![accepted("chk-300")], vec![]).await;
    let account = ctx.register("mutua", "0712345678").await;
    let id = account["id"].as_i64().unwrap();
    let (_, body) = ctx.post("/api/deposits", serde_json::json!({ "account_id": id, "amount": 6000 })).await;
    let reference = json(&body)["reference"].as_str().unwrap().to_string();
    let (status, _) = ctx.get(&format!("/api/receipts/{reference}")).await;
    assert_eq!(status, StatusCode::CONFLICT);
}
