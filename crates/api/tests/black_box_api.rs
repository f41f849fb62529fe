//! Black-box tests over the real HTTP surface: ephemeral server, bearer
//! tokens, JSON bodies. Read models are eventually consistent, so queries
//! poll briefly where needed.

use chrono::{Duration as ChronoDuration, Utc};
use renqing_auth::{JwtClaims, PrincipalId, Role, sign_claims};
use renqing_core::LedgerId;
use reqwest::StatusCode;
use serde_json::json;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(jwt_secret: &str) -> Self {
        // Same router as prod, bound to an ephemeral port.
        let app = renqing_api::app::build_app(jwt_secret.to_string()).await;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_token(jwt_secret: &str, ledger_id: LedgerId, roles: Vec<Role>) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: PrincipalId::new(),
        ledger_id,
        roles,
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    sign_claims(jwt_secret.as_bytes(), &claims).expect("failed to sign token")
}

async fn get_json_eventually(
    client: &reqwest::Client,
    url: &str,
    token: &str,
) -> serde_json::Value {
    // Commands commit synchronously, projections catch up via the bus.
    for _ in 0..100 {
        let res = client.get(url).bearer_auth(token).send().await.unwrap();
        if res.status() == StatusCode::OK {
            return res.json().await.unwrap();
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    panic!("resource did not become visible within timeout: {url}");
}

async fn create_inventory_item(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
    name: &str,
    quantity: i64,
    unit_price: u64,
) -> String {
    let res = client
        .post(format!("{base_url}/inventory"))
        .bearer_auth(token)
        .json(&json!({
            "name": name,
            "category": "茶叶",
            "quantity": quantity,
            "unit_price": unit_price,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    created["id"].as_str().unwrap().to_string()
}

async fn create_gift(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
    from_person: &str,
) -> String {
    let res = client
        .post(format!("{base_url}/gifts"))
        .bearer_auth(token)
        .json(&json!({
            "from_person": from_person,
            "received_date": "2025-09-18",
            "items": [
                { "item_name": "茅台", "category": "酒类", "quantity": 1, "unit_price": 100000 }
            ],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    created["id"].as_str().unwrap().to_string()
}

#[tokio::test(flavor = "multi_thread")]
async fn auth_is_required_for_protected_endpoints() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/gifts", srv.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Health stays open.
    let res = client
        .get(format!("{}/health", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread")]
async fn commands_are_forbidden_without_a_granting_role() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let ledger_id = LedgerId::new();
    let token = mint_token(jwt_secret, ledger_id, vec![Role::new("viewer")]);

    let client = reqwest::Client::new();
    let res = client
        .post(format!("{}/inventory", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({
            "name": "大红袍",
            "category": "茶叶",
            "quantity": 3,
            "unit_price": 90000,
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test(flavor = "multi_thread")]
async fn reply_flow_decrements_stock_and_cancel_restores_it() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let ledger_id = LedgerId::new();
    let token = mint_token(jwt_secret, ledger_id, vec![Role::new("owner")]);
    let client = reqwest::Client::new();

    let gift_id = create_gift(&client, &srv.base_url, &token, "李明").await;
    let item_id = create_inventory_item(&client, &srv.base_url, &token, "大红袍", 5, 90_000).await;

    // Reply: two units drawn from stock.
    let res = client
        .post(format!("{}/gifts/{}/reply", srv.base_url, gift_id))
        .bearer_auth(&token)
        .json(&json!({
            "reply_date": "2025-09-20",
            "items": [{
                "item_name": "大红袍",
                "category": "茶叶",
                "quantity": 2,
                "unit_price": 90000,
                "inventory_id": item_id,
            }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let gift = get_json_eventually(
        &client,
        &format!("{}/gifts/{}", srv.base_url, gift_id),
        &token,
    )
    .await;
    assert_eq!(gift["status"], "已回礼");
    assert_eq!(gift["reply_cost"], 180_000);

    let item_url = format!("{}/inventory/{}", srv.base_url, item_id);
    for _ in 0..100 {
        let item = get_json_eventually(&client, &item_url, &token).await;
        if item["quantity"] == 3 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    let item = get_json_eventually(&client, &item_url, &token).await;
    assert_eq!(item["quantity"], 3);

    // A second reply on the same gift is a state conflict.
    let res = client
        .post(format!("{}/gifts/{}/reply", srv.base_url, gift_id))
        .bearer_auth(&token)
        .json(&json!({
            "reply_date": "2025-09-21",
            "items": [{
                "item_name": "大红袍",
                "category": "茶叶",
                "quantity": 1,
                "unit_price": 90000,
                "inventory_id": item_id,
            }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // Cancel: stock returns to 5, gift back to pending.
    let res = client
        .post(format!("{}/gifts/{}/cancel-reply", srv.base_url, gift_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    for _ in 0..100 {
        let item = get_json_eventually(&client, &item_url, &token).await;
        if item["quantity"] == 5 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    let item = get_json_eventually(&client, &item_url, &token).await;
    assert_eq!(item["quantity"], 5);

    let gift = get_json_eventually(
        &client,
        &format!("{}/gifts/{}", srv.base_url, gift_id),
        &token,
    )
    .await;
    assert_eq!(gift["status"], "待回礼");
    assert!(gift["reply_cost"].is_null());
}

#[tokio::test(flavor = "multi_thread")]
async fn insufficient_stock_rejects_the_reply_with_422() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let ledger_id = LedgerId::new();
    let token = mint_token(jwt_secret, ledger_id, vec![Role::new("owner")]);
    let client = reqwest::Client::new();

    let gift_id = create_gift(&client, &srv.base_url, &token, "李明").await;
    let item_id = create_inventory_item(&client, &srv.base_url, &token, "大红袍", 2, 90_000).await;

    let res = client
        .post(format!("{}/gifts/{}/reply", srv.base_url, gift_id))
        .bearer_auth(&token)
        .json(&json!({
            "reply_date": "2025-09-20",
            "items": [{
                "item_name": "大红袍",
                "category": "茶叶",
                "quantity": 3,
                "unit_price": 90000,
                "inventory_id": item_id,
            }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // Stock is untouched and the gift is still pending.
    let item = get_json_eventually(
        &client,
        &format!("{}/inventory/{}", srv.base_url, item_id),
        &token,
    )
    .await;
    assert_eq!(item["quantity"], 2);

    let gift = get_json_eventually(
        &client,
        &format!("{}/gifts/{}", srv.base_url, gift_id),
        &token,
    )
    .await;
    assert_eq!(gift["status"], "待回礼");
}

#[tokio::test(flavor = "multi_thread")]
async fn ledgers_are_isolated_across_tokens() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let ledger1 = LedgerId::new();
    let ledger2 = LedgerId::new();
    let token1 = mint_token(jwt_secret, ledger1, vec![Role::new("owner")]);
    let token2 = mint_token(jwt_secret, ledger2, vec![Role::new("owner")]);
    let client = reqwest::Client::new();

    let item_id = create_inventory_item(&client, &srv.base_url, &token1, "大红袍", 5, 90_000).await;

    // Visible to its own ledger.
    get_json_eventually(
        &client,
        &format!("{}/inventory/{}", srv.base_url, item_id),
        &token1,
    )
    .await;

    // Invisible to the other ledger.
    let res = client
        .get(format!("{}/inventory/{}", srv.base_url, item_id))
        .bearer_auth(&token2)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // And unadjustable: the other ledger's stream for this id is empty.
    let res = client
        .post(format!("{}/inventory/{}/adjust", srv.base_url, item_id))
        .bearer_auth(&token2)
        .json(&json!({ "delta": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
