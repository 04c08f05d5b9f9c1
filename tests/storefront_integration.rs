mod common;

use std::sync::Arc;

use mockito::{Matcher, Mock, Server, ServerGuard};
use reqwest::StatusCode;
use serde_json::json;

use storefront::config::{load_config_str, StorefrontConfig};
use storefront::models::{CustomerUpdate, NewAccount, Order, OrderStatus, StockShortfall};
use storefront::session::SessionError;
use storefront::startup::{build_state, run, Command};
use storefront::store::MemoryStore;
use storefront::storefront::Storefront;

use common::*;

fn storefront_for(server_url: &str, token: &str) -> Storefront {
    Storefront::new(signed_in(server_url, token, "r1"), StorefrontConfig::default())
}

#[tokio::test]
async fn lists_products_with_mixed_id_types() {
    let mut server = Server::new_async().await;
    let token = mint(FUTURE_EXP, false, "t");
    let products = mock_get(
        &mut server,
        "/api/products/",
        &token,
        200,
        r#"[{"product_id": 1, "name": "Baguette", "price": "1.20", "quantity_in_stock": 10},
            {"product_id": "P2", "name": "Croissant"}]"#,
        1,
    )
    .await;

    let listed = storefront_for(&server.url(), &token)
        .list_products()
        .await
        .expect("products should load");

    products.assert_async().await;
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].product_id, "1");
    assert_eq!(listed[0].quantity_in_stock, Some(10));
    assert_eq!(listed[1].product_id, "P2");
    assert_eq!(listed[1].quantity_in_stock, None);
}

#[tokio::test]
async fn pending_order_is_reused_when_present() {
    let mut server = Server::new_async().await;
    let token = mint(FUTURE_EXP, false, "t");
    let orders = mock_get(
        &mut server,
        ORDERS,
        &token,
        200,
        r#"[{"order_id": 1, "status": "fulfilled"}, {"order_id": 2, "status": "pending"}]"#,
        1,
    )
    .await;
    let create = server
        .mock("POST", ORDERS)
        .expect(0)
        .create_async()
        .await;

    let cart = storefront_for(&server.url(), &token)
        .pending_order()
        .await
        .expect("cart should resolve");

    orders.assert_async().await;
    create.assert_async().await;
    assert_eq!(cart.order_id, "2");
    assert_eq!(cart.status, OrderStatus::Pending);
}

#[tokio::test]
async fn pending_order_is_opened_when_missing() {
    let mut server = Server::new_async().await;
    let token = mint(FUTURE_EXP, false, "t");
    // The first listing has no pending order; once created it shows up.
    let without_cart = mock_get(&mut server, ORDERS, &token, 200, r#"[{"order_id": 1, "status": "fulfilled"}]"#, 1).await;
    let customer = mock_get(
        &mut server,
        "/api/customers/",
        &token,
        200,
        r#"[{"customer_id": 31, "user": 42}]"#,
        1,
    )
    .await;
    let create = server
        .mock("POST", ORDERS)
        .match_header("authorization", bearer(&token).as_str())
        .match_body(Matcher::Json(json!({
            "customer_id": "31",
            "store_id": "CRE71780",
            "items": [],
        })))
        .with_status(201)
        .with_body(r#"{"order_id": 9, "status": "pending", "customer_id": 31}"#)
        .create_async()
        .await;
    let listed = mock_get(
        &mut server,
        ORDERS,
        &token,
        200,
        r#"[{"order_id": 1, "status": "fulfilled"}, {"order_id": 9, "status": "pending"}]"#,
        1,
    )
    .await;

    let cart = storefront_for(&server.url(), &token)
        .pending_order()
        .await
        .expect("cart should be opened");

    without_cart.assert_async().await;
    customer.assert_async().await;
    create.assert_async().await;
    listed.assert_async().await;
    assert_eq!(cart.order_id, "9");
}

#[tokio::test]
async fn add_item_posts_to_order_items() {
    let mut server = Server::new_async().await;
    let token = mint(FUTURE_EXP, false, "t");
    let add = server
        .mock("POST", "/api/orders/9/items/")
        .match_body(Matcher::Json(json!({
            "order_id": "9",
            "product_id": "P2",
            "quantity": 3,
        })))
        .with_status(201)
        .with_body(r#"{"id": 5, "product": "P2", "quantity": 3}"#)
        .create_async()
        .await;

    let created = storefront_for(&server.url(), &token)
        .add_item("9", "P2", 3)
        .await
        .expect("item should be added");

    add.assert_async().await;
    assert_eq!(created["quantity"], 3);
}

async fn mock_stock(server: &mut ServerGuard, token: &str, product: &str, body: &str) -> Mock {
    server
        .mock("GET", "/api/stocks/")
        .match_header("authorization", bearer(token).as_str())
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("store".into(), "CRE71780".into()),
            Matcher::UrlEncoded("product".into(), product.into()),
        ]))
        .with_status(200)
        .with_body(body)
        .expect(1)
        .create_async()
        .await
}

#[tokio::test]
async fn stock_shortfalls_use_nested_order_items() {
    let mut server = Server::new_async().await;
    let token = mint(FUTURE_EXP, false, "t");
    let _order = mock_get(
        &mut server,
        "/api/orders/9/",
        &token,
        200,
        r#"{"order_id": 9, "status": "pending",
            "items": [{"id": 1, "quantity": 2,
                       "product": {"product_id": "P1", "product_name": "Bread", "price": "1.20"}},
                      {"id": 2, "quantity": 5,
                       "product": {"product_id": "P2", "product_name": "Jam", "price": "3.50"}},
                      {"id": 3, "quantity": 1,
                       "product": {"product_id": "P3", "product_name": "Butter"}}]}"#,
        1,
    )
    .await;
    let p1 = mock_stock(&mut server, &token, "P1", r#"[{"store": "CRE71780", "product": "P1", "quantity_in_stock": 8}]"#).await;
    let p2 = mock_stock(&mut server, &token, "P2", r#"{"store": "CRE71780", "product": "P2", "quantity_in_stock": 1}"#).await;
    let p3 = mock_stock(&mut server, &token, "P3", "[]").await;

    let storefront = storefront_for(&server.url(), &token);
    let order = storefront.get_order("9").await.expect("order should load");
    assert_eq!(order.items[0].product_name.as_deref(), Some("Bread"));
    let shortfalls = storefront
        .stock_shortfalls(&order)
        .await
        .expect("stock should load");

    p1.assert_async().await;
    p2.assert_async().await;
    p3.assert_async().await;
    assert_eq!(
        shortfalls,
        vec![
            StockShortfall {
                product_id: "P2".to_string(),
                requested: 5,
                available: 1,
            },
            StockShortfall {
                product_id: "P3".to_string(),
                requested: 1,
                available: 0,
            },
        ]
    );
}

#[tokio::test]
async fn cart_lines_are_updated_and_removed() {
    let mut server = Server::new_async().await;
    let token = mint(FUTURE_EXP, false, "t");
    let update = server
        .mock("PATCH", "/api/orders/9/items/5/")
        .match_header("authorization", bearer(&token).as_str())
        .match_body(Matcher::Json(json!({ "quantity": 4 })))
        .with_status(200)
        .with_body(r#"{"id": 5, "product": "P2", "quantity": 4}"#)
        .create_async()
        .await;
    let remove = server
        .mock("DELETE", "/api/orders/9/items/5/")
        .match_header("authorization", bearer(&token).as_str())
        .with_status(204)
        .create_async()
        .await;

    let storefront = storefront_for(&server.url(), &token);
    let line = storefront
        .update_item_quantity("9", "5", 4)
        .await
        .expect("quantity should update");
    storefront
        .remove_item("9", "5")
        .await
        .expect("item should be removed");

    update.assert_async().await;
    remove.assert_async().await;
    assert_eq!(line["quantity"], 4);
}

#[tokio::test]
async fn customer_update_sends_only_changes() {
    let mut server = Server::new_async().await;
    let token = mint(FUTURE_EXP, false, "t");
    let profile = mock_get(&mut server, "/api/customers/", &token, 200, r#"[{"customer_id": 31}]"#, 1).await;
    let patch = server
        .mock("PATCH", "/api/customers/31/")
        .match_header("authorization", bearer(&token).as_str())
        .match_body(Matcher::Json(json!({
            "email": "jane@example.org",
            "user": { "password": "n3w-secret" },
        })))
        .with_status(200)
        .with_body(r#"{"customer_id": 31, "email": "jane@example.org"}"#)
        .create_async()
        .await;

    let storefront = storefront_for(&server.url(), &token);
    let nothing = storefront
        .update_customer(&CustomerUpdate::default())
        .await
        .expect("empty update should be skipped");
    assert_eq!(nothing, None);

    let updated = storefront
        .update_customer(&CustomerUpdate::new(
            Some("jane@example.org".into()),
            None,
            Some("n3w-secret".into()),
        ))
        .await
        .expect("profile should update")
        .expect("a call should have been made");

    profile.assert_async().await;
    patch.assert_async().await;
    assert_eq!(updated["email"], "jane@example.org");
}

#[tokio::test]
async fn payment_is_sent_in_cents() {
    let mut server = Server::new_async().await;
    let token = mint(FUTURE_EXP, false, "t");
    let pay = server
        .mock("POST", "/api/payments/")
        .match_header("authorization", bearer(&token).as_str())
        .match_body(Matcher::Json(json!({
            "order_id": "9",
            "payment_method_id": "pm_card_visa",
            "amount": 1990,
            "currency": "eur",
        })))
        .with_status(200)
        .with_body(r#"{"status": "success", "payment_intent": {"id": "pi_1"}, "payment": {"id": 4}}"#)
        .create_async()
        .await;

    let order: Order = serde_json::from_value(json!({
        "order_id": 9,
        "status": "pending",
        "total_amount": "19.90",
    }))
    .unwrap();
    let outcome = storefront_for(&server.url(), &token)
        .process_payment(&order, "pm_card_visa")
        .await
        .expect("payment should go through");

    pay.assert_async().await;
    assert!(outcome.succeeded());
    assert_eq!(outcome.payment_intent, Some(json!({ "id": "pi_1" })));
}

#[tokio::test]
async fn payment_without_total_is_not_sent() {
    let mut server = Server::new_async().await;
    let token = mint(FUTURE_EXP, false, "t");
    let pay = server
        .mock("POST", "/api/payments/")
        .expect(0)
        .create_async()
        .await;

    let order: Order = serde_json::from_value(json!({ "order_id": 9, "status": "pending" })).unwrap();
    let err = storefront_for(&server.url(), &token)
        .process_payment(&order, "pm_card_visa")
        .await
        .unwrap_err();

    pay.assert_async().await;
    assert!(matches!(err, SessionError::MalformedResponse(_)));
}

#[tokio::test]
async fn register_works_without_a_session() {
    let mut server = Server::new_async().await;
    let register = server
        .mock("POST", "/api/register/")
        .match_header("authorization", Matcher::Missing)
        .match_body(Matcher::PartialJson(json!({ "username": "jane" })))
        .with_status(201)
        .with_body(r#"{"username": "jane"}"#)
        .create_async()
        .await;

    let storefront = Storefront::new(
        coordinator(&server.url(), Arc::new(MemoryStore::new())),
        StorefrontConfig::default(),
    );
    let created = storefront
        .register(&NewAccount {
            username: "jane".into(),
            email: "jane@example.com".into(),
            password: "s3cret!".into(),
            first_name: None,
            last_name: None,
        })
        .await
        .expect("registration should succeed");

    register.assert_async().await;
    assert_eq!(created["username"], "jane");
}

#[tokio::test]
async fn validation_errors_reach_the_caller() {
    let mut server = Server::new_async().await;
    let _register = server
        .mock("POST", "/api/register/")
        .with_status(400)
        .with_body(r#"{"username": ["A user with that username already exists."]}"#)
        .create_async()
        .await;

    let storefront = Storefront::new(
        coordinator(&server.url(), Arc::new(MemoryStore::new())),
        StorefrontConfig::default(),
    );
    let err = storefront
        .register(&NewAccount {
            username: "jane".into(),
            email: "jane@example.com".into(),
            password: "pw".into(),
            first_name: None,
            last_name: None,
        })
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
    assert!(err.to_string().contains("already exists"));
}

#[tokio::test]
async fn storefront_calls_share_the_refresh() {
    let mut server = Server::new_async().await;
    let old = mint(PAST_EXP, false, "old");
    let new = mint(FUTURE_EXP, false, "new");
    let _products_old = mock_get(&mut server, "/api/products/", &old, 401, "{}", 1).await;
    let _orders_old = mock_get(&mut server, ORDERS, &old, 401, "{}", 1).await;
    let refresh = mock_refresh_ok(&mut server, "r1", &new, 1).await;
    let _products_new = mock_get(&mut server, "/api/products/", &new, 200, "[]", 1).await;
    let _orders_new = mock_get(&mut server, ORDERS, &new, 200, "[]", 1).await;

    let storefront = storefront_for(&server.url(), &old);
    let (products, orders) = tokio::join!(storefront.list_products(), storefront.list_orders());

    assert!(products.expect("products").is_empty());
    assert!(orders.expect("orders").is_empty());
    refresh.assert_async().await;
}

#[tokio::test]
async fn commands_run_against_configured_backend() {
    let mut server = Server::new_async().await;
    let access = mint(FUTURE_EXP, true, "a");
    let _login = server
        .mock("POST", "/api/token/")
        .with_status(200)
        .with_body(json!({ "access": access, "refresh": "r1" }).to_string())
        .create_async()
        .await;
    let _orders = mock_get(&mut server, ORDERS, &access, 200, r#"[{"order_id": 3, "status": "ready"}]"#, 1).await;

    let yaml = format!(
        r#"
version: "1.0.0"
api:
  base_url: "{}"
  timeout_in_ms: 3000
store:
  enabled: false
logging:
  level: warn
  format: json
"#,
        server.url()
    );
    let config = load_config_str(&yaml).expect("config should parse");
    let state = build_state(Arc::new(config)).expect("state should build");

    let before = run(&state, Command::Status).await.unwrap();
    assert_eq!(before, json!({ "authenticated": false, "role": null }));

    let login = run(
        &state,
        Command::Login {
            username: "admin".into(),
            password: "admin".into(),
        },
    )
    .await
    .unwrap();
    assert_eq!(login["role"], "admin");

    let orders = run(&state, Command::Orders).await.unwrap();
    assert_eq!(orders[0]["status"], "ready");

    let after = run(&state, Command::Logout).await.unwrap();
    assert_eq!(after["authenticated"], false);

    let _anonymous = server
        .mock("GET", ORDERS)
        .match_header("authorization", Matcher::Missing)
        .with_status(401)
        .create_async()
        .await;
    let signed_out = run(&state, Command::Orders).await;
    assert_eq!(signed_out.unwrap_err(), SessionError::SessionExpired);
}

#[tokio::test]
async fn order_status_is_patched() {
    let mut server = Server::new_async().await;
    let token = mint(FUTURE_EXP, true, "staff");
    let patch = server
        .mock("PATCH", "/api/orders/9/")
        .match_header("authorization", bearer(&token).as_str())
        .match_body(Matcher::Json(json!({ "status": "ready" })))
        .with_status(200)
        .with_body(r#"{"order_id": 9, "status": "ready"}"#)
        .create_async()
        .await;

    let order = storefront_for(&server.url(), &token)
        .update_order_status("9", "ready")
        .await
        .expect("status should update");

    patch.assert_async().await;
    assert_eq!(order.status, OrderStatus::Ready);
}

#[tokio::test]
async fn pay_command_holds_back_when_stock_is_short() {
    let mut server = Server::new_async().await;
    let access = mint(FUTURE_EXP, false, "a");
    let _login = server
        .mock("POST", "/api/token/")
        .with_status(200)
        .with_body(json!({ "access": access, "refresh": "r1" }).to_string())
        .create_async()
        .await;
    let _orders = mock_get(&mut server, ORDERS, &access, 200, r#"[{"order_id": 9, "status": "pending"}]"#, 1).await;
    let _detail = mock_get(
        &mut server,
        "/api/orders/9/",
        &access,
        200,
        r#"{"order_id": 9, "status": "pending", "total_amount": "7.00",
            "items": [{"id": 1, "quantity": 2, "product": {"product_id": "P2", "price": "3.50"}}]}"#,
        1,
    )
    .await;
    let _stock = mock_stock(&mut server, &access, "P2", r#"[{"quantity_in_stock": 1}]"#).await;
    let pay = server
        .mock("POST", "/api/payments/")
        .expect(0)
        .create_async()
        .await;

    let yaml = format!(
        "version: \"1.0.0\"\napi:\n  base_url: \"{}\"\n  timeout_in_ms: 3000\n",
        server.url()
    );
    let state = build_state(Arc::new(load_config_str(&yaml).unwrap())).unwrap();
    run(
        &state,
        Command::Login {
            username: "jane".into(),
            password: "pw".into(),
        },
    )
    .await
    .unwrap();

    let result = run(
        &state,
        Command::Pay {
            payment_method_id: "pm_card_visa".into(),
        },
    )
    .await
    .unwrap();

    pay.assert_async().await;
    assert_eq!(result["paid"], false);
    assert_eq!(result["shortfalls"][0]["available"], 1);
}
