mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;
use uuid::Uuid;

use common::{basket, TestApp};
use marketplace_server::models::UserRole;
use marketplace_server::store::{InventoryStore, OrderStore};

#[tokio::test]
async fn health_check_responds() {
    let app = TestApp::new();
    let (status, _) = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn cod_checkout_decrements_stock_and_counts_sales() {
    let app = TestApp::new();
    let buyer = app.token(Uuid::new_v4(), UserRole::User);
    let shop = Uuid::new_v4();
    let product = app.seed_product(shop, Some(10)).await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/orders/checkout",
            Some(&buyer),
            Some(json!([basket(shop, product, 2, "COD")])),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    let order = &body["data"][0];
    assert_eq!(order["payment_state"], "Pending");
    assert_eq!(order["delivery_state"], "Ordered Successfully");
    assert_eq!(order["quantity"], 2);
    assert_eq!(order["total"], 50_000);
    assert_eq!(order["lines"].as_array().unwrap().len(), 1);

    let stock = app.store.stock_for(product, shop).await.unwrap().unwrap();
    assert_eq!(stock.quantity, 8);
    assert_eq!(app.store.sold_quantity(product).await.unwrap(), Some(2));
}

#[tokio::test]
async fn every_line_is_persisted_and_counted() {
    let app = TestApp::new();
    let buyer = app.token(Uuid::new_v4(), UserRole::User);
    let shop = Uuid::new_v4();
    let stocked = app.seed_product(shop, Some(5)).await;
    let unstocked = app.seed_product(shop, None).await;

    let mut order = basket(shop, stocked, 1, "COD");
    order["items"] = json!([
        { "product_id": stocked, "quantity": 1, "total": 10_000 },
        { "product_id": unstocked, "quantity": 3, "total": 30_000 },
        { "product_id": stocked, "quantity": 2, "total": 20_000, "note": "gift wrap" },
    ]);
    let id = app.place_order_with(&buyer, order).await;

    let lines = app.store.lines_for_orders(&[id]).await.unwrap();
    assert_eq!(lines.len(), 3);
    assert_eq!(app.store.sold_quantity(stocked).await.unwrap(), Some(3));
    assert_eq!(app.store.sold_quantity(unstocked).await.unwrap(), Some(3));
    assert_eq!(
        app.store.stock_for(stocked, shop).await.unwrap().unwrap().quantity,
        2
    );

    let (_, body) = app.order(id).await;
    assert_eq!(body["data"]["quantity"], 6);
    assert_eq!(body["data"]["total"], 60_000);
}

#[tokio::test]
async fn insufficient_stock_rejects_the_whole_checkout() {
    let app = TestApp::new();
    let buyer_id = Uuid::new_v4();
    let buyer = app.token(buyer_id, UserRole::User);
    let shop_a = Uuid::new_v4();
    let shop_b = Uuid::new_v4();
    let plenty = app.seed_product(shop_a, Some(10)).await;
    let scarce = app.seed_product(shop_b, Some(1)).await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/orders/checkout",
            Some(&buyer),
            Some(json!([
                basket(shop_a, plenty, 2, "COD"),
                basket(shop_b, scarce, 2, "COD"),
            ])),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("Insufficient stock"));

    assert_eq!(
        app.store.stock_for(plenty, shop_a).await.unwrap().unwrap().quantity,
        10
    );
    assert_eq!(app.store.sold_quantity(plenty).await.unwrap(), Some(0));
    assert!(app.store.list_shop_orders(shop_a).await.unwrap().is_empty());
}

#[tokio::test]
async fn checkout_validates_input() {
    let app = TestApp::new();
    let buyer = app.token(Uuid::new_v4(), UserRole::User);
    let shop = Uuid::new_v4();
    let product = app.seed_product(shop, None).await;

    let (status, _) = app
        .request(Method::POST, "/api/orders/checkout", None, Some(json!([])))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .request(Method::POST, "/api/orders/checkout", Some(&buyer), Some(json!([])))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut zero_quantity = basket(shop, product, 1, "COD");
    zero_quantity["items"][0]["quantity"] = json!(0);
    let (status, _) = app
        .request(
            Method::POST,
            "/api/orders/checkout",
            Some(&buyer),
            Some(json!([zero_quantity])),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .request(
            Method::POST,
            "/api/orders/checkout",
            Some(&buyer),
            Some(json!([basket(shop, Uuid::new_v4(), 1, "COD")])),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("No product found"));
}

#[tokio::test]
async fn checkout_rejects_out_of_range_amounts() {
    let app = TestApp::new();
    let buyer = app.token(Uuid::new_v4(), UserRole::User);
    let shop = Uuid::new_v4();
    let product = app.seed_product(shop, Some(10)).await;

    let mut huge_line = basket(shop, product, 1, "VNPAY");
    huge_line["items"][0]["total"] = json!(i64::MAX);
    let mut huge_basket = basket(shop, product, 1, "VNPAY");
    huge_basket["total"] = json!(1_000_000_000_001i64);
    let mut huge_quantity = basket(shop, product, 1, "COD");
    huge_quantity["items"][0]["quantity"] = json!(10_001);

    for order in [huge_line, huge_basket, huge_quantity] {
        let (status, body) = app
            .request(
                Method::POST,
                "/api/orders/checkout",
                Some(&buyer),
                Some(json!([order])),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "accepted: {body}");
        assert_eq!(body["success"], false);
    }

    let stock = app.store.stock_for(product, shop).await.unwrap().unwrap();
    assert_eq!(stock.quantity, 10);
    assert_eq!(app.store.sold_quantity(product).await.unwrap(), Some(0));
}

#[tokio::test]
async fn malformed_requests_get_the_error_envelope() {
    let app = TestApp::new();
    let buyer = app.token(Uuid::new_v4(), UserRole::User);

    let (status, body) = app
        .request(Method::GET, "/api/orders/not-a-uuid", None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());

    let (status, body) = app
        .request(
            Method::POST,
            "/api/orders/checkout",
            Some(&buyer),
            Some(json!({ "x": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = app
        .request(
            Method::GET,
            "/api/orders/history?limit=many",
            Some(&buyer),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn ghn_shipments_record_code_or_error() {
    let app = TestApp::new();
    let buyer = app.token(Uuid::new_v4(), UserRole::User);
    let shop = Uuid::new_v4();
    let product = app.seed_product(shop, Some(10)).await;

    let mut shipped = basket(shop, product, 1, "COD");
    shipped["shipping_method"] = json!("GHN");
    let id = app.place_order_with(&buyer, shipped.clone()).await;

    let (_, body) = app.order(id).await;
    assert_eq!(body["data"]["carrier_order_code"], format!("GHN-{id}"));
    assert!(body["data"]["shipment_error"].is_null());
    assert_eq!(app.carrier.requests.lock().unwrap()[0].cod_amount, 25_000);

    app.carrier.fail_with("Invalid ward code");
    let (status, body) = app
        .request(
            Method::POST,
            "/api/orders/checkout",
            Some(&buyer),
            Some(json!([shipped])),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let order = &body["data"][0];
    assert!(order["carrier_order_code"].is_null());
    assert!(order["shipment_error"]
        .as_str()
        .unwrap()
        .contains("Invalid ward code"));
    assert_eq!(
        app.store.stock_for(product, shop).await.unwrap().unwrap().quantity,
        8
    );
}

#[tokio::test]
async fn cancel_is_allowed_only_from_early_states() {
    let app = TestApp::new();
    let buyer = app.token(Uuid::new_v4(), UserRole::User);
    let shop = Uuid::new_v4();
    let product = app.seed_product(shop, Some(100)).await;

    for early in [None, Some("Getting Product"), Some("Packing")] {
        let id = app.place_order(&buyer, shop, product, 1).await;
        if let Some(state) = early {
            assert_eq!(app.advance(id, state).await, StatusCode::OK);
        }

        let (status, body) = app
            .request(Method::PUT, &format!("/api/orders/{id}/cancel"), Some(&buyer), None)
            .await;
        assert_eq!(status, StatusCode::OK, "cancel from {early:?}");
        assert_eq!(body["data"]["delivery_state"], "Cancelled");
    }

    for late in ["Shipping", "Delivered"] {
        let id = app.place_order(&buyer, shop, product, 1).await;
        assert_eq!(app.advance(id, late).await, StatusCode::OK);

        let (status, body) = app
            .request(Method::PUT, &format!("/api/orders/{id}/cancel"), Some(&buyer), None)
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(
            body["error"],
            format!("Cannot cancel order with current state {late}")
        );

        let (_, body) = app.order(id).await;
        assert_eq!(body["data"]["delivery_state"], late);
    }
}

#[tokio::test]
async fn cancelled_and_received_orders_cannot_be_cancelled_again() {
    let app = TestApp::new();
    let buyer = app.token(Uuid::new_v4(), UserRole::User);
    let shop = Uuid::new_v4();
    let product = app.seed_product(shop, Some(100)).await;

    let cancelled = app.place_order(&buyer, shop, product, 1).await;
    let uri = format!("/api/orders/{cancelled}/cancel");
    app.request(Method::PUT, &uri, Some(&buyer), None).await;
    let (status, _) = app.request(Method::PUT, &uri, Some(&buyer), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let received = app.place_order(&buyer, shop, product, 1).await;
    app.advance(received, "Delivered").await;
    app.request(
        Method::PUT,
        &format!("/api/orders/{received}/confirm"),
        Some(&buyer),
        None,
    )
    .await;
    let (status, _) = app
        .request(
            Method::PUT,
            &format!("/api/orders/{received}/cancel"),
            Some(&buyer),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn cancel_by_non_owner_is_unauthorized() {
    let app = TestApp::new();
    let buyer = app.token(Uuid::new_v4(), UserRole::User);
    let stranger = app.token(Uuid::new_v4(), UserRole::User);
    let shop = Uuid::new_v4();
    let product = app.seed_product(shop, Some(10)).await;
    let id = app.place_order(&buyer, shop, product, 1).await;

    let (status, body) = app
        .request(Method::PUT, &format!("/api/orders/{id}/cancel"), Some(&stranger), None)
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "This user cannot cancel this order");
    let (_, body) = app.order(id).await;
    assert_eq!(body["data"]["delivery_state"], "Ordered Successfully");
}

#[tokio::test]
async fn cancel_keeps_stock_consumed() {
    let app = TestApp::new();
    let buyer = app.token(Uuid::new_v4(), UserRole::User);
    let shop = Uuid::new_v4();
    let product = app.seed_product(shop, Some(10)).await;
    let id = app.place_order(&buyer, shop, product, 4).await;

    app.request(Method::PUT, &format!("/api/orders/{id}/cancel"), Some(&buyer), None)
        .await;

    assert_eq!(
        app.store.stock_for(product, shop).await.unwrap().unwrap().quantity,
        6
    );
}

#[tokio::test]
async fn confirm_requires_delivered_and_settles_payment() {
    let app = TestApp::new();
    let buyer = app.token(Uuid::new_v4(), UserRole::User);
    let shop = Uuid::new_v4();
    let product = app.seed_product(shop, Some(10)).await;
    let id = app.place_order(&buyer, shop, product, 1).await;
    let uri = format!("/api/orders/{id}/confirm");

    let (status, body) = app.request(Method::PUT, &uri, Some(&buyer), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body["error"],
        "Cannot confirm order with current state Ordered Successfully"
    );

    assert_eq!(app.advance(id, "Delivered").await, StatusCode::OK);
    let (status, body) = app.request(Method::PUT, &uri, Some(&buyer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["delivery_state"], "Received");
    assert_eq!(body["data"]["payment_state"], "Paid");
}

#[tokio::test]
async fn advance_moves_forward_only_and_needs_staff() {
    let app = TestApp::new();
    let buyer = app.token(Uuid::new_v4(), UserRole::User);
    let shop = Uuid::new_v4();
    let product = app.seed_product(shop, Some(10)).await;
    let id = app.place_order(&buyer, shop, product, 1).await;
    let uri = format!("/api/orders/{id}/state");

    let (status, _) = app
        .request(Method::PUT, &uri, Some(&buyer), Some(json!({ "state": "Shipping" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(app.advance(id, "Platform Received").await, StatusCode::OK);
    assert_eq!(app.advance(id, "Shipping").await, StatusCode::OK);
    assert_eq!(app.advance(id, "Packing").await, StatusCode::CONFLICT);
    assert_eq!(app.advance(id, "Shipping").await, StatusCode::CONFLICT);
    assert_eq!(app.advance(id, "Received").await, StatusCode::CONFLICT);
    assert_eq!(app.advance(id, "Cancelled").await, StatusCode::CONFLICT);

    let seller = app.token(Uuid::new_v4(), UserRole::Seller);
    let (status, _) = app
        .request(Method::PUT, &uri, Some(&seller), Some(json!({ "state": "Lost" })))
        .await;
    assert!(status.is_client_error());

    let (_, body) = app.order(id).await;
    assert_eq!(body["data"]["delivery_state"], "Shipping");
    assert_eq!(body["data"]["version"], 2);
}

#[tokio::test]
async fn update_changes_contact_fields_only() {
    let app = TestApp::new();
    let buyer = app.token(Uuid::new_v4(), UserRole::User);
    let stranger = app.token(Uuid::new_v4(), UserRole::User);
    let admin = app.token(Uuid::new_v4(), UserRole::Admin);
    let shop = Uuid::new_v4();
    let product = app.seed_product(shop, Some(10)).await;
    let id = app.place_order(&buyer, shop, product, 1).await;
    let uri = format!("/api/orders/{id}");

    let (status, _) = app
        .request(Method::PUT, &uri, Some(&stranger), Some(json!({ "phone": "0999999999" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .request(
            Method::PUT,
            &uri,
            Some(&buyer),
            Some(json!({
                "address": "1 Vo Van Ngan, Thu Duc",
                "delivery_state": "Delivered",
                "payment_state": "Paid",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["address"], "1 Vo Van Ngan, Thu Duc");
    assert_eq!(body["data"]["delivery_state"], "Ordered Successfully");
    assert_eq!(body["data"]["payment_state"], "Pending");

    let (status, body) = app
        .request(Method::PUT, &uri, Some(&admin), Some(json!({ "receiver": "Tran Thi B" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["receiver"], "Tran Thi B");

    let (status, _) = app
        .request(Method::PUT, &uri, Some(&buyer), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deleted_orders_disappear_from_reads_and_transitions() {
    let app = TestApp::new();
    let buyer = app.token(Uuid::new_v4(), UserRole::User);
    let shop = Uuid::new_v4();
    let product = app.seed_product(shop, Some(10)).await;
    let id = app.place_order(&buyer, shop, product, 1).await;

    // Warm the cache so deletion must invalidate it
    let (status, _) = app.order(id).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request(Method::DELETE, &format!("/api/orders/{id}"), Some(&buyer), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.order(id).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], format!("No order found with id {id}"));

    let (status, _) = app
        .request(Method::PUT, &format!("/api/orders/{id}/cancel"), Some(&buyer), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reads_reflect_transitions_after_caching() {
    let app = TestApp::new();
    let buyer = app.token(Uuid::new_v4(), UserRole::User);
    let shop = Uuid::new_v4();
    let product = app.seed_product(shop, Some(10)).await;
    let id = app.place_order(&buyer, shop, product, 1).await;

    let (_, body) = app.order(id).await;
    assert_eq!(body["data"]["delivery_state"], "Ordered Successfully");
    assert!(app.cache.contains(&format!("orders:{id}")).await);

    app.request(Method::PUT, &format!("/api/orders/{id}/cancel"), Some(&buyer), None)
        .await;

    let (_, body) = app.order(id).await;
    assert_eq!(body["data"]["delivery_state"], "Cancelled");
}

#[tokio::test]
async fn history_lists_the_callers_orders() {
    let app = TestApp::new();
    let buyer = app.token(Uuid::new_v4(), UserRole::User);
    let other = app.token(Uuid::new_v4(), UserRole::User);
    let seller = app.token(Uuid::new_v4(), UserRole::Seller);
    let shop = Uuid::new_v4();
    let product = app.seed_product(shop, None).await;

    for quantity in 1..=6 {
        app.place_order(&buyer, shop, product, quantity).await;
    }
    app.place_order(&other, shop, product, 1).await;

    let (status, body) = app
        .request(Method::GET, "/api/orders/history", Some(&buyer), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 5);

    let (_, body) = app
        .request(
            Method::GET,
            "/api/orders/history?limit=10&sort=total",
            Some(&buyer),
            None,
        )
        .await;
    let orders = body["data"].as_array().unwrap();
    assert_eq!(orders.len(), 6);
    assert_eq!(orders[0]["total"], 150_000);
    assert_eq!(orders[0]["lines"].as_array().unwrap().len(), 1);

    let (status, _) = app
        .request(Method::GET, "/api/orders/history", Some(&seller), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn shop_orders_are_visible_to_staff() {
    let app = TestApp::new();
    let buyer = app.token(Uuid::new_v4(), UserRole::User);
    let seller = app.token(Uuid::new_v4(), UserRole::Seller);
    let shop = Uuid::new_v4();
    let other_shop = Uuid::new_v4();
    let product = app.seed_product(shop, None).await;
    let other_product = app.seed_product(other_shop, None).await;

    app.place_order(&buyer, shop, product, 1).await;
    app.place_order(&buyer, shop, product, 2).await;
    app.place_order(&buyer, other_shop, other_product, 1).await;

    let uri = format!("/api/shops/{shop}/orders");
    let (status, body) = app.request(Method::GET, &uri, Some(&seller), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (status, _) = app.request(Method::GET, &uri, Some(&buyer), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invalid_tokens_are_rejected() {
    let app = TestApp::new();
    let (status, body) = app
        .request(
            Method::GET,
            "/api/orders/history",
            Some("not-a-jwt"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}
