mod common;

use axum::http::{Method, StatusCode};
use common::{body_json, decimal_field, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

async fn place_order(app: &TestApp, product_id: uuid::Uuid, quantity: i32, email: &str) -> String {
    let response = app.request(Method::POST, "/api/v1/carts", None, None).await;
    let cart = body_json(response).await;
    let cart_id = cart["id"].as_str().expect("cart id").to_string();

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/carts/{cart_id}/items"),
            Some(json!({ "product_id": product_id, "quantity": quantity })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "cart_id": cart_id,
                "email": email,
                "phone": "+7 900 000-00-00",
                "full_name": "Ivan Petrov",
                "address": "Tverskaya 1",
                "city": "Moscow",
                "postcode": "125009",
                "country": "RU",
            })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let outcome = body_json(response).await;
    outcome["order"]["id"].as_str().expect("order id").to_string()
}

async fn mark_paid(app: &TestApp, order_id: &str, staff_token: &str) {
    let response = app
        .request(
            Method::PATCH,
            &format!("/api/v1/orders/{order_id}/status"),
            Some(json!({ "status": "paid", "payment_status": "paid" })),
            Some(staff_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn overview_is_staff_only() {
    let app = TestApp::new().await;
    let (_, user_token) = app.seed_user("user@example.com", false).await;

    let response = app
        .request(Method::GET, "/api/v1/stats/overview", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .request(Method::GET, "/api/v1/stats/overview", None, Some(&user_token))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn overview_reports_gross_revenue_and_top_products() {
    let app = TestApp::new().await;
    let (_, staff_token) = app.seed_user("admin@example.com", true).await;
    let category = app.seed_category("Shoes").await;
    let sneaker = app
        .seed_product(category.id, "Comfort Sneaker", "SNK-001", dec!(4990.00))
        .await;
    let boots = app
        .seed_product(category.id, "Winter Boots", "BT-001", dec!(8990.00))
        .await;

    let first = place_order(&app, sneaker.id, 2, "a@example.com").await;
    let second = place_order(&app, boots.id, 1, "b@example.com").await;
    // Third order stays unpaid; revenue is gross, so it still counts.
    let unpaid = place_order(&app, sneaker.id, 1, "c@example.com").await;

    mark_paid(&app, &first, &staff_token).await;
    mark_paid(&app, &second, &staff_token).await;
    // Cancelling an order does not remove it from the window either.
    let response = app
        .request(
            Method::PATCH,
            &format!("/api/v1/orders/{unpaid}/status"),
            Some(json!({ "status": "cancelled" })),
            Some(&staff_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(
            Method::GET,
            "/api/v1/stats/overview",
            None,
            Some(&staff_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let stats = body_json(response).await;

    assert_eq!(stats["total_orders"], json!(3));
    assert_eq!(stats["paid_orders"], json!(2));

    // Gross revenue: 2x4990 + 8990 + 4990, paid or not.
    let breakdown = stats["revenue_by_currency"].as_array().expect("breakdown");
    assert_eq!(breakdown.len(), 1);
    assert_eq!(breakdown[0]["currency"], json!("RUB"));
    assert_eq!(breakdown[0]["orders"], json!(3));
    assert_eq!(decimal_field(&breakdown[0]["revenue"]), dec!(23960.00));

    // Sneakers sold three units against one pair of boots.
    let top = stats["top_products"].as_array().expect("top products");
    assert_eq!(top[0]["product_name"], json!("Comfort Sneaker"));
    assert_eq!(top[0]["total_quantity"], json!(3));
    assert_eq!(decimal_field(&top[0]["total_revenue"]), dec!(14970.00));
    assert_eq!(top[1]["product_name"], json!("Winter Boots"));
}

#[tokio::test]
async fn overview_rejects_inverted_date_range() {
    let app = TestApp::new().await;
    let (_, staff_token) = app.seed_user("admin@example.com", true).await;

    let response = app
        .request(
            Method::GET,
            "/api/v1/stats/overview?date_from=2026-02-01&date_to=2026-01-01",
            None,
            Some(&staff_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn overview_date_window_excludes_outside_orders() {
    let app = TestApp::new().await;
    let (_, staff_token) = app.seed_user("admin@example.com", true).await;
    let category = app.seed_category("Shoes").await;
    let sneaker = app
        .seed_product(category.id, "Comfort Sneaker", "SNK-001", dec!(4990.00))
        .await;

    let order = place_order(&app, sneaker.id, 1, "a@example.com").await;
    mark_paid(&app, &order, &staff_token).await;

    // A window wholly in the past sees nothing.
    let response = app
        .request(
            Method::GET,
            "/api/v1/stats/overview?date_from=2020-01-01&date_to=2020-02-01",
            None,
            Some(&staff_token),
        )
        .await;
    let stats = body_json(response).await;
    assert_eq!(stats["total_orders"], json!(0));
    assert_eq!(stats["paid_orders"], json!(0));
}
