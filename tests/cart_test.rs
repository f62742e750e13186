mod common;

use axum::http::{Method, StatusCode};
use common::{body_json, decimal_field, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

async fn create_cart(app: &TestApp) -> String {
    let response = app.request(Method::POST, "/api/v1/carts", None, None).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let cart = body_json(response).await;
    cart["id"].as_str().expect("cart id").to_string()
}

#[tokio::test]
async fn adding_the_same_product_merges_lines() {
    let app = TestApp::new().await;
    let category = app.seed_category("Shoes").await;
    let product = app
        .seed_product(category.id, "Comfort Sneaker", "SNK-001", dec!(4990.00))
        .await;
    let cart_id = create_cart(&app).await;
    let items_url = format!("/api/v1/carts/{cart_id}/items");

    for _ in 0..2 {
        let response = app
            .request(
                Method::POST,
                &items_url,
                Some(json!({ "product_id": product.id, "quantity": 1 })),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .request(Method::GET, &format!("/api/v1/carts/{cart_id}"), None, None)
        .await;
    let cart = body_json(response).await;
    assert_eq!(cart["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(cart["items"][0]["quantity"], json!(2));
    assert_eq!(decimal_field(&cart["subtotal"]), dec!(9980.00));
}

#[tokio::test]
async fn cart_always_shows_current_prices() {
    let app = TestApp::new().await;
    let (_, staff_token) = app.seed_user("admin@example.com", true).await;
    let category = app.seed_category("Shoes").await;
    let product = app
        .seed_product(category.id, "Comfort Sneaker", "SNK-001", dec!(4990.00))
        .await;
    let cart_id = create_cart(&app).await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/carts/{cart_id}/items"),
            Some(json!({ "product_id": product.id, "quantity": 1 })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(
            Method::PUT,
            "/api/v1/products/comfort-sneaker",
            Some(json!({ "price": "5990.00" })),
            Some(&staff_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(Method::GET, &format!("/api/v1/carts/{cart_id}"), None, None)
        .await;
    let cart = body_json(response).await;
    assert_eq!(decimal_field(&cart["items"][0]["unit_price"]), dec!(5990.00));
    assert_eq!(decimal_field(&cart["subtotal"]), dec!(5990.00));
}

#[tokio::test]
async fn zero_quantity_removes_the_line() {
    let app = TestApp::new().await;
    let category = app.seed_category("Shoes").await;
    let product = app
        .seed_product(category.id, "Comfort Sneaker", "SNK-001", dec!(4990.00))
        .await;
    let cart_id = create_cart(&app).await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/carts/{cart_id}/items"),
            Some(json!({ "product_id": product.id, "quantity": 3 })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/carts/{cart_id}/items/{}", product.id),
            Some(json!({ "quantity": 0 })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cart = body_json(response).await;
    assert_eq!(cart["items"].as_array().map(Vec::len), Some(0));
    assert_eq!(decimal_field(&cart["subtotal"]), dec!(0));
}

#[tokio::test]
async fn soft_deleted_product_line_is_flagged_and_excluded_from_subtotal() {
    let app = TestApp::new().await;
    let (_, staff_token) = app.seed_user("admin@example.com", true).await;
    let category = app.seed_category("Shoes").await;
    let sneaker = app
        .seed_product(category.id, "Comfort Sneaker", "SNK-001", dec!(4990.00))
        .await;
    let boots = app
        .seed_product(category.id, "Winter Boots", "BT-001", dec!(8990.00))
        .await;
    let cart_id = create_cart(&app).await;

    for product_id in [sneaker.id, boots.id] {
        let response = app
            .request(
                Method::POST,
                &format!("/api/v1/carts/{cart_id}/items"),
                Some(json!({ "product_id": product_id, "quantity": 1 })),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .request(
            Method::DELETE,
            "/api/v1/products/comfort-sneaker",
            None,
            Some(&staff_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .request(Method::GET, &format!("/api/v1/carts/{cart_id}"), None, None)
        .await;
    let cart = body_json(response).await;
    assert_eq!(cart["items"].as_array().map(Vec::len), Some(2));
    let sneaker_line = cart["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|i| i["slug"] == json!("comfort-sneaker"))
        .expect("sneaker line present");
    assert_eq!(sneaker_line["available"], json!(false));
    assert_eq!(decimal_field(&cart["subtotal"]), dec!(8990.00));

    // Checkout refuses the cart while it holds an unavailable line.
    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "cart_id": cart_id,
                "email": "buyer@example.com",
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
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
