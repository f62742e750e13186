mod common;

use axum::http::{Method, StatusCode};
use common::{body_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

async fn seed_catalog(app: &TestApp) -> (uuid::Uuid, String) {
    let category = app.seed_category("Shoes").await;
    let product = app
        .seed_product(category.id, "Comfort Sneaker", "SNK-001", dec!(4990.00))
        .await;
    (product.id, product.slug)
}

/// Walk a user through buying the product so their review qualifies as a
/// verified purchase.
async fn buy_product(app: &TestApp, product_id: uuid::Uuid, token: &str, staff_token: &str) {
    let response = app.request(Method::POST, "/api/v1/carts", None, None).await;
    let cart = body_json(response).await;
    let cart_id = cart["id"].as_str().expect("cart id").to_string();

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/carts/{cart_id}/items"),
            Some(json!({ "product_id": product_id, "quantity": 1 })),
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
                "email": "buyer@example.com",
                "phone": "+7 900 000-00-00",
                "full_name": "Ivan Petrov",
                "address": "Tverskaya 1",
                "city": "Moscow",
                "postcode": "125009",
                "country": "RU",
            })),
            Some(token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let outcome = body_json(response).await;
    let order_id = outcome["order"]["id"].as_str().expect("order id").to_string();

    // Mark the order paid so the purchase qualifies.
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
async fn anonymous_review_needs_author_name_and_starts_hidden() {
    let app = TestApp::new().await;
    let (_, slug) = seed_catalog(&app).await;
    let reviews_url = format!("/api/v1/products/{slug}/reviews");

    // Missing author_name is rejected.
    let response = app
        .request(
            Method::POST,
            &reviews_url,
            Some(json!({ "rating": 5, "title": "Great", "body": "Love them" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request(
            Method::POST,
            &reviews_url,
            Some(json!({
                "rating": 5,
                "title": "Great",
                "body": "Love them",
                "author_name": "Anna"
            })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let review = body_json(response).await;
    assert_eq!(review["moderation_status"], json!("pending"));
    assert_eq!(review["verified_purchase"], json!(false));

    // Pending reviews are invisible to the public.
    let response = app.request(Method::GET, &reviews_url, None, None).await;
    let page = body_json(response).await;
    assert_eq!(page["pagination"]["total"], json!(0));
}

#[tokio::test]
async fn approval_makes_review_public_and_feeds_rating_aggregate() {
    let app = TestApp::new().await;
    let (_, staff_token) = app.seed_user("admin@example.com", true).await;
    let (_, slug) = seed_catalog(&app).await;
    let reviews_url = format!("/api/v1/products/{slug}/reviews");

    let response = app
        .request(
            Method::POST,
            &reviews_url,
            Some(json!({
                "rating": 4,
                "title": "Solid",
                "body": "Does the job",
                "author_name": "Anna"
            })),
            None,
        )
        .await;
    let review = body_json(response).await;
    let review_id = review["id"].as_str().expect("review id").to_string();

    // Shows up in the staff moderation queue.
    let response = app
        .request(
            Method::GET,
            "/api/v1/reviews/pending",
            None,
            Some(&staff_token),
        )
        .await;
    let queue = body_json(response).await;
    assert_eq!(queue["pagination"]["total"], json!(1));

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/reviews/{review_id}/moderate"),
            Some(json!({ "decision": "approve", "note": "ok" })),
            Some(&staff_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let moderated = body_json(response).await;
    assert_eq!(moderated["moderation_status"], json!("approved"));

    let response = app.request(Method::GET, &reviews_url, None, None).await;
    let page = body_json(response).await;
    assert_eq!(page["pagination"]["total"], json!(1));

    // Aggregate counts only approved reviews.
    let response = app
        .request(Method::GET, &format!("/api/v1/products/{slug}"), None, None)
        .await;
    let detail = body_json(response).await;
    assert_eq!(detail["reviews_count"], json!(1));
    assert_eq!(detail["average_rating"], json!(4.0));
}

#[tokio::test]
async fn purchase_marks_review_verified() {
    let app = TestApp::new().await;
    let (_, staff_token) = app.seed_user("admin@example.com", true).await;
    let (buyer_id, buyer_token) = app.seed_user("buyer@example.com", false).await;
    let (product_id, slug) = seed_catalog(&app).await;

    buy_product(&app, product_id, &buyer_token, &staff_token).await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/products/{slug}/reviews"),
            Some(json!({ "rating": 5, "title": "Great", "body": "Worth it" })),
            Some(&buyer_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let review = body_json(response).await;
    assert_eq!(review["verified_purchase"], json!(true));
    assert_eq!(review["user_id"], json!(buyer_id.to_string()));

    // A user without a qualifying purchase stays unverified.
    let (_, other_token) = app.seed_user("window-shopper@example.com", false).await;
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/products/{slug}/reviews"),
            Some(json!({ "rating": 3, "title": "Meh", "body": "Never bought it" })),
            Some(&other_token),
        )
        .await;
    let review = body_json(response).await;
    assert_eq!(review["verified_purchase"], json!(false));
}

#[tokio::test]
async fn editing_an_approved_review_resets_it_to_pending() {
    let app = TestApp::new().await;
    let (_, staff_token) = app.seed_user("admin@example.com", true).await;
    let (_, author_token) = app.seed_user("author@example.com", false).await;
    let (_, slug) = seed_catalog(&app).await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/products/{slug}/reviews"),
            Some(json!({ "rating": 4, "title": "Solid", "body": "Good" })),
            Some(&author_token),
        )
        .await;
    let review = body_json(response).await;
    let review_id = review["id"].as_str().expect("review id").to_string();

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/reviews/{review_id}/moderate"),
            Some(json!({ "decision": "approve" })),
            Some(&staff_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/reviews/{review_id}"),
            Some(json!({ "body": "Actually even better after a month" })),
            Some(&author_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let edited = body_json(response).await;
    assert_eq!(edited["moderation_status"], json!("pending"));
    assert_eq!(edited["moderated_by"], json!(null));
}

#[tokio::test]
async fn second_active_review_per_user_is_rejected() {
    let app = TestApp::new().await;
    let (_, author_token) = app.seed_user("author@example.com", false).await;
    let (_, slug) = seed_catalog(&app).await;
    let reviews_url = format!("/api/v1/products/{slug}/reviews");

    let response = app
        .request(
            Method::POST,
            &reviews_url,
            Some(json!({ "rating": 4, "title": "Solid", "body": "Good" })),
            Some(&author_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let review = body_json(response).await;
    let review_id = review["id"].as_str().expect("review id").to_string();

    let response = app
        .request(
            Method::POST,
            &reviews_url,
            Some(json!({ "rating": 5, "title": "Again", "body": "Twice" })),
            Some(&author_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Deleting the first frees the slot.
    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/reviews/{review_id}"),
            None,
            Some(&author_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .request(
            Method::POST,
            &reviews_url,
            Some(json!({ "rating": 5, "title": "Again", "body": "Twice" })),
            Some(&author_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn moderation_requires_staff() {
    let app = TestApp::new().await;
    let (_, user_token) = app.seed_user("user@example.com", false).await;
    let (_, slug) = seed_catalog(&app).await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/products/{slug}/reviews"),
            Some(json!({
                "rating": 1,
                "title": "Bad",
                "body": "Spam",
                "author_name": "Spammer"
            })),
            None,
        )
        .await;
    let review = body_json(response).await;
    let review_id = review["id"].as_str().expect("review id");

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/reviews/{review_id}/moderate"),
            Some(json!({ "decision": "reject" })),
            Some(&user_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
