use actix_web::{test, App};
use chrono::DateTime;

#[actix_web::test]
async fn test_health_check() {
    let app = test::init_service(
        App::new().configure(food_auth_server::configure)
    ).await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body = test::read_body(resp).await;
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["status"], "healthy");
    assert!(DateTime::parse_from_rfc3339(
        json["timestamp"].as_str().unwrap()
    ).is_ok());
}

#[actix_web::test]
async fn test_protected_routes_need_state() {
    // Without AppState the extractor cannot authenticate and must not panic
    let app = test::init_service(
        App::new().configure(food_auth_server::configure)
    ).await;

    let req = test::TestRequest::post()
        .uri("/auth/logout")
        .insert_header(("Authorization", "Bearer abc"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 500);
}
