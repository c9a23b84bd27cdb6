use axum::http::StatusCode;
use serde_json::json;

mod common;

#[tokio::test]
async fn health_root_reports_connected_store() {
    let app = common::create_test_app().await;
    let (status, body) = common::send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "connected");
}

#[tokio::test]
async fn unknown_route_is_a_json_404() {
    let app = common::create_test_app().await;
    let (status, body) = common::send(&app, "GET", "/nonexistent/path", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn sets_require_a_token() {
    let app = common::create_test_app().await;
    let (status, _) = common::send(&app, "GET", "/api/sets", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_login_verify_flow() {
    let app = common::create_test_app().await;
    let token = common::register(&app, "ada@example.com").await;

    let (status, body) = common::send(&app, "GET", "/api/auth/verify", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "ada@example.com");

    let (status, body) = common::send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({
            "email": "ada@example.com",
            "password": "correct horse battery staple",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["token"].is_string());

    let (status, _) = common::send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({
            "email": "ada@example.com",
            "password": "wrong password",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let app = common::create_test_app().await;
    common::register(&app, "dup@example.com").await;

    let (status, _) = common::send(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "email": "dup@example.com",
            "password": "another password",
            "username": "other",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn generate_splits_colon_lines() {
    let app = common::create_test_app().await;
    let (status, body) = common::send_text(&app, "/api/generate", "Paris:Capital of France").await;
    assert_eq!(status, StatusCode::OK);
    let cards = body.as_array().expect("bare card array");
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0]["front"], "Paris");
    assert_eq!(cards[0]["back"], "Capital of France");
}

#[tokio::test]
async fn generate_rejects_empty_input_locally() {
    let app = common::create_test_app().await;
    let (status, body) = common::send_text(&app, "/api/generate", "   \n ").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn generate_rejects_malformed_lines_wholesale() {
    let app = common::create_test_app().await;
    let (status, body) =
        common::send_text(&app, "/api/generate", "Paris:Capital of France\njust words").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["details"].is_string());
}

#[tokio::test]
async fn empty_title_saves_nothing() {
    let app = common::create_test_app().await;
    let token = common::register(&app, "saver@example.com").await;

    let (status, body) = common::send(
        &app,
        "POST",
        "/api/sets",
        Some(&token),
        Some(json!({
            "title": "",
            "cards": [{"front": "Paris", "back": "Capital of France"}],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (_, body) = common::send(&app, "GET", "/api/sets", Some(&token), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn set_list_aggregates_mastery() {
    let app = common::create_test_app().await;
    let token = common::register(&app, "list@example.com").await;

    let (status, _) = common::send(
        &app,
        "POST",
        "/api/sets",
        Some(&token),
        Some(json!({
            "title": "Capitals",
            "cards": [
                {"front": "Paris", "back": "France", "mastery": 0},
                {"front": "Rome", "back": "Italy", "mastery": 100},
            ],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = common::send(&app, "GET", "/api/sets", Some(&token), None).await;
    let sets = body["data"].as_array().unwrap();
    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0]["cardCount"], 2);
    assert_eq!(sets[0]["mastery"], 50);
    assert_eq!(sets[0]["tier"], "medium");
}

#[tokio::test]
async fn full_study_session_flow() {
    let app = common::create_test_app().await;
    let token = common::register(&app, "study@example.com").await;

    let (status, body) = common::send(
        &app,
        "POST",
        "/api/sets",
        Some(&token),
        Some(json!({
            "title": "Capitals",
            "cards": [
                {"front": "Paris", "back": "Capital of France"},
                {"front": "Rome", "back": "Capital of Italy"},
            ],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let set_id = body["data"]["id"].as_str().unwrap().to_string();

    // open a session from the saved set
    let (status, body) = common::send(
        &app,
        "POST",
        "/api/study/sessions",
        Some(&token),
        Some(json!({ "setId": set_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let session = body["data"].clone();
    let session_id = session["sessionId"].as_str().unwrap().to_string();
    assert_eq!(session["cardCount"], 2);
    assert_eq!(session["cursor"], 0);
    assert_eq!(session["progress"], 0.5);
    assert_eq!(session["card"]["front"], "Paris");
    assert!(session["card"]["back"].is_null(), "back hidden until flip");

    // flip reveals the back
    let (_, body) = common::send(
        &app,
        "POST",
        &format!("/api/study/sessions/{session_id}/flip"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(body["data"]["card"]["back"], "Capital of France");

    // rate the first card at the top level
    let (status, body) = common::send(
        &app,
        "POST",
        &format!("/api/study/sessions/{session_id}/mastery"),
        Some(&token),
        Some(json!({ "value": 100 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["card"]["mastery"], 100);
    assert_eq!(body["data"]["setMastery"], 50);

    // out-of-range rating is a caller defect, not a user error
    let (status, _) = common::send(
        &app,
        "POST",
        &format!("/api/study/sessions/{session_id}/mastery"),
        Some(&token),
        Some(json!({ "value": 60 })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    // navigation: next moves and resets flip, saturates at the end
    let (_, body) = common::send(
        &app,
        "POST",
        &format!("/api/study/sessions/{session_id}/next"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(body["data"]["cursor"], 1);
    assert_eq!(body["data"]["progress"], 1.0);
    assert_eq!(body["data"]["flipped"], false);

    let (_, body) = common::send(
        &app,
        "POST",
        &format!("/api/study/sessions/{session_id}/next"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(body["data"]["cursor"], 1, "next saturates at last card");

    // the detached write eventually lands in the store
    let mut persisted = false;
    for _ in 0..50 {
        let (_, body) = common::send(
            &app,
            "GET",
            &format!("/api/sets/{set_id}"),
            Some(&token),
            None,
        )
        .await;
        if body["data"]["cards"][0]["mastery"] == 100 {
            persisted = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(persisted, "background mastery write never landed");
}

#[tokio::test]
async fn sessions_from_unsaved_cards_start_at_zero() {
    let app = common::create_test_app().await;
    let token = common::register(&app, "draft@example.com").await;

    let (status, body) = common::send(
        &app,
        "POST",
        "/api/study/sessions",
        Some(&token),
        Some(json!({
            "cards": [
                {"front": "Paris", "back": "Capital of France"},
            ],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["data"]["setId"].is_null());
    assert_eq!(body["data"]["setMastery"], 0);
    assert_eq!(body["data"]["card"]["mastery"], 0);
}

#[tokio::test]
async fn sessions_resume_stored_mastery() {
    let app = common::create_test_app().await;
    let token = common::register(&app, "resume@example.com").await;

    let (_, body) = common::send(
        &app,
        "POST",
        "/api/sets",
        Some(&token),
        Some(json!({
            "title": "Capitals",
            "cards": [{"front": "Paris", "back": "France", "mastery": 75}],
        })),
    )
    .await;
    let set_id = body["data"]["id"].as_str().unwrap().to_string();

    let (_, body) = common::send(
        &app,
        "POST",
        "/api/study/sessions",
        Some(&token),
        Some(json!({ "setId": set_id })),
    )
    .await;
    assert_eq!(body["data"]["card"]["mastery"], 75);
    assert_eq!(body["data"]["setMastery"], 75);
}

#[tokio::test]
async fn sessions_belong_to_their_owner() {
    let app = common::create_test_app().await;
    let owner_token = common::register(&app, "owner@example.com").await;
    let other_token = common::register(&app, "other@example.com").await;

    let (_, body) = common::send(
        &app,
        "POST",
        "/api/study/sessions",
        Some(&owner_token),
        Some(json!({
            "cards": [{"front": "Paris", "back": "France"}],
        })),
    )
    .await;
    let session_id = body["data"]["sessionId"].as_str().unwrap().to_string();

    let (status, _) = common::send(
        &app,
        "GET",
        &format!("/api/study/sessions/{session_id}"),
        Some(&other_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn reloading_a_session_swaps_its_cards() {
    let app = common::create_test_app().await;
    let token = common::register(&app, "reload@example.com").await;

    let (_, body) = common::send(
        &app,
        "POST",
        "/api/sets",
        Some(&token),
        Some(json!({
            "title": "Capitals",
            "cards": [
                {"front": "Paris", "back": "France"},
                {"front": "Rome", "back": "Italy"},
                {"front": "Lima", "back": "Peru"},
            ],
        })),
    )
    .await;
    let set_id = body["data"]["id"].as_str().unwrap().to_string();

    let (_, body) = common::send(
        &app,
        "POST",
        "/api/study/sessions",
        Some(&token),
        Some(json!({
            "cards": [{"front": "scratch", "back": "card"}],
        })),
    )
    .await;
    let session_id = body["data"]["sessionId"].as_str().unwrap().to_string();

    let (status, body) = common::send(
        &app,
        "POST",
        &format!("/api/study/sessions/{session_id}/load"),
        Some(&token),
        Some(json!({ "setId": set_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["cardCount"], 3);
    assert_eq!(body["data"]["cursor"], 0);
    assert_eq!(body["data"]["setId"], set_id.as_str());
}

#[tokio::test]
async fn direct_mastery_write_without_a_session() {
    let app = common::create_test_app().await;
    let token = common::register(&app, "direct@example.com").await;

    let (_, body) = common::send(
        &app,
        "POST",
        "/api/sets",
        Some(&token),
        Some(json!({
            "title": "Capitals",
            "cards": [{"front": "Paris", "back": "France"}],
        })),
    )
    .await;
    let set_id = body["data"]["id"].as_str().unwrap().to_string();
    let card_id = body["data"]["cards"][0]["id"].as_str().unwrap().to_string();

    let (status, _) = common::send(
        &app,
        "PUT",
        &format!("/api/sets/{set_id}/cards/{card_id}/mastery"),
        Some(&token),
        Some(json!({ "value": 75 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = common::send(
        &app,
        "GET",
        &format!("/api/sets/{set_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(body["data"]["cards"][0]["mastery"], 75);
    assert_eq!(body["data"]["mastery"], 75);
    assert_eq!(body["data"]["tier"], "medium");
}
