// End-to-end flows against a real MongoDB (MONGODB_URI, default localhost).
use axum::http::StatusCode;
use serde_json::{json, Value};

mod common;

use common::{
    authorized, create_test_app, get_request, json_request, login, seed_admin, send, unique_email,
    ADMIN_PASSWORD,
};

fn pulse_survey() -> Value {
    json!({
        "title": "Team pulse",
        "description": "Monthly check-in",
        "questions": [
            { "id": "q1", "type": "rating", "title": "How was the month?", "required": true },
            {
                "id": "q2",
                "type": "checkbox",
                "title": "What helped?",
                "options": ["Pairing", "Docs", "Focus time"]
            },
            { "id": "q3", "type": "text", "title": "Anything else?" }
        ]
    })
}

async fn admin_token(app: &axum::Router) -> String {
    let email = unique_email("admin");
    seed_admin(&email).await;
    login(app, &email, ADMIN_PASSWORD).await
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn test_survey_lifecycle() {
    let app = create_test_app().await;
    let token = admin_token(&app).await;

    let (status, body) = send(
        &app,
        authorized(json_request("POST", "/api/surveys", &pulse_survey()), &token),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["survey"]["status"], "draft");
    let survey_id = body["survey"]["id"].as_str().unwrap().to_string();

    // Drafts are hidden from respondents
    let (status, _) = send(&app, get_request(&format!("/api/surveys/{}", survey_id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let submit_uri = format!("/api/surveys/{}/responses", survey_id);
    let (status, _) = send(
        &app,
        json_request("POST", &submit_uri, &json!({ "responses": { "q1": 5 } })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        authorized(
            json_request(
                "POST",
                &format!("/api/surveys/{}/publish", survey_id),
                &json!({ "action": "publish" }),
            ),
            &token,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["survey"]["status"], "published");

    let (status, body) = send(&app, get_request(&format!("/api/surveys/{}", survey_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["survey"].get("createdBy").is_none());
    assert_eq!(body["survey"]["questions"].as_array().unwrap().len(), 3);

    let (status, body) = send(
        &app,
        json_request("POST", &submit_uri, &json!({ "responses": { "q3": "hi" } })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["missingQuestions"], json!(["q1"]));

    let mut response_ids = Vec::new();
    for answers in [
        json!({ "q1": 4, "q2": ["Pairing", "Docs"], "q3": "great month" }),
        json!({ "q1": "5", "q2": ["Pairing"] }),
        json!({ "q1": 3, "q3": "" }),
    ] {
        let (status, body) = send(
            &app,
            json_request("POST", &submit_uri, &json!({ "responses": answers })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["message"], "Response submitted successfully");
        response_ids.push(body["responseId"].as_str().unwrap().to_string());
    }

    let (status, body) = send(
        &app,
        authorized(
            get_request(&format!("/api/surveys/{}/analytics", survey_id)),
            &token,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let analytics = &body["analytics"];
    assert_eq!(analytics["totalResponses"], 3);
    let questions = analytics["questionAnalytics"].as_array().unwrap();
    assert_eq!(questions[0]["questionId"], "q1");
    assert_eq!(questions[0]["average"].as_f64(), Some(4.0));
    assert_eq!(questions[1]["distribution"]["Pairing"], 2);
    assert_eq!(questions[1]["distribution"]["Docs"], 1);

    let (status, body) = send(
        &app,
        authorized(
            get_request(&format!("/api/surveys/{}/responses", survey_id)),
            &token,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["responses"].as_array().unwrap().len(), 3);
    assert_eq!(body["survey"]["responseCount"], 3);

    let (status, body) = send(
        &app,
        authorized(
            json_request(
                "DELETE",
                &format!("/api/responses/{}", response_ids[0]),
                &json!({}),
            ),
            &token,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Response deleted successfully");

    let (status, body) = send(
        &app,
        authorized(
            json_request(
                "POST",
                &format!("/api/surveys/{}/duplicate", survey_id),
                &json!({}),
            ),
            &token,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["survey"]["title"], "Team pulse (Copy)");
    assert_eq!(body["survey"]["status"], "draft");
    assert_eq!(body["survey"]["responseCount"], 0);

    let (status, _) = send(
        &app,
        authorized(
            json_request("DELETE", &format!("/api/surveys/{}", survey_id), &json!({})),
            &token,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, get_request(&format!("/api/surveys/{}", survey_id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn test_signup_logout_revokes_token() {
    let app = create_test_app().await;
    let email = unique_email("member");

    let signup_body = json!({ "email": email, "password": "secret123", "name": "Ada" });
    let (status, body) = send(&app, json_request("POST", "/api/auth/signup", &signup_body)).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["user"]["role"], "user");

    let (status, body) = send(&app, json_request("POST", "/api/auth/signup", &signup_body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "User with this email already exists");

    let token = login(&app, &email, "secret123").await;

    let (status, body) = send(&app, authorized(get_request("/api/auth/me"), &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], email);

    // Members cannot reach admin routes
    let (status, _) = send(
        &app,
        authorized(json_request("POST", "/api/surveys", &pulse_survey()), &token),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        authorized(json_request("POST", "/api/auth/logout", &json!({})), &token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, authorized(get_request("/api/auth/me"), &token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn test_csrf_header_required_for_writes() {
    let app = create_test_app().await;
    let token = admin_token(&app).await;

    let mut request = json_request("POST", "/api/surveys", &pulse_survey());
    request.headers_mut().insert(
        axum::http::header::AUTHORIZATION,
        format!("Bearer {}", token).parse().unwrap(),
    );
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Missing CSRF token");
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn test_survey_from_template() {
    let app = create_test_app().await;
    let token = admin_token(&app).await;

    let (status, body) = send(
        &app,
        authorized(
            json_request(
                "POST",
                "/api/surveys/from-template",
                &json!({ "templateId": "event-feedback", "source": "local" }),
            ),
            &token,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["survey"]["status"], "published");
    assert_eq!(body["survey"]["templateId"], "event-feedback");

    let (status, body) = send(
        &app,
        authorized(
            json_request(
                "POST",
                "/api/surveys/from-template",
                &json!({ "templateId": "no-such-template" }),
            ),
            &token,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"]["triedId"], "no-such-template");
    assert_eq!(body["detail"]["localCount"], 3);

    let template_id = format!("team-retro-{}", mongodb::bson::oid::ObjectId::new().to_hex());
    let template = json!({
        "id": template_id,
        "name": "Team retro",
        "questions": [{ "id": "q1", "type": "textarea", "title": "What went well?" }]
    });
    let (status, _) = send(
        &app,
        authorized(json_request("POST", "/api/templates", &template), &token),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app,
        authorized(json_request("POST", "/api/templates", &template), &token),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Template id already exists");

    let (status, body) = send(&app, authorized(get_request("/api/templates"), &token)).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body["templates"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t["id"].as_str())
        .collect();
    assert_eq!(ids[0], template_id);
    assert!(ids.contains(&"customer-satisfaction"));
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn test_contact_messages() {
    let app = create_test_app().await;
    let token = admin_token(&app).await;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/contact",
            &json!({
                "name": " Ada ",
                "email": "ADA@Example.com",
                "subject": "Pricing",
                "message": "Do you offer discounts?"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let id = body["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        authorized(get_request("/api/admin/contact-messages?page=1&limit=5"), &token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["limit"], 5);
    assert!(body["messages"]
        .as_array()
        .unwrap()
        .iter()
        .any(|m| m["email"] == "ada@example.com"));

    let uri = format!("/api/admin/contact-messages/{}", id);
    let (status, _) = send(&app, authorized(json_request("DELETE", &uri, &json!({})), &token)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, authorized(json_request("DELETE", &uri, &json!({})), &token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Contact message not found");
}
