// HTTP-level tests for the MakerHub API
// Each test drives the real router, pipelines included, backed by in-memory stores

use super::*;
use axum::http::{header, HeaderValue, StatusCode};
use axum_test::{TestRequest, TestServer};
use serde_json::json;
use uuid::Uuid;

use crate::auth::{MemoryUserStore, Role};
use crate::config::TokenConfig;
use crate::tutorials::MemoryTutorialStore;

// ============================================================================
// Test Helpers
// ============================================================================

struct TestApp {
    server: TestServer,
    users: Arc<MemoryUserStore>,
}

/// A registered account and its access token
struct Account {
    id: String,
    token: String,
}

fn create_test_app_with_limit(body_limit: usize) -> TestApp {
    let users = Arc::new(MemoryUserStore::new());
    let tokens = TokenService::new(&TokenConfig::new("test-access-secret", "test-refresh-secret").unwrap());
    let state = AppState::new(
        users.clone(),
        Arc::new(MemoryTutorialStore::new()),
        Arc::new(tokens),
        body_limit,
    );

    let app = create_router(state).expect("every route pipeline is valid");
    TestApp {
        server: TestServer::new(app).unwrap(),
        users,
    }
}

fn create_test_app() -> TestApp {
    create_test_app_with_limit(crate::pipeline::DEFAULT_BODY_LIMIT)
}

fn bearer(request: TestRequest, token: &str) -> TestRequest {
    request.add_header(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    )
}

impl TestApp {
    async fn register(&self, email: &str) -> Account {
        let response = self
            .server
            .post("/api/auth/register")
            .json(&json!({
                "email": email,
                "password": "birdhouse42",
                "display_name": "Test Maker"
            }))
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED, "{}", response.text());

        let body: Value = response.json();
        Account {
            id: body["data"]["user"]["id"].as_str().unwrap().to_string(),
            token: body["data"]["access_token"].as_str().unwrap().to_string(),
        }
    }

    async fn register_as(&self, email: &str, role: Role) -> Account {
        let account = self.register(email).await;
        self.users
            .set_role(Uuid::parse_str(&account.id).unwrap(), role)
            .await
            .unwrap();
        account
    }

    async fn create_tutorial(&self, author: &Account, title: &str, published: bool) -> Value {
        let response = bearer(self.server.post("/api/tutorials"), &author.token)
            .json(&json!({
                "title": title,
                "description": "Step by step instructions for the whole build.",
                "category": "woodworking",
                "difficulty": "beginner",
                "tags": ["Cedar", "outdoor"],
                "published": published
            }))
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED, "{}", response.text());
        response.json::<Value>()["data"].clone()
    }
}

// ============================================================================
// Health and authentication
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app();
    let response = app.server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_required_auth_without_header_is_401() {
    let app = create_test_app();

    let response = app.server.get("/api/auth/me").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.json::<Value>(),
        json!({ "success": false, "message": "Access token required" })
    );
}

#[tokio::test]
async fn test_garbage_token_is_401_with_generic_message() {
    let app = create_test_app();

    let response = bearer(app.server.get("/api/auth/me"), "not.a.token").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["message"], "Invalid or expired token");
}

#[tokio::test]
async fn test_bearer_scheme_without_token_counts_as_missing() {
    let app = create_test_app();

    let response = app
        .server
        .get("/api/auth/me")
        .add_header(header::AUTHORIZATION, HeaderValue::from_static("Bearer "))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["message"], "Access token required");
}

#[tokio::test]
async fn test_register_login_refresh_me_round_trip() {
    let app = create_test_app();
    let account = app.register("maker@example.com").await;

    let login = app
        .server
        .post("/api/auth/login")
        .json(&json!({ "email": "maker@example.com", "password": "birdhouse42" }))
        .await;
    assert_eq!(login.status_code(), StatusCode::OK);
    let login: Value = login.json();
    assert_eq!(login["data"]["user"]["id"], account.id.as_str());
    assert_eq!(login["data"]["token_type"], "Bearer");
    assert!(login["data"]["user"].get("password_hash").is_none());

    let refresh_token = login["data"]["refresh_token"].as_str().unwrap();
    let refreshed = app
        .server
        .post("/api/auth/refresh")
        .json(&json!({ "refresh_token": refresh_token }))
        .await;
    assert_eq!(refreshed.status_code(), StatusCode::OK);
    let access_token = refreshed.json::<Value>()["data"]["access_token"]
        .as_str()
        .unwrap()
        .to_string();

    let me = bearer(app.server.get("/api/auth/me"), &access_token).await;
    assert_eq!(me.status_code(), StatusCode::OK);
    let me: Value = me.json();
    assert_eq!(me["success"], true);
    assert_eq!(me["data"]["email"], "maker@example.com");
    assert_eq!(me["data"]["role"], "regular");
}

#[tokio::test]
async fn test_refresh_token_is_not_accepted_as_access_token() {
    let app = create_test_app();
    app.register("maker@example.com").await;

    let login: Value = app
        .server
        .post("/api/auth/login")
        .json(&json!({ "email": "maker@example.com", "password": "birdhouse42" }))
        .await
        .json();
    let refresh_token = login["data"]["refresh_token"].as_str().unwrap();

    let response = bearer(app.server.get("/api/auth/me"), refresh_token).await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_password_is_401() {
    let app = create_test_app();
    app.register("maker@example.com").await;

    let response = app
        .server
        .post("/api/auth/login")
        .json(&json!({ "email": "maker@example.com", "password": "birdhouse43" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["message"], "Invalid email or password");
}

#[tokio::test]
async fn test_duplicate_registration_is_409() {
    let app = create_test_app();
    app.register("maker@example.com").await;

    let response = app
        .server
        .post("/api/auth/register")
        .json(&json!({
            "email": "Maker@Example.com",
            "password": "birdhouse42",
            "display_name": "Copycat"
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
}

// ============================================================================
// Validation and sanitation
// ============================================================================

#[tokio::test]
async fn test_validation_envelope_reports_every_violation() {
    let app = create_test_app();

    let response = app
        .server
        .post("/api/auth/register")
        .json(&json!({
            "email": "not-an-email",
            "password": "birdhouse42",
            "display_name": "A"
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Validation failed");
    assert_eq!(body["error"], "Invalid input data");

    let errors = body["data"]["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0]["field"], "email");
    assert_eq!(errors[0]["value"], "not-an-email");
    assert_eq!(errors[1]["field"], "display_name");
}

#[tokio::test]
async fn test_password_is_never_echoed_back() {
    let app = create_test_app();

    let response = app
        .server
        .post("/api/auth/register")
        .json(&json!({
            "email": "maker@example.com",
            "password": "short",
            "display_name": "Ada"
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    let errors = body["data"]["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["field"], "password");
    assert!(errors[0].get("value").is_none());
}

#[tokio::test]
async fn test_script_content_is_stripped_before_storage() {
    let app = create_test_app();
    let creator = app.register_as("creator@example.com", Role::ContentCreator).await;

    let tutorial = app
        .create_tutorial(&creator, "Cedar <script>alert('x')</script>birdhouse", true)
        .await;
    assert_eq!(tutorial["title"], "Cedar birdhouse");
    assert_eq!(tutorial["tags"], json!(["cedar", "outdoor"]));

    let profile = bearer(app.server.put(&format!("/api/users/{}", creator.id)), &creator.token)
        .json(&json!({ "bio": "See javascript:alert(1) my <SCRIPT>x()</SCRIPT>work" }))
        .await;
    assert_eq!(profile.status_code(), StatusCode::OK);
    assert_eq!(profile.json::<Value>()["data"]["bio"], "See alert(1) my work");
}

#[tokio::test]
async fn test_oversized_body_is_413() {
    let app = create_test_app_with_limit(256);

    let response = app
        .server
        .post("/api/auth/login")
        .json(&json!({ "email": "maker@example.com", "password": "x".repeat(1024) }))
        .await;
    assert_eq!(response.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_invalid_listing_query_is_rejected() {
    let app = create_test_app();

    let response = app
        .server
        .get("/api/tutorials")
        .add_query_param("limit", "500")
        .add_query_param("category", "knitting")
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let fields: Vec<Value> = response.json::<Value>()["data"]["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|error| error["field"].clone())
        .collect();
    assert_eq!(fields, [json!("limit"), json!("category")]);
}

#[tokio::test]
async fn test_string_boolean_in_body_is_a_validation_error() {
    let app = create_test_app();
    let creator = app.register_as("creator@example.com", Role::ContentCreator).await;

    let response = bearer(app.server.post("/api/tutorials"), &creator.token)
        .json(&json!({
            "title": "Garden bench",
            "description": "A sturdy bench from reclaimed pallets.",
            "category": "woodworking",
            "difficulty": "beginner",
            "published": "true"
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["data"]["errors"][0]["field"], "published");
    assert_eq!(body["data"]["errors"][0]["message"], "published must be a boolean");
}

#[tokio::test]
async fn test_json_without_content_type_gets_the_failure_envelope() {
    let app = create_test_app();

    let response = app
        .server
        .post("/api/auth/refresh")
        .text(r#"{"refresh_token":"abc.def.ghi"}"#)
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>(),
        json!({
            "success": false,
            "message": "Expected a JSON body (Content-Type: application/json)"
        })
    );
}

// ============================================================================
// Role and ownership gates
// ============================================================================

#[tokio::test]
async fn test_role_gate_on_tutorial_creation() {
    let app = create_test_app();
    let regular = app.register("regular@example.com").await;

    let response = bearer(app.server.post("/api/tutorials"), &regular.token)
        .json(&json!({
            "title": "Soldering basics",
            "description": "How to solder through-hole components.",
            "category": "electronics",
            "difficulty": "beginner"
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(response.json::<Value>()["message"], "Insufficient permissions");

    let admin = app.register_as("admin@example.com", Role::Admin).await;
    let tutorial = app.create_tutorial(&admin, "Soldering basics", true).await;
    assert_eq!(tutorial["author_id"], admin.id.as_str());
}

#[tokio::test]
async fn test_gate_runs_before_field_rules() {
    let app = create_test_app();
    let regular = app.register("regular@example.com").await;

    let response = bearer(app.server.post("/api/tutorials"), &regular.token)
        .json(&json!({}))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_routes_require_admin() {
    let app = create_test_app();
    let regular = app.register("regular@example.com").await;
    let other = app.register("other@example.com").await;

    let path = format!("/api/admin/users/{}/deactivate", other.id);
    let response = bearer(app.server.patch(&path), &regular.token).await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let admin = app.register_as("admin@example.com", Role::Admin).await;
    let response = bearer(app.server.patch(&path), &admin.token).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["data"]["is_active"], false);
}

#[tokio::test]
async fn test_profile_ownership_gate() {
    let app = create_test_app();
    let owner = app.register("owner@example.com").await;
    let stranger = app.register("stranger@example.com").await;
    let admin = app.register_as("admin@example.com", Role::Admin).await;
    let path = format!("/api/users/{}", owner.id);

    let own = bearer(app.server.get(&path), &owner.token).await;
    assert_eq!(own.status_code(), StatusCode::OK);

    let foreign = bearer(app.server.get(&path), &stranger.token).await;
    assert_eq!(foreign.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(
        foreign.json::<Value>()["message"],
        "Access denied: not the resource owner"
    );

    let by_admin = bearer(app.server.get(&path), &admin.token).await;
    assert_eq!(by_admin.status_code(), StatusCode::OK);

    let anonymous = app.server.get(&path).await;
    assert_eq!(anonymous.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_id_is_a_validation_error() {
    let app = create_test_app();
    let admin = app.register_as("admin@example.com", Role::Admin).await;

    let response = bearer(app.server.get("/api/users/not-a-uuid"), &admin.token).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["data"]["errors"][0]["field"], "id");
}

#[tokio::test]
async fn test_deactivation_revokes_existing_tokens() {
    let app = create_test_app();
    let member = app.register("member@example.com").await;
    let admin = app.register_as("admin@example.com", Role::Admin).await;

    let before = bearer(app.server.get("/api/auth/me"), &member.token).await;
    assert_eq!(before.status_code(), StatusCode::OK);

    let deactivate = bearer(
        app.server.patch(&format!("/api/admin/users/{}/deactivate", member.id)),
        &admin.token,
    )
    .await;
    assert_eq!(deactivate.status_code(), StatusCode::OK);

    let after = bearer(app.server.get("/api/auth/me"), &member.token).await;
    assert_eq!(after.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(after.json::<Value>()["message"], "Invalid or expired token");

    let reactivate = bearer(
        app.server.patch(&format!("/api/admin/users/{}/activate", member.id)),
        &admin.token,
    )
    .await;
    assert_eq!(reactivate.status_code(), StatusCode::OK);

    let restored = bearer(app.server.get("/api/auth/me"), &member.token).await;
    assert_eq!(restored.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_role_change_takes_effect_on_next_request() {
    let app = create_test_app();
    let member = app.register("member@example.com").await;
    let admin = app.register_as("admin@example.com", Role::Admin).await;
    let path = format!("/api/admin/users/{}/role", member.id);

    let invalid = bearer(app.server.patch(&path), &admin.token)
        .json(&json!({ "role": "superuser" }))
        .await;
    assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);

    let promoted = bearer(app.server.patch(&path), &admin.token)
        .json(&json!({ "role": "content_creator" }))
        .await;
    assert_eq!(promoted.status_code(), StatusCode::OK);

    let tutorial = app.create_tutorial(&member, "Raised garden bed", true).await;
    assert_eq!(tutorial["author_id"], member.id.as_str());
}

#[tokio::test]
async fn test_admin_cannot_deactivate_themselves() {
    let app = create_test_app();
    let admin = app.register_as("admin@example.com", Role::Admin).await;

    let response = bearer(
        app.server.patch(&format!("/api/admin/users/{}/deactivate", admin.id)),
        &admin.token,
    )
    .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Tutorials: optional authentication and ownership in handlers
// ============================================================================

#[tokio::test]
async fn test_listing_is_public_and_hides_drafts() {
    let app = create_test_app();
    let creator = app.register_as("creator@example.com", Role::ContentCreator).await;
    app.create_tutorial(&creator, "Published birdhouse", true).await;
    let draft = app.create_tutorial(&creator, "Draft workbench", false).await;

    let anonymous: Value = app.server.get("/api/tutorials").await.json();
    assert_eq!(anonymous["data"]["total"], 1);

    let forged: Value = bearer(app.server.get("/api/tutorials"), "forged.token.value")
        .await
        .json();
    assert_eq!(forged["data"]["total"], 1);

    let own: Value = bearer(app.server.get("/api/tutorials"), &creator.token).await.json();
    assert_eq!(own["data"]["total"], 2);

    let draft_path = format!("/api/tutorials/{}", draft["id"].as_str().unwrap());
    let hidden = app.server.get(&draft_path).await;
    assert_eq!(hidden.status_code(), StatusCode::NOT_FOUND);

    let visible = bearer(app.server.get(&draft_path), &creator.token).await;
    assert_eq!(visible.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_listing_filters_and_paginates() {
    let app = create_test_app();
    let creator = app.register_as("creator@example.com", Role::ContentCreator).await;
    for title in ["Birdhouse one", "Birdhouse two", "Birdhouse three"] {
        app.create_tutorial(&creator, title, true).await;
    }

    let page: Value = app
        .server
        .get("/api/tutorials")
        .add_query_param("category", "woodworking")
        .add_query_param("limit", "2")
        .add_query_param("page", "2")
        .await
        .json();
    assert_eq!(page["data"]["total"], 3);
    assert_eq!(page["data"]["page"], 2);
    assert_eq!(page["data"]["items"].as_array().unwrap().len(), 1);

    let none: Value = app
        .server
        .get("/api/tutorials")
        .add_query_param("category", "gardening")
        .await
        .json();
    assert_eq!(none["data"]["total"], 0);
}

#[tokio::test]
async fn test_only_author_or_admin_can_edit_a_tutorial() {
    let app = create_test_app();
    let author = app.register_as("author@example.com", Role::ContentCreator).await;
    let rival = app.register_as("rival@example.com", Role::ContentCreator).await;
    let admin = app.register_as("admin@example.com", Role::Admin).await;

    let tutorial = app.create_tutorial(&author, "Cedar birdhouse", true).await;
    let path = format!("/api/tutorials/{}", tutorial["id"].as_str().unwrap());

    let hijack = bearer(app.server.put(&path), &rival.token)
        .json(&json!({ "title": "Stolen birdhouse" }))
        .await;
    assert_eq!(hijack.status_code(), StatusCode::FORBIDDEN);

    let edit = bearer(app.server.put(&path), &author.token)
        .json(&json!({ "title": "Cedar birdhouse, revised" }))
        .await;
    assert_eq!(edit.status_code(), StatusCode::OK);
    let edited: Value = edit.json();
    assert_eq!(edited["data"]["title"], "Cedar birdhouse, revised");
    assert_eq!(edited["data"]["category"], "woodworking");

    let too_short = bearer(app.server.put(&path), &author.token)
        .json(&json!({ "title": "Box" }))
        .await;
    assert_eq!(too_short.status_code(), StatusCode::BAD_REQUEST);

    let rival_delete = bearer(app.server.delete(&path), &rival.token).await;
    assert_eq!(rival_delete.status_code(), StatusCode::FORBIDDEN);

    let admin_delete = bearer(app.server.delete(&path), &admin.token).await;
    assert_eq!(admin_delete.status_code(), StatusCode::NO_CONTENT);

    let gone = app.server.get(&path).await;
    assert_eq!(gone.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = create_test_app();

    let response = app.server.get("/api-docs/openapi.json").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let doc: Value = response.json();
    assert!(doc["paths"].get("/api/tutorials").is_some());
}

#[test]
fn test_invalid_pipeline_fails_at_build_time() {
    let result = crate::pipeline::Pipeline::builder()
        .stage(crate::auth::RequireRole::admin_only())
        .build();
    assert!(result.is_err());
}
