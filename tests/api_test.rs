use serde_json::{json, Value};
use warp::http::Response;
use warp::hyper::body::Bytes;

use vet_clinic::auth::{Identity, Role};
use vet_clinic::config::ServerConfig;
use vet_clinic::core::AppState;
use vet_clinic::handlers::api_routes;
use vet_clinic::storage::Repositories;

const API: &str = "/api/v1/vet";

struct Harness {
    state: AppState,
    admin: String,
    user: String,
}

impl Harness {
    fn new(roles_enabled: bool) -> Self {
        let mut config = ServerConfig::for_testing();
        config.roles_enabled = roles_enabled;
        let state = AppState::new(&config, Repositories::in_memory());

        let token = |role| {
            let claims = Identity::claims("staff@clinic.test", Some(role));
            format!("Bearer {}", state.tokens.issue_access(&claims).unwrap())
        };
        let admin = token(Role::Admin);
        let user = token(Role::User);

        Self { state, admin, user }
    }

    async fn send(
        &self,
        method: &str,
        path: &str,
        auth: Option<&str>,
        body: Option<Value>,
    ) -> Response<Bytes> {
        let mut request = warp::test::request()
            .method(method)
            .path(&format!("{}{}", API, path));
        if let Some(auth) = auth {
            request = request.header("authorization", auth);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        request.reply(&api_routes(self.state.clone())).await
    }

    async fn create_cat(&self) -> u64 {
        let response = self
            .send("POST", "/cats", Some(&self.admin), Some(tom()))
            .await;
        assert_eq!(response.status(), 201);
        json_of(&response)["id"].as_u64().unwrap()
    }
}

fn json_of(response: &Response<Bytes>) -> Value {
    serde_json::from_slice(response.body()).unwrap()
}

fn tom() -> Value {
    json!({"cat_name": "Tom", "cat_age": 3, "cat_breed": "Siamese", "cat_weight": 4})
}

fn visit(cat_id: u64) -> Value {
    json!({
        "visit_cat_id": cat_id,
        "visit_date": "2024-05-17",
        "visit_reason": "Annual vaccination",
        "visit_vet": "Dr. Amelia Stone"
    })
}

#[tokio::test]
async fn test_health_routes_are_public() {
    let harness = Harness::new(true);
    for path in ["/", "/health"] {
        let response = warp::test::request()
            .path(path)
            .reply(&api_routes(harness.state.clone()))
            .await;
        assert_eq!(response.status(), 200);
        assert_eq!(json_of(&response)["status"], "ok");
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    }
}

#[tokio::test]
async fn test_protected_routes_require_a_token() {
    let harness = Harness::new(true);
    for path in ["/cats", "/visits", "/treatments", "/users", "/cats/1/history"] {
        let response = harness.send("GET", path, None, None).await;
        assert_eq!(response.status(), 401, "{}", path);
        assert_eq!(json_of(&response)["reason"], "unauthenticated");
    }

    let response = harness
        .send("GET", "/cats", Some("Bearer not.a.token"), None)
        .await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_auth_runs_before_body_validation() {
    let harness = Harness::new(true);
    let response = harness
        .send("POST", "/cats", None, Some(json!({"cat_name": ""})))
        .await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_reads_need_only_authentication() {
    let harness = Harness::new(true);
    let response = harness.send("GET", "/cats", Some(&harness.user), None).await;
    assert_eq!(response.status(), 200);
    assert_eq!(json_of(&response), json!([]));
}

#[tokio::test]
async fn test_mutations_require_admin() {
    let harness = Harness::new(true);
    let cat_id = harness.create_cat().await;

    let attempts = [
        ("POST", "/cats".to_string(), Some(tom())),
        ("PUT", format!("/cats/{}", cat_id), Some(tom())),
        ("DELETE", format!("/cats/{}", cat_id), None),
        ("POST", "/visits".to_string(), Some(visit(cat_id))),
        (
            "POST",
            "/treatments".to_string(),
            Some(json!({"treatment_name": "Vaccine", "treatment_visit_id": 1})),
        ),
        (
            "POST",
            "/users".to_string(),
            Some(json!({"user_email": "x@y.com", "user_password": "pw", "user_role": "user"})),
        ),
    ];
    for (method, path, body) in attempts {
        let response = harness.send(method, &path, Some(&harness.user), body).await;
        assert_eq!(response.status(), 403, "{} {}", method, path);
        assert_eq!(json_of(&response)["reason"], "forbidden");
    }
}

#[tokio::test]
async fn test_roles_disabled_lets_any_identity_write() {
    let harness = Harness::new(false);
    let response = harness
        .send("POST", "/cats", Some(&harness.user), Some(tom()))
        .await;
    assert_eq!(response.status(), 201);
}

#[tokio::test]
async fn test_visit_for_missing_cat_is_unprocessable() {
    let harness = Harness::new(true);
    let response = harness
        .send("POST", "/visits", Some(&harness.admin), Some(visit(77)))
        .await;
    assert_eq!(response.status(), 422);
    assert_eq!(json_of(&response)["reason"], "foreign_key_violation");

    let response = harness.send("GET", "/visits", Some(&harness.admin), None).await;
    assert_eq!(json_of(&response), json!([]));
}

#[tokio::test]
async fn test_shape_errors_are_bad_requests() {
    let harness = Harness::new(true);

    let response = harness
        .send(
            "POST",
            "/cats",
            Some(&harness.admin),
            Some(json!({"cat_name": "Tom", "cat_age": -1, "cat_breed": "Siamese", "cat_weight": 4})),
        )
        .await;
    assert_eq!(response.status(), 400);
    assert_eq!(json_of(&response)["reason"], "validation_error");

    let cat_id = harness.create_cat().await;
    let mut bad_date = visit(cat_id);
    bad_date["visit_date"] = json!("17/05/2024");
    let response = harness
        .send("POST", "/visits", Some(&harness.admin), Some(bad_date))
        .await;
    assert_eq!(response.status(), 400);

    let response = warp::test::request()
        .method("POST")
        .path(&format!("{}/cats", API))
        .header("authorization", &harness.admin)
        .header("content-type", "application/json")
        .body("{not json")
        .reply(&api_routes(harness.state.clone()))
        .await;
    assert_eq!(response.status(), 400);
    assert_eq!(json_of(&response)["reason"], "invalid_body");
}

#[tokio::test]
async fn test_unknown_rows_and_routes_are_not_found() {
    let harness = Harness::new(true);
    let response = harness.send("GET", "/cats/42", Some(&harness.user), None).await;
    assert_eq!(response.status(), 404);
    assert_eq!(json_of(&response)["reason"], "not_found");

    let response = harness
        .send("DELETE", "/visits/42", Some(&harness.admin), None)
        .await;
    assert_eq!(response.status(), 404);

    for path in ["/owners", "/cats/abc", "/treatments/abc/history"] {
        let response = harness.send("GET", path, Some(&harness.user), None).await;
        assert_eq!(response.status(), 404, "{}", path);
        assert_eq!(json_of(&response)["reason"], "route_not_found");
    }
}

#[tokio::test]
async fn test_known_path_with_wrong_method_is_not_allowed() {
    let harness = Harness::new(true);
    let response = harness.send("PATCH", "/cats", Some(&harness.admin), None).await;
    assert_eq!(response.status(), 405);
    assert_eq!(json_of(&response)["reason"], "method_not_allowed");

    let response = harness.send("POST", "/cats/abc", Some(&harness.admin), None).await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_clinic_record_lifecycle() {
    let harness = Harness::new(true);
    let admin = Some(harness.admin.as_str());
    let cat_id = harness.create_cat().await;

    let response = harness.send("POST", "/visits", admin, Some(visit(cat_id))).await;
    assert_eq!(response.status(), 201);
    let created = json_of(&response);
    assert_eq!(created["visit_cat_id"], cat_id);
    assert_eq!(created["visit_date"], "2024-05-17");
    let visit_id = created["id"].as_u64().unwrap();

    let response = harness
        .send(
            "POST",
            "/treatments",
            admin,
            Some(json!({"treatment_name": "Rabies vaccine", "treatment_visit_id": visit_id})),
        )
        .await;
    assert_eq!(response.status(), 201);

    let response = harness
        .send("GET", &format!("/treatments/{}/history", visit_id), admin, None)
        .await;
    assert_eq!(json_of(&response).as_array().unwrap().len(), 1);

    let response = harness
        .send("GET", &format!("/cats/{}/history", cat_id), admin, None)
        .await;
    let history = json_of(&response);
    assert_eq!(history["cat_name"], "Tom");
    assert_eq!(
        history["cat_visits"][0]["visit_treatments"][0]["treatment_name"],
        "Rabies vaccine"
    );

    let response = harness.send("GET", "/visits?vet=stone", admin, None).await;
    assert_eq!(json_of(&response).as_array().unwrap().len(), 1);
    let response = harness.send("GET", "/visits?vet=lee", admin, None).await;
    assert_eq!(json_of(&response), json!([]));
    let response = harness.send("GET", "/visits?date=2024-05-17", admin, None).await;
    assert_eq!(json_of(&response).as_array().unwrap().len(), 1);

    let mut renamed = tom();
    renamed["cat_name"] = json!("Thomas");
    let response = harness
        .send("PUT", &format!("/cats/{}", cat_id), admin, Some(renamed))
        .await;
    assert_eq!(json_of(&response)["cat_name"], "Thomas");

    let response = harness
        .send("DELETE", &format!("/cats/{}", cat_id), admin, None)
        .await;
    assert_eq!(response.status(), 200);
    let summary = json_of(&response);
    assert_eq!(summary["visits_removed"], 1);
    assert_eq!(summary["treatments_removed"], 1);

    let response = harness
        .send("GET", &format!("/visits/{}", visit_id), admin, None)
        .await;
    assert_eq!(response.status(), 404);
    let response = harness.send("GET", "/treatments", admin, None).await;
    assert_eq!(json_of(&response), json!([]));
}

#[tokio::test]
async fn test_user_management() {
    let harness = Harness::new(true);
    let admin = Some(harness.admin.as_str());
    let body = json!({"user_email": "Nurse@Clinic.test", "user_password": "s3cret", "user_role": "user"});

    let response = harness.send("POST", "/users", admin, Some(body.clone())).await;
    assert_eq!(response.status(), 201);
    let created = json_of(&response);
    assert_eq!(created["user_email"], "nurse@clinic.test");
    assert_eq!(created["user_role"], "user");
    assert!(created.get("user_password").is_none());
    assert!(created.get("password_hash").is_none());

    let response = harness.send("POST", "/users", admin, Some(body)).await;
    assert_eq!(response.status(), 409);
    assert_eq!(json_of(&response)["reason"], "conflict");

    let id = created["id"].as_u64().unwrap();
    let response = harness
        .send(
            "PUT",
            &format!("/users/{}", id),
            admin,
            Some(json!({"user_email": "nurse2@clinic.test", "user_password": "n3w"})),
        )
        .await;
    assert_eq!(response.status(), 200);

    let response = harness
        .send(
            "POST",
            "/users/login",
            None,
            Some(json!({"user_email": "nurse2@clinic.test", "user_password": "n3w"})),
        )
        .await;
    assert_eq!(response.status(), 200);

    let response = harness
        .send("DELETE", &format!("/users/{}", id), admin, None)
        .await;
    assert_eq!(response.status(), 200);
    let response = harness.send("GET", &format!("/users/{}", id), admin, None).await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_login_and_refresh_over_http() {
    let harness = Harness::new(true);
    harness
        .send(
            "POST",
            "/users",
            Some(&harness.admin),
            Some(json!({"user_email": "a@b.com", "user_password": "secret", "user_role": "admin"})),
        )
        .await;

    let response = harness
        .send(
            "POST",
            "/users/login",
            None,
            Some(json!({"user_email": "a@b.com", "user_password": "secret"})),
        )
        .await;
    assert_eq!(response.status(), 200);
    let pair = json_of(&response);
    let refresh_token = pair["refresh_token"].as_str().unwrap().to_string();

    let response = harness
        .send(
            "POST",
            "/users/refresh",
            None,
            Some(json!({"refresh_token": refresh_token})),
        )
        .await;
    assert_eq!(response.status(), 200);
    let access = json_of(&response)["access_token"].as_str().unwrap().to_string();

    // The refreshed token carries the admin role
    let response = harness
        .send("POST", "/cats", Some(&format!("Bearer {}", access)), Some(tom()))
        .await;
    assert_eq!(response.status(), 201);

    let response = harness
        .send(
            "POST",
            "/users/refresh",
            None,
            Some(json!({"refresh_token": pair["access_token"]})),
        )
        .await;
    assert_eq!(response.status(), 401);
}
