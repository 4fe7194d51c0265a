use std::sync::Arc;
use std::time::Duration;

use argon2::Params;
use axum::{
    Router,
    body::{self, Body},
    http::{Request, StatusCode, header},
    response::Response,
};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde_json::{Value, json};
use tower::ServiceExt;

use sales_api::{
    api,
    app::build_router,
    middleware::Metrics,
    repos::{MemoryUserStore, User},
    services::{
        auth::{Authenticator, Claims, MapKeyStore, ROLE_ADMIN, ROLE_USER},
        users::{NewUser, UserService},
    },
    state::AppState,
    web::Shutdown,
};

const KID: &str = "54bb2165-71e1-41a6-af3e-7da4a0e1e2c1";
const PRIMARY_PEM: &str = include_str!("../testdata/keys/primary.pem");

struct Harness {
    state: AppState,
    router: Router,
    shutdown_rx: tokio::sync::mpsc::Receiver<String>,
}

fn harness() -> Harness {
    let keys = MapKeyStore::new().with_pem(KID, PRIMARY_PEM).unwrap();
    let auth = Authenticator::new(KID, Arc::new(keys)).unwrap();

    let users = UserService::new(
        Arc::new(MemoryUserStore::new()),
        "sales-api",
        chrono::Duration::hours(1),
    )
    .with_password_params(Params::new(Params::MIN_M_COST, 1, 1, None).unwrap());

    let state = AppState::new(Arc::new(auth), Arc::new(users), Arc::new(Metrics::default()));
    let (shutdown, shutdown_rx) = Shutdown::channel();
    let router = build_router(state.clone(), shutdown, Duration::from_secs(5));

    Harness {
        state,
        router,
        shutdown_rx,
    }
}

impl Harness {
    async fn send(&self, req: Request<Body>) -> Response {
        self.router.clone().oneshot(req).await.unwrap()
    }

    fn token(&self, sub: &str, roles: &[&str], ttl: i64) -> String {
        let now = chrono::Utc::now().timestamp();
        self.token_between(sub, roles, now, now + ttl)
    }

    fn token_between(&self, sub: &str, roles: &[&str], iat: i64, exp: i64) -> String {
        let claims = Claims::new(sub, "sales-api", iat, exp, roles.iter().copied());
        self.state.auth.generate_token(&claims).unwrap()
    }

    async fn user(&self, email: &str, roles: &[&str]) -> User {
        let nu = NewUser {
            name: "Test User".into(),
            email: email.into(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            password: "gophers".into(),
            password_confirm: "gophers".into(),
        };
        self.state.users.create(chrono::Utc::now(), nu).await.unwrap()
    }
}

fn get(uri: &str, authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::empty()).unwrap()
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

async fn json_body(res: Response) -> Value {
    let bytes = body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn open_route_answers_and_echoes_request_id() {
    let h = harness();

    let res = h.send(get("/v1/test", None)).await;

    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(json_body(res).await, json!({"status": "OK"}));
}

#[tokio::test]
async fn missing_or_malformed_authorization_is_unauthorized() {
    let h = harness();

    let headers = [
        None,
        Some("Bearer"),
        Some("Basic abc"),
        Some("Bearer a b"),
        Some("Bearer not.a.jwt"),
    ];
    for auth in headers {
        let res = h.send(get("/v1/testauth", auth)).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "authorization {auth:?}");
        assert!(json_body(res).await["error"].is_string());
    }
}

#[tokio::test]
async fn expired_token_is_unauthorized() {
    let mut h = harness();
    let now = chrono::Utc::now().timestamp();
    let token = h.token_between("user-1", &[ROLE_ADMIN], now - 120, now - 60);

    let res = h.send(get("/v1/testauth", Some(&bearer(&token)))).await;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(res).await, json!({"error": "token is expired"}));
    assert!(h.shutdown_rx.try_recv().is_err());
}

#[tokio::test]
async fn role_is_checked_after_authentication() {
    let h = harness();
    let user = h.token("user-1", &[ROLE_USER], 3600);
    let admin = h.token("admin-1", &[ROLE_ADMIN], 3600);
    let nobody = h.token("nobody", &[], 3600);

    let res = h.send(get("/v1/testauth", Some(&bearer(&user)))).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let res = h.send(get("/v1/testauth", Some(&bearer(&nobody)))).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = h.send(get("/v1/testauth", Some(&bearer(&admin)))).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await, json!({"status": "OK"}));
}

#[tokio::test]
async fn basic_auth_token_grants_access() {
    let h = harness();
    let user = h.user("ann@example.com", &[ROLE_USER]).await;

    let basic = format!("Basic {}", STANDARD.encode("ann@example.com:gophers"));
    let res = h.send(get("/v1/users/token", Some(&basic))).await;
    assert_eq!(res.status(), StatusCode::OK);
    let token = json_body(res).await["token"].as_str().unwrap().to_string();

    let res = h.send(get(&format!("/v1/users/{}", user.id), Some(&bearer(&token)))).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    assert_eq!(body["email"], "ann@example.com");
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn bad_credentials_get_no_token() {
    let h = harness();
    h.user("ann@example.com", &[ROLE_USER]).await;

    let wrong = format!("Basic {}", STANDARD.encode("ann@example.com:nope"));
    let res = h.send(get("/v1/users/token", Some(&wrong))).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let res = h.send(get("/v1/users/token", None)).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn users_may_only_read_themselves() {
    let h = harness();
    let ann = h.user("ann@example.com", &[ROLE_USER]).await;
    let bob = h.user("bob@example.com", &[ROLE_USER]).await;
    let token = h.token(&ann.id.to_string(), &[ROLE_USER], 3600);

    let own = h.send(get(&format!("/v1/users/{}", ann.id), Some(&bearer(&token)))).await;
    let other = h.send(get(&format!("/v1/users/{}", bob.id), Some(&bearer(&token)))).await;

    assert_eq!(own.status(), StatusCode::OK);
    assert_eq!(other.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_crud_flow() {
    let h = harness();
    let admin = h.token("admin-1", &[ROLE_ADMIN], 3600);

    let create = Request::builder()
        .method("POST")
        .uri("/v1/users")
        .header(header::AUTHORIZATION, bearer(&admin))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({
                "name": "Carol",
                "email": "carol@example.com",
                "roles": ["USER"],
                "password": "gophers",
                "password_confirm": "gophers"
            })
            .to_string(),
        ))
        .unwrap();
    let res = h.send(create).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let id = json_body(res).await["id"].as_str().unwrap().to_string();

    let update = Request::builder()
        .method("PUT")
        .uri(format!("/v1/users/{id}"))
        .header(header::AUTHORIZATION, bearer(&admin))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"name": "Caroline"}).to_string()))
        .unwrap();
    assert_eq!(h.send(update).await.status(), StatusCode::NO_CONTENT);

    let res = h.send(get("/v1/users/1/10", Some(&bearer(&admin)))).await;
    assert_eq!(res.status(), StatusCode::OK);
    let list = json_body(res).await;
    assert_eq!(list.as_array().map(Vec::len), Some(1));
    assert_eq!(list[0]["name"], "Caroline");

    let delete = Request::builder()
        .method("DELETE")
        .uri(format!("/v1/users/{id}"))
        .header(header::AUTHORIZATION, bearer(&admin))
        .body(Body::empty())
        .unwrap();
    assert_eq!(h.send(delete).await.status(), StatusCode::NO_CONTENT);

    let res = h.send(get(&format!("/v1/users/{id}"), Some(&bearer(&admin)))).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_new_user_lists_failed_fields() {
    let h = harness();
    let admin = h.token("admin-1", &[ROLE_ADMIN], 3600);

    let req = Request::builder()
        .method("POST")
        .uri("/v1/users")
        .header(header::AUTHORIZATION, bearer(&admin))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"name": "", "email": "nope", "roles": ["USER"]}).to_string()))
        .unwrap();
    let res = h.send(req).await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = json_body(res).await;
    assert_eq!(body["error"], "data validation error");
    let fields: Vec<&str> = body["fields"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|f| f["field"].as_str())
        .collect();
    assert_eq!(fields, ["name", "email", "password"]);
}

#[tokio::test]
async fn duplicate_email_conflicts() {
    let h = harness();
    h.user("ann@example.com", &[ROLE_USER]).await;
    let admin = h.token("admin-1", &[ROLE_ADMIN], 3600);

    let req = Request::builder()
        .method("POST")
        .uri("/v1/users")
        .header(header::AUTHORIZATION, bearer(&admin))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({
                "name": "Ann Again",
                "email": "ann@example.com",
                "roles": ["USER"],
                "password": "x",
                "password_confirm": "x"
            })
            .to_string(),
        ))
        .unwrap();

    assert_eq!(h.send(req).await.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn bad_paging_is_a_client_error() {
    let h = harness();
    let admin = h.token("admin-1", &[ROLE_ADMIN], 3600);

    for uri in ["/v1/users/0/10", "/v1/users/1/0", "/v1/users/one/10", "/v1/users/1/1000"] {
        let res = h.send(get(uri, Some(&bearer(&admin)))).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[tokio::test]
async fn handled_errors_do_not_signal_shutdown() {
    let mut h = harness();

    h.send(get("/v1/testauth", None)).await;
    h.send(get("/v1/test", None)).await;

    assert!(h.shutdown_rx.try_recv().is_err());

    let vars = h.state.metrics.snapshot();
    assert_eq!(vars.requests, 2);
    assert_eq!(vars.errors, 1);
    assert_eq!(vars.panics, 0);
}

#[tokio::test]
async fn debug_vars_report_metrics() {
    let h = harness();
    h.send(get("/v1/test", None)).await;

    let res = api::debug::routes(h.state.clone())
        .oneshot(get("/debug/vars", None))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await, json!({"requests": 1, "errors": 0, "panics": 0}));

    let ready = api::debug::routes(h.state.clone())
        .oneshot(get("/debug/readiness", None))
        .await
        .unwrap();
    assert_eq!(ready.status(), StatusCode::OK);
}
