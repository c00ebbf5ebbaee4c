use portal_gate::{
    AppConfig, AppState, MockSessionBackend, create_router,
    backend::BackendState,
    models::Group,
};
use reqwest::{StatusCode, header, redirect::Policy};
use serde_json::{Value, json};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use uuid::Uuid;

const COOKIE: &str = "PHPSESSID";

pub struct TestApp {
    pub address: String,
    pub backend: Arc<MockSessionBackend>,
    pub client: reqwest::Client,
}

async fn spawn_app(backend: MockSessionBackend) -> TestApp {
    spawn_app_with(AppConfig::default(), backend).await
}

async fn spawn_app_with(config: AppConfig, backend: MockSessionBackend) -> TestApp {
    let backend = Arc::new(backend);
    let state = AppState::new(config, backend.clone() as BackendState);
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    // Redirects are the gate's output; never follow them.
    let client = reqwest::Client::builder()
        .redirect(Policy::none())
        .build()
        .unwrap();

    TestApp {
        address,
        backend,
        client,
    }
}

/// A throwaway SPA build: `index.html` plus a few root-level files.
fn spa_build() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("portal-gate-spa-{}", Uuid::new_v4()));
    std::fs::create_dir_all(dir.join("assets")).unwrap();
    std::fs::write(dir.join("index.html"), "<div id=\"root\">spa</div>").unwrap();
    std::fs::write(dir.join("favicon.ico"), [0u8, 0, 1, 0]).unwrap();
    std::fs::write(dir.join("robots.txt"), "User-agent: *").unwrap();
    std::fs::write(dir.join("assets").join("app.js"), "console.log('portal')").unwrap();
    dir
}

fn session_cookie(id: &str) -> String {
    format!("{COOKIE}={id}")
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app(MockSessionBackend::new(COOKIE)).await;
    let response = app
        .client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("req fail");
    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));
}

// --- Portal Pages ---

#[tokio::test]
async fn test_anonymous_page_load_redirects_to_login() {
    let app = spawn_app(MockSessionBackend::new(COOKIE)).await;

    let response = app
        .client
        .get(format!("{}/admin/product", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/admin/login");
    assert_eq!(response.headers()["x-portal-notice"], "pleaseLoginFirst");
    assert_eq!(response.text().await.unwrap(), "Please log in first");

    let response = app
        .client
        .get(format!("{}/basket", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.headers()[header::LOCATION], "/login");
}

#[tokio::test]
async fn test_wrong_group_gets_localized_forbidden_page() {
    let app = spawn_app(MockSessionBackend::new(COOKIE).with_session("s1", Group::Normal)).await;

    let response = app
        .client
        .get(format!("{}/admin", app.address))
        .header(header::COOKIE, session_cookie("s1"))
        .header(header::ACCEPT_LANGUAGE, "zh-CN,zh;q=0.9,en;q=0.8")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let page = response.text().await.unwrap();
    assert!(page.contains("403"));
    assert!(page.contains("您所在的用户组无权访问此页面"));
    assert!(page.contains("<title>403 | 您无权访问此页面</title>"));
    assert!(page.contains("lang=\"zh-CN\""));
}

#[tokio::test]
async fn test_authorized_page_load_serves_shell() {
    let app = spawn_app(MockSessionBackend::new(COOKIE).with_session("s1", Group::Admin)).await;

    let response = app
        .client
        .get(format!("{}/admin/orders", app.address))
        .header(header::COOKIE, session_cookie("s1"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.text().await.unwrap().contains("<div id=\"root\">"));
    assert_eq!(app.backend.check_calls(), 1);
}

#[tokio::test]
async fn test_signed_in_login_page_redirects_home() {
    let app = spawn_app(MockSessionBackend::new(COOKIE).with_session("s1", Group::Both)).await;

    // Warm the cache; login pages themselves never trigger a check.
    app.client
        .get(format!("{}/", app.address))
        .header(header::COOKIE, session_cookie("s1"))
        .send()
        .await
        .unwrap();

    let response = app
        .client
        .get(format!("{}/login", app.address))
        .header(header::COOKIE, session_cookie("s1"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/");
    assert!(!response.headers().contains_key("x-portal-notice"));
}

#[tokio::test]
async fn test_public_pages_render_for_anonymous_callers() {
    let app = spawn_app(MockSessionBackend::new(COOKIE)).await;
    for path in ["/login", "/admin/login", "/register", "/forget"] {
        let response = app
            .client
            .get(format!("{}{}", app.address, path))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{path}");
    }
    assert_eq!(app.backend.check_calls(), 0);
}

// --- JSON API ---

#[tokio::test]
async fn test_navigate_returns_tagged_decision() {
    let app = spawn_app(MockSessionBackend::new(COOKIE).with_session("s1", Group::Normal)).await;

    let response = app
        .client
        .post(format!("{}/api/navigate", app.address))
        .header(header::COOKIE, session_cookie("s1"))
        .json(&json!({ "path": "/admin" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["phase"], "forbidden");
    assert_eq!(body["decision"]["kind"], "forbidden");
    assert_eq!(body["notice"]["key"], "groupNotAuthorized");

    let response = app
        .client
        .post(format!("{}/api/navigate", app.address))
        .json(&json!({ "path": "/reset-password" }))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["phase"], "unauthorized");
    assert_eq!(body["decision"]["kind"], "redirect_to");
    assert_eq!(body["decision"]["location"], "/login");
}

#[tokio::test]
async fn test_navigate_rejects_relative_path() {
    let app = spawn_app(MockSessionBackend::new(COOKIE)).await;
    let response = app
        .client
        .post(format!("{}/api/navigate", app.address))
        .json(&json!({ "path": "admin" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_session_endpoint() {
    let app = spawn_app(MockSessionBackend::new(COOKIE).with_session("s1", Group::Both)).await;

    let response = app
        .client
        .get(format!("{}/api/session", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["notice"]["key"], "pleaseLoginFirst");

    let response = app
        .client
        .get(format!("{}/api/session", app.address))
        .header(header::COOKIE, session_cookie("s1"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["group"], 3);
}

#[tokio::test]
async fn test_login_flow() {
    let app = spawn_app(
        MockSessionBackend::new(COOKIE).with_account("admin@example.com", "secret", Group::Admin),
    )
    .await;

    let response = app
        .client
        .post(format!("{}/api/session/login", app.address))
        .form(&[
            ("email", "admin@example.com"),
            ("password", "wrong"),
            ("captcha", "abcd"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["notice"]["key"], "loginFailed");
    assert_eq!(body["notice"]["message"], "wrong email or password");

    let response = app
        .client
        .post(format!("{}/api/session/login", app.address))
        .form(&[
            ("email", "admin@example.com"),
            ("password", "secret"),
            ("captcha", "abcd"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response.headers()[header::SET_COOKIE]
        .to_str()
        .unwrap()
        .to_string();
    assert!(set_cookie.starts_with("PHPSESSID=mock-session-"));
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["redirect_to"], "/admin");
    assert_eq!(body["notice"]["key"], "loginSuccess");

    // The issued cookie opens the admin console.
    let cookie = set_cookie.split(';').next().unwrap().to_string();
    let response = app
        .client
        .get(format!("{}/admin", app.address))
        .header(header::COOKIE, cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_login_with_backend_down_is_bad_gateway() {
    let app = spawn_app(MockSessionBackend::new(COOKIE).unreachable()).await;
    let response = app
        .client
        .post(format!("{}/api/session/login", app.address))
        .form(&[("email", "a@b.c"), ("password", "x"), ("captcha", "y")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["notice"]["key"], "loginError");
}

#[tokio::test]
async fn test_logout_sends_caller_to_area_login() {
    let app = spawn_app(MockSessionBackend::new(COOKIE).with_session("s1", Group::Admin)).await;

    let response = app
        .client
        .post(format!("{}/api/session/logout?area=admin", app.address))
        .header(header::COOKIE, session_cookie("s1"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["redirect_to"], "/admin/login");
    assert_eq!(body["notice"]["key"], "logoutSuccess");

    let response = app
        .client
        .get(format!("{}/admin", app.address))
        .header(header::COOKIE, session_cookie("s1"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/admin/login");
}

#[tokio::test]
async fn test_logout_with_backend_down_still_succeeds_locally() {
    let app = spawn_app(MockSessionBackend::new(COOKIE).unreachable()).await;
    let response = app
        .client
        .post(format!("{}/api/session/logout", app.address))
        .header(header::COOKIE, session_cookie("s1"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["redirect_to"], "/login");
    assert_eq!(body["notice"]["key"], "logoutError");
}

// --- SPA Build ---

#[tokio::test]
async fn test_static_files_bypass_the_gate() {
    let dir = spa_build();
    let config = AppConfig {
        static_dir: Some(dir.clone()),
        ..AppConfig::default()
    };
    let app = spawn_app_with(config, MockSessionBackend::new(COOKIE)).await;

    for path in ["/favicon.ico", "/robots.txt", "/assets/app.js"] {
        let response = app
            .client
            .get(format!("{}{}", app.address, path))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{path}");
    }
    assert_eq!(app.backend.check_calls(), 0);

    // Page loads still pass the gate, including the root directory.
    for (path, login) in [("/", "/login"), ("/admin/product", "/admin/login")] {
        let response = app
            .client
            .get(format!("{}{}", app.address, path))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{path}");
        assert_eq!(response.headers()[header::LOCATION], login);
    }

    std::fs::remove_dir_all(dir).ok();
}

#[tokio::test]
async fn test_static_file_does_not_supersede_page_load() {
    let dir = spa_build();
    let config = AppConfig {
        static_dir: Some(dir.clone()),
        ..AppConfig::default()
    };
    let app = spawn_app_with(
        config,
        MockSessionBackend::new(COOKIE)
            .with_session("s1", Group::Admin)
            .with_delay(Duration::from_millis(200)),
    )
    .await;

    let page = {
        let client = app.client.clone();
        let url = format!("{}/admin/product", app.address);
        tokio::spawn(async move {
            client
                .get(url)
                .header(header::COOKIE, session_cookie("s1"))
                .send()
                .await
                .unwrap()
        })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    let favicon = app
        .client
        .get(format!("{}/favicon.ico", app.address))
        .header(header::COOKIE, session_cookie("s1"))
        .send()
        .await
        .unwrap();
    assert_eq!(favicon.status(), StatusCode::OK);

    let page = page.await.unwrap();
    assert_eq!(page.status(), StatusCode::OK);
    assert!(page.text().await.unwrap().contains("spa"));
    assert_eq!(app.backend.check_calls(), 1);

    std::fs::remove_dir_all(dir).ok();
}
