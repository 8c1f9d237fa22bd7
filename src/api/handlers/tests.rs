use super::{login::INVALID_CREDENTIALS, signup, SiteConfig};
use crate::{
    api::{app, AppState},
    auth::{AuthState, MemorySessionStore, PasswordHasher},
    inference::{
        test_support::{png_fixture, StubDetector},
        InferenceAdapter, InferencePool, PoolSettings,
    },
    storage::Database,
};
use axum::{
    body::{to_bytes, Body},
    http::{
        header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
        Request, StatusCode,
    },
    response::Response,
    Router,
};
use std::{sync::Arc, time::Duration};
use tower::ServiceExt;

const BOUNDARY: &str = "visiongate-test-boundary";

struct TestApp {
    app: Router,
    db: Database,
    auth: AuthState,
}

impl TestApp {
    async fn new() -> anyhow::Result<Self> {
        Self::with_detector(StubDetector::default(), PoolSettings::default()).await
    }

    async fn with_detector(detector: StubDetector, pool: PoolSettings) -> anyhow::Result<Self> {
        let db = Database::sqlite_in_memory().await?;
        let auth = AuthState::new(
            Arc::new(MemorySessionStore::new(Duration::from_secs(60))),
            Arc::new(PasswordHasher::new(4)?),
            false,
        );
        let adapter = Arc::new(InferenceAdapter::new(Arc::new(detector), 80));
        let inference = Arc::new(InferencePool::new(adapter, pool));

        let app = app(AppState {
            db: db.clone(),
            auth: auth.clone(),
            inference,
            site: SiteConfig::default(),
            max_upload_bytes: 1024 * 1024,
        });
        Ok(Self { app, db, auth })
    }

    async fn send(&self, request: Request<Body>) -> anyhow::Result<Response> {
        Ok(self.app.clone().oneshot(request).await?)
    }

    async fn get(&self, uri: &str, cookie: Option<&str>) -> anyhow::Result<Response> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        self.send(builder.body(Body::empty())?).await
    }

    async fn post_form(&self, uri: &str, body: &str) -> anyhow::Result<Response> {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))?;
        self.send(request).await
    }

    async fn predict(&self, cookie: Option<&str>, field: &str, bytes: &[u8]) -> anyhow::Result<Response> {
        self.send(predict_request(cookie, field, bytes)?).await
    }

    async fn signup(&self, username: &str, password: &str) -> anyhow::Result<Response> {
        self.post_form(
            "/signup",
            &format!("username={username}&password={password}&confirm_password={password}"),
        )
        .await
    }

    /// Sign up and log in, returning the `Cookie` header value.
    async fn logged_in(&self, username: &str, password: &str) -> anyhow::Result<String> {
        self.signup(username, password).await?;
        let response = self
            .post_form("/login", &format!("username={username}&password={password}"))
            .await?;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        session_cookie(&response)
    }
}

fn predict_request(cookie: Option<&str>, field: &str, bytes: &[u8]) -> anyhow::Result<Request<Body>> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"upload.png\"\r\nContent-Type: image/png\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    let mut builder = Request::builder()
        .method("POST")
        .uri("/predict")
        .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"));
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    Ok(builder.body(Body::from(body))?)
}

fn session_cookie(response: &Response) -> anyhow::Result<String> {
    let header = response
        .headers()
        .get(SET_COOKIE)
        .ok_or_else(|| anyhow::anyhow!("missing Set-Cookie"))?
        .to_str()?;
    let pair = header
        .split(';')
        .next()
        .ok_or_else(|| anyhow::anyhow!("empty Set-Cookie"))?;
    Ok(pair.trim().to_string())
}

fn location(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
}

async fn body_text(response: Response) -> anyhow::Result<String> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(String::from_utf8(bytes.to_vec())?)
}

#[tokio::test]
async fn signup_login_dashboard_logout_flow() -> anyhow::Result<()> {
    let test = TestApp::new().await?;

    let response = test.signup("alice", "secret1").await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some(signup::SIGNUP_SUCCESS_REDIRECT));

    let stored = test.db.find_by_username("alice").await?;
    assert!(stored.is_some_and(|user| user.password_hash != "secret1"));

    let response = test
        .post_form("/login", "username=alice&password=secret1")
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/"));
    let set_cookie = response
        .headers()
        .get(SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(set_cookie.starts_with("session_id="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("Path=/"));
    assert!(!set_cookie.contains("Max-Age"));
    let cookie = session_cookie(&response)?;

    let response = test.get("/", Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_text(response).await?;
    assert!(page.contains("Welcome, alice"));
    assert!(page.contains("action=\"/predict\""));

    let response = test.get("/logout", Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));
    assert_eq!(session_cookie(&response)?, "session_id=");
    assert!(test.auth.sessions().is_empty());

    // The old token no longer opens the dashboard
    let response = test.get("/", Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));
    Ok(())
}

#[tokio::test]
async fn home_redirects_anonymous_users() -> anyhow::Result<()> {
    let test = TestApp::new().await?;

    let response = test.get("/", None).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));

    let response = test.get("/", Some("session_id=forged")).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    Ok(())
}

#[tokio::test]
async fn signup_rejects_duplicate_username() -> anyhow::Result<()> {
    let test = TestApp::new().await?;
    test.signup("alice", "secret1").await?;

    let response = test.signup("alice", "another").await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await?.contains(signup::USERNAME_TAKEN));

    // Usernames are case sensitive
    let response = test.signup("Alice", "secret1").await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    Ok(())
}

#[tokio::test]
async fn signup_rejects_password_mismatch() -> anyhow::Result<()> {
    let test = TestApp::new().await?;

    let response = test
        .post_form(
            "/signup",
            "username=bob&password=secret1&confirm_password=secret2",
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await?.contains(signup::PASSWORD_MISMATCH));
    assert!(test.db.find_by_username("bob").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn signup_requires_username_and_password() -> anyhow::Result<()> {
    let test = TestApp::new().await?;

    let response = test
        .post_form("/signup", "username=&password=&confirm_password=")
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await?.contains(signup::MISSING_FIELDS));

    let response = test.post_form("/signup", "username=carol").await?;
    assert!(body_text(response).await?.contains(signup::MISSING_FIELDS));
    Ok(())
}

#[tokio::test]
async fn login_failures_are_indistinguishable() -> anyhow::Result<()> {
    let test = TestApp::new().await?;
    test.signup("alice", "secret1").await?;

    let wrong_password = test
        .post_form("/login", "username=alice&password=nope")
        .await?;
    let unknown_user = test
        .post_form("/login", "username=mallory&password=secret1")
        .await?;

    assert_eq!(wrong_password.status(), StatusCode::OK);
    assert_eq!(unknown_user.status(), StatusCode::OK);
    assert!(wrong_password.headers().get(SET_COOKIE).is_none());
    assert!(unknown_user.headers().get(SET_COOKIE).is_none());

    let wrong_password = body_text(wrong_password).await?;
    let unknown_user = body_text(unknown_user).await?;
    assert_eq!(wrong_password, unknown_user);
    assert!(wrong_password.contains(INVALID_CREDENTIALS));
    assert!(test.auth.sessions().is_empty());
    Ok(())
}

#[tokio::test]
async fn login_page_shows_flash_messages() -> anyhow::Result<()> {
    let test = TestApp::new().await?;

    let response = test.get(signup::SIGNUP_SUCCESS_REDIRECT, None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response)
        .await?
        .contains("Signup successful! Please login."));

    let response = test.get("/signup?error=%3Cb%3Eoops%3C%2Fb%3E", None).await?;
    let page = body_text(response).await?;
    assert!(page.contains("&lt;b&gt;oops&lt;/b&gt;"));
    Ok(())
}

#[tokio::test]
async fn logout_without_session_still_clears_cookie() -> anyhow::Result<()> {
    let test = TestApp::new().await?;

    let response = test.get("/logout", None).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let set_cookie = response
        .headers()
        .get(SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    assert!(set_cookie.contains("Max-Age=0"));
    Ok(())
}

#[tokio::test]
async fn repeated_logins_keep_independent_sessions() -> anyhow::Result<()> {
    let test = TestApp::new().await?;
    let first = test.logged_in("alice", "secret1").await?;
    let response = test
        .post_form("/login", "username=alice&password=secret1")
        .await?;
    let second = session_cookie(&response)?;
    assert_ne!(first, second);

    test.get("/logout", Some(&first)).await?;
    let response = test.get("/", Some(&second)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn predict_requires_a_session() -> anyhow::Result<()> {
    let test = TestApp::new().await?;

    let response = test.predict(None, "file", &png_fixture(16, 16)?).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Not even a multipart body: still 401 first
    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .body(Body::empty())?;
    let response = test.send(request).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn predict_returns_annotated_jpeg() -> anyhow::Result<()> {
    let test = TestApp::new().await?;
    let cookie = test.logged_in("alice", "secret1").await?;

    let response = test
        .predict(Some(&cookie), "file", &png_fixture(64, 48)?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(CONTENT_TYPE).map(|v| v.as_bytes()),
        Some(&b"image/jpeg"[..])
    );
    assert_eq!(
        response.headers().get("x-detections").map(|v| v.as_bytes()),
        Some(&b"person:0.90"[..])
    );

    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let decoded = image::load_from_memory(&bytes)?;
    assert_eq!((decoded.width(), decoded.height()), (64, 48));
    Ok(())
}

#[tokio::test]
async fn predict_rejects_bad_uploads() -> anyhow::Result<()> {
    let test = TestApp::new().await?;
    let cookie = test.logged_in("alice", "secret1").await?;

    let response = test
        .predict(Some(&cookie), "file", b"this is not an image")
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = test
        .predict(Some(&cookie), "picture", &png_fixture(8, 8)?)
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await?.contains("file"));

    let response = test.predict(Some(&cookie), "file", b"").await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn predict_rejects_oversized_uploads() -> anyhow::Result<()> {
    let test = TestApp::new().await?;
    let cookie = test.logged_in("alice", "secret1").await?;

    let oversized = vec![0u8; 2 * 1024 * 1024];
    let response = test.predict(Some(&cookie), "file", &oversized).await?;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    Ok(())
}

#[tokio::test]
async fn predict_times_out() -> anyhow::Result<()> {
    let test = TestApp::with_detector(
        StubDetector::slow(Duration::from_millis(300)),
        PoolSettings {
            workers: 1,
            queue: 0,
            timeout: Duration::from_millis(50),
        },
    )
    .await?;
    let cookie = test.logged_in("alice", "secret1").await?;

    let response = test
        .predict(Some(&cookie), "file", &png_fixture(8, 8)?)
        .await?;
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    Ok(())
}

#[tokio::test]
async fn predict_rejects_when_saturated() -> anyhow::Result<()> {
    let test = TestApp::with_detector(
        StubDetector::slow(Duration::from_millis(300)),
        PoolSettings {
            workers: 1,
            queue: 0,
            timeout: Duration::from_secs(5),
        },
    )
    .await?;
    let cookie = test.logged_in("alice", "secret1").await?;

    let first = {
        let app = test.app.clone();
        let request = predict_request(Some(&cookie), "file", &png_fixture(8, 8)?)?;
        tokio::spawn(async move { app.oneshot(request).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    let response = test
        .predict(Some(&cookie), "file", &png_fixture(8, 8)?)
        .await?;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    assert_eq!(first.await??.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn health_reports_database_and_model() -> anyhow::Result<()> {
    let test = TestApp::new().await?;

    let response = test.get("/health", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("X-App").is_some());
    assert!(response.headers().get("x-request-id").is_some());

    let body: serde_json::Value = serde_json::from_str(&body_text(response).await?)?;
    assert_eq!(body["name"], env!("CARGO_PKG_NAME"));
    assert_eq!(body["database"], "ok");
    assert_eq!(body["model"], "stub");
    Ok(())
}

#[tokio::test]
async fn request_id_is_propagated() -> anyhow::Result<()> {
    let test = TestApp::new().await?;

    let request = Request::builder()
        .uri("/login")
        .header("x-request-id", "req-123")
        .body(Body::empty())?;
    let response = test.send(request).await?;
    assert_eq!(
        response.headers().get("x-request-id").map(|v| v.as_bytes()),
        Some(&b"req-123"[..])
    );
    Ok(())
}
