#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use inkwell_api::{
    AppConfig, AppState, MemoryRepository, MockStorageService, OutboxMailer, create_router,
    mail::MailerState,
    models::{AuthorApplicationRequest, AuthorStatus, Role},
    repository::{Repository, RepositoryState},
    storage::StorageState,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "password123";

/// The full router wired to in-memory services, plus handles for inspecting them.
pub struct TestApp {
    pub router: Router,
    pub repo: Arc<MemoryRepository>,
    pub mailer: OutboxMailer,
    pub config: AppConfig,
}

#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// The envelope's `data` member.
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }
}

/// A signed-in account created through the API.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub access: String,
    pub refresh: String,
}

pub fn spawn_app() -> TestApp {
    spawn_app_with(AppConfig::default(), MockStorageService::new())
}

pub fn spawn_app_with(config: AppConfig, storage: MockStorageService) -> TestApp {
    let repo = Arc::new(MemoryRepository::new());
    let mailer = OutboxMailer::new();

    let state = AppState::new(
        repo.clone() as RepositoryState,
        Arc::new(storage) as StorageState,
        Arc::new(mailer.clone()) as MailerState,
        config.clone(),
    );

    TestApp {
        router: create_router(state),
        repo,
        mailer,
        config,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body collects")
            .to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("valid request");
        self.send(request).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.call(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.call(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.call(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.call(Method::DELETE, uri, token, None).await
    }

    /// Registers a reader account through `/auth/signup`.
    pub async fn signup(&self, name: &str, email: &str) -> Account {
        let response = self
            .post(
                "/auth/signup",
                None,
                json!({ "name": name, "email": email, "password": PASSWORD }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
        account_from(&response.body["data"], email)
    }

    pub async fn signin(&self, email: &str, password: &str) -> TestResponse {
        self.post(
            "/auth/signin",
            None,
            json!({ "email": email, "password": password }),
        )
        .await
    }

    /// A reader whose author application has already been approved.
    pub async fn author(&self, name: &str, email: &str) -> Account {
        let account = self.signup(name, email).await;
        self.approve_author(account.id).await;
        account
    }

    pub async fn admin(&self, name: &str, email: &str) -> Account {
        let account = self.signup(name, email).await;
        self.repo
            .set_user_role(account.id, Role::Admin)
            .await
            .expect("role update");
        account
    }

    pub async fn approve_author(&self, user_id: Uuid) {
        self.repo
            .submit_author_application(
                user_id,
                AuthorApplicationRequest {
                    motivation: "I have been writing about systems programming for years."
                        .to_string(),
                    portfolio_url: None,
                },
            )
            .await
            .expect("application stored");
        self.repo
            .transition_author_status(
                user_id,
                AuthorStatus::Pending,
                AuthorStatus::Approved,
                None,
                user_id,
            )
            .await
            .expect("transition")
            .expect("profile exists");
    }

    /// Creates a post as `author` and returns its id. Unapproved.
    pub async fn draft(&self, author: &Account, title: &str) -> Uuid {
        let response = self
            .post(
                "/blogs",
                Some(&author.access),
                json!({
                    "title": title,
                    "content": "Ownership and borrowing make aliasing rules explicit.",
                    "tags": ["rust", "Systems"]
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
        uuid_of(&response.body["data"]["id"])
    }

    /// Creates a post as `author` and approves it as `admin`.
    pub async fn published(&self, author: &Account, admin: &Account, title: &str) -> Uuid {
        let id = self.draft(author, title).await;
        let response = self
            .put(&format!("/admin/blogs/{id}/approve"), Some(&admin.access), json!({}))
            .await;
        assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
        id
    }
}

pub fn account_from(data: &Value, email: &str) -> Account {
    Account {
        id: uuid_of(&data["user"]["id"]),
        email: email.to_string(),
        access: data["tokens"]["access_token"]
            .as_str()
            .expect("access token")
            .to_string(),
        refresh: data["tokens"]["refresh_token"]
            .as_str()
            .expect("refresh token")
            .to_string(),
    }
}

pub fn uuid_of(value: &Value) -> Uuid {
    value
        .as_str()
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(|| panic!("not a uuid: {value}"))
}

/// Pulls the `token=` query value out of the most recent email to `address`.
pub fn token_from_mail(mailer: &OutboxMailer, address: &str) -> String {
    let mail = mailer
        .sent_to(address)
        .pop()
        .unwrap_or_else(|| panic!("no email sent to {address}"));
    let start = mail.body.find("token=").expect("link with token") + "token=".len();
    mail.body[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}
