use std::collections::HashMap;
use std::sync::Arc;

use redline::auth::TokenGenerator;
use redline::config::ServerConfig;
use redline::identity::Directory;
use redline::server::{AppState, create_router};
use redline::types::Role;
use serde_json::Value;
use tokio::task::JoinHandle;

/// Ids of the users every test server knows.
pub struct Users;

impl Users {
    /// Superadmin.
    pub const SAM: &'static str = "sam";
    /// Admin, member of nothing until added.
    pub const ADA: &'static str = "ada";
    pub const MIA: &'static str = "mia";
    pub const OSCAR: &'static str = "oscar";
}

/// An in-process server on an ephemeral port.
pub struct TestServer {
    pub base_url: String,
    pub ws_url: String,
    pub state: Arc<AppState>,
    tokens: HashMap<&'static str, String>,
    client: reqwest::Client,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(ServerConfig::default()).await
    }

    pub async fn start_with(config: ServerConfig) -> Self {
        let directory = Directory::new();
        let generator = TokenGenerator::new();
        let mut tokens = HashMap::new();

        for (id, name, role) in [
            (Users::SAM, "Sam", Role::SuperAdmin),
            (Users::ADA, "Ada", Role::Admin),
            (Users::MIA, "Mia", Role::User),
            (Users::OSCAR, "Oscar", Role::User),
        ] {
            directory.insert_user(id, name, role);
            let issued = generator.issue(id).expect("issue token");
            directory.insert_credential(issued.credential);
            tokens.insert(id, issued.raw);
        }

        let state = Arc::new(AppState::new(Arc::new(directory), config));
        let app = create_router(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });

        Self {
            base_url: format!("http://{addr}"),
            ws_url: format!("ws://{addr}/api/v1/ws"),
            state,
            tokens,
            client: reqwest::Client::new(),
            handle,
        }
    }

    pub fn token(&self, user: &str) -> &str {
        self.tokens.get(user).expect("known user")
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    pub async fn get(&self, user: &str, path: &str) -> (u16, Value) {
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(self.token(user))
            .send()
            .await
            .expect("send");
        Self::read(resp).await
    }

    pub async fn post(&self, user: &str, path: &str, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .post(self.url(path))
            .bearer_auth(self.token(user))
            .json(&body)
            .send()
            .await
            .expect("send");
        Self::read(resp).await
    }

    pub async fn put(&self, user: &str, path: &str, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .put(self.url(path))
            .bearer_auth(self.token(user))
            .json(&body)
            .send()
            .await
            .expect("send");
        Self::read(resp).await
    }

    async fn read(resp: reqwest::Response) -> (u16, Value) {
        let status = resp.status().as_u16();
        let body = resp.json().await.expect("json body");
        (status, body)
    }

    /// Creates a project owned by sam with mia as a member. Returns its id.
    pub async fn project(&self, content: &str) -> String {
        let (status, body) = self
            .post(
                Users::SAM,
                "/projects",
                serde_json::json!({
                    "name": "Handbook",
                    "description": "Team handbook",
                    "content": content,
                }),
            )
            .await;
        assert_eq!(status, 201, "{body}");
        let id = body["data"]["id"].as_str().expect("project id").to_string();

        let (status, body) = self
            .post(
                Users::SAM,
                &format!("/projects/{id}/members"),
                serde_json::json!({ "userId": Users::MIA }),
            )
            .await;
        assert_eq!(status, 200, "{body}");
        id
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
