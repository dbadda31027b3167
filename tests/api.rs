mod common;

use common::{TestServer, Users};
use redline::config::{ServerConfig, StalePolicy};
use serde_json::json;

#[tokio::test]
async fn test_health() {
    let server = TestServer::start().await;
    let body = reqwest::get(format!("{}/health", server.base_url))
        .await
        .expect("health")
        .text()
        .await
        .expect("body");
    assert_eq!(body, "OK");
}

#[tokio::test]
async fn test_requires_token() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/api/v1/projects", server.base_url))
        .send()
        .await
        .expect("send");
    assert_eq!(resp.status().as_u16(), 401);
    assert!(resp.headers().contains_key("www-authenticate"));

    let resp = client
        .get(format!("{}/api/v1/projects", server.base_url))
        .bearer_auth("redline_00000000_000000000000000000000000")
        .send()
        .await
        .expect("send");
    assert_eq!(resp.status().as_u16(), 401);
}

#[tokio::test]
async fn test_review_workflow_over_http() {
    let server = TestServer::start().await;
    let project = server.project("A\nB").await;
    let content_path = format!("/projects/{project}/content");

    let (status, body) = server
        .post(Users::OSCAR, &content_path, json!({"content": "hacked"}))
        .await;
    assert_eq!(status, 403);
    assert!(body["data"].is_null());
    assert!(body["error"].as_str().unwrap().contains("access denied"));

    let (status, body) = server
        .post(Users::MIA, &content_path, json!({"content": "A\nC"}))
        .await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["data"]["staged"], true);
    assert_eq!(body["data"]["committed"], false);
    assert_eq!(body["data"]["message"], "Changes staged for approval");
    let change_id = body["data"]["changeId"].as_str().unwrap().to_string();

    let (_, body) = server.get(Users::SAM, &format!("/projects/{project}")).await;
    assert_eq!(body["data"]["content"], "A\nB");
    assert_eq!(body["data"]["hasPendingChanges"], true);
    let before = body["data"]["version"].as_u64().unwrap();

    let (status, body) = server
        .get(Users::MIA, &format!("/projects/{project}/staged-changes"))
        .await;
    assert_eq!(status, 403, "{body}");

    let (status, body) = server
        .get(Users::ADA, &format!("/projects/{project}/staged-changes"))
        .await;
    assert_eq!(status, 200);
    let pending = body["data"].as_array().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0]["proposerId"], Users::MIA);
    assert_eq!(pending[0]["status"], "pending");

    let review_path = format!("/staged-changes/{change_id}");
    let (status, body) = server
        .put(Users::ADA, &review_path, json!({"approve": true, "feedback": "ok"}))
        .await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["data"]["message"], "Changes approved and applied");
    assert_eq!(body["data"]["change"]["status"], "approved");
    assert_eq!(body["data"]["change"]["feedback"], "ok");

    let (_, body) = server.get(Users::MIA, &format!("/projects/{project}")).await;
    assert_eq!(body["data"]["content"], "A\nC");
    assert_eq!(body["data"]["version"].as_u64().unwrap(), before + 1);

    let (_, body) = server
        .get(Users::MIA, &format!("/projects/{project}/history"))
        .await;
    let head = &body["data"][0];
    assert_eq!(head["kind"], "merge");
    assert_eq!(head["changeId"], change_id.as_str());

    let (status, _) = server
        .put(Users::ADA, &review_path, json!({"approve": false}))
        .await;
    assert_eq!(status, 409);

    let (status, body) = server.get(Users::MIA, &review_path).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["reviewerId"], Users::ADA);
}

#[tokio::test]
async fn test_owner_commits_directly() {
    let server = TestServer::start().await;
    let project = server.project("one").await;

    let (status, body) = server
        .post(
            Users::SAM,
            &format!("/projects/{project}/content"),
            json!({"content": "one two three"}),
        )
        .await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["data"]["committed"], true);
    assert_eq!(body["data"]["message"], "Content updated directly");
    assert_eq!(body["data"]["version"], 2);

    let (_, body) = server
        .get(Users::SAM, &format!("/projects/{project}/edit-history"))
        .await;
    let edits = body["data"].as_array().unwrap();
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0]["kind"], "commit");
    assert_eq!(edits[0]["changes"]["wordsAdded"], 2);
    assert_eq!(edits[0]["changes"]["wordsRemoved"], 0);
    assert_eq!(edits[0]["changes"]["newLength"], 13);
}

#[tokio::test]
async fn test_content_is_required() {
    let server = TestServer::start().await;
    let project = server.project("").await;

    let (status, body) = server
        .post(Users::MIA, &format!("/projects/{project}/content"), json!({}))
        .await;
    assert_eq!(status, 400, "{body}");
}

#[tokio::test]
async fn test_unknown_resources() {
    let server = TestServer::start().await;

    let (status, _) = server.get(Users::SAM, "/projects/nope").await;
    assert_eq!(status, 404);

    let (status, _) = server
        .put(Users::SAM, "/staged-changes/nope", json!({"approve": true}))
        .await;
    assert_eq!(status, 404);

    let (status, body) = server.get(Users::SAM, "/projects/nope/history").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_project_creation_and_listing() {
    let server = TestServer::start().await;

    let (status, _) = server
        .post(
            Users::MIA,
            "/projects",
            json!({"name": "Mine", "description": "mine"}),
        )
        .await;
    assert_eq!(status, 403);

    let (status, _) = server
        .post(Users::SAM, "/projects", json!({"name": "", "description": "x"}))
        .await;
    assert_eq!(status, 400);

    let project = server.project("hello").await;

    let (_, body) = server.get(Users::MIA, "/projects").await;
    let listed = body["data"].as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["id"], project.as_str());

    let (_, body) = server.get(Users::OSCAR, "/projects").await;
    assert_eq!(body["data"], json!([]));

    let (_, body) = server.get(Users::MIA, &format!("/projects/{project}")).await;
    assert_eq!(body["data"]["canEdit"], false);
    assert_eq!(body["data"]["version"], 1);
    assert_eq!(body["data"]["members"], json!([Users::SAM, Users::MIA]));

    let (status, _) = server
        .post(
            Users::MIA,
            &format!("/projects/{project}/members"),
            json!({"userId": Users::OSCAR}),
        )
        .await;
    assert_eq!(status, 403);
}

#[tokio::test]
async fn test_history_limits() {
    let server = TestServer::start().await;
    let project = server.project("").await;

    for n in 0..40 {
        let (status, _) = server
            .post(
                Users::SAM,
                &format!("/projects/{project}/content"),
                json!({"content": format!("rev {n}")}),
            )
            .await;
        assert_eq!(status, 200);
    }

    let (_, body) = server
        .get(Users::SAM, &format!("/projects/{project}/edit-history"))
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 30);

    let (_, body) = server
        .get(Users::SAM, &format!("/projects/{project}/history"))
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 42);

    let (_, body) = server
        .get(Users::SAM, &format!("/projects/{project}/history?limit=5"))
        .await;
    let entries = body["data"].as_array().unwrap();
    assert_eq!(entries.len(), 5);
    assert_eq!(entries[0]["message"], "Sam updated the content directly");
}

#[tokio::test]
async fn test_stale_approval_conflicts_when_configured() {
    let server = TestServer::start_with(ServerConfig {
        stale_policy: StalePolicy::Conflict,
        ..ServerConfig::default()
    })
    .await;
    let project = server.project("base").await;
    let content_path = format!("/projects/{project}/content");

    let (_, body) = server
        .post(Users::MIA, &content_path, json!({"content": "proposal"}))
        .await;
    let change_id = body["data"]["changeId"].as_str().unwrap().to_string();

    server
        .post(Users::SAM, &content_path, json!({"content": "moved on"}))
        .await;

    let (status, _) = server
        .put(
            Users::SAM,
            &format!("/staged-changes/{change_id}"),
            json!({"approve": true}),
        )
        .await;
    assert_eq!(status, 409);
}

#[tokio::test]
async fn test_admin_outside_project_is_denied_content() {
    let server = TestServer::start().await;
    let project = server.project("A\nB").await;

    let (status, _) = server
        .post(
            Users::ADA,
            &format!("/projects/{project}/content"),
            json!({"content": "hijacked"}),
        )
        .await;
    assert_eq!(status, 403);

    let (status, _) = server.get(Users::ADA, &format!("/projects/{project}")).await;
    assert_eq!(status, 403);

    let (status, _) = server
        .get(Users::ADA, &format!("/projects/{project}/history"))
        .await;
    assert_eq!(status, 403);

    let (_, body) = server.get(Users::SAM, &format!("/projects/{project}")).await;
    assert_eq!(body["data"]["content"], "A\nB");
}
