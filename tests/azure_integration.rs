//! Integration tests for the Azure DevOps adapter against a wiremock server.

use std::time::Duration;

use polyforge::forge::azure::AzureDevOpsForge;
use polyforge::forge::{
    CommitFileRequest, CreateBranchRequest, ErrorClass, Forge, ForgeError, ListPrsOpts, PrState,
    PrStateFilter, Provider, RepositoryRef, ResourceKind,
};
use serde_json::{json, Value};
use wiremock::matchers::{any, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REPO_PATH: &str = "/acme/Platform/_apis/git/repositories/widgets";
const TIP: &str = "c1a0f2b9e4d3a6b5c8d7e0f1a2b3c4d5e6f7a8b9";
const NEW: &str = "d2b1e3c0f5e4b7c6d9e8f1a0b3c2d5e4f7a6b9c8";

fn repo() -> RepositoryRef {
    RepositoryRef::azure("acme", "Platform", "widgets")
}

fn pr_json(id: u64, status: Value) -> Value {
    json!({
        "pullRequestId": id,
        "title": format!("PR {}", id),
        "description": "body",
        "status": status,
        "sourceRefName": "refs/heads/feature",
        "targetRefName": "refs/heads/main",
        "createdBy": {"displayName": "Jamie Doe", "uniqueName": "jamie@example.com"},
        "isDraft": false,
        "creationDate": "2024-02-01T09:00:00Z"
    })
}

async fn setup() -> (MockServer, AzureDevOpsForge) {
    let server = MockServer::start().await;
    let forge = AzureDevOpsForge::new("pat", format!("{}/acme", server.uri()));
    (server, forge)
}

async fn mount_tip(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(format!("{}/refs", REPO_PATH)))
        .and(query_param("filter", "heads/main"))
        .and(query_param("api-version", "7.1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                {"name": "refs/heads/main", "objectId": TIP},
                {"name": "refs/heads/main-archive", "objectId": NEW}
            ],
            "count": 2
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn missing_project_makes_no_request() {
    let (server, forge) = setup().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let no_project = RepositoryRef::new(Provider::AzureDevOps, "acme", "widgets");
    let err = forge.list_prs(&no_project, ListPrsOpts::default()).await.unwrap_err();

    match err {
        ForgeError::Validation { field, provider, .. } => {
            assert_eq!(field.as_deref(), Some("project"));
            assert_eq!(provider, Provider::AzureDevOps);
        }
        other => panic!("expected Validation, got {:?}", other),
    }
}

mod pull_requests {
    use super::*;

    #[tokio::test]
    async fn closed_filter_keeps_abandoned_and_completed() {
        let (server, forge) = setup().await;

        Mock::given(method("GET"))
            .and(path(format!("{}/pullrequests", REPO_PATH)))
            .and(query_param("searchCriteria.status", "all"))
            .and(query_param("$top", "30"))
            .and(header("authorization", "Basic OnBhdA=="))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [
                    pr_json(1, json!(1)),
                    pr_json(2, json!(2)),
                    pr_json(3, json!(3))
                ],
                "count": 3
            })))
            .expect(1)
            .mount(&server)
            .await;

        let prs = forge
            .list_prs(
                &repo(),
                ListPrsOpts {
                    state: PrStateFilter::Closed,
                    limit: None,
                },
            )
            .await
            .unwrap();

        let got: Vec<(u64, PrState)> = prs.iter().map(|p| (p.number, p.state)).collect();
        assert_eq!(got, vec![(2, PrState::Closed), (3, PrState::Merged)]);
    }

    #[tokio::test]
    async fn string_status_and_links() {
        let (server, forge) = setup().await;
        let mut body = pr_json(31, json!("completed"));
        body["closedDate"] = json!("2024-02-03T09:00:00Z");

        Mock::given(method("GET"))
            .and(path(format!("{}/pullrequests/31", REPO_PATH)))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let pr = forge.get_pr(&repo(), 31).await.unwrap();
        assert_eq!(pr.state, PrState::Merged);
        assert_eq!(pr.id, pr.number);
        assert_eq!(pr.source_branch, "feature");
        assert_eq!(pr.author, "Jamie Doe");
        assert_eq!(
            pr.url,
            format!("{}/acme/Platform/_git/widgets/pullrequest/31", server.uri())
        );
        assert_eq!(pr.updated_at.to_rfc3339(), "2024-02-03T09:00:00+00:00");
    }
}

mod branches {
    use super::*;

    #[tokio::test]
    async fn create_uses_zero_old_object_id() {
        let (server, forge) = setup().await;
        mount_tip(&server).await;

        Mock::given(method("POST"))
            .and(path(format!("{}/refs", REPO_PATH)))
            .and(body_partial_json(json!([{
                "name": "refs/heads/feature-x",
                "oldObjectId": "0000000000000000000000000000000000000000",
                "newObjectId": TIP
            }])))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{
                    "name": "refs/heads/feature-x",
                    "oldObjectId": "0000000000000000000000000000000000000000",
                    "newObjectId": TIP,
                    "success": true,
                    "updateStatus": "succeeded"
                }],
                "count": 1
            })))
            .expect(1)
            .mount(&server)
            .await;

        let branch = forge
            .create_branch(
                &repo(),
                CreateBranchRequest {
                    name: "feature-x".into(),
                    from_ref: "main".into(),
                },
            )
            .await
            .unwrap();

        assert_eq!(branch.name, "feature-x");
        assert_eq!(branch.sha, TIP);
        assert!(!branch.is_default);
        assert!(!branch.protected);
    }

    #[tokio::test]
    async fn missing_repository_reports_the_branch() {
        let (server, forge) = setup().await;
        let missing = json!({
            "message": "TF401019: The Git repository with name or identifier widgets does not exist or you do not have permissions for the operation you are attempting."
        });

        Mock::given(method("GET"))
            .and(path(format!("{}/refs", REPO_PATH)))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(missing.clone())
                    .set_delay(Duration::from_millis(200)),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(REPO_PATH))
            .respond_with(ResponseTemplate::new(404).set_body_json(missing))
            .mount(&server)
            .await;

        let err = forge.get_branch(&repo(), "main").await.unwrap_err();
        assert!(matches!(
            err,
            ForgeError::NotFound { resource: ResourceKind::Branch, ref identifier, .. } if identifier == "main"
        ));
    }

    #[tokio::test]
    async fn get_branch_exact_match_and_default() {
        let (server, forge) = setup().await;
        mount_tip(&server).await;

        Mock::given(method("GET"))
            .and(path(REPO_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "guid",
                "name": "widgets",
                "defaultBranch": "refs/heads/main"
            })))
            .mount(&server)
            .await;

        let branch = forge.get_branch(&repo(), "main").await.unwrap();
        assert_eq!(branch.name, "main");
        assert_eq!(branch.sha, TIP);
        assert!(branch.is_default);
    }
}

mod commit_file {
    use super::*;

    fn request() -> CommitFileRequest {
        CommitFileRequest {
            path: "docs/README.md".into(),
            content: "# Widgets".into(),
            message: "Update readme".into(),
            branch: "main".into(),
        }
    }

    fn push_response() -> ResponseTemplate {
        ResponseTemplate::new(201).set_body_json(json!({
            "pushId": 12,
            "commits": [{"commitId": NEW, "comment": "Update readme"}],
            "refUpdates": [{"name": "refs/heads/main", "oldObjectId": TIP, "newObjectId": NEW}]
        }))
    }

    #[tokio::test]
    async fn add_then_edit_fallback() {
        let (server, forge) = setup().await;
        mount_tip(&server).await;

        Mock::given(method("POST"))
            .and(path(format!("{}/pushes", REPO_PATH)))
            .and(body_partial_json(json!({
                "refUpdates": [{"name": "refs/heads/main", "oldObjectId": TIP}],
                "commits": [{"changes": [{"changeType": "add", "item": {"path": "/docs/README.md"}}]}]
            })))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "message": "TF401028: The path '/docs/README.md' already exists."
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path(format!("{}/pushes", REPO_PATH)))
            .and(body_partial_json(json!({
                "refUpdates": [{"name": "refs/heads/main", "oldObjectId": TIP}],
                "commits": [{"changes": [{"changeType": "edit"}]}]
            })))
            .respond_with(push_response())
            .expect(1)
            .mount(&server)
            .await;

        let result = forge.commit_file(&repo(), request()).await.unwrap();
        assert_eq!(result.sha, NEW);
        assert_eq!(result.message, "Update readme");
    }

    #[tokio::test]
    async fn new_file_needs_one_push() {
        let (server, forge) = setup().await;
        mount_tip(&server).await;

        Mock::given(method("POST"))
            .and(path(format!("{}/pushes", REPO_PATH)))
            .respond_with(push_response())
            .expect(1)
            .mount(&server)
            .await;

        assert!(forge.commit_file(&repo(), request()).await.is_ok());
    }
}

#[tokio::test]
async fn sign_in_page_is_authentication() {
    let (server, forge) = setup().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(203)
                .insert_header("content-type", "text/html")
                .set_body_string("<html>Sign In</html>"),
        )
        .mount(&server)
        .await;

    let err = forge.get_pr(&repo(), 1).await.unwrap_err();
    assert_eq!(err.kind(), ErrorClass::Authentication);
}
