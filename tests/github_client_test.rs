//! GitHub adapter against a local mock server.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;

use issuehive::domain::errors::DomainError;
use issuehive::domain::models::{ChangeRequestState, IssueRef, MergeStatus, RepoRef};
use issuehive::domain::ports::IssueTracker;
use issuehive::infrastructure::github::{GithubClient, GithubClientConfig};

fn client(server: &ServerGuard, max_retries: u32) -> GithubClient {
    GithubClient::with_config(GithubClientConfig {
        token: Some("t0ken".to_string()),
        api_base: server.url(),
        max_retries,
        retry_base_delay: Duration::from_millis(1),
        ..Default::default()
    })
    .unwrap()
}

fn issue_json(number: u64, is_pr: bool) -> serde_json::Value {
    let mut issue = json!({
        "number": number,
        "title": format!("Issue {number}"),
        "body": "details",
        "state": "open",
        "html_url": format!("https://github.com/acme/widgets/issues/{number}"),
        "updated_at": "2024-03-01T12:00:00Z",
        "labels": [{ "name": "help wanted" }],
        "repository_url": "https://api.github.com/repos/acme/widgets",
    });
    if is_pr {
        issue["pull_request"] = json!({ "url": "https://api.github.com/repos/acme/widgets/pulls/9" });
    }
    issue
}

fn pull_json(number: u64, head_ref: &str, body: &str) -> serde_json::Value {
    json!({
        "number": number,
        "state": "open",
        "merged": false,
        "head": { "sha": "abc123", "ref": head_ref },
        "draft": true,
        "updated_at": "2024-03-01T12:30:00Z",
        "node_id": format!("PR_node_{number}"),
        "body": body,
    })
}

#[tokio::test]
async fn test_list_open_issues_skips_pull_requests() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/repos/acme/widgets/issues")
        .match_header("authorization", "Bearer t0ken")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("state".into(), "open".into()),
            Matcher::UrlEncoded("labels".into(), "help wanted".into()),
            Matcher::UrlEncoded("page".into(), "1".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!([issue_json(7, false), issue_json(9, true), issue_json(11, false)]).to_string())
        .create_async()
        .await;

    let issues = client(&server, 0)
        .list_open_issues("acme", "widgets", "help wanted")
        .await
        .unwrap();

    mock.assert_async().await;
    let numbers: Vec<u64> = issues.iter().map(|i| i.number).collect();
    assert_eq!(numbers, vec![7, 11]);
    assert_eq!(issues[0].repo, "widgets");
}

#[tokio::test]
async fn test_owner_wide_search_reads_repository_from_url() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/search/issues")
        .match_query(Matcher::UrlEncoded(
            "q".into(),
            "user:acme is:issue is:open label:\"help wanted\"".into(),
        ))
        .with_status(200)
        .with_body(json!({ "items": [issue_json(3, false)] }).to_string())
        .create_async()
        .await;

    let issues = client(&server, 0)
        .list_open_issues("acme", "", "help wanted")
        .await
        .unwrap();

    assert_eq!(issues, vec![IssueRef::parse("acme/widgets#3").unwrap()]);
}

#[tokio::test]
async fn test_find_pull_request_for_issue_fetches_full_record() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/repos/acme/widgets/pulls")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            json!([
                pull_json(12, "feature-x", "Fixes #70"),
                pull_json(13, "some-branch", "This fixes #7 properly"),
            ])
            .to_string(),
        )
        .create_async()
        .await;
    let mut full = pull_json(13, "some-branch", "This fixes #7 properly");
    full["mergeable_state"] = json!("dirty");
    server
        .mock("GET", "/repos/acme/widgets/pulls/13")
        .with_status(200)
        .with_body(full.to_string())
        .create_async()
        .await;

    let issue = IssueRef::parse("acme/widgets#7").unwrap();
    let pr = client(&server, 0)
        .find_pull_request_for_issue(&issue)
        .await
        .unwrap()
        .expect("linked pull request");

    assert_eq!(pr.number, 13);
    assert_eq!(pr.state, ChangeRequestState::Open);
    assert_eq!(pr.merge_status, MergeStatus::Dirty);
    assert_eq!(pr.head_ref, "some-branch");
    assert!(pr.draft);
}

#[tokio::test]
async fn test_not_found_names_the_operation() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/repos/acme/widgets/issues/404")
        .with_status(404)
        .with_body(r#"{"message":"Not Found"}"#)
        .create_async()
        .await;

    let err = client(&server, 0)
        .get_issue(&IssueRef::parse("acme/widgets#404").unwrap())
        .await
        .unwrap_err();

    match err {
        DomainError::Integration { operation, message } => {
            assert_eq!(operation, "get_issue");
            assert!(message.contains("not found"), "{message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_server_errors_are_retried_then_surface() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/repos/acme/widgets")
        .with_status(503)
        .with_body("upstream unavailable")
        .expect(3)
        .create_async()
        .await;

    let err = client(&server, 2)
        .get_repository(&RepoRef::new("acme", "widgets"))
        .await
        .unwrap_err();

    mock.assert_async().await;
    assert!(err.to_string().contains("get_repository"));
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/repos/acme/widgets/issues/7/comments")
        .with_status(422)
        .with_body(r#"{"message":"Validation Failed"}"#)
        .expect(1)
        .create_async()
        .await;

    let result = client(&server, 3)
        .post_comment(&RepoRef::new("acme", "widgets"), 7, "hello")
        .await;

    mock.assert_async().await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_post_comment_sends_body() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/repos/acme/widgets/issues/7/comments")
        .match_body(Matcher::Json(json!({ "body": "🤖 starting work" })))
        .with_status(201)
        .with_body(r#"{"id": 1}"#)
        .create_async()
        .await;

    client(&server, 0)
        .post_comment(&RepoRef::new("acme", "widgets"), 7, "🤖 starting work")
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_mark_ready_surfaces_graphql_errors() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/graphql")
        .match_body(Matcher::PartialJson(json!({ "variables": { "id": "PR_node_5" } })))
        .with_status(200)
        .with_body(r#"{"data":null,"errors":[{"message":"Pull request is not a draft"}]}"#)
        .create_async()
        .await;

    let pr = issuehive::domain::models::PullRequestDetails {
        number: 5,
        state: ChangeRequestState::Open,
        merge_status: MergeStatus::Clean,
        head_sha: "abc".to_string(),
        head_ref: "issue-5-00000001".to_string(),
        draft: true,
        updated_at: Utc::now(),
        node_id: "PR_node_5".to_string(),
    };
    let err = client(&server, 0).mark_ready_for_review(&pr).await.unwrap_err();

    assert!(err.to_string().contains("not a draft"));
}

#[tokio::test]
async fn test_current_actor_is_cached() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/user")
        .with_status(200)
        .with_body(r#"{"login":"hive-bot"}"#)
        .expect(1)
        .create_async()
        .await;

    let client = client(&server, 0);
    assert_eq!(client.current_actor().await.unwrap(), "hive-bot");
    assert_eq!(client.current_actor().await.unwrap(), "hive-bot");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_last_pull_request_commit_uses_committer_date() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/repos/acme/widgets/pulls/12/commits")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            json!([
                { "commit": { "committer": { "date": "2024-03-01T10:00:00Z" } } },
                { "commit": { "committer": { "date": "2024-03-01T12:00:00Z" } } },
            ])
            .to_string(),
        )
        .create_async()
        .await;

    let time = client(&server, 0)
        .last_pull_request_commit_time(&RepoRef::new("acme", "widgets"), 12)
        .await
        .unwrap();

    assert_eq!(time, Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()));
}

#[tokio::test]
async fn test_convert_to_draft_sends_mutation() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/graphql")
        .match_body(Matcher::AllOf(vec![
            Matcher::PartialJson(json!({ "variables": { "id": "PR_node_6" } })),
            Matcher::Regex("convertPullRequestToDraft".to_string()),
        ]))
        .with_status(200)
        .with_body(r#"{"data":{"convertPullRequestToDraft":{"pullRequest":{"isDraft":true}}}}"#)
        .create_async()
        .await;

    let pr = issuehive::domain::models::PullRequestDetails {
        number: 6,
        state: ChangeRequestState::Open,
        merge_status: MergeStatus::Clean,
        head_sha: "abc".to_string(),
        head_ref: "issue-6-00000002".to_string(),
        draft: false,
        updated_at: Utc::now(),
        node_id: "PR_node_6".to_string(),
    };
    client(&server, 0).convert_to_draft(&pr).await.unwrap();

    mock.assert_async().await;
}
