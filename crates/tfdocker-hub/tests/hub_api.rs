use serde_json::json;
use tfdocker_hub::{HubClient, HubError, NewRepository, RepositoryUpdate};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn client(server: &MockServer) -> HubClient {
    HubClient::with_base_url(&format!("{}/v2", server.uri()))
        .unwrap()
        .with_token("alice", "test-token")
}

#[tokio::test]
async fn test_login_exchanges_password_for_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/users/login"))
        .and(body_json(json!({"username": "alice", "password": "secret"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "jwt-123"})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/orgs/acme"))
        .and(header("Authorization", "Bearer jwt-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"orgname": "acme"})))
        .mount(&server)
        .await;

    let client = HubClient::with_base_url(&format!("{}/v2", server.uri()))
        .unwrap()
        .login("alice", "secret")
        .await
        .unwrap();
    assert_eq!(client.username(), Some("alice"));

    let org = client.get_organization("acme").await.unwrap();
    assert_eq!(org.orgname, "acme");
}

#[tokio::test]
async fn test_login_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/users/login"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .mount(&server)
        .await;

    let err = HubClient::with_base_url(&format!("{}/v2", server.uri()))
        .unwrap()
        .login("alice", "wrong")
        .await
        .unwrap_err();

    assert!(matches!(err, HubError::AuthenticationFailed(_)));
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn test_repository_lifecycle() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/repositories/acme"))
        .and(header("Authorization", "Bearer test-token"))
        .and(body_json(json!({
            "namespace": "acme",
            "name": "api",
            "description": "API server",
            "full_description": "",
            "is_private": true
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "namespace": "acme",
            "name": "api",
            "description": "API server",
            "is_private": true,
            "pull_count": 0,
            "star_count": 0
        })))
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/v2/repositories/acme/api"))
        .and(body_json(json!({"description": "new", "full_description": "long"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "namespace": "acme",
            "name": "api",
            "description": "new",
            "full_description": "long",
            "is_private": true
        })))
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/v2/repositories/acme/api"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let client = client(&server).await;

    let repo = client
        .create_repository(&NewRepository {
            namespace: "acme".to_string(),
            name: "api".to_string(),
            description: "API server".to_string(),
            full_description: String::new(),
            is_private: true,
        })
        .await
        .unwrap();
    assert!(repo.is_private);

    let repo = client
        .update_repository(
            "acme",
            "api",
            &RepositoryUpdate {
                description: "new".to_string(),
                full_description: "long".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(repo.full_description.as_deref(), Some("long"));

    client.delete_repository("acme", "api").await.unwrap();
}

#[tokio::test]
async fn test_not_found_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/repositories/acme/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_string("{\"message\":\"not found\"}"))
        .mount(&server)
        .await;

    let err = client(&server)
        .await
        .get_repository("acme", "gone")
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(
        err.to_string(),
        "API error: 404 Not Found - {\"message\":\"not found\"}"
    );
}

#[tokio::test]
async fn test_list_walks_all_pages() {
    let server = MockServer::start().await;

    let first: Vec<_> = (0..100)
        .map(|i| json!({"namespace": "acme", "name": format!("repo-{}", i)}))
        .collect();

    Mock::given(method("GET"))
        .and(path("/v2/repositories/acme"))
        .and(query_param("page", "1"))
        .and(query_param("page_size", "100"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"count": 101, "results": first})),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/repositories/acme"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 101,
            "results": [{"namespace": "acme", "name": "repo-100"}]
        })))
        .mount(&server)
        .await;

    let repos = client(&server).await.list_repositories("acme").await.unwrap();
    assert_eq!(repos.len(), 101);
    assert_eq!(repos[100].name, "repo-100");
}

#[tokio::test]
async fn test_list_stops_on_empty_page() {
    let server = MockServer::start().await;

    // count が実数より多くても、空のページで打ち切る
    Mock::given(method("GET"))
        .and(path("/v2/access-tokens"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 50,
            "results": [{"uuid": "t-1", "token_label": "ci", "is_active": true}]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/access-tokens"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"count": 50, "results": []})))
        .mount(&server)
        .await;

    let tokens = client(&server).await.list_access_tokens().await.unwrap();
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].label, "ci");
}

#[tokio::test]
async fn test_team_name_is_path_escaped() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/orgs/acme/groups/dev%20ops"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "dev ops",
            "member_count": 3
        })))
        .mount(&server)
        .await;

    let team = client(&server).await.get_team("acme", "dev ops").await.unwrap();
    assert_eq!(team.name, "dev ops");
    assert_eq!(team.member_count, 3);
}

#[tokio::test]
async fn test_team_membership() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/orgs/acme/groups/devs/members"))
        .and(body_json(json!({"member": "bob"})))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/orgs/acme/groups/devs/members"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 2,
            "results": [{"username": "alice"}, {"username": "bob"}]
        })))
        .mount(&server)
        .await;

    let client = client(&server).await;
    client.add_team_member("acme", "devs", "bob").await.unwrap();
    assert!(client.is_team_member("acme", "devs", "bob").await.unwrap());
    assert!(!client.is_team_member("acme", "devs", "carol").await.unwrap());
}

#[tokio::test]
async fn test_no_content_update_yields_default() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/v2/access-tokens/t-1"))
        .and(body_json(json!({"is_active": false})))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let token = client(&server)
        .await
        .update_access_token("t-1", false)
        .await
        .unwrap();
    assert_eq!(token.uuid, "");
}

#[tokio::test]
async fn test_repository_team_permission() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/repositories/acme/api/groups"))
        .and(body_json(json!({"group_name": "devs", "permission": "write"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/repositories/acme/api/groups/devs"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"group_name": "devs", "permission": "write"})),
        )
        .mount(&server)
        .await;

    let client = client(&server).await;
    client
        .set_repository_team_permission("acme", "api", "devs", "write")
        .await
        .unwrap();

    let permission = client
        .get_repository_team_permission("acme", "api", "devs")
        .await
        .unwrap();
    assert_eq!(permission.permission, "write");
}
