use std::sync::Arc;

use playground_client::HttpPlaygroundApi;
use playground_client::HttpScenarioRowsFetcher;
use playground_client::connect_playground;
use playground_pagination::LoadOutcome;
use playground_pagination::PageMeta;
use playground_pagination::PageRequest;
use playground_pagination::PaginationError;
use playground_pagination::PaginationStore;
use playground_pagination::RowWindowFetcher;
use playground_pagination::StoreOptions;
use playground_state::ApiError;
use playground_state::PlaygroundApi;
use playground_state::PlaygroundConfig;
use playground_state::PlaygroundOptions;
use playground_state::ResourceKey;
use playground_state::VariantId;
use playground_state::config::ApiConfig;
use pretty_assertions::assert_eq;
use serde_json::Value;
use serde_json::json;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::body_json;
use wiremock::matchers::body_partial_json;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::matchers::query_param;

fn api_config(server: &MockServer, project_id: Option<&str>) -> ApiConfig {
    ApiConfig {
        base_url: server.uri(),
        project_id: project_id.map(str::to_string),
        ..ApiConfig::default()
    }
}

fn variant_json(server: &MockServer, id: &str, name: &str) -> Value {
    json!({
        "variant_id": id,
        "variant_name": name,
        "revision": 3,
        "base_id": format!("base-{id}"),
        "base_name": "capitals",
        "config_name": name,
        "uri": format!("{}/app", server.uri()),
        "parameters": {
            "prompt": {
                "messages": [
                    {"role": "system", "content": "You answer geography questions."},
                    {"role": "user", "content": "Capital of {country}?"}
                ],
                "llm_config": {"model": "gpt-4o-mini", "temperature": 0.2}
            }
        }
    })
}

fn openapi_json() -> Value {
    json!({
        "paths": {
            "/test": {"post": {"requestBody": {"content": {"application/json": {"schema": {
                "type": "object",
                "properties": {"ag_config": {"type": "object", "properties": {}}}
            }}}}}}
        }
    })
}

#[tokio::test]
async fn fetch_variants_uses_the_resource_key_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/apps/app-1/variants"))
        .and(query_param("project_id", "proj-1"))
        .and(query_param("v", "2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([variant_json(&server, "A", "v1")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let api = HttpPlaygroundApi::new(&api_config(&server, Some("proj-1"))).unwrap();
    let variants = api
        .fetch_variants(&ResourceKey::variants("app-1", "proj-1"))
        .await
        .unwrap();

    assert_eq!(variants.len(), 1);
    assert_eq!(variants[0].id, "A");
    assert_eq!(variants[0].revision, 3);
}

#[tokio::test]
async fn non_success_status_is_an_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/variants/A"))
        .respond_with(ResponseTemplate::new(409).set_body_string("variant is deployed"))
        .mount(&server)
        .await;

    let api = HttpPlaygroundApi::new(&api_config(&server, Some("proj-1"))).unwrap();
    let err = api.delete_variant(&VariantId::from("A")).await.unwrap_err();

    assert_eq!(
        err,
        ApiError::Status {
            status: 409,
            message: "variant is deployed".to_string(),
        }
    );
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/app/openapi.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let api = HttpPlaygroundApi::new(&api_config(&server, None)).unwrap();
    let err = api
        .fetch_schema(&format!("{}/app/", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Decode(_)));
}

#[tokio::test]
async fn mutations_hit_project_scoped_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/variants/from-base"))
        .and(query_param("project_id", "proj-1"))
        .and(body_partial_json(json!({
            "base_id": "base-A",
            "new_variant_name": "v1-copy",
            "new_config_name": "v1-copy"
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(variant_json(&server, "C", "v1-copy")),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/variants/A/parameters"))
        .and(query_param("project_id", "proj-1"))
        .and(body_json(json!({"parameters": {"prompt": {"messages": []}}})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let api = HttpPlaygroundApi::new(&api_config(&server, Some("proj-1"))).unwrap();
    let created = api
        .create_variant_from_base("base-A", "v1-copy", "v1-copy")
        .await
        .unwrap();
    assert_eq!(created.id, "C");

    api.save_variant_parameters(
        &VariantId::from("A"),
        &json!({"prompt": {"messages": []}}),
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn playground_loads_variants_and_schema_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/apps/app-1/variants"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            variant_json(&server, "A", "v1"),
            variant_json(&server, "B", "v2"),
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/app/openapi.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openapi_json()))
        .expect(1)
        .mount(&server)
        .await;

    let config = PlaygroundConfig {
        api: api_config(&server, Some("proj-1")),
        ..PlaygroundConfig::default()
    };
    let playground = connect_playground(&config).unwrap();
    let mut hook = playground
        .use_playground(
            &ResourceKey::variants("app-1", "proj-1"),
            PlaygroundOptions::default(),
        )
        .unwrap();
    let handle = hook.render().await;

    assert_eq!(handle.load_error(), None);
    assert_eq!(
        handle.variant_ids(),
        vec![VariantId::from("A"), VariantId::from("B")]
    );
    assert!(playground.notifier().recent().is_empty());
}

#[tokio::test]
async fn scenario_pages_thread_the_server_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/preview/evaluations/scenarios/query"))
        .and(query_param("project_id", "proj-1"))
        .and(body_partial_json(json!({
            "scenario": {"run_ids": ["run-1"]},
            "windowing": {"limit": 2, "next": "sc-1"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 1,
            "scenarios": [{"id": "sc-2", "run_id": "run-1", "status": "success"}],
            "windowing": {"limit": 2}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/preview/evaluations/scenarios/query"))
        .and(query_param("project_id", "proj-1"))
        .and(body_partial_json(json!({
            "scenario": {"run_ids": ["run-1"]},
            "windowing": {"limit": 2}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 2,
            "scenarios": [
                {"id": "sc-0", "run_id": "run-1", "created_at": "2025-03-01T10:00:00Z"},
                {"id": "sc-1", "run_id": "run-1"}
            ],
            "windowing": {"limit": 2, "next": "sc-1"}
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let fetcher = HttpScenarioRowsFetcher::new(&api_config(&server, Some("proj-1"))).unwrap();
    let store = PaginationStore::new("scenarios", Arc::new(fetcher), StoreOptions { page_size: 2 });
    let meta = PageMeta::for_project("proj-1");

    assert_eq!(
        store.load_next_page(Some("run-1"), &meta).await.unwrap(),
        LoadOutcome::Loaded {
            total_rows: 2,
            has_more: true
        }
    );
    assert_eq!(
        store.load_next_page(Some("run-1"), &meta).await.unwrap(),
        LoadOutcome::Loaded {
            total_rows: 3,
            has_more: false
        }
    );

    let rows = store.combined_rows("run-1");
    let keys: Vec<&str> = rows.iter().map(|row| row.key.as_str()).collect();
    assert_eq!(keys, vec!["run-1:0:0", "run-1:0:1", "run-1:2:0"]);
    assert_eq!(rows[2].scenario_id.as_deref(), Some("sc-2"));
    assert!(rows[0].created_at.is_some());
}

#[tokio::test]
async fn scenario_fetch_without_project_is_disabled() {
    let server = MockServer::start().await;
    let fetcher = HttpScenarioRowsFetcher::new(&api_config(&server, None)).unwrap();

    let err = fetcher
        .fetch_page(PageRequest {
            scope_id: "run-1".to_string(),
            cursor: None,
            limit: 50,
            offset: 0,
            windowing: None,
            meta: PageMeta::default(),
        })
        .await
        .unwrap_err();

    assert!(err.is_disabled());
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn scenario_fetch_failure_surfaces_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/preview/evaluations/scenarios/query"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let fetcher = HttpScenarioRowsFetcher::new(&api_config(&server, Some("proj-1"))).unwrap();
    let store = PaginationStore::new("scenarios", Arc::new(fetcher), StoreOptions::default());

    let err = store
        .load_next_page(Some("run-1"), &PageMeta::for_project("proj-1"))
        .await
        .unwrap_err();
    assert_eq!(err, PaginationError::status(503, "unavailable"));
    assert!(store.combined_rows("run-1").is_empty());
}
