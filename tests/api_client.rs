//! Integration tests for the HTTP transport and resource endpoints.
//!
//! Uses wiremock for HTTP mocking. Covers status mapping, empty bodies,
//! decode failures, cursor pagination and the judge, evaluator, dataset and
//! execution-log endpoints.

use futures::TryStreamExt;
use serde_json::json;
use std::time::Duration;

use scorable::calibration::DatasetSpec;
use scorable::config::ClientConfig;
use scorable::presets::PresetEvaluator;
use scorable::resources::datasets::{CreateDataset, DatasetType};
use scorable::resources::evaluators::{CreateEvaluator, EvaluatorExecutionResult};
use scorable::resources::execution_logs::ExecutionLogListParams;
use scorable::resources::judges::{GenerateJudge, JudgeListParams, UpdateJudge};
use scorable::resources::ExecutionPayload;
use scorable::{ScorableClient, ScorableError};
use wiremock::matchers::{
    body_partial_json, body_string_contains, header, header_regex, method, path, query_param,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_test_client(mock_server: &MockServer) -> ScorableClient {
    let config = ClientConfig::new(mock_server.uri(), "test-key")
        .with_timeout(Duration::from_secs(5));
    ScorableClient::new(config).expect("failed to create client")
}

fn judge_json(id: &str) -> serde_json::Value {
    json!({"id": id, "name": format!("judge {}", id), "intent": "be helpful", "status": "unlisted"})
}

#[tokio::test]
async fn test_get_judge_sends_api_key() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/judges/j1/"))
        .and(header("authorization", "Api-Key test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(judge_json("j1")))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let judge = client.judges().get("j1").await.expect("get failed");
    assert_eq!(judge.id, "j1");
    assert_eq!(judge.intent.as_deref(), Some("be helpful"));
}

#[tokio::test]
async fn test_non_success_status_carries_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/judges/missing/"))
        .respond_with(ResponseTemplate::new(404).set_body_string("{\"detail\":\"Not found.\"}"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/judges/broken/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);

    let err = client.judges().get("missing").await.unwrap_err();
    match &err {
        ScorableError::RequestFailed { status, body } => {
            assert_eq!(*status, 404);
            assert!(body.contains("Not found"));
        }
        other => panic!("expected RequestFailed, got {:?}", other),
    }

    let err = client.judges().get("broken").await.unwrap_err();
    assert_eq!(err.status(), Some(503));
}

#[tokio::test]
async fn test_undecodable_body_is_invalid_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/judges/j1/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let err = client.judges().get("j1").await.unwrap_err();
    assert!(matches!(err, ScorableError::InvalidResponse { .. }));
}

#[tokio::test]
async fn test_delete_accepts_no_content() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/v1/judges/j1/"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    client.judges().delete("j1").await.expect("delete failed");
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let config = ClientConfig::new("http://127.0.0.1:1", "k").with_timeout(Duration::from_secs(2));
    let client = ScorableClient::new(config).unwrap();
    let err = client.judges().get("j1").await.unwrap_err();
    assert!(matches!(err, ScorableError::Network { .. }));
}

#[tokio::test]
async fn test_list_follows_cursor_until_limit() {
    let mock_server = MockServer::start().await;
    let next = format!("{}/v1/judges/?cursor=abc&page_size=1", mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/v1/judges/"))
        .and(query_param("cursor", "abc"))
        .and(query_param("page_size", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [judge_json("j3")],
            "next": format!("{}/v1/judges/?cursor=def", mock_server.uri()),
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/judges/"))
        .and(query_param("search", "tone"))
        .and(query_param("page_size", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [judge_json("j1"), judge_json("j2")],
            "next": next,
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let params = JudgeListParams {
        search: Some("tone".into()),
        ..Default::default()
    };
    let judges: Vec<_> = client
        .judges()
        .list(params, 3)
        .try_collect()
        .await
        .expect("list failed");

    let ids: Vec<_> = judges.iter().map(|j| j.id.as_str()).collect();
    assert_eq!(ids, vec!["j1", "j2", "j3"]);
}

#[tokio::test]
async fn test_list_stops_on_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/judges/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let result: Result<Vec<_>, _> = client
        .judges()
        .list(JudgeListParams::default(), 10)
        .try_collect()
        .await;
    assert_eq!(result.unwrap_err().status(), Some(500));
}

#[tokio::test]
async fn test_execute_judge_posts_payload() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/judges/j1/execute/"))
        .and(body_partial_json(json!({"response": "Paris", "request": "Capital of France?"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "evaluator_results": [{"evaluator_name": "Correctness", "score": 0.95}]
        })))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let payload = ExecutionPayload::response("Paris").with_request("Capital of France?");
    let result = client.judges().execute("j1", &payload).await.expect("execute failed");
    assert_eq!(result.evaluator_results.len(), 1);
    assert_eq!(result.evaluator_results[0].score, Some(0.95));
}

#[tokio::test]
async fn test_empty_update_is_rejected_locally() {
    let mock_server = MockServer::start().await;
    let client = create_test_client(&mock_server);

    let err = client
        .judges()
        .update("j1", &UpdateJudge::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ScorableError::Config { .. }));
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_preset_runs_against_fixed_id() {
    let mock_server = MockServer::start().await;
    let route = format!("/v1/evaluators/execute/{}/", PresetEvaluator::Clarity.id());

    Mock::given(method("POST"))
        .and(path(route.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "evaluator_name": "Clarity",
            "score": 0.7,
            "justification": "Mostly clear."
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let result = client
        .evaluators()
        .preset(PresetEvaluator::Clarity)
        .run(&ExecutionPayload::response("Some answer"))
        .await
        .expect("run failed");
    assert_eq!(result.score, Some(0.7));
}

#[tokio::test]
async fn test_get_by_name_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/evaluators/"))
        .and(query_param("name", "nope"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": [], "next": null})))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let err = client.evaluators().get_by_name("nope").await.unwrap_err();
    assert!(matches!(err, ScorableError::NotFound { .. }));
}

fn evaluator_json(id: &str, name: &str) -> serde_json::Value {
    json!({"id": id, "name": name, "objective_id": "obj-1", "models": ["gpt-4o", "gpt-4o-mini"]})
}

#[tokio::test]
async fn test_create_evaluator_registers_objective_first() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/objectives/"))
        .and(body_partial_json(json!({"intent": "Answers stay polite"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "obj-1"})))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/evaluators/"))
        .and(body_partial_json(json!({
            "name": "Politeness",
            "objective_id": "obj-1",
            "prompt": "Is the response polite?",
            "models": ["gpt-4o", "gpt-4o-mini"],
            "overwrite": false
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(evaluator_json("ev-1", "Politeness")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let request = CreateEvaluator {
        intent: Some("Answers stay polite".into()),
        model: Some("gpt-4o".into()),
        fallback_models: vec!["gpt-4o-mini".into()],
        ..CreateEvaluator::new("Is the response polite?").named("Politeness")
    };
    let evaluator = client.evaluators().create(&request).await.expect("create failed");
    assert_eq!(evaluator.id, "ev-1");

    let paths: Vec<String> = mock_server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.url.path().to_string())
        .collect();
    assert_eq!(paths, vec!["/v1/objectives/", "/v1/evaluators/"]);
}

#[tokio::test]
async fn test_create_evaluator_intent_defaults_to_name() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/objectives/"))
        .and(body_partial_json(json!({"intent": "Politeness"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "obj-1"})))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/evaluators/"))
        .and(body_partial_json(json!({"objective_id": "obj-1", "models": []})))
        .respond_with(ResponseTemplate::new(201).set_body_json(evaluator_json("ev-1", "Politeness")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let request = CreateEvaluator::new("Is the response polite?").named("Politeness");
    client.evaluators().create(&request).await.expect("create failed");
}

#[tokio::test]
async fn test_create_evaluator_with_objective_id_skips_objective() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/evaluators/"))
        .and(body_partial_json(json!({"objective_id": "obj-existing"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(evaluator_json("ev-2", "Tone")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let request = CreateEvaluator {
        objective_id: Some("obj-existing".into()),
        ..CreateEvaluator::new("Is the tone right?").named("Tone")
    };
    client.evaluators().create(&request).await.expect("create failed");

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
}

#[tokio::test]
async fn test_create_evaluator_rejects_intent_with_objective_id() {
    let mock_server = MockServer::start().await;
    let client = create_test_client(&mock_server);

    let request = CreateEvaluator {
        intent: Some("Answers stay polite".into()),
        objective_id: Some("obj-1".into()),
        ..CreateEvaluator::new("Is the response polite?")
    };
    let err = client.evaluators().create(&request).await.unwrap_err();
    assert!(matches!(err, ScorableError::Config { .. }));
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_run_evaluator_by_name_passes_name_query() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/evaluators/execute/by-name/"))
        .and(query_param("name", "Politeness"))
        .and(body_partial_json(json!({"response": "Thanks so much!"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "evaluator_name": "Politeness",
            "score": 0.9,
            "execution_log_id": "log-1"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let result = client
        .evaluators()
        .run_by_name("Politeness", &ExecutionPayload::response("Thanks so much!"))
        .await
        .expect("run failed");
    assert_eq!(result.score, Some(0.9));
    assert_eq!(result.execution_log_id.as_deref(), Some("log-1"));
}

#[tokio::test]
async fn test_calibrate_existing_posts_dataset_to_evaluator_route() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/evaluators/calibrate/ev-1/"))
        .and(body_partial_json(json!({"test_dataset_id": "ds-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"result": {"score": 0.5, "expected_score": 1.0}}
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let outputs = client
        .evaluators()
        .calibrate_existing("ev-1", &DatasetSpec::Reference("ds-1".into()))
        .await
        .expect("calibration failed");
    assert_eq!(outputs.len(), 1);
}

#[tokio::test]
async fn test_evaluator_versions() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/evaluators/versions/ev-1/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"id": "ev-1", "name": "Tone", "version_id": "v2"},
                {"id": "ev-1", "name": "Tone", "version_id": "v1"}
            ],
            "next": null
        })))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let page = client.evaluators().versions("ev-1").await.expect("versions failed");
    let versions: Vec<_> = page
        .results
        .iter()
        .filter_map(|e| e.version_id.as_deref())
        .collect();
    assert_eq!(versions, vec!["v2", "v1"]);
}

#[tokio::test]
async fn test_generate_judge_posts_intent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/judges/generate/"))
        .and(body_partial_json(json!({
            "intent": "Catch rude support replies",
            "visibility": "unlisted",
            "strict": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"judge_id": "j9"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let request = GenerateJudge {
        intent: "Catch rude support replies".into(),
        ..GenerateJudge::default()
    };
    let response = client.judges().generate(&request).await.expect("generate failed");
    assert_eq!(response.judge_id.as_deref(), Some("j9"));
    assert!(response.error_code.is_none());
}

#[tokio::test]
async fn test_create_dataset_uploads_multipart_file() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/datasets/"))
        .and(header_regex("content-type", "^multipart/form-data"))
        .and(body_string_contains("golden-row-1"))
        .and(body_string_contains("reference"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "ds-1",
            "name": "golden",
            "type": "reference"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("golden.csv");
    std::fs::write(&file, "request,response\ngolden-row-1,ok\n").unwrap();

    let client = create_test_client(&mock_server);
    let dataset = client
        .datasets()
        .create(CreateDataset::named("golden").with_file(&file))
        .await
        .expect("create failed");
    assert_eq!(dataset.id, "ds-1");
    assert_eq!(dataset.kind, Some(DatasetType::Reference));
}

#[tokio::test]
async fn test_create_dataset_missing_file_sends_nothing() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    let client = create_test_client(&mock_server);
    let err = client
        .datasets()
        .create(CreateDataset::named("golden").with_file(dir.path().join("absent.csv")))
        .await
        .unwrap_err();
    assert!(matches!(err, ScorableError::Config { .. }));
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_datasets_with_search() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/datasets/"))
        .and(query_param("search", "gold"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"id": "ds-1", "name": "golden", "type": "reference"},
                {"id": "ds-2", "name": "gold-test", "type": "test"}
            ],
            "next": null
        })))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let datasets: Vec<_> = client
        .datasets()
        .list(Some("gold".into()), 10)
        .try_collect()
        .await
        .expect("list failed");
    assert_eq!(datasets.len(), 2);
    assert_eq!(datasets[1].kind, Some(DatasetType::Test));
}

#[tokio::test]
async fn test_list_execution_logs_by_tag() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/execution-logs/"))
        .and(query_param("tags", "prod,v2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": "log-1", "score": 0.4, "tags": ["prod", "v2"]}],
            "next": null
        })))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let params = ExecutionLogListParams {
        tags: vec!["prod".into(), "v2".into()],
        ..ExecutionLogListParams::default()
    };
    let logs: Vec<_> = client
        .execution_logs()
        .list(params, 10)
        .try_collect()
        .await
        .expect("list failed");
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].score, Some(0.4));
}

#[tokio::test]
async fn test_execution_log_for_evaluator_result() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/execution-logs/log-1/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "log-1",
            "score": 0.9,
            "created_at": "2026-01-05T10:00:00Z"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server);
    let result: EvaluatorExecutionResult =
        serde_json::from_value(json!({"score": 0.9, "execution_log_id": "log-1"})).unwrap();
    let log = client
        .execution_logs()
        .for_result(&result)
        .await
        .expect("lookup failed");
    assert_eq!(log.id, "log-1");

    let without_log: EvaluatorExecutionResult = serde_json::from_value(json!({"score": 0.1})).unwrap();
    let err = client.execution_logs().for_result(&without_log).await.unwrap_err();
    assert!(matches!(err, ScorableError::Config { .. }));
}
