use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use axum::response::Response;
use tower::util::ServiceExt;

use wordminer_analysis::{ArticleCatalog, LabelStore, MemoryStore, StatsStore};
use wordminer_dict::{Dictionary, SourceRecord};
use wordminer_server::{AppState, router};
use wordminer_types::Tier;

fn make_state(store_path: Option<PathBuf>) -> AppState {
    make_state_with(store_path, 500)
}

fn make_state_with(store_path: Option<PathBuf>, max_top_words: usize) -> AppState {
    let dictionary = Dictionary::from_sources([
        (
            Tier::MiddleSchool,
            vec![SourceRecord::new("the"), SourceRecord::new("cat")],
        ),
        (Tier::Cet4, vec![SourceRecord::new("run")]),
    ]);
    AppState::new(
        Arc::new(dictionary),
        Arc::new(MemoryStore::new()),
        store_path,
        max_top_words,
    )
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    app.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
}

async fn json_body(response: Response) -> serde_json::Value {
    let body_bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    serde_json::from_slice(&body_bytes).unwrap()
}

async fn import(app: &Router, title: &str, content: &str) -> u64 {
    let response = send(
        app,
        Method::POST,
        "/v1/articles",
        Some(serde_json::json!({ "title": title, "content": content })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    json_body(response).await["article_id"].as_u64().unwrap()
}

#[tokio::test]
async fn healthz_ok() {
    let app = router(make_state(None));
    let response = send(&app, Method::GET, "/healthz", None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn import_then_report() {
    let app = router(make_state(None));
    let id = import(&app, "cats", "The cats are running and the dogs ran.").await;

    let response = send(&app, Method::GET, &format!("/v1/articles/{id}/report?top=2"), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["total_words"], 8);
    assert_eq!(body["distinct_lemmas"], 7);
    assert_eq!(body["not_in_dictionary"], 4);
    assert_eq!(body["top_words"].as_array().unwrap().len(), 2);
    assert_eq!(body["top_words"][0]["lemma"], "the");
    assert_eq!(body["tiers"][0]["tier"], "Middle School");
    assert_eq!(body["tiers"][0]["count"], 3);
    assert_eq!(body["labels"]["unlabeled"], 7);

    let listed = json_body(send(&app, Method::GET, "/v1/articles", None).await).await;
    assert_eq!(listed[0]["title"], "cats");
}

#[tokio::test]
async fn import_rejects_blank_title() {
    let app = router(make_state(None));
    let response = send(
        &app,
        Method::POST,
        "/v1/articles",
        Some(serde_json::json!({ "title": "  ", "content": "x" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap_or_default().contains("title"));
}

#[tokio::test]
async fn unknown_article_is_not_found() {
    let app = router(make_state(None));
    for uri in ["/v1/articles/9", "/v1/articles/9/report", "/v1/articles/9/annotate"] {
        let response = send(&app, Method::GET, uri, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn overlap_of_two_articles() {
    let app = router(make_state(None));
    let a = import(&app, "A", "a b c").await;
    let b = import(&app, "B", "b c d").await;

    let response = send(&app, Method::GET, &format!("/v1/overlap?ids={a},{b}"), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["unique"], 4);
    assert_eq!(body["shared"], 2);
    assert_eq!(body["shared_lemmas"], serde_json::json!(["b", "c"]));
}

#[tokio::test]
async fn overlap_rejects_empty_or_invalid_ids() {
    let app = router(make_state(None));
    for uri in ["/v1/overlap", "/v1/overlap?ids=", "/v1/overlap?ids=1,x"] {
        let response = send(&app, Method::GET, uri, None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[tokio::test]
async fn vocab_labels_round_trip() {
    let app = router(make_state(None));
    let response = send(
        &app,
        Method::PUT,
        "/v1/vocab/Run",
        Some(serde_json::json!({ "label": "Mastered" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(send(&app, Method::GET, "/v1/vocab/run", None).await).await;
    assert_eq!(body["lemma"], "run");
    assert_eq!(body["label"], "mastered");

    let body = json_body(send(&app, Method::GET, "/v1/vocab/walk", None).await).await;
    assert!(body["label"].is_null());

    let body = json_body(send(&app, Method::GET, "/v1/vocab?label=mastered", None).await).await;
    assert_eq!(body["lemmas"], serde_json::json!(["run"]));
}

#[tokio::test]
async fn vocab_rejects_invalid_label() {
    let app = router(make_state(None));
    let response = send(
        &app,
        Method::PUT,
        "/v1/vocab/run",
        Some(serde_json::json!({ "label": "known" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap_or_default().contains("known"));

    let response = send(&app, Method::GET, "/v1/vocab?label=bogus", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn exports_vocabulary_csv() {
    let app = router(make_state(None));
    for (lemma, label) in [("dog", "unfamiliar"), ("cat", "learning"), ("the", "mastered")] {
        send(
            &app,
            Method::PUT,
            &format!("/v1/vocab/{lemma}"),
            Some(serde_json::json!({ "label": label })),
        )
        .await;
    }

    let response = send(&app, Method::GET, "/v1/vocab/export", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/csv")
    );
    let body_bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    assert_eq!(
        std::str::from_utf8(&body_bytes).unwrap(),
        "lemma,status\nthe,mastered\ncat,learning\ndog,unfamiliar\n"
    );
}

#[tokio::test]
async fn dictionary_lookup_falls_back_to_lemma() {
    let app = router(make_state(None));
    let body = json_body(send(&app, Method::GET, "/v1/dictionary/Running", None).await).await;
    assert_eq!(body["lemma"], "run");
    assert_eq!(body["tier"], "CET-4");

    let response = send(&app, Method::GET, "/v1/dictionary/zeitgeist", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn annotate_uses_labels() {
    let app = router(make_state(None));
    let id = import(&app, "cats", "Cats run").await;
    send(
        &app,
        Method::PUT,
        "/v1/vocab/cat",
        Some(serde_json::json!({ "label": "learning" })),
    )
    .await;

    let uri = format!("/v1/articles/{id}/annotate");
    let body = json_body(send(&app, Method::GET, &uri, None).await).await;
    let tokens = body["tokens"].as_array().unwrap();
    assert_eq!(tokens.len(), 2);
    assert_eq!(tokens[0]["surface"], "Cats");
    assert_eq!(tokens[0]["lemma"], "cat");
    assert_eq!(tokens[0]["label"], "learning");
    assert_eq!(tokens[1]["tier"], "CET-4");
}

#[tokio::test]
async fn mutations_persist_snapshot_and_backup() {
    let tempdir = tempfile::tempdir().unwrap();
    let store_path = tempdir.path().join("wordminer.json");
    let app = router(make_state(Some(store_path.clone())));
    import(&app, "cats", "the cat").await;

    let restored = MemoryStore::load_from(&store_path).unwrap();
    let restored_app = router(AppState::new(
        Arc::new(Dictionary::empty()),
        Arc::new(restored),
        None,
        500,
    ));
    let listed = json_body(send(&restored_app, Method::GET, "/v1/articles", None).await).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let response = send(&app, Method::POST, "/v1/backup", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["articles"], 1);
    assert!(tempdir.path().join("wordminer.json.bak").exists());
}

#[tokio::test]
async fn backup_requires_persistence() {
    let app = router(make_state(None));
    let response = send(&app, Method::POST, "/v1/backup", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// `count` distinct three-letter words, which the lemmatizer leaves alone.
fn distinct_words(count: usize) -> String {
    (0..count)
        .map(|i| {
            let a = (b'a' + (i / 26) as u8) as char;
            let b = (b'a' + (i % 26) as u8) as char;
            format!("x{a}{b}")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[tokio::test]
async fn report_top_defaults_and_clamps() {
    let app = router(make_state_with(None, 5));
    let id = import(&app, "many", &distinct_words(30)).await;

    let response = send(&app, Method::GET, &format!("/v1/articles/{id}/report?top=0"), None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap_or_default().contains("top"));

    let uri = format!("/v1/articles/{id}/report?top=400");
    let body = json_body(send(&app, Method::GET, &uri, None).await).await;
    assert_eq!(body["top_words"].as_array().unwrap().len(), 5);
    assert_eq!(body["distinct_lemmas"], 30);

    let app = router(make_state(None));
    let id = import(&app, "many", &distinct_words(30)).await;
    let uri = format!("/v1/articles/{id}/report");
    let body = json_body(send(&app, Method::GET, &uri, None).await).await;
    assert_eq!(body["top_words"].as_array().unwrap().len(), 20);
}

#[tokio::test]
async fn import_reports_vocabulary_richness() {
    let app = router(make_state(None));
    let response = send(
        &app,
        Method::POST,
        "/v1/articles",
        Some(serde_json::json!({ "title": "t", "content": "the cat the cat" })),
    )
    .await;
    let summary = json_body(response).await;
    assert_eq!(summary["vocabulary_richness"], 0.5);
    assert_eq!(summary["not_in_dictionary"], 0);

    let id = summary["article_id"].as_u64().unwrap();
    let uri = format!("/v1/articles/{id}/report");
    let report = json_body(send(&app, Method::GET, &uri, None).await).await;
    assert_eq!(report["vocabulary_richness"], 0.5);
}

#[tokio::test]
async fn delete_article_removes_it_and_its_stats() {
    let tempdir = tempfile::tempdir().unwrap();
    let store_path = tempdir.path().join("wordminer.json");
    let app = router(make_state(Some(store_path.clone())));
    let keep = import(&app, "keep", "a b").await;
    let gone = import(&app, "gone", "b c").await;

    let uri = format!("/v1/articles/{gone}");
    let response = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let uri = format!("/v1/articles/{gone}/report");
    let response = send(&app, Method::GET, &uri, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let uri = format!("/v1/overlap?ids={keep},{gone}");
    let body = json_body(send(&app, Method::GET, &uri, None).await).await;
    assert_eq!(body["unique"], 2);
    assert_eq!(body["shared"], 0);

    let restored = MemoryStore::load_from(&store_path).unwrap();
    assert_eq!(restored.list_articles().unwrap().len(), 1);
    assert!(restored.query_by_article(gone).unwrap().is_empty());
}

#[tokio::test]
async fn failed_snapshot_write_keeps_the_mutation() {
    let tempdir = tempfile::tempdir().unwrap();
    let blocker = tempdir.path().join("blocker");
    std::fs::write(&blocker, b"not a directory").unwrap();
    let app = router(make_state(Some(blocker.join("wordminer.json"))));

    let id = import(&app, "cats", "the cat").await;
    let listed = json_body(send(&app, Method::GET, "/v1/articles", None).await).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["id"], id);

    let response = send(&app, Method::POST, "/v1/backup", None).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_label_writes_all_reach_the_snapshot() {
    let tempdir = tempfile::tempdir().unwrap();
    let store_path = tempdir.path().join("wordminer.json");
    let app = router(make_state(Some(store_path.clone())));

    let words = distinct_words(24);
    let tasks: Vec<_> = words
        .split(' ')
        .map(|word| {
            let app = app.clone();
            let uri = format!("/v1/vocab/{word}");
            tokio::spawn(async move {
                let body = serde_json::json!({ "label": "learning" });
                send(&app, Method::PUT, &uri, Some(body)).await.status()
            })
        })
        .collect();
    for task in tasks {
        assert_eq!(task.await.unwrap(), StatusCode::OK);
    }

    let restored = MemoryStore::load_from(&store_path).unwrap();
    assert_eq!(restored.all_labels().unwrap().len(), 24);
}
