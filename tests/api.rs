//! HTTP API tests over a real SQLite store, with the chat-completions
//! endpoint mocked by wiremock.

use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use notebook_rag::app::App;
use notebook_rag::config::Config;
use notebook_rag::extract::WebExtractor;
use notebook_rag::generation::ChatCompletionsGenerator;
use notebook_rag::sqlite_store::SqliteStore;
use notebook_rag::{db, migrate, server};
use notebook_rag_core::embedding::HashEmbedder;

const CHAT_PATH: &str = "/v1/chat/completions";

const REEF_TEXT: &str = "Coral reefs are built by colonies of tiny animals called polyps. \
Each polyp secretes a skeleton of calcium carbonate, and over centuries these skeletons \
accumulate into reefs that shelter a quarter of all marine species. Reef-building corals \
host symbiotic algae that photosynthesize and share sugars with the polyp.";

struct Harness {
    _tmp: TempDir,
    base: String,
    client: reqwest::Client,
    llm: MockServer,
}

impl Harness {
    async fn start() -> Self {
        let tmp = TempDir::new().unwrap();
        let llm = MockServer::start().await;

        let config: Config = toml::from_str(&format!(
            "[db]\npath = \"{}\"\n[generation]\nurl = \"{}{}\"\ntimeout_secs = 5\n",
            tmp.path().join("nb.sqlite").display(),
            llm.uri(),
            CHAT_PATH
        ))
        .unwrap();

        let pool = db::connect(&config).await.unwrap();
        migrate::apply(&pool).await.unwrap();
        let generator =
            ChatCompletionsGenerator::with_key(&config.generation, Some("test-key".into()))
                .unwrap();
        let extractor = WebExtractor::new(&config.extraction).unwrap();
        let app = App::from_parts(
            config,
            Arc::new(SqliteStore::new(pool)),
            Arc::new(HashEmbedder::default()),
            Arc::new(generator),
            Arc::new(extractor),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, server::router(Arc::new(app)))
                .await
                .unwrap();
        });

        Self {
            _tmp: tmp,
            base: format!("http://{}", addr),
            client: reqwest::Client::new(),
            llm,
        }
    }

    async fn post(&self, route: &str, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .post(format!("{}{}", self.base, route))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap_or(Value::Null))
    }

    async fn get(&self, route: &str) -> (u16, Value) {
        let resp = self
            .client
            .get(format!("{}{}", self.base, route))
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap_or(Value::Null))
    }

    /// Create a notebook with one ingested text source; returns (notebook, source).
    async fn seeded_notebook(&self) -> (String, String) {
        let (status, nb) = self.post("/notebooks", json!({"title": "Reefs"})).await;
        assert_eq!(status, 201);
        let nb_id = nb["id"].as_str().unwrap().to_string();

        let (status, source) = self
            .post(
                &format!("/notebooks/{}/sources", nb_id),
                json!({"type": "text", "title": "Reef Basics", "content": REEF_TEXT}),
            )
            .await;
        assert_eq!(status, 201, "{}", source);
        assert_eq!(source["status"], "pending");
        let source_id = source["id"].as_str().unwrap().to_string();

        let (status, report) = self.post(&format!("/ingest/{}", source_id), json!({})).await;
        assert_eq!(status, 200, "{}", report);
        assert!(report["chunks_created"].as_u64().unwrap() >= 1);

        (nb_id, source_id)
    }

    async fn reply_with(&self, content: &str) {
        self.llm.reset().await;
        Mock::given(method("POST"))
            .and(path(CHAT_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": content}}]
            })))
            .mount(&self.llm)
            .await;
    }
}

#[tokio::test]
async fn test_health() {
    let h = Harness::start().await;
    let (status, body) = h.get("/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_chat_persists_only_cited_chunks() {
    let h = Harness::start().await;
    let (nb, source) = h.seeded_notebook().await;

    let token = format!("[S{}:0]", &source[..8]);
    h.reply_with(&format!("Reefs are built by polyps {}. Also [Szzzzzzzz:9].", token))
        .await;

    let (status, reply) = h
        .post("/chat", json!({"notebookId": nb, "message": "Who builds reefs?"}))
        .await;
    assert_eq!(status, 200, "{}", reply);
    assert_eq!(reply["fallback"], false);

    let citations = reply["assistant_message"]["citations"].as_array().unwrap();
    assert_eq!(citations.len(), 1);
    assert_eq!(citations[0]["source_id"], source.as_str());
    assert_eq!(citations[0]["chunk_index"], 0);

    let segments = reply["segments"].as_array().unwrap();
    assert!(segments
        .iter()
        .any(|s| s["kind"] == "citation" && s["token"] == token.as_str()));

    let (_, log) = h.get(&format!("/notebooks/{}/messages", nb)).await;
    let messages = log["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["role"], "assistant");
}

#[tokio::test]
async fn test_chat_apologizes_on_upstream_failure() {
    let h = Harness::start().await;
    let (nb, _) = h.seeded_notebook().await;

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&h.llm)
        .await;

    let (status, reply) = h
        .post("/chat", json!({"notebookId": nb, "message": "Who builds reefs?"}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(reply["fallback"], true);
    assert!(reply["assistant_message"]["content"]
        .as_str()
        .unwrap()
        .starts_with("Sorry"));
}

#[tokio::test]
async fn test_quiz_roundtrip() {
    let h = Harness::start().await;
    let (nb, _) = h.seeded_notebook().await;

    h.reply_with(
        "```json\n{\"questions\": [\
         {\"type\": \"multiple_choice\", \"question\": \"What builds reefs?\", \
          \"options\": [\"Polyps\", \"Sharks\"], \"answer\": \"Polyps\"},\
         {\"type\": \"short_answer\", \"question\": \"What do skeletons contain?\", \
          \"answer\": \"Calcium carbonate\"}]}\n```",
    )
    .await;

    let (status, artifact) = h
        .post("/quiz", json!({"notebookId": nb, "questionCount": 2}))
        .await;
    assert_eq!(status, 201, "{}", artifact);
    assert_eq!(artifact["title"], "Quiz");
    assert_eq!(artifact["content"]["type"], "quiz");
    assert_eq!(artifact["content"]["questions"].as_array().unwrap().len(), 2);

    let (status, listed) = h.get(&format!("/quiz?notebookId={}", nb)).await;
    assert_eq!(status, 200);
    assert_eq!(listed["artifacts"].as_array().unwrap().len(), 1);

    let (_, briefings) = h.get(&format!("/briefing?notebookId={}", nb)).await;
    assert!(briefings["artifacts"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_flashcards_are_not_persisted() {
    let h = Harness::start().await;
    let (nb, _) = h.seeded_notebook().await;
    h.reply_with("Here are some flashcards: polyps, algae.").await;

    let (status, body) = h.post("/flashcards", json!({"notebookId": nb})).await;
    assert_eq!(status, 502);
    assert_eq!(body["error"]["code"], "invalid_generation_format");

    let (_, listed) = h.get(&format!("/flashcards?notebookId={}", nb)).await;
    assert!(listed["artifacts"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_briefing_unauthorized_maps_to_502() {
    let h = Harness::start().await;
    let (nb, _) = h.seeded_notebook().await;

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&h.llm)
        .await;

    let (status, body) = h.post("/briefing", json!({"notebookId": nb})).await;
    assert_eq!(status, 502);
    assert_eq!(body["error"]["code"], "generation_unavailable");
}

#[tokio::test]
async fn test_briefing_on_empty_notebook_is_bad_request() {
    let h = Harness::start().await;
    let (_, nb) = h.post("/notebooks", json!({"title": "Empty"})).await;

    let (status, body) = h
        .post("/briefing", json!({"notebookId": nb["id"]}))
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_error_contract() {
    let h = Harness::start().await;

    let (status, body) = h.get("/notebooks/does-not-exist/sources").await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "not_found");

    let (status, body) = h.post("/notebooks", json!({"title": "  "})).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, body) = h.get("/quiz").await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["message"], "notebookId is required");

    let (status, _) = h.post("/ingest/nope", json!({})).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_delete_source_and_notebook() {
    let h = Harness::start().await;
    let (nb, source) = h.seeded_notebook().await;

    let resp = h
        .client
        .delete(format!("{}/sources/{}", h.base, source))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let (_, listed) = h.get(&format!("/notebooks/{}/sources", nb)).await;
    assert!(listed["sources"].as_array().unwrap().is_empty());

    let resp = h
        .client
        .delete(format!("{}/notebooks/{}", h.base, nb))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let (status, _) = h.get(&format!("/notebooks/{}", nb)).await;
    assert_eq!(status, 404);
}
