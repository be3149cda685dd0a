//! End-to-end tests: Maildir store, corpus extraction, vector retrieval and
//! a mocked generation backend.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use replydraft::corpus::extract::{extract_sent, ExtractOptions};
use replydraft::corpus::Corpus;
use replydraft::embedding::{EmbeddingProvider, HashingEmbedder};
use replydraft::generation::{GenerationClient, OllamaBackend, PromptTemplate};
use replydraft::index::builder::{self, IndexOrigin};
use replydraft::parser::message::parse_message;
use replydraft::pipeline::{CycleReport, DraftPipeline};
use replydraft::retrieval::{ContextStrategy, VectorContext};
use replydraft::store::{MailStore, MaildirStore};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Drop an unread message into `<root>/INBOX/new/`.
fn deliver(root: &Path, unique: &str, subject: &str, body: &str) {
    let dir = root.join("INBOX").join("new");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join(unique),
        format!(
            "From: Alice <alice@example.com>\nTo: me@example.net\nSubject: {subject}\n\
             Date: Wed, 10 Jan 2024 08:00:00 +0000\nMessage-ID: <{unique}@example.com>\n\n{body}\n"
        ),
    )
    .unwrap();
}

fn draft_files(root: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(root.join("Drafts").join("cur")) {
        Ok(entries) => entries.flatten().map(|e| e.path()).collect(),
        Err(_) => Vec::new(),
    }
}

async fn vector_context(corpus: Corpus, index_path: &Path) -> Box<dyn ContextStrategy> {
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbedder::new(128));
    let (index, _) = builder::open_or_build(index_path, &corpus, provider.as_ref(), false, None)
        .await
        .unwrap();
    Box::new(VectorContext::new(corpus, index, provider, 5, 200).unwrap())
}

fn pipeline(root: &Path, server: &MockServer, context: Box<dyn ContextStrategy>) -> DraftPipeline {
    let store: Arc<dyn MailStore> = Arc::new(MaildirStore::open(root, "Drafts", 1000).unwrap());
    let backend = OllamaBackend::new(&server.uri(), Duration::from_secs(5)).unwrap();
    DraftPipeline::new(
        store,
        context,
        GenerationClient::new(Box::new(backend), "email_assistant"),
        PromptTemplate::new("me@example.net"),
        "INBOX",
    )
}

fn reply(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "model": "email_assistant",
        "response": text,
        "done": true
    }))
}

// ─── Corpus extraction from an MBOX export ──────────────────────────

#[test]
fn test_extract_fixture_corpus() {
    let now = Utc.with_ymd_and_hms(2024, 1, 20, 0, 0, 0).unwrap();
    let items = extract_sent(&fixture("sent.mbox"), ExtractOptions::default(), now).unwrap();

    let subjects: Vec<&str> = items.iter().map(|i| i.subject.as_str()).collect();
    assert_eq!(subjects, vec!["Urlaub nächste Woche", "Invoice 2023-118", "Meeting"]);
    assert_eq!(items[2].body, "Let's meet Tuesday at 10am");
    assert_eq!(items[2].recipient, "client@example.com");
    assert!(items[0].body.contains("out of office"));
}

#[test]
fn test_extracted_corpus_roundtrips_through_file() {
    let tmp = tempfile::tempdir().unwrap();
    let now = Utc.with_ymd_and_hms(2024, 1, 20, 0, 0, 0).unwrap();
    let items = extract_sent(&fixture("sent.mbox"), ExtractOptions::default(), now).unwrap();

    let path = tmp.path().join("sent_emails.json");
    Corpus::new(items).save(&path).unwrap();
    let loaded = Corpus::load(&path).unwrap();
    assert_eq!(loaded.len(), 3);
    assert_eq!(loaded.items()[0].id, "<sent3@example.net>");
}

// ─── Meeting scenario: retrieved excerpt reaches the prompt ─────────

#[tokio::test]
async fn test_meeting_reply_uses_retrieved_context() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("Maildir");
    deliver(&root, "1000.a", "Meeting", "Can we meet Tuesday?");

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_string_contains("Let's meet Tuesday at 10am"))
        .respond_with(reply("Answer: Tuesday at 10am works for me."))
        .expect(1)
        .mount(&server)
        .await;

    let corpus: Corpus = serde_json::from_str::<Vec<replydraft::model::item::HistoricalItem>>(
        r#"[{"subject":"Meeting","body":"Let's meet Tuesday at 10am","recipient":"bob@example.com","sent_at":"2024-01-01"}]"#,
    )
    .map(Corpus::new)
    .unwrap();
    let context = vector_context(corpus, &tmp.path().join("emails.index")).await;

    let report = pipeline(&root, &server, context).run_cycle().await.unwrap();
    assert_eq!(report, CycleReport { processed: 1, failed: 0 });

    let drafts = draft_files(&root);
    assert_eq!(drafts.len(), 1);
    let draft = parse_message(&std::fs::read(&drafts[0]).unwrap());
    assert_eq!(draft.subject, "RE: Meeting");
    assert_eq!(draft.to, "alice@example.com");
    assert_eq!(draft.from, "me@example.net");
    assert_eq!(draft.text.trim(), "Tuesday at 10am works for me.");

    assert!(root.join("INBOX/cur/1000.a:2,S").exists());
}

// ─── Empty corpus still produces a draft ────────────────────────────

#[tokio::test]
async fn test_empty_corpus_still_drafts() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("Maildir");
    deliver(&root, "1000.a", "Question", "Do you ship to Austria?");

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(reply("Yes, we do."))
        .expect(1)
        .mount(&server)
        .await;

    let context = vector_context(Corpus::default(), &tmp.path().join("emails.index")).await;
    assert_eq!(context.build_context("Question Do you ship?").await.unwrap(), "");

    let report = pipeline(&root, &server, context).run_cycle().await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(draft_files(&root).len(), 1);
}

// ─── Backend failure leaves the item unread ─────────────────────────

#[tokio::test]
async fn test_backend_500_leaves_item_unread() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("Maildir");
    deliver(&root, "1000.a", "Meeting", "Can we meet Tuesday?");

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(500).set_body_string("out of memory"))
        .mount(&server)
        .await;

    let context = vector_context(Corpus::default(), &tmp.path().join("emails.index")).await;
    let p = pipeline(&root, &server, context);

    let report = p.run_cycle().await.unwrap();
    assert_eq!(report, CycleReport { processed: 0, failed: 1 });
    assert!(draft_files(&root).is_empty());
    assert!(root.join("INBOX/new/1000.a").exists());

    // Retried on the next cycle.
    let again = p.run_cycle().await.unwrap();
    assert_eq!(again.failed, 1);
}

// ─── A second cycle finds nothing left to do ────────────────────────

#[tokio::test]
async fn test_second_cycle_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("Maildir");
    deliver(&root, "1000.a", "One", "First");
    deliver(&root, "1001.b", "Two", "Second");

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(reply("Answer: Thanks."))
        .expect(2)
        .mount(&server)
        .await;

    let context = vector_context(Corpus::default(), &tmp.path().join("emails.index")).await;
    let p = pipeline(&root, &server, context);

    assert_eq!(p.run_cycle().await.unwrap().processed, 2);
    assert_eq!(p.run_cycle().await.unwrap(), CycleReport::default());
    assert_eq!(draft_files(&root).len(), 2);
}

// ─── Index is reused across restarts and extended as the corpus grows

#[tokio::test]
async fn test_index_survives_restart_and_grows() {
    let tmp = tempfile::tempdir().unwrap();
    let index_path = tmp.path().join("emails.index");
    let provider = HashingEmbedder::new(64);
    let now = Utc.with_ymd_and_hms(2024, 1, 20, 0, 0, 0).unwrap();
    let mut items = extract_sent(&fixture("sent.mbox"), ExtractOptions::default(), now).unwrap();
    items.reverse();

    let first = Corpus::new(items[..2].to_vec());
    let (_, origin) = builder::open_or_build(&index_path, &first, &provider, false, None)
        .await
        .unwrap();
    assert!(matches!(origin, IndexOrigin::Built { .. }));

    let (_, origin) = builder::open_or_build(&index_path, &first, &provider, false, None)
        .await
        .unwrap();
    assert_eq!(origin, IndexOrigin::Loaded);

    let grown = Corpus::new(items);
    let (index, origin) = builder::open_or_build(&index_path, &grown, &provider, false, None)
        .await
        .unwrap();
    assert_eq!(origin, IndexOrigin::Extended { added: 1 });
    assert_eq!(index.len(), grown.len());
}
