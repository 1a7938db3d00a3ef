//! End-to-end tests for the send pipeline against a mock backend.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use mailgate_graph::{
    AuthConfig, CancellationToken, EmailAttachment, Error, MailEnvelope, SendOptions, Sender,
};
use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Replays a fixed list of responses; the last one repeats.
struct Scripted {
    responses: Vec<ResponseTemplate>,
    hits: AtomicUsize,
}

impl Scripted {
    fn new(responses: Vec<ResponseTemplate>) -> Self {
        Self {
            responses,
            hits: AtomicUsize::new(0),
        }
    }
}

impl Respond for Scripted {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let hit = self.hits.fetch_add(1, Ordering::SeqCst);
        self.responses[hit.min(self.responses.len() - 1)].clone()
    }
}

const SENDER: &str = "sender@x.io";

async fn gateway(server: &MockServer) -> Sender {
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "expires_in": 3600,
            "access_token": "test-token"
        })))
        .mount(server)
        .await;

    Sender::new(AuthConfig::new("tenant", "client", "secret", SENDER))
        .expect("sender")
        .with_base_url(Url::parse(&format!("{}/v1.0/", server.uri())).expect("base url"))
        .expect("base override")
        .with_token_url(Url::parse(&format!("{}/token", server.uri())).expect("token url"))
        .expect("token override")
}

fn user_path(tail: &str) -> String {
    format!("/v1.0/users/{SENDER}/{tail}")
}

fn materialized_draft() -> serde_json::Value {
    // A draft read-back padded with read-only properties the send
    // endpoint would reject.
    json!({
        "id": "M1",
        "createdDateTime": "2026-01-01T00:00:00Z",
        "changeKey": "CQAAAB",
        "isDraft": true,
        "subject": "Hi",
        "body": { "contentType": "Text", "content": "Hello" },
        "toRecipients": [ { "emailAddress": { "address": "a@x.io" } } ]
    })
}

async fn mount_happy_draft_lifecycle(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(user_path("messages")))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "M1" })))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(user_path("messages/M1")))
        .and(query_param("$expand", "attachments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(materialized_draft()))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(user_path("sendMail")))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("DELETE"))
        .and(path(user_path("messages/M1")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(server)
        .await;
}

fn envelope() -> MailEnvelope {
    MailEnvelope::new(["a@x.io"]).subject("Hi").text_body("Hello")
}

fn attachment_file(bytes: usize) -> tempfile::NamedTempFile {
    let file = tempfile::NamedTempFile::new().expect("temp file");
    std::fs::write(file.path(), vec![0u8; bytes]).expect("write fixture");
    file
}

fn retry_now(status: u16) -> ResponseTemplate {
    // Retry-After: 0 keeps retry-exhaustion tests fast.
    ResponseTemplate::new(status).insert_header("Retry-After", "0")
}

// S1: no attachments; the clean payload carries exactly the whitelisted
// fields and the draft is deleted exactly once.
#[tokio::test]
async fn sends_simple_message_and_removes_draft() {
    let server = MockServer::start().await;
    let sender = gateway(&server).await;
    mount_happy_draft_lifecycle(&server).await;

    sender
        .send(&envelope(), &SendOptions::default(), &CancellationToken::new())
        .await
        .expect("send succeeds");

    let requests = server.received_requests().await.expect("requests");
    let send_mail = requests
        .iter()
        .find(|r| r.url.path() == user_path("sendMail"))
        .expect("sendMail request");
    let body: serde_json::Value = serde_json::from_slice(&send_mail.body).expect("json body");
    assert_eq!(
        body,
        json!({
            "message": {
                "subject": "Hi",
                "body": { "contentType": "Text", "content": "Hello" },
                "toRecipients": [ { "emailAddress": { "address": "a@x.io" } } ]
            },
            "saveToSentItems": false
        })
    );

    let deletes: Vec<_> = requests
        .iter()
        .filter(|r| r.method.as_str() == "DELETE")
        .collect();
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0].url.path(), user_path("messages/M1"));
}

// S2: a 2 MiB attachment stays on the inline base64 path.
#[tokio::test]
async fn small_attachment_posts_inline() {
    let server = MockServer::start().await;
    let sender = gateway(&server).await;
    mount_happy_draft_lifecycle(&server).await;

    Mock::given(method("POST"))
        .and(path(user_path("messages/M1/attachments")))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let file = attachment_file(2 * 1024 * 1024);
    let envelope = envelope().attachment(EmailAttachment::new("report.bin", file.path()));

    sender
        .send(&envelope, &SendOptions::default(), &CancellationToken::new())
        .await
        .expect("send succeeds");

    let requests = server.received_requests().await.expect("requests");
    assert!(
        !requests
            .iter()
            .any(|r| r.url.path().ends_with("createUploadSession")),
        "no upload session for a small attachment"
    );

    let attach = requests
        .iter()
        .find(|r| r.url.path() == user_path("messages/M1/attachments"))
        .expect("attachment POST");
    let body: serde_json::Value = serde_json::from_slice(&attach.body).expect("json body");
    assert_eq!(body["@odata.type"], "#microsoft.graph.fileAttachment");
    assert_eq!(body["name"], "report.bin");
    assert!(body["contentBytes"].as_str().expect("base64").len() > 2 * 1024 * 1024);
}

// S3: 12 MiB at threshold 3 MiB and chunk 5 MiB: one session, three
// chunk PUTs with the exact ranges, no Authorization on the chunks.
#[tokio::test]
async fn large_attachment_streams_through_upload_session() {
    let server = MockServer::start().await;
    let sender = gateway(&server).await;
    mount_happy_draft_lifecycle(&server).await;

    Mock::given(method("POST"))
        .and(path(user_path("messages/M1/attachments/createUploadSession")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uploadUrl": format!("{}/upload/1", server.uri())
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/upload/1"))
        .respond_with(Scripted::new(vec![
            ResponseTemplate::new(202)
                .set_body_json(json!({ "nextExpectedRanges": ["5242880-12582911"] })),
            ResponseTemplate::new(202)
                .set_body_json(json!({ "nextExpectedRanges": ["10485760-12582911"] })),
            ResponseTemplate::new(201).set_body_json(json!({})),
        ]))
        .expect(3)
        .mount(&server)
        .await;

    let file = attachment_file(12 * 1024 * 1024);
    let envelope = envelope().attachment(EmailAttachment::new("big.bin", file.path()));

    sender
        .send(&envelope, &SendOptions::default(), &CancellationToken::new())
        .await
        .expect("send succeeds");

    let requests = server.received_requests().await.expect("requests");
    let ranges: Vec<String> = requests
        .iter()
        .filter(|r| r.url.path() == "/upload/1")
        .map(|r| {
            assert!(
                r.headers.get("authorization").is_none(),
                "chunk PUTs must not carry Authorization"
            );
            r.headers
                .get("content-range")
                .expect("content-range")
                .to_str()
                .expect("ascii")
                .to_string()
        })
        .collect();
    assert_eq!(
        ranges,
        vec![
            "bytes 0-5242879/12582912",
            "bytes 5242880-10485759/12582912",
            "bytes 10485760-12582911/12582912",
        ]
    );
}

// Threshold boundary: a file exactly at the threshold stays small; one
// byte above goes through the upload session.
#[tokio::test]
async fn threshold_boundary_routes_attachment_paths() {
    for (size, expect_session) in [(64usize, false), (65, true)] {
        let server = MockServer::start().await;
        let sender = gateway(&server).await;
        mount_happy_draft_lifecycle(&server).await;

        Mock::given(method("POST"))
            .and(path(user_path("messages/M1/attachments")))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(user_path("messages/M1/attachments/createUploadSession")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "uploadUrl": format!("{}/upload/1", server.uri())
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/upload/1"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
            .mount(&server)
            .await;

        let file = attachment_file(size);
        let envelope = envelope().attachment(EmailAttachment::new("edge.bin", file.path()));
        let options = SendOptions::new().large_threshold(64).chunk_size(128);

        sender
            .send(&envelope, &options, &CancellationToken::new())
            .await
            .expect("send succeeds");

        let requests = server.received_requests().await.expect("requests");
        let used_session = requests
            .iter()
            .any(|r| r.url.path().ends_with("createUploadSession"));
        assert_eq!(used_session, expect_session, "size {size}");
    }
}

// S4: 429 with Retry-After: 1 on the first chunk delays the retry by
// the server-supplied delta; three distinct chunks still land.
#[tokio::test]
async fn chunk_rate_limit_honors_retry_after() {
    let server = MockServer::start().await;
    let sender = gateway(&server).await;
    mount_happy_draft_lifecycle(&server).await;

    Mock::given(method("POST"))
        .and(path(user_path("messages/M1/attachments/createUploadSession")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uploadUrl": format!("{}/upload/1", server.uri())
        })))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/upload/1"))
        .respond_with(Scripted::new(vec![
            ResponseTemplate::new(429).insert_header("Retry-After", "1"),
            ResponseTemplate::new(202)
                .set_body_json(json!({ "nextExpectedRanges": ["5-11"] })),
            ResponseTemplate::new(202).set_body_json(json!({ "nextExpectedRanges": ["10-11"] })),
            ResponseTemplate::new(201).set_body_json(json!({})),
        ]))
        .expect(4)
        .mount(&server)
        .await;

    let file = attachment_file(12);
    let envelope = envelope().attachment(EmailAttachment::new("tiny.bin", file.path()));
    let options = SendOptions::new().large_threshold(3).chunk_size(5);

    let started = Instant::now();
    sender
        .send(&envelope, &options, &CancellationToken::new())
        .await
        .expect("send succeeds");
    assert!(
        started.elapsed().as_millis() >= 1000,
        "retry must wait the Retry-After delta"
    );

    let requests = server.received_requests().await.expect("requests");
    let ranges: Vec<String> = requests
        .iter()
        .filter(|r| r.url.path() == "/upload/1")
        .map(|r| {
            r.headers
                .get("content-range")
                .expect("content-range")
                .to_str()
                .expect("ascii")
                .to_string()
        })
        .collect();
    // The retried first chunk repeats its range; three distinct ranges total.
    assert_eq!(
        ranges,
        vec!["bytes 0-4/12", "bytes 0-4/12", "bytes 5-9/12", "bytes 10-11/12"]
    );
}

// S5: a 404 on the second chunk loses the session; a fresh session
// restarts from offset zero and at most three sessions are created.
#[tokio::test]
async fn lost_session_restarts_from_offset_zero() {
    let server = MockServer::start().await;
    let sender = gateway(&server).await;
    mount_happy_draft_lifecycle(&server).await;

    Mock::given(method("POST"))
        .and(path(user_path("messages/M1/attachments/createUploadSession")))
        .respond_with(Scripted::new(vec![
            ResponseTemplate::new(200).set_body_json(json!({
                "uploadUrl": format!("{}/upload/1", server.uri())
            })),
            ResponseTemplate::new(200).set_body_json(json!({
                "uploadUrl": format!("{}/upload/2", server.uri())
            })),
        ]))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/upload/1"))
        .respond_with(Scripted::new(vec![
            ResponseTemplate::new(202).set_body_json(json!({ "nextExpectedRanges": ["5-11"] })),
            ResponseTemplate::new(404).set_body_json(json!({
                "error": { "code": "ErrorItemNotFound", "message": "session gone" }
            })),
        ]))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/upload/2"))
        .respond_with(Scripted::new(vec![
            ResponseTemplate::new(202).set_body_json(json!({ "nextExpectedRanges": ["5-11"] })),
            ResponseTemplate::new(202).set_body_json(json!({ "nextExpectedRanges": ["10-11"] })),
            ResponseTemplate::new(201).set_body_json(json!({})),
        ]))
        .expect(3)
        .mount(&server)
        .await;

    let file = attachment_file(12);
    let envelope = envelope().attachment(EmailAttachment::new("tiny.bin", file.path()));
    let options = SendOptions::new().large_threshold(3).chunk_size(5);

    sender
        .send(&envelope, &options, &CancellationToken::new())
        .await
        .expect("send succeeds");

    let requests = server.received_requests().await.expect("requests");
    let sessions = requests
        .iter()
        .filter(|r| r.url.path().ends_with("createUploadSession"))
        .count();
    assert!(sessions <= 3);
    assert_eq!(sessions, 2);

    let second_session_first_range = requests
        .iter()
        .find(|r| r.url.path() == "/upload/2")
        .expect("second session PUT")
        .headers
        .get("content-range")
        .expect("content-range")
        .to_str()
        .expect("ascii")
        .to_string();
    assert_eq!(second_session_first_range, "bytes 0-4/12");
}

// S6: sendMail exhausts its retries but the draft is still removed;
// the send-message error reaches the caller.
#[tokio::test]
async fn failed_send_still_removes_draft() {
    let server = MockServer::start().await;
    let sender = gateway(&server).await;

    Mock::given(method("POST"))
        .and(path(user_path("messages")))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "M1" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(user_path("messages/M1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(materialized_draft()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(user_path("sendMail")))
        .respond_with(retry_now(500))
        .expect(5)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(user_path("messages/M1")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let err = sender
        .send(&envelope(), &SendOptions::default(), &CancellationToken::new())
        .await
        .expect_err("send must fail");
    assert!(matches!(err, Error::SendMessage(_)), "got {err:?}");
}

// S7: sendMail and cleanup both exhaust retries; the caller receives
// an aggregate carrying both errors.
#[tokio::test]
async fn failed_send_and_failed_cleanup_aggregate() {
    let server = MockServer::start().await;
    let sender = gateway(&server).await;

    Mock::given(method("POST"))
        .and(path(user_path("messages")))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "M1" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(user_path("messages/M1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(materialized_draft()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(user_path("sendMail")))
        .respond_with(retry_now(500))
        .expect(5)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(user_path("messages/M1")))
        .respond_with(retry_now(500))
        .expect(5)
        .mount(&server)
        .await;

    let err = sender
        .send(&envelope(), &SendOptions::default(), &CancellationToken::new())
        .await
        .expect_err("send must fail");
    match err {
        Error::Aggregate { operation, cleanup } => {
            assert!(matches!(*operation, Error::SendMessage(_)));
            assert!(matches!(*cleanup, Error::DeleteDraft(_)));
        }
        other => panic!("expected aggregate error, got {other:?}"),
    }
}

// A failed attachment aborts the pipeline but cleanup still runs.
#[tokio::test]
async fn failed_attachment_jumps_to_cleanup() {
    let server = MockServer::start().await;
    let sender = gateway(&server).await;

    Mock::given(method("POST"))
        .and(path(user_path("messages")))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "M1" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(user_path("messages/M1/attachments")))
        .respond_with(ResponseTemplate::new(413).set_body_json(json!({
            "error": { "code": "ErrorMessageSizeExceeded", "message": "too big" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(user_path("messages/M1")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let file = attachment_file(16);
    let envelope = envelope().attachment(EmailAttachment::new("doc.bin", file.path()));

    let err = sender
        .send(&envelope, &SendOptions::default(), &CancellationToken::new())
        .await
        .expect_err("send must fail");
    match err {
        Error::Attachment { name, .. } => assert_eq!(name, "doc.bin"),
        other => panic!("expected attachment error, got {other:?}"),
    }

    let requests = server.received_requests().await.expect("requests");
    assert!(
        !requests.iter().any(|r| r.url.path() == user_path("sendMail")),
        "sendMail must not run after a failed attachment"
    );
    assert_eq!(
        requests
            .iter()
            .filter(|r| r.method.as_str() == "DELETE")
            .count(),
        1
    );
}

// Validation failures surface before any backend call.
#[tokio::test]
async fn invalid_envelope_makes_no_backend_call() {
    let server = MockServer::start().await;
    let sender = gateway(&server).await;

    let err = sender
        .send(
            &MailEnvelope::new(["not-an-address"]).subject("Hi"),
            &SendOptions::default(),
            &CancellationToken::new(),
        )
        .await
        .expect_err("validation must fail");
    assert!(matches!(err, Error::Argument { ref field, .. } if field == "to"), "got {err:?}");

    let requests = server.received_requests().await.expect("requests");
    assert!(requests.is_empty(), "no backend call expected");
}

// Cancellation before the pipeline starts surfaces as cancellation.
#[tokio::test]
async fn pre_cancelled_send_reports_cancellation() {
    let server = MockServer::start().await;
    let sender = gateway(&server).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = sender
        .send(&envelope(), &SendOptions::default(), &cancel)
        .await
        .expect_err("cancelled send must fail");
    assert!(err.is_cancelled());
}
