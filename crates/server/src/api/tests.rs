use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;
use tutor_protocol::StreamDecoder;
use tutor_test_model::{PresetEvent, PresetResponse, TestModelProvider};

use super::*;

fn app(model_provider: TestModelProvider) -> Router {
    let config = ServerConfig::default().with_system_prompt("Assess AGI.");
    router(AppState::new(model_provider, &config))
}

fn tutor_request(body: impl Into<Body>) -> Request<Body> {
    Request::post("/api/tutor")
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap()
}

fn prompt_of(turns: &[ChatTurn]) -> String {
    serde_json::to_string(&TutorRequest::from_turns(turns).unwrap()).unwrap()
}

async fn parts_of(resp: Response) -> Vec<StreamPart> {
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let mut decoder = StreamDecoder::new();
    let mut parts = decoder.push(&body).unwrap();
    parts.extend(decoder.finish().unwrap());
    parts
}

async fn error_of(resp: Response) -> String {
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    json["error"].as_str().unwrap().to_owned()
}

#[tokio::test]
async fn test_streams_reply() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::with_deltas([
        "AGI is",
        " a system...",
        "",
        " __COMPLETE__",
    ]));

    let resp = app(model_provider.clone())
        .oneshot(tutor_request(prompt_of(&[ChatTurn::learner(
            "What is AGI?",
        )])))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
    assert_eq!(resp.headers()["x-vercel-ai-data-stream"], "v1");

    let parts = parts_of(resp).await;
    assert!(matches!(parts[0], StreamPart::StartStep { .. }));
    assert_eq!(
        parts[1..],
        [
            StreamPart::Text("AGI is".to_owned()),
            StreamPart::Text(" a system...".to_owned()),
            StreamPart::Text(" __COMPLETE__".to_owned()),
            StreamPart::Finish {
                finish_reason: FinishReason::Stop
            },
        ]
    );

    let requests = model_provider.received_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].messages,
        [
            ModelMessage::System("Assess AGI.".to_owned()),
            ModelMessage::User("What is AGI?".to_owned()),
        ]
    );
    assert_eq!(requests[0].max_tokens, Some(2_000));
}

#[tokio::test]
async fn test_translates_history() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::with_deltas(["unused"]));
    model_provider.add_response(PresetResponse::with_deltas(["Go on."]));

    // The first reply failed before any text arrived.
    let prompt = prompt_of(&[
        ChatTurn::learner("What is AGI?"),
        ChatTurn::tutor(""),
        ChatTurn::learner("Hello?"),
    ]);
    let resp = app(model_provider.clone())
        .oneshot(tutor_request(prompt))
        .await
        .unwrap();
    let parts = parts_of(resp).await;
    assert!(parts.contains(&StreamPart::Text("Go on.".to_owned())));

    let prompt = prompt_of(&[
        ChatTurn::learner("What is AGI?"),
        ChatTurn::tutor("What do you think?"),
        ChatTurn::learner("Hello?"),
    ]);
    let resp = app(model_provider.clone())
        .oneshot(tutor_request(prompt))
        .await
        .unwrap();
    parts_of(resp).await;

    let requests = model_provider.received_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(
        requests[0].messages[1..],
        [
            ModelMessage::User("What is AGI?".to_owned()),
            ModelMessage::User("Hello?".to_owned()),
        ]
    );
    assert_eq!(
        requests[1].messages[1..],
        [
            ModelMessage::User("What is AGI?".to_owned()),
            ModelMessage::Assistant("What do you think?".to_owned()),
            ModelMessage::User("Hello?".to_owned()),
        ]
    );
}

#[tokio::test]
async fn test_rejects_invalid_requests() {
    let model_provider = TestModelProvider::default();

    let err = error_of(
        app(model_provider.clone())
            .oneshot(tutor_request("{\"prompt\":\"[\"}"))
            .await
            .unwrap(),
    )
    .await;
    assert!(err.contains("at least 2 characters"), "{err}");

    let long = serde_json::json!({ "prompt": "x".repeat(20_001) });
    let err = error_of(
        app(model_provider.clone())
            .oneshot(tutor_request(long.to_string()))
            .await
            .unwrap(),
    )
    .await;
    assert!(err.contains("at most 20000 characters"), "{err}");

    let err = error_of(
        app(model_provider.clone())
            .oneshot(tutor_request("{\"prompt\":\"not json\"}"))
            .await
            .unwrap(),
    )
    .await;
    assert!(err.starts_with("`prompt` must be valid JSON"), "{err}");

    for body in ["", "{}", "{\"prompt\":42}", "prompt=hi"] {
        error_of(
            app(model_provider.clone())
                .oneshot(tutor_request(body))
                .await
                .unwrap(),
        )
        .await;
    }

    // Missing content type.
    let req = Request::post("/api/tutor")
        .body(Body::from(prompt_of(&[ChatTurn::learner("Hi")])))
        .unwrap();
    error_of(app(model_provider.clone()).oneshot(req).await.unwrap()).await;

    assert!(model_provider.received_requests().is_empty());
}

#[tokio::test]
async fn test_failure_becomes_error_part() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::with_events([
        PresetEvent::Text("AGI is".to_owned()),
        PresetEvent::Failure("Overloaded".to_owned()),
    ]));

    let resp = app(model_provider)
        .oneshot(tutor_request(prompt_of(&[ChatTurn::learner(
            "What is AGI?",
        )])))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        parts_of(resp).await[1..],
        [
            StreamPart::Text("AGI is".to_owned()),
            StreamPart::Error(
                "Error generating tutor reply: Overloaded".to_owned()
            ),
            StreamPart::Finish {
                finish_reason: FinishReason::Error
            },
        ]
    );
}

#[tokio::test]
async fn test_provider_refusal_becomes_error_part() {
    let mut model_provider = TestModelProvider::default();
    model_provider
        .add_response(PresetResponse::with_deltas(["Hi"]).refused());

    let resp = app(model_provider)
        .oneshot(tutor_request(prompt_of(&[ChatTurn::learner("Hi")])))
        .await
        .unwrap();
    let parts = parts_of(resp).await;
    assert_eq!(parts.len(), 3);
    assert!(matches!(&parts[1], StreamPart::Error(msg)
        if msg.starts_with("Error generating tutor reply: ")));
}

#[tokio::test]
async fn test_truncated_reply() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_response(
        PresetResponse::with_deltas(["AGI is a highly"]).truncated(),
    );

    let resp = app(model_provider)
        .oneshot(tutor_request(prompt_of(&[ChatTurn::learner("Hi")])))
        .await
        .unwrap();
    assert_eq!(
        parts_of(resp).await.last(),
        Some(&StreamPart::Finish {
            finish_reason: FinishReason::Length
        })
    );
}

#[tokio::test]
async fn test_healthz() {
    let resp = app(TestModelProvider::default())
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"ok");
}
