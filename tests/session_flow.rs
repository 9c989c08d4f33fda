//! End-to-end session flows over HTTP

mod common;

use common::{Behavior, Stub};
use roomcraft::capture::StillFileCamera;
use roomcraft::config::{GatewayConfig, SessionConfig};
use roomcraft::gateway::{HttpGateway, Rgb};
use roomcraft::session::{Completion, Mode, PhaseKind, Session, SessionEvent, Style, FALLBACK_QUOTE};
use std::sync::Arc;

async fn session(stub: &Stub, quotes: bool) -> Session<HttpGateway> {
    let gateway = HttpGateway::new(&GatewayConfig {
        base_url: stub.serve().await,
        timeout_secs: 5,
    })
    .unwrap();
    Session::new(
        Arc::new(gateway),
        &SessionConfig {
            default_style: Some(Style::Industrial),
            quotes_while_loading: quotes,
        },
    )
}

#[tokio::test]
async fn test_full_generate_pipeline() {
    let stub = Stub::new();
    let session = session(&stub, true).await;

    session.start_generate().await.unwrap();
    assert_eq!(
        stub.last_body("generate-fal-image").unwrap()["prompt"],
        "A high-resolution, photorealistic image of a Industrial style room."
    );

    session.request_segmentation().await.unwrap();
    let mask = session.snapshot().segments.unwrap().get(0).cloned().unwrap();
    session
        .recolor_object(mask, Rgb::new(20, 40, 60))
        .await
        .unwrap();

    let snap = session.snapshot();
    assert_eq!(snap.phase, PhaseKind::ResultReady);
    assert_eq!(snap.image.unwrap().as_str(), "https://cdn.test/recolored.png");
    assert!(snap.segments.is_none());

    session.request_narration().await.unwrap();
    let completion = session.request_reconstruction().await.unwrap();
    assert_eq!(completion, Completion::Applied(PhaseKind::Reconstructed));

    let snap = session.snapshot();
    assert_eq!(snap.model.unwrap().url, "https://cdn.test/room.glb");
    assert!(snap.audio.is_some());
    assert!(snap.error.is_none());
}

#[tokio::test]
async fn test_redesign_from_photo_file() {
    let dir = tempfile::tempdir().unwrap();
    let photo = dir.path().join("room.jpg");
    std::fs::write(&photo, b"\xff\xd8\xff\xe0fake-jpeg").unwrap();

    let stub = Stub::new();
    let session = session(&stub, false)
        .await
        .with_device(Arc::new(StillFileCamera::new(&photo)));

    session.switch_mode(Mode::Redesign);
    session.select_style(Style::Coastal);
    session.start_camera_capture().unwrap();
    assert_eq!(session.phase(), PhaseKind::CameraActive);
    session.take_picture().unwrap();
    session.submit_redesign().await.unwrap();

    let body = stub.last_body("redesign-fal-image").unwrap();
    let image_url = body["image_url"].as_str().unwrap();
    assert!(image_url.starts_with("data:image/jpeg;base64,"));
    assert!(body["prompt"]
        .as_str()
        .unwrap()
        .starts_with("Redesign this room in a Coastal style."));

    let snap = session.snapshot();
    assert_eq!(snap.phase, PhaseKind::ResultReady);
    assert!(!snap.captured);
}

#[tokio::test]
async fn test_missing_photo_is_a_device_failure() {
    let stub = Stub::new();
    let session = session(&stub, false)
        .await
        .with_device(Arc::new(StillFileCamera::new("/definitely/not/here.jpg")));

    session.switch_mode(Mode::Redesign);
    assert!(session.start_camera_capture().is_err());

    let snap = session.snapshot();
    assert_eq!(snap.phase, PhaseKind::Failed);
    assert_eq!(snap.error.unwrap().message, "Could not access camera.");
    assert!(stub.requests().is_empty());
}

#[tokio::test]
async fn test_backend_failure_on_recolor_keeps_last_image() {
    let stub = Stub::new();
    stub.set("recolor", Behavior::ServerError);
    let session = session(&stub, false).await;

    session.start_generate().await.unwrap();
    session.request_segmentation().await.unwrap();
    let mask = session.snapshot().segments.unwrap().get(1).cloned().unwrap();
    assert!(session.recolor_object(mask, Rgb::new(1, 1, 1)).await.is_err());

    let snap = session.snapshot();
    assert_eq!(snap.phase, PhaseKind::Segmented);
    assert_eq!(snap.image.unwrap().as_str(), "https://cdn.test/generated.png");
    assert_eq!(snap.error.unwrap().message, "Recolor failed.");
}

#[tokio::test]
async fn test_generate_failure_surfaces_message() {
    let stub = Stub::new();
    stub.set("generate-fal-image", Behavior::ServerError);
    let session = session(&stub, false).await;

    assert!(session.start_generate().await.is_err());
    let snap = session.snapshot();
    assert_eq!(snap.phase, PhaseKind::Failed);
    assert_eq!(
        snap.error.unwrap().message,
        "Failed to generate image from backend."
    );
}

#[tokio::test]
async fn test_quote_endpoint_down_uses_fallback() {
    let stub = Stub::new();
    stub.set("get-designer-quote", Behavior::ServerError);
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let session = session(&stub, false).await.with_events(tx);

    assert_eq!(session.get_quote().await, FALLBACK_QUOTE);
    let snap = session.snapshot();
    assert_eq!(snap.phase, PhaseKind::Idle);
    assert!(snap.error.is_none());
    assert_eq!(
        rx.try_recv().unwrap(),
        SessionEvent::QuoteUpdated(FALLBACK_QUOTE.to_string())
    );
}

#[tokio::test]
async fn test_narration_failure_keeps_result() {
    let stub = Stub::new();
    stub.set("generate-voiceover", Behavior::Malformed);
    let session = session(&stub, false).await;

    session.start_generate().await.unwrap();
    assert!(session.request_narration().await.is_err());

    let snap = session.snapshot();
    assert_eq!(snap.phase, PhaseKind::ResultReady);
    assert!(snap.audio.is_none());
    assert_eq!(
        snap.error.unwrap().message,
        "Failed to generate audio description."
    );
}
