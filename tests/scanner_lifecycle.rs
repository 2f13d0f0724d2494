mod common;

use std::time::Duration;

use codescan::capture::{CaptureFault, DeviceInfo, Dimensions, FacingMode, StreamRequest};
use codescan::{CandidateSource, FoundOutcome, ScanError, ScanState, StatusKind};
use image::RgbaImage;

use common::{camera, wait_for, FakeStore, FixedRecognizer, HarnessBuilder};

#[tokio::test]
async fn printed_code_is_found_stored_and_released() {
    let h = HarnessBuilder::new()
        .printed(FixedRecognizer::new("ENTER CODE K7PQ2M9XWT"))
        .build()
        .await;
    let mut rx = h.controller.subscribe();

    h.controller.start().await.expect("start");
    let found = wait_for(&mut rx, |s| s.state == ScanState::Found).await;

    let candidate = found.last_candidate.expect("candidate");
    assert_eq!(candidate.code, "K7PQ2M9XWT");
    assert_eq!(candidate.source, CandidateSource::TextRecognition);
    assert_eq!(found.outcome, Some(FoundOutcome::New));
    assert_eq!(found.status_kind, StatusKind::Success);
    assert_eq!(found.banner_kind, StatusKind::Success);

    h.controller.settle().await;
    assert_eq!(
        h.controller.snapshot().banner_message.as_deref(),
        Some("Copied to clipboard")
    );
    assert_eq!(
        h.store.inserted(),
        vec![("K7PQ2M9XWT".to_string(), Some("owner-1".to_string()))]
    );
    assert_eq!(h.clipboard.copied(), vec!["K7PQ2M9XWT".to_string()]);
    assert_eq!(h.chime.played(), 1);
    assert_eq!(h.controller.snapshot().total_count, 1);

    assert_eq!(h.controller.active_task_count(), 0);
    assert!(!h.controller.has_capture());
    assert_eq!(h.camera.streams_released(), 1);
    assert_eq!(h.camera.live_streams(), 0);
}

#[tokio::test]
async fn printed_text_beats_decoded_url() {
    let h = HarnessBuilder::new()
        .decoded("https://example.com/r/Z8L2WT4R9Q")
        .printed(FixedRecognizer::new("K7PQ2M9XWT"))
        .build()
        .await;
    let mut rx = h.controller.subscribe();

    h.controller.start().await.expect("start");
    let found = wait_for(&mut rx, |s| s.state == ScanState::Found).await;
    assert_eq!(found.last_candidate.expect("candidate").code, "K7PQ2M9XWT");
}

#[tokio::test]
async fn decoded_url_yields_embedded_code() {
    let h = HarnessBuilder::new()
        .decoded("https://example.com/r/Z8L2WT4R9Q")
        .build()
        .await;
    let mut rx = h.controller.subscribe();

    h.controller.start().await.expect("start");
    let found = wait_for(&mut rx, |s| s.state == ScanState::Found).await;
    let candidate = found.last_candidate.expect("candidate");
    assert_eq!(candidate.code, "Z8L2WT4R9Q");
    assert_eq!(candidate.source, CandidateSource::StructuredDecode);
}

#[tokio::test]
async fn known_code_from_camera_is_a_duplicate() {
    let h = HarnessBuilder::new()
        .store(FakeStore::with_codes(&["K7PQ2M9XWT"]))
        .printed(FixedRecognizer::new("K7PQ2M9XWT"))
        .build()
        .await;
    assert_eq!(h.controller.snapshot().total_count, 1);
    let mut rx = h.controller.subscribe();

    h.controller.start().await.expect("start");
    let found = wait_for(&mut rx, |s| s.state == ScanState::Found).await;
    assert_eq!(found.outcome, Some(FoundOutcome::Duplicate));
    assert_eq!(found.status_message.as_deref(), Some("This code was already scanned."));
    assert_eq!(found.status_kind, StatusKind::Error);

    h.controller.settle().await;
    assert!(h.store.inserted().is_empty());
    assert_eq!(h.chime.played(), 0);
    assert_eq!(h.clipboard.copied(), vec!["K7PQ2M9XWT".to_string()]);
    assert_eq!(h.controller.snapshot().total_count, 1);
    assert_eq!(h.camera.live_streams(), 0);
}

#[tokio::test]
async fn manual_entry_of_known_code_is_a_duplicate() {
    let h = HarnessBuilder::new()
        .store(FakeStore::with_codes(&["X1"]))
        .build()
        .await;

    assert!(h.controller.submit_code("X1").await);
    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.state, ScanState::Found);
    assert_eq!(snapshot.outcome, Some(FoundOutcome::Duplicate));
    assert_eq!(snapshot.banner_message.as_deref(), Some("Already scanned: X1"));
    assert_eq!(
        snapshot.last_candidate.map(|c| c.source),
        Some(CandidateSource::Manual)
    );

    h.controller.settle().await;
    assert!(h.store.inserted().is_empty());
}

#[tokio::test]
async fn manual_entry_strips_whitespace_and_reads_urls() {
    let h = HarnessBuilder::new().build().await;

    assert!(h.controller.submit_code(" AbC123 xYz789\n").await);
    assert_eq!(
        h.controller.snapshot().last_candidate.map(|c| c.code),
        Some("AbC123xYz789".to_string())
    );

    assert!(h.controller.submit_code("www.example.com/redeem?code=Z8L2WT4R9Q").await);
    assert_eq!(
        h.controller.snapshot().last_candidate.map(|c| c.code),
        Some("Z8L2WT4R9Q".to_string())
    );

    h.controller.settle().await;
    let stored: Vec<String> = h.store.inserted().into_iter().map(|(code, _)| code).collect();
    assert_eq!(stored, vec!["AbC123xYz789".to_string(), "Z8L2WT4R9Q".to_string()]);
    assert_eq!(h.controller.snapshot().total_count, 2);
}

#[tokio::test]
async fn url_without_code_reports_error() {
    let h = HarnessBuilder::new().build().await;

    assert!(!h.controller.submit_code("https://example.com/about").await);
    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.state, ScanState::Idle);
    assert_eq!(
        snapshot.status_message.as_deref(),
        Some("No product code found in the URL path")
    );
    assert_eq!(snapshot.status_kind, StatusKind::Error);
    assert!(!h.controller.submit_code("   ").await);
}

#[tokio::test]
async fn lookup_failure_counts_as_new() {
    let h = HarnessBuilder::new()
        .store(FakeStore::failing_lookups())
        .build()
        .await;

    assert!(h.controller.submit_code("K7PQ2M9XWT").await);
    assert_eq!(h.controller.snapshot().outcome, Some(FoundOutcome::New));
    h.controller.settle().await;
    assert_eq!(h.store.inserted().len(), 1);
}

#[tokio::test]
async fn stop_while_requesting_releases_late_stream() {
    let h = HarnessBuilder::new()
        .camera(camera().with_open_delay(Duration::from_millis(150)))
        .build()
        .await;

    let (started, _) = tokio::join!(h.controller.start(), async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(h.controller.state(), ScanState::Requesting);
        h.controller.stop();
    });

    assert!(started.is_ok());
    assert_eq!(h.controller.state(), ScanState::Idle);
    assert_eq!(h.camera.streams_opened(), 1);
    assert_eq!(h.camera.streams_released(), 1);
    assert_eq!(h.controller.active_task_count(), 0);
    assert!(!h.controller.has_capture());
}

fn slow_to_report_dimensions() -> HarnessBuilder {
    HarnessBuilder::new()
        .camera(camera().without_track_settings().with_warmup_frames(100_000))
        .settings(|s| {
            s.dimension_wait_attempts = 50;
            s.dimension_wait_interval_ms = 20;
        })
}

#[tokio::test]
async fn stop_while_waiting_for_dimensions_releases_stream() {
    let h = slow_to_report_dimensions().build().await;

    let (started, _) = tokio::join!(h.controller.start(), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(h.controller.state(), ScanState::Requesting);
        h.controller.stop();
        assert_eq!(h.camera.live_streams(), 0);
    });

    assert!(started.is_ok());
    assert_eq!(h.controller.state(), ScanState::Idle);
    assert_eq!(h.camera.streams_opened(), 1);
    assert_eq!(h.camera.streams_released(), 1);
    assert_eq!(h.controller.active_task_count(), 0);
    assert!(!h.controller.has_capture());
}

#[tokio::test]
async fn abandoned_start_releases_stream() {
    let h = slow_to_report_dimensions().build().await;

    let outcome = tokio::time::timeout(Duration::from_millis(100), h.controller.start()).await;
    assert!(outcome.is_err());
    assert_eq!(h.camera.streams_opened(), 1);
    assert_eq!(h.camera.live_streams(), 0);
    assert_eq!(h.controller.state(), ScanState::Idle);

    h.controller.stop();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(h.camera.streams_released(), 1);
    assert_eq!(h.controller.active_task_count(), 0);
}

#[tokio::test]
async fn stop_while_active_is_idempotent() {
    let h = HarnessBuilder::new().build().await;

    h.controller.start().await.expect("start");
    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.state, ScanState::Active);
    assert_eq!(
        snapshot.status_message.as_deref(),
        Some("Camera active - align code under QR in window")
    );
    assert_eq!(snapshot.resolution_label, "0.3MP");
    assert!(h.controller.has_capture());
    assert!(h.controller.active_task_count() >= 1);

    h.controller.stop();
    assert_eq!(h.controller.state(), ScanState::Idle);
    assert_eq!(h.controller.active_task_count(), 0);
    assert_eq!(h.camera.streams_released(), 1);

    h.controller.stop();
    assert_eq!(h.camera.streams_released(), 1);
    assert_eq!(h.camera.live_streams(), 0);
}

#[tokio::test]
async fn stop_after_found_keeps_the_candidate() {
    let h = HarnessBuilder::new()
        .printed(FixedRecognizer::new("K7PQ2M9XWT"))
        .build()
        .await;
    let mut rx = h.controller.subscribe();

    h.controller.start().await.expect("start");
    wait_for(&mut rx, |s| s.state == ScanState::Found).await;

    h.controller.stop();
    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.state, ScanState::Idle);
    assert!(snapshot.last_candidate.is_some());
    assert_eq!(h.controller.active_task_count(), 0);
    assert_eq!(h.camera.streams_released(), 1);
}

#[tokio::test]
async fn reset_clears_and_restarts() {
    let h = HarnessBuilder::new().build().await;
    assert!(h.controller.submit_code("K7PQ2M9XWT").await);

    h.controller.reset().await.expect("reset");
    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.state, ScanState::Active);
    assert!(snapshot.last_candidate.is_none());
    assert!(snapshot.outcome.is_none());
    assert!(h.controller.has_capture());
    h.controller.stop();
}

#[tokio::test]
async fn restarting_tears_down_the_previous_session() {
    let h = HarnessBuilder::new().build().await;

    h.controller.start().await.expect("first start");
    h.controller.start().await.expect("second start");
    assert_eq!(h.camera.streams_opened(), 2);
    assert_eq!(h.camera.streams_released(), 1);
    assert_eq!(h.camera.live_streams(), 1);

    h.controller.stop();
    assert_eq!(h.camera.live_streams(), 0);
}

#[tokio::test]
async fn dropping_the_controller_releases_the_camera() {
    let h = HarnessBuilder::new().build().await;
    h.controller.start().await.expect("start");
    assert_eq!(h.camera.live_streams(), 1);

    let camera = h.camera.clone();
    drop(h);
    assert_eq!(camera.live_streams(), 0);
}

#[tokio::test]
async fn insecure_origin_is_refused() {
    let h = HarnessBuilder::new()
        .settings(|s| s.origin = "http://192.168.1.20:5173".into())
        .build()
        .await;

    assert_eq!(h.controller.start().await, Err(ScanError::InsecureContext));
    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.state, ScanState::Idle);
    assert_eq!(
        snapshot.status_message.as_deref(),
        Some("Camera requires HTTPS. Use your tunnel link.")
    );
    assert_eq!(h.camera.streams_opened(), 0);
}

#[tokio::test]
async fn unsupported_backend_is_refused() {
    let h = HarnessBuilder::new()
        .camera(camera().unsupported())
        .build()
        .await;

    assert_eq!(h.controller.start().await, Err(ScanError::CaptureUnsupported));
    assert_eq!(h.controller.state(), ScanState::Idle);
}

#[tokio::test]
async fn permission_denial_is_reported() {
    let h = HarnessBuilder::new()
        .camera(camera().with_open_fault(CaptureFault::PermissionDenied("NotAllowedError".into())))
        .build()
        .await;

    let err = h.controller.start().await.expect_err("denied");
    assert!(matches!(err, ScanError::PermissionDenied(_)));
    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.state, ScanState::Idle);
    assert_eq!(snapshot.status_kind, StatusKind::Error);
    assert_eq!(h.camera.live_streams(), 0);
}

#[tokio::test]
async fn rear_camera_is_requested_when_labelled() {
    let h = HarnessBuilder::new()
        .camera(camera().with_devices(vec![
            DeviceInfo::new("cam-front", "FaceTime HD Camera"),
            DeviceInfo::new("cam-back", "Back Ultra Wide Camera"),
        ]))
        .build()
        .await;
    h.controller.start().await.expect("start");
    h.controller.stop();

    let h2 = HarnessBuilder::new()
        .camera(camera().with_devices(Vec::new()))
        .build()
        .await;
    h2.controller.start().await.expect("start");
    h2.controller.stop();

    assert_eq!(
        h.camera.requests(),
        vec![StreamRequest::Device("cam-back".into())]
    );
    assert_eq!(
        h2.camera.requests(),
        vec![StreamRequest::Facing(FacingMode::Environment)]
    );
}

#[tokio::test]
async fn silent_stream_falls_back_to_default_dimensions() {
    let h = HarnessBuilder::new()
        .camera(camera().without_track_settings().with_warmup_frames(1000))
        .build()
        .await;

    h.controller.start().await.expect("start");
    assert_eq!(
        h.controller.native_dimensions(),
        Some(Dimensions::new(1280, 720))
    );
    h.controller.stop();
}

#[tokio::test]
async fn capabilities_label_a_stream_without_settings() {
    let h = HarnessBuilder::new()
        .camera(
            camera()
                .without_track_settings()
                .with_warmup_frames(1000)
                .with_capabilities(Dimensions::new(1920, 1080)),
        )
        .build()
        .await;

    h.controller.start().await.expect("start");
    assert_eq!(h.controller.snapshot().resolution_label, "2.1MP");
    h.controller.stop();
}

#[tokio::test]
async fn resolution_label_follows_settling_dimensions() {
    let h = HarnessBuilder::new()
        .settings(|s| {
            s.sample_interval_ms = 60_000;
            s.resolution_poll_interval_ms = 20;
            s.resolution_poll_limit = 30;
        })
        .build()
        .await;
    let mut rx = h.controller.subscribe();

    h.controller.start().await.expect("start");
    assert_eq!(h.controller.snapshot().resolution_label, "0.3MP");

    tokio::time::sleep(Duration::from_millis(60)).await;
    h.camera.show(RgbaImage::new(1920, 1080));
    let settled = wait_for(&mut rx, |s| s.resolution_label == "2.1MP").await;
    assert_eq!(settled.state, ScanState::Active);
    h.controller.stop();
}

#[tokio::test]
async fn only_one_cycle_runs_at_a_time() {
    let h = HarnessBuilder::new()
        .settings(|s| s.sample_interval_ms = 5)
        .printed(FixedRecognizer::slow("no code here", Duration::from_millis(60)))
        .build()
        .await;

    h.controller.start().await.expect("start");
    tokio::time::sleep(Duration::from_millis(400)).await;
    h.controller.stop();

    assert!(h.recognizer.calls() >= 2);
    assert_eq!(h.recognizer.max_running(), 1);
}

#[tokio::test]
async fn success_banner_hides_itself() {
    let h = HarnessBuilder::new()
        .settings(|s| s.banner_hide_ms = 50)
        .build()
        .await;
    let mut rx = h.controller.subscribe();

    assert!(h.controller.submit_code("K7PQ2M9XWT").await);
    assert_eq!(
        h.controller.snapshot().banner_message.as_deref(),
        Some("Found: K7PQ2M9XWT")
    );

    let hidden = wait_for(&mut rx, |s| s.banner_message.is_none()).await;
    assert_eq!(hidden.state, ScanState::Found);
    assert_eq!(hidden.status_message.as_deref(), Some("Code found! Copied to clipboard."));
}
