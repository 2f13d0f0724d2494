#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use codescan::capture::StillCamera;
use codescan::detect::{StructuredDecoder, TextRecognizer};
use codescan::geometry::{DisplayRect, StaticLayout};
use codescan::platform::{Chime, Clipboard};
use codescan::{CodeRecord, CodeStore, ScanController, ScanSnapshot, ScannerDependencies, ScannerSettings};
use image::{GrayImage, Rgba, RgbaImage};
use tokio::sync::watch;

pub fn fast_settings() -> ScannerSettings {
    ScannerSettings {
        sample_interval_ms: 20,
        resolution_poll_interval_ms: 10,
        resolution_poll_limit: 5,
        dimension_wait_attempts: 3,
        dimension_wait_interval_ms: 5,
        cycle_timeout_secs: 5,
        banner_hide_ms: 60_000,
        origin: "https://scan.test".into(),
        owner_id: Some("owner-1".into()),
        chime_enabled: false,
        ..ScannerSettings::default()
    }
}

pub fn camera() -> StillCamera {
    StillCamera::new(RgbaImage::from_pixel(640, 480, Rgba([180, 180, 180, 255])))
}

pub fn layout() -> Arc<StaticLayout> {
    Arc::new(StaticLayout::new(
        DisplayRect::new(0.0, 0.0, 300.0, 500.0),
        DisplayRect::new(100.0, 150.0, 100.0, 100.0),
    ))
}

#[derive(Default)]
pub struct FakeStore {
    existing: Mutex<Vec<String>>,
    inserted: Mutex<Vec<(String, Option<String>)>>,
    fail_lookups: bool,
}

impl FakeStore {
    pub fn with_codes(codes: &[&str]) -> Self {
        Self {
            existing: Mutex::new(codes.iter().map(|c| c.to_string()).collect()),
            ..Self::default()
        }
    }

    pub fn failing_lookups() -> Self {
        Self {
            fail_lookups: true,
            ..Self::default()
        }
    }

    pub fn inserted(&self) -> Vec<(String, Option<String>)> {
        self.inserted.lock().unwrap().clone()
    }
}

#[async_trait]
impl CodeStore for FakeStore {
    async fn find_by_code(&self, code: &str) -> Result<Option<CodeRecord>> {
        if self.fail_lookups {
            return Err(anyhow!("store offline"));
        }
        let known = self.existing.lock().unwrap().iter().any(|c| c == code);
        Ok(known.then(|| CodeRecord::new(code, None)))
    }

    async fn insert(&self, code: &str, owner_id: Option<&str>) -> Result<CodeRecord> {
        self.existing.lock().unwrap().push(code.to_string());
        self.inserted
            .lock()
            .unwrap()
            .push((code.to_string(), owner_id.map(str::to_string)));
        Ok(CodeRecord::new(code, owner_id.map(str::to_string)))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.existing.lock().unwrap().len() as u64)
    }
}

#[derive(Default)]
pub struct RecordingClipboard {
    copied: Mutex<Vec<String>>,
}

impl RecordingClipboard {
    pub fn copied(&self) -> Vec<String> {
        self.copied.lock().unwrap().clone()
    }
}

impl Clipboard for RecordingClipboard {
    fn copy_text(&self, text: &str) -> Result<()> {
        self.copied.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct CountingChime {
    played: AtomicUsize,
}

impl CountingChime {
    pub fn played(&self) -> usize {
        self.played.load(Ordering::SeqCst)
    }
}

impl Chime for CountingChime {
    fn play_confirmation(&self) -> Result<()> {
        self.played.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Decoder returning a fixed payload for every crop.
pub struct FixedDecoder(pub Option<&'static str>);

impl StructuredDecoder for FixedDecoder {
    fn decode(&self, _pixels: &RgbaImage) -> Option<String> {
        self.0.map(str::to_string)
    }
}

/// Recognizer returning fixed text, optionally after a delay, and recording
/// how many calls overlapped.
pub struct FixedRecognizer {
    text: &'static str,
    delay: Duration,
    running: AtomicUsize,
    max_running: AtomicUsize,
    calls: AtomicUsize,
}

impl FixedRecognizer {
    pub fn new(text: &'static str) -> Self {
        Self::slow(text, Duration::ZERO)
    }

    pub fn slow(text: &'static str, delay: Duration) -> Self {
        Self {
            text,
            delay,
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextRecognizer for FixedRecognizer {
    async fn recognize(&self, _image: &GrayImage) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(self.text.to_string())
    }
}

pub struct Harness {
    pub controller: ScanController,
    pub camera: Arc<StillCamera>,
    pub store: Arc<FakeStore>,
    pub clipboard: Arc<RecordingClipboard>,
    pub chime: Arc<CountingChime>,
    pub recognizer: Arc<FixedRecognizer>,
}

pub struct HarnessBuilder {
    camera: StillCamera,
    store: FakeStore,
    decoder: FixedDecoder,
    recognizer: FixedRecognizer,
    settings: ScannerSettings,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            camera: camera(),
            store: FakeStore::default(),
            decoder: FixedDecoder(None),
            recognizer: FixedRecognizer::new(""),
            settings: fast_settings(),
        }
    }

    pub fn camera(mut self, camera: StillCamera) -> Self {
        self.camera = camera;
        self
    }

    pub fn store(mut self, store: FakeStore) -> Self {
        self.store = store;
        self
    }

    pub fn decoded(mut self, payload: &'static str) -> Self {
        self.decoder = FixedDecoder(Some(payload));
        self
    }

    pub fn printed(mut self, recognizer: FixedRecognizer) -> Self {
        self.recognizer = recognizer;
        self
    }

    pub fn settings(mut self, apply: impl FnOnce(&mut ScannerSettings)) -> Self {
        apply(&mut self.settings);
        self
    }

    pub async fn build(self) -> Harness {
        let camera = Arc::new(self.camera);
        let store = Arc::new(self.store);
        let clipboard = Arc::new(RecordingClipboard::default());
        let chime = Arc::new(CountingChime::default());
        let recognizer = Arc::new(self.recognizer);

        let deps = ScannerDependencies::new(camera.clone(), layout(), &self.settings)
            .with_store(store.clone())
            .with_decoder(Arc::new(self.decoder))
            .with_recognizer(recognizer.clone())
            .with_clipboard(clipboard.clone())
            .with_chime(chime.clone());

        Harness {
            controller: ScanController::new(deps, self.settings).await,
            camera,
            store,
            clipboard,
            chime,
            recognizer,
        }
    }
}

/// Waits until the published snapshot satisfies `predicate`.
pub async fn wait_for(
    rx: &mut watch::Receiver<ScanSnapshot>,
    predicate: impl FnMut(&ScanSnapshot) -> bool,
) -> ScanSnapshot {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(predicate))
        .await
        .expect("timed out waiting for scanner state")
        .expect("scanner dropped")
        .clone()
}
