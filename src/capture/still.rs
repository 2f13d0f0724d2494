//! Capture backend that serves a still image as a live stream.
//!
//! Used for replaying saved frames through the full pipeline and as the
//! camera stand-in for tests. It keeps counters of opened and released
//! streams so resource handling can be asserted.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex, RwLock,
};
use std::time::Duration;

use async_trait::async_trait;
use image::RgbaImage;

use super::{
    CaptureBackend, CaptureFault, CaptureStream, DeviceInfo, Dimensions, Frame, StreamRequest,
};

#[derive(Default)]
struct StillStats {
    opened: AtomicUsize,
    released: AtomicUsize,
    requests: Mutex<Vec<StreamRequest>>,
}

pub struct StillCamera {
    image: Arc<RwLock<Arc<RgbaImage>>>,
    devices: Vec<DeviceInfo>,
    supported: bool,
    open_fault: Option<CaptureFault>,
    open_delay: Duration,
    warmup_frames: usize,
    report_settings: bool,
    capabilities: Option<Dimensions>,
    stats: Arc<StillStats>,
}

impl StillCamera {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image: Arc::new(RwLock::new(Arc::new(image))),
            devices: vec![DeviceInfo::new("still-0", "Still image (back)")],
            supported: true,
            open_fault: None,
            open_delay: Duration::ZERO,
            warmup_frames: 0,
            report_settings: true,
            capabilities: None,
            stats: Arc::new(StillStats::default()),
        }
    }

    pub fn with_devices(mut self, devices: Vec<DeviceInfo>) -> Self {
        self.devices = devices;
        self
    }

    /// Reports that no capture API exists.
    pub fn unsupported(mut self) -> Self {
        self.supported = false;
        self
    }

    pub fn with_open_fault(mut self, fault: CaptureFault) -> Self {
        self.open_fault = Some(fault);
        self
    }

    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    /// Number of `latest_frame` calls answered with nothing after opening.
    pub fn with_warmup_frames(mut self, frames: usize) -> Self {
        self.warmup_frames = frames;
        self
    }

    /// Hides track settings so the estimator has to fall back.
    pub fn without_track_settings(mut self) -> Self {
        self.report_settings = false;
        self
    }

    pub fn with_capabilities(mut self, max: Dimensions) -> Self {
        self.capabilities = Some(max);
        self
    }

    /// Replaces the image every open stream delivers from now on.
    pub fn show(&self, image: RgbaImage) {
        let mut guard = match self.image.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Arc::new(image);
    }

    pub fn streams_opened(&self) -> usize {
        self.stats.opened.load(Ordering::SeqCst)
    }

    pub fn streams_released(&self) -> usize {
        self.stats.released.load(Ordering::SeqCst)
    }

    pub fn live_streams(&self) -> usize {
        self.streams_opened()
            .saturating_sub(self.streams_released())
    }

    pub fn requests(&self) -> Vec<StreamRequest> {
        match self.stats.requests.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl CaptureBackend for StillCamera {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, CaptureFault> {
        if !self.supported {
            return Err(CaptureFault::NotSupported);
        }
        Ok(self.devices.clone())
    }

    async fn open(&self, request: StreamRequest) -> Result<Arc<dyn CaptureStream>, CaptureFault> {
        if let Ok(mut requests) = self.stats.requests.lock() {
            requests.push(request);
        }

        if !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }

        if let Some(fault) = &self.open_fault {
            return Err(fault.clone());
        }

        self.stats.opened.fetch_add(1, Ordering::SeqCst);

        Ok(Arc::new(StillStream {
            image: Arc::clone(&self.image),
            live: AtomicBool::new(true),
            warmup_left: AtomicUsize::new(self.warmup_frames),
            report_settings: self.report_settings,
            capabilities: self.capabilities,
            stats: Arc::clone(&self.stats),
        }))
    }
}

pub struct StillStream {
    image: Arc<RwLock<Arc<RgbaImage>>>,
    live: AtomicBool,
    warmup_left: AtomicUsize,
    report_settings: bool,
    capabilities: Option<Dimensions>,
    stats: Arc<StillStats>,
}

impl StillStream {
    fn current(&self) -> Arc<RgbaImage> {
        match self.image.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    fn warming_up(&self) -> bool {
        self.warmup_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }
}

impl CaptureStream for StillStream {
    fn latest_frame(&self) -> Option<Frame> {
        if !self.is_live() || self.warming_up() {
            return None;
        }
        Some(Frame {
            image: self.current(),
            captured_at: chrono::Utc::now(),
        })
    }

    fn track_settings(&self) -> Option<Dimensions> {
        if !self.report_settings || !self.is_live() {
            return None;
        }
        let image = self.current();
        Dimensions::new(image.width(), image.height()).non_zero()
    }

    fn capabilities(&self) -> Option<Dimensions> {
        self.capabilities
    }

    fn stop(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            self.stats.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}
