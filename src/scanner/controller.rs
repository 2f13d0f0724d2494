use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard, Weak,
};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::capture::{estimate, CaptureStream, Dimensions, ResolutionSources, StreamRequest};
use crate::platform::{is_secure_origin, ScannerDependencies};
use crate::settings::ScannerSettings;
use crate::validation::{extract_code_from_url, looks_like_url};

use super::cycle::scan_frame;
use super::error::ScanError;
use super::session::ScanSession;
use super::state::{Candidate, CandidateSource, FoundOutcome, ScanSnapshot, ScanState, StatusKind};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

const STATUS_REQUESTING: &str = "Requesting camera access...";
const STATUS_ACTIVE: &str = "Camera active - align code under QR in window";
const BANNER_SCANNING: &str = "Scanning for code under QR...";
const STATUS_NEW_CODE: &str = "Code found! Copied to clipboard.";
const STATUS_DUPLICATE: &str = "This code was already scanned.";
const BANNER_URL: &str = "Found URL! Extracting code...";
const STATUS_NO_CODE_IN_URL: &str = "No product code found in the URL path";
const BANNER_COPIED: &str = "Copied to clipboard";

/// Longest manual entry sent straight to the duplicate check.
const MANUAL_CODE_MAX_LEN: usize = 40;
const MANUAL_CODE_MIN_LEN: usize = 6;

struct Inner {
    snapshot: ScanSnapshot,
    session: Option<ScanSession>,
    /// Stream opened by a start that is still waiting for dimensions.
    opening: Option<Arc<dyn CaptureStream>>,
    generation: u64,
    banner_epoch: u64,
}

struct Shared {
    inner: Mutex<Inner>,
    snapshot_tx: watch::Sender<ScanSnapshot>,
    deps: ScannerDependencies,
    settings: ScannerSettings,
    follow_ups: Mutex<Vec<JoinHandle<()>>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn publish(&self, inner: &Inner) {
        self.snapshot_tx.send_replace(inner.snapshot.clone());
    }

    fn update(&self, apply: impl FnOnce(&mut Inner)) {
        let mut inner = self.lock();
        apply(&mut inner);
        self.publish(&inner);
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock().generation == generation
    }

    fn session_stream(&self, generation: u64) -> Option<Arc<dyn CaptureStream>> {
        let inner = self.lock();
        inner
            .session
            .as_ref()
            .filter(|session| session.generation() == generation && !session.is_closed())
            .map(|session| Arc::clone(session.stream()))
    }

    /// Tears down the current session and supersedes any pending start.
    fn close_session(inner: &mut Inner) {
        inner.generation = inner.generation.wrapping_add(1);
        if let Some(stream) = inner.opening.take() {
            log_info!("releasing camera stream of an unfinished start");
            stream.stop();
        }
        if let Some(mut session) = inner.session.take() {
            log_info!("closing scan session generation {}", session.generation());
            session.close();
        }
    }

    /// Publishes the label only when it changed.
    fn refresh_resolution(&self, generation: u64, stream: &dyn CaptureStream) {
        let resolution = estimate(&ResolutionSources::from_stream(stream));

        let mut inner = self.lock();
        if inner.generation != generation || inner.snapshot.resolution_label == resolution.label {
            return;
        }
        inner.snapshot.resolution_label = resolution.label;
        self.publish(&inner);
    }

    async fn is_duplicate(&self, code: &str) -> bool {
        let Some(store) = self.deps.store.as_ref() else {
            return false;
        };
        match store.find_by_code(code).await {
            Ok(existing) => existing.is_some(),
            Err(err) => {
                log_warn!("duplicate lookup failed for {code}, treating as new: {err:#}");
                false
            }
        }
    }

    fn track_follow_up(&self, handle: JoinHandle<()>) {
        let mut pending = match self.follow_ups.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        pending.retain(|handle| !handle.is_finished());
        pending.push(handle);
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let inner = match self.inner.get_mut() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        Shared::close_session(inner);
    }
}

/// Drives the scan lifecycle: camera session, periodic sampling, duplicate
/// check and the observable [`ScanSnapshot`].
///
/// Dropping the controller releases the camera and cancels every periodic
/// task.
pub struct ScanController {
    shared: Arc<Shared>,
}

impl ScanController {
    /// Builds an idle controller and loads the stored code count.
    pub async fn new(deps: ScannerDependencies, settings: ScannerSettings) -> Self {
        let mut snapshot = ScanSnapshot::default();
        if let Some(store) = deps.store.as_ref() {
            match store.count().await {
                Ok(count) => snapshot.total_count = count,
                Err(err) => log_warn!("failed to load stored code count: {err:#}"),
            }
        }

        let (snapshot_tx, _) = watch::channel(snapshot.clone());
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    snapshot,
                    session: None,
                    opening: None,
                    generation: 0,
                    banner_epoch: 0,
                }),
                snapshot_tx,
                deps,
                settings,
                follow_ups: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ScanSnapshot> {
        self.shared.snapshot_tx.subscribe()
    }

    pub fn snapshot(&self) -> ScanSnapshot {
        self.shared.lock().snapshot.clone()
    }

    pub fn state(&self) -> ScanState {
        self.shared.lock().snapshot.state
    }

    /// Periodic tasks still running for the current session.
    pub fn active_task_count(&self) -> usize {
        self.shared
            .lock()
            .session
            .as_ref()
            .map(ScanSession::active_tasks)
            .unwrap_or(0)
    }

    /// Whether a live capture stream is currently held.
    pub fn has_capture(&self) -> bool {
        self.shared
            .lock()
            .session
            .as_ref()
            .map(|session| !session.is_closed() && session.stream().is_live())
            .unwrap_or(false)
    }

    /// Native frame size of the current session, if one is open.
    pub fn native_dimensions(&self) -> Option<Dimensions> {
        self.shared
            .lock()
            .session
            .as_ref()
            .map(ScanSession::dimensions)
    }

    /// Opens the camera and starts sampling. Any existing session is torn
    /// down first.
    ///
    /// Returns `Ok(())` as well when a concurrent `stop`/`start` superseded
    /// this call; the stream it opened is released in that case.
    pub async fn start(&self) -> Result<(), ScanError> {
        let generation = {
            let mut inner = self.shared.lock();
            Shared::close_session(&mut inner);
            inner.snapshot.state = ScanState::Requesting;
            inner.snapshot.set_status(STATUS_REQUESTING, StatusKind::Info);
            self.shared.publish(&inner);
            inner.generation
        };

        match self.open_session(generation).await {
            Ok(()) => Ok(()),
            Err(err) => {
                log_warn!("scan start failed: {err:?}");
                self.shared.update(|inner| {
                    if inner.generation == generation {
                        inner.snapshot.state = ScanState::Idle;
                        inner.snapshot.set_status(err.to_string(), StatusKind::Error);
                    }
                });
                Err(err)
            }
        }
    }

    async fn open_session(&self, generation: u64) -> Result<(), ScanError> {
        let settings = &self.shared.settings;
        if !is_secure_origin(&settings.origin) {
            return Err(ScanError::InsecureContext);
        }

        let camera = Arc::clone(&self.shared.deps.camera);
        if !camera.is_supported() {
            return Err(ScanError::CaptureUnsupported);
        }

        let devices = match camera.enumerate_devices().await {
            Ok(devices) => devices,
            Err(err) => {
                log_warn!("device enumeration failed, requesting any rear camera: {err}");
                Vec::new()
            }
        };
        let request = StreamRequest::prefer_rear(&devices);
        log_debug!("opening camera with {:?}", request);

        let pending = PendingStream::new(&self.shared, generation, camera.open(request).await?);
        {
            let mut inner = self.shared.lock();
            if inner.generation != generation {
                log_info!("scan start superseded while opening camera");
                return Ok(());
            }
            inner.opening = Some(Arc::clone(&pending.stream));
        }

        let dimensions = wait_for_dimensions(pending.stream.as_ref(), settings).await;
        self.activate(pending, dimensions);
        Ok(())
    }

    fn activate(&self, pending: PendingStream, dimensions: Dimensions) {
        let settings = &self.shared.settings;
        let generation = pending.generation;
        let resolution = estimate(&ResolutionSources::from_stream(pending.stream.as_ref()));

        let mut inner = self.shared.lock();
        if inner.generation != generation {
            log_info!("scan start superseded before activation");
            drop(inner);
            drop(pending);
            return;
        }
        inner.opening = None;
        let stream = pending.into_stream();

        let mut session = ScanSession::open(generation, stream, dimensions);
        let weak = Arc::downgrade(&self.shared);
        let sampler = tokio::spawn(sampling_loop(
            weak.clone(),
            generation,
            session.cancel_token(),
            session.in_flight(),
            settings.sample_interval(),
            settings.cycle_timeout(),
        ));
        let poll = tokio::spawn(resolution_poll(
            weak,
            generation,
            session.cancel_token(),
            settings.resolution_poll_interval(),
            settings.resolution_poll_limit,
        ));
        session.attach_tasks(sampler, poll);

        inner.session = Some(session);
        inner.snapshot.state = ScanState::Active;
        inner.snapshot.resolution_label = resolution.label;
        inner.snapshot.set_status(STATUS_ACTIVE, StatusKind::Success);
        inner.snapshot.set_banner(BANNER_SCANNING, StatusKind::Info);
        self.shared.publish(&inner);

        log_info!(
            "scan session {} active at {}x{}",
            generation,
            dimensions.width,
            dimensions.height
        );
    }

    /// Stops sampling and releases the camera. Safe to call in any state and
    /// more than once.
    pub fn stop(&self) {
        let mut inner = self.shared.lock();
        let previous = inner.snapshot.state;
        Shared::close_session(&mut inner);
        inner.snapshot.state = ScanState::Idle;
        inner.snapshot.clear_status();
        inner.snapshot.clear_banner();
        self.shared.publish(&inner);
        if previous != ScanState::Idle {
            log_info!("scanner stopped from {}", previous.as_str());
        }
    }

    /// Clears the previous attempt and starts scanning again.
    pub async fn reset(&self) -> Result<(), ScanError> {
        self.shared.update(|inner| {
            inner.snapshot.clear_attempt();
            inner.banner_epoch = inner.banner_epoch.wrapping_add(1);
        });
        self.start().await
    }

    /// Feeds a manually entered or externally scanned string through the same
    /// acceptance flow as a camera detection.
    ///
    /// Returns whether a code was accepted.
    pub async fn submit_code(&self, raw: &str) -> bool {
        let text: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        if text.is_empty() {
            return false;
        }

        let len = text.chars().count();
        let is_plain = (MANUAL_CODE_MIN_LEN..=MANUAL_CODE_MAX_LEN).contains(&len)
            && text.chars().all(|c| c.is_ascii_alphanumeric())
            && !looks_like_url(&text);

        let code = if is_plain {
            text
        } else if looks_like_url(&text) {
            self.shared
                .update(|inner| inner.snapshot.set_banner(BANNER_URL, StatusKind::Info));
            match extract_code_from_url(&text) {
                Some(code) => code,
                None => {
                    self.shared.update(|inner| {
                        inner.snapshot.clear_banner();
                        inner
                            .snapshot
                            .set_status(STATUS_NO_CODE_IN_URL, StatusKind::Error);
                    });
                    return false;
                }
            }
        } else {
            text
        };

        let duplicate = self.shared.is_duplicate(&code).await;
        conclude(
            &self.shared,
            None,
            Candidate::new(code, CandidateSource::Manual),
            duplicate,
        )
    }

    /// Waits for pending clipboard, chime and insert work.
    pub async fn settle(&self) {
        let pending: Vec<JoinHandle<()>> = {
            let mut guard = match self.shared.follow_ups.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.drain(..).collect()
        };
        for handle in pending {
            if let Err(err) = handle.await {
                log_warn!("post-scan task failed: {err}");
            }
        }
    }
}

impl Drop for ScanController {
    fn drop(&mut self) {
        let mut inner = self.shared.lock();
        Shared::close_session(&mut inner);
    }
}

/// Commits the `Found` transition, closes the session and hands the side
/// effects to a detached task.
///
/// `expected_generation` ties a camera result to its session; stale results
/// are dropped and `false` is returned.
fn conclude(
    shared: &Arc<Shared>,
    expected_generation: Option<u64>,
    candidate: Candidate,
    duplicate: bool,
) -> bool {
    let code = candidate.code.clone();
    let epoch = {
        let mut inner = shared.lock();
        if let Some(generation) = expected_generation {
            if inner.generation != generation {
                log_debug!("dropping stale candidate from generation {}", generation);
                return false;
            }
        }

        Shared::close_session(&mut inner);
        inner.snapshot.state = ScanState::Found;
        inner.snapshot.last_candidate = Some(candidate);
        if duplicate {
            inner.snapshot.outcome = Some(FoundOutcome::Duplicate);
            inner.snapshot.set_status(STATUS_DUPLICATE, StatusKind::Error);
            inner
                .snapshot
                .set_banner(format!("Already scanned: {code}"), StatusKind::Error);
        } else {
            inner.snapshot.outcome = Some(FoundOutcome::New);
            inner.snapshot.set_status(STATUS_NEW_CODE, StatusKind::Success);
            inner
                .snapshot
                .set_banner(format!("Found: {code}"), StatusKind::Success);
        }
        inner.banner_epoch = inner.banner_epoch.wrapping_add(1);
        shared.publish(&inner);
        inner.banner_epoch
    };

    log_info!(
        "code {} accepted ({})",
        code,
        if duplicate { "duplicate" } else { "new" }
    );

    let handle = tokio::spawn(finish_acceptance(
        Arc::downgrade(shared),
        epoch,
        shared.deps.clone(),
        shared.settings.owner_id.clone(),
        code,
        duplicate,
    ));
    shared.track_follow_up(handle);

    if !duplicate {
        tokio::spawn(hide_banner_later(
            Arc::downgrade(shared),
            epoch,
            shared.settings.banner_hide_delay(),
        ));
    }

    true
}

async fn finish_acceptance(
    shared: Weak<Shared>,
    epoch: u64,
    deps: ScannerDependencies,
    owner_id: Option<String>,
    code: String,
    duplicate: bool,
) {
    let clipboard = Arc::clone(&deps.clipboard);
    let text = code.clone();
    match tokio::task::spawn_blocking(move || clipboard.copy_text(&text)).await {
        Ok(Ok(())) if !duplicate => {
            if let Some(shared) = shared.upgrade() {
                let mut inner = shared.lock();
                if inner.banner_epoch == epoch && inner.snapshot.banner_message.is_some() {
                    inner.snapshot.set_banner(BANNER_COPIED, StatusKind::Success);
                    shared.publish(&inner);
                }
            }
        }
        Ok(Ok(())) => {}
        Ok(Err(err)) => log_debug!("clipboard copy failed: {err:#}"),
        Err(err) => log_debug!("clipboard worker failed: {err}"),
    }

    if duplicate {
        return;
    }

    if let Err(err) = deps.chime.play_confirmation() {
        log_debug!("confirmation tone failed: {err:#}");
    }

    let Some(store) = deps.store.as_ref() else {
        return;
    };
    match store.insert(&code, owner_id.as_deref()).await {
        Ok(record) => {
            log_info!("stored code {} as {}", record.code, record.id);
            if let Some(shared) = shared.upgrade() {
                shared.update(|inner| inner.snapshot.total_count += 1);
            }
        }
        Err(err) => log_error!("failed to store code {code}: {err:#}"),
    }
}

async fn hide_banner_later(shared: Weak<Shared>, epoch: u64, delay: Duration) {
    tokio::time::sleep(delay).await;
    let Some(shared) = shared.upgrade() else {
        return;
    };
    let mut inner = shared.lock();
    if inner.banner_epoch == epoch && inner.snapshot.banner_message.is_some() {
        inner.snapshot.clear_banner();
        shared.publish(&inner);
    }
}

/// A stream between `open` and activation. Dropped while still armed, as when
/// the `start` future is abandoned, it stops the stream and puts a start it
/// still owns back to `Idle`.
struct PendingStream {
    shared: Weak<Shared>,
    generation: u64,
    stream: Arc<dyn CaptureStream>,
    armed: bool,
}

impl PendingStream {
    fn new(shared: &Arc<Shared>, generation: u64, stream: Arc<dyn CaptureStream>) -> Self {
        Self {
            shared: Arc::downgrade(shared),
            generation,
            stream,
            armed: true,
        }
    }

    fn into_stream(mut self) -> Arc<dyn CaptureStream> {
        self.armed = false;
        Arc::clone(&self.stream)
    }
}

impl Drop for PendingStream {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.stream.stop();

        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let mut inner = shared.lock();
        if inner.generation != self.generation || inner.opening.is_none() {
            return;
        }
        log_info!("scan start abandoned, camera released");
        inner.opening = None;
        inner.snapshot.state = ScanState::Idle;
        inner.snapshot.clear_status();
        inner.snapshot.clear_banner();
        shared.publish(&inner);
    }
}

/// Polls until the stream reports non-zero dimensions, falling back to the
/// configured size.
async fn wait_for_dimensions(stream: &dyn CaptureStream, settings: &ScannerSettings) -> Dimensions {
    for attempt in 0..settings.dimension_wait_attempts {
        let reported = stream
            .track_settings()
            .and_then(Dimensions::non_zero)
            .or_else(|| stream.playback_size().and_then(Dimensions::non_zero));
        if let Some(dimensions) = reported {
            log_debug!("stream dimensions known after {} attempt(s)", attempt + 1);
            return dimensions;
        }
        tokio::time::sleep(settings.dimension_wait_interval()).await;
    }

    let fallback = settings.fallback_dimensions();
    log_warn!(
        "stream reported no dimensions, assuming {}x{}",
        fallback.width,
        fallback.height
    );
    fallback
}

/// Clears the busy flag when a cycle ends, however it ends.
struct InFlightGuard(Arc<AtomicBool>);

impl InFlightGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

async fn sampling_loop(
    shared: Weak<Shared>,
    generation: u64,
    cancel_token: CancellationToken,
    in_flight: Arc<AtomicBool>,
    period: Duration,
    cycle_timeout: Duration,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(_guard) = InFlightGuard::acquire(&in_flight) else {
                    log_debug!("previous cycle still running, skipping tick");
                    continue;
                };
                let Some(shared) = shared.upgrade() else {
                    break;
                };

                match tokio::time::timeout(cycle_timeout, sample_once(&shared, generation)).await {
                    Ok(true) => break,
                    Ok(false) => {}
                    Err(_) => log_warn!("scan cycle timeout (> {:?}) generation {}", cycle_timeout, generation),
                }
            }
            _ = cancel_token.cancelled() => {
                log_debug!("sampling loop for generation {} shutting down", generation);
                break;
            }
        }
    }
}

/// One sampling cycle. Returns `true` once the session is over.
async fn sample_once(shared: &Arc<Shared>, generation: u64) -> bool {
    let Some(stream) = shared.session_stream(generation) else {
        return true;
    };
    shared.refresh_resolution(generation, stream.as_ref());

    let Some(frame) = stream.latest_frame().filter(|frame| frame.has_pixels()) else {
        log_debug!("no frame available yet");
        return false;
    };
    let Some(regions) = shared.deps.geometry.regions(frame.width(), frame.height()) else {
        log_debug!("layout not ready, skipping cycle");
        return false;
    };

    let candidate = scan_frame(
        &frame,
        &regions,
        Arc::clone(&shared.deps.decoder),
        shared.deps.recognizer.as_ref(),
    )
    .await;
    let Some(candidate) = candidate else {
        return false;
    };

    if !shared.is_current(generation) {
        return true;
    }
    let duplicate = shared.is_duplicate(&candidate.code).await;
    conclude(shared, Some(generation), candidate, duplicate);
    true
}

async fn resolution_poll(
    shared: Weak<Shared>,
    generation: u64,
    cancel_token: CancellationToken,
    period: Duration,
    limit: u32,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    for _ in 0..limit {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = cancel_token.cancelled() => return,
        }

        let Some(shared) = shared.upgrade() else {
            return;
        };
        let Some(stream) = shared.session_stream(generation) else {
            return;
        };
        shared.refresh_resolution(generation, stream.as_ref());
    }
    log_debug!("resolution poll for generation {} finished", generation);
}
