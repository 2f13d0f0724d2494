//! Host integrations the scanner talks to: clipboard, confirmation sound,
//! secure-origin policy, plus the bundle that injects every seam.

use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use url::Url;

use crate::capture::CaptureBackend;
use crate::detect::{QrDecoder, StructuredDecoder, TesseractCli, TextRecognizer};
use crate::geometry::GeometryProvider;
use crate::settings::ScannerSettings;
use crate::store::CodeStore;

/// Abstraction over copying an accepted code to the system clipboard.
pub trait Clipboard: Send + Sync {
    fn copy_text(&self, text: &str) -> Result<()>;
}

/// Abstraction over the short confirmation sound.
pub trait Chime: Send + Sync {
    fn play_confirmation(&self) -> Result<()>;
}

/// Clipboard backed by the platform's command-line helpers.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

struct ClipboardHelper {
    program: &'static str,
    args: &'static [&'static str],
}

#[cfg(target_os = "macos")]
const CLIPBOARD_HELPERS: &[ClipboardHelper] = &[ClipboardHelper {
    program: "pbcopy",
    args: &[],
}];

#[cfg(target_os = "windows")]
const CLIPBOARD_HELPERS: &[ClipboardHelper] = &[ClipboardHelper {
    program: "clip",
    args: &[],
}];

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const CLIPBOARD_HELPERS: &[ClipboardHelper] = &[
    ClipboardHelper {
        program: "wl-copy",
        args: &[],
    },
    ClipboardHelper {
        program: "xclip",
        args: &["-selection", "clipboard"],
    },
    ClipboardHelper {
        program: "xsel",
        args: &["--clipboard", "--input"],
    },
];

impl SystemClipboard {
    fn pipe_to(program: &str, args: &[&str], text: &str) -> Result<()> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;

        child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("{program} stdin unavailable"))?
            .write_all(text.as_bytes())
            .with_context(|| format!("failed to write to {program}"))?;

        let status = child
            .wait()
            .with_context(|| format!("{program} did not finish"))?;
        if !status.success() {
            bail!("{program} exited with {status}");
        }
        Ok(())
    }
}

impl Clipboard for SystemClipboard {
    fn copy_text(&self, text: &str) -> Result<()> {
        let mut last_err = None;
        for helper in CLIPBOARD_HELPERS {
            match Self::pipe_to(helper.program, helper.args, text) {
                Ok(()) => return Ok(()),
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow!("no clipboard helper available")))
    }
}

/// Chime that stays quiet.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentChime;

impl Chime for SilentChime {
    fn play_confirmation(&self) -> Result<()> {
        Ok(())
    }
}

/// Whether camera access may be requested from `origin`.
///
/// Only `https` origins and loopback hosts qualify.
pub fn is_secure_origin(origin: &str) -> bool {
    let Ok(parsed) = Url::parse(origin.trim()) else {
        return false;
    };
    if parsed.scheme() == "https" {
        return true;
    }
    matches!(parsed.host_str(), Some("localhost") | Some("127.0.0.1"))
}

/// Bundle of collaborators used by the scan orchestrator. Each one can be
/// swapped for a fake in tests.
#[derive(Clone)]
pub struct ScannerDependencies {
    pub camera: Arc<dyn CaptureBackend>,
    pub geometry: Arc<dyn GeometryProvider>,
    pub decoder: Arc<dyn StructuredDecoder>,
    pub recognizer: Arc<dyn TextRecognizer>,
    pub store: Option<Arc<dyn CodeStore>>,
    pub clipboard: Arc<dyn Clipboard>,
    pub chime: Arc<dyn Chime>,
}

impl ScannerDependencies {
    /// Stock detectors, system clipboard and the default chime around the
    /// given camera and layout. No store is attached.
    pub fn new(
        camera: Arc<dyn CaptureBackend>,
        geometry: Arc<dyn GeometryProvider>,
        settings: &ScannerSettings,
    ) -> Self {
        Self {
            camera,
            geometry,
            decoder: Arc::new(QrDecoder::new()),
            recognizer: Arc::new(TesseractCli::new(settings.tesseract.clone())),
            store: None,
            clipboard: Arc::new(SystemClipboard),
            chime: default_chime(settings.chime_enabled),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn CodeStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn StructuredDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_recognizer(mut self, recognizer: Arc<dyn TextRecognizer>) -> Self {
        self.recognizer = recognizer;
        self
    }

    pub fn with_clipboard(mut self, clipboard: Arc<dyn Clipboard>) -> Self {
        self.clipboard = clipboard;
        self
    }

    pub fn with_chime(mut self, chime: Arc<dyn Chime>) -> Self {
        self.chime = chime;
        self
    }
}

#[cfg(feature = "chime")]
fn default_chime(enabled: bool) -> Arc<dyn Chime> {
    if enabled {
        Arc::new(crate::audio::ChimeEngine::new())
    } else {
        Arc::new(SilentChime)
    }
}

#[cfg(not(feature = "chime"))]
fn default_chime(_enabled: bool) -> Arc<dyn Chime> {
    Arc::new(SilentChime)
}
