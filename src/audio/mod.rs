pub mod tone;

pub use tone::ConfirmationTone;

#[cfg(feature = "chime")]
pub use engine::ChimeEngine;

#[cfg(feature = "chime")]
mod engine {
    use std::sync::{
        mpsc::{self, Sender},
        Arc, Mutex,
    };
    use std::thread;

    use anyhow::{anyhow, Result};
    use rodio::{OutputStream, Sink};

    use super::ConfirmationTone;
    use crate::platform::Chime;

    enum ChimeCommand {
        Play,
        Shutdown,
    }

    /// Plays the confirmation tone on a dedicated audio thread.
    ///
    /// The output device is opened lazily on the first chime, so hosts
    /// without audio hardware only fail when a tone is actually requested.
    pub struct ChimeEngine {
        tx: Arc<Mutex<Option<Sender<ChimeCommand>>>>,
    }

    impl ChimeEngine {
        pub fn new() -> Self {
            Self {
                tx: Arc::new(Mutex::new(None)),
            }
        }

        fn ensure_thread(&self) -> Result<Sender<ChimeCommand>> {
            let mut guard = self.tx.lock().map_err(|e| anyhow!(e.to_string()))?;
            if let Some(tx) = guard.as_ref() {
                return Ok(tx.clone());
            }

            let (tx, rx) = mpsc::channel::<ChimeCommand>();

            // rodio output objects are not Send; they live and die on this thread
            thread::Builder::new()
                .name("chime-engine".to_string())
                .spawn(move || {
                    let mut _stream: Option<OutputStream> = None;
                    let mut sink: Option<Sink> = None;

                    fn ensure_sink(
                        stream: &mut Option<OutputStream>,
                        sink: &mut Option<Sink>,
                    ) -> Result<(), String> {
                        if sink.is_none() {
                            let (s, handle) = OutputStream::try_default().map_err(|e| {
                                format!("Failed to create audio output stream: {}", e)
                            })?;
                            let new_sink = Sink::try_new(&handle)
                                .map_err(|e| format!("Failed to create audio sink: {}", e))?;
                            *stream = Some(s);
                            *sink = Some(new_sink);
                        }
                        Ok(())
                    }

                    while let Ok(cmd) = rx.recv() {
                        match cmd {
                            ChimeCommand::Play => {
                                if let Err(err) = ensure_sink(&mut _stream, &mut sink) {
                                    log::debug!("chime unavailable: {err}");
                                    continue;
                                }
                                if let Some(ref s) = sink {
                                    s.append(ConfirmationTone::new());
                                    s.play();
                                }
                            }
                            ChimeCommand::Shutdown => {
                                if let Some(s_old) = sink.take() {
                                    s_old.stop();
                                }
                                break;
                            }
                        }
                    }
                })
                .map_err(|e| anyhow!("failed to spawn chime thread: {e}"))?;

            *guard = Some(tx.clone());
            Ok(tx)
        }
    }

    impl Default for ChimeEngine {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Chime for ChimeEngine {
        fn play_confirmation(&self) -> Result<()> {
            let tx = self.ensure_thread()?;
            tx.send(ChimeCommand::Play)
                .map_err(|e| anyhow!("chime thread gone: {e}"))
        }
    }

    impl Drop for ChimeEngine {
        fn drop(&mut self) {
            if let Ok(Some(tx)) = self.tx.lock().map(|mut g| g.take()) {
                let _ = tx.send(ChimeCommand::Shutdown);
            }
        }
    }
}
