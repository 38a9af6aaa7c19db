use crate::session::{Progress, Session};
use anyhow::{anyhow, Result};
use log::{debug, error, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Progress messages buffered before the worker starts dropping them.
const PROGRESS_BACKLOG: usize = 64;

/// Timed playback of a [`Session`] on a worker thread.
///
/// The worker only ever touches the session under its lock, and the lock is
/// released between steps, so readers on other threads always observe whole
/// timesteps.
pub struct Player {
    session: Arc<Mutex<Session>>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    progress_tx: SyncSender<Progress>,
    progress_rx: Receiver<Progress>,
}

impl Player {
    pub fn new(session: Session) -> Self {
        let (progress_tx, progress_rx) = mpsc::sync_channel(PROGRESS_BACKLOG);
        Self {
            session: Arc::new(Mutex::new(session)),
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
            progress_tx,
            progress_rx,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Session>> {
        self.session
            .lock()
            .map_err(|_| anyhow!("Session lock poisoned by a failed playback step"))
    }

    pub fn is_playing(&self) -> bool {
        self.worker.is_some() && self.running.load(Ordering::Acquire)
    }

    /// Starts stepping every `interval`. Returns false when already playing
    /// or when some lane is missing its location or disease.
    pub fn play(&mut self, interval: Duration) -> Result<bool> {
        if self.is_playing() {
            return Ok(false);
        }
        // A worker that stopped on its own still needs joining.
        self.join_worker()?;
        if !self.lock()?.is_runnable() {
            info!("Playback not started: every lane needs a location and a disease.");
            return Ok(false);
        }

        self.running.store(true, Ordering::Release);
        let session = Arc::clone(&self.session);
        let running = Arc::clone(&self.running);
        let progress_tx = self.progress_tx.clone();
        let handle = thread::Builder::new()
            .name("playback".to_string())
            .spawn(move || playback_loop(session, running, progress_tx, interval))?;
        self.worker = Some(handle);
        info!("Playback started ({} ms per timestep).", interval.as_millis());
        Ok(true)
    }

    /// Stops playback and waits for the in-flight step to finish.
    pub fn pause(&mut self) -> Result<()> {
        if self.worker.is_some() {
            self.running.store(false, Ordering::Release);
            self.join_worker()?;
            info!("Playback paused.");
        }
        Ok(())
    }

    fn join_worker(&mut self) -> Result<()> {
        if let Some(handle) = self.worker.take() {
            handle
                .join()
                .map_err(|_| anyhow!("Playback worker panicked"))?;
        }
        Ok(())
    }

    /// Progress published by the worker after each step. Messages are dropped
    /// rather than blocking the worker when nobody drains this.
    pub fn progress(&self) -> &Receiver<Progress> {
        &self.progress_rx
    }

    /// Viewed and loaded timesteps as of now.
    pub fn snapshot(&self) -> Result<Progress> {
        let progress = self.lock()?.progress();
        Ok(progress)
    }

    /// Runs `f` against the session while holding its lock.
    pub fn with_session<R>(&self, f: impl FnOnce(&mut Session) -> R) -> Result<R> {
        let mut session = self.lock()?;
        Ok(f(&mut session))
    }

    /// Single manual step. Only honoured while paused.
    pub fn step(&mut self) -> Result<bool> {
        if self.is_playing() {
            return Ok(false);
        }
        let stepped = self.lock()?.step_forward();
        Ok(stepped)
    }

    pub fn step_back(&mut self) -> Result<()> {
        self.pause()?;
        self.lock()?.step_back();
        Ok(())
    }

    pub fn first(&mut self) -> Result<()> {
        self.pause()?;
        self.lock()?.first();
        Ok(())
    }

    /// Jumps to the newest computed timestep.
    pub fn last(&mut self) -> Result<()> {
        self.pause()?;
        self.lock()?.last();
        Ok(())
    }

    pub fn reset(&mut self) -> Result<()> {
        self.pause()?;
        self.lock()?.reset();
        Ok(())
    }

    /// Stops playback and hands the session back.
    pub fn into_session(mut self) -> Result<Session> {
        self.pause()?;
        let session = Arc::clone(&self.session);
        drop(self);
        let session = Arc::try_unwrap(session)
            .map_err(|_| anyhow!("Session still shared with a playback worker"))?;
        session
            .into_inner()
            .map_err(|_| anyhow!("Session lock poisoned by a failed playback step"))
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                error!("Playback worker panicked during shutdown.");
            }
        }
    }
}

fn playback_loop(
    session: Arc<Mutex<Session>>,
    running: Arc<AtomicBool>,
    progress_tx: SyncSender<Progress>,
    interval: Duration,
) {
    while running.load(Ordering::Acquire) {
        let progress = match session.lock() {
            Ok(mut session) => {
                session.step_forward();
                session.progress()
            }
            Err(_) => {
                error!("Session lock poisoned; stopping playback.");
                break;
            }
        };
        match progress_tx.try_send(progress) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                debug!("Progress receiver is behind; dropped timestep {}.", progress.viewed);
            }
            // The player owns the receiver, so this only happens while it is being torn down.
            Err(TrySendError::Disconnected(_)) => break,
        }
        thread::sleep(interval);
    }
    running.store(false, Ordering::Release);
}
