use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::engine::SyncEngine;
use super::error::SyncError;

/// Shortest accepted auto-sync interval (prevents runaway syncing)
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Messages to control the auto-sync loop
#[derive(Debug)]
pub enum AutoSyncMessage {
    /// Run a pass now instead of waiting for the timer
    SyncNow,
    /// Stop the loop
    Shutdown,
}

/// Timer that runs a full pass at a fixed interval.
///
/// Starting it again replaces the running timer; stopping is idempotent and
/// also happens on drop.
pub struct AutoSync {
    engine: Arc<SyncEngine>,
    sender: Option<mpsc::Sender<AutoSyncMessage>>,
    interval: Option<Duration>,
}

impl AutoSync {
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        Self {
            engine,
            sender: None,
            interval: None,
        }
    }

    /// Start the timer, replacing any timer already running
    pub fn start(&mut self, interval: Duration) {
        self.stop();

        let interval = interval.max(MIN_INTERVAL);
        let (tx, rx) = mpsc::channel(8);
        let engine = Arc::clone(&self.engine);

        tokio::spawn(async move {
            auto_sync_loop(engine, interval, rx).await;
        });

        log::info!("Auto-sync started: every {}s", interval.as_secs());
        self.sender = Some(tx);
        self.interval = Some(interval);
    }

    pub fn stop(&mut self) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.try_send(AutoSyncMessage::Shutdown);
            log::info!("Auto-sync stopped");
        }
        self.interval = None;
    }

    /// Ask the running loop for an immediate pass
    pub fn sync_now(&self) -> bool {
        match &self.sender {
            Some(sender) => sender.try_send(AutoSyncMessage::SyncNow).is_ok(),
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.sender.as_ref().map_or(false, |s| !s.is_closed())
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }
}

impl Drop for AutoSync {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_pass(engine: &SyncEngine) {
    match engine.smart_sync().await {
        Ok(_) => {}
        Err(SyncError::Busy) => {
            log::info!("Auto-sync: pass already running, skipped");
        }
        Err(e) => {
            log::error!("Auto-sync: pass failed: {}", e);
        }
    }
}

async fn auto_sync_loop(
    engine: Arc<SyncEngine>,
    interval: Duration,
    mut receiver: mpsc::Receiver<AutoSyncMessage>,
) {
    loop {
        tokio::select! {
            biased;

            msg = receiver.recv() => {
                match msg {
                    Some(AutoSyncMessage::SyncNow) => {
                        log::info!("Auto-sync: immediate pass requested");
                        run_pass(&engine).await;
                    }
                    Some(AutoSyncMessage::Shutdown) | None => {
                        log::debug!("Auto-sync: loop shutting down");
                        break;
                    }
                }
            }

            _ = tokio::time::sleep(interval) => {
                run_pass(&engine).await;
            }
        }
    }
}
