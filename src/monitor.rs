use crate::http::LatestSnapshot;
use crate::metrics::Metrics;
use crate::render::Renderer;
use crate::snapshot::Snapshot;
use crate::snapshot_log::SnapshotLog;
use std::io;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub struct Monitor {
    renderer: Box<dyn Renderer>,
    log: Option<SnapshotLog>,
    exporter: Option<(Arc<Metrics>, LatestSnapshot)>,
}

impl Monitor {
    pub fn new(renderer: Box<dyn Renderer>) -> Self {
        Self {
            renderer,
            log: None,
            exporter: None,
        }
    }

    pub fn with_log(mut self, log: SnapshotLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn with_exporter(mut self, metrics: Arc<Metrics>, latest: LatestSnapshot) -> Self {
        self.exporter = Some((metrics, latest));
        self
    }

    pub async fn consume(&mut self, mut snapshots: mpsc::Receiver<Snapshot>) -> u64 {
        let mut handled = 0_u64;
        while let Some(snapshot) = snapshots.recv().await {
            self.dispatch(snapshot).await;
            handled += 1;
        }
        debug!(handled, "snapshot channel closed");
        handled
    }

    async fn dispatch(&mut self, snapshot: Snapshot) {
        if let Err(err) = self.renderer.render(&snapshot) {
            warn!(error = %err, "render failed");
            if let Some(log) = self.log.as_mut() {
                if let Err(log_err) = log.log_error(&err) {
                    warn!(error = %log_err, "failed to write error to snapshot log");
                }
            }
        }

        if let Some(log) = self.log.as_mut() {
            if let Err(err) = log.log_snapshot(&snapshot) {
                warn!(error = %err, "failed to write snapshot log");
            }
        }

        if let Some((metrics, latest)) = &self.exporter {
            metrics.update_from_snapshot(&snapshot);
            *latest.write().await = Some(snapshot);
        }
    }

    pub fn stop(mut self) -> io::Result<()> {
        if let Err(err) = self.renderer.clear() {
            debug!(error = %err, "failed to clear display");
        }
        self.renderer.close()?;
        if let Some(log) = self.log.take() {
            log.close()?;
        }
        Ok(())
    }
}
