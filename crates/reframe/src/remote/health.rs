//! Background health polling for the processing service.
//!
//! The flag is advisory: callers may consult [`HealthMonitor::is_healthy`]
//! for diagnostics, but every request still goes out and relies on the
//! retry policy.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::ProcessingService;

pub struct HealthMonitor {
    service: Arc<dyn ProcessingService>,
    interval: Duration,
    healthy: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl HealthMonitor {
    /// Creates a monitor. The service counts as unhealthy until the first check.
    pub fn new(service: Arc<dyn ProcessingService>, interval: Duration) -> Self {
        Self {
            service,
            interval,
            healthy: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    /// Runs one check immediately and records the outcome.
    pub async fn check_now(&self) -> bool {
        check_once(self.service.as_ref(), &self.healthy).await
    }

    /// Spawns the polling loop on the current tokio runtime.
    pub fn start(&self) -> JoinHandle<()> {
        let service = Arc::clone(&self.service);
        let healthy = Arc::clone(&self.healthy);
        let shutdown = Arc::clone(&self.shutdown);
        let wake = Arc::clone(&self.wake);
        let interval = self.interval;

        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = timer.tick() => {},
                    _ = wake.notified() => {},
                }

                if shutdown.load(Ordering::Acquire) {
                    break;
                }

                check_once(service.as_ref(), &healthy).await;
            }
            debug!("Health monitor stopped");
        })
    }

    /// Signals the polling loop to exit.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.wake.notify_one();
    }
}

async fn check_once(service: &dyn ProcessingService, healthy: &AtomicBool) -> bool {
    let now_healthy = match service.check_health().await {
        Ok(response) => response.is_healthy(),
        Err(e) => {
            debug!(error = %e, "Health check failed");
            false
        }
    };

    let was_healthy = healthy.swap(now_healthy, Ordering::AcqRel);
    if was_healthy != now_healthy {
        if now_healthy {
            info!("Remote processing service is healthy");
        } else {
            warn!("Remote processing service is unhealthy, local fallback will be used");
        }
    }
    now_healthy
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::wire::{HealthResponse, HealthState};
    use crate::remote::{
        BatchProcessRequest, BatchProcessResult, CropRequest, DetectionRequest,
        DetectionResponse, RemoteComposedSheet, RemoteError, RemoteProcessedImage,
        SheetCompositionRequest,
    };
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicU32;

    /// Reports healthy on every call while `up` is set.
    struct Toggle {
        up: AtomicBool,
        checks: AtomicU32,
    }

    fn unreachable() -> RemoteError {
        RemoteError::Connection {
            message: "down".into(),
        }
    }

    #[async_trait]
    impl ProcessingService for Toggle {
        async fn detect_objects(
            &self,
            _request: &DetectionRequest,
        ) -> Result<DetectionResponse, RemoteError> {
            Err(unreachable())
        }

        async fn crop_image(
            &self,
            _request: &CropRequest,
        ) -> Result<RemoteProcessedImage, RemoteError> {
            Err(unreachable())
        }

        async fn process_batch(
            &self,
            _request: &BatchProcessRequest,
        ) -> Result<BatchProcessResult, RemoteError> {
            Err(unreachable())
        }

        async fn compose_sheet(
            &self,
            _request: &SheetCompositionRequest,
        ) -> Result<RemoteComposedSheet, RemoteError> {
            Err(unreachable())
        }

        async fn check_health(&self) -> Result<HealthResponse, RemoteError> {
            self.checks.fetch_add(1, Ordering::SeqCst);
            if self.up.load(Ordering::SeqCst) {
                Ok(HealthResponse {
                    status: HealthState::Healthy,
                    checks: HashMap::new(),
                    uptime_seconds: None,
                })
            } else {
                Err(unreachable())
            }
        }
    }

    fn toggle(up: bool) -> Arc<Toggle> {
        Arc::new(Toggle {
            up: AtomicBool::new(up),
            checks: AtomicU32::new(0),
        })
    }

    #[tokio::test]
    async fn test_check_now_tracks_state() {
        let service = toggle(true);
        let monitor = HealthMonitor::new(service.clone(), Duration::from_secs(60));
        assert!(!monitor.is_healthy());

        assert!(monitor.check_now().await);
        assert!(monitor.is_healthy());

        service.up.store(false, Ordering::SeqCst);
        assert!(!monitor.check_now().await);
        assert!(!monitor.is_healthy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_loop_polls_and_stops() {
        let service = toggle(true);
        let monitor = HealthMonitor::new(service.clone(), Duration::from_millis(50));
        let handle = monitor.start();

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(monitor.is_healthy());
        assert!(service.checks.load(Ordering::SeqCst) >= 2);

        monitor.stop();
        handle.await.expect("health monitor task panicked");
    }
}
