//! Async driver around [`Engine`]
//!
//! Three kinds of task cooperate:
//! - the tick loop, which owns the engine and publishes one snapshot per
//!   period (missed periods are skipped, never replayed);
//! - the initializer, the only writer of the provider handle, which loads
//!   the ephemeris on a blocking thread and then waits for reload requests;
//! - short-lived location refreshes, run on a blocking thread under a
//!   timeout and reported back over an `mpsc` channel.
//!
//! All of them stop when the `watch` stop signal flips to `true`.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::engine::Engine;
use crate::ephemeris::{EphemerisLoader, ProviderHandle, ProviderState};
use crate::location::{LocationReport, LocationService};
use crate::snapshot::SnapshotSink;
use crate::utils::config::EngineConfig;

/// Sender and receiver for the stop signal.
pub fn stop_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Counters returned when the tick loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub ticks: u64,
    pub failed_ticks: u64,
    pub location_reports: u64,
}

/// Load the provider, then serve reload requests until stopped.
///
/// After a failed load the task waits at least `retry_delay` before it
/// honours the next request.
pub fn spawn_initializer(
    handle: Arc<ProviderHandle>,
    loader: Arc<dyn EphemerisLoader>,
    path_hint: Option<PathBuf>,
    retry_delay: Duration,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if *stop.borrow() {
                break;
            }

            let load = tokio::task::spawn_blocking({
                let handle = Arc::clone(&handle);
                let loader = Arc::clone(&loader);
                let path_hint = path_hint.clone();
                move || handle.load_and_publish(loader.as_ref(), path_hint.as_deref())
            });

            // A blocking load cannot be cancelled; on stop it is detached
            // and left to finish on its own.
            let joined = tokio::select! {
                joined = load => joined,
                _ = stop.changed() => {
                    info!("stop requested while the ephemeris was loading");
                    break;
                }
            };
            let loaded = match joined {
                Ok(loaded) => loaded,
                Err(e) => {
                    error!("ephemeris loader task failed: {e}");
                    handle.publish(ProviderState::Failed(e.to_string()));
                    false
                }
            };

            if !loaded {
                tokio::select! {
                    _ = tokio::time::sleep(retry_delay) => {}
                    _ = stop.changed() => break,
                }
            }

            tokio::select! {
                _ = handle.reload_wanted() => info!("reloading ephemeris provider"),
                _ = stop.changed() => break,
            }
        }
        debug!("ephemeris initializer stopped");
    })
}

/// Run one location refresh off the tick task.
fn spawn_location_refresh(
    service: Arc<LocationService>,
    timeout: Duration,
    reports: mpsc::Sender<LocationReport>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let job = tokio::task::spawn_blocking(move || service.refresh());
        match tokio::time::timeout(timeout, job).await {
            Ok(Ok(report)) => {
                if reports.send(report).await.is_err() {
                    debug!("tick loop gone, dropping location report");
                }
            }
            Ok(Err(e)) => warn!("location refresh task failed: {e}"),
            Err(_) => warn!("location refresh timed out after {timeout:?}"),
        }
    })
}

pub struct Runtime {
    config: EngineConfig,
    loader: Arc<dyn EphemerisLoader>,
    location: Option<Arc<LocationService>>,
    handle: Arc<ProviderHandle>,
}

impl Runtime {
    pub fn new(config: EngineConfig, loader: Arc<dyn EphemerisLoader>) -> Self {
        Self {
            config,
            loader,
            location: None,
            handle: Arc::new(ProviderHandle::new()),
        }
    }

    /// Without a location service the observer stays at the default location.
    pub fn with_location_service(mut self, service: Arc<LocationService>) -> Self {
        self.location = Some(service);
        self
    }

    pub fn handle(&self) -> Arc<ProviderHandle> {
        Arc::clone(&self.handle)
    }

    /// Drive the engine until the stop signal fires.
    pub async fn run(
        self,
        mut sink: Box<dyn SnapshotSink>,
        mut stop: watch::Receiver<bool>,
    ) -> RunStats {
        let Self {
            config,
            loader,
            location,
            handle,
        } = self;

        let initializer = spawn_initializer(
            Arc::clone(&handle),
            loader,
            config.ephemeris.kernel_path.clone(),
            config.ephemeris_retry_delay(),
            stop.clone(),
        );

        let location_timeout = config.location_timeout();
        let mut interval = tokio::time::interval(config.tick_period());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let (report_tx, mut report_rx) = mpsc::channel::<LocationReport>(4);
        let mut pending_location: Option<JoinHandle<()>> = None;
        let mut engine = Engine::new(config, handle);
        let mut stats = RunStats::default();

        info!("moon tracker started at {}", engine.location());
        loop {
            if *stop.borrow() {
                break;
            }
            tokio::select! {
                _ = interval.tick() => {}
                _ = stop.changed() => break,
            }

            while let Ok(report) = report_rx.try_recv() {
                stats.location_reports += 1;
                engine.apply_location_report(report);
            }

            let now = Utc::now();
            if let Some(service) = &location {
                let idle = pending_location
                    .as_ref()
                    .map_or(true, |job| job.is_finished());
                if idle && engine.location_due(now) {
                    engine.location_requested(now);
                    pending_location = Some(spawn_location_refresh(
                        Arc::clone(service),
                        location_timeout,
                        report_tx.clone(),
                    ));
                }
            }

            stats.ticks += 1;
            match catch_unwind(AssertUnwindSafe(|| engine.tick(now))) {
                Ok(snapshot) => {
                    if let Err(e) = sink.publish(&snapshot) {
                        warn!("failed to publish snapshot: {e}");
                    }
                }
                Err(_) => {
                    stats.failed_ticks += 1;
                    error!("tick at {now} panicked, continuing with the next one");
                }
            }
        }

        if let Some(job) = pending_location.take() {
            job.abort();
        }
        if let Err(e) = initializer.await {
            if !e.is_cancelled() {
                warn!("ephemeris initializer ended abnormally: {e}");
            }
        }
        info!(
            "moon tracker stopped after {} ticks ({} failed)",
            stats.ticks, stats.failed_ticks
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ephemeris::{EphemerisProvider, SeriesEphemeris};
    use crate::error::{EphemerisError, LocationError};
    use crate::location::{LocationSource, LocationStore, ObserverLocation, Reachability};
    use crate::snapshot::JsonLinesSink;
    use parking_lot::Mutex;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc as std_mpsc;

    struct CountingLoader {
        calls: AtomicUsize,
    }

    impl EphemerisLoader for CountingLoader {
        fn load(
            &self,
            _path_hint: Option<&Path>,
        ) -> Result<Arc<dyn EphemerisProvider>, EphemerisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(SeriesEphemeris::new()))
        }
    }

    #[tokio::test]
    async fn initializer_publishes_and_serves_reloads() {
        let handle = Arc::new(ProviderHandle::new());
        let loader = Arc::new(CountingLoader {
            calls: AtomicUsize::new(0),
        });
        let (stop_tx, stop_rx) = stop_channel();
        let task = spawn_initializer(
            Arc::clone(&handle),
            loader.clone(),
            None,
            Duration::from_millis(10),
            stop_rx,
        );

        for _ in 0..100 {
            if handle.is_ready() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(handle.is_ready());

        assert!(handle.request_reload());
        for _ in 0..100 {
            if loader.calls.load(Ordering::SeqCst) >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);

        stop_tx.send(true).unwrap();
        task.await.unwrap();
    }

    /// Blocks until released (or ten seconds pass), like a stalled download.
    struct StalledLoader {
        release: Mutex<std_mpsc::Receiver<()>>,
    }

    impl EphemerisLoader for StalledLoader {
        fn load(
            &self,
            _path_hint: Option<&Path>,
        ) -> Result<Arc<dyn EphemerisProvider>, EphemerisError> {
            let _ = self.release.lock().recv_timeout(Duration::from_secs(10));
            Ok(Arc::new(SeriesEphemeris::new()))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stop_is_honoured_while_the_loader_blocks() {
        let (release_tx, release_rx) = std_mpsc::channel();
        let loader = Arc::new(StalledLoader {
            release: Mutex::new(release_rx),
        });
        let config = EngineConfig::default();
        let runtime = Runtime::new(config, loader);
        let handle = runtime.handle();
        let (stop_tx, stop_rx) = stop_channel();

        let run = tokio::spawn(runtime.run(Box::new(JsonLinesSink::new(std::io::sink())), stop_rx));
        tokio::time::sleep(Duration::from_millis(300)).await;
        stop_tx.send(true).unwrap();

        let stats = tokio::time::timeout(Duration::from_secs(2), run)
            .await
            .expect("run did not return after the stop signal")
            .unwrap();
        assert!(stats.ticks >= 1);
        assert!(!handle.is_ready());

        release_tx.send(()).unwrap();
    }

    /// Network that swallows packets: the probe hangs for its full timeout.
    struct Blackholed(Duration);

    impl Reachability for Blackholed {
        fn is_online(&self) -> bool {
            std::thread::sleep(self.0);
            false
        }
    }

    struct Remembered(ObserverLocation);

    impl LocationStore for Remembered {
        fn last_known(&self) -> Option<ObserverLocation> {
            Some(self.0.clone())
        }

        fn persist(&self, _location: &ObserverLocation) -> Result<(), LocationError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn blackholed_network_still_reports_last_known_location() {
        let config = EngineConfig::default();
        let london = ObserverLocation::new("London", 51.5072, -0.1276, "Europe/London").unwrap();
        let service = LocationService::new(
            Box::new(Blackholed(config.probe_timeout())),
            config.default_location.clone(),
        )
        .with_store(Box::new(Remembered(london.clone())));

        let (tx, mut rx) = mpsc::channel(1);
        spawn_location_refresh(Arc::new(service), config.location_timeout(), tx)
            .await
            .unwrap();

        let report = rx.try_recv().expect("refresh timed out before the fallback reported");
        assert_eq!(report.source, LocationSource::LastKnown);
        assert_eq!(report.location, london);
        assert!(!report.online);
    }
}
