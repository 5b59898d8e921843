//! Tracks running monitors so each binding has at most one live instance.

use std::{collections::HashMap, sync::Arc};

use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{Check, MonitorError, PeriodicMonitor, Readiness};

struct RunningMonitor {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct MonitorRegistry {
    shutdown: CancellationToken,
    running: Mutex<HashMap<&'static str, RunningMonitor>>,
}

impl MonitorRegistry {
    /// Monitors started through this registry are cancelled with `shutdown`.
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            shutdown,
            running: Mutex::new(HashMap::new()),
        }
    }

    pub async fn start(&self, check: Arc<dyn Check>, ready: Readiness) -> Result<(), MonitorError> {
        let name = check.name();
        let mut running = self.running.lock().await;

        if let Some(existing) = running.get(name)
            && !existing.handle.is_finished()
        {
            return Err(MonitorError::AlreadyRunning(name));
        }

        let token = self.shutdown.child_token();
        let handle = tokio::spawn(PeriodicMonitor::new(check).run(ready, token.clone()));
        running.insert(name, RunningMonitor { token, handle });
        info!(monitor = name, "Monitor registered");
        Ok(())
    }

    pub async fn is_running(&self, name: &str) -> bool {
        self.running
            .lock()
            .await
            .get(name)
            .is_some_and(|monitor| !monitor.handle.is_finished())
    }

    /// Names of monitors whose task is still alive.
    pub async fn running(&self) -> Vec<&'static str> {
        let running = self.running.lock().await;
        let mut names: Vec<_> = running
            .iter()
            .filter(|(_, monitor)| !monitor.handle.is_finished())
            .map(|(name, _)| *name)
            .collect();
        names.sort_unstable();
        names
    }

    /// Cancels one monitor and waits for its current tick to finish.
    pub async fn stop(&self, name: &str) -> bool {
        let Some(monitor) = self.running.lock().await.remove(name) else {
            return false;
        };
        monitor.token.cancel();
        if let Err(err) = monitor.handle.await {
            warn!(monitor = name, error = %err, "Monitor task ended abnormally");
        }
        true
    }

    /// Cancels every monitor and waits for all of them.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let drained: Vec<_> = self.running.lock().await.drain().collect();
        for (name, monitor) in drained {
            if let Err(err) = monitor.handle.await {
                warn!(monitor = name, error = %err, "Monitor task ended abnormally");
            }
        }
        info!("All monitors stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::tests::ScriptedCheck;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_rejects_second_instance_of_running_monitor() {
        let registry = MonitorRegistry::new(CancellationToken::new());
        let check = Arc::new(ScriptedCheck::new(Duration::from_secs(30)));

        registry
            .start(check.clone(), Box::pin(async {}))
            .await
            .unwrap();
        let err = registry
            .start(check.clone(), Box::pin(async {}))
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::AlreadyRunning("scripted")));
        assert_eq!(registry.running().await, vec!["scripted"]);

        registry.shutdown().await;
        assert!(!registry.is_running("scripted").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_stop() {
        let registry = MonitorRegistry::new(CancellationToken::new());
        let check = Arc::new(ScriptedCheck::new(Duration::from_secs(30)));

        registry.start(check.clone(), Box::pin(async {})).await.unwrap();
        assert!(registry.stop("scripted").await);
        assert!(!registry.stop("scripted").await);
        registry.start(check, Box::pin(async {})).await.unwrap();
        assert!(registry.is_running("scripted").await);

        registry.shutdown().await;
    }
}
