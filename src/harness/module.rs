use super::{DeathReason, Heart};
use crate::library::{BoxedError, EmptyResult};
use async_trait::async_trait;
use jatsl::{JobScheduler, StatusServer};
use std::any::type_name;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument};

/// Executable module
#[async_trait]
pub trait Module {
    /// Executed before running the core loop, used to establish connections
    async fn pre_startup(&mut self) -> EmptyResult {
        Ok(())
    }

    /// Core run loop of the module
    ///
    /// When the function returns `Some(_)` the death of the returned [`Heart`] is awaited before calling the shutdown hook.
    /// Returning `None` results in the program entering a shutdown state right away.
    async fn run(&mut self, scheduler: &JobScheduler) -> Result<Option<Heart>, BoxedError>;

    /// Shutdown hook executed after the core loop and all associated jobs have terminated
    #[instrument(skip(self))]
    async fn post_shutdown(&mut self, termination_reason: &ModuleTerminationReason) {
        if termination_reason.is_clean() {
            info!("Module exited normally");
        } else {
            error!(%termination_reason, "Module terminated with an error");
        }
    }
}

/// Reason why a module has terminated
#[derive(Error, Debug)]
pub enum ModuleTerminationReason {
    /// Startup routine threw an error
    #[error("startup routine threw an error")]
    StartupFailed(#[source] BoxedError),
    /// Core run loop threw an error
    #[error("error during operation")]
    OperationalError(#[source] BoxedError),
    /// [`Heart`] provided by module died
    #[error("heart provided by module died: {0}")]
    HeartDied(DeathReason),
    /// Run loop exited cleanly
    #[error("run loop exited cleanly")]
    ExitedNormally,
    /// Timeout during startup
    #[error("timeout during startup")]
    Timeout,
}

impl ModuleTerminationReason {
    /// Whether the module shut down without any error
    pub fn is_clean(&self) -> bool {
        matches!(
            self,
            ModuleTerminationReason::HeartDied(_) | ModuleTerminationReason::ExitedNormally
        )
    }
}

/// Runner for [`Module`] implementations
pub struct ModuleRunner {
    startup_timeout: Duration,
    shutdown_timeout: Duration,
    status_server_port: Option<u16>,
}

impl ModuleRunner {
    /// Creates a new instance using default timeouts and enabling the status server
    pub fn new_with_status_server(status_server_port: u16) -> Self {
        Self {
            status_server_port: Some(status_server_port),
            ..Default::default()
        }
    }

    /// Overrides the time granted to the startup and shutdown hooks each
    pub fn with_timeouts(mut self, startup: Duration, shutdown: Duration) -> Self {
        self.startup_timeout = startup;
        self.shutdown_timeout = shutdown;
        self
    }
}

impl Default for ModuleRunner {
    fn default() -> Self {
        Self {
            startup_timeout: Duration::from_secs(60),
            shutdown_timeout: Duration::from_secs(60),
            status_server_port: None,
        }
    }
}

impl ModuleRunner {
    /// Executes a [`Module`] until it exits by calling the corresponding lifecycle functions in order
    /// and returns the reason why it terminated.
    #[instrument(skip(self, module), fields(module_name = type_name::<M>()))]
    pub async fn run<M: Module + Send + Sync>(&self, mut module: M) -> ModuleTerminationReason {
        let scheduler = JobScheduler::default();

        if let Some(port) = self.status_server_port {
            info!(port, "Spawning status server");
            let status_server = StatusServer::new(&scheduler, port);
            scheduler.spawn_job(status_server).await;
        }

        info!("Commencing module startup sequence");
        let termination_reason = match timeout(self.startup_timeout, module.pre_startup()).await {
            Ok(Ok(_)) => self.run_loop(&mut module, &scheduler).await,
            Ok(Err(error)) => {
                error!(?error, "Module startup sequence encountered an error");
                ModuleTerminationReason::StartupFailed(error)
            }
            Err(_) => {
                error!("Module startup sequence timed out");
                ModuleTerminationReason::Timeout
            }
        };

        info!("Terminating remaining jobs");
        scheduler.terminate_jobs().await;

        info!("Commencing module shutdown sequence");
        let shutdown = timeout(
            self.shutdown_timeout,
            module.post_shutdown(&termination_reason),
        )
        .await;

        if shutdown.is_err() {
            error!("Module shutdown sequence timed out");
        }

        termination_reason
    }

    async fn run_loop<M: Module + Send + Sync>(
        &self,
        module: &mut M,
        scheduler: &JobScheduler,
    ) -> ModuleTerminationReason {
        info!("Executing module run procedure");
        match module.run(scheduler).await {
            Ok(None) => {
                debug!("Module run procedure completed successfully");
                ModuleTerminationReason::ExitedNormally
            }
            Ok(Some(mut heart)) => {
                debug!("Module run procedure completed successfully, entering run loop");
                let death_reason = heart.death().await;
                info!(%death_reason, "Heart provided by run procedure died");
                ModuleTerminationReason::HeartDied(death_reason)
            }
            Err(error) => {
                error!(?error, "Module run procedure encountered an error");
                ModuleTerminationReason::OperationalError(error)
            }
        }
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use crate::harness::HeartStone;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct MockModule {
        fail_startup: bool,
        stall_startup: bool,
        kill_in_run: bool,
        shut_down: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Module for MockModule {
        async fn pre_startup(&mut self) -> EmptyResult {
            if self.stall_startup {
                futures::future::pending::<()>().await;
            }

            if self.fail_startup {
                Err("unreachable backend".into())
            } else {
                Ok(())
            }
        }

        async fn run(&mut self, _scheduler: &JobScheduler) -> Result<Option<Heart>, BoxedError> {
            if self.kill_in_run {
                let (heart, mut stone): (Heart, HeartStone) = Heart::new();
                stone.kill("done".into()).await;
                Ok(Some(heart))
            } else {
                Ok(None)
            }
        }

        async fn post_shutdown(&mut self, _termination_reason: &ModuleTerminationReason) {
            self.shut_down.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn exit_normally_without_heart() {
        let shut_down = Arc::new(AtomicBool::new(false));
        let module = MockModule {
            shut_down: shut_down.clone(),
            ..Default::default()
        };

        let reason = ModuleRunner::default().run(module).await;

        assert!(matches!(reason, ModuleTerminationReason::ExitedNormally));
        assert!(shut_down.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn wait_for_heart_death() {
        let module = MockModule {
            kill_in_run: true,
            ..Default::default()
        };

        let reason = ModuleRunner::default().run(module).await;

        assert!(matches!(
            reason,
            ModuleTerminationReason::HeartDied(DeathReason::Killed(_))
        ));
        assert!(reason.is_clean());
    }

    #[tokio::test]
    async fn report_failed_startup() {
        let shut_down = Arc::new(AtomicBool::new(false));
        let module = MockModule {
            fail_startup: true,
            shut_down: shut_down.clone(),
            ..Default::default()
        };

        let reason = ModuleRunner::default().run(module).await;

        assert!(matches!(reason, ModuleTerminationReason::StartupFailed(_)));
        assert!(!reason.is_clean());
        assert!(shut_down.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn time_out_stalled_startup() {
        let module = MockModule {
            stall_startup: true,
            ..Default::default()
        };

        let runner = ModuleRunner::default()
            .with_timeouts(Duration::from_millis(10), Duration::from_millis(10));
        let reason = runner.run(module).await;

        assert!(matches!(reason, ModuleTerminationReason::Timeout));
    }
}
