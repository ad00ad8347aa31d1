use crate::diagnostics::DiagnosticLog;
use crate::errors::TrackerError;
use crate::store::AggregateStore;
use std::{any::Any, fmt, future::Future, time::Duration};
use tokio::{sync::watch, task::JoinError, task::JoinHandle};
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownCause {
    Interrupt,
    Terminate,
    Requested,
    PollerFailed(String),
}

impl fmt::Display for ShutdownCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupt => f.write_str("SIGINT"),
            Self::Terminate => f.write_str("SIGTERM"),
            Self::Requested => f.write_str("shutdown request"),
            Self::PollerFailed(reason) => write!(f, "poller failure: {reason}"),
        }
    }
}

/// Owns the stop signal and drives every shutdown path through the same
/// sequence: stop the poller, join it within the grace period, save.
pub struct Supervisor {
    store: AggregateStore,
    diagnostics: DiagnosticLog,
    shutdown: watch::Sender<bool>,
    grace: Duration,
}

impl Supervisor {
    pub fn new(
        store: AggregateStore,
        diagnostics: DiagnosticLog,
        shutdown: watch::Sender<bool>,
        grace: Duration,
    ) -> Self {
        Self {
            store,
            diagnostics,
            shutdown,
            grace,
        }
    }

    pub async fn supervise<F>(&self, mut worker: JoinHandle<()>, external: F) -> Result<(), TrackerError>
    where
        F: Future<Output = ShutdownCause>,
    {
        let requested = self.shutdown.subscribe();
        let mut worker_done = false;
        let cause = tokio::select! {
            biased;
            cause = external => cause,
            _ = wait_for_stop(requested) => ShutdownCause::Requested,
            joined = &mut worker => {
                worker_done = true;
                match joined {
                    Ok(()) if *self.shutdown.borrow() => ShutdownCause::Requested,
                    other => ShutdownCause::PollerFailed(describe_exit(other)),
                }
            }
        };

        info!("shutting down: {cause}");
        match &cause {
            ShutdownCause::Interrupt | ShutdownCause::Terminate => {
                self.diagnostics
                    .record(format!("Received {cause}, shutting down."))
                    .await;
            }
            ShutdownCause::PollerFailed(reason) => {
                error!("{reason}");
                self.diagnostics.record(format!("Uncaught failure: {reason}")).await;
            }
            ShutdownCause::Requested => {}
        }

        self.shutdown.send_replace(true);
        if !worker_done {
            match tokio::time::timeout(self.grace, &mut worker).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => error!("poller ended abnormally: {}", describe_exit(Err(err))),
                Err(_) => {
                    warn!("poller did not stop within {:?}; abandoning it", self.grace);
                    worker.abort();
                }
            }
        }

        if let Err(err) = self.store.save().await {
            error!("{err}");
            self.diagnostics.record(format!("Final save failed: {err}")).await;
        }

        match cause {
            ShutdownCause::PollerFailed(reason) => Err(TrackerError::Fault(reason)),
            _ => Ok(()),
        }
    }
}

fn describe_exit(joined: Result<(), JoinError>) -> String {
    match joined {
        Ok(()) => "poller exited without being asked to stop".to_string(),
        Err(err) if err.is_panic() => format!("panic: {}", panic_message(err.into_panic())),
        Err(err) => err.to_string(),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Resolves once the stop flag is raised or every sender is gone.
pub async fn wait_for_stop(mut stop: watch::Receiver<bool>) {
    while !*stop.borrow_and_update() {
        if stop.changed().await.is_err() {
            break;
        }
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn os_signal() -> ShutdownCause {
    let interrupt = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => ShutdownCause::Interrupt,
        _ = terminate => ShutdownCause::Terminate,
    }
}
