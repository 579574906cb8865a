// Process lifecycle: the state machine the controller in `server.rs`
// walks through, and the OS signal wait used while running.

use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Starting,
    Running,
    ShuttingDown,
    Stopped,
}

impl State {
    fn next(self) -> Option<State> {
        match self {
            State::Starting => Some(State::Running),
            State::Running => Some(State::ShuttingDown),
            State::ShuttingDown => Some(State::Stopped),
            State::Stopped => None,
        }
    }
}

#[derive(Debug)]
pub struct Lifecycle {
    state: State,
}

impl Lifecycle {
    pub fn new() -> Self {
        info!(state = ?State::Starting, "Lifecycle");
        Lifecycle { state: State::Starting }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Move to the following state. Advancing past `Stopped` is a no-op.
    pub fn advance(&mut self) -> State {
        if let Some(next) = self.state.next() {
            info!(from = ?self.state, to = ?next, "Lifecycle transition");
            self.state = next;
        }
        self.state
    }
}

/// Wait for Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
