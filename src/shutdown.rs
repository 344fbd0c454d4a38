//! Two-stage interrupt confirmation: the first Ctrl-C arms a short window and
//! only a second one inside that window stops the process.

use std::time::Duration;
use tokio::time::{sleep_until, Instant};

pub const DEFAULT_CONFIRM_WINDOW: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitState {
    Idle,
    Armed { expires_at: Instant },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    Armed { expires_at: Instant },
    Confirmed,
}

#[derive(Debug)]
pub struct ExitConfirmation {
    window: Duration,
    state: ExitState,
}

impl ExitConfirmation {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: ExitState::Idle,
        }
    }

    pub fn state(&self) -> ExitState {
        self.state
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn on_signal(&mut self, now: Instant) -> SignalOutcome {
        match self.state {
            ExitState::Armed { expires_at } if now < expires_at => SignalOutcome::Confirmed,
            _ => {
                let expires_at = now + self.window;
                self.state = ExitState::Armed { expires_at };
                SignalOutcome::Armed { expires_at }
            }
        }
    }

    /// Returns to `Idle` once the window has passed. `true` if it did.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.state {
            ExitState::Armed { expires_at } if now >= expires_at => {
                self.state = ExitState::Idle;
                true
            }
            _ => false,
        }
    }
}

/// Resolves once an interrupt has been confirmed.
pub async fn wait_for_confirmed_interrupt(window: Duration) {
    let mut confirmation = ExitConfirmation::new(window);

    loop {
        let deadline = match confirmation.state() {
            ExitState::Armed { expires_at } => Some(expires_at),
            ExitState::Idle => None,
        };

        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    tracing::error!("Failed to listen for Ctrl-C: {}", e);
                    return;
                }
                match confirmation.on_signal(Instant::now()) {
                    SignalOutcome::Confirmed => {
                        tracing::info!("Shutdown confirmed");
                        return;
                    }
                    SignalOutcome::Armed { .. } => {
                        tracing::warn!(
                            "Press Ctrl-C again within {}s to stop the relay",
                            window.as_secs()
                        );
                    }
                }
            }
            _ = async {
                match deadline {
                    Some(at) => sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            } => {
                if confirmation.expire(Instant::now()) {
                    tracing::info!("Shutdown not confirmed, continuing");
                }
            }
        }
    }
}
