//! Operator interrupts as a channel.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Stream of operator interrupts; one `()` per Ctrl+C (or termination signal).
pub type Interrupts = mpsc::UnboundedReceiver<()>;

/// Forward every Ctrl+C, and on unix `SIGTERM`/`SIGHUP`, into a channel.
///
/// The handlers are installed before this returns, so it must be called
/// from within a runtime. Abort the returned task once the session is over.
pub fn listen() -> (Interrupts, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let task = match Signals::install() {
        Ok(mut signals) => tokio::spawn(async move {
            while let Some(source) = signals.recv().await {
                debug!(source, "Interrupt received");
                if tx.send(()).is_err() {
                    return;
                }
            }
        }),
        Err(e) => {
            warn!(error = %e, "Failed to install interrupt handlers");
            tokio::spawn(async move { drop(tx) })
        }
    };
    (rx, task)
}

#[cfg(unix)]
struct Signals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    hangup: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            hangup: signal(SignalKind::hangup())?,
        })
    }

    async fn recv(&mut self) -> Option<&'static str> {
        tokio::select! {
            Some(()) = self.interrupt.recv() => Some("SIGINT"),
            Some(()) = self.terminate.recv() => Some("SIGTERM"),
            Some(()) = self.hangup.recv() => Some("SIGHUP"),
            else => None,
        }
    }
}

#[cfg(windows)]
struct Signals {
    ctrl_c: tokio::signal::windows::CtrlC,
}

#[cfg(windows)]
impl Signals {
    fn install() -> std::io::Result<Self> {
        Ok(Self {
            ctrl_c: tokio::signal::windows::ctrl_c()?,
        })
    }

    async fn recv(&mut self) -> Option<&'static str> {
        self.ctrl_c.recv().await.map(|()| "Ctrl+C")
    }
}
