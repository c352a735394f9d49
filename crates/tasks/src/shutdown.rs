//! Single cancellation signal shared by every service loop.

use tokio::sync::watch;

/// Create a linked trigger/listener pair.
pub fn signal() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

/// Fires the shutdown signal. Dropping the trigger also fires it.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn fire(&self) {
        self.tx.send_replace(true);
    }

    /// A new listener linked to this trigger.
    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            rx: self.tx.subscribe(),
        }
    }
}

/// Listens for the shutdown signal.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolves once the trigger fires or is dropped. Cancel safe.
    pub async fn cancelled(&mut self) {
        // `wait_for` errors only when the trigger is gone, which also means shutdown.
        let _ = self.rx.wait_for(|fired| *fired).await;
    }
}
