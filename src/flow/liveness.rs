//! Mount/unmount signalling for the poller.
//!
//! A [`MountGuard`] is held by whoever mounted the poller. Calling
//! [`MountGuard::unmount`] or dropping the guard tears the poller down; the
//! poller observes this through its [`Liveness`] handle after every await.

use tokio::sync::watch;

pub struct MountGuard {
    tx: watch::Sender<bool>,
}

#[derive(Clone)]
pub struct Liveness {
    rx: watch::Receiver<bool>,
}

impl MountGuard {
    pub fn new() -> (Self, Liveness) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, Liveness { rx })
    }

    pub fn unmount(&self) {
        self.tx.send_replace(true);
    }
}

impl Drop for MountGuard {
    fn drop(&mut self) {
        self.unmount();
    }
}

impl Liveness {
    pub fn is_alive(&self) -> bool {
        !*self.rx.borrow()
    }

    /// Resolves once the guard is unmounted or dropped.
    pub async fn torn_down(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}
