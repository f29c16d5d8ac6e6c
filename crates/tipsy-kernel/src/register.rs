//! [`LocomotionRegister`] – the single shared locomotion state.
//!
//! The register is a single-writer / multi-reader cell holding a
//! [`LocomotionSnapshot`] (state plus the instant the base last entered
//! idle).  It is backed by a [`tokio::sync::watch`] channel, so every read
//! observes a whole snapshot, never a torn state/timestamp pair, and reads
//! never block the writer.
//!
//! Only the [`Arbiter`][crate::arbiter::Arbiter] owns the register and can
//! transition it; monitors receive cloned [`LocomotionHandle`]s.

use tipsy_types::{LocomotionSnapshot, LocomotionState};
use tokio::sync::watch;
use tokio::time::Instant;

/// A state change applied by [`LocomotionRegister::transition_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: LocomotionState,
    pub to: LocomotionState,
    pub at: Instant,
}

/// The writable side of the locomotion register.
#[derive(Debug)]
pub struct LocomotionRegister {
    tx: watch::Sender<LocomotionSnapshot>,
}

impl LocomotionRegister {
    /// A register that starts idle, with its idle period beginning now.
    pub fn new() -> Self {
        Self::with_snapshot(LocomotionSnapshot::idle_since(Instant::now()))
    }

    /// A register that starts from an arbitrary snapshot.
    pub fn with_snapshot(snapshot: LocomotionSnapshot) -> Self {
        let (tx, _rx) = watch::channel(snapshot);
        Self { tx }
    }

    pub fn read(&self) -> LocomotionSnapshot {
        *self.tx.borrow()
    }

    /// A new read-only handle onto this register.
    pub fn handle(&self) -> LocomotionHandle {
        LocomotionHandle {
            rx: self.tx.subscribe(),
        }
    }

    /// Move the register to `to`.
    ///
    /// Entering [`LocomotionState::Idle`] from a moving state stamps
    /// `last_idle_at` with the current instant in the same write; leaving
    /// idle never touches it.  A transition to the current state is a no-op
    /// and returns `None`.
    pub(crate) fn transition_to(&self, to: LocomotionState) -> Option<Transition> {
        let now = Instant::now();
        let mut applied = None;
        self.tx.send_if_modified(|snapshot| {
            if snapshot.state == to {
                return false;
            }
            let from = snapshot.state;
            snapshot.state = to;
            if to == LocomotionState::Idle {
                snapshot.last_idle_at = now;
            }
            applied = Some(Transition { from, to, at: now });
            true
        });
        applied
    }
}

impl Default for LocomotionRegister {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of the locomotion register.  Clone freely.
#[derive(Debug, Clone)]
pub struct LocomotionHandle {
    rx: watch::Receiver<LocomotionSnapshot>,
}

impl LocomotionHandle {
    /// A handle frozen at `snapshot`, with no register behind it.
    pub fn detached(snapshot: LocomotionSnapshot) -> Self {
        let (_tx, rx) = watch::channel(snapshot);
        Self { rx }
    }

    /// Non-blocking snapshot read.
    pub fn read(&self) -> LocomotionSnapshot {
        *self.rx.borrow()
    }

    pub fn state(&self) -> LocomotionState {
        self.read().state
    }

    /// Wait until the register holds `state`.
    ///
    /// Returns `None` if the register was dropped before that happened.
    pub async fn wait_for(&mut self, state: LocomotionState) -> Option<LocomotionSnapshot> {
        self.rx
            .wait_for(|snapshot| snapshot.state == state)
            .await
            .ok()
            .map(|snapshot| *snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn starts_idle() {
        let register = LocomotionRegister::new();
        let snapshot = register.read();
        assert_eq!(snapshot.state, LocomotionState::Idle);
        assert_eq!(snapshot.last_idle_at, Instant::now());
    }

    #[tokio::test(start_paused = true)]
    async fn leaving_idle_keeps_timestamp() {
        let register = LocomotionRegister::new();
        let idle_at = register.read().last_idle_at;
        tokio::time::sleep(Duration::from_secs(2)).await;

        let transition = register
            .transition_to(LocomotionState::Spinning)
            .expect("state changed");
        assert_eq!(transition.from, LocomotionState::Idle);
        assert_eq!(register.read().last_idle_at, idle_at);
    }

    #[tokio::test(start_paused = true)]
    async fn entering_idle_refreshes_timestamp() {
        let register = LocomotionRegister::new();
        register.transition_to(LocomotionState::MovingForward);
        tokio::time::sleep(Duration::from_secs(3)).await;

        let transition = register
            .transition_to(LocomotionState::Idle)
            .expect("state changed");
        let snapshot = register.read();
        assert_eq!(snapshot.state, LocomotionState::Idle);
        assert_eq!(snapshot.last_idle_at, transition.at);
        assert_eq!(snapshot.last_idle_at, Instant::now());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_to_idle_is_a_noop() {
        let register = LocomotionRegister::new();
        let before = register.read();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(register.transition_to(LocomotionState::Idle).is_none());
        assert_eq!(register.read(), before);
    }

    #[tokio::test]
    async fn handles_observe_whole_snapshots() {
        let register = LocomotionRegister::new();
        let handle = register.handle();
        register.transition_to(LocomotionState::MovingBackward);
        assert_eq!(handle.state(), LocomotionState::MovingBackward);
        register.transition_to(LocomotionState::Idle);
        assert_eq!(handle.read(), register.read());
    }

    #[tokio::test]
    async fn wait_for_resolves_on_transition() {
        let register = LocomotionRegister::new();
        let mut handle = register.handle();
        let waiter = tokio::spawn(async move { handle.wait_for(LocomotionState::Spinning).await });
        tokio::task::yield_now().await;
        register.transition_to(LocomotionState::Spinning);
        let snapshot = waiter.await.unwrap().expect("register alive");
        assert_eq!(snapshot.state, LocomotionState::Spinning);
    }

    #[tokio::test]
    async fn wait_for_returns_none_when_register_dropped() {
        let register = LocomotionRegister::new();
        let mut handle = register.handle();
        drop(register);
        assert!(handle.wait_for(LocomotionState::Spinning).await.is_none());
    }

    #[test]
    fn detached_handle_reads_its_snapshot() {
        let snapshot = LocomotionSnapshot {
            state: LocomotionState::Spinning,
            last_idle_at: Instant::now(),
        };
        let handle = LocomotionHandle::detached(snapshot);
        assert_eq!(handle.read(), snapshot);
    }
}
