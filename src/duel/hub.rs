//! In-memory wakeups for running duels.
//!
//! The database is the source of truth for every duel. The hub only lets
//! the command waiting on a duel react immediately when another command
//! accepts or cancels it, instead of re-reading the database on a timer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

struct Slot {
	generation: u64,
	accepted: watch::Sender<Option<u64>>,
	cancel: CancellationToken,
}

impl Slot {
	fn new(generation: u64) -> Self {
		let (accepted, _) = watch::channel(None);
		Self {
			generation,
			accepted,
			cancel: CancellationToken::new(),
		}
	}

	fn signals(&self) -> DuelSignals {
		DuelSignals {
			accepted: self.accepted.subscribe(),
			cancel: self.cancel.clone(),
		}
	}
}

/// What ended the wait for a second player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptWait {
	Accepted(u64),
	Cancelled,
	TimedOut,
}

/// Handles for waiting on a single duel.
pub struct DuelSignals {
	accepted: watch::Receiver<Option<u64>>,
	cancel: CancellationToken,
}

impl DuelSignals {
	/// Waits until the duel is accepted, cancelled, or `timeout` runs out.
	pub async fn wait_for_acceptance(&mut self, timeout: Duration) -> AcceptWait {
		tokio::select! {
			biased;
			player = wait_for_player(&mut self.accepted) => AcceptWait::Accepted(player),
			_ = self.cancel.cancelled() => AcceptWait::Cancelled,
			_ = tokio::time::sleep(timeout) => AcceptWait::TimedOut,
		}
	}

	#[inline]
	pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
		self.cancel.cancelled()
	}

	#[inline]
	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}
}

async fn wait_for_player(accepted: &mut watch::Receiver<Option<u64>>) -> u64 {
	let player = accepted
		.wait_for(|player| player.is_some())
		.await
		.ok()
		.and_then(|player| *player);

	match player {
		Some(player) => player,
		None => std::future::pending().await,
	}
}

#[derive(Clone, Default)]
pub struct DuelHub {
	slots: Arc<Mutex<HashMap<u64, Slot>>>,
}

impl DuelHub {
	/// Returns the signals of a duel, creating them if needed.
	///
	/// Signals left over from an older duel in the same guild are cancelled.
	pub fn signals(&self, guild_id: u64, generation: u64) -> DuelSignals {
		let mut slots = self.slots.lock();
		let current = slots
			.get(&guild_id)
			.filter(|slot| slot.generation == generation)
			.map(Slot::signals);

		if let Some(signals) = current {
			return signals;
		}

		let slot = Slot::new(generation);
		let signals = slot.signals();
		if let Some(stale) = slots.insert(guild_id, slot) {
			stale.cancel.cancel();
		}

		signals
	}

	pub fn notify_accepted(&self, guild_id: u64, generation: u64, player2_id: u64) {
		if let Some(slot) = self.slots.lock().get(&guild_id) {
			if slot.generation == generation {
				slot.accepted.send_replace(Some(player2_id));
			}
		}
	}

	/// Wakes up and forgets everything waiting on a specific duel.
	/// Newer duels in the same guild are left alone.
	pub fn cancel_generation(&self, guild_id: u64, generation: u64) {
		let mut slots = self.slots.lock();
		if slots.get(&guild_id).is_some_and(|slot| slot.generation == generation) {
			if let Some(slot) = slots.remove(&guild_id) {
				slot.cancel.cancel();
			}
		}
	}

	/// Forgets a finished duel without waking anything up.
	pub fn release(&self, guild_id: u64, generation: u64) {
		let mut slots = self.slots.lock();
		if slots.get(&guild_id).is_some_and(|slot| slot.generation == generation) {
			slots.remove(&guild_id);
		}
	}
}

// {{{ Tests
#[cfg(test)]
mod tests {
	use super::*;

	const TIMEOUT: Duration = Duration::from_secs(180);

	#[tokio::test]
	async fn acceptance_wakes_waiters() {
		let hub = DuelHub::default();
		let mut signals = hub.signals(1, 1);

		hub.notify_accepted(1, 1, 42);
		assert_eq!(signals.wait_for_acceptance(TIMEOUT).await, AcceptWait::Accepted(42));
	}

	#[tokio::test(start_paused = true)]
	async fn stale_notifications_are_ignored() {
		let hub = DuelHub::default();
		let mut signals = hub.signals(1, 2);

		hub.notify_accepted(1, 1, 42);
		hub.notify_accepted(2, 2, 42);

		assert_eq!(signals.wait_for_acceptance(TIMEOUT).await, AcceptWait::TimedOut);
	}

	#[tokio::test]
	async fn cancelling_wakes_everyone() {
		let hub = DuelHub::default();
		let first = hub.signals(1, 1);
		let second = hub.signals(1, 1);

		hub.cancel_generation(1, 1);
		first.cancelled().await;
		second.cancelled().await;
	}

	#[tokio::test]
	async fn newer_duels_cancel_older_signals() {
		let hub = DuelHub::default();
		let old = hub.signals(1, 1);
		let new = hub.signals(1, 2);

		old.cancelled().await;
		assert!(!new.is_cancelled());

		// Stale generations leave the current one alone
		hub.release(1, 1);
		hub.cancel_generation(1, 1);
		assert!(!new.is_cancelled());

		hub.cancel_generation(1, 2);
		assert!(new.is_cancelled());
	}

	#[tokio::test(start_paused = true)]
	async fn waiting_reports_what_happened() {
		let hub = DuelHub::default();

		let mut signals = hub.signals(1, 1);
		hub.notify_accepted(1, 1, 7);
		assert_eq!(signals.wait_for_acceptance(TIMEOUT).await, AcceptWait::Accepted(7));

		let mut signals = hub.signals(2, 1);
		hub.cancel_generation(2, 1);
		assert_eq!(signals.wait_for_acceptance(TIMEOUT).await, AcceptWait::Cancelled);

		let mut signals = hub.signals(3, 1);
		let started = tokio::time::Instant::now();
		assert_eq!(signals.wait_for_acceptance(TIMEOUT).await, AcceptWait::TimedOut);
		assert!(started.elapsed() >= TIMEOUT);
	}

	#[tokio::test(start_paused = true)]
	async fn released_duels_stop_resolving() {
		let hub = DuelHub::default();
		let mut signals = hub.signals(1, 1);
		hub.release(1, 1);
		hub.notify_accepted(1, 1, 42);

		assert_eq!(signals.wait_for_acceptance(TIMEOUT).await, AcceptWait::TimedOut);
		assert!(!signals.is_cancelled());
	}
}
// }}}
