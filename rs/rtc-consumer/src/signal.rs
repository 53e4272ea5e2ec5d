use tokio::sync::{mpsc, oneshot};

use crate::{Error, StatsReport};

/// A signal from a [crate::Consumer] to its owner.
///
/// Only the owner receives these, via [ConsumerSignals].
#[derive(Debug)]
pub enum ConsumerSignal {
	/// The consumer was closed by its user; the owner should deregister it.
	Close,

	/// The consumer was paused; the owner should stop receiving media for it.
	Pause,

	/// The consumer was resumed.
	Resume,

	/// The user asked for statistics; the owner must answer the request.
	GetStats(StatsRequest),
}

/// A pending [crate::Consumer::get_stats] call.
///
/// Answering consumes the request, so it can be answered at most once.
/// Dropping it unanswered fails the call with [Error::Cancelled].
#[derive(Debug)]
pub struct StatsRequest {
	id: u64,
	respond_to: oneshot::Sender<Result<StatsReport, Error>>,
}

impl StatsRequest {
	pub(crate) fn new(id: u64) -> (Self, oneshot::Receiver<Result<StatsReport, Error>>) {
		let (respond_to, rx) = oneshot::channel();
		(Self { id, respond_to }, rx)
	}

	/// A per-consumer sequence number identifying this request.
	pub fn id(&self) -> u64 {
		self.id
	}

	pub fn resolve(self, report: StatsReport) {
		// The caller may have given up waiting; nothing to do then.
		let _ = self.respond_to.send(Ok(report));
	}

	pub fn reject(self, err: impl Into<Error>) {
		let _ = self.respond_to.send(Err(err.into()));
	}

	/// Returns true if the caller is no longer waiting for an answer.
	pub fn is_abandoned(&self) -> bool {
		self.respond_to.is_closed()
	}
}

/// The owner's side of a consumer: a single-subscriber stream of [ConsumerSignal]s.
///
/// The stream ends once the consumer is closed and every queued signal was received.
#[derive(Debug)]
pub struct ConsumerSignals {
	rx: mpsc::UnboundedReceiver<ConsumerSignal>,
}

impl ConsumerSignals {
	pub(crate) fn new() -> (mpsc::UnboundedSender<ConsumerSignal>, Self) {
		let (tx, rx) = mpsc::unbounded_channel();
		(tx, Self { rx })
	}

	/// Wait for the next signal, returning None when the consumer is gone.
	pub async fn next(&mut self) -> Option<ConsumerSignal> {
		self.rx.recv().await
	}

	/// Return the next signal if one is already queued.
	pub fn try_next(&mut self) -> Option<ConsumerSignal> {
		self.rx.try_recv().ok()
	}
}
