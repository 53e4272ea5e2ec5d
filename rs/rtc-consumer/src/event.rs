use std::sync::Arc;

use parking_lot::Mutex;

use crate::{ListenerId, ListenerIds};

/// Public lifecycle events, delivered to any listener registered with [crate::Consumer::on].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsumerEvent {
	/// The transport underneath the consumer went away.
	TransportClose,

	/// The track reported the end of its life.
	TrackEnded,
}

/// Events for passive observers, registered via [crate::Consumer::observer].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObserverEvent {
	Close,
	Pause,
	Resume,
	TrackEnded,
}

impl ObserverEvent {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Close => "close",
			Self::Pause => "pause",
			Self::Resume => "resume",
			Self::TrackEnded => "trackended",
		}
	}
}

impl std::fmt::Display for ObserverEvent {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

impl ConsumerEvent {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::TransportClose => "transportclose",
			Self::TrackEnded => "trackended",
		}
	}
}

impl std::fmt::Display for ConsumerEvent {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

pub type Listener<E> = Arc<dyn Fn(&E) -> anyhow::Result<()> + Send + Sync>;

/// A registry of listeners for a single event type.
///
/// Emission is failure-isolated: a listener returning an error is logged and the
/// remaining listeners still run. Nothing is ever returned to the emitter.
pub struct Emitter<E> {
	state: Arc<EmitterState<E>>,
}

struct EmitterState<E> {
	listeners: Mutex<Vec<(ListenerId, Listener<E>)>>,
	ids: ListenerIds,
}

impl<E> Emitter<E> {
	pub fn new() -> Self {
		Self {
			state: Arc::new(EmitterState {
				listeners: Mutex::new(Vec::new()),
				ids: ListenerIds::default(),
			}),
		}
	}

	/// Register a listener, returning an ID that can be passed to [Self::off].
	pub fn on<F>(&self, listener: F) -> ListenerId
	where
		F: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
	{
		let id = self.state.ids.next();
		self.state.listeners.lock().push((id, Arc::new(listener)));
		id
	}

	/// Remove a listener, returning false if it was not registered.
	pub fn off(&self, id: ListenerId) -> bool {
		let mut listeners = self.state.listeners.lock();
		let before = listeners.len();
		listeners.retain(|(existing, _)| *existing != id);
		listeners.len() != before
	}

	pub fn listener_count(&self) -> usize {
		self.state.listeners.lock().len()
	}
}

impl<E: std::fmt::Debug> Emitter<E> {
	/// Deliver the event to every listener in registration order.
	pub fn emit(&self, event: &E) {
		// Don't hold the lock while calling out; listeners may register or remove listeners.
		let listeners: Vec<_> = self
			.state
			.listeners
			.lock()
			.iter()
			.map(|(id, listener)| (*id, listener.clone()))
			.collect();

		for (id, listener) in listeners {
			if let Err(err) = listener(event) {
				tracing::warn!(?event, listener = %id, %err, "event listener failed");
			}
		}
	}
}

impl<E> Default for Emitter<E> {
	fn default() -> Self {
		Self::new()
	}
}

impl<E> Clone for Emitter<E> {
	fn clone(&self) -> Self {
		Self {
			state: self.state.clone(),
		}
	}
}
