use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};
use tokio::sync::{mpsc, watch};

use crate::{
	ConsumerEvent, ConsumerSignal, ConsumerSignals, Emitter, Error, ListenerId, MediaKind, ObserverEvent, RtpParameters,
	RtpReceiver, StatsReport, StatsRequest, Track,
};

/// Arbitrary application data attached to a consumer.
pub type AppData = serde_json::Map<String, serde_json::Value>;

/// Everything needed to create a [Consumer].
pub struct ConsumerOptions {
	pub id: String,
	pub local_id: String,
	pub producer_id: String,
	pub track: Arc<dyn Track>,
	pub rtp_parameters: RtpParameters,
	pub rtp_receiver: Option<Arc<dyn RtpReceiver>>,
	pub app_data: AppData,

	/// The initial paused state.
	///
	/// If None, it's derived from the track: a disabled track means paused.
	/// Otherwise the track is enabled or disabled to match.
	pub paused: Option<bool>,
}

impl ConsumerOptions {
	pub fn new(
		id: impl Into<String>,
		local_id: impl Into<String>,
		producer_id: impl Into<String>,
		track: Arc<dyn Track>,
		rtp_parameters: RtpParameters,
	) -> Self {
		Self {
			id: id.into(),
			local_id: local_id.into(),
			producer_id: producer_id.into(),
			track,
			rtp_parameters,
			rtp_receiver: None,
			app_data: AppData::new(),
			paused: None,
		}
	}

	pub fn with_rtp_receiver(mut self, receiver: Arc<dyn RtpReceiver>) -> Self {
		self.rtp_receiver = Some(receiver);
		self
	}

	pub fn with_app_data(mut self, app_data: AppData) -> Self {
		self.app_data = app_data;
		self
	}

	pub fn with_paused(mut self, paused: bool) -> Self {
		self.paused = Some(paused);
		self
	}
}

/// The receiving side of a single media track.
///
/// Cloning is cheap and every clone refers to the same consumer.
#[derive(Clone)]
pub struct Consumer {
	inner: Arc<Inner>,
}

struct Inner {
	id: String,
	local_id: String,
	producer_id: String,
	kind: MediaKind,
	rtp_parameters: RtpParameters,
	track: Arc<dyn Track>,
	rtp_receiver: Option<Arc<dyn RtpReceiver>>,

	state: Mutex<State>,

	// Held from a transition until its events are delivered, so observers see transitions in order.
	// Reentrant so listeners can call back into the consumer.
	order: ReentrantMutex<()>,

	// Flipped to true exactly once, waking any outstanding stats requests.
	closed: watch::Sender<bool>,

	events: Emitter<ConsumerEvent>,
	observer: Emitter<ObserverEvent>,
}

struct State {
	closed: bool,
	paused: bool,
	app_data: AppData,

	// Dropped on close, which ends the owner's signal stream.
	signals: Option<mpsc::UnboundedSender<ConsumerSignal>>,

	// Our end-of-life handler on the track, removed on close.
	ended: Option<ListenerId>,

	next_stats: u64,
}

impl State {
	fn signal(&self, signal: ConsumerSignal) -> Result<(), Error> {
		let signals = self.signals.as_ref().ok_or(Error::Detached)?;
		signals.send(signal).map_err(|_| Error::Detached)
	}
}

impl Consumer {
	/// Create a consumer, returning it along with the signals meant for its owner.
	pub fn new(options: ConsumerOptions) -> (Self, ConsumerSignals) {
		let ConsumerOptions {
			id,
			local_id,
			producer_id,
			track,
			rtp_parameters,
			rtp_receiver,
			app_data,
			paused,
		} = options;

		let paused = match paused {
			Some(paused) => {
				track.set_enabled(!paused);
				paused
			}
			None => !track.enabled(),
		};

		let (tx, signals) = ConsumerSignals::new();

		let inner = Arc::new(Inner {
			kind: track.kind(),
			id,
			local_id,
			producer_id,
			rtp_parameters,
			track,
			rtp_receiver,
			state: Mutex::new(State {
				closed: false,
				paused,
				app_data,
				signals: Some(tx),
				ended: None,
				next_stats: 0,
			}),
			order: ReentrantMutex::new(()),
			closed: watch::channel(false).0,
			events: Emitter::new(),
			observer: Emitter::new(),
		});

		// A weak reference so the track doesn't keep the consumer alive.
		let weak = Arc::downgrade(&inner);
		let ended = inner.track.on_ended(Arc::new(move || {
			if let Some(inner) = weak.upgrade() {
				Consumer { inner }.on_track_ended();
			}
		}));
		inner.state.lock().ended = Some(ended);

		tracing::debug!(id = %inner.id, producer = %inner.producer_id, kind = %inner.kind, paused, "consumer created");

		(Self { inner }, signals)
	}

	pub fn id(&self) -> &str {
		&self.inner.id
	}

	pub fn local_id(&self) -> &str {
		&self.inner.local_id
	}

	pub fn producer_id(&self) -> &str {
		&self.inner.producer_id
	}

	pub fn kind(&self) -> MediaKind {
		self.inner.kind
	}

	pub fn rtp_parameters(&self) -> &RtpParameters {
		&self.inner.rtp_parameters
	}

	pub fn track(&self) -> &Arc<dyn Track> {
		&self.inner.track
	}

	pub fn rtp_receiver(&self) -> Option<&Arc<dyn RtpReceiver>> {
		self.inner.rtp_receiver.as_ref()
	}

	pub fn closed(&self) -> bool {
		self.inner.state.lock().closed
	}

	pub fn paused(&self) -> bool {
		self.inner.state.lock().paused
	}

	pub fn app_data(&self) -> AppData {
		self.inner.state.lock().app_data.clone()
	}

	pub fn set_app_data(&self, app_data: AppData) {
		self.inner.state.lock().app_data = app_data;
	}

	/// Returns true if both handles refer to the same consumer.
	pub fn same(&self, other: &Consumer) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner)
	}

	/// Listen for public lifecycle events.
	pub fn on<F>(&self, listener: F) -> ListenerId
	where
		F: Fn(&ConsumerEvent) -> anyhow::Result<()> + Send + Sync + 'static,
	{
		self.inner.events.on(listener)
	}

	pub fn off(&self, id: ListenerId) -> bool {
		self.inner.events.off(id)
	}

	/// The observer channel, for passive listeners such as UI or telemetry.
	pub fn observer(&self) -> &Emitter<ObserverEvent> {
		&self.inner.observer
	}

	/// Stop delivering media. A no-op if already paused or closed.
	pub fn pause(&self) {
		let _order = self.inner.order.lock();

		{
			let mut state = self.inner.state.lock();
			if state.closed {
				tracing::warn!(id = %self.id(), "pause() on a closed consumer");
				return;
			}

			if state.paused {
				return;
			}

			state.paused = true;
			self.inner.track.set_enabled(false);

			if let Err(err) = state.signal(ConsumerSignal::Pause) {
				tracing::error!(id = %self.id(), %err, "failed to signal pause");
			}
		}

		tracing::debug!(id = %self.id(), "paused");
		self.inner.observer.emit(&ObserverEvent::Pause);
	}

	/// Resume delivering media. A no-op if not paused or closed.
	pub fn resume(&self) {
		let _order = self.inner.order.lock();

		{
			let mut state = self.inner.state.lock();
			if state.closed {
				tracing::warn!(id = %self.id(), "resume() on a closed consumer");
				return;
			}

			if !state.paused {
				return;
			}

			state.paused = false;
			self.inner.track.set_enabled(true);

			if let Err(err) = state.signal(ConsumerSignal::Resume) {
				tracing::error!(id = %self.id(), %err, "failed to signal resume");
			}
		}

		tracing::debug!(id = %self.id(), "resumed");
		self.inner.observer.emit(&ObserverEvent::Resume);
	}

	/// Close the consumer, telling the owner to deregister it.
	pub fn close(&self) {
		let _order = self.inner.order.lock();

		if !self.terminate(Some(ConsumerSignal::Close)) {
			return;
		}

		tracing::debug!(id = %self.id(), "closed");
		self.inner.observer.emit(&ObserverEvent::Close);
	}

	/// Close the consumer because the transport underneath it is gone.
	///
	/// Called by the owner; emits [ConsumerEvent::TransportClose] instead of signaling the owner.
	pub fn transport_closed(&self) {
		let _order = self.inner.order.lock();

		if !self.terminate(None) {
			return;
		}

		tracing::debug!(id = %self.id(), "transport closed");
		self.inner.events.emit(&ConsumerEvent::TransportClose);
		self.inner.observer.emit(&ObserverEvent::Close);
	}

	// Returns false if we were already closed.
	fn terminate(&self, signal: Option<ConsumerSignal>) -> bool {
		let ended = {
			let mut state = self.inner.state.lock();
			if state.closed {
				return false;
			}

			state.closed = true;

			if let Some(signal) = signal {
				if let Err(err) = state.signal(signal) {
					tracing::error!(id = %self.id(), %err, "failed to signal close");
				}
			}

			// No more signals after this; the owner drains what's queued and sees the end.
			state.signals = None;
			state.ended.take()
		};

		// The track may call back into us, so it's torn down without the state lock.
		// pause() and resume() are no-ops from here on, so the track stays disabled.
		if let Some(ended) = ended {
			if let Err(err) = self.inner.track.remove_ended(ended) {
				tracing::debug!(id = %self.id(), %err, "failed to remove track handler");
			}
		}

		self.inner.track.set_enabled(false);
		if let Err(err) = self.inner.track.stop() {
			tracing::debug!(id = %self.id(), %err, "failed to stop track");
		}

		self.inner.closed.send_replace(true);

		true
	}

	fn on_track_ended(&self) {
		tracing::debug!(id = %self.id(), "track ended");
		self.inner.events.emit(&ConsumerEvent::TrackEnded);
		self.inner.observer.emit(&ObserverEvent::TrackEnded);
	}

	/// Ask the owner for a statistics snapshot.
	///
	/// Fails immediately with [Error::InvalidState] if closed.
	/// There's no timeout; the call waits until the owner answers or the consumer closes.
	pub async fn get_stats(&self) -> Result<StatsReport, Error> {
		let mut closed = self.inner.closed.subscribe();

		let response = {
			let mut state = self.inner.state.lock();
			if state.closed {
				return Err(Error::InvalidState);
			}

			let id = state.next_stats;
			state.next_stats += 1;

			let (request, response) = StatsRequest::new(id);
			state.signal(ConsumerSignal::GetStats(request))?;

			response
		};

		tokio::select! {
			// Prefer an answer that raced with close.
			biased;
			res = response => res.map_err(|_| Error::Cancelled)?,
			_ = closed.wait_for(|closed| *closed) => Err(Error::Closed),
		}
	}

	/// Block until the consumer is closed, by either path.
	pub async fn wait_closed(&self) {
		let mut closed = self.inner.closed.subscribe();
		// The sender lives as long as we do, so this can't fail.
		let _ = closed.wait_for(|closed| *closed).await;
	}
}

impl std::fmt::Debug for Consumer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.inner.state.lock();
		f.debug_struct("Consumer")
			.field("id", &self.inner.id)
			.field("producer_id", &self.inner.producer_id)
			.field("kind", &self.inner.kind)
			.field("closed", &state.closed)
			.field("paused", &state.paused)
			.finish()
	}
}

impl Drop for Inner {
	fn drop(&mut self) {
		// Don't leave a dangling handler on a track that outlives us.
		if let Some(ended) = self.state.get_mut().ended.take() {
			let _ = self.track.remove_ended(ended);
		}
	}
}
