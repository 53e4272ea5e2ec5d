use std::collections::{HashMap, hash_map::Entry};
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;

use crate::{Consumer, ConsumerOptions, ConsumerSignal, ConsumerSignals, Error, StatsReport, StatsRequest};

/// Performs the actual receiving work on behalf of a [Transport].
///
/// Consumers are identified by their local ID.
pub trait Handler: Send + Sync + 'static {
	fn pause_receiving(&self, local_id: &str) -> anyhow::Result<()>;

	fn resume_receiving(&self, local_id: &str) -> anyhow::Result<()>;

	fn stop_receiving(&self, local_id: &str) -> anyhow::Result<()>;

	fn receiver_stats(&self, local_id: &str) -> BoxFuture<'static, anyhow::Result<StatsReport>>;
}

/// The owner of a set of consumers.
///
/// Listens to each consumer's signals and forwards them to the [Handler].
#[derive(Clone)]
pub struct Transport {
	id: Arc<str>,
	handler: Arc<dyn Handler>,
	state: Arc<Mutex<TransportState>>,
}

#[derive(Default)]
struct TransportState {
	closed: bool,
	consumers: HashMap<String, Consumer>,
}

impl Transport {
	pub fn new(id: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
		let id: String = id.into();
		Self {
			id: id.into(),
			handler,
			state: Default::default(),
		}
	}

	pub fn id(&self) -> &str {
		&self.id
	}

	pub fn closed(&self) -> bool {
		self.state.lock().closed
	}

	/// Create and register a consumer.
	///
	/// Must be called within a tokio runtime; each consumer gets a task that serves its signals.
	pub fn consume(&self, options: ConsumerOptions) -> Result<Consumer, Error> {
		let mut state = self.state.lock();
		if state.closed {
			return Err(Error::TransportClosed);
		}

		let entry = match state.consumers.entry(options.id.clone()) {
			Entry::Occupied(_) => return Err(Error::Duplicate(options.id)),
			Entry::Vacant(entry) => entry,
		};

		let (consumer, signals) = Consumer::new(options);
		entry.insert(consumer.clone());

		tracing::debug!(transport = %self.id, consumer = %consumer.id(), kind = %consumer.kind(), "consume");

		let this = self.clone();
		let served = consumer.clone();
		web_async::spawn(async move {
			this.run_consumer(&served, signals).await;
			this.remove(&served);
		});

		Ok(consumer)
	}

	async fn run_consumer(&self, consumer: &Consumer, mut signals: ConsumerSignals) {
		while let Some(signal) = signals.next().await {
			let local_id = consumer.local_id();

			let res = match signal {
				ConsumerSignal::Close => {
					self.remove(consumer);
					self.handler.stop_receiving(local_id)
				}
				ConsumerSignal::Pause => self.handler.pause_receiving(local_id),
				ConsumerSignal::Resume => self.handler.resume_receiving(local_id),
				ConsumerSignal::GetStats(request) => {
					// Run separately so a slow request doesn't hold up other signals.
					web_async::spawn(Self::serve_stats(self.handler.receiver_stats(local_id), request));
					Ok(())
				}
			};

			if let Err(err) = res {
				tracing::warn!(transport = %self.id, consumer = %consumer.id(), %err, "handler failed");
			}
		}
	}

	async fn serve_stats(stats: BoxFuture<'static, anyhow::Result<StatsReport>>, request: StatsRequest) {
		match stats.await {
			Ok(report) => request.resolve(report),
			Err(err) => request.reject(err),
		}
	}

	// Only remove the entry if it's still this exact consumer.
	fn remove(&self, consumer: &Consumer) {
		let mut state = self.state.lock();
		if let Entry::Occupied(entry) = state.consumers.entry(consumer.id().to_string()) {
			if entry.get().same(consumer) {
				entry.remove();
			}
		}
	}

	pub fn consumer(&self, id: &str) -> Option<Consumer> {
		self.state.lock().consumers.get(id).cloned()
	}

	pub fn consumer_count(&self) -> usize {
		self.state.lock().consumers.len()
	}

	/// Close the transport, closing every consumer with [Consumer::transport_closed].
	pub fn close(&self) {
		let consumers = {
			let mut state = self.state.lock();
			if state.closed {
				return;
			}
			state.closed = true;
			std::mem::take(&mut state.consumers)
		};

		tracing::debug!(transport = %self.id, consumers = consumers.len(), "transport closed");

		// Listeners run during transport_closed, so don't hold the lock.
		for consumer in consumers.into_values() {
			consumer.transport_closed();
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use std::time::Duration;

	use crate::{ConsumerEvent, MediaKind, MemoryTrack, RtpParameters};

	#[derive(Default)]
	struct FakeHandler {
		calls: Mutex<Vec<String>>,
		fail_stats: bool,
	}

	impl FakeHandler {
		fn calls(&self) -> Vec<String> {
			self.calls.lock().clone()
		}
	}

	impl Handler for FakeHandler {
		fn pause_receiving(&self, local_id: &str) -> anyhow::Result<()> {
			self.calls.lock().push(format!("pause:{local_id}"));
			Ok(())
		}

		fn resume_receiving(&self, local_id: &str) -> anyhow::Result<()> {
			self.calls.lock().push(format!("resume:{local_id}"));
			anyhow::bail!("resume is flaky")
		}

		fn stop_receiving(&self, local_id: &str) -> anyhow::Result<()> {
			self.calls.lock().push(format!("stop:{local_id}"));
			Ok(())
		}

		fn receiver_stats(&self, local_id: &str) -> BoxFuture<'static, anyhow::Result<StatsReport>> {
			let local_id = local_id.to_string();
			let fail = self.fail_stats;
			Box::pin(async move {
				anyhow::ensure!(!fail, "no stats for {local_id}");
				let mut report = StatsReport::now();
				report.insert(format!("inbound-{local_id}"), serde_json::json!({ "packetsReceived": 10 }));
				Ok(report)
			})
		}
	}

	fn options(id: &str, local_id: &str) -> (ConsumerOptions, MemoryTrack) {
		let track = MemoryTrack::new(format!("track-{id}"), MediaKind::Audio);
		let options = ConsumerOptions::new(id, local_id, "p1", Arc::new(track.clone()), RtpParameters::default());
		(options, track)
	}

	async fn settle() {
		// Let the consumer tasks drain their signals.
		for _ in 0..10 {
			tokio::task::yield_now().await;
		}
	}

	#[tokio::test]
	async fn test_consume_and_forward_signals() {
		let handler = Arc::new(FakeHandler::default());
		let transport = Transport::new("t1", handler.clone());

		let (options, track) = options("c1", "0");
		let consumer = transport.consume(options).unwrap();
		assert_eq!(transport.consumer_count(), 1);
		assert_eq!(transport.consumer("c1").unwrap().local_id(), "0");

		consumer.pause();
		consumer.resume();
		settle().await;

		// A failing handler call doesn't stop the consumer task.
		consumer.close();
		settle().await;

		assert_eq!(handler.calls(), ["pause:0", "resume:0", "stop:0"]);
		assert!(track.stopped());
		assert_eq!(transport.consumer_count(), 0);
		assert!(transport.consumer("c1").is_none());
	}

	#[tokio::test]
	async fn test_duplicate_consumer() {
		let transport = Transport::new("t1", Arc::new(FakeHandler::default()));

		let (first, _) = options("c1", "0");
		let (second, _) = options("c1", "1");

		transport.consume(first).unwrap();
		assert!(matches!(transport.consume(second), Err(Error::Duplicate(id)) if id == "c1"));
	}

	#[tokio::test]
	async fn test_get_stats_through_transport() {
		let transport = Transport::new("t1", Arc::new(FakeHandler::default()));

		let (options, _track) = options("c1", "7");
		let consumer = transport.consume(options).unwrap();

		let report = consumer.get_stats().await.unwrap();
		assert_eq!(report.get("inbound-7").unwrap()["packetsReceived"], 10);
	}

	#[tokio::test]
	async fn test_get_stats_rejected_by_handler() {
		let handler = Arc::new(FakeHandler {
			fail_stats: true,
			..Default::default()
		});
		let transport = Transport::new("t1", handler);

		let (options, _track) = options("c1", "0");
		let consumer = transport.consume(options).unwrap();

		let err = consumer.get_stats().await.unwrap_err();
		assert!(matches!(err, Error::Stats(_)));
		assert!(err.to_string().contains("no stats for 0"));
	}

	#[tokio::test]
	async fn test_close_transport() {
		let handler = Arc::new(FakeHandler::default());
		let transport = Transport::new("t1", handler.clone());

		let (first, first_track) = options("c1", "0");
		let (second, second_track) = options("c2", "1");
		let first = transport.consume(first).unwrap();
		let second = transport.consume(second).unwrap();

		let events = Arc::new(Mutex::new(Vec::new()));
		for consumer in [&first, &second] {
			let events = events.clone();
			consumer.on(move |event| {
				events.lock().push(*event);
				Ok(())
			});
		}

		transport.close();
		transport.close();
		settle().await;

		assert!(transport.closed());
		assert!(first.closed() && second.closed());
		assert!(first_track.stopped() && second_track.stopped());
		assert_eq!(*events.lock(), vec![ConsumerEvent::TransportClose; 2]);

		// The transport path doesn't ask the handler to stop receiving.
		assert!(handler.calls().is_empty());
		assert_eq!(transport.consumer_count(), 0);

		let (options, _) = options("c3", "2");
		assert!(matches!(transport.consume(options), Err(Error::TransportClosed)));
	}

	#[tokio::test(start_paused = true)]
	async fn test_slow_stats_do_not_block_signals() {
		struct SlowHandler(FakeHandler);

		impl Handler for SlowHandler {
			fn pause_receiving(&self, local_id: &str) -> anyhow::Result<()> {
				self.0.pause_receiving(local_id)
			}

			fn resume_receiving(&self, local_id: &str) -> anyhow::Result<()> {
				self.0.resume_receiving(local_id)
			}

			fn stop_receiving(&self, local_id: &str) -> anyhow::Result<()> {
				self.0.stop_receiving(local_id)
			}

			fn receiver_stats(&self, _local_id: &str) -> BoxFuture<'static, anyhow::Result<StatsReport>> {
				Box::pin(async {
					tokio::time::sleep(Duration::from_secs(5)).await;
					Ok(StatsReport::now())
				})
			}
		}

		let handler = Arc::new(SlowHandler(FakeHandler::default()));
		let transport = Transport::new("t1", handler.clone());

		let (options, _track) = options("c1", "0");
		let consumer = transport.consume(options).unwrap();

		let stats = tokio::spawn({
			let consumer = consumer.clone();
			async move { consumer.get_stats().await }
		});
		settle().await;

		consumer.pause();
		settle().await;
		assert_eq!(handler.0.calls(), ["pause:0"]);
		assert!(!stats.is_finished());

		tokio::time::sleep(Duration::from_secs(6)).await;
		assert!(stats.await.unwrap().is_ok());
	}
}
