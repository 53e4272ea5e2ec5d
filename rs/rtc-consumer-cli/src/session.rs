use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use rand::Rng;
use rtc_consumer::{
	Consumer, ConsumerEvent, ConsumerOptions, Handler, MediaKind, MemoryTrack, RtcpParameters, RtpCodecParameters,
	RtpEncodingParameters, RtpParameters, StatsReport, Transport,
};
use tokio::sync::mpsc;
use tokio::time::{Instant, interval_at};

use crate::config::SessionConfig;

/// Fabricates inbound-rtp statistics for each consumer it receives.
#[derive(Default)]
pub struct SimHandler {
	receivers: Mutex<HashMap<String, SimReceiver>>,
}

struct SimReceiver {
	kind: MediaKind,
	paused: bool,
	packets: u64,
	bytes: u64,
}

impl SimHandler {
	pub fn register(&self, local_id: &str, kind: MediaKind) {
		let receiver = SimReceiver {
			kind,
			paused: false,
			packets: 0,
			bytes: 0,
		};
		self.receivers.lock().insert(local_id.to_string(), receiver);
	}

	fn update(&self, local_id: &str, f: impl FnOnce(&mut SimReceiver)) -> anyhow::Result<()> {
		let mut receivers = self.receivers.lock();
		let receiver = receivers
			.get_mut(local_id)
			.ok_or_else(|| anyhow::anyhow!("unknown receiver: {local_id}"))?;
		f(receiver);
		Ok(())
	}

	fn snapshot(&self, local_id: &str) -> anyhow::Result<StatsReport> {
		let mut receivers = self.receivers.lock();
		let receiver = receivers
			.get_mut(local_id)
			.ok_or_else(|| anyhow::anyhow!("unknown receiver: {local_id}"))?;

		let mut rng = rand::rng();

		if !receiver.paused {
			let (packets, size): (u64, u64) = match receiver.kind {
				MediaKind::Audio => (rng.random_range(45..=55), 160),
				MediaKind::Video => (rng.random_range(80..=140), 1100),
			};
			receiver.packets += packets;
			receiver.bytes += packets * size;
		}

		let mut report = StatsReport::now();
		report.insert(
			format!("inbound-rtp-{local_id}"),
			serde_json::json!({
				"type": "inbound-rtp",
				"kind": receiver.kind,
				"packetsReceived": receiver.packets,
				"bytesReceived": receiver.bytes,
				"jitter": rng.random_range(0.001..0.02),
			}),
		);

		Ok(report)
	}
}

impl Handler for SimHandler {
	fn pause_receiving(&self, local_id: &str) -> anyhow::Result<()> {
		self.update(local_id, |receiver| receiver.paused = true)
	}

	fn resume_receiving(&self, local_id: &str) -> anyhow::Result<()> {
		self.update(local_id, |receiver| receiver.paused = false)
	}

	fn stop_receiving(&self, local_id: &str) -> anyhow::Result<()> {
		self.receivers
			.lock()
			.remove(local_id)
			.map(|_| ())
			.ok_or_else(|| anyhow::anyhow!("unknown receiver: {local_id}"))
	}

	fn receiver_stats(&self, local_id: &str) -> BoxFuture<'static, anyhow::Result<StatsReport>> {
		let report = self.snapshot(local_id);
		Box::pin(async move { report })
	}
}

fn rtp_parameters(kind: MediaKind, ssrc: u32) -> RtpParameters {
	let codec = match kind {
		MediaKind::Audio => RtpCodecParameters {
			mime_type: "audio/opus".to_string(),
			payload_type: 100,
			clock_rate: 48000,
			channels: Some(2),
			..Default::default()
		},
		MediaKind::Video => RtpCodecParameters {
			mime_type: "video/VP8".to_string(),
			payload_type: 101,
			clock_rate: 90000,
			..Default::default()
		},
	};

	RtpParameters {
		mid: Some(ssrc.to_string()),
		codecs: vec![codec],
		encodings: vec![RtpEncodingParameters {
			ssrc: Some(ssrc),
			..Default::default()
		}],
		rtcp: Some(RtcpParameters {
			cname: Some("rtc-consumer".to_string()),
			reduced_size: true,
		}),
		..Default::default()
	}
}

struct Consumed {
	consumer: Consumer,
	track: MemoryTrack,
}

pub async fn run(config: SessionConfig) -> anyhow::Result<()> {
	let handler = Arc::new(SimHandler::default());
	let transport = Transport::new("sim", handler.clone());

	// Consumers whose track ended, to be closed from the main loop.
	let (ended_tx, mut ended_rx) = mpsc::unbounded_channel::<String>();

	let kinds = std::iter::repeat_n(MediaKind::Audio, config.audio())
		.chain(std::iter::repeat_n(MediaKind::Video, config.video()));

	let mut consumed = Vec::new();
	for (index, kind) in kinds.enumerate() {
		let local_id = index.to_string();
		handler.register(&local_id, kind);

		let track = MemoryTrack::new(format!("track-{index}"), kind);
		let ssrc = 1000 + u32::try_from(index)?;
		let options = ConsumerOptions::new(
			format!("consumer-{index}"),
			local_id,
			format!("producer-{index}"),
			Arc::new(track.clone()),
			rtp_parameters(kind, ssrc),
		);
		let consumer = transport.consume(options)?;

		let id = consumer.id().to_string();
		consumer.observer().on(move |event| {
			tracing::info!(consumer = %id, %event, "observer");
			Ok(())
		});

		let id = consumer.id().to_string();
		let ended = ended_tx.clone();
		consumer.on(move |event| {
			if *event == ConsumerEvent::TrackEnded {
				ended.send(id.clone())?;
			}
			Ok(())
		});

		consumed.push(Consumed { consumer, track });
	}

	tracing::info!(consumers = consumed.len(), duration = ?config.duration(), "session started");

	let start = Instant::now();
	let stats_interval = config.stats_interval();
	let toggle_interval = config.toggle_interval();
	let mut stats = interval_at(start + stats_interval, stats_interval);
	let mut toggle = interval_at(start + toggle_interval, toggle_interval);

	let deadline = tokio::time::sleep(config.duration());
	let halfway = tokio::time::sleep(config.duration() / 2);
	let ctrl_c = tokio::signal::ctrl_c();
	tokio::pin!(deadline, halfway, ctrl_c);
	let mut ended_early = false;

	loop {
		tokio::select! {
			_ = &mut deadline => break,
			res = &mut ctrl_c => {
				res?;
				tracing::info!("interrupted");
				break;
			}
			_ = &mut halfway, if !ended_early => {
				ended_early = true;
				// Simulate the remote side ending the last video track.
				if let Some(last) = consumed.iter().rev().find(|c| c.consumer.kind() == MediaKind::Video) {
					last.track.end();
				}
			}
			Some(id) = ended_rx.recv() => {
				if let Some(ended) = transport.consumer(&id) {
					tracing::info!(consumer = %id, "track ended, closing consumer");
					ended.close();
				}
			}
			_ = stats.tick() => print_stats(&consumed).await?,
			_ = toggle.tick() => {
				toggle_all(&consumed);
			}
		}
	}

	transport.close();

	for Consumed { consumer, track } in &consumed {
		consumer.wait_closed().await;
		tracing::debug!(consumer = %consumer.id(), stopped = track.stopped(), "consumer finished");
	}

	tracing::info!("session closed");

	Ok(())
}

// Flip every open consumer between paused and resumed, returning how many were flipped.
fn toggle_all(consumed: &[Consumed]) -> usize {
	let open = consumed.iter().map(|c| &c.consumer).filter(|consumer| !consumer.closed());

	let mut count = 0;
	for consumer in open {
		if consumer.paused() {
			consumer.resume();
		} else {
			consumer.pause();
		}
		count += 1;
	}

	count
}

async fn print_stats(consumed: &[Consumed]) -> anyhow::Result<()> {
	let open = consumed.iter().map(|c| &c.consumer).filter(|consumer| !consumer.closed());
	let reports =
		futures::future::join_all(open.map(|consumer| async move { (consumer, consumer.get_stats().await) })).await;

	for (consumer, report) in reports {
		match report {
			Ok(report) => {
				let line = serde_json::json!({
					"consumer": consumer.id(),
					"kind": consumer.kind(),
					"paused": consumer.paused(),
					"stats": report,
				});
				println!("{}", serde_json::to_string(&line)?);
			}
			Err(err) => tracing::warn!(consumer = %consumer.id(), %err, "failed to get stats"),
		}
	}

	Ok(())
}
