use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{ListenerId, ListenerIds};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
	Audio,
	Video,
}

impl MediaKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Audio => "audio",
			Self::Video => "video",
		}
	}
}

impl std::fmt::Display for MediaKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, thiserror::Error)]
#[error("unknown media kind: {0}")]
pub struct UnknownMediaKind(String);

impl FromStr for MediaKind {
	type Err = UnknownMediaKind;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"audio" => Ok(Self::Audio),
			"video" => Ok(Self::Video),
			_ => Err(UnknownMediaKind(s.to_string())),
		}
	}
}

pub type EndedHandler = Arc<dyn Fn() + Send + Sync>;

/// The media resource a consumer controls.
///
/// The consumer flips the enabled flag and eventually stops the track, but never
/// allocates or frees it.
pub trait Track: Send + Sync {
	fn id(&self) -> &str;

	fn kind(&self) -> MediaKind;

	fn enabled(&self) -> bool;

	fn set_enabled(&self, enabled: bool);

	/// Stop the track permanently.
	fn stop(&self) -> anyhow::Result<()>;

	/// Register a handler for the end-of-life notification.
	fn on_ended(&self, handler: EndedHandler) -> ListenerId;

	fn remove_ended(&self, id: ListenerId) -> anyhow::Result<()>;
}

/// The endpoint the track's media is received through. Inspection only.
pub trait RtpReceiver: Send + Sync {
	fn mid(&self) -> Option<&str>;
}

/// An in-process [Track] that just records what was done to it.
///
/// Calling [MemoryTrack::end] simulates the remote side ending the track.
#[derive(Clone)]
pub struct MemoryTrack {
	id: Arc<str>,
	kind: MediaKind,
	state: Arc<Mutex<MemoryTrackState>>,
	ids: Arc<ListenerIds>,
}

#[derive(Default)]
struct MemoryTrackState {
	enabled: bool,
	stopped: bool,
	ended: bool,
	stop_count: usize,
	handlers: Vec<(ListenerId, EndedHandler)>,
	fail_stop: bool,
	fail_remove: bool,
	end_on_stop: bool,
}

impl MemoryTrack {
	pub fn new(id: impl Into<String>, kind: MediaKind) -> Self {
		let id: String = id.into();
		Self {
			id: id.into(),
			kind,
			state: Arc::new(Mutex::new(MemoryTrackState {
				enabled: true,
				..Default::default()
			})),
			ids: Default::default(),
		}
	}

	pub fn disabled(self) -> Self {
		self.state.lock().enabled = false;
		self
	}

	/// Make [Track::stop] return an error (after still stopping the track).
	pub fn fail_stop(self) -> Self {
		self.state.lock().fail_stop = true;
		self
	}

	/// Make [Track::remove_ended] return an error.
	pub fn fail_remove(self) -> Self {
		self.state.lock().fail_remove = true;
		self
	}

	/// Make [Track::stop] end the track, notifying the handlers before it returns.
	pub fn end_on_stop(self) -> Self {
		self.state.lock().end_on_stop = true;
		self
	}

	pub fn stopped(&self) -> bool {
		self.state.lock().stopped
	}

	pub fn stop_count(&self) -> usize {
		self.state.lock().stop_count
	}

	pub fn ended(&self) -> bool {
		self.state.lock().ended
	}

	pub fn handler_count(&self) -> usize {
		self.state.lock().handlers.len()
	}

	/// A snapshot of the registered end-of-life handlers.
	pub fn handlers(&self) -> Vec<EndedHandler> {
		self.state.lock().handlers.iter().map(|(_, handler)| handler.clone()).collect()
	}

	/// End the track, notifying every registered handler once.
	pub fn end(&self) {
		let handlers = {
			let mut state = self.state.lock();
			if state.ended {
				return;
			}
			state.ended = true;
			state.handlers.iter().map(|(_, handler)| handler.clone()).collect::<Vec<_>>()
		};

		for handler in handlers {
			handler();
		}
	}
}

impl Track for MemoryTrack {
	fn id(&self) -> &str {
		&self.id
	}

	fn kind(&self) -> MediaKind {
		self.kind
	}

	fn enabled(&self) -> bool {
		self.state.lock().enabled
	}

	fn set_enabled(&self, enabled: bool) {
		self.state.lock().enabled = enabled;
	}

	fn stop(&self) -> anyhow::Result<()> {
		let (fail, end) = {
			let mut state = self.state.lock();
			state.stopped = true;
			state.stop_count += 1;
			(state.fail_stop, state.end_on_stop)
		};

		if end {
			self.end();
		}

		anyhow::ensure!(!fail, "stop failed");

		Ok(())
	}

	fn on_ended(&self, handler: EndedHandler) -> ListenerId {
		let id = self.ids.next();
		self.state.lock().handlers.push((id, handler));
		id
	}

	fn remove_ended(&self, id: ListenerId) -> anyhow::Result<()> {
		let mut state = self.state.lock();
		if state.fail_remove {
			anyhow::bail!("remove failed");
		}

		let before = state.handlers.len();
		state.handlers.retain(|(existing, _)| *existing != id);
		anyhow::ensure!(state.handlers.len() != before, "unknown handler: {id}");

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use std::sync::atomic::{AtomicUsize, Ordering};

	#[test]
	fn test_kind_parse() {
		assert_eq!("audio".parse::<MediaKind>().unwrap(), MediaKind::Audio);
		assert_eq!(MediaKind::Video.to_string(), "video");
		assert!("data".parse::<MediaKind>().is_err());
		assert_eq!(serde_json::to_string(&MediaKind::Video).unwrap(), "\"video\"");
	}

	#[test]
	fn test_end_fires_once() {
		let track = MemoryTrack::new("t", MediaKind::Audio);
		let count = Arc::new(AtomicUsize::new(0));

		let counter = count.clone();
		track.on_ended(Arc::new(move || {
			counter.fetch_add(1, Ordering::SeqCst);
		}));

		track.end();
		track.end();

		assert!(track.ended());
		assert_eq!(count.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn test_remove_ended() {
		let track = MemoryTrack::new("t", MediaKind::Video);
		let id = track.on_ended(Arc::new(|| {}));

		assert_eq!(track.handler_count(), 1);
		track.remove_ended(id).unwrap();
		assert_eq!(track.handler_count(), 0);
		assert!(track.remove_ended(id).is_err());
	}
}
