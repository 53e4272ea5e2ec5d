use std::num::NonZero;
use std::sync::atomic::{AtomicUsize, Ordering};

/// An opaque handle returned when registering a listener, used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(NonZero<usize>);

impl std::fmt::Display for ListenerId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0.get())
	}
}

impl From<ListenerId> for usize {
	fn from(value: ListenerId) -> Self {
		value.0.get()
	}
}

// We purposely never hand out 0, and never reuse an ID.
#[derive(Debug, Default)]
pub struct ListenerIds(AtomicUsize);

impl ListenerIds {
	pub fn next(&self) -> ListenerId {
		let id = self.0.fetch_add(1, Ordering::Relaxed);
		ListenerId(NonZero::<usize>::MIN.saturating_add(id))
	}
}
