//! Statistics snapshots returned by [crate::Consumer::get_stats].
//!
//! The consumer never produces statistics itself; the owner fetches them from the
//! receiving endpoint and hands back a [StatsReport].

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// A snapshot of statistics, keyed by stat ID.
///
/// Each entry is arbitrary JSON, mirroring a WebRTC stats report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
	/// Milliseconds since the UNIX epoch when the snapshot was taken.
	pub timestamp: u64,

	pub entries: BTreeMap<String, serde_json::Value>,
}

impl StatsReport {
	/// An empty report stamped with the current time.
	pub fn now() -> Self {
		let timestamp = SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.map(|elapsed| elapsed.as_millis().try_into().unwrap_or(u64::MAX))
			.unwrap_or_default();

		Self {
			timestamp,
			entries: BTreeMap::new(),
		}
	}

	pub fn insert(&mut self, id: impl Into<String>, entry: serde_json::Value) -> Option<serde_json::Value> {
		self.entries.insert(id.into(), entry)
	}

	pub fn get(&self, id: &str) -> Option<&serde_json::Value> {
		self.entries.get(id)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &serde_json::Value)> {
		self.entries.iter().map(|(id, entry)| (id.as_str(), entry))
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}
