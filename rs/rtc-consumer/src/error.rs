use std::sync::Arc;

#[derive(Debug, thiserror::Error, Clone)]
pub enum Error {
	/// The consumer was already closed when the operation started.
	#[error("invalid state: consumer closed")]
	InvalidState,

	/// The consumer closed while the operation was outstanding.
	#[error("closed")]
	Closed,

	/// The owner dropped the request without answering it.
	#[error("cancelled")]
	Cancelled,

	/// Nobody is listening for owner signals anymore.
	#[error("detached from owner")]
	Detached,

	#[error("stats error: {0}")]
	Stats(Arc<anyhow::Error>),

	#[error("duplicate consumer: {0}")]
	Duplicate(String),

	#[error("transport closed")]
	TransportClosed,
}

impl From<anyhow::Error> for Error {
	fn from(err: anyhow::Error) -> Self {
		Error::Stats(Arc::new(err))
	}
}

impl Error {
	/// A short, stable name for the error, useful as a log field.
	pub fn as_str(&self) -> &'static str {
		match self {
			Error::InvalidState => "invalid_state",
			Error::Closed => "closed",
			Error::Cancelled => "cancelled",
			Error::Detached => "detached",
			Error::Stats(_) => "stats",
			Error::Duplicate(_) => "duplicate",
			Error::TransportClosed => "transport_closed",
		}
	}
}
