//! # rtc-consumer: receive-side media track handles
//!
//! A [Consumer] is the client-visible handle for one inbound media track.
//! It tracks the lifecycle of the consumed media (open, paused, closed) and drives
//! an external [Track] resource that it controls but does not implement.
//!
//! ## API
//!
//! Each [Consumer] exposes three facets:
//! - [Consumer::on] for public lifecycle events ([ConsumerEvent]), delivered to any listener.
//! - [Consumer::observer] for passive observers ([ObserverEvent]), such as UI or telemetry.
//! - [ConsumerSignals], returned by [Consumer::new] and held only by the owner of the consumer.
//!
//! Listener failures on the public and observer facets are logged and isolated.
//! The owner facet is a single-subscriber channel and is not isolated.
//!
//! To consume media, create:
//! - [Transport::new] with a [Handler] that performs the actual receiving work.
//! - [Transport::consume] for each inbound track, returning a [Consumer].
//! - [Consumer::pause], [Consumer::resume] and [Consumer::get_stats] as needed.
//! - [Consumer::close] or [Transport::close] to tear everything down.

mod consumer;
mod error;
mod event;
mod id;
mod rtp;
mod signal;
mod stats;
mod track;
mod transport;

pub use consumer::*;
pub use error::*;
pub use event::*;
pub use id::*;
pub use rtp::*;
pub use signal::*;
pub use stats::*;
pub use track::*;
pub use transport::*;
