//! partyping-pushover: delivers party notifications through the Pushover
//! message API.

pub mod client;

pub use client::PushoverClient;
