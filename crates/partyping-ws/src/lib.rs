//! partyping-ws: the WebSocket side of the bridge.
//!
//! # Features
//! - One persistent connection to the `MiniParse` stream endpoint
//! - Per-frame dispatch: decode → classify → deliver, in order
//! - Graceful close handshake with a bounded grace period
//! - Optional bounded reconnect with exponential backoff

pub mod dispatch;
pub mod error;
pub mod reconnect;
pub mod session;

pub use dispatch::{DispatchOutcome, FrameDispatcher, SessionStats, StatsSnapshot};
pub use error::SessionError;
pub use reconnect::{run_with_reconnect, ReconnectPolicy};
pub use session::{SessionOutcome, SessionState, StreamSession, TerminationReason};
