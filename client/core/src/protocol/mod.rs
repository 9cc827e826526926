//! Answer Stream Protocol
//!
//! The answer service replies with a line-oriented event stream:
//!
//! ```text
//! data: {"type":"session","conversation_id":"c1"}
//!
//! data: {"type":"content","content":"Hel"}
//!
//! data: {"type":"done","message_id":"m1","response_time_ms":120}
//! ```
//!
//! - [`StreamEvent`]: the event vocabulary
//! - [`FrameDecoder`]: chunked bytes to events
//! - [`StreamClient`]: opens a stream and drives a [`StreamHandler`]

mod client;
mod event;
mod framing;

pub use client::{run_stream, StreamClient, StreamHandler, StreamOutcome, StreamSession};
pub use event::StreamEvent;
pub use framing::{FrameDecoder, DATA_PREFIX};
