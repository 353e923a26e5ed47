//! Wire decoding for the chat stream: raw bytes to frames, frames to events.

pub mod event;
pub mod frame;

pub use event::{parse_event, Event};
pub use frame::{Frame, FrameDecoder};
