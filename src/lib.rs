//! # docsearch-client
//!
//! Client core for a documentation search backend that answers questions
//! with retrieval-augmented generation. It has two independent paths.
//!
//! ## Chat path
//!
//! ```text
//!   network bytes ──▶ FrameDecoder ──▶ parse_event ──▶ ChatSession
//!   (any split)       "\n\n" frames    typed Event     transcript, live
//!                                                      text, proposals
//! ```
//!
//! One exchange runs at a time per session. Chunks accumulate into a live
//! buffer; `complete` strips `<think>…</think>` spans and commits a model
//! message, `error` aborts the turn without committing anything.
//!
//! ## Search path
//!
//! ```text
//!   keystrokes ──▶ SearchController ──(debounce 500ms)──▶ search call
//!   indexer    ──▶ SearchController ──(immediately)────▶ search call
//!                                                           │
//!                  view ◀── admitted if generation ≥ last ◀─┘
//! ```
//!
//! Every issued request gets a fresh generation; answers older than the
//! last admitted one are dropped whatever order the network returns them in.
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for the backend URL, defaults and timeouts
//! - [`models`] - Shared data types: `Proposal`, `ChatMessage`, request/response types
//! - [`error`] - Transport, framing, parsing and exchange errors
//! - [`stream::frame`] - Byte-level frame splitting
//! - [`stream::event`] - Frame to typed event decoding
//! - [`chat::session`] - The chat exchange state machine and read loop
//! - [`chat::reasoning`] - Reasoning-span removal applied to finished answers
//! - [`search::timer`] - Cancellable debounce timer
//! - [`search::controller`] - Debounced, generation-ordered search requests
//! - [`api`] - Backend collaborator traits and the HTTP client

pub mod api;
pub mod chat;
pub mod config;
pub mod error;
pub mod models;
pub mod search;
pub mod stream;
