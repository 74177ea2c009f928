//! # RoServer Network Layer
//!
//! Sessions, send-target fan-out, and the map-server accept loop.
//!
//! # Architecture
//!
//! Network I/O runs on tokio tasks, but all packet parsing, dispatch,
//! and game-state mutation is funneled into one [`EventLoop`] task:
//!
//! ```text
//! accept loop ──► reader task (per connection)
//!                   │  FrameReader cuts complete frames
//!                   ▼
//!                frame channel ──► EventLoop (single task)
//!                                    │  Dispatcher + TimerQueue
//!                                    ▼
//!                                  handlers ──► Broadcaster
//!                                                 │ serialize per session
//!                                                 ▼
//!                 writer task ◄── session outbound queue (FIFO)
//! ```
//!
//! The opcode table and layout registry are immutable after startup and
//! the outbound queue of each session is appended only from the event
//! loop, so no locks guard the dispatch path itself.

pub mod broadcast;
pub mod config;
pub mod event_loop;
pub mod registry;
pub mod server;
pub mod session;

pub use broadcast::*;
pub use config::*;
pub use event_loop::*;
pub use registry::*;
pub use server::*;
pub use session::*;
