//! Real-time event hub for connected campaign clients.
//!
//! This crate tracks the live client connections, dispatches the typed
//! messages they send, and fans server-originated events out to all of them.
//!
//! # Architecture
//!
//! - **Single writer**: the registry of live clients lives inside one task and
//!   is only reached through the `Manager` handle's channel. Register,
//!   unregister and broadcast requests are applied in the order they arrive.
//! - **Two pumps per client**: a read pump decodes inbound frames and routes
//!   them through the `DispatchTable`; a write pump drains the client's bounded
//!   mailbox onto the wire.
//! - **Eviction instead of backpressure**: a broadcast never waits. A client
//!   whose mailbox is full is dropped from the registry and its connection is
//!   closed; everyone else keeps receiving.
//! - **Ephemeral events**: nothing is stored. A client that is not connected
//!   misses the event and re-fetches state on its next load.
//!
//! # Message Flow
//!
//! 1. The web layer upgrades `/ws` and hands the connection to
//!    `Manager::register`
//! 2. The client is added to the registry and its pumps start
//! 3. An inbound `send_message` frame is decoded by the read pump and handled
//!    by `ChatMessageHandler`, which calls `Manager::broadcast`
//! 4. Producers (directory watchers) publish through `events::EventPublisher`;
//!    `HubEventHandler` forwards those events to `Manager::broadcast`
//! 5. The registry loop queues the serialized frame on every mailbox, evicting
//!    clients that can't keep up
//!
//! # Example: broadcasting an event
//!
//! ```rust,ignore
//! use events::{tags, Event};
//!
//! app_state.hub.broadcast(&Event::empty(tags::IMAGES_UPDATED))?;
//! ```
//!
//! # Modules
//!
//! - `connection`: the transport abstraction and `ClientId`
//! - `manager`: the `Manager` handle and the registry loop
//! - `client`: per-connection mailbox and pumps
//! - `dispatch`: message type → handler table
//! - `event_handler`: bridge from the producer publisher to the hub

pub mod client;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod event_handler;
pub mod manager;

pub use client::Client;
pub use connection::{ClientId, Connection, Frame, FrameReader, FrameWriter};
pub use dispatch::{ChatMessageHandler, DispatchTable, MessageHandler};
pub use error::{Error, ErrorKind};
pub use event_handler::HubEventHandler;
pub use manager::{Manager, DEFAULT_MAILBOX_CAPACITY, MAX_MAILBOX_CAPACITY};
