//! # mqlink
//!
//! Async client for a message-queue broker speaking a small binary
//! request/response protocol with unsolicited message pushes.
//!
//! ## Architecture
//!
//! - **Connection**: one transport, one background reader. Requests are
//!   single-flight and matched to responses by order; pushed messages are
//!   routed to per-queue subscriptions.
//! - **Client**: credentials plus a pool of idle connections.
//!
//! ## Example
//!
//! ```ignore
//! use mqlink::{mailbox, Config, Connection};
//!
//! #[tokio::main]
//! async fn main() -> mqlink::Result<()> {
//!     let conn = Connection::connect(Config::new("127.0.0.1:11181")).await?;
//!
//!     let (sink, mut inbox) = mailbox("orders", 1024);
//!     conn.bind("orders", "", false, sink).await?;
//!
//!     while let Some(msg) = inbox.recv().await {
//!         println!("{}: {} bytes", msg.msg_id, msg.body.len());
//!         conn.ack(&msg.queue, &msg.msg_id).await?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod protocol;
pub mod subscription;
pub mod transport;
pub mod writer;

mod client;
mod connection;

pub use client::Client;
pub use config::Config;
pub use connection::{Connection, ConnectionPool, HEARTBEAT_THRESHOLD};
pub use error::{MqError, Result};
pub use subscription::{mailbox, BindParams, Mailbox, MailboxSink, Message, MessageSink, Subscription};
