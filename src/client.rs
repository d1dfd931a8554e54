//! Pooled broker client.
//!
//! The [`Client`] owns the credential digest and a pool of idle
//! [`Connection`]s. Connections handed out by [`Client::get_conn`] return to
//! the pool through [`Connection::release`].
//!
//! # Example
//!
//! ```ignore
//! use mqlink::{Client, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new(Config::new("127.0.0.1:11181").with_password("secret"));
//!     let _keepalive = client.spawn_keepalive();
//!
//!     let id = client.publish("orders", "eu.de", "hello", "direct").await?;
//!     println!("published {id}");
//!     Ok(())
//! }
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::connection::{Connection, ConnectionPool};
use crate::error::Result;

/// Shortest keep-alive tick.
const MIN_KEEPALIVE_TICK: Duration = Duration::from_millis(100);

/// A broker client with an idle connection pool.
pub struct Client {
    config: Config,
    /// Hex MD5 of the password, computed once.
    digest: Option<String>,
    idle: Mutex<VecDeque<Connection>>,
}

impl Client {
    /// Create a client. No connection is dialed until one is needed.
    pub fn new(config: Config) -> Arc<Self> {
        let digest = config.credential_digest();
        Arc::new(Self {
            config,
            digest,
            idle: Mutex::new(VecDeque::new()),
        })
    }

    /// Take an idle connection, or dial and authenticate a new one.
    pub async fn get_conn(self: &Arc<Self>) -> Result<Connection> {
        loop {
            let conn = self.idle.lock().pop_back();
            match conn {
                Some(conn) if !conn.is_closed() => return Ok(conn),
                Some(_) => tracing::debug!("Discarding closed idle connection"),
                None => break,
            }
        }

        let pool: Arc<dyn ConnectionPool> = self.clone();
        Connection::connect_pooled(self.config.clone(), self.digest.clone(), Arc::downgrade(&pool))
            .await
    }

    /// Publish on a pooled connection and return the message id.
    pub async fn publish(
        self: &Arc<Self>,
        queue: &str,
        routing_key: &str,
        body: impl Into<Bytes>,
        pub_type: &str,
    ) -> Result<i64> {
        let conn = self.get_conn().await?;
        let result = conn.publish(queue, routing_key, body, pub_type).await;

        if let Err(e) = conn.release().await {
            tracing::debug!("Release after publish failed: {}", e);
        }
        result
    }

    /// Send due heartbeats on every idle connection. Connections that fail
    /// are dropped.
    pub async fn keepalive(&self) {
        let conns: Vec<Connection> = self.idle.lock().drain(..).collect();

        for conn in conns {
            match conn.maybe_heartbeat().await {
                Ok(_) => self.push_conn(conn),
                Err(e) => tracing::warn!("Dropping idle connection after heartbeat failure: {}", e),
            }
        }
    }

    /// Run [`keepalive`](Self::keepalive) every half keep-alive period until
    /// the client is dropped.
    pub fn spawn_keepalive(self: &Arc<Self>) -> JoinHandle<()> {
        let client = Arc::downgrade(self);
        let period = (self.config.keepalive_interval() / 2).max(MIN_KEEPALIVE_TICK);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // First tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(client) = client.upgrade() else {
                    tracing::debug!("Client dropped, keep-alive stopped");
                    return;
                };
                client.keepalive().await;
            }
        })
    }

    /// Number of idle connections.
    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    /// Client settings.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl ConnectionPool for Client {
    fn push_conn(&self, conn: Connection) {
        if conn.is_closed() {
            tracing::debug!("Not pooling closed connection");
            return;
        }

        let mut idle = self.idle.lock();
        if idle.len() >= self.config.max_idle_conns {
            drop(idle);
            tracing::debug!("Idle pool full, closing connection");
            return;
        }
        idle.push_back(conn);
    }
}
