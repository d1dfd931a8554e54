//! Broker connection: one transport, one background reader, many callers.
//!
//! The [`Connection`] manages the lifecycle:
//! 1. Dial the broker (or wrap a provided stream)
//! 2. Spawn the background reader, the only task that reads the transport
//! 3. Authenticate
//! 4. Serve publish / bind / unbind / ack from any number of tasks
//!
//! # Request/response correlation
//!
//! Frames carry no request id. Writers take a single-flight token, write,
//! release the token and then wait on a one-slot response mailbox filled by
//! the reader. Because only one request write happens at a time, the next
//! non-push frame the reader sees is the answer to the oldest outstanding
//! request. Pushed messages are routed to subscriptions instead.
//!
//! ```text
//!  caller ─► token ─► FrameWriter ─► socket ─► reader ─┬─► Push ─► registry ─► sink
//!  caller ◄──────────── mailbox (capacity 1) ◄─────────┘ other
//! ```
//!
//! # Example
//!
//! ```ignore
//! use mqlink::{mailbox, Config, Connection};
//!
//! let conn = Connection::connect(Config::new("127.0.0.1:11181")).await?;
//!
//! let (sink, mut inbox) = mailbox("orders", 1024);
//! conn.bind("orders", "eu.*", true, sink).await?;
//!
//! let id = conn.publish("orders", "eu.de", "hello", "direct").await?;
//! ```

use std::sync::{Arc, Weak};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::{mpsc, watch, Mutex, Notify, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::Config;
use crate::error::{MqError, Result};
use crate::protocol::{Frame, FrameBuffer, Method};
use crate::subscription::{BindParams, MessageSink, Subscription, SubscriptionRegistry};
use crate::transport::{dial, BoxedReader, BoxedWriter};
use crate::writer::{FrameWriter, OutboundFrame};

/// Fraction of the keep-alive interval after which a heartbeat is due.
pub const HEARTBEAT_THRESHOLD: f64 = 0.8;

/// Size of the reader's socket buffer.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Owner that takes released connections back for reuse.
pub trait ConnectionPool: Send + Sync + 'static {
    /// Take back a connection whose subscriptions have been cleared.
    fn push_conn(&self, conn: Connection);
}

/// State shared between the connection handle and its reader task.
struct Shared {
    writer: FrameWriter,
    registry: SubscriptionRegistry,
    /// Stops the reader (explicit close, drop, write failure).
    shutdown: Notify,
    closed: watch::Sender<bool>,
}

impl Shared {
    /// Encode and write one frame. A write failure also stops the reader.
    async fn write(&self, frame: &Frame) -> Result<()> {
        let outbound = OutboundFrame::encode(frame)?;
        let result = self.writer.write_frame(&outbound).await;
        if let Err(MqError::Write(e)) = &result {
            tracing::error!("Write of {} failed, closing connection: {}", frame.method, e);
            self.shutdown.notify_one();
        }
        result
    }
}

/// A live session with the broker.
///
/// Share it across tasks with `Arc<Connection>`. Dropping the last handle
/// stops the reader and closes the transport.
pub struct Connection {
    shared: Arc<Shared>,
    config: Config,
    /// Hex MD5 of the password; `None` skips authentication.
    digest: Option<String>,
    /// Single-flight token: one request write at a time.
    token: Semaphore,
    /// Receiving end of the reader's one-slot response mailbox.
    responses: Mutex<mpsc::Receiver<Frame>>,
    /// Held across the heartbeat write so concurrent callers send once.
    last_heartbeat: Mutex<Option<Instant>>,
    pool: Option<Weak<dyn ConnectionPool>>,
    _reader_task: JoinHandle<()>,
}

impl Connection {
    /// Dial `config.broker_addr` and authenticate.
    pub async fn connect(config: Config) -> Result<Self> {
        let digest = config.credential_digest();
        Self::open(config, digest, None).await
    }

    /// Dial on behalf of a pool; [`release`](Self::release) hands the
    /// connection back to it.
    pub(crate) async fn connect_pooled(
        config: Config,
        digest: Option<String>,
        pool: Weak<dyn ConnectionPool>,
    ) -> Result<Self> {
        Self::open(config, digest, Some(pool)).await
    }

    async fn open(
        config: Config,
        digest: Option<String>,
        pool: Option<Weak<dyn ConnectionPool>>,
    ) -> Result<Self> {
        let stream = dial(&config.broker_addr).await?;
        tracing::debug!("Connected to {} over {}", config.broker_addr, stream.kind());

        let (reader, writer) = stream.into_split();
        Self::start(reader, writer, config, digest, pool).await
    }

    /// Run the protocol over an already connected stream.
    pub async fn from_stream<S>(stream: S, config: Config) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let digest = config.credential_digest();
        Self::start(Box::new(reader), Box::new(writer), config, digest, None).await
    }

    async fn start(
        reader: BoxedReader,
        writer: BoxedWriter,
        config: Config,
        digest: Option<String>,
        pool: Option<Weak<dyn ConnectionPool>>,
    ) -> Result<Self> {
        let (closed, _) = watch::channel(false);
        let shared = Arc::new(Shared {
            writer: FrameWriter::new(writer),
            registry: SubscriptionRegistry::new(),
            shutdown: Notify::new(),
            closed,
        });

        // One slot: a frame arriving with no request outstanding waits here
        // for the next exchange.
        let (response_tx, response_rx) = mpsc::channel(1);

        let reader_task = tokio::spawn(Self::run_reader(
            reader,
            shared.clone(),
            response_tx,
            config.max_frame_size,
        ));

        let conn = Self {
            shared,
            config,
            digest,
            token: Semaphore::new(1),
            responses: Mutex::new(response_rx),
            last_heartbeat: Mutex::new(None),
            pool,
            _reader_task: reader_task,
        };

        conn.authenticate().await?;
        Ok(conn)
    }

    /// Reader task body: read until failure or shutdown, then tear down.
    async fn run_reader(
        reader: BoxedReader,
        shared: Arc<Shared>,
        responses: mpsc::Sender<Frame>,
        max_frame_size: u32,
    ) {
        match Self::read_loop(reader, &shared, &responses, max_frame_size).await {
            Ok(()) => tracing::debug!("Read loop stopped"),
            Err(e) => tracing::error!("Read loop error: {}", e),
        }

        shared.writer.close().await;
        // Fails the waiting exchange, if any, and every later one.
        drop(responses);
        shared.closed.send_replace(true);
    }

    /// Main read loop - decodes frames and routes them.
    async fn read_loop(
        mut reader: BoxedReader,
        shared: &Shared,
        responses: &mpsc::Sender<Frame>,
        max_frame_size: u32,
    ) -> Result<()> {
        let mut frame_buffer = FrameBuffer::with_max_payload(max_frame_size);
        let mut buf = vec![0u8; READ_BUFFER_SIZE];

        loop {
            let n = tokio::select! {
                read = reader.read(&mut buf) => read?,
                _ = shared.shutdown.notified() => return Ok(()),
            };
            if n == 0 {
                tracing::debug!("Broker closed the connection");
                return Ok(());
            }

            // Each frame is routed before the next is decoded, so a malformed
            // frame never swallows the ones ahead of it.
            frame_buffer.extend(&buf[..n]);
            while let Some(frame) = frame_buffer.next_frame()? {
                if frame.method == Method::Push {
                    // A push for an unknown queue ends the connection.
                    let subscription = shared
                        .registry
                        .get(frame.queue())
                        .ok_or_else(|| MqError::OrphanPush(frame.queue().to_string()))?;
                    subscription.deliver(frame.msg_id().to_string(), frame.body);
                    continue;
                }

                tokio::select! {
                    sent = responses.send(frame) => {
                        if sent.is_err() {
                            return Ok(());
                        }
                    }
                    _ = shared.shutdown.notified() => return Ok(()),
                }
            }
        }
    }

    /// One request/response exchange.
    async fn request(&self, frame: &Frame, expected: Method) -> Result<Frame> {
        {
            let _permit = self
                .token
                .acquire()
                .await
                .map_err(|_| MqError::ConnectionClosed)?;
            self.shared.write(frame).await?;
        }

        let response = self
            .responses
            .lock()
            .await
            .recv()
            .await
            .ok_or(MqError::ConnectionClosed)?;

        check_response(response, expected)
    }

    /// Authenticate with the configured credential digest, if any.
    async fn authenticate(&self) -> Result<()> {
        let Some(digest) = self.digest.as_deref() else {
            return Ok(());
        };

        self.request(&Frame::auth(digest), Method::AuthOk).await?;
        tracing::debug!("Authenticated with {}", self.config.broker_addr);
        Ok(())
    }

    /// Publish a message and return the broker-assigned message id.
    pub async fn publish(
        &self,
        queue: &str,
        routing_key: &str,
        body: impl Into<Bytes>,
        pub_type: &str,
    ) -> Result<i64> {
        let frame = Frame::publish(queue, routing_key, pub_type, body);
        let response = self.request(&frame, Method::PublishOk).await?;

        Ok(String::from_utf8_lossy(response.body()).parse::<i64>()?)
    }

    /// Bind a queue, delivering its pushed messages to `sink`.
    ///
    /// Re-binding with identical parameters returns the existing
    /// subscription without contacting the broker. Re-binding with new
    /// parameters updates the subscription in place (keeping its original
    /// sink) and informs the broker.
    pub async fn bind(
        &self,
        queue: &str,
        routing_key: &str,
        no_ack: bool,
        sink: Arc<dyn MessageSink>,
    ) -> Result<Arc<Subscription>> {
        let params = BindParams {
            routing_key: routing_key.to_string(),
            no_ack,
        };
        let outcome = self.shared.registry.prepare_bind(queue, params, sink);
        if !outcome.needs_request() {
            return Ok(outcome.into_subscription());
        }

        let response = self
            .request(&Frame::bind(queue, routing_key, no_ack), Method::BindOk)
            .await?;
        check_queue(queue, response.queue())?;

        tracing::debug!("Bound queue {} with routing key {:?}", queue, routing_key);
        Ok(outcome.into_subscription())
    }

    /// Unbind one queue.
    ///
    /// The subscription is removed before the request is sent and is not
    /// restored if the broker rejects the unbind.
    pub async fn unbind(&self, queue: &str) -> Result<()> {
        if self.shared.registry.remove(queue).is_none() {
            return Err(MqError::NotBound(queue.to_string()));
        }

        let response = self
            .request(&Frame::unbind(queue), Method::UnbindOk)
            .await?;
        check_queue(queue, response.queue())?;

        tracing::debug!("Unbound queue {}", queue);
        Ok(())
    }

    /// Drop every subscription and unbind all queues at the broker.
    pub async fn unbind_all(&self) -> Result<()> {
        let dropped = self.shared.registry.clear();

        self.request(&Frame::unbind(""), Method::UnbindOk).await?;

        tracing::debug!("Unbound all queues ({} local subscriptions)", dropped);
        Ok(())
    }

    /// Acknowledge a pushed message. Fire-and-forget.
    pub async fn ack(&self, queue: &str, msg_id: &str) -> Result<()> {
        self.shared.write(&Frame::ack(queue, msg_id)).await
    }

    /// Send a heartbeat if 80% of the keep-alive interval has passed since
    /// the last one. Returns whether a heartbeat was written.
    ///
    /// Never schedules itself; call it from a periodic timer.
    pub async fn maybe_heartbeat(&self) -> Result<bool> {
        let threshold = self
            .config
            .keepalive_interval()
            .mul_f64(HEARTBEAT_THRESHOLD);

        let mut last = self.last_heartbeat.lock().await;
        if let Some(sent) = *last {
            if Instant::now().saturating_duration_since(sent) < threshold {
                return Ok(false);
            }
        }

        self.shared.write(&Frame::heartbeat()).await?;
        *last = Some(Instant::now());

        tracing::debug!("Heartbeat sent to {}", self.config.broker_addr);
        Ok(true)
    }

    /// Clear all subscriptions and hand the connection back to its pool.
    ///
    /// Without a live pool the connection is shut down instead. The unbind
    /// result is returned after the hand-off.
    pub async fn release(self) -> Result<()> {
        let result = self.unbind_all().await;
        if let Err(e) = &result {
            tracing::warn!("Unbind on release failed: {}", e);
        }

        let pool = self.pool.as_ref().and_then(Weak::upgrade);
        match pool {
            Some(pool) => pool.push_conn(self),
            None => self.shutdown().await,
        }

        result
    }

    /// Stop the reader and close the transport, then wait for teardown.
    pub async fn shutdown(&self) {
        self.shared.shutdown.notify_one();
        self.closed().await;
    }

    /// Wait until the connection has been torn down.
    pub async fn closed(&self) {
        let mut rx = self.shared.closed.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Whether the reader has terminated.
    pub fn is_closed(&self) -> bool {
        *self.shared.closed.borrow()
    }

    /// Subscription for a queue, if bound.
    pub fn subscription(&self, queue: &str) -> Option<Arc<Subscription>> {
        self.shared.registry.get(queue)
    }

    /// Names of all bound queues, sorted.
    pub fn bound_queues(&self) -> Vec<String> {
        self.shared.registry.queues()
    }

    /// Connection settings.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shared.shutdown.notify_one();
    }
}

/// Turn a response frame into the expected reply or an error.
fn check_response(response: Frame, expected: Method) -> Result<Frame> {
    match response.method {
        Method::Error => Err(MqError::Broker {
            message: String::from_utf8_lossy(response.body()).into_owned(),
            code: response.code().to_string(),
        }),
        actual if actual != expected => Err(MqError::MethodMismatch { expected, actual }),
        _ => Ok(response),
    }
}

fn check_queue(expected: &str, actual: &str) -> Result<()> {
    if expected != actual {
        return Err(MqError::QueueMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(())
}
