//! Transport module - broker address sniffing and dialing.
//!
//! Provides abstraction over:
//! - TCP (`host:port`)
//! - Unix Domain Sockets (any address containing `/`)

mod stream;

pub use stream::{dial, is_local_addr, BoxedReader, BoxedWriter, BrokerStream};
