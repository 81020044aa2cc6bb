//! TCP primitives.
//!
//! The consent flow binds a short-lived listener on the loopback interface
//! and accepts exactly one redirected browser request.

pub use tokio::net::{TcpListener, TcpStream};
