//! Async I/O traits.
//!
//! Used by the loopback redirect listener to read the browser's request line
//! and write the HTML reply.

pub use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
