//! # Chaskis Transport
//!
//! Line-oriented transport for talking to an IRC server.
//!
//! [`connect`] resolves the host, opens a TCP connection, optionally wraps it
//! in TLS, and splits the stream into a [`LineReader`] and a [`LineWriter`].
//! The reader is owned by the connection loop; the writer is handed to the
//! rate-limited writer task.
//!
//! ```text
//! ┌──────────────┐  read_line   ┌──────────────────┐
//! │  LineReader  │─────────────▶│ Connection loop  │
//! └──────────────┘              └──────────────────┘
//! ┌──────────────┐  write_line  ┌──────────────────┐
//! │  LineWriter  │◀─────────────│ Rate-limited     │
//! └──────────────┘              │ writer task      │
//!                               └──────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use chaskis_transport::{TransportConfig, connect};
//!
//! let (mut reader, mut writer) = connect(&TransportConfig::new("irc.libera.chat", 6667)).await?;
//! writer.write_line("NICK chaskis").await?;
//! while let Some(line) = reader.read_line().await? {
//!     println!("{line}");
//! }
//! ```

pub mod connection;
pub mod lines;

pub use connection::{DEFAULT_CONNECT_TIMEOUT, TransportConfig, connect};
pub use lines::{BoxedStream, IrcStream, LineReader, LineWriter, MAX_LINE_LENGTH, split_lines};
