//! broker-protocol
//!
//! Line-level encoding/decoding for the brokerage server.
//!
//! This crate turns client requests and server replies into lines of
//! text and back. It knows the core's domain types but nothing about
//! sockets or async runtimes.
//!
//! - [`messages`]  : logical `Request` / `Reply` types
//! - [`csv_codec`] : the comma-separated line format

pub mod messages;
pub mod csv_codec;

pub use messages::{BalanceLine, OrderLine, Reply, Request};
pub use csv_codec::{
    ParseError,
    format_reply,
    format_request,
    parse_reply_line,
    parse_request_line,
};
