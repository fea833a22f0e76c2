//! Synchronous client for the cmuxterm control socket, used by the
//! `cmux` CLI and by anything else that wants to script the app.

pub mod client;
pub mod idformat;

pub use client::Client;
pub use idformat::IdFormat;
