//! SSH side of `rsftp`: session setup and the SFTP endpoint.
//!
//! [`session::connect`] performs the TCP connect, the SSH handshake, authentication and opens the
//! SFTP subsystem. The resulting [`session::Session`] lends out a [`sftp::SftpFs`], which
//! implements [`common::fs::Filesystem`] so the transfer engine can treat it like any other
//! endpoint.

pub mod session;
pub mod sftp;

pub use session::{AuthMethod, DEFAULT_PORT, Session, SessionConfig, connect};
pub use sftp::SftpFs;
