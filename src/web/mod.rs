//! Raw socket server and connection plumbing
//!
//! The boundary layer of the stack: a TCP accept loop that hands one
//! [`Connection`] per inbound socket to a spawned handler task, plus the
//! line-oriented send/read surface those handlers speak through. Higher
//! protocol concerns (HTTP parsing, TLS, static files) live outside this
//! module.
//!
//! Server-side connections register themselves in a shared live set and
//! deregister on close, so the server can always answer "how many peers are
//! connected right now".

mod connection;
mod server;

pub use connection::{Connection, HTTP_CRLF};
pub use server::Server;
