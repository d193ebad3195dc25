//! Connectivity handshake between a collector and this client.
//!
//! At startup the client generates a [`HandshakeToken`] and serves a single
//! route, [`CHECK_ROUTE`]. A collector proves it was handed the token by
//! POSTing it back as the `token` form field; every failure mode answers
//! the same `403` so callers learn nothing about which check failed.

mod server;
mod token;

pub use server::{
    router, HandshakeServer, HandshakeServerConfig, HandshakeState, CHECK_ROUTE,
};
pub use token::HandshakeToken;
