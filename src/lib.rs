//! # Salted Challenge Response Authentication Mechanism (SCRAM)
//!
//! This implementation provides the client side of the SCRAM-SHA-256 mechanism according to
//! RFC5802 and RFC7677, as it is embedded in the authentication sequence of PostgreSQL style wire
//! protocols. It doesn't support channel-binding.
//!
//! # Usage
//!
//! The server and the client exchange four messages using the SCRAM mechanism. There is a rust type
//! for each one of them in the [`message`](message/index.html) module. The
//! [`Exchange`](struct.Exchange.html) engine advances the handshake step by step and keeps no state
//! of its own: everything it needs between the two round trips lives in a
//! [`SaslContext`](struct.SaslContext.html) that you hold on to.
//!
//! The [`frame`](frame/index.html) module wraps the messages into authentication frames.
//!
//! ``` rust,no_run
//! use sasl_scram::{frame, Exchange};
//!
//! // This function represents your I/O implementation.
//! fn send_and_receive(frame: &[u8]) -> Vec<u8> {
//!     unimplemented!()
//! }
//!
//! # fn main() -> Result<(), sasl_scram::Error> {
//! # let offered: Vec<u8> = unimplemented!();
//! // Make sure the server offers SCRAM-SHA-256.
//! frame::negotiate(&offered)?;
//!
//! let exchange = Exchange::default();
//! let (ctx, client_first) = exchange.begin("")?;
//! let reply = send_and_receive(&frame::encode_initial_response(&client_first));
//!
//! // Process the reply and build the final client message. Any error aborts the attempt.
//! let server_first = frame::decode_continue(&reply)?;
//! let (ctx, client_final) = exchange.continue_exchange(ctx, &server_first, "password")?;
//! let reply = send_and_receive(&frame::encode_response(&client_final));
//!
//! // Verify the server knows our credentials as well.
//! let server_final = frame::decode_final(&reply)?;
//! exchange.validate_final(&ctx, &server_final)?;
//! # Ok(())
//! # }
//! ```
//!
//! When the messages are exchanged as plain text, the typestate API starting at
//! [`ScramClient::new`](struct.ScramClient.html#method.new) handles the parsing.
//!
//! # Logging
//!
//! Progress is reported through `tracing` at debug level. Derived key material is never logged
//! unless the `trace-secrets` feature is enabled.

mod client;
mod config;
pub mod crypto;
mod error;
mod exchange;
pub mod frame;
pub mod message;
pub mod saslprep;

pub use client::{ClientFinal, ScramClient, ServerFinal, ServerFirst};
pub use config::{Config, DEFAULT_MAX_ITERATIONS};
pub use error::{Error, Field, Kind, Result};
pub use exchange::{begin_exchange, continue_exchange, validate_final, Exchange, SaslContext};
pub use message::{ClientFinalMessage, ClientFirstMessage, Message, ScramMessage,
                  ServerFinalMessage, ServerFirstMessage};

/// The identifier of the SCRAM-SHA-256 SASL authentication mechanism.
pub const SCRAM_SHA_256: &str = "SCRAM-SHA-256";

/// Length of a SHA-256 digest.
pub const SHA256_LEN: usize = 32;

/// Default number of characters in a client nonce.
pub const NONCE_LENGTH: usize = 24;

/// GS2 header without channel binding or authorization identity.
pub const GS2_HEADER: &str = "n,,";

/// Base64 encoded GS2 header, sent back in the client-final message.
pub const CHANNEL_BINDING: &str = "biws";
