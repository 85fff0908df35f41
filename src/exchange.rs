//! The client side of a SCRAM-SHA-256 exchange.
//!
//! The engine keeps no state between calls. Everything needed for the next step travels in a
//! [`SaslContext`] that the caller holds on to between round trips:
//!
//! 1. [`Exchange::begin`] builds the client-first message and the initial context.
//! 2. [`Exchange::continue_exchange`] consumes the context and the server-first message, derives
//!    the proofs and returns the client-final message with a context that remembers the expected
//!    server signature.
//! 3. [`Exchange::validate_final`] checks the server-final message against that context.

use std::fmt;

use rand::rngs::OsRng;
use rand::{CryptoRng, Rng};
use tracing::{debug, warn};

use crate::config::Config;
use crate::crypto;
use crate::error::{Error, Result};
use crate::message::{ClientFinalMessage, ClientFirstMessage, Message, ServerFinalMessage,
                     ServerFirstMessage};
use crate::saslprep::{self, Mode};

#[cfg(feature = "trace-secrets")]
macro_rules! trace_secret {
    ($name:expr, $value:expr) => {
        tracing::trace!(secret = $name, value = %base64::encode($value))
    };
}

#[cfg(not(feature = "trace-secrets"))]
macro_rules! trace_secret {
    ($name:expr, $value:expr) => {};
}

/// State carried by the caller between the two round trips of one exchange.
///
/// A context belongs to exactly one authentication attempt. It can't be cloned, and
/// [`Exchange::continue_exchange`] consumes it, so a failed attempt leaves nothing to reuse.
pub struct SaslContext {
    client_first: ClientFirstMessage,
    expected_server_proof: Option<String>,
}

impl SaslContext {
    /// The client-first message this exchange started with.
    pub fn client_first(&self) -> &ClientFirstMessage {
        &self.client_first
    }

    /// The Base64 server signature the server-final message must carry. `None` until the
    /// client-final message has been built.
    pub fn expected_server_proof(&self) -> Option<&str> {
        self.expected_server_proof.as_ref().map(String::as_str)
    }
}

impl fmt::Debug for SaslContext {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let expected_server_proof = self.expected_server_proof.as_ref().map(|_| "<redacted>");
        f.debug_struct("SaslContext")
            .field("client_first", &self.client_first)
            .field("expected_server_proof", &expected_server_proof)
            .finish()
    }
}

/// The SCRAM-SHA-256 exchange engine.
#[derive(Debug, Clone, Default)]
pub struct Exchange {
    config: Config,
}

impl Exchange {
    /// Creates an engine with the given configuration.
    pub fn new(config: Config) -> Self {
        Exchange { config }
    }

    /// The configuration of this engine.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Starts an exchange for `username` with a nonce drawn from the operating system's random
    /// number generator.
    ///
    /// The username passes through SASLprep in query mode. PostgreSQL style servers ignore it, an
    /// empty username is fine there.
    pub fn begin(&self, username: &str) -> Result<(SaslContext, ClientFirstMessage)> {
        self.begin_with_rng(username, &mut OsRng)
    }

    /// Starts an exchange using a custom random number generator. Please only use a
    /// cryptographically secure random number generator!
    pub fn begin_with_rng<R: Rng + CryptoRng>(&self,
                                               username: &str,
                                               rng: &mut R)
                                               -> Result<(SaslContext, ClientFirstMessage)> {
        let nonce = crypto::random_nonce(rng, self.config.nonce_len);
        self.begin_with_nonce(username, nonce)
    }

    pub(crate) fn begin_with_nonce(&self,
                                   username: &str,
                                   nonce: String)
                                   -> Result<(SaslContext, ClientFirstMessage)> {
        let user = saslprep::prepare(username, Mode::Query)?.into_owned();
        let client_first = ClientFirstMessage { user, nonce };
        debug!(nonce_len = client_first.nonce.len(), "SCRAM exchange started");
        let ctx = SaslContext {
            client_first: client_first.clone(),
            expected_server_proof: None,
        };
        Ok((ctx, client_first))
    }

    /// Processes the server-first message and builds the client-final message.
    ///
    /// # Errors
    ///
    /// * `Error::NonceMismatch` if the server nonce doesn't extend the client nonce. Nothing is
    ///   derived in that case.
    /// * `Error::IterationsTooHigh` if the server asks for more rounds than configured.
    /// * `Error::InvalidProfileInput` if the password is rejected by SASLprep.
    pub fn continue_exchange(&self,
                             ctx: SaslContext,
                             server_first: &ServerFirstMessage,
                             password: &str)
                             -> Result<(SaslContext, ClientFinalMessage)> {
        debug_assert!(ctx.expected_server_proof.is_none(), "SCRAM context continued twice");
        if !server_first.nonce.starts_with(&ctx.client_first.nonce) {
            warn!("server nonce does not extend the client nonce, aborting SCRAM exchange");
            return Err(Error::NonceMismatch);
        }
        let iterations = server_first.iterations.get();
        if iterations > self.config.max_iterations {
            warn!(iterations, max = self.config.max_iterations, "iteration count above ceiling");
            return Err(Error::IterationsTooHigh(iterations));
        }
        debug!(iterations, salt_len = server_first.salt.len(), "server-first accepted");

        let password = saslprep::prepare(password, Mode::Stored)?;
        let salted_password = crypto::derive_key(password.as_bytes(),
                                                 &server_first.salt,
                                                 server_first.iterations);
        let client_key = crypto::hmac(&salted_password, b"Client Key");
        let stored_key = crypto::hash(&client_key);

        let client_final = ClientFinalMessage::without_proof(&server_first.nonce);
        let auth_message = format!("{},{},{}",
                                   ctx.client_first.encode(),
                                   server_first.encode(),
                                   client_final.encode());

        let client_signature = crypto::hmac(&stored_key, auth_message.as_bytes());
        let client_proof = crypto::xor(&client_key, &client_signature);
        let server_key = crypto::hmac(&salted_password, b"Server Key");
        let server_signature = crypto::hmac(&server_key, auth_message.as_bytes());

        trace_secret!("salted_password", &salted_password);
        trace_secret!("client_key", &client_key);
        trace_secret!("server_key", &server_key);
        trace_secret!("auth_message", auth_message.as_bytes());
        trace_secret!("client_proof", &client_proof);

        let ctx = SaslContext {
            client_first: ctx.client_first,
            expected_server_proof: Some(base64::encode(server_signature)),
        };
        let client_final = ClientFinalMessage {
            proof: Some(client_proof),
            ..client_final
        };
        Ok((ctx, client_final))
    }

    /// Checks the server signature of the server-final message.
    ///
    /// The comparison runs in constant time. Every failure is reported as
    /// `Error::AuthenticationFailed` without saying what didn't match.
    pub fn validate_final(&self,
                          ctx: &SaslContext,
                          server_final: &ServerFinalMessage)
                          -> Result<()> {
        let expected = match ctx.expected_server_proof {
            Some(ref expected) => expected,
            None => {
                warn!("server-final validated before client-final was built");
                return Err(Error::AuthenticationFailed);
            }
        };
        if server_final.server_proof.is_empty() {
            warn!("server-final carries an empty signature");
            return Err(Error::AuthenticationFailed);
        }
        let received = base64::encode(&server_final.server_proof);
        if crypto::constant_time_eq(received.as_bytes(), expected.as_bytes()) {
            debug!("server signature verified, SCRAM exchange complete");
            Ok(())
        } else {
            warn!("server signature mismatch");
            Err(Error::AuthenticationFailed)
        }
    }
}

/// Starts an exchange with the default configuration. See [`Exchange::begin`].
pub fn begin_exchange(username: &str) -> Result<(SaslContext, ClientFirstMessage)> {
    Exchange::default().begin(username)
}

/// Continues an exchange with the default configuration. See [`Exchange::continue_exchange`].
pub fn continue_exchange(ctx: SaslContext,
                         server_first: &ServerFirstMessage,
                         password: &str)
                         -> Result<(SaslContext, ClientFinalMessage)> {
    Exchange::default().continue_exchange(ctx, server_first, password)
}

/// Validates the server-final message. See [`Exchange::validate_final`].
pub fn validate_final(ctx: &SaslContext, server_final: &ServerFinalMessage) -> Result<()> {
    Exchange::default().validate_final(ctx, server_final)
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::*;
    use crate::message::parse;
    use crate::saslprep::Prohibited;

    const CLIENT_NONCE: &str = "rOprNGfwEbeRWgbNEkqO";
    const SERVER_FIRST: &str = "r=rOprNGfwEbeRWgbNEkqO%hvYDpWUa2RaTCAfuxFIlj)hNlF$k0,\
                                s=W22ZaJ0SNY7soEsUEjb6gQ==,i=4096";
    const CLIENT_FINAL: &str = "c=biws,r=rOprNGfwEbeRWgbNEkqO%hvYDpWUa2RaTCAfuxFIlj)hNlF$k0,\
                                p=dHzbZapWIk4jUhN+Ute9ytag9zjfMHgsqmmiz7AndVQ=";
    const SERVER_FINAL: &str = "v=6rriTRBi23WpRR/wtup+mMhUZUn/dB5nLTJRsjl95G4=";

    fn rfc7677_final_context() -> (SaslContext, ClientFinalMessage) {
        let exchange = Exchange::default();
        let (ctx, client_first) = exchange.begin_with_nonce("user", CLIENT_NONCE.into()).unwrap();
        assert_eq!(client_first.to_wire(), "n,,n=user,r=rOprNGfwEbeRWgbNEkqO");
        let server_first = parse::<ServerFirstMessage>(SERVER_FIRST).unwrap();
        exchange.continue_exchange(ctx, &server_first, "pencil").unwrap()
    }

    #[test]
    fn rfc7677_known_answer() {
        let (ctx, client_final) = rfc7677_final_context();
        assert_eq!(client_final.encode(), CLIENT_FINAL);
        assert_eq!(ctx.expected_server_proof(), Some(&SERVER_FINAL[2..]));

        let server_final = parse::<ServerFinalMessage>(SERVER_FINAL).unwrap();
        assert_eq!(validate_final(&ctx, &server_final), Ok(()));
    }

    #[test]
    fn tampered_server_proof_rejected() {
        let (ctx, _) = rfc7677_final_context();
        let server_final = parse::<ServerFinalMessage>(SERVER_FINAL).unwrap();
        for bit in 0..server_final.server_proof.len() * 8 {
            let mut tampered = server_final.clone();
            tampered.server_proof[bit / 8] ^= 1 << (bit % 8);
            assert_eq!(validate_final(&ctx, &tampered), Err(Error::AuthenticationFailed));
        }
    }

    #[test]
    fn empty_or_truncated_server_proof_rejected() {
        let (ctx, _) = rfc7677_final_context();
        let empty = ServerFinalMessage { server_proof: Vec::new() };
        assert_eq!(validate_final(&ctx, &empty), Err(Error::AuthenticationFailed));

        let mut truncated = parse::<ServerFinalMessage>(SERVER_FINAL).unwrap();
        truncated.server_proof.pop();
        assert_eq!(validate_final(&ctx, &truncated), Err(Error::AuthenticationFailed));
    }

    #[test]
    fn validate_without_client_final_fails() {
        let (ctx, _) = begin_exchange("").unwrap();
        assert_eq!(ctx.expected_server_proof(), None);
        let server_final = parse::<ServerFinalMessage>(SERVER_FINAL).unwrap();
        assert_eq!(validate_final(&ctx, &server_final), Err(Error::AuthenticationFailed));
    }

    #[test]
    fn nonce_mismatch_checked_before_password() {
        let exchange = Exchange::default();
        let (ctx, _) = exchange.begin_with_nonce("user", "clientnonce".into()).unwrap();
        let server_first =
            parse::<ServerFirstMessage>("r=othernonce123,s=c2FsdA==,i=4096").unwrap();
        // The password would fail SASLprep, the nonce check has to come first.
        let err = exchange.continue_exchange(ctx, &server_first, "\u{0007}").unwrap_err();
        assert_eq!(err, Error::NonceMismatch);
    }

    #[test]
    fn truncated_server_nonce_is_a_mismatch() {
        let exchange = Exchange::default();
        let (ctx, _) = exchange.begin_with_nonce("", "clientnonce".into()).unwrap();
        let server_first = parse::<ServerFirstMessage>("r=client,s=c2FsdA==,i=1").unwrap();
        let err = exchange.continue_exchange(ctx, &server_first, "pencil").unwrap_err();
        assert_eq!(err, Error::NonceMismatch);
    }

    #[test]
    fn iteration_ceiling() {
        let exchange = Exchange::new(Config::default().with_max_iterations(4095));
        let (ctx, _) = exchange.begin_with_nonce("user", CLIENT_NONCE.into()).unwrap();
        let server_first = parse::<ServerFirstMessage>(SERVER_FIRST).unwrap();
        let err = exchange.continue_exchange(ctx, &server_first, "pencil").unwrap_err();
        assert_eq!(err, Error::IterationsTooHigh(4096));
    }

    #[test]
    fn prohibited_password_rejected() {
        let exchange = Exchange::default();
        let (ctx, _) = exchange.begin_with_nonce("user", CLIENT_NONCE.into()).unwrap();
        let server_first = parse::<ServerFirstMessage>(SERVER_FIRST).unwrap();
        let err = exchange.continue_exchange(ctx, &server_first, "pen\u{0627}cil").unwrap_err();
        assert_eq!(err, Error::InvalidProfileInput(Prohibited::Bidi));
    }

    #[test]
    fn prohibited_username_rejected() {
        let err = begin_exchange("us\u{0000}er").unwrap_err();
        assert_eq!(err, Error::InvalidProfileInput(Prohibited::Character('\u{0000}')));
    }

    #[test]
    fn username_is_prepared() {
        let (ctx, client_first) = begin_exchange("\u{2168}").unwrap();
        assert_eq!(client_first.user, "IX");
        assert_eq!(ctx.client_first(), &client_first);
    }

    #[test]
    fn nonce_length_follows_config() {
        let exchange = Exchange::new(Config::default().with_nonce_len(32));
        let (_, client_first) = exchange.begin("user").unwrap();
        assert_eq!(client_first.nonce.len(), 32);
        assert!(!client_first.nonce.contains(','));
    }

    #[test]
    fn fresh_nonce_per_attempt() {
        let (_, first) = begin_exchange("user").unwrap();
        let (_, second) = begin_exchange("user").unwrap();
        assert_ne!(first.nonce, second.nonce);
    }

    #[test]
    fn debug_redacts_server_proof() {
        let (ctx, _) = rfc7677_final_context();
        let debug = format!("{:?}", ctx);
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains(&SERVER_FINAL[2..]));
    }

    #[cfg(not(feature = "trace-secrets"))]
    #[traced_test]
    #[test]
    fn secrets_stay_out_of_logs() {
        let (ctx, _) = rfc7677_final_context();
        let server_final = parse::<ServerFinalMessage>(SERVER_FINAL).unwrap();
        validate_final(&ctx, &server_final).unwrap();

        assert!(logs_contain("SCRAM exchange started"));
        assert!(logs_contain("server signature verified"));
        // Salted password and client proof of the RFC 7677 example.
        assert!(!logs_contain("xKSVEDI6tPlSysH6mUQZOeeOp01r6B3fcJbodRPcYV0="));
        assert!(!logs_contain("dHzbZapWIk4jUhN+Ute9ytag9zjfMHgsqmmiz7AndVQ="));
        assert!(!logs_contain("6rriTRBi23WpRR/wtup+mMhUZUn/dB5nLTJRsjl95G4="));
    }
}
