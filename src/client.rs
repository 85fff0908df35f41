use crate::config::Config;
use crate::error::Result;
use crate::exchange::{Exchange, SaslContext};
use crate::message::{parse, Message, ServerFinalMessage, ServerFirstMessage};

/// The initial state of the SCRAM mechanism. It's the entry point for a SCRAM handshake.
pub struct ScramClient<'a> {
    password: &'a str,
    exchange: Exchange,
    ctx: SaslContext,
    client_first: String,
}

impl<'a> ScramClient<'a> {
    /// Constructs an initial state for the SCRAM mechanism using the provided credentials.
    ///
    /// # Arguments
    ///
    /// * username - An username used for authentication. PostgreSQL takes the user from the
    /// startup message, an empty string is fine there.
    /// * password - A password used to prove that the user is authentic.
    ///
    /// # Return value
    ///
    /// An `Error::InvalidProfileInput` is returned if the username is rejected by SASLprep.
    pub fn new(username: &str, password: &'a str) -> Result<Self> {
        Self::with_config(username, password, Config::default())
    }

    /// Constructs an initial state using a custom [`Config`](struct.Config.html).
    pub fn with_config(username: &str, password: &'a str, config: Config) -> Result<Self> {
        let exchange = Exchange::new(config);
        let (ctx, client_first) = exchange.begin(username)?;
        Ok(ScramClient {
            password,
            exchange,
            ctx,
            client_first: client_first.to_wire(),
        })
    }

    /// Returns the next state and the first client message.
    ///
    /// Call the
    /// [`ServerFirst::handle_server_first`](struct.ServerFirst.html#method.handle_server_first)
    /// method to continue the SCRAM handshake.
    pub fn client_first(self) -> (ServerFirst<'a>, String) {
        let server_first = ServerFirst {
            password: self.password,
            exchange: self.exchange,
            ctx: self.ctx,
        };
        (server_first, self.client_first)
    }
}

/// The second state of the SCRAM mechanism after the first client message was computed.
pub struct ServerFirst<'a> {
    password: &'a str,
    exchange: Exchange,
    ctx: SaslContext,
}

impl<'a> ServerFirst<'a> {
    /// Processes the first answer from the server and returns the next state or an error. If an
    /// error is returned the SCRAM handshake is aborted.
    ///
    /// Call the [`ClientFinal::client_final`](struct.ClientFinal.html#method.client_final) method
    /// to continue the handshake.
    ///
    /// # Return value
    ///
    /// This method returns only a subset of the errors defined in [`Error`](enum.Error.html):
    ///
    /// * Error::MalformedMessage
    /// * Error::UnsupportedExtension
    /// * Error::NonceMismatch
    /// * Error::IterationsTooHigh
    /// * Error::InvalidProfileInput
    pub fn handle_server_first(self, server_first: &str) -> Result<ClientFinal> {
        let server_first = parse::<ServerFirstMessage>(server_first)?;
        let (ctx, client_final) =
            self.exchange.continue_exchange(self.ctx, &server_first, self.password)?;
        Ok(ClientFinal {
            exchange: self.exchange,
            ctx,
            client_final: client_final.encode(),
        })
    }
}

/// The third state of the SCRAM mechanism after the first server message was successfully
/// processed.
#[derive(Debug)]
pub struct ClientFinal {
    exchange: Exchange,
    ctx: SaslContext,
    client_final: String,
}

impl ClientFinal {
    /// Returns the next state and the final client message.
    ///
    /// Call the
    /// [`ServerFinal::handle_server_final`](struct.ServerFinal.html#method.handle_server_final)
    /// method to continue the SCRAM handshake.
    #[inline]
    pub fn client_final(self) -> (ServerFinal, String) {
        let server_final = ServerFinal {
            exchange: self.exchange,
            ctx: self.ctx,
        };
        (server_final, self.client_final)
    }
}

/// The final state of the SCRAM mechanism after the final client message was computed.
#[derive(Debug)]
pub struct ServerFinal {
    exchange: Exchange,
    ctx: SaslContext,
}

impl ServerFinal {
    /// Processes the final answer from the server and returns the authentication result.
    ///
    /// # Return value
    ///
    /// * A value of `Ok(())` signals a successful authentication attempt.
    /// * A value of `Err(Error::MalformedMessage(_))` means that the server's reply couldn't be
    /// understood.
    /// * A value of `Err(Error::AuthenticationFailed)` or `Err(Error::ServerError(_))` means that
    /// the authentication request was rejected.
    ///
    /// Detailed semantics are documented in the [`Error`](enum.Error.html) type.
    pub fn handle_server_final(self, server_final: &str) -> Result<()> {
        let server_final = parse::<ServerFinalMessage>(server_final)?;
        self.exchange.validate_final(&self.ctx, &server_final)
    }
}
