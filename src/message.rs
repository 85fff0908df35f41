//! The four SCRAM messages and their wire text.
//!
//! Every message serializes its attributes in one fixed order. Parsing accepts the attributes of
//! a message in any order but requires each expected attribute exactly once.

use std::borrow::Cow;
use std::num::NonZeroU32;

use crate::error::{Error, Field, Kind, Result};
use crate::{CHANNEL_BINDING, GS2_HEADER};

/// Conversion between a SCRAM message and its wire text.
pub trait Message: Sized {
    /// Serializes the message. This is the form that enters the auth message.
    fn encode(&self) -> String;

    /// Parses the wire text of the message.
    fn decode(text: &str) -> Result<Self>;
}

/// Parses `text` as the message type `M`.
pub fn parse<M: Message>(text: &str) -> Result<M> {
    M::decode(text)
}

/// `client-first-message-bare` along with the GS2 header it travels with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientFirstMessage {
    /// Prepared username, unescaped.
    pub user: String,
    /// Client nonce.
    pub nonce: String,
}

impl ClientFirstMessage {
    /// The message as sent to the server, prefixed with the `n,,` GS2 header.
    pub fn to_wire(&self) -> String {
        format!("{}{}", GS2_HEADER, self.encode())
    }
}

impl Message for ClientFirstMessage {
    fn encode(&self) -> String {
        format!("n={},r={}", escape_saslname(&self.user), self.nonce)
    }

    fn decode(text: &str) -> Result<Self> {
        if !text.starts_with(GS2_HEADER) {
            return Err(Kind::MissingGs2Header.into());
        }
        let attrs = Attributes::parse(&text[GS2_HEADER.len()..], b"nr")?;
        Ok(ClientFirstMessage {
            user: unescape_saslname(attrs.required(b'n')?)?.into_owned(),
            nonce: nonce(attrs.required(b'r')?)?,
        })
    }
}

/// `server-first-message`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerFirstMessage {
    /// Client nonce followed by the server's own nonce.
    pub nonce: String,
    /// Salt for the key derivation.
    pub salt: Vec<u8>,
    /// Rounds of the key derivation.
    pub iterations: NonZeroU32,
}

impl Message for ServerFirstMessage {
    fn encode(&self) -> String {
        format!("r={},s={},i={}", self.nonce, base64::encode(&self.salt), self.iterations)
    }

    fn decode(text: &str) -> Result<Self> {
        let attrs = Attributes::parse(text, b"rsi")?;
        let salt = base64_field(attrs.required(b's')?, Field::Salt)?;
        let iterations = attrs
            .required(b'i')?
            .parse::<NonZeroU32>()
            .map_err(|_| Kind::InvalidField(Field::Iterations))?;
        Ok(ServerFirstMessage {
            nonce: nonce(attrs.required(b'r')?)?,
            salt,
            iterations,
        })
    }
}

/// `client-final-message`, with or without the proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientFinalMessage {
    /// Base64 encoded GS2 header, always `biws`.
    pub channel_binding: String,
    /// The combined nonce from the server-first message.
    pub nonce: String,
    /// Client proof. Absent only while building the auth message.
    pub proof: Option<Vec<u8>>,
}

impl ClientFinalMessage {
    pub(crate) fn without_proof(nonce: &str) -> Self {
        ClientFinalMessage {
            channel_binding: CHANNEL_BINDING.to_owned(),
            nonce: nonce.to_owned(),
            proof: None,
        }
    }
}

impl Message for ClientFinalMessage {
    fn encode(&self) -> String {
        let mut text = format!("c={},r={}", self.channel_binding, self.nonce);
        if let Some(ref proof) = self.proof {
            text.push_str(",p=");
            text.push_str(&base64::encode(proof));
        }
        text
    }

    fn decode(text: &str) -> Result<Self> {
        let attrs = Attributes::parse(text, b"crp")?;
        let proof = match attrs.optional(b'p') {
            Some(proof) => Some(base64_field(proof, Field::Proof)?),
            None => None,
        };
        Ok(ClientFinalMessage {
            channel_binding: attrs.required(b'c')?.to_owned(),
            nonce: nonce(attrs.required(b'r')?)?,
            proof,
        })
    }
}

/// `server-final-message` carrying a verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerFinalMessage {
    /// The server signature.
    pub server_proof: Vec<u8>,
}

impl Message for ServerFinalMessage {
    fn encode(&self) -> String {
        format!("v={}", base64::encode(&self.server_proof))
    }

    /// Fails with [`Error::ServerError`] when the server sent `e=` instead of a verifier.
    fn decode(text: &str) -> Result<Self> {
        if text.starts_with("e=") {
            return Err(Error::ServerError(text[2..].to_owned()));
        }
        let attrs = Attributes::parse(text, b"v")?;
        let server_proof = base64_field(attrs.required(b'v')?, Field::Verifier)?;
        Ok(ServerFinalMessage { server_proof })
    }
}

/// Any of the four messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScramMessage {
    ClientFirst(ClientFirstMessage),
    ServerFirst(ServerFirstMessage),
    ClientFinal(ClientFinalMessage),
    ServerFinal(ServerFinalMessage),
}

impl ScramMessage {
    /// Serializes the wrapped message.
    pub fn encode(&self) -> String {
        match self {
            ScramMessage::ClientFirst(msg) => msg.encode(),
            ScramMessage::ServerFirst(msg) => msg.encode(),
            ScramMessage::ClientFinal(msg) => msg.encode(),
            ScramMessage::ServerFinal(msg) => msg.encode(),
        }
    }
}

impl From<ClientFirstMessage> for ScramMessage {
    fn from(msg: ClientFirstMessage) -> Self {
        ScramMessage::ClientFirst(msg)
    }
}

impl From<ServerFirstMessage> for ScramMessage {
    fn from(msg: ServerFirstMessage) -> Self {
        ScramMessage::ServerFirst(msg)
    }
}

impl From<ClientFinalMessage> for ScramMessage {
    fn from(msg: ClientFinalMessage) -> Self {
        ScramMessage::ClientFinal(msg)
    }
}

impl From<ServerFinalMessage> for ScramMessage {
    fn from(msg: ServerFinalMessage) -> Self {
        ScramMessage::ServerFinal(msg)
    }
}

/// The attributes of a message after it has been split on commas.
struct Attributes<'a> {
    found: Vec<(u8, &'a str)>,
}

impl<'a> Attributes<'a> {
    /// Splits `text` into `key=value` segments, accepting only the keys in `accepted`. A bare key
    /// is taken as an empty value.
    fn parse(text: &'a str, accepted: &[u8]) -> Result<Self> {
        let mut found: Vec<(u8, &'a str)> = Vec::with_capacity(accepted.len());
        for part in text.split(',') {
            let bytes = part.as_bytes();
            let value = match bytes.get(1) {
                None => "",
                Some(b'=') => &part[2..],
                Some(_) => return Err(unknown(part)),
            };
            let key = match bytes.first() {
                Some(b'm') => return Err(Error::UnsupportedExtension),
                Some(key) if accepted.contains(key) => *key,
                _ => return Err(unknown(part)),
            };
            if found.iter().any(|&(k, _)| k == key) {
                return Err(Kind::DuplicateField(field(key)).into());
            }
            found.push((key, value));
        }
        Ok(Attributes { found })
    }

    fn optional(&self, key: u8) -> Option<&'a str> {
        self.found.iter().find(|&&(k, _)| k == key).map(|&(_, v)| v)
    }

    fn required(&self, key: u8) -> Result<&'a str> {
        self.optional(key).ok_or_else(|| Kind::ExpectedField(field(key)).into())
    }
}

fn unknown(part: &str) -> Error {
    let key = part.split('=').next().unwrap_or_default();
    Kind::UnknownAttribute(key.to_owned()).into()
}

fn field(key: u8) -> Field {
    match key {
        b'n' => Field::Authcid,
        b'r' => Field::Nonce,
        b's' => Field::Salt,
        b'i' => Field::Iterations,
        b'c' => Field::ChannelBinding,
        b'p' => Field::Proof,
        _ => Field::Verifier,
    }
}

/// Checks the nonce only holds printable characters other than comma.
fn nonce(value: &str) -> Result<String> {
    if value.bytes().all(|b| (0x21..=0x7E).contains(&b)) {
        Ok(value.to_owned())
    } else {
        Err(Kind::InvalidField(Field::Nonce).into())
    }
}

/// Decodes padded Base64, rejecting any spelling that wouldn't encode back to `value`. The auth
/// message is built from re-encoded fields, so both peers must sign the same text.
fn base64_field(value: &str, field: Field) -> Result<Vec<u8>> {
    match base64::decode(value) {
        Ok(bytes) if base64::encode(&bytes) == value => Ok(bytes),
        _ => Err(Kind::InvalidField(field).into()),
    }
}

fn escape_saslname(name: &str) -> Cow<'_, str> {
    if name.contains(|c: char| c == ',' || c == '=') {
        name.replace('=', "=3D").replace(',', "=2C").into()
    } else {
        name.into()
    }
}

fn unescape_saslname(name: &str) -> Result<Cow<'_, str>> {
    if !name.contains('=') {
        return Ok(name.into());
    }
    let mut out = String::with_capacity(name.len());
    let mut rest = name;
    while let Some(pos) = rest.find('=') {
        out.push_str(&rest[..pos]);
        match rest.get(pos + 1..pos + 3) {
            Some("2C") => out.push(','),
            Some("3D") => out.push('='),
            _ => return Err(Kind::InvalidField(Field::Authcid).into()),
        }
        rest = &rest[pos + 3..];
    }
    out.push_str(rest);
    Ok(out.into())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn iterations(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    #[test]
    fn client_first_serialization() {
        let msg = ClientFirstMessage {
            user: "user".into(),
            nonce: "fyko+d2lbbFgONRv9qkxdawL".into(),
        };
        assert_eq!(msg.encode(), "n=user,r=fyko+d2lbbFgONRv9qkxdawL");
        assert_eq!(msg.to_wire(), "n,,n=user,r=fyko+d2lbbFgONRv9qkxdawL");
        assert_eq!(parse::<ClientFirstMessage>(&msg.to_wire()).unwrap(), msg);
    }

    #[test]
    fn client_first_escapes_username() {
        let msg = ClientFirstMessage { user: "a,b=c".into(), nonce: "xyz".into() };
        assert_eq!(msg.encode(), "n=a=2Cb=3Dc,r=xyz");
        assert_eq!(parse::<ClientFirstMessage>(&msg.to_wire()).unwrap(), msg);
    }

    #[test]
    fn client_first_empty_user() {
        let msg = parse::<ClientFirstMessage>("n,,n=,r=abc").unwrap();
        assert_eq!(msg.user, "");
        assert_eq!(msg.nonce, "abc");
    }

    #[rstest]
    #[case("n=user,r=abc", Kind::MissingGs2Header)]
    #[case("y,,n=user,r=abc", Kind::MissingGs2Header)]
    #[case("n,a=admin,n=user,r=abc", Kind::MissingGs2Header)]
    #[case("n,,n=user", Kind::ExpectedField(Field::Nonce))]
    #[case("n,,r=abc", Kind::ExpectedField(Field::Authcid))]
    #[case("n,,n=user,r=abc,r=def", Kind::DuplicateField(Field::Nonce))]
    #[case("n,,n=user,r=abc,x=1", Kind::UnknownAttribute("x".into()))]
    #[case("n,,n=user,rr=abc", Kind::UnknownAttribute("rr".into()))]
    #[case("n,,n=a=2Xb,r=abc", Kind::InvalidField(Field::Authcid))]
    #[case("n,,n=user,r=a\u{7F}c", Kind::InvalidField(Field::Nonce))]
    fn client_first_rejects(#[case] text: &str, #[case] kind: Kind) {
        assert_eq!(parse::<ClientFirstMessage>(text).unwrap_err(), Error::MalformedMessage(kind));
    }

    #[test]
    fn server_first_is_order_independent() {
        let expected = ServerFirstMessage {
            nonce: "abc%def".into(),
            salt: b"salt".to_vec(),
            iterations: iterations(4096),
        };
        assert_eq!(parse::<ServerFirstMessage>("r=abc%def,s=c2FsdA==,i=4096").unwrap(), expected);
        assert_eq!(parse::<ServerFirstMessage>("i=4096,r=abc%def,s=c2FsdA==").unwrap(), expected);
        assert_eq!(expected.encode(), "r=abc%def,s=c2FsdA==,i=4096");
    }

    #[rstest]
    #[case("r=abc,s=c2FsdA==", Error::MalformedMessage(Kind::ExpectedField(Field::Iterations)))]
    #[case("r=abc,i=1", Error::MalformedMessage(Kind::ExpectedField(Field::Salt)))]
    #[case("s=c2FsdA==,i=1", Error::MalformedMessage(Kind::ExpectedField(Field::Nonce)))]
    #[case("r=abc,s=c2FsdA==,i=-1", Error::MalformedMessage(Kind::InvalidField(Field::Iterations)))]
    #[case("r=abc,s=c2FsdA==,i=x", Error::MalformedMessage(Kind::InvalidField(Field::Iterations)))]
    #[case("r=abc,s=c2FsdA==,i=0", Error::MalformedMessage(Kind::InvalidField(Field::Iterations)))]
    #[case("r=abc,s=not*base64,i=1", Error::MalformedMessage(Kind::InvalidField(Field::Salt)))]
    #[case("r=abc,s=c2FsdA,i=1", Error::MalformedMessage(Kind::InvalidField(Field::Salt)))]
    #[case("r=abc,s=c2FsdB==,i=1", Error::MalformedMessage(Kind::InvalidField(Field::Salt)))]
    #[case("m=ext,r=abc,s=c2FsdA==,i=1", Error::UnsupportedExtension)]
    #[case("", Error::MalformedMessage(Kind::UnknownAttribute("".into())))]
    fn server_first_rejects(#[case] text: &str, #[case] err: Error) {
        assert_eq!(parse::<ServerFirstMessage>(text).unwrap_err(), err);
    }

    #[test]
    fn client_final_with_and_without_proof() {
        let mut msg = ClientFinalMessage::without_proof("abcdef");
        assert_eq!(msg.encode(), "c=biws,r=abcdef");
        assert_eq!(parse::<ClientFinalMessage>("c=biws,r=abcdef").unwrap(), msg);

        msg.proof = Some(vec![1, 2, 3]);
        assert_eq!(msg.encode(), "c=biws,r=abcdef,p=AQID");
        assert_eq!(parse::<ClientFinalMessage>(&msg.encode()).unwrap(), msg);
    }

    #[rstest]
    #[case("c=biws", Kind::ExpectedField(Field::Nonce))]
    #[case("r=abc,p=AQID", Kind::ExpectedField(Field::ChannelBinding))]
    #[case("c=biws,r=abc,p=@@", Kind::InvalidField(Field::Proof))]
    #[case("c=biws,r=abc,p=AQID,p=AQID", Kind::DuplicateField(Field::Proof))]
    fn client_final_rejects(#[case] text: &str, #[case] kind: Kind) {
        assert_eq!(parse::<ClientFinalMessage>(text).unwrap_err(), Error::MalformedMessage(kind));
    }

    #[test]
    fn server_final() {
        let msg = parse::<ServerFinalMessage>("v=AQID").unwrap();
        assert_eq!(msg.server_proof, vec![1, 2, 3]);
        assert_eq!(msg.encode(), "v=AQID");
        assert_eq!(
            parse::<ServerFinalMessage>("").unwrap_err(),
            Error::MalformedMessage(Kind::UnknownAttribute("".into()))
        );
        assert_eq!(
            parse::<ServerFinalMessage>("v").unwrap(),
            ServerFinalMessage { server_proof: Vec::new() }
        );
    }

    #[test]
    fn server_final_error_attribute() {
        assert_eq!(
            parse::<ServerFinalMessage>("e=invalid-proof").unwrap_err(),
            Error::ServerError("invalid-proof".into())
        );
    }

    #[test]
    fn scram_message_encodes_variant() {
        let msg: ScramMessage = ServerFinalMessage { server_proof: vec![0xFF] }.into();
        assert_eq!(msg.encode(), "v=/w==");
    }
}
