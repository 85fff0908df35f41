//! SASL payloads inside PostgreSQL style authentication frames.
//!
//! Server frames carry the tag `R`, a self-inclusive length, an authentication code and the
//! payload. Client replies go out as password message frames tagged `p`.

use std::str;

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Error, Kind, Result};
use crate::message::{parse, ClientFinalMessage, ClientFirstMessage, Message, ServerFinalMessage,
                     ServerFirstMessage};
use crate::SCRAM_SHA_256;

/// Tag of authentication request frames.
pub const AUTHENTICATION_TAG: u8 = b'R';
/// Tag of password message frames.
pub const PASSWORD_MESSAGE_TAG: u8 = b'p';

/// Authentication code of `AuthenticationSASL`.
pub const AUTH_SASL: i32 = 10;
/// Authentication code of `AuthenticationSASLContinue`.
pub const AUTH_SASL_CONTINUE: i32 = 11;
/// Authentication code of `AuthenticationSASLFinal`.
pub const AUTH_SASL_FINAL: i32 = 12;

/// A decoded SASL authentication frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authentication<'a> {
    /// The mechanisms the server offers.
    Sasl(Vec<String>),
    /// Payload of a server-first message.
    SaslContinue(&'a [u8]),
    /// Payload of a server-final message.
    SaslFinal(&'a [u8]),
}

impl<'a> Authentication<'a> {
    fn code(&self) -> i32 {
        match self {
            Authentication::Sasl(_) => AUTH_SASL,
            Authentication::SaslContinue(_) => AUTH_SASL_CONTINUE,
            Authentication::SaslFinal(_) => AUTH_SASL_FINAL,
        }
    }

    /// Encodes the frame as a server would send it.
    pub fn encode(&self) -> BytesMut {
        frame(AUTHENTICATION_TAG, |buf| {
            buf.put_i32(self.code());
            match self {
                Authentication::Sasl(mechanisms) => {
                    for mechanism in mechanisms {
                        put_cstr(buf, mechanism);
                    }
                    buf.put_u8(0);
                }
                Authentication::SaslContinue(payload) | Authentication::SaslFinal(payload) => {
                    buf.put_slice(payload)
                }
            }
        })
    }
}

/// Decodes a complete authentication frame.
pub fn decode_authentication(frame: &[u8]) -> Result<Authentication<'_>> {
    let mut buf = frame;
    if buf.remaining() < 9 {
        return Err(Kind::Truncated.into());
    }
    let tag = buf.get_u8();
    if tag != AUTHENTICATION_TAG {
        return Err(Kind::UnexpectedTag(tag).into());
    }
    let len = buf.get_i32();
    if len < 8 {
        return Err(Kind::LengthMismatch.into());
    }
    let body_len = len as usize - 4;
    if buf.remaining() < body_len {
        return Err(Kind::Truncated.into());
    } else if buf.remaining() > body_len {
        return Err(Kind::LengthMismatch.into());
    }

    match buf.get_i32() {
        AUTH_SASL => Ok(Authentication::Sasl(decode_mechanisms(buf)?)),
        AUTH_SASL_CONTINUE => Ok(Authentication::SaslContinue(buf)),
        AUTH_SASL_FINAL => Ok(Authentication::SaslFinal(buf)),
        code => Err(Kind::UnexpectedFrame(code).into()),
    }
}

/// Decodes an `AuthenticationSASL` frame and checks it offers `SCRAM-SHA-256`.
///
/// Returns the name of the selected mechanism.
pub fn negotiate(frame: &[u8]) -> Result<&'static str> {
    match decode_authentication(frame)? {
        Authentication::Sasl(mechanisms) => {
            if mechanisms.iter().any(|m| m == SCRAM_SHA_256) {
                Ok(SCRAM_SHA_256)
            } else {
                Err(Error::UnsupportedMechanism(mechanisms))
            }
        }
        other => Err(Kind::UnexpectedFrame(other.code()).into()),
    }
}

/// Decodes an `AuthenticationSASLContinue` frame into the server-first message.
pub fn decode_continue(frame: &[u8]) -> Result<ServerFirstMessage> {
    match decode_authentication(frame)? {
        Authentication::SaslContinue(payload) => parse(utf8(payload)?),
        other => Err(Kind::UnexpectedFrame(other.code()).into()),
    }
}

/// Decodes an `AuthenticationSASLFinal` frame into the server-final message.
pub fn decode_final(frame: &[u8]) -> Result<ServerFinalMessage> {
    match decode_authentication(frame)? {
        Authentication::SaslFinal(payload) => parse(utf8(payload)?),
        other => Err(Kind::UnexpectedFrame(other.code()).into()),
    }
}

/// Encodes the initial response: mechanism name, NUL, length prefixed client-first message.
pub fn encode_initial_response(client_first: &ClientFirstMessage) -> BytesMut {
    let payload = client_first.to_wire();
    frame(PASSWORD_MESSAGE_TAG, |buf| {
        put_cstr(buf, SCRAM_SHA_256);
        put_payload(buf, payload.as_bytes());
    })
}

/// Encodes the continue response: the length prefixed client-final message.
pub fn encode_response(client_final: &ClientFinalMessage) -> BytesMut {
    let payload = client_final.encode();
    frame(PASSWORD_MESSAGE_TAG, |buf| put_payload(buf, payload.as_bytes()))
}

fn decode_mechanisms(mut buf: &[u8]) -> Result<Vec<String>> {
    let mut mechanisms = Vec::new();
    loop {
        let end = buf.iter().position(|&b| b == 0).ok_or(Kind::Truncated)?;
        if end == 0 {
            buf.advance(1);
            break;
        }
        let name = str::from_utf8(&buf[..end])
            .ok()
            .filter(|name| name.bytes().all(|b| b.is_ascii_graphic()))
            .ok_or(Kind::InvalidMechanismName)?;
        mechanisms.push(name.to_owned());
        buf.advance(end + 1);
    }
    if buf.has_remaining() {
        return Err(Kind::LengthMismatch.into());
    }
    Ok(mechanisms)
}

fn utf8(payload: &[u8]) -> Result<&str> {
    str::from_utf8(payload).map_err(|_| Kind::InvalidUtf8.into())
}

/// Writes a frame with `tag`, filling in the self-inclusive length after `body` ran.
fn frame<F: FnOnce(&mut BytesMut)>(tag: u8, body: F) -> BytesMut {
    let mut buf = BytesMut::new();
    buf.put_u8(tag);
    buf.put_i32(0);
    body(&mut buf);
    let len = (buf.len() - 1) as i32;
    buf[1..5].copy_from_slice(&len.to_be_bytes());
    buf
}

fn put_cstr(buf: &mut BytesMut, s: &str) {
    buf.put_slice(s.as_bytes());
    buf.put_u8(0);
}

fn put_payload(buf: &mut BytesMut, payload: &[u8]) {
    buf.put_i32(payload.len() as i32);
    buf.put_slice(payload);
}
