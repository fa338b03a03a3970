//! Codec trait and the colon-delimited line codec.
//!
//! A codec turns one inbound line into a [`ZoneMessage`] and one
//! [`BillerMessage`] into an outbound line. Line framing itself (the `\n`)
//! belongs to the transport; the codec only ever sees a single line.

use crate::types::tags;
use crate::{BillerMessage, Connect, PLogin, Pid, ProtocolError, Version, ZoneMessage};

/// Converts between protocol lines and typed messages.
///
/// `Send + Sync + 'static` so one codec value can be shared by every
/// connection task.
pub trait Codec: Send + Sync + 'static {
    /// Parses one line (without terminator) sent by a zone.
    fn decode(&self, line: &[u8]) -> Result<ZoneMessage, ProtocolError>;

    /// Renders one biller message as a line (without terminator).
    ///
    /// # Errors
    /// Returns [`ProtocolError::Unencodable`] if a text field contains the
    /// field delimiter or a line break.
    fn encode(&self, msg: &BillerMessage) -> Result<Vec<u8>, ProtocolError>;
}

// ---------------------------------------------------------------------------
// LineCodec
// ---------------------------------------------------------------------------

/// The colon-separated ASCII format zones speak.
///
/// ```rust
/// use biller_protocol::{Codec, LineCodec, Pid, ZoneMessage};
///
/// let msg = LineCodec.decode(b"PENTERARENA:5").unwrap();
/// assert_eq!(msg, ZoneMessage::PEnterArena { pid: Pid(5) });
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct LineCodec;

impl Codec for LineCodec {
    fn decode(&self, line: &[u8]) -> Result<ZoneMessage, ProtocolError> {
        let line = std::str::from_utf8(line).map_err(|_| ProtocolError::NotUtf8)?;
        if line.is_empty() {
            return Err(ProtocolError::Empty);
        }

        let fields: Vec<&str> = line.split(':').collect();
        match fields[0] {
            tags::CONNECT => parse_connect(&fields).map(ZoneMessage::Connect),
            tags::PLOGIN => parse_plogin(&fields).map(ZoneMessage::PLogin),
            tags::PENTERARENA => {
                expect_fields(tags::PENTERARENA, &fields, 2)?;
                let pid = parse_pid(tags::PENTERARENA, fields[1])?;
                Ok(ZoneMessage::PEnterArena { pid })
            }
            tags::PLEAVE => {
                expect_fields(tags::PLEAVE, &fields, 2)?;
                let pid = parse_pid(tags::PLEAVE, fields[1])?;
                Ok(ZoneMessage::PLeave { pid })
            }
            other => Err(ProtocolError::UnknownTag(other.to_string())),
        }
    }

    fn encode(&self, msg: &BillerMessage) -> Result<Vec<u8>, ProtocolError> {
        let line = match msg {
            BillerMessage::ConnectOk {
                server_name,
                network,
            } => format!(
                "{}:{}:{}",
                tags::CONNECTOK,
                field("servername", server_name)?,
                field("network", network)?,
            ),
            BillerMessage::ConnectBad {
                server_name,
                network,
                reason,
            } => format!(
                "{}:{}:{}:{}",
                tags::CONNECTBAD,
                field("servername", server_name)?,
                field("network", network)?,
                field("reason", reason)?,
            ),
            BillerMessage::POk(ok) => format!(
                "{}:{}:{}:{}:{}:{}:{}:{}",
                tags::POK,
                ok.pid,
                field("reservedtext", &ok.reserved_text)?,
                field("name", &ok.name)?,
                field("squad", &ok.squad)?,
                ok.biller_id,
                ok.usage,
                // The date carries colons of its own and is the last field.
                text_field("firstused", &ok.first_used)?,
            ),
            BillerMessage::PBad {
                pid,
                new_name,
                reason,
            } => format!(
                "{}:{}:{}:{}",
                tags::PBAD,
                pid,
                if *new_name { 1 } else { 0 },
                // Last field: free text, colons are harmless.
                text_field("reason", reason)?,
            ),
        };
        Ok(line.into_bytes())
    }
}

fn parse_connect(fields: &[&str]) -> Result<Connect, ProtocolError> {
    expect_fields(tags::CONNECT, fields, 6)?;
    Ok(Connect {
        version: parse_version(fields[1])?,
        sw_name: fields[2].to_string(),
        zone_name: fields[3].to_string(),
        host_name: fields[4].to_string(),
        password: fields[5].to_string(),
    })
}

fn parse_plogin(fields: &[&str]) -> Result<PLogin, ProtocolError> {
    expect_fields(tags::PLOGIN, fields, 8)?;

    let register = match fields[2] {
        "0" => false,
        "1" => true,
        other => {
            return Err(ProtocolError::InvalidField {
                tag: tags::PLOGIN,
                field: "registerflag",
                value: other.to_string(),
            });
        }
    };

    Ok(PLogin {
        pid: parse_pid(tags::PLOGIN, fields[1])?,
        register,
        name: fields[3].to_string(),
        password: fields[4].to_string(),
        ip: fields[5].to_string(),
        mac_id: parse_number(tags::PLOGIN, "macid", fields[6])?,
        cont_id: fields[7].to_string(),
    })
}

fn parse_version(raw: &str) -> Result<Version, ProtocolError> {
    let parts: Vec<&str> = raw.split('.').collect();
    if parts.len() != 3 {
        return Err(ProtocolError::InvalidField {
            tag: tags::CONNECT,
            field: "version",
            value: raw.to_string(),
        });
    }
    Ok(Version {
        major: parse_number(tags::CONNECT, "version", parts[0])?,
        minor: parse_number(tags::CONNECT, "version", parts[1])?,
        patch: parse_number(tags::CONNECT, "version", parts[2])?,
    })
}

fn parse_pid(tag: &'static str, raw: &str) -> Result<Pid, ProtocolError> {
    parse_number(tag, "pid", raw).map(Pid)
}

fn parse_number<T: std::str::FromStr>(
    tag: &'static str,
    field: &'static str,
    raw: &str,
) -> Result<T, ProtocolError> {
    raw.parse().map_err(|_| ProtocolError::InvalidField {
        tag,
        field,
        value: raw.to_string(),
    })
}

fn expect_fields(
    tag: &'static str,
    fields: &[&str],
    expected: usize,
) -> Result<(), ProtocolError> {
    if fields.len() != expected {
        return Err(ProtocolError::FieldCount {
            tag,
            expected,
            got: fields.len(),
        });
    }
    Ok(())
}

/// A field in the middle of a line: no delimiters allowed.
fn field<'a>(name: &'static str, value: &'a str) -> Result<&'a str, ProtocolError> {
    if value.contains(':') {
        return Err(ProtocolError::Unencodable { field: name });
    }
    text_field(name, value)
}

/// The trailing field of a line: only line breaks are forbidden.
fn text_field<'a>(name: &'static str, value: &'a str) -> Result<&'a str, ProtocolError> {
    if value.contains(['\n', '\r']) {
        return Err(ProtocolError::Unencodable { field: name });
    }
    Ok(value)
}
