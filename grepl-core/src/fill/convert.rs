//! Conversion of raw user tokens into protobuf scalar values.
use prost::bytes::Bytes;
use prost_reflect::{Kind, MapKey, Value};
use std::borrow::Cow;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConvertError {
    #[error("'{value}' is not a valid {kind}")]
    InvalidValue { value: String, kind: String },
    #[error("invalid escape sequence in '{value}': {reason}")]
    InvalidEscape { value: String, reason: &'static str },
}

/// The name of a field type as written in a `.proto` file.
pub(crate) fn type_name(kind: &Kind) -> Cow<'_, str> {
    let name = match kind {
        Kind::Double => "double",
        Kind::Float => "float",
        Kind::Int32 => "int32",
        Kind::Int64 => "int64",
        Kind::Uint32 => "uint32",
        Kind::Uint64 => "uint64",
        Kind::Sint32 => "sint32",
        Kind::Sint64 => "sint64",
        Kind::Fixed32 => "fixed32",
        Kind::Fixed64 => "fixed64",
        Kind::Sfixed32 => "sfixed32",
        Kind::Sfixed64 => "sfixed64",
        Kind::Bool => "bool",
        Kind::String => "string",
        Kind::Bytes => "bytes",
        Kind::Message(m) => return Cow::Owned(m.full_name().to_string()),
        Kind::Enum(e) => return Cow::Owned(e.full_name().to_string()),
    };
    Cow::Borrowed(name)
}

/// Converts `token` into a value of the scalar `kind`.
///
/// An empty token yields the type's default value. Byte fields are decoded with
/// [`decode_escaped_bytes`].
pub(crate) fn convert_scalar(kind: &Kind, token: &str) -> Result<Value, ConvertError> {
    if token.is_empty() {
        return Ok(Value::default_value(kind));
    }

    let invalid = || ConvertError::InvalidValue {
        value: token.to_string(),
        kind: type_name(kind).into_owned(),
    };

    let value = match kind {
        Kind::Double => Value::F64(token.parse().map_err(|_| invalid())?),
        Kind::Float => Value::F32(token.parse().map_err(|_| invalid())?),
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => {
            Value::I32(token.parse().map_err(|_| invalid())?)
        }
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => {
            Value::I64(token.parse().map_err(|_| invalid())?)
        }
        Kind::Uint32 | Kind::Fixed32 => Value::U32(token.parse().map_err(|_| invalid())?),
        Kind::Uint64 | Kind::Fixed64 => Value::U64(token.parse().map_err(|_| invalid())?),
        Kind::Bool => Value::Bool(token.parse().map_err(|_| invalid())?),
        Kind::String => Value::String(token.to_string()),
        Kind::Bytes => Value::Bytes(Bytes::from(decode_escaped_bytes(token)?)),
        Kind::Message(_) | Kind::Enum(_) => return Err(invalid()),
    };

    Ok(value)
}

/// Map keys can only be integral, bool or string values.
pub(crate) fn into_map_key(value: Value) -> Option<MapKey> {
    match value {
        Value::Bool(v) => Some(MapKey::Bool(v)),
        Value::I32(v) => Some(MapKey::I32(v)),
        Value::I64(v) => Some(MapKey::I64(v)),
        Value::U32(v) => Some(MapKey::U32(v)),
        Value::U64(v) => Some(MapKey::U64(v)),
        Value::String(v) => Some(MapKey::String(v)),
        _ => None,
    }
}

/// Decodes a string that may contain escape sequences into raw bytes.
///
/// Unescaped characters are taken as UTF-8. Supported escapes are the single character
/// ones (`\a \b \f \n \r \t \v \\ \' \"`), `\xHH`, three digit octal `\ooo`, and the
/// Unicode forms `\uXXXX` and `\UXXXXXXXX`, which are emitted as UTF-8.
pub fn decode_escaped_bytes(input: &str) -> Result<Vec<u8>, ConvertError> {
    let error = |reason| ConvertError::InvalidEscape {
        value: input.to_string(),
        reason,
    };

    let mut out = Vec::with_capacity(input.len());
    let mut chars = input.chars();
    let mut utf8 = [0u8; 4];

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
            continue;
        }

        let escape = chars.next().ok_or_else(|| error("trailing backslash"))?;
        match escape {
            'a' => out.push(0x07),
            'b' => out.push(0x08),
            'f' => out.push(0x0c),
            'n' => out.push(b'\n'),
            'r' => out.push(b'\r'),
            't' => out.push(b'\t'),
            'v' => out.push(0x0b),
            '\\' | '\'' | '"' => out.push(escape as u8),
            'x' => {
                let byte = take_digits(&mut chars, 2, 16).ok_or_else(|| error("bad \\x escape"))?;
                out.push(byte as u8);
            }
            '0'..='7' => {
                let rest = take_digits(&mut chars, 2, 8).ok_or_else(|| error("bad octal escape"))?;
                let byte = (escape as u32 - '0' as u32) * 64 + rest;
                out.push(u8::try_from(byte).map_err(|_| error("octal escape out of range"))?);
            }
            'u' | 'U' => {
                let len = if escape == 'u' { 4 } else { 8 };
                let code = take_digits(&mut chars, len, 16)
                    .ok_or_else(|| error("bad unicode escape"))?;
                let ch = char::from_u32(code).ok_or_else(|| error("invalid unicode code point"))?;
                out.extend_from_slice(ch.encode_utf8(&mut utf8).as_bytes());
            }
            _ => return Err(error("unknown escape")),
        }
    }

    Ok(out)
}

fn take_digits(chars: &mut std::str::Chars<'_>, len: usize, radix: u32) -> Option<u32> {
    let mut value = 0u32;
    for _ in 0..len {
        let digit = chars.next()?.to_digit(radix)?;
        value = value * radix + digit;
    }
    Some(value)
}
