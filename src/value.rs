//! Typed configuration values.
//!
//! A typed value travels in an attribute whose code names its type (see
//! [`codes::avp`](crate::codes::avp)). [`Value`] models every such type and
//! converts to and from attributes.

use std::net::IpAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;

use crate::avp::{Avp, AvpHeader, AvpWrite};
use crate::codes::avp;
use crate::error::Result;
use crate::format::hex;

/// Value type tag, used when requesting values with `DB_GET`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ValueType {
    Bool,
    EnumId,
    Int32,
    Counter,
    UInt32,
    AbsTicks,
    RelTicks,
    Int64,
    UInt64,
    Enum,
    Path,
    String,
    Binary,
    Address,
    Date,
    /// Let the server pick the parameter's own type.
    Unknown,
}

impl ValueType {
    /// Attribute code carrying values of this type.
    pub fn code(&self) -> u32 {
        match self {
            Self::Bool => avp::BOOL,
            Self::EnumId => avp::ENUMID,
            Self::Int32 => avp::INT32,
            Self::Counter => avp::COUNTER,
            Self::UInt32 => avp::UINT32,
            Self::AbsTicks => avp::ABSTICKS,
            Self::RelTicks => avp::RELTICKS,
            Self::Int64 => avp::INT64,
            Self::UInt64 => avp::UINT64,
            Self::Enum => avp::ENUM,
            Self::Path => avp::PATH,
            Self::String => avp::STRING,
            Self::Binary => avp::BINARY,
            Self::Address => avp::ADDRESS,
            Self::Date => avp::DATE,
            Self::Unknown => avp::UNKNOWN,
        }
    }

    /// Type named by an attribute code, if any.
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            avp::BOOL => Self::Bool,
            avp::ENUMID => Self::EnumId,
            avp::INT32 => Self::Int32,
            avp::COUNTER => Self::Counter,
            avp::UINT32 => Self::UInt32,
            avp::ABSTICKS => Self::AbsTicks,
            avp::RELTICKS => Self::RelTicks,
            avp::INT64 => Self::Int64,
            avp::UINT64 => Self::UInt64,
            avp::ENUM => Self::Enum,
            avp::PATH => Self::Path,
            avp::STRING => Self::String,
            avp::BINARY => Self::Binary,
            avp::ADDRESS => Self::Address,
            avp::DATE => Self::Date,
            avp::UNKNOWN => Self::Unknown,
            _ => return None,
        })
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::EnumId => "enumid",
            Self::Int32 => "int32",
            Self::Counter => "counter",
            Self::UInt32 => "uint32",
            Self::AbsTicks => "absticks",
            Self::RelTicks => "relticks",
            Self::Int64 => "int64",
            Self::UInt64 => "uint64",
            Self::Enum => "enum",
            Self::Path => "path",
            Self::String => "string",
            Self::Binary => "binary",
            Self::Address => "address",
            Self::Date => "date",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A typed configuration value.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Value {
    Bool(bool),
    /// Enumeration by index.
    EnumId(i32),
    Int32(i32),
    Counter(u32),
    UInt32(u32),
    /// Absolute ticks (tenths of a second since boot).
    AbsTicks(i64),
    /// Relative ticks (tenths of a second).
    RelTicks(i64),
    Int64(i64),
    UInt64(u64),
    /// Enumeration by name.
    Enum(String),
    Path(String),
    String(String),
    Binary(Bytes),
    Address(IpAddr),
    Date(SystemTime),
    /// Attribute with a code that names no value type.
    Unknown { code: u32, data: Bytes },
}

impl Value {
    /// Type of this value, or `None` for [`Value::Unknown`].
    pub fn value_type(&self) -> Option<ValueType> {
        Some(match self {
            Self::Bool(_) => ValueType::Bool,
            Self::EnumId(_) => ValueType::EnumId,
            Self::Int32(_) => ValueType::Int32,
            Self::Counter(_) => ValueType::Counter,
            Self::UInt32(_) => ValueType::UInt32,
            Self::AbsTicks(_) => ValueType::AbsTicks,
            Self::RelTicks(_) => ValueType::RelTicks,
            Self::Int64(_) => ValueType::Int64,
            Self::UInt64(_) => ValueType::UInt64,
            Self::Enum(_) => ValueType::Enum,
            Self::Path(_) => ValueType::Path,
            Self::String(_) => ValueType::String,
            Self::Binary(_) => ValueType::Binary,
            Self::Address(_) => ValueType::Address,
            Self::Date(_) => ValueType::Date,
            Self::Unknown { .. } => return None,
        })
    }

    /// Attribute code this value is sent under.
    pub fn code(&self) -> u32 {
        match self {
            Self::Unknown { code, .. } => *code,
            other => other.value_type().map_or(avp::UNKNOWN, |t| t.code()),
        }
    }

    /// Decode a value from a typed attribute.
    ///
    /// # Examples
    ///
    /// ```
    /// use async_dmconfig::avp::{AvpGroup, AvpWrite};
    /// use async_dmconfig::codes::avp;
    /// use async_dmconfig::Value;
    ///
    /// # fn main() -> async_dmconfig::Result<()> {
    /// let mut g = AvpGroup::new();
    /// g.put_i32(avp::INT32, -5)?;
    /// let attr = g.cursor().expect(avp::INT32)?;
    /// assert_eq!(Value::decode(&attr)?, Value::Int32(-5));
    /// # Ok(())
    /// # }
    /// ```
    pub fn decode(attr: &Avp) -> Result<Self> {
        Ok(match attr.code {
            avp::BOOL => Self::Bool(attr.as_bool()?),
            avp::ENUMID => Self::EnumId(attr.as_i32()?),
            avp::INT32 => Self::Int32(attr.as_i32()?),
            avp::COUNTER => Self::Counter(attr.as_u32()?),
            avp::UINT32 => Self::UInt32(attr.as_u32()?),
            avp::ABSTICKS => Self::AbsTicks(attr.as_i64()?),
            avp::RELTICKS => Self::RelTicks(attr.as_i64()?),
            avp::INT64 => Self::Int64(attr.as_i64()?),
            avp::UINT64 => Self::UInt64(attr.as_u64()?),
            avp::ENUM => Self::Enum(attr.as_string()?),
            avp::PATH => Self::Path(attr.as_string()?),
            avp::STRING => Self::String(attr.as_string()?),
            avp::BINARY => Self::Binary(attr.data.clone()),
            avp::ADDRESS => Self::Address(attr.as_address()?),
            avp::DATE => Self::Date(attr.as_date()?),
            code => Self::Unknown {
                code,
                data: attr.data.clone(),
            },
        })
    }

    /// Append this value as a typed attribute.
    pub fn encode<W: AvpWrite>(&self, out: &mut W) -> Result<()> {
        let header = AvpHeader::vendor(self.code());
        match self {
            Self::Bool(v) => out.put_bool(header, *v),
            Self::EnumId(v) | Self::Int32(v) => out.put_i32(header, *v),
            Self::Counter(v) | Self::UInt32(v) => out.put_u32(header, *v),
            Self::AbsTicks(v) | Self::RelTicks(v) | Self::Int64(v) => out.put_i64(header, *v),
            Self::UInt64(v) => out.put_u64(header, *v),
            Self::Enum(s) | Self::Path(s) | Self::String(s) => out.put_str(header, s),
            Self::Binary(b) => out.put_avp(header, b),
            Self::Address(addr) => out.put_address(header, *addr),
            Self::Date(t) => out.put_date(header, *t),
            Self::Unknown { data, .. } => out.put_avp(header, data),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Enum(s) | Self::Path(s) | Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::Counter(v) | Self::UInt32(v) => Some(*v),
            Self::Int32(v) | Self::EnumId(v) if *v >= 0 => Some(*v as u32),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int32(v) | Self::EnumId(v) => Some(*v as i64),
            Self::Counter(v) | Self::UInt32(v) => Some(*v as i64),
            Self::AbsTicks(v) | Self::RelTicks(v) | Self::Int64(v) => Some(*v),
            Self::UInt64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<IpAddr> {
        match self {
            Self::Address(a) => Some(*a),
            _ => None,
        }
    }
}

/// Text rendering used by command-line tools and logs.
///
/// Binary values render as standard padded base64, dates as seconds since
/// the Unix epoch, booleans as `1`/`0`.
impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(v) => f.write_str(if *v { "1" } else { "0" }),
            Self::EnumId(v) | Self::Int32(v) => write!(f, "{}", v),
            Self::Counter(v) | Self::UInt32(v) => write!(f, "{}", v),
            Self::AbsTicks(v) | Self::RelTicks(v) | Self::Int64(v) => write!(f, "{}", v),
            Self::UInt64(v) => write!(f, "{}", v),
            Self::Enum(s) | Self::Path(s) | Self::String(s) => f.write_str(s),
            Self::Binary(data) => f.write_str(&BASE64.encode(data)),
            Self::Address(addr) => write!(f, "{}", addr),
            Self::Date(t) => {
                let secs = t.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
                write!(f, "{}", secs)
            }
            Self::Unknown { code, data } => write!(f, "unknown({}, {})", code, hex::Bytes(data)),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int32(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::UInt32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::UInt64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<IpAddr> for Value {
    fn from(v: IpAddr) -> Self {
        Self::Address(v)
    }
}
