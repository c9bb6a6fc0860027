//! Command-line argument structures for the `dmctl` tool.

use clap::{Parser, ValueEnum};
use std::net::IpAddr;
use std::time::{Duration, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;

use crate::client::ClientConfig;
use crate::transport::Endpoint;
use crate::value::{Value, ValueType};

/// Value type names accepted on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum TypeArg {
    Bool,
    Enumid,
    Int32,
    Counter,
    Uint32,
    Absticks,
    Relticks,
    Int64,
    Uint64,
    Enum,
    Path,
    String,
    Binary,
    Address,
    Date,
    /// Let the server pick the parameter's own type (get only).
    #[default]
    Unknown,
}

impl From<TypeArg> for ValueType {
    fn from(t: TypeArg) -> Self {
        match t {
            TypeArg::Bool => Self::Bool,
            TypeArg::Enumid => Self::EnumId,
            TypeArg::Int32 => Self::Int32,
            TypeArg::Counter => Self::Counter,
            TypeArg::Uint32 => Self::UInt32,
            TypeArg::Absticks => Self::AbsTicks,
            TypeArg::Relticks => Self::RelTicks,
            TypeArg::Int64 => Self::Int64,
            TypeArg::Uint64 => Self::UInt64,
            TypeArg::Enum => Self::Enum,
            TypeArg::Path => Self::Path,
            TypeArg::String => Self::String,
            TypeArg::Binary => Self::Binary,
            TypeArg::Address => Self::Address,
            TypeArg::Date => Self::Date,
            TypeArg::Unknown => Self::Unknown,
        }
    }
}

/// Parse `text` as a value of type `ty`.
///
/// Booleans accept `1/0/true/false`, binary is base64, dates are seconds since
/// the epoch.
pub fn parse_value(ty: ValueType, text: &str) -> Result<Value, String> {
    fn num<T: std::str::FromStr>(text: &str) -> Result<T, String> {
        text.parse()
            .map_err(|_| format!("invalid number '{}'", text))
    }

    Ok(match ty {
        ValueType::Bool => match text {
            "1" | "true" => Value::Bool(true),
            "0" | "false" => Value::Bool(false),
            _ => return Err(format!("invalid boolean '{}'", text)),
        },
        ValueType::EnumId => Value::EnumId(num(text)?),
        ValueType::Int32 => Value::Int32(num(text)?),
        ValueType::Counter => Value::Counter(num(text)?),
        ValueType::UInt32 => Value::UInt32(num(text)?),
        ValueType::AbsTicks => Value::AbsTicks(num(text)?),
        ValueType::RelTicks => Value::RelTicks(num(text)?),
        ValueType::Int64 => Value::Int64(num(text)?),
        ValueType::UInt64 => Value::UInt64(num(text)?),
        ValueType::Enum => Value::Enum(text.to_owned()),
        ValueType::Path => Value::Path(text.to_owned()),
        ValueType::String => Value::String(text.to_owned()),
        ValueType::Binary => {
            let raw = BASE64
                .decode(text)
                .map_err(|_| format!("invalid base64 '{}'", text))?;
            Value::Binary(Bytes::from(raw))
        }
        ValueType::Address => Value::Address(
            text.parse::<IpAddr>()
                .map_err(|_| format!("invalid address '{}'", text))?,
        ),
        ValueType::Date => {
            let secs: u64 = num(text)?;
            Value::Date(UNIX_EPOCH + Duration::from_secs(secs))
        }
        _ => return Err(format!("cannot set a value of type {}", ty)),
    })
}

fn parse_endpoint(s: &str) -> Result<Endpoint, String> {
    s.parse::<Endpoint>().map_err(|e| e.to_string())
}

/// Common arguments shared across all subcommands.
#[derive(Debug, Parser)]
pub struct CommonArgs {
    /// Server endpoint: local:NAME, unix:PATH, tcp:HOST:PORT or HOST:PORT.
    #[arg(short = 'e', long = "endpoint", default_value = "local:DMSERVER", value_parser = parse_endpoint)]
    pub endpoint: Endpoint,

    /// Request timeout in seconds.
    #[arg(short = 't', long = "timeout", default_value = "60")]
    pub timeout: f64,

    /// Connect timeout in seconds.
    #[arg(long = "connect-timeout", default_value = "10")]
    pub connect_timeout: f64,
}

impl CommonArgs {
    /// Connection settings from the CLI arguments.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            request_timeout: Duration::from_secs_f64(self.timeout.max(0.001)),
            connect_timeout: Duration::from_secs_f64(self.connect_timeout.max(0.001)),
            ..ClientConfig::default()
        }
    }
}

/// Output control arguments.
#[derive(Debug, Parser)]
pub struct OutputArgs {
    /// Show request timing.
    #[arg(long = "timing")]
    pub timing: bool,

    /// Enable debug logging (async_dmconfig=debug).
    #[arg(short = 'd', long = "debug")]
    pub debug: bool,

    /// Enable trace logging (async_dmconfig=trace).
    #[arg(short = 'D', long = "trace")]
    pub trace: bool,
}

impl OutputArgs {
    /// Initialize tracing based on debug/trace flags.
    pub fn init_tracing(&self) {
        use tracing_subscriber::EnvFilter;

        let filter = if self.trace {
            "async_dmconfig=trace"
        } else if self.debug {
            "async_dmconfig=debug"
        } else {
            "async_dmconfig=warn"
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(filter))
            .with_writer(std::io::stderr)
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value(ValueType::Bool, "1").unwrap(), Value::Bool(true));
        assert_eq!(parse_value(ValueType::Int32, "-4").unwrap(), Value::Int32(-4));
        assert_eq!(
            parse_value(ValueType::Binary, "3q0=").unwrap(),
            Value::Binary(Bytes::from_static(&[0xde, 0xad]))
        );
        let binary = Value::Binary(Bytes::from_static(b"\x00\xffdm"));
        assert_eq!(parse_value(ValueType::Binary, &binary.to_string()).unwrap(), binary);
        assert!(parse_value(ValueType::Binary, "3q0").is_err());
        assert_eq!(
            parse_value(ValueType::Date, "42").unwrap(),
            Value::Date(UNIX_EPOCH + Duration::from_secs(42))
        );
        assert!(parse_value(ValueType::UInt32, "-1").is_err());
        assert!(parse_value(ValueType::Bool, "yes").is_err());
        assert!(parse_value(ValueType::Unknown, "x").is_err());
    }

    #[test]
    fn test_common_args_defaults() {
        let args = CommonArgs::parse_from(["dmctl"]);
        assert_eq!(args.endpoint, Endpoint::default());
        let config = args.client_config();
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_common_args_tcp_endpoint() {
        let args = CommonArgs::parse_from(["dmctl", "-e", "tcp:127.0.0.1:1100", "-t", "2.5"]);
        assert_eq!(args.endpoint, Endpoint::default_tcp());
        assert_eq!(args.client_config().request_timeout, Duration::from_millis(2500));
    }
}
