//! Error types for GUI RPC operations
//!
//! Every failure surfaced by this crate maps onto one of five kinds
//! (see [`ErrorKind`]): precondition, transport, protocol, authorization
//! and decode. None of them is retried internally.

use std::error::Error;
use std::fmt;
use std::io;

/// Result type for RPC operations
pub type RpcResult<T> = Result<T, RpcError>;

/// Coarse classification of an [`RpcError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	/// Operation invoked in the wrong client state or with invalid arguments
	Precondition,
	/// Socket connect/read/write failure
	Transport,
	/// Server error indicator or a reply of unexpected shape
	Protocol,
	/// Unauthorized indicator or failed handshake
	Authorization,
	/// Numeric or date text did not parse
	Decode,
}

/// Main error type for RPC operations
#[derive(Debug)]
pub enum RpcError {
	/// Operation attempted before a successful handshake
	NotConnected,

	/// `connect` called on a client that is already connected
	AlreadyConnected,

	/// Caller supplied a value outside its allowed range
	InvalidArgument { message: String },

	/// Configuration could not be resolved (e.g. unreadable password file)
	Config(ConfigError),

	/// Failed to open the TCP connection
	ConnectFailed { address: String, source: io::Error },

	/// I/O error on an established connection
	Io(io::Error),

	/// Server replied with an error indicator; message passed through verbatim
	Server { message: String },

	/// Reply element did not match what the client expected
	UnexpectedElement { expected: String, found: String },

	/// Markup could not be parsed
	Xml { message: String },

	/// Server replied with the unauthorized indicator
	Unauthorized,

	/// Handshake did not end in the authorized indicator
	AuthenticationFailed { message: String },

	/// Element text did not decode as the expected type
	Decode { element: String, value: String, reason: String },
}

impl RpcError {
	/// Classify this error into one of the five error kinds
	pub fn kind(&self) -> ErrorKind {
		match self {
			RpcError::NotConnected
			| RpcError::AlreadyConnected
			| RpcError::InvalidArgument { .. }
			| RpcError::Config(_) => ErrorKind::Precondition,
			RpcError::ConnectFailed { .. } | RpcError::Io(_) => ErrorKind::Transport,
			RpcError::Server { .. }
			| RpcError::UnexpectedElement { .. }
			| RpcError::Xml { .. } => ErrorKind::Protocol,
			RpcError::Unauthorized | RpcError::AuthenticationFailed { .. } => {
				ErrorKind::Authorization
			}
			RpcError::Decode { .. } => ErrorKind::Decode,
		}
	}

	/// Whether the connection can still be used after this error.
	///
	/// Only a server error indicator leaves the stream at a known position
	/// (the rest of the reply is drained before the error is returned).
	pub fn keeps_connection(&self) -> bool {
		matches!(
			self,
			RpcError::Server { .. } | RpcError::InvalidArgument { .. } | RpcError::AlreadyConnected
		)
	}

	pub(crate) fn decode(element: &str, value: &str, reason: impl fmt::Display) -> Self {
		RpcError::Decode {
			element: element.to_string(),
			value: value.to_string(),
			reason: reason.to_string(),
		}
	}
}

impl fmt::Display for RpcError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RpcError::NotConnected => write!(f, "Not connected"),
			RpcError::AlreadyConnected => write!(f, "Already connected"),
			RpcError::InvalidArgument { message } => write!(f, "Invalid argument: {}", message),
			RpcError::Config(e) => write!(f, "Configuration error: {}", e),
			RpcError::ConnectFailed { address, source } => {
				write!(f, "Failed to connect to {}: {}", address, source)
			}
			RpcError::Io(e) => write!(f, "I/O error: {}", e),
			RpcError::Server { message } => write!(f, "{}", message),
			RpcError::UnexpectedElement { expected, found } => {
				write!(f, "Unexpected element: expected <{}>, got <{}>", expected, found)
			}
			RpcError::Xml { message } => write!(f, "Malformed reply: {}", message),
			RpcError::Unauthorized => write!(f, "Unauthorized"),
			RpcError::AuthenticationFailed { message } => {
				write!(f, "Authentication failed: {}", message)
			}
			RpcError::Decode { element, value, reason } => {
				write!(f, "Cannot decode <{}> value {:?}: {}", element, value, reason)
			}
		}
	}
}

impl Error for RpcError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			RpcError::ConnectFailed { source, .. } => Some(source),
			RpcError::Io(e) => Some(e),
			RpcError::Config(e) => Some(e),
			_ => None,
		}
	}
}

impl From<io::Error> for RpcError {
	fn from(e: io::Error) -> Self {
		RpcError::Io(e)
	}
}

impl From<ConfigError> for RpcError {
	fn from(e: ConfigError) -> Self {
		RpcError::Config(e)
	}
}

impl From<quick_xml::Error> for RpcError {
	fn from(e: quick_xml::Error) -> Self {
		match e {
			quick_xml::Error::Io(io) => RpcError::Io(io::Error::new(io.kind(), io.to_string())),
			other => RpcError::Xml { message: other.to_string() },
		}
	}
}

/// Errors raised while loading configuration
#[derive(Debug)]
pub enum ConfigError {
	/// Failed to read a configuration or password file
	Read { path: String, source: io::Error },

	/// Configuration file is not valid TOML for [`crate::config::Config`]
	Parse { path: String, message: String },

	/// Environment variable holds an unusable value
	InvalidEnv { name: String, value: String },

	/// Setting holds a value outside its allowed range
	InvalidValue { name: String, message: String },
}

impl fmt::Display for ConfigError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ConfigError::Read { path, source } => write!(f, "Cannot read {}: {}", path, source),
			ConfigError::Parse { path, message } => {
				write!(f, "Invalid configuration in {}: {}", path, message)
			}
			ConfigError::InvalidEnv { name, value } => {
				write!(f, "Invalid value for {}: {:?}", name, value)
			}
			ConfigError::InvalidValue { name, message } => write!(f, "Invalid {}: {}", name, message),
		}
	}
}

impl Error for ConfigError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			ConfigError::Read { source, .. } => Some(source),
			_ => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_error_kinds() {
		assert_eq!(RpcError::NotConnected.kind(), ErrorKind::Precondition);
		assert_eq!(RpcError::AlreadyConnected.kind(), ErrorKind::Precondition);
		assert_eq!(
			RpcError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "pipe")).kind(),
			ErrorKind::Transport
		);
		assert_eq!(RpcError::Server { message: "x".into() }.kind(), ErrorKind::Protocol);
		assert_eq!(
			RpcError::UnexpectedElement { expected: "a".into(), found: "b".into() }.kind(),
			ErrorKind::Protocol
		);
		assert_eq!(RpcError::Unauthorized.kind(), ErrorKind::Authorization);
		assert_eq!(RpcError::decode("x", "y", "bad").kind(), ErrorKind::Decode);
	}

	#[test]
	fn test_server_message_passes_through() {
		let e = RpcError::Server { message: "bad parameter".to_string() };
		assert_eq!(e.to_string(), "bad parameter");
		assert!(e.keeps_connection());
	}

	#[test]
	fn test_drift_drops_connection() {
		let e = RpcError::UnexpectedElement { expected: "success".into(), found: "foo".into() };
		assert!(!e.keeps_connection());
		assert!(e.to_string().contains("<success>"));
	}
}

// vim: ts=4
