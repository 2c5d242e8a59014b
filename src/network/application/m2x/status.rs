//! Status codes returned by M2X operations.

use super::Error;

/// The outcome of an M2X call.
///
/// Non-negative values are HTTP-style codes reported by the remote service in the
/// response envelope (`2xx` success, `4xx` client error, `5xx` server error).
/// Negative values are produced locally and mirror the [`Error`] variants.
///
/// # Examples
///
/// ```rust
/// use m2x_mqtt::network::application::m2x::Status;
///
/// assert!(Status(202).is_success());
/// assert!(Status::OK.is_success());
/// assert!(Status(404).is_client_error());
/// assert!(Status(503).is_error());
/// assert!(!Status::DISCONNECTED.is_success());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Status(pub i16);

impl Status {
    /// Local success, used before any request reached the service.
    pub const OK: Status = Status(0);
    /// The transport could not be connected.
    pub const NO_CONNECTION: Status = Status(-1);
    /// The connection was lost or the broker violated the protocol.
    pub const DISCONNECTED: Status = Status(-2);
    /// No matching response could ever be produced.
    pub const NOT_REACHABLE: Status = Status(-3);
    /// An argument cannot be sent as given.
    pub const INVALID: Status = Status(-4);
    /// A response envelope was structurally valid but unusable.
    pub const JSON_INVALID: Status = Status(-5);
    /// A value did not fit the serialization scratch buffer.
    pub const BUFFER_TOO_SMALL: Status = Status(-6);
    /// A timestamp could not be produced or parsed.
    pub const TIMESTAMP_ERROR: Status = Status(-8);

    /// The raw numeric code.
    pub const fn code(self) -> i16 {
        self.0
    }

    /// `OK` or any `2xx` code.
    pub const fn is_success(self) -> bool {
        self.0 == Self::OK.0 || (self.0 >= 200 && self.0 <= 299)
    }

    /// Any `4xx` code.
    pub const fn is_client_error(self) -> bool {
        self.0 >= 400 && self.0 <= 499
    }

    /// Any `5xx` code.
    pub const fn is_server_error(self) -> bool {
        self.0 >= 500 && self.0 <= 599
    }

    /// Any `4xx` or `5xx` code.
    ///
    /// Local (negative) failures are not covered; match on the [`Error`] instead.
    pub const fn is_error(self) -> bool {
        self.is_client_error() || self.is_server_error()
    }

    /// Collapse an operation result into a single numeric status.
    pub fn from_result(result: Result<Status, Error>) -> Status {
        match result {
            Ok(status) => status,
            Err(e) => e.into(),
        }
    }
}

impl From<Error> for Status {
    fn from(error: Error) -> Self {
        Status(error.code())
    }
}

impl From<Status> for i16 {
    fn from(status: Status) -> Self {
        status.0
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Status {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Status({=i16})", self.0)
    }
}
