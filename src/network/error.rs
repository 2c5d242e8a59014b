//! Common error types for network operations

/// A common error type for transport and packet codec operations.
///
/// This enum defines the errors that can occur while moving MQTT packets between
/// the codec and a [`Transport`](crate::network::Transport). It is designed to be
/// simple and portable for `no_std` environments.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// An operation was attempted on a connection that is not open.
    NotOpen,
    /// A connection attempt was refused.
    ConnectionRefused,
    /// An error occurred during a write operation.
    WriteError,
    /// An error occurred during a read operation.
    ReadError,
    /// The transport rejected a write or went away while data was expected.
    ///
    /// The transport has already been stopped when this is returned.
    BrokenConnection,
    /// The peer sent bytes that do not form a valid packet.
    MalformedPacket,
    /// A remaining length does not fit the four-byte MQTT encoding.
    PacketTooLarge,
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::NotOpen => defmt::write!(f, "NotOpen"),
            Error::ConnectionRefused => defmt::write!(f, "ConnectionRefused"),
            Error::WriteError => defmt::write!(f, "WriteError"),
            Error::ReadError => defmt::write!(f, "ReadError"),
            Error::BrokenConnection => defmt::write!(f, "BrokenConnection"),
            Error::MalformedPacket => defmt::write!(f, "MalformedPacket"),
            Error::PacketTooLarge => defmt::write!(f, "PacketTooLarge"),
        }
    }
}
