//! Fixed-layout radio records shared with the remote.
//!
//! Both records are two little-endian 32-bit fields with no padding, matching
//! the packed structs the remote firmware sends and expects. The layout is not
//! self-describing; a payload is accepted only if its length matches exactly.

use core::{fmt, str::FromStr};

use byteorder::{ByteOrder, LittleEndian};

/// Lowest joystick reading.
pub const AXIS_MIN: i32 = 0;
/// Highest joystick reading.
pub const AXIS_MAX: i32 = 4095;
/// Joystick rest position on both axes.
pub const AXIS_CENTER: i32 = 2048;

/// Telemetry distance reported when no echo came back.
pub const DISTANCE_OUT_OF_RANGE: i32 = 999;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    WrongLength { expected: usize, actual: usize },
}

/// Two-axis drive intent from the remote joystick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub x: i32,
    pub y: i32,
}

impl Command {
    pub const SIZE: usize = 8;

    /// Stick at rest; the stored command before any packet arrives.
    pub const CENTER: Command = Command {
        x: AXIS_CENTER,
        y: AXIS_CENTER,
    };

    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() != Self::SIZE {
            return Err(DecodeError::WrongLength {
                expected: Self::SIZE,
                actual: payload.len(),
            });
        }
        Ok(Command {
            x: LittleEndian::read_i32(&payload[0..4]),
            y: LittleEndian::read_i32(&payload[4..8]),
        })
    }

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        LittleEndian::write_i32(&mut buf[0..4], self.x);
        LittleEndian::write_i32(&mut buf[4..8], self.y);
        buf
    }

    /// Pull both axes into the joystick range; the radio is untrusted.
    pub fn clamped(&self) -> Self {
        Command {
            x: self.x.clamp(AXIS_MIN, AXIS_MAX),
            y: self.y.clamp(AXIS_MIN, AXIS_MAX),
        }
    }
}

impl Default for Command {
    fn default() -> Self {
        Self::CENTER
    }
}

/// Status record sent back to the remote.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Telemetry {
    /// Battery voltage (V).
    pub voltage: f32,
    /// Latest ranging result (cm), [`DISTANCE_OUT_OF_RANGE`] when nothing echoed.
    pub distance: i32,
}

impl Telemetry {
    pub const SIZE: usize = 8;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        LittleEndian::write_f32(&mut buf[0..4], self.voltage);
        LittleEndian::write_i32(&mut buf[4..8], self.distance);
        buf
    }

    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() != Self::SIZE {
            return Err(DecodeError::WrongLength {
                expected: Self::SIZE,
                actual: payload.len(),
            });
        }
        Ok(Telemetry {
            voltage: LittleEndian::read_f32(&payload[0..4]),
            distance: LittleEndian::read_i32(&payload[4..8]),
        })
    }
}

/// Six-byte radio peer address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerAddress(pub [u8; 6]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerAddressError {
    /// Expected six colon-separated octets.
    WrongOctetCount,
    InvalidOctet,
}

impl PeerAddress {
    pub const BROADCAST: PeerAddress = PeerAddress([0xFF; 6]);

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }
}

impl Default for PeerAddress {
    fn default() -> Self {
        Self::BROADCAST
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl FromStr for PeerAddress {
    type Err = PeerAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut parts = s.split(':');
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or(PeerAddressError::WrongOctetCount)?;
            if part.len() != 2 {
                return Err(PeerAddressError::InvalidOctet);
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| PeerAddressError::InvalidOctet)?;
        }
        if parts.next().is_some() {
            return Err(PeerAddressError::WrongOctetCount);
        }
        Ok(PeerAddress(octets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_layout_is_two_le_i32() {
        let bytes = Command { x: 2048, y: 4095 }.encode();
        assert_eq!(bytes, [0x00, 0x08, 0x00, 0x00, 0xFF, 0x0F, 0x00, 0x00]);
        assert_eq!(Command::decode(&bytes), Ok(Command { x: 2048, y: 4095 }));
    }

    #[test]
    fn command_rejects_wrong_length() {
        assert_eq!(
            Command::decode(&[0u8; 7]),
            Err(DecodeError::WrongLength {
                expected: 8,
                actual: 7
            })
        );
        assert!(Command::decode(&[0u8; 12]).is_err());
        assert!(Command::decode(&[]).is_err());
    }

    #[test]
    fn negative_axes_decode_and_clamp() {
        let raw = Command { x: -5, y: 9000 }.encode();
        let cmd = Command::decode(&raw).unwrap();
        assert_eq!(cmd, Command { x: -5, y: 9000 });
        assert_eq!(cmd.clamped(), Command { x: 0, y: 4095 });
    }

    #[test]
    fn telemetry_layout_is_f32_then_i32() {
        let t = Telemetry {
            voltage: 7.5,
            distance: 999,
        };
        let bytes = t.encode();
        assert_eq!(&bytes[0..4], &7.5f32.to_le_bytes());
        assert_eq!(&bytes[4..8], &999i32.to_le_bytes());
        assert_eq!(Telemetry::decode(&bytes), Ok(t));
    }

    #[test]
    fn peer_address_parses_and_prints() {
        let peer: PeerAddress = "E8:F6:0A:83:92:08".parse().unwrap();
        assert_eq!(peer, PeerAddress([0xE8, 0xF6, 0x0A, 0x83, 0x92, 0x08]));
        assert_eq!(peer.to_string(), "E8:F6:0A:83:92:08");
        assert!(PeerAddress::default().is_broadcast());
        assert_eq!(
            "E8:F6:0A".parse::<PeerAddress>(),
            Err(PeerAddressError::WrongOctetCount)
        );
        assert_eq!(
            "E8:F6:0A:83:92:ZZ".parse::<PeerAddress>(),
            Err(PeerAddressError::InvalidOctet)
        );
    }
}
