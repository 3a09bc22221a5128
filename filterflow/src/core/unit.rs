//! The unit type carried on every link.

use super::bottle::MessageBottle;
use super::packet::Packet;

/// Either a data packet or a control bottle.
#[derive(Debug, Clone, PartialEq)]
pub enum Unit {
    /// A data packet.
    Data(Packet),
    /// A control bottle.
    Control(MessageBottle),
}

impl Unit {
    /// Returns true for control bottles.
    #[must_use]
    pub fn is_control(&self) -> bool {
        matches!(self, Self::Control(_))
    }

    /// Returns the packet, if this is a data unit.
    #[must_use]
    pub fn as_packet(&self) -> Option<&Packet> {
        match self {
            Self::Data(p) => Some(p),
            Self::Control(_) => None,
        }
    }

    /// Returns the bottle, if this is a control unit.
    #[must_use]
    pub fn as_bottle(&self) -> Option<&MessageBottle> {
        match self {
            Self::Control(b) => Some(b),
            Self::Data(_) => None,
        }
    }
}

impl From<Packet> for Unit {
    fn from(packet: Packet) -> Self {
        Self::Data(packet)
    }
}

impl From<MessageBottle> for Unit {
    fn from(bottle: MessageBottle) -> Self {
        Self::Control(bottle)
    }
}
