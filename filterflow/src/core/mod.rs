//! Core data model for filterflow.
//!
//! This module contains the units that travel through a filter graph:
//! - Packets with payloads and attribute bags
//! - Message bottles carrying addressed control operations
//! - Route and lifecycle state enums

mod attributes;
mod bottle;
mod packet;
mod status;
mod unit;

pub use attributes::{AttributeBag, AttributeSchema};
pub use bottle::{BottleMessage, Destination, MessageBottle};
pub use packet::{Packet, PacketData, Payload};
pub use status::{FilterState, Route};
pub use unit::Unit;
