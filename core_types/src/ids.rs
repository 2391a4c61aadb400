//! Identifiers for services, pub/sub endpoints and slots

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// First raw id used by message slots.
pub const MSG_ID_OFFSET: u32 = 0;
/// First raw id used by command slots.
pub const CMD_ID_OFFSET: u32 = 10_000;
/// First raw id used by topic subscriptions.
pub const TOPIC_ID_OFFSET: u32 = 20_000;

const SLOT_RANGE: u32 = 10_000;

/// Most slots a service can register of one kind
pub const MAX_SLOTS_PER_KIND: usize = (SLOT_RANGE - 1) as usize;

/// Unique identifier for a service
///
/// Services are created once at startup and live for the whole process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceId(Uuid);

impl ServiceId {
    /// Creates a new random service ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a service ID from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ServiceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service({})", self.0)
    }
}

/// Unique identifier for a publisher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublisherId(Uuid);

impl PublisherId {
    /// Creates a new random publisher ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for PublisherId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PublisherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Publisher({})", self.0)
    }
}

/// Unique identifier for a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    /// Creates a new random subscriber ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Subscriber({})", self.0)
    }
}

/// Which table of a service a slot id points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotKind {
    Message,
    Command,
    Topic,
}

impl SlotKind {
    /// Raw id offset of this kind
    pub const fn offset(self) -> u32 {
        match self {
            SlotKind::Message => MSG_ID_OFFSET,
            SlotKind::Command => CMD_ID_OFFSET,
            SlotKind::Topic => TOPIC_ID_OFFSET,
        }
    }
}

/// Numeric identifier of a command, message or topic slot
///
/// Slot `i` of a kind is encoded as `offset + i + 1`; the offset value
/// itself is never a valid id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotId(u32);

impl SlotId {
    /// Encodes the id of slot `index` in the table of `kind`
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below [`MAX_SLOTS_PER_KIND`].
    pub fn new(kind: SlotKind, index: usize) -> Self {
        match Self::try_new(kind, index) {
            Some(id) => id,
            None => panic!("{:?} slot index {} out of range", kind, index),
        }
    }

    /// Encodes the id of slot `index`, or `None` if it would leave the
    /// range of `kind`
    pub fn try_new(kind: SlotKind, index: usize) -> Option<Self> {
        if index >= MAX_SLOTS_PER_KIND {
            return None;
        }
        Some(Self(kind.offset() + index as u32 + 1))
    }

    /// Wraps a raw id as found in an envelope header
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw id
    pub const fn as_raw(&self) -> u32 {
        self.0
    }

    /// Splits the id back into table kind and slot index.
    ///
    /// Returns `None` for ids outside every known range.
    pub fn decode(&self) -> Option<(SlotKind, usize)> {
        let kind = match self.0 / SLOT_RANGE {
            0 => SlotKind::Message,
            1 => SlotKind::Command,
            2 => SlotKind::Topic,
            _ => return None,
        };
        let relative = self.0 - kind.offset();
        if relative == 0 {
            return None;
        }
        Some((kind, (relative - 1) as usize))
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.decode() {
            Some((SlotKind::Message, index)) => write!(f, "Msg#{}", index),
            Some((SlotKind::Command, index)) => write!(f, "Cmd#{}", index),
            Some((SlotKind::Topic, index)) => write!(f, "Topic#{}", index),
            None => write!(f, "Invalid({})", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_id_creation() {
        let id1 = ServiceId::new();
        let id2 = ServiceId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_service_id_from_uuid() {
        let uuid = Uuid::new_v4();
        let id = ServiceId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
    }

    #[test]
    fn test_endpoint_id_display() {
        assert!(format!("{}", ServiceId::new()).starts_with("Service("));
        assert!(format!("{}", PublisherId::new()).starts_with("Publisher("));
        assert!(format!("{}", SubscriberId::new()).starts_with("Subscriber("));
    }

    #[test]
    fn test_slot_id_offsets() {
        assert_eq!(SlotId::new(SlotKind::Message, 0).as_raw(), 1);
        assert_eq!(SlotId::new(SlotKind::Command, 0).as_raw(), 10_001);
        assert_eq!(SlotId::new(SlotKind::Topic, 2).as_raw(), 20_003);
    }

    #[test]
    fn test_slot_id_decode() {
        let id = SlotId::new(SlotKind::Command, 4);
        assert_eq!(id.decode(), Some((SlotKind::Command, 4)));
        assert_eq!(SlotId::from_raw(id.as_raw()), id);
    }

    #[test]
    fn test_slot_id_rejects_offsets_and_out_of_range() {
        assert_eq!(SlotId::from_raw(0).decode(), None);
        assert_eq!(SlotId::from_raw(CMD_ID_OFFSET).decode(), None);
        assert_eq!(SlotId::from_raw(TOPIC_ID_OFFSET).decode(), None);
        assert_eq!(SlotId::from_raw(30_001).decode(), None);
    }

    #[test]
    fn test_slot_id_range_is_checked() {
        let last = SlotId::try_new(SlotKind::Message, MAX_SLOTS_PER_KIND - 1).unwrap();
        assert_eq!(last.as_raw(), CMD_ID_OFFSET - 1);
        assert_eq!(last.decode(), Some((SlotKind::Message, MAX_SLOTS_PER_KIND - 1)));
        assert_eq!(SlotId::try_new(SlotKind::Message, MAX_SLOTS_PER_KIND), None);
        assert_eq!(SlotId::try_new(SlotKind::Command, usize::MAX), None);
    }

    #[test]
    #[should_panic]
    fn test_slot_id_new_panics_past_range() {
        let _ = SlotId::new(SlotKind::Command, MAX_SLOTS_PER_KIND);
    }

    #[test]
    fn test_slot_id_display() {
        assert_eq!(format!("{}", SlotId::new(SlotKind::Message, 1)), "Msg#1");
        assert_eq!(format!("{}", SlotId::from_raw(0)), "Invalid(0)");
    }
}
