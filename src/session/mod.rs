//! Durable session cache: identity, credential, preferences and the
//! questionnaire draft.

pub mod backend;
pub mod migrations;
pub mod slots;
pub mod store;

pub use backend::{LibSqlSlotBackend, SlotBackend};
pub use slots::{SessionEvent, SessionSnapshot, SessionStatus, Slot, SlotValue, SlotWrite};
pub use store::SessionStore;
