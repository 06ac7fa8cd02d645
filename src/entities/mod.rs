//! sea-orm entities for the back-office schema.

pub mod charge;
pub mod console;
pub mod lookup_entry;
pub mod party;
pub mod shipment;
pub mod shipment_comment;
pub mod shipment_operator;
pub mod staff_user;

pub use charge::ChargePayer;
pub use lookup_entry::LookupKind;
pub use party::PartyRole;
pub use shipment::{Priority, TransportMode};
