//! Viewer presence: fingerprinting observations and counting active viewers

pub mod observation;
pub mod tracker;

pub use observation::{
    FIELD_AGENT, FIELD_FORWARDED_FOR, FIELD_PATH, FIELD_REMOTE, FINGERPRINT_FIELDS, Fingerprint,
    Observation,
};
pub use tracker::{ChangeCallback, PresenceTracker};
