//! Encrypted local journal of raised alerts.

mod encrypted;

pub use encrypted::AlertJournal;
