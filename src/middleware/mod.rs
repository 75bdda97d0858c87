pub mod admission;

pub use admission::{AdmissionController, MAX_EVENT_BYTES};
