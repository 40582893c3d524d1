//! Icon classification: marker fingerprints, reference banks and a
//! nearest-neighbour category vote.

pub mod bank;
pub mod classifier;
pub mod error;
pub mod fingerprint;
pub mod resolve;

pub use bank::{BankReport, BankSet, Reference, ReferenceBank, build_banks};
pub use classifier::{Classifier, Prediction};
pub use error::VisionError;
pub use fingerprint::{Fingerprint, extract};
pub use resolve::{ImageResolver, decode};
