//! Domain models for the visit workflow.

mod consultation;
mod orders;
mod prescription;
mod visit;
mod vitals;

pub use consultation::*;
pub use orders::*;
pub use prescription::*;
pub use visit::*;
pub use vitals::*;
