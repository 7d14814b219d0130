//! Domain layer: the value objects the monitor reasons about.

pub mod stargazer;
pub mod value_objects;

pub use stargazer::{StargazerRecord, UserProfile};
pub use value_objects::*;
