//! Implementations of the [AttributesBuilder] trait.
//!
//! [AttributesBuilder]: crate::traits::AttributesBuilder

mod stateful;
pub use stateful::{derive_deposits, StatefulAttributesBuilder};
