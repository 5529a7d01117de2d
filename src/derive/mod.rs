//! @ai:module:intent Derived-quantity specs and their evaluation engine
//! @ai:module:layer application
//! @ai:module:public_api DerivationEngine, DerivedSpec, Operation, Operand, OperandLimits
//! @ai:module:stateless true

pub mod engine;
pub mod spec;

pub use engine::DerivationEngine;
pub use spec::{DerivedSpec, Operand, OperandLimits, Operation};
