//! The registry of entities, variables and parameters that simulations run
//! against.
mod builder;
mod registry;

pub use builder::TaxBenefitSystemBuilder;
pub use registry::TaxBenefitSystem;
