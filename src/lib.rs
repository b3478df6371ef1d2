//! A rule engine for tax and benefit legislation.
//!
//! Variables are computed per entity (persons, and groups of persons such as
//! households) and per period. Requesting a variable runs its formula for
//! that period, which may request other variables; every result is cached
//! in the simulation's holders, cycles are reported, and values move
//! between persons and their groups through role-based projections.
//!
//! ```
//! use fisca_core::arrays::{Array, DType};
//! use fisca_core::entities::{Entity, RoleDescription};
//! use fisca_core::periods::Period;
//! use fisca_core::simulation::SimulationBuilder;
//! use fisca_core::system::TaxBenefitSystem;
//! use fisca_core::variables::Variable;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let persons = Arc::new(Entity::person("person", "persons", "An individual", ""));
//! let households = Arc::new(Entity::group(
//!     "household",
//!     "households",
//!     "A household",
//!     "",
//!     vec![RoleDescription::new("parent").max(2), RoleDescription::new("child")],
//! )?);
//!
//! let salary = Variable::builder("salary", &persons, DType::Float).build()?;
//! let income = Variable::builder("household_income", &households, DType::Float)
//!     .formula(|ctx, period| {
//!         let salaries = ctx.calculate("salary", period)?;
//!         Ok((period, ctx.sum_by_entity(&salaries, None, None)?))
//!     })
//!     .build()?;
//! let system = TaxBenefitSystem::builder(persons, vec![households])?
//!     .add_variable(salary)?
//!     .add_variable(income)?
//!     .build()?;
//!
//! let year: Period = "2015".parse()?;
//! let mut simulation = SimulationBuilder::new()
//!     .persons(3)
//!     .group("household", 1, vec![0, 0, 0], ["parent", "parent", "child"])
//!     .input("salary", year, vec![1500.0, 2000.0, 0.0])
//!     .build(&system)?;
//! assert_eq!(*simulation.calculate("household_income", year)?, Array::Float(vec![3500.0]));
//! # Ok(())
//! # }
//! ```
pub mod arrays;
pub mod commons;
pub mod display;
pub mod entities;
pub mod indexed_enums;
pub mod parameters;
pub mod periods;
pub mod simulation;
pub mod system;
pub mod taxscales;
pub mod tracers;
pub mod variables;

#[cfg(test)]
mod test_support;

pub use arrays::{Array, DType, Value};
pub use periods::{DateUnit, Instant, Period};
pub use simulation::{Simulation, SimulationBuilder, SimulationError, SimulationOptions};
pub use system::TaxBenefitSystem;
pub use variables::Variable;
