//! # evotest
//!
//! A many-objective evolutionary search engine to automatically generate test cases for an
//! interactive application. Candidate test cases (or test suites) are wrapped into
//! [`core::Chromosome`]s and evolved across generations under one or more
//! [`core::FitnessFunction`]s, each one modelling one testing target (for example a branch).
//!
//! The crate provides:
//! - a generic generational loop ([`algorithms::GeneticAlgorithm`] and [`algorithms::StandardGa`]);
//! - the Pareto utilities ([`utils::fast_non_dominated_sort`] and [`utils::crowding_distance`]);
//! - [`algorithms::Nsga2`], [`algorithms::Mosa`], [`algorithms::Mio`] and
//!   [`algorithms::Sapienz`];
//! - the operators driving the application under test through the [`sut::UiDriver`] contract.
//!
//! The application under test is reached only through [`sut::UiDriver`] and the coverage
//! collaborator ([`core::CoverageSource`]). Exactly one chromosome is executed at a time.
pub mod algorithms;
pub mod core;
pub mod operators;
pub mod sut;
pub mod utils;
