//! Analyses consulted by the optimizer.
//!
//! The passes never inspect the host environment directly; everything they
//! know about it flows through an injected [Oracle], from which the
//! [Analyzer] derives its call tables once at startup. This crate also hosts
//! the whole-program [validation] used to catch structural corruption.

mod analyzer;
mod oracle;
pub mod validation;

pub use self::analyzer::{dunder_op, Analyzer};
pub use self::oracle::{DunderMethod, Oracle, PyClass, StaticOracle, TableOracle, WellKnown};
