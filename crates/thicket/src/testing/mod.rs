//! # Fixture grammars
//!
//! Hand-built table sets with matching semantics, used by the crate's
//! tests, benchmarks, documentation and fuzz target.
//!
//! - [`ambiguous_sum`]: `E -> E + E | n`, where a chain of `k` plus signs
//!   has Catalan(k) parses
//! - [`three_way_fork`]: one conflict entry with a shift and two empty
//!   reductions
//! - [`split_scenario`] / [`merge_scenario`]: a reduction that reaches
//!   across a fork point, through a shared or an exclusive lower piece

mod scenario;
mod sum;

pub use scenario::{TreeSemantics, merge_scenario, split_scenario, three_way_fork};
pub use sum::{END, Expr, NUM, PLUS, SumSemantics, ambiguous_sum, catalan, tokens};
