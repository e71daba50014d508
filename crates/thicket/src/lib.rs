//! # Thicket
//!
//! A table-driven generalized LR (GLR) parser runtime.
//!
//! ## Overview
//!
//! Thicket runs LALR tables produced by an external generator. Where the
//! tables contain shift/reduce or reduce/reduce conflicts, the runtime forks
//! the parse instead of failing and lets later input prune the branches
//! that turn out to be wrong. It provides:
//!
//! - **Table sets**: dense tables as generators emit them, or comb-vector
//!   compressed tables, behind one [`ParseTables`] contract
//! - **A shared tree stack**: branches share history below their fork
//!   point through reference-counted pieces, so forking copies nothing
//! - **Per-branch semantics**: rule actions build values as branches
//!   reduce, with a user context that is split on every fork
//! - **Introspection**: events, statistics and an invariant checker for
//!   the piece tree
//!
//! ## Quick Start
//!
//! ```rust
//! use thicket::glr::GlrParser;
//! use thicket::table::{Action, DenseTablesBuilder};
//! use thicket::Recognizer;
//!
//! // S -> a S | a, with the conflict left in the tables.
//! let tables = DenseTablesBuilder::new(4, 2, 1)
//!     .action(0, 1, Action::Shift(2))
//!     .goto(0, 0, 1)
//!     .action(1, 0, Action::Accept)
//!     .conflict(2, 1, &[Action::Shift(2), Action::Reduce(1)])
//!     .action(2, 0, Action::Reduce(1))
//!     .goto(2, 0, 3)
//!     .action(3, 0, Action::Reduce(0))
//!     .action(3, 1, Action::Reduce(0))
//!     .rule(0, 2)
//!     .rule(0, 1)
//!     .build()?;
//!
//! let mut parser = GlrParser::new(&tables, Recognizer, ());
//! parser.parse(1, ())?;
//! parser.parse(1, ())?;
//! let parses = parser.finish(())?;
//! assert_eq!(parses.len(), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `serialize`: `serde` support for table sets
//! - `diagnostics`: `miette` diagnostics for every error type

pub mod error;
pub mod glr;
pub mod semantics;
pub mod table;
pub mod testing;

// Re-export commonly used types
pub use error::{ParseError, StackError, TableError};
pub use glr::{Accepted, GlrConfig, GlrParser, ParseStatus, Rhs, Symbol, ValueCell};
pub use semantics::{Recognizer, Semantics};
pub use table::{Action, CompressedTables, DenseTables, DenseTablesBuilder, ParseTables};
