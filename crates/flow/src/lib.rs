//! Declarative flow expressions compiled into flat, ordered step lists.
//!
//! A flow describes what an action does as a tree of branches and
//! conditionals over static properties of a context. Compiling the tree
//! against a context yields the exact sequence of step tokens that would run,
//! in order, at maximum depth.
//!
//! - **Pure**: evaluation only reads the context, never mutates it
//! - **Deterministic**: the same context always compiles to the same steps
//! - **Zero dependencies**: Pure Rust with no external crates
//!
//! # Architecture
//!
//! - [`FlowExpr`]: The expression tree (`Predicate`, `Pick`, `Sequence`,
//!   `Operation`, `Token`, `Tokens`)
//! - [`Emitted`]: Nested evaluation output before flattening
//! - [`compile`]: Evaluate, flatten and drop empty entries
//! - [`builder`]: Short constructors for writing pipelines by hand

pub mod builder;
pub mod compile;
pub mod composite;
pub mod decorator;
pub mod emitted;
pub mod expr;

// Re-export core types for ergonomic API
pub use compile::compile;
pub use emitted::Emitted;
pub use expr::FlowExpr;
