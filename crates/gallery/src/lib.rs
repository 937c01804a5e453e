//! # Gallery: the equation engine of a MetaPost-style drawing language.
//!
//! This crate keeps track of the variables of a Gallery program and the linear
//!     equations between them.
//! A parser drives the [Engine] through a small postfix API;
//!     the [script] module contains a statement driver that does exactly that
//!     and is what the command line tool runs.
//!
//! The numeric kernel lives in `gallery_core` and the solver in `leq`.

pub mod engine;
pub mod error;
pub mod exprstack;
pub mod options;
pub mod scope;
pub mod script;
pub mod trace;
pub mod variable;

pub use engine::{Engine, Resolved};
pub use error::{Class, Error, Kind, Span};
pub use exprstack::Cell;
pub use options::Options;
pub use variable::{NamePath, PathRef, VarType};
