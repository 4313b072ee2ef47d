//! Structural diff engines for Folio.
//!
//! Both engines reconcile what the caller sent against what is stored and
//! produce the minimal set of row writes:
//!
//! - [`diff_relations`]: relation rows, matched by row id or by target
//! - [`diff_tree`]: flattened block and tree rows, matched by stable row id
//!
//! Every existing and every incoming record lands in exactly one output set
//! (or is left out because nothing changed), so persisting a diff never
//! orphans rows and never writes the same row twice.

mod relation;
mod tree;

pub use relation::{RelationDiff, diff_relations};
pub use tree::{TreeDiff, diff_tree, normalize};
