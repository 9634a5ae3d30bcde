//! Data model for NCD definitions and their resolved intermediate representation.
//!
//! A [`Definition`] is what the loader reads from text: named entries with
//! attributes whose references are still names. An [`Ir`] is the resolved
//! form, where every reference is a [`NodeId`] into an [`Arena`]. The
//! [`fingerprint`](fingerprint::fingerprint) of an `Ir` is the cache identity
//! of a build.

#![warn(missing_docs)]

pub mod arena;
pub mod definition;
pub mod fingerprint;
pub mod ids;
pub mod ir;
pub mod kind;
pub mod value;

pub use arena::{Arena, ArenaId};
pub use definition::{Attribute, Definition, Entry};
pub use fingerprint::fingerprint;
pub use ids::NodeId;
pub use ir::{Ir, IrAttribute, IrNode};
pub use kind::{KindError, KindRegistry, KindSpec, RefPolicy};
pub use value::{IrValue, Value};
