//! Menu domain types
//!
//! - [`node`] - nodes, kinds, placements and request inputs
//! - [`reference`] - the tagged view reference and its exclusivity check
//! - [`registry`] - kind tag resolution and display types

pub mod node;
pub mod reference;
pub mod registry;

pub use node::{
    ContentCategory, CreateMenuNodeInput, DeleteResult, MenuNode, NodeKind, Placement,
    ReorderRequest, UpdateMenuNodeInput, Visibility,
};
pub use reference::{merge_reference_update, validate_reference, ReferenceFields, ViewReference};
pub use registry::{registry, DisplayType, KindRegistry};
