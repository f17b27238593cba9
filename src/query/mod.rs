//! The filter-expression core: the tree model, id-addressed mutations and
//! the compiler that turns a tree into pseudo-SQL, a human-readable Hebrew
//! description and a parameter map.

pub mod compiler;
pub mod model;

pub use compiler::{CompiledQuery, compile};
pub use model::{
    BoolOperator, ConditionPatch, FilterCondition, FilterGroup, GroupPatch, Query, node_id,
};
