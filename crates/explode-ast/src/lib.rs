//! Syntax tree, top-level declaration classifier and extraction planner
//!
//! - `syntax`: arena tree over a closed set of node kinds
//! - `parser`: SWC-backed parser that lowers a module into that tree
//! - `classifier`: decides which nodes are movable top-level declarations
//! - `planner`: turns accepted nodes into a bottom-up extraction plan

pub mod classifier;
pub mod error;
pub mod parser;
pub mod planner;
pub mod syntax;

pub use classifier::is_top_level_declaration;
pub use error::{AstError, AstResult};
pub use parser::parse_source;
pub use planner::{plan, plan_document};
pub use syntax::{
    Binding, DeclarationList, Declarator, Identifier, NodeId, NodeKind, SyntaxNode, SyntaxTree,
    SyntaxTreeBuilder, VariableScope,
};
