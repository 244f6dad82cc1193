//! Top-level declaration classifier

use crate::syntax::{NodeId, NodeKind, SyntaxNode};

/// Whether `node` is an independently movable declaration at module scope.
///
/// Only direct children of `source_file` qualify. Classes, interfaces, enums,
/// functions and type aliases always do, with or without a body or export
/// modifier. Variable statements qualify when they are `let`/`const` and
/// declare at least one binding; `var` statements never do.
pub fn is_top_level_declaration(node: &SyntaxNode, source_file: NodeId) -> bool {
    if node.parent() != Some(source_file) {
        return false;
    }

    match node.kind() {
        NodeKind::ClassLike { .. }
        | NodeKind::InterfaceLike { .. }
        | NodeKind::EnumLike { .. }
        | NodeKind::FunctionLike { .. }
        | NodeKind::TypeAliasLike { .. } => true,
        NodeKind::VariableStatement(list) => {
            list.scope.is_block_scoped() && !list.declarators.is_empty()
        }
        NodeKind::SourceFile | NodeKind::Other => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{
        Binding, DeclarationList, Declarator, Identifier, SyntaxTree, SyntaxTreeBuilder,
        VariableScope,
    };
    use explode_foundation::TextRange;

    fn named(text: &str, start: usize) -> Option<Identifier> {
        Some(Identifier::new(text, TextRange::new(start, start + text.len())))
    }

    fn variable(scope: VariableScope, names: &[&str]) -> NodeKind {
        NodeKind::VariableStatement(DeclarationList {
            scope,
            declarators: names
                .iter()
                .map(|name| Declarator {
                    range: TextRange::new(0, name.len()),
                    binding: Binding::Identifier(Identifier::new(*name, TextRange::new(0, name.len()))),
                })
                .collect(),
        })
    }

    fn classify_all(tree: &SyntaxTree) -> Vec<bool> {
        tree.children(tree.root())
            .iter()
            .map(|id| is_top_level_declaration(tree.node(*id), tree.root()))
            .collect()
    }

    #[test]
    fn test_every_named_kind_qualifies_at_top_level() {
        let mut builder = SyntaxTreeBuilder::new("kinds.ts", 100);
        let root = builder.root();
        builder.push(root, NodeKind::ClassLike { name: named("A", 6) }, TextRange::new(0, 10));
        builder.push(root, NodeKind::InterfaceLike { name: named("B", 20) }, TextRange::new(10, 25));
        builder.push(root, NodeKind::EnumLike { name: named("C", 30) }, TextRange::new(25, 35));
        builder.push(root, NodeKind::FunctionLike { name: named("d", 45) }, TextRange::new(35, 50));
        builder.push(root, NodeKind::TypeAliasLike { name: named("E", 55) }, TextRange::new(50, 60));
        // bodiless and anonymous declarations still count
        builder.push(root, NodeKind::FunctionLike { name: None }, TextRange::new(60, 70));
        let tree = builder.finish();

        assert_eq!(classify_all(&tree), vec![true; 6]);
    }

    #[test]
    fn test_scoping_discrimination() {
        let mut builder = SyntaxTreeBuilder::new("vars.ts", 60);
        let root = builder.root();
        builder.push(root, variable(VariableScope::Const, &["A"]), TextRange::new(0, 12));
        builder.push(root, variable(VariableScope::Let, &["B"]), TextRange::new(13, 23));
        builder.push(root, variable(VariableScope::Var, &["C"]), TextRange::new(24, 34));
        builder.push(root, variable(VariableScope::Const, &[]), TextRange::new(35, 40));
        builder.push(root, variable(VariableScope::Const, &["a", "b"]), TextRange::new(41, 59));
        let tree = builder.finish();

        assert_eq!(classify_all(&tree), vec![true, true, false, false, true]);
    }

    #[test]
    fn test_nested_nodes_never_qualify() {
        let mut builder = SyntaxTreeBuilder::new("nested.ts", 80);
        let root = builder.root();
        let func = builder.push(root, NodeKind::FunctionLike { name: named("f", 9) }, TextRange::new(0, 80));
        let block = builder.push(func, NodeKind::Other, TextRange::new(12, 78));
        let inner_class = builder.push(block, NodeKind::ClassLike { name: named("X", 20) }, TextRange::new(14, 30));
        let inner_const = builder.push(func, variable(VariableScope::Const, &["y"]), TextRange::new(31, 45));
        let tree = builder.finish();

        assert!(!is_top_level_declaration(tree.node(inner_class), root));
        assert!(!is_top_level_declaration(tree.node(inner_const), root));
        assert!(!is_top_level_declaration(tree.node(block), root));
        // the root itself has no parent
        assert!(!is_top_level_declaration(tree.root_node(), root));
    }

    #[test]
    fn test_other_statements_are_rejected() {
        let mut builder = SyntaxTreeBuilder::new("stmts.ts", 20);
        let root = builder.root();
        builder.push(root, NodeKind::Other, TextRange::new(0, 20));
        let tree = builder.finish();

        assert_eq!(classify_all(&tree), vec![false]);
    }

    #[test]
    fn test_classification_is_repeatable() {
        let mut builder = SyntaxTreeBuilder::new("pure.ts", 20);
        let root = builder.root();
        let id = builder.push(root, variable(VariableScope::Let, &["z"]), TextRange::new(0, 10));
        let tree = builder.finish();

        let first = is_top_level_declaration(tree.node(id), root);
        let second = is_top_level_declaration(tree.node(id), root);
        assert_eq!(first, second);
        assert!(first);
    }
}
