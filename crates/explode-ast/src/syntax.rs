//! Syntax tree model read by the classifier and planner
//!
//! The tree is an arena of [`SyntaxNode`]s addressed by [`NodeId`]. Node kinds
//! form a closed set; parsers lower whatever their AST looks like into it, and
//! anything that is not a declaration of interest becomes [`NodeKind::Other`].

use explode_foundation::{DeclarationKind, TextRange};

/// Index of a node in its [`SyntaxTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identifier with its literal source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    pub text: String,
    pub range: TextRange,
}

impl Identifier {
    pub fn new(text: impl Into<String>, range: TextRange) -> Self {
        Self {
            text: text.into(),
            range,
        }
    }
}

/// Scoping flag of a variable declaration list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableScope {
    /// `var`, function-scoped
    Var,
    /// `let`
    Let,
    /// `const`
    Const,
}

impl VariableScope {
    pub fn is_block_scoped(&self) -> bool {
        matches!(self, VariableScope::Let | VariableScope::Const)
    }
}

/// Binding target of a declarator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    Identifier(Identifier),
    /// Object or array destructuring
    Pattern,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declarator {
    pub range: TextRange,
    pub binding: Binding,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationList {
    pub scope: VariableScope,
    pub declarators: Vec<Declarator>,
}

/// Closed set of node kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    SourceFile,
    ClassLike { name: Option<Identifier> },
    InterfaceLike { name: Option<Identifier> },
    EnumLike { name: Option<Identifier> },
    FunctionLike { name: Option<Identifier> },
    TypeAliasLike { name: Option<Identifier> },
    VariableStatement(DeclarationList),
    Other,
}

impl NodeKind {
    /// Declaration kind tag, `None` for the root and for `Other`
    pub fn declaration_kind(&self) -> Option<DeclarationKind> {
        match self {
            NodeKind::ClassLike { .. } => Some(DeclarationKind::Class),
            NodeKind::InterfaceLike { .. } => Some(DeclarationKind::Interface),
            NodeKind::EnumLike { .. } => Some(DeclarationKind::Enum),
            NodeKind::FunctionLike { .. } => Some(DeclarationKind::Function),
            NodeKind::TypeAliasLike { .. } => Some(DeclarationKind::TypeAlias),
            NodeKind::VariableStatement(_) => Some(DeclarationKind::Variable),
            NodeKind::SourceFile | NodeKind::Other => None,
        }
    }

    /// Name identifier of a named-declaration kind
    pub fn name(&self) -> Option<&Identifier> {
        match self {
            NodeKind::ClassLike { name }
            | NodeKind::InterfaceLike { name }
            | NodeKind::EnumLike { name }
            | NodeKind::FunctionLike { name }
            | NodeKind::TypeAliasLike { name } => name.as_ref(),
            NodeKind::SourceFile | NodeKind::VariableStatement(_) | NodeKind::Other => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxNode {
    id: NodeId,
    kind: NodeKind,
    range: TextRange,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl SyntaxNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn range(&self) -> TextRange {
        self.range
    }

    /// `None` only for the source file root
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Parsed file: node 0 is always the [`NodeKind::SourceFile`] root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxTree {
    file_name: String,
    nodes: Vec<SyntaxNode>,
}

impl SyntaxTree {
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn root_node(&self) -> &SyntaxNode {
        &self.nodes[0]
    }

    /// Ids are only handed out by the tree's builder, so indexing cannot fail
    /// for ids of this tree.
    pub fn node(&self, id: NodeId) -> &SyntaxNode {
        &self.nodes[id.index()]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).children()
    }

    /// All nodes in creation (pre-)order, root first
    pub fn nodes(&self) -> impl Iterator<Item = &SyntaxNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Number of edges between `id` and the root
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.node(id).parent;
        while let Some(parent) = current {
            depth += 1;
            current = self.node(parent).parent;
        }
        depth
    }
}

/// Incremental construction of a [`SyntaxTree`]
#[derive(Debug)]
pub struct SyntaxTreeBuilder {
    tree: SyntaxTree,
}

impl SyntaxTreeBuilder {
    pub fn new(file_name: impl Into<String>, text_len: usize) -> Self {
        let root = SyntaxNode {
            id: NodeId(0),
            kind: NodeKind::SourceFile,
            range: TextRange::new(0, text_len),
            parent: None,
            children: Vec::new(),
        };
        Self {
            tree: SyntaxTree {
                file_name: file_name.into(),
                nodes: vec![root],
            },
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Append a node as the last child of `parent`
    pub fn push(&mut self, parent: NodeId, kind: NodeKind, range: TextRange) -> NodeId {
        let id = NodeId(self.tree.nodes.len() as u32);
        self.tree.nodes.push(SyntaxNode {
            id,
            kind,
            range,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.tree.nodes[parent.index()].children.push(id);
        id
    }

    pub fn finish(self) -> SyntaxTree {
        self.tree
    }
}
