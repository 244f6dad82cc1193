//! SWC-backed parser collaborator
//!
//! Parses a script or component file with SWC and lowers the module into a
//! [`SyntaxTree`]. Declarations become their dedicated node kinds; statements
//! that can contain declarations (blocks, branches, loops, function and class
//! bodies, namespaces) become `Other` nodes whose children are lowered in turn.
//! Expressions are opaque leaves.

use crate::error::{AstError, AstResult};
use crate::syntax::{
    Binding, DeclarationList, Declarator, Identifier, NodeId, NodeKind, SyntaxTree,
    SyntaxTreeBuilder, VariableScope,
};
use explode_foundation::{SourceDialect, TextRange};
use std::path::PathBuf;
use swc_common::{sync::Lrc, BytePos, FileName, FilePathMapping, SourceMap, Span, Spanned};
use swc_ecma_ast::*;
use swc_ecma_parser::{lexer::Lexer, EsSyntax, Parser, StringInput, Syntax, TsSyntax};
use tracing::{debug, warn};

/// Parse `text` as a module in the given dialect.
///
/// Recoverable syntax errors are logged and the best-effort tree is kept. Only
/// an unrecoverable error fails the parse.
pub fn parse_source(file_name: &str, text: &str, dialect: SourceDialect) -> AstResult<SyntaxTree> {
    let cm = Lrc::new(SourceMap::new(FilePathMapping::empty()));
    let source_file = cm.new_source_file(
        Lrc::new(FileName::Real(PathBuf::from(file_name))),
        text.to_string(),
    );

    let lexer = Lexer::new(
        syntax_for(file_name, dialect),
        Default::default(),
        StringInput::from(&*source_file),
        None,
    );

    let mut parser = Parser::new_from(lexer);
    let module = parser
        .parse_module()
        .map_err(|e| AstError::parse(format!("Failed to parse {}: {:?}", file_name, e.kind())))?;

    for error in parser.take_errors() {
        warn!(
            file = %file_name,
            error = ?error.kind(),
            "Recovered from syntax error"
        );
    }

    let mut lowering = Lowering::new(file_name, text.len(), source_file.start_pos);
    lowering.lower_module(&module);
    let tree = lowering.finish();

    debug!(
        file = %file_name,
        nodes = tree.len(),
        top_level = tree.children(tree.root()).len(),
        "Lowered module"
    );

    Ok(tree)
}

fn syntax_for(file_name: &str, dialect: SourceDialect) -> Syntax {
    match dialect {
        SourceDialect::TypeScript | SourceDialect::TypeScriptReact => {
            Syntax::Typescript(TsSyntax {
                tsx: dialect.is_component(),
                decorators: true,
                dts: file_name.ends_with(".d.ts"),
                no_early_errors: true,
                disallow_ambiguous_jsx_like: false,
            })
        }
        SourceDialect::JavaScript | SourceDialect::JavaScriptReact => Syntax::Es(EsSyntax {
            jsx: dialect.is_component(),
            decorators: true,
            ..Default::default()
        }),
    }
}

struct Lowering {
    builder: SyntaxTreeBuilder,
    base: u32,
    text_len: usize,
}

impl Lowering {
    fn new(file_name: &str, text_len: usize, start_pos: BytePos) -> Self {
        Self {
            builder: SyntaxTreeBuilder::new(file_name, text_len),
            base: start_pos.0,
            text_len,
        }
    }

    fn finish(self) -> SyntaxTree {
        self.builder.finish()
    }

    /// Byte range of a span relative to the start of the text
    fn range(&self, span: Span) -> TextRange {
        let start = (span.lo.0.saturating_sub(self.base) as usize).min(self.text_len);
        let end = (span.hi.0.saturating_sub(self.base) as usize)
            .min(self.text_len)
            .max(start);
        TextRange::new(start, end)
    }

    fn ident(&self, ident: &Ident) -> Identifier {
        Identifier::new(ident.sym.to_string(), self.range(ident.span))
    }

    fn push(&mut self, parent: NodeId, kind: NodeKind, span: Span) -> NodeId {
        let range = self.range(span);
        self.builder.push(parent, kind, range)
    }

    fn lower_module(&mut self, module: &Module) {
        let root = self.builder.root();
        for item in &module.body {
            self.lower_module_item(root, item);
        }
    }

    fn lower_module_item(&mut self, parent: NodeId, item: &ModuleItem) {
        match item {
            // The export keyword belongs to the declaration's range
            ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export)) => {
                self.lower_decl(parent, &export.decl, export.span);
            }
            ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultDecl(export)) => {
                self.lower_default_decl(parent, &export.decl, export.span);
            }
            ModuleItem::ModuleDecl(other) => {
                self.push(parent, NodeKind::Other, other.span());
            }
            ModuleItem::Stmt(stmt) => self.lower_stmt(parent, stmt),
        }
    }

    fn lower_default_decl(&mut self, parent: NodeId, decl: &DefaultDecl, span: Span) {
        match decl {
            DefaultDecl::Class(class_expr) => {
                let name = class_expr.ident.as_ref().map(|i| self.ident(i));
                let id = self.push(parent, NodeKind::ClassLike { name }, span);
                self.lower_class_body(id, &class_expr.class);
            }
            DefaultDecl::Fn(fn_expr) => {
                let name = fn_expr.ident.as_ref().map(|i| self.ident(i));
                let id = self.push(parent, NodeKind::FunctionLike { name }, span);
                self.lower_function_body(id, &fn_expr.function);
            }
            DefaultDecl::TsInterfaceDecl(interface) => {
                let name = Some(self.ident(&interface.id));
                self.push(parent, NodeKind::InterfaceLike { name }, span);
            }
        }
    }

    fn lower_decl(&mut self, parent: NodeId, decl: &Decl, span: Span) {
        match decl {
            Decl::Class(class_decl) => {
                let name = Some(self.ident(&class_decl.ident));
                let id = self.push(parent, NodeKind::ClassLike { name }, span);
                self.lower_class_body(id, &class_decl.class);
            }
            Decl::Fn(fn_decl) => {
                let name = Some(self.ident(&fn_decl.ident));
                let id = self.push(parent, NodeKind::FunctionLike { name }, span);
                self.lower_function_body(id, &fn_decl.function);
            }
            Decl::Var(var_decl) => {
                self.lower_var_decl(parent, var_decl, span);
            }
            Decl::Using(_) => {
                self.push(parent, NodeKind::Other, span);
            }
            Decl::TsInterface(interface) => {
                let name = Some(self.ident(&interface.id));
                self.push(parent, NodeKind::InterfaceLike { name }, span);
            }
            Decl::TsTypeAlias(alias) => {
                let name = Some(self.ident(&alias.id));
                self.push(parent, NodeKind::TypeAliasLike { name }, span);
            }
            Decl::TsEnum(ts_enum) => {
                let name = Some(self.ident(&ts_enum.id));
                self.push(parent, NodeKind::EnumLike { name }, span);
            }
            // namespace / declare module / declare global
            Decl::TsModule(module) => {
                let id = self.push(parent, NodeKind::Other, span);
                if let Some(body) = &module.body {
                    self.lower_namespace_body(id, body);
                }
            }
        }
    }

    fn lower_var_decl(&mut self, parent: NodeId, var_decl: &VarDecl, span: Span) {
        let scope = match var_decl.kind {
            VarDeclKind::Var => VariableScope::Var,
            VarDeclKind::Let => VariableScope::Let,
            VarDeclKind::Const => VariableScope::Const,
        };
        let declarators = var_decl
            .decls
            .iter()
            .map(|declarator| Declarator {
                range: self.range(declarator.span),
                binding: match &declarator.name {
                    Pat::Ident(binding) => Binding::Identifier(self.ident(&binding.id)),
                    _ => Binding::Pattern,
                },
            })
            .collect();

        self.push(
            parent,
            NodeKind::VariableStatement(DeclarationList { scope, declarators }),
            span,
        );
    }

    fn lower_namespace_body(&mut self, parent: NodeId, body: &TsNamespaceBody) {
        match body {
            TsNamespaceBody::TsModuleBlock(block) => {
                for item in &block.body {
                    self.lower_module_item(parent, item);
                }
            }
            // `namespace A.B {}` nests the inner namespace
            TsNamespaceBody::TsNamespaceDecl(inner) => {
                let id = self.push(parent, NodeKind::Other, inner.span);
                self.lower_namespace_body(id, &inner.body);
            }
        }
    }

    fn lower_stmt(&mut self, parent: NodeId, stmt: &Stmt) {
        if let Stmt::Decl(decl) = stmt {
            self.lower_decl(parent, decl, decl.span());
            return;
        }

        let id = self.push(parent, NodeKind::Other, stmt.span());
        match stmt {
            Stmt::Block(block) => self.lower_block(id, block),
            Stmt::If(if_stmt) => {
                self.lower_stmt(id, &if_stmt.cons);
                if let Some(alt) = &if_stmt.alt {
                    self.lower_stmt(id, alt);
                }
            }
            Stmt::For(for_stmt) => {
                if let Some(VarDeclOrExpr::VarDecl(var_decl)) = &for_stmt.init {
                    self.lower_var_decl(id, var_decl, var_decl.span);
                }
                self.lower_stmt(id, &for_stmt.body);
            }
            Stmt::ForIn(for_in) => self.lower_stmt(id, &for_in.body),
            Stmt::ForOf(for_of) => self.lower_stmt(id, &for_of.body),
            Stmt::While(while_stmt) => self.lower_stmt(id, &while_stmt.body),
            Stmt::DoWhile(do_while) => self.lower_stmt(id, &do_while.body),
            Stmt::Labeled(labeled) => self.lower_stmt(id, &labeled.body),
            Stmt::With(with) => self.lower_stmt(id, &with.body),
            Stmt::Switch(switch) => {
                for case in &switch.cases {
                    for stmt in &case.cons {
                        self.lower_stmt(id, stmt);
                    }
                }
            }
            Stmt::Try(try_stmt) => {
                self.lower_block(id, &try_stmt.block);
                if let Some(handler) = &try_stmt.handler {
                    self.lower_block(id, &handler.body);
                }
                if let Some(finalizer) = &try_stmt.finalizer {
                    self.lower_block(id, finalizer);
                }
            }
            _ => {}
        }
    }

    fn lower_block(&mut self, parent: NodeId, block: &BlockStmt) {
        for stmt in &block.stmts {
            self.lower_stmt(parent, stmt);
        }
    }

    fn lower_function_body(&mut self, parent: NodeId, function: &Function) {
        if let Some(body) = &function.body {
            self.lower_block(parent, body);
        }
    }

    fn lower_class_body(&mut self, parent: NodeId, class: &Class) {
        for member in &class.body {
            let id = self.push(parent, NodeKind::Other, member.span());
            match member {
                ClassMember::Method(method) => self.lower_function_body(id, &method.function),
                ClassMember::PrivateMethod(method) => {
                    self.lower_function_body(id, &method.function)
                }
                ClassMember::Constructor(constructor) => {
                    if let Some(body) = &constructor.body {
                        self.lower_block(id, body);
                    }
                }
                ClassMember::StaticBlock(block) => self.lower_block(id, &block.body),
                _ => {}
            }
        }
    }
}
