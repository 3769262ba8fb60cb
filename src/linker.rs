//! Scope linking pass.
//!
//! Walks the arena once and produces side tables: each node's parent, the
//! scope that owns each node, and a scope arena holding `(name, line)`
//! symbol registrations. Blocks, function bodies, and for-loops open fresh
//! scopes; everything else shares the scope it appears in.
//!
//! Symbols are keyed by binding line so later passes can resolve an
//! identifier to the most recent binding at or above its own line.

use crate::ast::{Ast, Node, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

impl ScopeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    /// Line of this particular binding.
    pub line: u32,
    /// Line of the earliest binding of this name in the scope.
    pub defining_line: u32,
    /// The node that introduced the binding.
    pub node: NodeId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scope {
    /// The block-like node this scope belongs to.
    pub owner: NodeId,
    pub parent: Option<ScopeId>,
    pub symbols: Vec<Symbol>,
}

impl Scope {
    fn new(owner: NodeId, parent: Option<ScopeId>) -> Self {
        Self {
            owner,
            parent,
            symbols: Vec::new(),
        }
    }

    /// Registers a binding. Re-binding the same name on the same line is a
    /// no-op; a later line gets its own symbol sharing the earliest
    /// defining line.
    pub fn define(&mut self, name: &str, line: u32, node: NodeId) {
        if self
            .symbols
            .iter()
            .any(|symbol| symbol.name == name && symbol.line == line)
        {
            return;
        }
        let defining_line = self
            .symbols
            .iter()
            .filter(|symbol| symbol.name == name)
            .map(|symbol| symbol.defining_line)
            .min()
            .unwrap_or(line);
        self.symbols.push(Symbol {
            name: name.to_string(),
            line,
            defining_line,
            node,
        });
    }

    /// The most recent binding of `name` at or above `line`, in this scope
    /// alone.
    pub fn resolve(&self, name: &str, line: u32) -> Option<&Symbol> {
        self.symbols
            .iter()
            .filter(|symbol| symbol.name == name && symbol.line <= line)
            .max_by_key(|symbol| symbol.line)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Linked {
    parents: Vec<Option<NodeId>>,
    owners: Vec<Option<ScopeId>>,
    scopes: Vec<Scope>,
}

impl Linked {
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parents[id.index()]
    }

    pub fn owner(&self, id: NodeId) -> Option<ScopeId> {
        self.owners[id.index()]
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    /// Scope chain from `scope` to the root, innermost first.
    pub fn chain(&self, scope: ScopeId) -> Vec<ScopeId> {
        let mut chain = vec![scope];
        let mut current = scope;
        while let Some(parent) = self.scope(current).parent {
            chain.push(parent);
            current = parent;
        }
        chain
    }
}

/// Links the tree rooted at `root`: assigns every node a parent and an
/// owning scope and registers all bindings.
pub fn link(ast: &Ast, root: NodeId) -> Linked {
    let mut linked = Linked {
        parents: vec![None; ast.len()],
        owners: vec![None; ast.len()],
        scopes: Vec::new(),
    };
    visit(ast, root, None, None, &mut linked);
    linked
}

fn push_scope(linked: &mut Linked, owner: NodeId, parent: Option<ScopeId>) -> ScopeId {
    let id = ScopeId(linked.scopes.len() as u32);
    linked.scopes.push(Scope::new(owner, parent));
    id
}

fn visit(
    ast: &Ast,
    id: NodeId,
    parent: Option<NodeId>,
    scope: Option<ScopeId>,
    linked: &mut Linked,
) {
    linked.parents[id.index()] = parent;
    linked.owners[id.index()] = scope;

    let child_scope = match ast.node(id) {
        Node::Block { .. } => Some(push_scope(linked, id, scope)),
        Node::For { iterator, .. } => {
            let loop_scope = push_scope(linked, id, scope);
            if let Node::Identifier { name, line } = ast.node(*iterator) {
                linked.scopes[loop_scope.index()].define(name, *line, *iterator);
            }
            Some(loop_scope)
        }
        Node::Function {
            name,
            parameters,
            line,
            ..
        } => {
            if let Some(enclosing) = scope {
                linked.scopes[enclosing.index()].define(name, *line, id);
            }
            let function_scope = push_scope(linked, id, scope);
            for parameter in parameters {
                if let Node::Identifier { name, line } = ast.node(*parameter) {
                    linked.scopes[function_scope.index()].define(name, *line, *parameter);
                }
            }
            Some(function_scope)
        }
        Node::Assignment { target, line, .. } => {
            if let (Some(enclosing), Node::Identifier { name, .. }) = (scope, ast.node(*target)) {
                linked.scopes[enclosing.index()].define(name, *line, *target);
            }
            None
        }
        _ => None,
    };

    let scope_for_children = child_scope.or(scope);
    for child in ast.node(id).children() {
        visit(ast, child, Some(id), scope_for_children, linked);
    }
}
