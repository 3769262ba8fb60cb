//! Box-drawing renderer for the parsed tree, with optional type
//! annotations from an inference pass.

use crate::ast::{Ast, ControlKind, Literal, Node, NodeId};
use crate::typechecker::TypeInfo;

pub fn render_tree(ast: &Ast, root: NodeId, info: Option<&TypeInfo>) -> String {
    let mut rendered = String::new();
    rendered.push_str(&label(ast, root, info));
    rendered.push('\n');
    render_children(ast, root, info, "", &mut rendered);
    rendered
}

fn render_children(ast: &Ast, id: NodeId, info: Option<&TypeInfo>, prefix: &str, out: &mut String) {
    let children = ast.node(id).children();
    for (position, child) in children.iter().enumerate() {
        let last = position + 1 == children.len();
        out.push_str(prefix);
        out.push_str(if last { "└── " } else { "├── " });
        out.push_str(&label(ast, *child, info));
        out.push('\n');
        let extension = if last { "    " } else { "│   " };
        render_children(ast, *child, info, &format!("{}{}", prefix, extension), out);
    }
}

fn label(ast: &Ast, id: NodeId, info: Option<&TypeInfo>) -> String {
    let name = match ast.node(id) {
        Node::Literal { value, .. } => match value {
            Literal::Int(value) => format!("Literal {}", value),
            Literal::Float(value) => format!("Literal {}", value),
            Literal::Bool(value) => format!("Literal {}", value),
            Literal::Str(value) => format!("Literal \"{}\"", value),
        },
        Node::Identifier { name, .. } => format!("Identifier {}", name),
        Node::Vector { .. } => "Vector".to_string(),
        Node::Matrix { .. } => "Matrix".to_string(),
        Node::Unary { operator, .. } => format!("Unary {}", operator),
        Node::Binary { operator, .. } => format!("Binary {}", operator),
        Node::Range { .. } => "Range".to_string(),
        Node::Subscription { .. } => "Subscription".to_string(),
        Node::Call { callee, .. } => format!("Call {}", callee),
        Node::Assignment { operator, .. } => format!("Assignment {}", operator),
        Node::If { .. } => "If".to_string(),
        Node::While { .. } => "While".to_string(),
        Node::For { .. } => "For".to_string(),
        Node::Function { name, .. } => format!("Function {}", name),
        Node::Return { .. } => "Return".to_string(),
        Node::Control {
            kind: ControlKind::Break,
            ..
        } => "Break".to_string(),
        Node::Control {
            kind: ControlKind::Continue,
            ..
        } => "Continue".to_string(),
        Node::Print { .. } => "Print".to_string(),
        Node::Block { .. } => "Block".to_string(),
        Node::Program { .. } => "Program".to_string(),
    };
    match info.and_then(|info| info.ty(id)) {
        Some(ty) => format!("{} : {}", name, ty),
        None => name,
    }
}
