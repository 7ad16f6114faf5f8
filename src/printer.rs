use crate::ast::{Expr, LiteralValue, Stmt};

/// Renders an expression as a parenthesized prefix form, e.g. `(* (- 123) (group 45.67))`.
pub fn pretty_print(expr: &Expr) -> String {
    match expr {
        Expr::Assign { name, value } => parenthesize(&format!("= {}", name.lexeme), &[value]),
        Expr::Binary { left, op, right } | Expr::Logical { left, op, right } => {
            parenthesize(&op.lexeme, &[left, right])
        }
        Expr::Call { callee, args, .. } => {
            let mut exprs: Vec<&Expr> = vec![callee.as_ref()];
            exprs.extend(args.iter());
            parenthesize("call", &exprs)
        }
        Expr::Get { object, name } => parenthesize(&format!(". {}", name.lexeme), &[object]),
        Expr::Grouping { expression } => parenthesize("group", &[expression]),
        Expr::Literal { value } => match value {
            LiteralValue::String(v) => format!("{v:?}"),
            LiteralValue::Number(v) => v.to_string(),
            LiteralValue::Bool(v) => v.to_string(),
            LiteralValue::Null => "null".to_string(),
        },
        Expr::Set {
            object,
            name,
            value,
        } => parenthesize(&format!(".= {}", name.lexeme), &[object, value]),
        Expr::This { .. } => "this".to_string(),
        Expr::Unary { op, right } => parenthesize(&op.lexeme, &[right]),
        Expr::Variable { name } => name.lexeme.clone(),
    }
}

/// One-line summary of a statement, for trace logs.
pub fn summarize(stmt: &Stmt) -> String {
    match stmt {
        Stmt::Block { statements } => format!("(block {} stmts)", statements.len()),
        Stmt::Expression { expression } => format!("(expr {})", pretty_print(expression)),
        Stmt::Function(decl) => format!("(func {}/{})", decl.name.lexeme, decl.params.len()),
        Stmt::If { condition, .. } => format!("(if {})", pretty_print(condition)),
        Stmt::Print { expression } => format!("(print {})", pretty_print(expression)),
        Stmt::Return { value, .. } => match value {
            Some(value) => format!("(return {})", pretty_print(value)),
            None => "(return)".to_string(),
        },
        Stmt::Struct { name, methods } => {
            format!("(struct {} {} methods)", name.lexeme, methods.len())
        }
        Stmt::Var { name, initializer } => match initializer {
            Some(init) => format!("(var {} {})", name.lexeme, pretty_print(init)),
            None => format!("(var {})", name.lexeme),
        },
        Stmt::While { condition, .. } => format!("(while {})", pretty_print(condition)),
    }
}

fn parenthesize(name: &str, exprs: &[&Expr]) -> String {
    let mut parenthesized = format!("({name}");

    for expr in exprs {
        parenthesized.push(' ');
        parenthesized.push_str(&pretty_print(expr));
    }

    parenthesized.push(')');

    parenthesized
}
