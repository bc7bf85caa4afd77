//! The abstract syntax tree produced by `parser` and consumed by `emitter`.
//!
//! The tree is built once, walked once, and then dropped; nodes are never
//! mutated after construction (spec data-model lifecycle).

/// Root of a parsed template: an ordered sequence of top-level statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Root {
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Text(String),
    Comment(String),
    Output(OutputStmt),
    If(IfStmt),
    For(ForStmt),
    Block(BlockStmt),
    Extends(ExtendsStmt),
    Include(IncludeStmt),
    Import(ImportStmt),
    From(FromStmt),
    Set(SetStmt),
    Macro(MacroStmt),
    Call(CallStmt),
    Filter(FilterStmt),
    Raw(String),
    With(WithStmt),
    Autoescape(AutoescapeStmt),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputStmt {
    pub expr: Expr,
    pub strip_before: bool,
    pub strip_after: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub condition: Expr,
    pub body: Vec<Stmt>,
    pub branches: Vec<IfBranch>,
    pub strip_before: bool,
    pub strip_after: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IfBranch {
    Elif { condition: Expr, body: Vec<Stmt> },
    Else { body: Vec<Stmt> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForStmt {
    pub loop_vars: Vec<String>,
    pub iterable: Expr,
    pub filter: Option<Expr>,
    pub recursive: bool,
    pub body: Vec<Stmt>,
    pub else_body: Option<Vec<Stmt>>,
    pub strip_before: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockStmt {
    pub name: String,
    pub scoped: bool,
    pub body: Vec<Stmt>,
    pub strip_before: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtendsStmt {
    pub template: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IncludeStmt {
    pub template: Expr,
    pub ignore_missing: bool,
    pub with_context: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportStmt {
    pub template: Expr,
    pub alias: String,
    pub with_context: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FromImport {
    pub name: String,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FromStmt {
    pub template: Expr,
    pub imports: Vec<FromImport>,
    pub with_context: bool,
}

/// `SET` has either an inline `value` or a captured `body`, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum SetValue {
    Inline(Expr),
    Block(Vec<Stmt>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetStmt {
    pub names: Vec<String>,
    pub value: SetValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MacroArg {
    pub name: String,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MacroStmt {
    pub name: String,
    pub args: Vec<MacroArg>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallStmt {
    pub args: Vec<MacroArg>,
    pub call: Expr,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterChainLink {
    pub name: String,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterStmt {
    pub chain: Vec<FilterChainLink>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WithStmt {
    pub assignments: Vec<(String, Expr)>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AutoescapeStmt {
    pub enabled: bool,
    pub body: Vec<Stmt>,
}

// ---------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Str(String),
    Num(String),
    Bool(bool),
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOpKind {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    Concat,
    And,
    Or,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    In,
    NotIn,
    Is,
    IsNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOpKind {
    Not,
    Plus,
    Minus,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Name(String),
    Literal(LiteralValue),
    BinOp {
        op: BinOpKind,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOpKind,
        operand: Box<Expr>,
    },
    Ternary {
        true_val: Box<Expr>,
        condition: Box<Expr>,
        false_val: Option<Box<Expr>>,
    },
    GetAttr {
        expr: Box<Expr>,
        attr: String,
    },
    GetItem {
        expr: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        expr: Box<Expr>,
        args: Vec<Expr>,
        kwargs: Vec<(String, Expr)>,
    },
    Filter {
        name: String,
        expr: Box<Expr>,
        args: Vec<Expr>,
    },
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    /// Only valid inside a filter-call or function-call argument list.
    NamedArg {
        name: String,
        value: Box<Expr>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_chain_is_left_to_right_nesting() {
        // a|f|g parses to Filter{g, Filter{f, a}}
        let a = Expr::Name("a".into());
        let f = Expr::Filter {
            name: "f".into(),
            expr: Box::new(a),
            args: vec![],
        };
        let g = Expr::Filter {
            name: "g".into(),
            expr: Box::new(f),
            args: vec![],
        };
        match g {
            Expr::Filter { name, expr, .. } => {
                assert_eq!(name, "g");
                match *expr {
                    Expr::Filter { name, .. } => assert_eq!(name, "f"),
                    _ => panic!("expected nested filter"),
                }
            }
            _ => panic!("expected filter"),
        }
    }

    #[test]
    fn set_value_is_either_inline_or_block() {
        let inline = SetValue::Inline(Expr::Literal(LiteralValue::Num("1".into())));
        let block = SetValue::Block(vec![Stmt::Text("x".into())]);
        assert_ne!(
            std::mem::discriminant(&inline),
            std::mem::discriminant(&block)
        );
    }
}
