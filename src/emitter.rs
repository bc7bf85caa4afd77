//! Stage 3 of the pipeline: walks the AST and writes Template Toolkit 2
//! syntax into a `String`. Emission is total — every AST shape produced by
//! `parser` has a case here, so this stage never fails.

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::ast::{
    BinOpKind, Expr, IfBranch, LiteralValue, Root, SetValue, Stmt, UnaryOpKind,
};

/// How a single filter translates into Target syntax.
#[derive(Clone)]
pub enum FilterMapping {
    /// `expr|name(args)` becomes a dotted virtual-method call: `expr.name(args)`.
    Vmethod(&'static str),
    /// `expr|name(args)` becomes a `FILTER`-style pipe under a different name.
    FilterName(&'static str),
    /// Fully custom rewrite, given the emitted receiver text and emitted args.
    Custom(fn(&str, &[String]) -> String),
    /// The filter has no Target equivalent; drop it and emit the receiver
    /// unchanged (e.g. `safe`, which is a no-op once autoescaping isn't
    /// tracked per-expression).
    None_,
}

pub fn default_filter_table() -> HashMap<String, FilterMapping> {
    let mut m: HashMap<String, FilterMapping> = HashMap::new();

    // vmethod: `base|name(args)` -> `base.tt-name(args)`
    m.insert("upper".into(), FilterMapping::Vmethod("upper"));
    m.insert("lower".into(), FilterMapping::Vmethod("lower"));
    m.insert("capitalize".into(), FilterMapping::Vmethod("ucfirst"));
    m.insert("trim".into(), FilterMapping::Vmethod("trim"));
    m.insert("first".into(), FilterMapping::Vmethod("first"));
    m.insert("last".into(), FilterMapping::Vmethod("last"));
    m.insert("length".into(), FilterMapping::Vmethod("size"));
    m.insert("count".into(), FilterMapping::Vmethod("size"));
    m.insert("reverse".into(), FilterMapping::Vmethod("reverse"));
    m.insert("sort".into(), FilterMapping::Vmethod("sort"));
    m.insert("join".into(), FilterMapping::Vmethod("join"));
    m.insert("unique".into(), FilterMapping::Vmethod("unique"));
    m.insert("batch".into(), FilterMapping::Vmethod("batch"));
    m.insert("slice".into(), FilterMapping::Vmethod("slice"));
    m.insert("replace".into(), FilterMapping::Vmethod("replace"));
    m.insert("dictsort".into(), FilterMapping::Vmethod("sort"));
    m.insert("items".into(), FilterMapping::Vmethod("pairs"));
    m.insert("int".into(), FilterMapping::Vmethod("int"));
    m.insert(
        "select".into(),
        FilterMapping::Custom(|e, args| {
            let test = args.first().cloned().unwrap_or_default();
            format!("{}.grep('{}')", e, test)
        }),
    );

    // filter: `base|name(args)` -> `base | tt-name(args)`
    m.insert("title".into(), FilterMapping::FilterName("title"));
    m.insert("striptags".into(), FilterMapping::FilterName("html_strip"));
    m.insert("escape".into(), FilterMapping::FilterName("html_entity"));
    m.insert("e".into(), FilterMapping::FilterName("html_entity"));
    m.insert("forceescape".into(), FilterMapping::FilterName("html_entity"));
    m.insert("truncate".into(), FilterMapping::FilterName("truncate"));
    m.insert("wordwrap".into(), FilterMapping::FilterName("wrap"));
    m.insert("center".into(), FilterMapping::FilterName("center"));
    m.insert("indent".into(), FilterMapping::FilterName("indent"));
    m.insert("format".into(), FilterMapping::FilterName("format"));
    m.insert("urlencode".into(), FilterMapping::FilterName("uri"));
    m.insert("tojson".into(), FilterMapping::FilterName("json"));
    m.insert("pprint".into(), FilterMapping::FilterName("dumper"));

    // custom: bespoke rewrites with no direct vmethod/filter counterpart
    m.insert(
        "abs".into(),
        FilterMapping::Custom(|e, _| format!("({} >= 0 ? {} : -{})", e, e, e)),
    );
    m.insert(
        "round".into(),
        FilterMapping::Custom(|e, args| {
            let n = args.first().cloned().unwrap_or_else(|| "0".to_string());
            format!("{}.format('%.{}f')", e, n)
        }),
    );
    let default_mapping = FilterMapping::Custom(|e, args| match args.first() {
        Some(d) => format!("({} || {})", e, d),
        None => format!("({} || '')", e),
    });
    m.insert("default".into(), default_mapping.clone());
    m.insert("d".into(), default_mapping);
    m.insert("min".into(), FilterMapping::Custom(|e, _| format!("{}.sort.first", e)));
    m.insert("max".into(), FilterMapping::Custom(|e, _| format!("{}.sort.last", e)));
    m.insert("wordcount".into(), FilterMapping::Custom(|e, _| format!("{}.split.size", e)));
    m.insert(
        "attr".into(),
        FilterMapping::Custom(|e, args| {
            let key = args.first().map(|a| a.trim_matches(['\'', '"'])).unwrap_or("");
            format!("{}.{}", e, key)
        }),
    );
    m.insert(
        "sum".into(),
        FilterMapping::Custom(|e, _| format!("{}.reduce('add')", e)),
    );
    m.insert(
        "reject".into(),
        FilterMapping::Custom(|e, args| {
            let test = args.first().cloned().unwrap_or_default();
            format!("{}.grep('^(?!{}).*$')", e, test)
        }),
    );

    // none: filter has no Target equivalent; drop it, keep the receiver
    m.insert("safe".into(), FilterMapping::None_);
    m.insert("float".into(), FilterMapping::None_);
    m.insert("list".into(), FilterMapping::None_);
    m.insert("string".into(), FilterMapping::None_);

    m
}

/// The loop-variable translation table: Source's `loop.X` to Target's.
fn map_loop_attr(attr: &str) -> Option<&'static str> {
    match attr {
        "index" => Some("count"),
        "index0" => Some("index"),
        "first" => Some("first"),
        "last" => Some("last"),
        "length" => Some("size"),
        "previtem" => Some("prev"),
        "nextitem" => Some("next"),
        _ => None,
    }
}

pub struct EmitContext {
    pub filters: HashMap<String, FilterMapping>,
}

impl Default for EmitContext {
    fn default() -> Self {
        EmitContext { filters: default_filter_table() }
    }
}

pub fn emit(root: &Root, ctx: &EmitContext) -> String {
    let mut out = String::new();
    emit_stmts(&root.body, &mut out, ctx);
    out
}

fn emit_stmts(stmts: &[Stmt], out: &mut String, ctx: &EmitContext) {
    for (i, stmt) in stmts.iter().enumerate() {
        if let Stmt::Text(text) = stmt {
            let mut s: &str = text;
            if i > 0 && stmt_strips_after(&stmts[i - 1]) {
                s = s.trim_start();
            }
            let trimmed_end;
            if let Some(next) = stmts.get(i + 1) {
                if stmt_strips_before(next) {
                    trimmed_end = s.trim_end();
                    out.push_str(trimmed_end);
                    continue;
                }
            }
            out.push_str(s);
            continue;
        }
        emit_stmt(stmt, out, ctx);
    }
}

fn stmt_strips_after(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Output(o) => o.strip_after,
        Stmt::If(s) => s.strip_after,
        _ => false,
    }
}

fn stmt_strips_before(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Output(o) => o.strip_before,
        Stmt::If(s) => s.strip_before,
        Stmt::For(s) => s.strip_before,
        Stmt::Block(s) => s.strip_before,
        _ => false,
    }
}

fn emit_stmt(stmt: &Stmt, out: &mut String, ctx: &EmitContext) {
    match stmt {
        Stmt::Text(_) => unreachable!("handled in emit_stmts"),
        Stmt::Comment(c) => {
            let _ = write!(out, "[%# {} %]", c);
        }
        Stmt::Output(o) => {
            let _ = write!(
                out,
                "[%{} {} {}%]",
                dash(o.strip_before),
                emit_expr(&o.expr, ctx),
                dash(o.strip_after)
            );
        }
        Stmt::If(s) => {
            let _ = writeln!(out, "[%{} IF {} %]", dash(s.strip_before), emit_expr(&s.condition, ctx));
            emit_stmts(&s.body, out, ctx);
            for branch in &s.branches {
                match branch {
                    IfBranch::Elif { condition, body } => {
                        let _ = writeln!(out, "[% ELSIF {} %]", emit_expr(condition, ctx));
                        emit_stmts(body, out, ctx);
                    }
                    IfBranch::Else { body } => {
                        out.push_str("[% ELSE %]\n");
                        emit_stmts(body, out, ctx);
                    }
                }
            }
            let _ = writeln!(out, "[% END {}%]", dash(s.strip_after));
        }
        Stmt::For(s) => {
            let var = s.loop_vars.first().cloned().unwrap_or_else(|| "item".to_string());
            let iterable = emit_expr(&s.iterable, ctx);
            let has_else = s.else_body.is_some();
            if has_else {
                let _ = writeln!(out, "[% IF {}.size %]", iterable);
            }
            if s.loop_vars.len() > 1 {
                let _ = writeln!(
                    out,
                    "[%# destructured loop vars {} have no FOREACH equivalent; only {} is bound %]",
                    s.loop_vars.join(", "),
                    var
                );
            }
            let _ = writeln!(out, "[% FOREACH {} IN {} %]", var, iterable);
            if let Some(filter) = &s.filter {
                let _ = writeln!(out, "[% IF {} %]", emit_expr(filter, ctx));
                emit_stmts(&s.body, out, ctx);
                out.push_str("[% END %]\n");
            } else {
                emit_stmts(&s.body, out, ctx);
            }
            out.push_str("[% END %]\n");
            if let Some(else_body) = &s.else_body {
                out.push_str("[% ELSE %]\n");
                emit_stmts(else_body, out, ctx);
                out.push_str("[% END %]\n");
            }
        }
        Stmt::Block(s) => {
            let _ = writeln!(out, "[% BLOCK {} %]", s.name);
            emit_stmts(&s.body, out, ctx);
            out.push_str("[% END %]\n");
            let _ = writeln!(out, "[% PROCESS {} %]", s.name);
        }
        Stmt::Extends(s) => {
            let template = bare_template(&s.template, ctx);
            let _ = writeln!(out, "[%# extends {} has no exact Target equivalent %]", template);
            let _ = writeln!(out, "[% PROCESS {} %]", template);
        }
        Stmt::Include(s) => {
            let template = bare_template(&s.template, ctx);
            if s.ignore_missing {
                let _ = writeln!(out, "[% TRY %]");
                let _ = writeln!(out, "[% INCLUDE {} %]", template);
                let _ = writeln!(out, "[% CATCH %]");
                out.push_str("[% END %]\n");
            } else {
                let _ = writeln!(out, "[% INCLUDE {} %]", template);
            }
        }
        Stmt::Import(s) => {
            let template = bare_template(&s.template, ctx);
            let _ = writeln!(out, "[%# available as {} %]", s.alias);
            let _ = writeln!(out, "[% USE {} = {} %]", s.alias, template);
        }
        Stmt::From(s) => {
            let template = bare_template(&s.template, ctx);
            let names = s
                .imports
                .iter()
                .map(|item| match &item.alias {
                    Some(alias) => format!("{} as {}", item.name, alias),
                    None => item.name.clone(),
                })
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(out, "[%# from {} import {} %]", template, names);
            for item in &s.imports {
                let target = item.alias.clone().unwrap_or_else(|| item.name.clone());
                let _ = writeln!(out, "[% SET {} = {} %]", target, item.name);
            }
        }
        Stmt::Set(s) => match &s.value {
            SetValue::Inline(value) => {
                let names = s.names.join(", ");
                let _ = writeln!(out, "[% SET {} = {} %]", names, emit_expr(value, ctx));
            }
            SetValue::Block(body) => {
                let name = s.names.first().cloned().unwrap_or_default();
                let _ = writeln!(out, "[% SET {} = BLOCK %]", name);
                emit_stmts(body, out, ctx);
                out.push_str("[% END %]\n");
            }
        },
        Stmt::Macro(s) => {
            let params = s
                .args
                .iter()
                .map(|a| match &a.default {
                    Some(d) => format!("{} = {}", a.name, emit_expr(d, ctx)),
                    None => a.name.clone(),
                })
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(out, "[% MACRO {}({}) BLOCK %]", s.name, params);
            emit_stmts(&s.body, out, ctx);
            out.push_str("[% END %]\n");
        }
        Stmt::Call(s) => {
            // TT2 has no `caller()` equivalent: WRAPPER's own `content`
            // variable is the closest analogue, so the call is approximated
            // as a WRAPPER invocation around the call-block's body.
            let call = emit_expr(&s.call, ctx);
            let _ = writeln!(out, "[%# call-block {} has no exact Target equivalent %]", call);
            let _ = writeln!(out, "[% WRAPPER {} %]", call);
            emit_stmts(&s.body, out, ctx);
            out.push_str("[% END %]\n");
        }
        Stmt::Filter(s) => {
            let mut open = String::new();
            let mut close = String::new();
            for link in &s.chain {
                let args: Vec<String> = link.args.iter().map(|a| emit_expr(a, ctx)).collect();
                let name = filter_directive_name(&link.name, &ctx.filters);
                if args.is_empty() {
                    open.push_str(&format!("[% FILTER {} %]\n", name));
                } else {
                    open.push_str(&format!("[% FILTER {}({}) %]\n", name, args.join(", ")));
                }
                close.push_str("[% END %]\n");
            }
            out.push_str(&open);
            emit_stmts(&s.body, out, ctx);
            out.push_str(&close);
        }
        Stmt::Raw(text) => out.push_str(text),
        Stmt::With(s) => {
            for (name, value) in &s.assignments {
                let _ = writeln!(out, "[% SET {} = {} %]", name, emit_expr(value, ctx));
            }
            emit_stmts(&s.body, out, ctx);
        }
        Stmt::Autoescape(s) => {
            // TT2's autoescaping is a global config switch, not block
            // scoped: the directive can't be represented, so it's noted in
            // a degradation comment and only the body actually survives.
            let _ = writeln!(
                out,
                "[%# autoescape {}: no Target equivalent, directive dropped %]",
                s.enabled
            );
            emit_stmts(&s.body, out, ctx);
        }
    }
}

/// Forwards a whitespace-strip flag into Target's own `-` marker convention;
/// the transpiler doesn't re-trim bytes itself, it hands the request to the
/// Target engine the same way the Source engine would have handled it.
fn dash(strip: bool) -> &'static str {
    if strip {
        "-"
    } else {
        ""
    }
}

fn filter_directive_name(name: &str, filters: &HashMap<String, FilterMapping>) -> String {
    match filters.get(name) {
        Some(FilterMapping::FilterName(n)) => n.to_string(),
        _ => name.to_string(),
    }
}

pub fn emit_expr(expr: &Expr, ctx: &EmitContext) -> String {
    match expr {
        Expr::Name(n) => n.clone(),
        Expr::Literal(lit) => emit_literal(lit),
        Expr::BinOp { op, left, right } => emit_binop(*op, left, right, ctx),
        Expr::UnaryOp { op, operand } => {
            let o = emit_expr(operand, ctx);
            match op {
                UnaryOpKind::Not => format!("NOT {}", o),
                UnaryOpKind::Minus => format!("-{}", o),
                UnaryOpKind::Plus => o,
            }
        }
        Expr::Ternary { true_val, condition, false_val } => {
            let t = emit_expr(true_val, ctx);
            let c = emit_expr(condition, ctx);
            let f = false_val.as_ref().map(|v| emit_expr(v, ctx)).unwrap_or_else(|| "''".to_string());
            format!("({} ? {} : {})", c, t, f)
        }
        Expr::GetAttr { expr, attr } => {
            if let Expr::Name(base) = expr.as_ref() {
                if base == "loop" {
                    if attr == "revindex" {
                        return "(loop.max - loop.index + 1)".to_string();
                    }
                    if let Some(mapped) = map_loop_attr(attr) {
                        return format!("loop.{}", mapped);
                    }
                }
            }
            format!("{}.{}", emit_expr(expr, ctx), attr)
        }
        Expr::GetItem { expr, index } => {
            let base = emit_expr(expr, ctx);
            match index.as_ref() {
                Expr::Literal(LiteralValue::Str(s)) => format!("{}.{}", base, s),
                Expr::Literal(LiteralValue::Num(n)) => format!("{}.{}", base, n),
                Expr::Name(n) => format!("{}.${}", base, n),
                other => format!(
                    "{}.${} /* unsupported dynamic index */",
                    base,
                    emit_expr(other, ctx)
                ),
            }
        }
        Expr::Call { expr, args, kwargs } => emit_call(expr, args, kwargs, ctx),
        Expr::Filter { name, expr, args } => {
            let receiver = emit_expr(expr, ctx);
            let rendered_args: Vec<String> = args.iter().map(|a| emit_expr(a, ctx)).collect();
            apply_filter(name, &receiver, &rendered_args, ctx)
        }
        Expr::List(items) | Expr::Tuple(items) => {
            let parts: Vec<String> = items.iter().map(|i| emit_expr(i, ctx)).collect();
            format!("[{}]", parts.join(", "))
        }
        Expr::Dict(pairs) => {
            let parts: Vec<String> = pairs
                .iter()
                .map(|(k, v)| format!("{} => {}", emit_expr(k, ctx), emit_expr(v, ctx)))
                .collect();
            format!("{{ {} }}", parts.join(", "))
        }
        Expr::NamedArg { name, value } => format!("{} = {}", name, emit_expr(value, ctx)),
    }
}

/// `range`/`super` have no Target function of the same shape, so a call to
/// either is special-cased before falling back to plain `expr(args)` emission.
fn emit_call(expr: &Expr, args: &[Expr], kwargs: &[(String, Expr)], ctx: &EmitContext) -> String {
    if kwargs.is_empty() {
        if let Expr::Name(name) = expr {
            if name == "range" {
                match args {
                    [n] => return format!("[0 .. {} - 1]", emit_expr(n, ctx)),
                    [a, b] => return format!("[{} .. {} - 1]", emit_expr(a, ctx), emit_expr(b, ctx)),
                    [a, b, step] => {
                        return format!(
                            "[{} .. {} - 1] /* step {} has no Target equivalent, ignored */",
                            emit_expr(a, ctx),
                            emit_expr(b, ctx),
                            emit_expr(step, ctx)
                        );
                    }
                    _ => {}
                }
            }
            if name == "super" && args.is_empty() {
                return "content".to_string();
            }
        }
    }
    let mut parts: Vec<String> = args.iter().map(|a| emit_expr(a, ctx)).collect();
    parts.extend(kwargs.iter().map(|(k, v)| format!("{} = {}", k, emit_expr(v, ctx))));
    format!("{}({})", emit_expr(expr, ctx), parts.join(", "))
}

fn apply_filter(name: &str, receiver: &str, args: &[String], ctx: &EmitContext) -> String {
    match ctx.filters.get(name) {
        Some(FilterMapping::Vmethod(vm)) => {
            if args.is_empty() {
                format!("{}.{}", receiver, vm)
            } else {
                format!("{}.{}({})", receiver, vm, args.join(", "))
            }
        }
        Some(FilterMapping::FilterName(fname)) => {
            if args.is_empty() {
                format!("{} | {}", receiver, fname)
            } else {
                format!("{} | {}({})", receiver, fname, args.join(", "))
            }
        }
        Some(FilterMapping::Custom(f)) => f(receiver, args),
        Some(FilterMapping::None_) => receiver.to_string(),
        None => {
            let passthrough = if args.is_empty() {
                format!("{} | {}", receiver, name)
            } else {
                format!("{} | {}({})", receiver, name, args.join(", "))
            };
            match crate::error::suggest_filter(name) {
                Some(hint) => format!("{} /* unknown filter, did you mean '{}'? */", passthrough, hint),
                None => passthrough,
            }
        }
    }
}

/// Emits a template-name expression as a bare, unquoted token for directives
/// that take a template name directly (`INCLUDE`, `PROCESS`, `USE`). String
/// literals have their surrounding quotes stripped; anything else falls back
/// to normal expression emission.
fn bare_template(expr: &Expr, ctx: &EmitContext) -> String {
    match expr {
        Expr::Literal(LiteralValue::Str(s)) => s.clone(),
        other => emit_expr(other, ctx),
    }
}

fn emit_literal(lit: &LiteralValue) -> String {
    match lit {
        LiteralValue::Str(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
        LiteralValue::Num(n) => n.replace('_', ""),
        LiteralValue::Bool(true) => "1".to_string(),
        LiteralValue::Bool(false) => "0".to_string(),
        LiteralValue::None => "undef".to_string(),
    }
}

fn emit_binop(op: BinOpKind, left: &Expr, right: &Expr, ctx: &EmitContext) -> String {
    let l = emit_expr(left, ctx);
    let r = emit_expr(right, ctx);
    match op {
        BinOpKind::Add => format!("({} + {})", l, r),
        BinOpKind::Sub => format!("({} - {})", l, r),
        BinOpKind::Mul => format!("({} * {})", l, r),
        BinOpKind::Div => format!("({} / {})", l, r),
        BinOpKind::FloorDiv => format!("({} div {})", l, r),
        BinOpKind::Mod => format!("({} % {})", l, r),
        BinOpKind::Pow => format!("({} ** {})", l, r),
        BinOpKind::Concat => format!("({} _ {})", l, r),
        BinOpKind::And => format!("({} AND {})", l, r),
        BinOpKind::Or => format!("({} OR {})", l, r),
        BinOpKind::Eq => format!("({} == {})", l, r),
        BinOpKind::NotEq => format!("({} != {})", l, r),
        BinOpKind::Lt => format!("({} < {})", l, r),
        BinOpKind::Gt => format!("({} > {})", l, r),
        BinOpKind::LtEq => format!("({} <= {})", l, r),
        BinOpKind::GtEq => format!("({} >= {})", l, r),
        BinOpKind::In => format!("({} IN {})", l, r),
        BinOpKind::NotIn => format!("({} NOT IN {})", l, r),
        BinOpKind::Is => emit_is_test(&l, right),
        BinOpKind::IsNot => format!("!({})", emit_is_test(&l, right)),
    }
}

fn emit_is_test(left: &str, right: &Expr) -> String {
    match right {
        Expr::Name(n) if n == "defined" => format!("{}.defined", left),
        Expr::Literal(LiteralValue::None) => format!("!{}.defined", left),
        Expr::Name(n) if n == "string" => format!("{}.match('^.*$')", left),
        Expr::Name(n) if n == "number" => format!("{}.match('^-?\\\\d+(\\\\.\\\\d+)?$')", left),
        Expr::Name(n) if n == "iterable" || n == "sequence" => format!("{}.list.size.defined", left),
        _ => format!("{}.defined", left),
    }
}
