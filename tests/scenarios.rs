//! End-to-end scenarios driving the public `Transpiler` API directly,
//! covering each statement form and the documented negative cases.

use j2tt::{Delimiters, Transpiler, TranspilerOptions};
use j2tt::error::TranspileError;

fn transpile(src: &str) -> String {
    Transpiler::default().transpile(src).unwrap()
}

#[test]
fn plain_text_passes_through_untouched() {
    assert_eq!(transpile("hello world"), "hello world");
}

#[test]
fn variable_output() {
    assert_eq!(transpile("{{ user.name }}"), "[% user.name %]");
}

#[test]
fn filter_chain_of_user_name_upper() {
    assert_eq!(transpile("{{ user.name|upper }}"), "[% user.name.upper %]");
}

#[test]
fn join_filter_with_string_separator() {
    assert_eq!(transpile(r#"{{ items|join(",") }}"#), "[% items.join(',') %]");
}

#[test]
fn comment_is_translated_to_target_comment_syntax() {
    let out = transpile("{# note #}");
    assert!(out.starts_with("[%#"));
}

#[test]
fn if_elif_else() {
    let out = transpile("{% if a %}1{% elif b %}2{% else %}3{% endif %}");
    assert!(out.contains("[% IF a %]"));
    assert!(out.contains("[% ELSIF b %]"));
    assert!(out.contains("[% ELSE %]"));
    assert!(out.contains("[% END %]"));
}

#[test]
fn for_loop_over_list() {
    let out = transpile("{% for item in items %}- {{ item }}\n{% endfor %}");
    assert!(out.contains("[% FOREACH item IN items %]"));
    assert!(out.contains("- [% item %]"));
}

#[test]
fn for_loop_with_empty_else() {
    let out = transpile("{% for x in items %}{{ x }}{% else %}none{% endfor %}");
    assert!(out.contains("IF items.size"));
    assert!(out.contains("none"));
}

#[test]
fn block_and_extends_emit_comment_and_process() {
    let out = transpile("{% extends 'layout.html' %}{% block content %}hi{% endblock %}");
    assert!(out.contains("[% PROCESS layout.html %]"));
    assert!(out.contains("[% BLOCK content %]"));
}

#[test]
fn include_statement() {
    let out = transpile("{% include 'partial.html' %}");
    assert!(out.contains("[% INCLUDE partial.html %]"));
}

#[test]
fn import_with_alias() {
    let out = transpile("{% import 'forms.html' as forms %}");
    assert!(out.contains("[% USE forms = forms.html %]"));
}

#[test]
fn from_import_names() {
    let out = transpile("{% from 'forms.html' import input_field, button as btn %}");
    assert!(out.contains("input_field"));
    assert!(out.contains("btn"));
}

#[test]
fn set_inline_and_block() {
    let out = transpile("{% set x = 1 %}{% set y %}captured{% endset %}");
    assert!(out.contains("[% SET x = 1 %]"));
    assert!(out.contains("[% SET y = BLOCK %]"));
    assert!(out.contains("captured"));
}

#[test]
fn macro_definition_and_call() {
    let out = transpile("{% macro input(name, value='') %}<input name=\"{{ name }}\">{% endmacro %}");
    assert!(out.contains("[% MACRO input(name, value = '') BLOCK %]"));
}

#[test]
fn call_block() {
    let out = transpile("{% call render_dialog() %}body text{% endcall %}");
    assert!(out.contains("[% WRAPPER render_dialog() %]"));
    assert!(out.contains("body text"));
    assert!(out.ends_with("[% END %]\n"));
}

#[test]
fn filter_block_chain() {
    let out = transpile("{% filter upper %}hello{% endfilter %}");
    assert!(out.contains("[% FILTER upper %]"));
    assert!(out.contains("hello"));
}

#[test]
fn raw_block_is_verbatim() {
    let out = transpile("{% raw %}{{ still raw }}{% endraw %}");
    assert!(out.contains("{{ still raw }}"));
}

#[test]
fn with_block_scopes_a_variable() {
    let out = transpile("{% with total = cart.total %}{{ total }}{% endwith %}");
    assert!(out.contains("[% SET total = cart.total %]"));
}

#[test]
fn autoescape_directive_becomes_a_degradation_comment_but_body_is_kept() {
    let out = transpile("{% autoescape false %}{{ raw_html }}{% endautoescape %}");
    assert!(out.contains("[%# autoescape false: no Target equivalent, directive dropped %]"));
    assert!(out.contains("raw_html"));
}

#[test]
fn whitespace_control_markers_trim_adjacent_text() {
    let out = transpile("a \n{%- if true -%}\nb\n{%- endif -%}\n c");
    assert!(!out.contains("a \n["));
}

#[test]
fn expression_precedence_matches_python_style_grammar() {
    let out = transpile("{{ 1 + 2 * 3 if flag else 0 }}");
    assert!(out.contains("?"));
    assert!(out.contains(":"));
}

#[test]
fn filter_chain_and_builtin_translation_table() {
    let out = transpile("{{ name|upper|trim }}");
    assert_eq!(out, "[% name.upper.trim %]");
}

#[test]
fn getitem_with_string_key_becomes_dotted_access() {
    let out = transpile("{{ user['email'] }}");
    assert_eq!(out, "[% user.email %]");
}

#[test]
fn loop_pseudo_variables_translate() {
    let out = transpile("{% for x in xs %}{{ loop.index }}/{{ loop.length }}{% endfor %}");
    assert!(out.contains("loop.count"));
    assert!(out.contains("loop.size"));
}

#[test]
fn custom_delimiters_round_trip() {
    let options = TranspilerOptions {
        delimiters: Delimiters {
            var_start: "<%=".into(),
            var_end: "%>".into(),
            stmt_start: "<%".into(),
            stmt_end: "%>".into(),
            ..Delimiters::default()
        },
        ..TranspilerOptions::default()
    };
    let t = Transpiler::new(options);
    let out = t.transpile("<% if a %>x<% endif %>").unwrap();
    assert!(out.contains("[% IF a %]"));
}

#[test]
fn unterminated_tag_is_a_lex_error() {
    let err = Transpiler::default().transpile("{{ unterminated");
    assert!(err.is_err());
}

#[test]
fn unknown_statement_keyword_is_a_parse_error_with_suggestion() {
    let err = Transpiler::default().transpile("{% endfi %}");
    match err {
        Err(e) => assert!(e.to_string().contains("endfi")),
        Ok(_) => panic!("expected error"),
    }
}

#[test]
fn malformed_expression_is_a_parse_error() {
    let err = Transpiler::default().transpile("{{ 1 + }}");
    assert!(err.is_err());
}

#[test]
fn endif_with_no_matching_if_is_unmatched_closure() {
    let err = Transpiler::default().transpile("{% endif %}");
    assert!(matches!(err, Err(TranspileError::UnmatchedClosure { .. })));
}

#[test]
fn for_loop_missing_in_keyword_is_an_error() {
    let err = Transpiler::default().transpile("{% for x items %}{% endfor %}");
    assert!(err.is_err());
}

#[test]
fn true_and_false_literals_become_one_and_zero() {
    assert_eq!(transpile("{{ true }}"), "[% 1 %]");
    assert_eq!(transpile("{{ False }}"), "[% 0 %]");
}

#[test]
fn ternary_maps_to_question_colon() {
    let out = transpile("{{ x if c else y }}");
    assert!(out.contains("(c ? x : y)"));
}

#[test]
fn tilde_concatenation_maps_to_underscore_operator() {
    let out = transpile("{{ a ~ b }}");
    assert!(out.contains("(a _ b)"));
}

#[test]
fn inline_comment_translates_to_target_comment_form() {
    assert_eq!(transpile("{# hi #}"), "[%# hi %]");
}

#[test]
fn list_and_dict_literals_translate() {
    assert!(transpile("{{ [1, 2, 3] }}").contains("[1, 2, 3]"));
    assert!(transpile("{{ {'a': 1} }}").contains("{ 'a' => 1 }"));
}

#[test]
fn whitespace_strip_markers_begin_and_end_with_dash() {
    let out = transpile("{{- name -}}");
    assert!(out.starts_with("[%-"));
    assert!(out.ends_with("-%]"));
}
