//! Template rendering scenarios exercised end to end: register, render,
//! serialize, patch.

use qweb_dom::patch::{mount, patch, NoopModules};
use qweb_dom::{Document, VNode};
use qweb_runtime::{QWeb, RenderError, RenderExtra, Value};
use serde_json::json;

fn ctx(value: serde_json::Value) -> Value {
    Value::from(value)
}

fn render_html(qweb: &QWeb, name: &str, context: &Value) -> String {
    qweb.render_to_string(name, context).expect("render")
}

#[test]
fn static_and_dynamic_class_merge() {
    let mut qweb = QWeb::new();
    qweb.add_template("t", r#"<div class="hello" t-att-class="'world'"/>"#)
        .unwrap();
    assert_eq!(
        render_html(&qweb, "t", &Value::Null),
        r#"<div class="hello world"></div>"#
    );
}

#[test]
fn foreach_renders_index_and_item() {
    let mut qweb = QWeb::new();
    qweb.add_template(
        "t",
        r#"<div><t t-foreach="[3,2,1]" t-as="item">[<t t-esc="item_index"/>:<t t-esc="item"/>]</t></div>"#,
    )
    .unwrap();
    assert_eq!(render_html(&qweb, "t", &Value::Null), "<div>[0:3][1:2][2:1]</div>");
}

#[test]
fn foreach_loop_variables() {
    let mut qweb = QWeb::new();
    qweb.add_template(
        "t",
        r#"<ul><t t-foreach="items" t-as="n"><li t-attf-class="{{ n_parity }}{{ n_first ? ' head' : '' }}{{ n_last ? ' tail' : '' }}" t-esc="n"/></t></ul>"#,
    )
    .unwrap();
    let html = render_html(&qweb, "t", &ctx(json!({"items": ["a", "b", "c"]})));
    assert_eq!(
        html,
        r#"<ul><li class="even head">a</li><li class="odd">b</li><li class="even tail">c</li></ul>"#
    );
}

#[test]
fn foreach_over_mapping_and_integer() {
    let mut qweb = QWeb::new();
    qweb.add_template(
        "entries",
        r#"<div><t t-foreach="obj" t-as="k">(<t t-esc="k"/>=<t t-esc="k_value"/>)</t></div>"#,
    )
    .unwrap();
    qweb.add_template(
        "range",
        r#"<div><t t-foreach="3" t-as="i"><t t-esc="i"/>,</t></div>"#,
    )
    .unwrap();
    assert_eq!(
        render_html(&qweb, "entries", &ctx(json!({"obj": {"a": 1, "b": 2}}))),
        "<div>(a=1)(b=2)</div>"
    );
    assert_eq!(render_html(&qweb, "range", &Value::Null), "<div>0,1,2,</div>");
}

#[test]
fn foreach_invalid_iterable_is_a_render_error() {
    let mut qweb = QWeb::new();
    qweb.add_template("t", r#"<div><t t-foreach="x" t-as="i">a</t></div>"#)
        .unwrap();
    let err = qweb
        .render_to_string("t", &ctx(json!({"x": "nope"})))
        .unwrap_err();
    assert!(matches!(err, RenderError::InvalidLoop { .. }));
    assert!(err.to_string().starts_with("Invalid loop expression"));
}

#[test]
fn call_body_sets_leak_into_callee() {
    let mut qweb = QWeb::new();
    qweb.add_template("x", r#"<t t-esc="foo"/>"#).unwrap();
    qweb.add_template(
        "caller",
        r#"<div><t t-call="x"><t t-set="foo" t-value="'ok'"/></t></div>"#,
    )
    .unwrap();
    assert_eq!(render_html(&qweb, "caller", &Value::Null), "<div>ok</div>");
}

#[test]
fn call_body_fragment_is_variable_zero() {
    let mut qweb = QWeb::new();
    qweb.add_template("wrapper", r#"<p>[<t t-raw="0"/>]</p>"#).unwrap();
    qweb.add_template(
        "caller",
        r#"<div><t t-call="wrapper"><b>inner</b></t></div>"#,
    )
    .unwrap();
    assert_eq!(
        render_html(&qweb, "caller", &Value::Null),
        "<div><p>[<b>inner</b>]</p></div>"
    );
}

#[test]
fn call_inherits_caller_context() {
    let mut qweb = QWeb::new();
    qweb.add_template("x", r#"<t t-esc="who"/>"#).unwrap();
    qweb.add_template("caller", r#"<div><t t-call="x"/></div>"#).unwrap();
    assert_eq!(
        render_html(&qweb, "caller", &ctx(json!({"who": "ctx"}))),
        "<div>ctx</div>"
    );
}

#[test]
fn call_unknown_template_is_a_render_error() {
    let mut qweb = QWeb::new();
    qweb.add_template("caller", r#"<div><t t-call="ghost"/></div>"#)
        .unwrap();
    let err = qweb.render_to_string("caller", &Value::Null).unwrap_err();
    assert_eq!(err.to_string(), "Template 'ghost' does not exist");
}

#[test]
fn esc_uses_body_as_default() {
    let mut qweb = QWeb::new();
    qweb.add_template("t", r#"<span t-esc="value">fallback</span>"#).unwrap();
    assert_eq!(
        render_html(&qweb, "t", &ctx(json!({"value": "real"}))),
        "<span>real</span>"
    );
    assert_eq!(
        render_html(&qweb, "t", &Value::Null),
        "<span>fallback</span>"
    );
}

#[test]
fn esc_output_is_escaped_only_at_serialization() {
    let mut qweb = QWeb::new();
    qweb.add_template("t", r#"<div t-esc="value"/>"#).unwrap();
    let mut extra = RenderExtra::default();
    let vnode = qweb
        .render("t", &ctx(json!({"value": "<ok>"})), &mut extra)
        .unwrap();
    // the engine itself emits a plain text vnode
    match &vnode {
        VNode::Element(el) => match &el.children[0] {
            VNode::Text(t) => assert_eq!(t.text, "<ok>"),
            other => panic!("unexpected {:?}", other),
        },
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(
        render_html(&qweb, "t", &ctx(json!({"value": "<ok>"}))),
        "<div>&lt;ok&gt;</div>"
    );
}

#[test]
fn raw_parses_html_fragments() {
    let mut qweb = QWeb::new();
    qweb.add_template("t", r#"<div t-raw="value"/>"#).unwrap();
    assert_eq!(
        render_html(&qweb, "t", &ctx(json!({"value": "<b>bold</b> text"}))),
        "<div><b>bold</b> text</div>"
    );
}

#[test]
fn set_with_value_body_and_priority() {
    let mut qweb = QWeb::new();
    qweb.add_template(
        "value",
        r#"<div><t t-set="x" t-value="1 + 1"/><t t-esc="x"/></div>"#,
    )
    .unwrap();
    qweb.add_template(
        "body",
        r#"<div><t t-set="x"><b>frag</b></t><t t-raw="x"/></div>"#,
    )
    .unwrap();
    assert_eq!(render_html(&qweb, "value", &Value::Null), "<div>2</div>");
    assert_eq!(render_html(&qweb, "body", &Value::Null), "<div><b>frag</b></div>");
}

#[test]
fn fragment_values_hoist_in_place() {
    let mut qweb = QWeb::new();
    qweb.add_template(
        "t",
        r#"<div><t t-set="f"><i>a</i><i>b</i></t>[<t t-raw="f"/>]</div>"#,
    )
    .unwrap();
    assert_eq!(
        render_html(&qweb, "t", &Value::Null),
        "<div>[<i>a</i><i>b</i>]</div>"
    );
}

#[test]
fn if_elif_else_chain() {
    let mut qweb = QWeb::new();
    qweb.add_template(
        "t",
        r#"<div><p t-if="v == 1">one</p><p t-elif="v == 2">two</p><p t-else="">many</p></div>"#,
    )
    .unwrap();
    assert_eq!(render_html(&qweb, "t", &ctx(json!({"v": 1}))), "<div><p>one</p></div>");
    assert_eq!(render_html(&qweb, "t", &ctx(json!({"v": 2}))), "<div><p>two</p></div>");
    assert_eq!(render_html(&qweb, "t", &ctx(json!({"v": 9}))), "<div><p>many</p></div>");
}

#[test]
fn dynamic_attributes() {
    let mut qweb = QWeb::new();
    qweb.add_template(
        "t",
        r#"<div t-att-title="title" t-att-hidden="hide" t-attf-data-x="v-{{ n }}"/>"#,
    )
    .unwrap();
    assert_eq!(
        render_html(&qweb, "t", &ctx(json!({"title": "hi", "hide": false, "n": 4}))),
        r#"<div title="hi" data-x="v-4"></div>"#
    );
    assert_eq!(
        render_html(&qweb, "t", &ctx(json!({"title": null, "hide": true, "n": 4}))),
        r#"<div hidden data-x="v-4"></div>"#
    );
}

#[test]
fn att_pair_and_mapping() {
    let mut qweb = QWeb::new();
    qweb.add_template("pair", r#"<div t-att="['data-k', value]"/>"#).unwrap();
    qweb.add_template("map", r#"<div t-att="{a: 1, b: null}"/>"#).unwrap();
    assert_eq!(
        render_html(&qweb, "pair", &ctx(json!({"value": "v"}))),
        r#"<div data-k="v"></div>"#
    );
    assert_eq!(render_html(&qweb, "map", &Value::Null), r#"<div a="1"></div>"#);
}

#[test]
fn multiple_roots_is_a_render_error() {
    let mut qweb = QWeb::new();
    qweb.add_template("t", r#"<t><div/><div/></t>"#).unwrap();
    let err = qweb.render_to_string("t", &Value::Null).unwrap_err();
    assert!(matches!(err, RenderError::MultipleRoots { .. }));
}

#[test]
fn missing_named_handler_is_a_render_error() {
    let mut qweb = QWeb::new();
    qweb.add_template("t", r#"<button t-on-click="inc">x</button>"#).unwrap();
    // no handler host: the named handler cannot resolve
    let mut extra = RenderExtra::default();
    let err = qweb.render("t", &Value::Null, &mut extra).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Missing handler 'inc' when evaluating template 't'"
    );
}

#[test]
fn keyed_foreach_preserves_node_identity_across_patch() {
    let mut qweb = QWeb::new();
    qweb.add_template(
        "t",
        r#"<ul><t t-foreach="items" t-as="item"><li t-key="item" t-esc="item"/></t></ul>"#,
    )
    .unwrap();

    let mut extra = RenderExtra::default();
    let mut old = qweb
        .render("t", &ctx(json!({"items": ["a", "b", "c"]})), &mut extra)
        .unwrap();
    let mut doc = Document::new();
    let body = doc.body();
    mount(&mut doc, body, &mut old, &mut NoopModules);
    let old_elms: Vec<_> = match &old {
        VNode::Element(ul) => ul.children.iter().map(|c| c.elm().unwrap()).collect(),
        _ => panic!("expected element"),
    };

    let mut extra = RenderExtra::default();
    let mut new = qweb
        .render("t", &ctx(json!({"items": ["c", "a", "b"]})), &mut extra)
        .unwrap();
    patch(&mut doc, &old, &mut new, &mut NoopModules);
    assert_eq!(doc.inner_html(body), "<ul><li>c</li><li>a</li><li>b</li></ul>");
    match &new {
        VNode::Element(ul) => {
            assert_eq!(ul.children[0].elm(), Some(old_elms[2]));
            assert_eq!(ul.children[1].elm(), Some(old_elms[0]));
            assert_eq!(ul.children[2].elm(), Some(old_elms[1]));
        }
        _ => panic!("expected element"),
    }
}

#[test]
fn patch_with_identical_render_is_a_dom_noop() {
    let mut qweb = QWeb::new();
    qweb.add_template("t", r#"<div><span t-esc="x"/></div>"#).unwrap();
    let context = ctx(json!({"x": "same"}));

    let mut extra = RenderExtra::default();
    let mut old = qweb.render("t", &context, &mut extra).unwrap();
    let mut doc = Document::new();
    let body = doc.body();
    mount(&mut doc, body, &mut old, &mut NoopModules);
    let before = doc.inner_html(body);

    let mut extra = RenderExtra::default();
    let mut new = qweb.render("t", &context, &mut extra).unwrap();
    patch(&mut doc, &old, &mut new, &mut NoopModules);
    assert_eq!(doc.inner_html(body), before);
    assert_eq!(new.elm(), old.elm());
}

#[test]
fn word_operators_in_conditions() {
    let mut qweb = QWeb::new();
    qweb.add_template(
        "t",
        r#"<div><t t-if="a gt 1 and b lt 5">in</t><t t-else="">out</t></div>"#,
    )
    .unwrap();
    assert_eq!(render_html(&qweb, "t", &ctx(json!({"a": 2, "b": 3}))), "<div>in</div>");
    assert_eq!(render_html(&qweb, "t", &ctx(json!({"a": 0, "b": 3}))), "<div>out</div>");
}

#[test]
fn pre_preserves_whitespace_and_text_collapses_elsewhere() {
    let mut qweb = QWeb::new();
    qweb.add_template("pre", "<pre>  a\n  b</pre>").unwrap();
    qweb.add_template("div", "<div>\n  <span>x   y</span>\n</div>").unwrap();
    assert_eq!(render_html(&qweb, "pre", &Value::Null), "<pre>  a\n  b</pre>");
    assert_eq!(render_html(&qweb, "div", &Value::Null), "<div><span>x y</span></div>");
}

#[test]
fn compilation_is_deterministic_across_instances() {
    let source = r#"<div><t t-foreach="items" t-as="i"><span t-key="i" t-esc="i"/></t></div>"#;
    let mut a = QWeb::new();
    a.add_template("t", source).unwrap();
    let mut b = QWeb::new();
    b.add_template("t", source).unwrap();
    assert_eq!(
        a.template("t").unwrap().program,
        b.template("t").unwrap().program
    );
}

#[test]
fn template_artifacts_are_immutable_after_registration() {
    let mut qweb = QWeb::new();
    qweb.add_template("t", r#"<div t-esc="x"/>"#).unwrap();
    let before = qweb.template("t").unwrap().program.clone();
    // a failing registration leaves existing artifacts untouched
    assert!(qweb.add_template("t", "<div/>").is_err());
    assert_eq!(qweb.template("t").unwrap().program, before);
}
