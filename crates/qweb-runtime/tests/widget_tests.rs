//! Widget lifecycle scenarios: mount protocol, state update coalescing,
//! conditional sub-widgets, refs, event dispatch and destruction.

use qweb_runtime::{
    App, Env, HookResult, QWeb, Value, Widget, WidgetCtx, WidgetId, WidgetRef,
};
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

type Log = Rc<RefCell<Vec<String>>>;

fn record(log: &Log, entry: impl Into<String>) {
    log.borrow_mut().push(entry.into());
}

fn counter_env() -> Env {
    let mut qweb = QWeb::new();
    qweb.add_template(
        "counter",
        r#"<div><t t-esc="state.counter"/><button t-on-click="inc">Inc</button></div>"#,
    )
    .unwrap();
    Env::new(qweb)
}

struct Counter;

impl Widget for Counter {
    fn template(&self) -> &str {
        "counter"
    }

    fn initial_state(&self) -> Value {
        Value::from(json!({"counter": 0}))
    }

    fn has_handler(&self, name: &str) -> bool {
        name == "inc"
    }

    fn handle_event(&mut self, name: &str, _args: &[Value], ctx: &mut WidgetCtx<'_>) -> HookResult {
        if name == "inc" {
            let counter = ctx.state().member("counter");
            ctx.update_state(Value::map([("counter", counter.add(&Value::Int(1)))]));
        }
        Ok(())
    }
}

fn find_button(app: &App, root: WidgetId) -> qweb_dom::NodeId {
    let el = app.el(root).unwrap();
    app.doc
        .children(el)
        .iter()
        .copied()
        .find(|&n| app.doc.tag(n) == Some("button"))
        .expect("button")
}

#[test]
fn counter_mount_click_flush() {
    let mut app = App::new(counter_env());
    let id = app.create_widget(Box::new(Counter));
    let body = app.doc.body();
    app.mount(id, body).unwrap();
    assert_eq!(app.html(id).unwrap(), "<div>0<button>Inc</button></div>");
    assert!(app.is_mounted(id));

    let button = find_button(&app, id);
    app.dispatch(button, "click").unwrap();
    // the render is scheduled, not applied yet
    assert_eq!(app.html(id).unwrap(), "<div>0<button>Inc</button></div>");
    app.flush().unwrap();
    assert_eq!(app.html(id).unwrap(), "<div>1<button>Inc</button></div>");
}

#[test]
fn update_state_coalesces_per_flush() {
    struct Counting {
        renders: Rc<RefCell<u32>>,
    }
    impl Widget for Counting {
        fn template(&self) -> &str {
            "counter"
        }
        fn initial_state(&self) -> Value {
            Value::from(json!({"counter": 0}))
        }
        fn has_handler(&self, name: &str) -> bool {
            name == "inc"
        }
        fn patched(&mut self, _ctx: &mut WidgetCtx<'_>) -> HookResult {
            *self.renders.borrow_mut() += 1;
            Ok(())
        }
    }

    let renders = Rc::new(RefCell::new(0));
    let mut app = App::new(counter_env());
    let id = app.create_widget(Box::new(Counting {
        renders: renders.clone(),
    }));
    let body = app.doc.body();
    app.mount(id, body).unwrap();

    app.update_state(id, Value::from(json!({"counter": 1})));
    app.update_state(id, Value::from(json!({"counter": 2})));
    app.update_state(id, Value::from(json!({"counter": 3})));
    app.flush().unwrap();
    // three updates in one microtask boundary coalesce into one render
    // that observes the merged state
    assert_eq!(*renders.borrow(), 1);
    assert_eq!(app.html(id).unwrap(), "<div>3<button>Inc</button></div>");

    app.update_state(id, Value::from(json!({"counter": 4})));
    app.flush().unwrap();
    assert_eq!(*renders.borrow(), 2);
}

#[test]
fn update_state_before_first_render_only_merges() {
    let mut app = App::new(counter_env());
    let id = app.create_widget(Box::new(Counter));
    app.update_state(id, Value::from(json!({"counter": 7})));
    app.flush().unwrap();

    let body = app.doc.body();
    app.mount(id, body).unwrap();
    // the mount render observes the merged state; no extra render ran
    assert_eq!(app.html(id).unwrap(), "<div>7<button>Inc</button></div>");
}

fn hook_env() -> Env {
    let mut qweb = QWeb::new();
    qweb.load_templates(
        r#"<templates>
            <t t-name="parent"><div><t t-widget="'child'"/></div></t>
            <t t-name="cond-parent"><div><t t-if="state.ok"><t t-widget="'child'"/></t></div></t>
            <t t-name="child"><span>child</span></t>
        </templates>"#,
    )
    .unwrap();
    Env::new(qweb)
}

struct Logging {
    template: &'static str,
    log: Log,
}

impl Widget for Logging {
    fn template(&self) -> &str {
        self.template
    }
    fn initial_state(&self) -> Value {
        Value::from(json!({"ok": false}))
    }
    fn will_start(&mut self, _ctx: &mut WidgetCtx<'_>) -> HookResult {
        record(&self.log, format!("{}:willStart", self.template));
        Ok(())
    }
    fn mounted(&mut self, _ctx: &mut WidgetCtx<'_>) -> HookResult {
        record(&self.log, format!("{}:mounted", self.template));
        Ok(())
    }
    fn will_unmount(&mut self, _ctx: &mut WidgetCtx<'_>) -> HookResult {
        record(&self.log, format!("{}:willUnmount", self.template));
        Ok(())
    }
}

#[test]
fn child_hooks_fire_in_order_on_mount() {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let mut env = hook_env();
    let child_log = log.clone();
    env.register_widget("child", move || {
        Box::new(Logging {
            template: "child",
            log: child_log.clone(),
        })
    });

    let mut app = App::new(env);
    let id = app.create_widget(Box::new(Logging {
        template: "parent",
        log: log.clone(),
    }));
    let body = app.doc.body();
    app.mount(id, body).unwrap();

    assert_eq!(app.html(id).unwrap(), "<div><span>child</span></div>");
    // willStart everywhere before any mounted; children mounted before the
    // parent's mounted resolves
    assert_eq!(
        *log.borrow(),
        vec![
            "parent:willStart",
            "child:willStart",
            "child:mounted",
            "parent:mounted",
        ]
    );
}

#[test]
fn conditional_child_receives_will_start_then_mounted_once() {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let mut env = hook_env();
    let child_log = log.clone();
    env.register_widget("child", move || {
        Box::new(Logging {
            template: "child",
            log: child_log.clone(),
        })
    });

    let mut app = App::new(env);
    let id = app.create_widget(Box::new(Logging {
        template: "cond-parent",
        log: log.clone(),
    }));
    let body = app.doc.body();
    app.mount(id, body).unwrap();
    assert_eq!(app.html(id).unwrap(), "<div></div>");
    // the child branch is dead: zero child hooks so far
    assert_eq!(log.borrow().iter().filter(|e| e.starts_with("child")).count(), 0);

    app.update_state(id, Value::from(json!({"ok": true})));
    app.flush().unwrap();
    assert_eq!(app.html(id).unwrap(), "<div><span>child</span></div>");
    let child_events: Vec<String> = log
        .borrow()
        .iter()
        .filter(|e| e.starts_with("child"))
        .cloned()
        .collect();
    assert_eq!(child_events, vec!["child:willStart", "child:mounted"]);

    // flipping back destroys the child
    app.update_state(id, Value::from(json!({"ok": false})));
    app.flush().unwrap();
    assert_eq!(app.html(id).unwrap(), "<div></div>");
    let child_events: Vec<String> = log
        .borrow()
        .iter()
        .filter(|e| e.starts_with("child"))
        .cloned()
        .collect();
    assert_eq!(
        child_events,
        vec!["child:willStart", "child:mounted", "child:willUnmount"]
    );
}

#[test]
fn late_child_mounted_during_parent_mounted() {
    struct LateParent {
        log: Log,
    }
    impl Widget for LateParent {
        fn template(&self) -> &str {
            "parent-late"
        }
        fn mounted(&mut self, ctx: &mut WidgetCtx<'_>) -> HookResult {
            record(&self.log, "parent:mounted");
            // instantiate and mount a new child from inside mounted; the
            // in-progress mount pass must not pick it up
            let log = self.log.clone();
            let child = ctx.app.create_child(
                ctx.id,
                Box::new(Logging {
                    template: "child",
                    log,
                }),
            );
            let target = ctx.el().unwrap();
            ctx.app.mount(child, target).unwrap();
            Ok(())
        }
    }

    let mut qweb = QWeb::new();
    qweb.add_template("parent-late", r#"<div>late</div>"#).unwrap();
    qweb.add_template("child", r#"<span>child</span>"#).unwrap();
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let mut app = App::new(Env::new(qweb));
    let id = app.create_widget(Box::new(LateParent { log: log.clone() }));
    let body = app.doc.body();
    app.mount(id, body).unwrap();

    // the parent's mounted ran once and precedes the late child's hooks
    assert_eq!(
        *log.borrow(),
        vec!["parent:mounted", "child:willStart", "child:mounted"]
    );
    assert_eq!(app.html(id).unwrap(), "<div>late<span>child</span></div>");
}

#[test]
fn mount_into_detached_target_defers_mounted() {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let mut qweb = QWeb::new();
    qweb.add_template("child", r#"<span>child</span>"#).unwrap();
    let mut app = App::new(Env::new(qweb));
    let id = app.create_widget(Box::new(Logging {
        template: "child",
        log: log.clone(),
    }));

    let detached = app.doc.create_element("div");
    app.mount(id, detached).unwrap();
    assert_eq!(*log.borrow(), vec!["child:willStart"]);
    assert!(!app.is_mounted(id));

    // attaching the target later completes the mount
    let body = app.doc.body();
    app.doc.append_child(body, detached);
    app.notify_inserted(id).unwrap();
    assert!(app.is_mounted(id));
    assert_eq!(*log.borrow(), vec!["child:willStart", "child:mounted"]);
}

#[test]
fn destroy_is_recursive_and_idempotent() {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let mut env = hook_env();
    let child_log = log.clone();
    env.register_widget("child", move || {
        Box::new(Logging {
            template: "child",
            log: child_log.clone(),
        })
    });

    let mut app = App::new(env);
    let id = app.create_widget(Box::new(Logging {
        template: "parent",
        log: log.clone(),
    }));
    let body = app.doc.body();
    app.mount(id, body).unwrap();
    assert_eq!(app.doc.inner_html(body), "<div><span>child</span></div>");

    app.destroy(id);
    assert_eq!(app.doc.inner_html(body), "");
    assert!(app.is_destroyed(id));
    assert!(app.el(id).is_none());
    let unmounts = log
        .borrow()
        .iter()
        .filter(|e| e.ends_with("willUnmount"))
        .count();
    assert_eq!(unmounts, 2);

    // second destroy is a no-op
    app.destroy(id);
    let unmounts_after = log
        .borrow()
        .iter()
        .filter(|e| e.ends_with("willUnmount"))
        .count();
    assert_eq!(unmounts_after, 2);
}

#[test]
fn destroy_cancels_pending_render() {
    struct Exploding;
    impl Widget for Exploding {
        fn template(&self) -> &str {
            "counter"
        }
        fn initial_state(&self) -> Value {
            Value::from(json!({"counter": 0}))
        }
        fn has_handler(&self, name: &str) -> bool {
            name == "inc"
        }
        fn will_patch(&mut self, _ctx: &mut WidgetCtx<'_>) -> HookResult {
            panic!("a destroyed widget must not re-render");
        }
    }

    let mut app = App::new(counter_env());
    let id = app.create_widget(Box::new(Exploding));
    let body = app.doc.body();
    app.mount(id, body).unwrap();

    app.update_state(id, Value::from(json!({"counter": 1})));
    app.destroy(id);
    // the queued render observes the destroyed flag and becomes a no-op
    app.flush().unwrap();
    assert_eq!(app.doc.inner_html(body), "");
}

#[test]
fn refs_bind_nodes_and_child_widgets() {
    let mut qweb = QWeb::new();
    qweb.load_templates(
        r#"<templates>
            <t t-name="holder"><div><span t-ref="'label'">x</span><t t-widget="'child'" t-ref="'kid'"/></div></t>
            <t t-name="child"><span>child</span></t>
        </templates>"#,
    )
    .unwrap();
    let mut env = Env::new(qweb);
    env.register_widget("child", || {
        Box::new(SimpleChild)
    });

    struct Holder;
    impl Widget for Holder {
        fn template(&self) -> &str {
            "holder"
        }
    }
    struct SimpleChild;
    impl Widget for SimpleChild {
        fn template(&self) -> &str {
            "child"
        }
    }

    let mut app = App::new(env);
    let id = app.create_widget(Box::new(Holder));
    let body = app.doc.body();
    app.mount(id, body).unwrap();

    match app.widget_ref(id, "label") {
        Some(WidgetRef::Node(node)) => assert_eq!(app.doc.tag(node), Some("span")),
        other => panic!("unexpected ref {:?}", other),
    }
    match app.widget_ref(id, "kid") {
        Some(WidgetRef::Widget(child)) => {
            assert_eq!(app.parent(child), Some(id));
            assert!(app.is_mounted(child));
        }
        other => panic!("unexpected ref {:?}", other),
    }

    // refs are cleared on destroy
    app.destroy(id);
    assert!(app.widget_ref(id, "label").is_none());
}

#[test]
fn lifecycle_errors_propagate() {
    struct Failing;
    impl Widget for Failing {
        fn template(&self) -> &str {
            "counter"
        }
        fn initial_state(&self) -> Value {
            Value::from(json!({"counter": 0}))
        }
        fn will_start(&mut self, _ctx: &mut WidgetCtx<'_>) -> HookResult {
            Err(qweb_runtime::LifecycleError::new("nope"))
        }
        fn has_handler(&self, name: &str) -> bool {
            name == "inc"
        }
    }

    let mut app = App::new(counter_env());
    let id = app.create_widget(Box::new(Failing));
    let body = app.doc.body();
    let err = app.mount(id, body).unwrap_err();
    assert!(err.to_string().contains("willStart"));
    assert!(err.to_string().contains("nope"));
}

#[test]
fn event_modifier_stop_ends_propagation() {
    let mut qweb = QWeb::new();
    qweb.add_template(
        "nested",
        r#"<div t-on-click="outer"><button t-on-click.stop="inner">x</button></div>"#,
    )
    .unwrap();

    struct Nested {
        log: Log,
    }
    impl Widget for Nested {
        fn template(&self) -> &str {
            "nested"
        }
        fn has_handler(&self, name: &str) -> bool {
            matches!(name, "inner" | "outer")
        }
        fn handle_event(&mut self, name: &str, _args: &[Value], _ctx: &mut WidgetCtx<'_>) -> HookResult {
            record(&self.log, name);
            Ok(())
        }
    }

    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let mut app = App::new(Env::new(qweb));
    let id = app.create_widget(Box::new(Nested { log: log.clone() }));
    let body = app.doc.body();
    app.mount(id, body).unwrap();

    let button = find_button(&app, id);
    app.dispatch(button, "click").unwrap();
    // .stop keeps the event from bubbling to the outer handler
    assert_eq!(*log.borrow(), vec!["inner"]);

    let root = app.el(id).unwrap();
    app.dispatch(root, "click").unwrap();
    assert_eq!(*log.borrow(), vec!["inner", "outer"]);
}

#[test]
fn handler_with_arguments() {
    let mut qweb = QWeb::new();
    qweb.add_template(
        "args",
        r#"<button t-on-click="add(5, state.step)">x</button>"#,
    )
    .unwrap();

    struct Args {
        seen: Rc<RefCell<Vec<Value>>>,
    }
    impl Widget for Args {
        fn template(&self) -> &str {
            "args"
        }
        fn initial_state(&self) -> Value {
            Value::from(json!({"step": 2}))
        }
        fn has_handler(&self, name: &str) -> bool {
            name == "add"
        }
        fn handle_event(&mut self, _name: &str, args: &[Value], _ctx: &mut WidgetCtx<'_>) -> HookResult {
            self.seen.borrow_mut().extend(args.iter().cloned());
            Ok(())
        }
    }

    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut app = App::new(Env::new(qweb));
    let id = app.create_widget(Box::new(Args { seen: seen.clone() }));
    let body = app.doc.body();
    app.mount(id, body).unwrap();

    let root = app.el(id).unwrap();
    app.dispatch(root, "click").unwrap();
    assert_eq!(*seen.borrow(), vec![Value::Int(5), Value::Int(2)]);
}

#[test]
fn child_widget_updates_with_parent_renders() {
    let mut qweb = QWeb::new();
    qweb.load_templates(
        r#"<templates>
            <t t-name="wrap"><div t-att-data-n="state.n"><t t-widget="'kid'"/></div></t>
            <t t-name="kid"><span>kid</span></t>
        </templates>"#,
    )
    .unwrap();
    let mut env = Env::new(qweb);

    struct Wrap;
    impl Widget for Wrap {
        fn template(&self) -> &str {
            "wrap"
        }
        fn initial_state(&self) -> Value {
            Value::from(json!({"n": 1}))
        }
    }
    struct Kid;
    impl Widget for Kid {
        fn template(&self) -> &str {
            "kid"
        }
    }
    env.register_widget("kid", || Box::new(Kid));

    let mut app = App::new(env);
    let id = app.create_widget(Box::new(Wrap));
    let body = app.doc.body();
    app.mount(id, body).unwrap();
    assert_eq!(
        app.html(id).unwrap(),
        r#"<div data-n="1"><span>kid</span></div>"#
    );
    let kid = app.children(id)[0];
    let kid_el = app.el(kid).unwrap();

    app.update_state(id, Value::from(json!({"n": 2})));
    app.flush().unwrap();
    // the child instance and its node survive the parent's re-render
    assert_eq!(
        app.html(id).unwrap(),
        r#"<div data-n="2"><span>kid</span></div>"#
    );
    assert_eq!(app.children(id), &[kid]);
    assert_eq!(app.el(kid), Some(kid_el));
    assert!(!app.is_destroyed(kid));
}
