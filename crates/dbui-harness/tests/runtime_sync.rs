#![forbid(unsafe_code)]

//! The runtime driven end to end: background writers, frame pacing, runtime
//! text entry and fixture trees.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use dbui_core::{Choice, Color, Widget, props};
use dbui_harness::{
    HeadlessToolkit, Input, NodeId, TITLE_ATTR, TRACES_ATTR, names, register_fixtures, widget,
};
use dbui_runtime::{
    AlarmSeverity, Lifecycle, RepresentationError, RuntimeConfig, Session, alarm_props,
};

fn session() -> (Arc<HeadlessToolkit>, Session<HeadlessToolkit>, NodeId) {
    let tk = HeadlessToolkit::new();
    let session = Session::new(Arc::clone(&tk), RuntimeConfig::default());
    register_fixtures(session.host());
    let root = tk.create("root");
    (tk, session, root)
}

fn node_of(session: &Session<HeadlessToolkit>, widget: &Widget) -> NodeId {
    session
        .host()
        .representation(widget.id())
        .and_then(|cell| cell.node())
        .unwrap()
}

fn text(widget: &Widget) -> dbui_core::Property<String> {
    widget.property::<String>(names::TEXT).unwrap()
}

#[test]
fn thousand_background_sets_settle_within_a_few_frames() {
    let (tk, session, root) = session();
    let model = widget("display", "display").unwrap();
    let label = widget("label", "status").unwrap();
    model.add_child(label.clone()).unwrap();
    session.represent(&root, &model).unwrap();
    let node = node_of(&session, &label);

    let value = text(&label);
    let writer = thread::spawn(move || {
        for i in 0..1000 {
            value.set(format!("v{i}")).unwrap();
        }
    });
    let report = tk.run_frames(Duration::from_millis(16), 500, || {
        writer.is_finished() && tk.text(node) == "v999"
    });
    writer.join().unwrap();
    tk.pump();

    let stats = session.scheduler().stats();
    assert!(report.settled, "{report:?}");
    assert_eq!(tk.text(node), "v999");
    assert!(stats.requests >= 1000);
    assert!(stats.passes < 1000, "{stats:?}");
    assert_eq!(stats.failures, 0);
    assert_eq!(tk.late_mutations(), 0);
}

#[test]
fn model_updates_wait_while_the_user_types() {
    let (tk, session, root) = session();
    let model = widget("display", "display").unwrap();
    let entry = widget("text_entry", "setpoint").unwrap();
    text(&entry).set("1.0".into()).unwrap();
    model.add_child(entry.clone()).unwrap();
    session.represent(&root, &model).unwrap();
    let node = node_of(&session, &entry);
    assert_eq!(tk.text(node), "1.0");

    tk.type_text(node, "2.5").unwrap();
    let remote = text(&entry);
    thread::spawn(move || remote.set("3.0".into()).unwrap())
        .join()
        .unwrap();
    tk.pump();
    assert_eq!(tk.text(node), "2.5");

    tk.deliver(node, &Input::Cancel).unwrap();
    tk.pump();
    assert_eq!(tk.text(node), "3.0");
    assert_eq!(text(&entry).get(), "3.0");
}

#[test]
fn confirming_an_entry_writes_the_model() {
    let (tk, session, root) = session();
    let model = widget("display", "display").unwrap();
    let entry = widget("text_entry", "setpoint").unwrap();
    model.add_child(entry.clone()).unwrap();
    session.represent(&root, &model).unwrap();
    let node = node_of(&session, &entry);

    tk.type_text(node, "4.2").unwrap();
    tk.deliver(node, &Input::Confirm).unwrap();
    assert_eq!(text(&entry).get(), "4.2");
    tk.pump();
    assert_eq!(tk.text(node), "4.2");

    text(&entry).set("5".into()).unwrap();
    tk.pump();
    assert_eq!(tk.text(node), "5");
}

#[test]
fn a_broken_widget_does_not_stop_its_siblings() {
    let (tk, session, root) = session();
    let model = widget("display", "display").unwrap();
    let a = widget("label", "a").unwrap();
    text(&a).set("A".into()).unwrap();
    let broken = widget("failing", "broken").unwrap();
    let group = widget("group", "group").unwrap();
    let b = widget("label", "b").unwrap();
    text(&b).set("B".into()).unwrap();
    group.add_child(b.clone()).unwrap();
    model.add_child(a).unwrap();
    model.add_child(broken.clone()).unwrap();
    model.add_child(group).unwrap();

    let report = session.represent(&root, &model).unwrap();
    assert_eq!(report.represented, 3);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].widget, broken.id());
    assert!(matches!(report.failures[0].error, RepresentationError::Failed(_)));
    assert!(!session.host().is_represented(&broken));

    assert_eq!(
        tk.snapshot(root),
        "root\n  label \"A\" @0,0 100x20\n  group @0,0 300x200\n    label \"B\" @0,0 100x20\n"
    );

    text(&b).set("B2".into()).unwrap();
    b.property::<bool>(props::VISIBLE).unwrap().set(false).unwrap();
    tk.pump();
    assert_eq!(
        tk.snapshot(root),
        "root\n  label \"A\" @0,0 100x20\n  group @0,0 300x200\n    label \"B2\" @0,0 100x20 hidden\n"
    );
}

#[test]
fn children_follow_the_model() {
    let (tk, session, root) = session();
    let model = widget("display", "display").unwrap();
    let first = widget("label", "first").unwrap();
    model.add_child(first.clone()).unwrap();
    session.represent(&root, &model).unwrap();

    let second = widget("label", "second").unwrap();
    text(&second).set("second".into()).unwrap();
    model.insert_child(0, second.clone()).unwrap();
    tk.pump();
    assert_eq!(tk.children(root).len(), 2);
    assert_eq!(tk.text(tk.children(root)[0]), "second");

    let cell = session.host().representation(first.id()).unwrap();
    let first_node = cell.node().unwrap();
    model.remove_child(&first).unwrap();
    tk.pump();
    assert_eq!(cell.lifecycle(), Lifecycle::Disposed);
    assert!(tk.is_removed(first_node));
    assert!(!session.host().is_represented(&first));

    text(&first).set("late".into()).unwrap();
    tk.pump();
    assert_eq!(tk.late_mutations(), 0);
    assert_eq!(tk.children(root), vec![node_of(&session, &second)]);
}

#[test]
fn alarm_border_tracks_severity() {
    let (tk, session, root) = session();
    let model = widget("display", "display").unwrap();
    let label = widget("label", "pv").unwrap();
    model.add_child(label.clone()).unwrap();
    session.represent(&root, &model).unwrap();
    let node = node_of(&session, &label);
    assert_eq!(tk.border(node), None);

    let severity = label.property::<Choice>(alarm_props::ALARM_SEVERITY).unwrap();
    assert!(severity.set(AlarmSeverity::Major.to_choice()).is_err());
    severity.set_unchecked(AlarmSeverity::Major.to_choice()).unwrap();
    tk.pump();
    assert_eq!(tk.border(node), Some(Color::rgb(255, 0, 0)));

    label
        .property::<bool>(alarm_props::BORDER_ALARM_SENSITIVE)
        .unwrap()
        .set(false)
        .unwrap();
    tk.pump();
    assert_eq!(tk.border(node), None);
}

#[test]
fn plot_shows_title_and_trace_count() {
    let (tk, session, root) = session();
    let model = widget("display", "display").unwrap();
    let plot = widget("xyplot", "plot").unwrap();
    model.add_child(plot.clone()).unwrap();
    session.represent(&root, &model).unwrap();
    let node = node_of(&session, &plot);
    assert_eq!(tk.attr(node, TRACES_ATTR).as_deref(), Some("1"));

    let traces = plot.array::<String>(names::TRACES).unwrap();
    traces.push("second".into()).unwrap();
    plot.property::<String>(names::TITLE)
        .unwrap()
        .set("Beam".into())
        .unwrap();
    tk.pump();
    assert_eq!(tk.attr(node, TRACES_ATTR).as_deref(), Some("2"));
    assert_eq!(tk.attr(node, TITLE_ATTR).as_deref(), Some("Beam"));
}

#[test]
fn shutdown_disposes_every_representation() {
    let (tk, session, root) = session();
    let model = widget("display", "display").unwrap();
    let label = widget("label", "l").unwrap();
    model.add_child(label.clone()).unwrap();
    session.represent(&root, &model).unwrap();
    let node = node_of(&session, &label);

    session.shutdown();
    assert!(session.is_closed());
    assert!(tk.is_removed(node));
    text(&label).set("after".into()).unwrap();
    tk.pump();
    assert_eq!(tk.late_mutations(), 0);
    assert_eq!(label.property::<String>(props::NAME).unwrap().get(), "l");
}
