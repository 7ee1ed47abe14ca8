#![forbid(unsafe_code)]

//! Property-panel gestures against headless controls, with the runtime
//! following the edited model.

use std::sync::Arc;
use std::thread;

use dbui_core::sync::lock;
use dbui_core::{PropertyKind, Widget, props};
use dbui_editor::{
    ArraySizeBinding, EditorError, EditorRegistry, EditorRequest, HistoryConfig, PropertyBinding,
    PropertyEditor, SharedUndo, UndoManager,
};
use dbui_harness::{
    HeadlessSpinner, HeadlessTextField, HeadlessToolkit, NodeId, names, register_fixtures, widget,
};
use dbui_runtime::{EditState, RuntimeConfig, Session, UiExecutor};

struct Panel {
    tk: Arc<HeadlessToolkit>,
    undo: SharedUndo,
    executor: Arc<dyn UiExecutor>,
}

impl Panel {
    fn new() -> Self {
        let tk = HeadlessToolkit::new();
        let executor: Arc<dyn UiExecutor> = Arc::clone(&tk) as Arc<dyn UiExecutor>;
        Self {
            tk,
            undo: UndoManager::shared(HistoryConfig::default()),
            executor,
        }
    }

    fn text_binding(
        &self,
        widget: &Widget,
    ) -> (PropertyBinding<String, HeadlessTextField>, HeadlessTextField) {
        let field = HeadlessTextField::new(&self.tk);
        let binding = PropertyBinding::new(
            widget,
            widget.property::<String>(names::TEXT).unwrap(),
            field.clone(),
            Arc::clone(&self.undo),
            Arc::clone(&self.executor),
        );
        binding.bind();
        (binding, field)
    }
}

fn traces(widget: &Widget) -> usize {
    widget.array::<String>(names::TRACES).unwrap().len()
}

#[test]
fn spinner_resizes_every_selected_plot_in_one_step() {
    let panel = Panel::new();
    let a = widget("xyplot", "a").unwrap();
    let b = widget("xyplot", "b").unwrap();
    for plot in [&a, &b] {
        plot.array::<String>(names::TRACES).unwrap().push_default().unwrap();
    }
    let spinner = HeadlessSpinner::new(&panel.tk);
    let binding = ArraySizeBinding::new(
        &a,
        a.require(names::TRACES).unwrap(),
        spinner.clone(),
        Arc::clone(&panel.undo),
        Arc::clone(&panel.executor),
    )
    .unwrap()
    .with_siblings(vec![b.clone()]);
    binding.bind();
    assert_eq!(spinner.text(), "2");

    binding.begin_edit().unwrap();
    spinner.set_count(5);
    assert!(binding.commit().unwrap());
    assert_eq!((traces(&a), traces(&b)), (5, 5));
    assert_eq!(lock(&panel.undo).undo_depth(), 1);
    assert_eq!(
        lock(&panel.undo).undo_description().as_deref(),
        Some("Resize traces")
    );

    assert!(lock(&panel.undo).undo().unwrap());
    panel.tk.pump();
    assert_eq!((traces(&a), traces(&b)), (2, 2));
    assert_eq!(spinner.text(), "2");

    assert!(lock(&panel.undo).redo().unwrap());
    assert_eq!((traces(&a), traces(&b)), (5, 5));
    assert_eq!(spinner.text(), "5");
}

#[test]
fn spinner_refuses_to_drop_below_the_minimum() {
    let panel = Panel::new();
    let plot = widget("xyplot", "p").unwrap();
    let spinner = HeadlessSpinner::new(&panel.tk);
    let binding = ArraySizeBinding::new(
        &plot,
        plot.require(names::TRACES).unwrap(),
        spinner.clone(),
        Arc::clone(&panel.undo),
        Arc::clone(&panel.executor),
    )
    .unwrap();
    binding.bind();

    binding.begin_edit().unwrap();
    spinner.set_count(0);
    assert!(binding.commit().is_err());
    assert_eq!(traces(&plot), 1);
    assert_eq!(spinner.text(), "1");
    assert_eq!(binding.state(), EditState::Idle);
    assert!(!lock(&panel.undo).can_undo());
}

#[test]
fn escape_restores_the_model_value() {
    let panel = Panel::new();
    let label = widget("label", "a").unwrap();
    label.property::<String>(names::TEXT).unwrap().set("A".into()).unwrap();
    let (binding, field) = panel.text_binding(&label);
    assert_eq!(field.text(), "A");

    binding.begin_edit().unwrap();
    field.type_text("typed");
    assert!(binding.cancel().unwrap());
    assert_eq!(field.text(), "A");
    assert_eq!(label.property::<String>(names::TEXT).unwrap().get(), "A");
    assert!(!lock(&panel.undo).can_undo());
}

#[test]
fn background_changes_wait_for_the_edit_to_finish() {
    let panel = Panel::new();
    let label = widget("label", "a").unwrap();
    let (binding, field) = panel.text_binding(&label);

    binding.begin_edit().unwrap();
    field.type_text("mine");
    let remote = label.property::<String>(names::TEXT).unwrap();
    thread::spawn(move || remote.set("theirs".into()).unwrap())
        .join()
        .unwrap();
    panel.tk.pump();
    assert_eq!(field.text(), "mine");

    assert!(binding.commit().unwrap());
    assert_eq!(label.property::<String>(names::TEXT).unwrap().get(), "mine");
    assert_eq!(field.text(), "mine");

    assert!(lock(&panel.undo).undo().unwrap());
    assert_eq!(field.text(), "theirs");
}

#[test]
fn commit_reaches_siblings_and_their_nodes() {
    let panel = Panel::new();
    let session = Session::new(Arc::clone(&panel.tk), RuntimeConfig::default());
    register_fixtures(session.host());
    let root = panel.tk.create("root");
    let model = widget("display", "display").unwrap();
    let a = widget("label", "a").unwrap();
    let b = widget("label", "b").unwrap();
    let plot = widget("xyplot", "plot").unwrap();
    model.add_child(a.clone()).unwrap();
    model.add_child(b.clone()).unwrap();
    model.add_child(plot.clone()).unwrap();
    session.represent(&root, &model).unwrap();
    let node = |w: &Widget| -> NodeId {
        session
            .host()
            .representation(w.id())
            .and_then(|cell| cell.node())
            .unwrap()
    };

    let (binding, field) = panel.text_binding(&a);
    binding.set_siblings(vec![b.clone(), plot.clone()]);
    binding.begin_edit().unwrap();
    field.type_text("shared");
    assert!(binding.commit().unwrap());
    panel.tk.pump();
    assert_eq!(panel.tk.text(node(&a)), "shared");
    assert_eq!(panel.tk.text(node(&b)), "shared");
    assert!(!plot.has_property(names::TEXT));

    assert!(lock(&panel.undo).undo().unwrap());
    panel.tk.pump();
    assert_eq!(panel.tk.text(node(&a)), "");
    assert_eq!(panel.tk.text(node(&b)), "");
    assert_eq!(panel.tk.late_mutations(), 0);
}

#[test]
fn registry_builds_editors_per_kind() {
    let panel = Panel::new();
    let text_tk = Arc::clone(&panel.tk);
    let array_tk = Arc::clone(&panel.tk);
    let registry = EditorRegistry::new()
        .with(PropertyKind::Text, move |request| {
            let binding = PropertyBinding::<String, _>::from_request(
                request,
                HeadlessTextField::new(&text_tk),
            )?;
            let editor: Box<dyn PropertyEditor> = Box::new(binding);
            Ok(editor)
        })
        .with(PropertyKind::Array, move |request| {
            let editor: Box<dyn PropertyEditor> = Box::new(ArraySizeBinding::from_request(
                request,
                HeadlessSpinner::new(&array_tk),
            )?);
            Ok(editor)
        });
    let plot = widget("xyplot", "plot").unwrap();
    let request = |name: &str| {
        EditorRequest::new(&plot, name, Arc::clone(&panel.undo), Arc::clone(&panel.executor))
            .unwrap()
    };

    let title = registry.create_editor(&request(names::TITLE)).unwrap().unwrap();
    assert_eq!(title.property_name(), names::TITLE);
    let traces_editor = registry.create_editor(&request(names::TRACES)).unwrap().unwrap();
    assert_eq!(traces_editor.state(), EditState::Idle);
    assert!(registry.create_editor(&request(props::TYPE)).is_none());
    assert!(registry.create_editor(&request(props::WIDTH)).is_none());

    assert!(matches!(
        EditorRequest::new(&plot, "missing", Arc::clone(&panel.undo), Arc::clone(&panel.executor)),
        Err(dbui_core::ModelError::UnknownProperty { .. })
    ));
    let wrong: Result<PropertyBinding<i64, HeadlessSpinner>, EditorError> =
        PropertyBinding::from_request(&request(names::TITLE), HeadlessSpinner::new(&panel.tk));
    assert!(wrong.is_err());
}
