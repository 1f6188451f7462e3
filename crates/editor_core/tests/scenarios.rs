use editor_core::{Action, LabelAction, LabelChange, Session};
use shared::{
    domain::{Group, GroupId, Label, LabelIndex, ViewMode},
    error::{IngestError, StoreError},
    protocol::TransFile,
};

fn grouped_session() -> Session {
    let mut session = Session::new_document(ViewMode::Flat);
    session.add_group(Group::new("A", "FF0000")).expect("group A");
    session.add_group(Group::new("B", "0000FF")).expect("group B");
    session.add_picture("p1.png").expect("picture");
    session.show_picture("p1.png").expect("show");
    session
        .submit(LabelAction::add("p1.png", Label::new(0, 0, "hi")))
        .expect("label 0");
    session
        .submit(LabelAction::add("p1.png", Label::new(1, 1, "yo")))
        .expect("label 1");
    session
}

fn assert_invariants(session: &Session) {
    assert!(session.store().validate().is_ok(), "invariants violated");
}

/// Flat order equals the picture's labels sorted by index; grouped children
/// equal the labels of that group sorted by index.
fn assert_projection_matches_store(session: &Session) {
    let Some(picture) = session.view().picture() else {
        return;
    };
    let mut labels = session.store().labels(picture).expect("labels").to_vec();
    labels.sort_by_key(|label| label.index);

    match session.view().mode() {
        ViewMode::Flat => {
            let expected: Vec<LabelIndex> = labels.iter().map(|label| label.index).collect();
            assert_eq!(session.view().label_order(), expected);
        }
        ViewMode::Grouped => {
            assert_eq!(session.view().group_node_count(), session.store().group_count());
            for position in 0..session.store().group_count() {
                let group_id = GroupId::from_position(position);
                let expected: Vec<LabelIndex> = labels
                    .iter()
                    .filter(|label| label.group_id == group_id)
                    .map(|label| label.index)
                    .collect();
                assert_eq!(session.view().group_children(group_id), Some(expected));
            }
        }
    }
}

#[test]
fn switching_to_grouped_mode_splits_labels_by_group() {
    let mut session = grouped_session();
    session.set_view_mode(ViewMode::Grouped);

    assert_eq!(
        session.view().group_children(GroupId(0)),
        Some(vec![LabelIndex(0)])
    );
    assert_eq!(
        session.view().group_children(GroupId(1)),
        Some(vec![LabelIndex(1)])
    );
    assert_projection_matches_store(&session);
}

#[test]
fn used_group_is_reported_before_deletion() {
    let mut session = grouped_session();
    assert!(!session.store().is_group_unused(GroupId(0)));
    assert!(matches!(
        session.delete_group(GroupId(0)),
        Err(StoreError::GroupInUse { group_id: GroupId(0) })
    ));
    assert_invariants(&session);

    // Bypassing the check leaves a label pointing past the group list.
    let mut file = session.snapshot();
    file.group_list.remove(0);
    assert!(matches!(
        Session::open(file, ViewMode::Flat),
        Err(IngestError::LabelGroupOutOfBounds { .. })
    ));
}

#[test]
fn reindexing_onto_an_occupied_index_fails_cleanly() {
    let mut session = grouped_session();
    let before = session.snapshot();

    let change = LabelAction::change(
        session.store(),
        "p1.png",
        LabelIndex(0),
        LabelChange::index(LabelIndex(1)),
    )
    .expect("change");
    assert!(matches!(
        session.submit(change),
        Err(StoreError::IndexRepeated { index: LabelIndex(1), .. })
    ));
    assert_eq!(session.snapshot(), before);
}

#[test]
fn composite_removal_undo_restores_both_labels() {
    let mut session = Session::new_document(ViewMode::Flat);
    session.add_group(Group::new("A", "FF0000")).expect("group");
    session.add_picture("p1.png").expect("picture");
    session.show_picture("p1.png").expect("show");
    for index in 1..=4 {
        session
            .submit(LabelAction::add("p1.png", Label::new(index, 0, format!("t{index}"))))
            .expect("label");
    }
    let before = session.snapshot();

    let composite = Action::Complex(vec![
        LabelAction::remove(session.store(), "p1.png", LabelIndex(3))
            .expect("remove 3")
            .into(),
        LabelAction::remove(session.store(), "p1.png", LabelIndex(2))
            .expect("remove 2")
            .into(),
    ]);
    session.submit(composite).expect("submit");
    assert_eq!(
        session.view().label_order(),
        vec![LabelIndex(1), LabelIndex(4)]
    );

    assert_eq!(session.undo(), Ok(true));
    assert_eq!(session.snapshot(), before);
    let order: Vec<i64> = session
        .store()
        .labels("p1.png")
        .expect("labels")
        .iter()
        .map(|label| label.index.0)
        .collect();
    assert_eq!(order, vec![1, 2, 3, 4]);
    assert_projection_matches_store(&session);
}

#[test]
fn redo_after_undo_matches_a_single_submit() {
    let mut session = grouped_session();
    session
        .move_labels_to_group("p1.png", &[LabelIndex(0)], GroupId(1))
        .expect("move");
    let committed = session.snapshot();

    session.undo().expect("undo");
    session.redo().expect("redo");
    assert_eq!(session.snapshot(), committed);
    assert_projection_matches_store(&session);
}

#[test]
fn new_submit_after_undo_discards_redo() {
    let mut session = grouped_session();
    session
        .set_label_text("p1.png", LabelIndex(0), "a")
        .expect("edit a");
    session.undo().expect("undo");
    session
        .set_label_text("p1.png", LabelIndex(1), "b")
        .expect("edit b");

    assert!(!session.can_redo());
    assert_eq!(session.redo(), Ok(false));
    assert_eq!(
        session.store().get_label("p1.png", LabelIndex(0)).expect("label").text,
        "hi"
    );
}

#[test]
fn every_edit_is_reverted_exactly() {
    let mut session = grouped_session();
    session.add_group(Group::new("C", "008000")).expect("group C");
    session.add_picture("p2.png").expect("p2");
    session.mark_saved();

    let edits: Vec<Box<dyn Fn(&mut Session) -> Result<(), StoreError>>> = vec![
        Box::new(|s: &mut Session| s.add_group(Group::new("D", "123456")).map(drop)),
        Box::new(|s: &mut Session| s.rename_group(GroupId(1), "Bee")),
        Box::new(|s: &mut Session| s.recolor_group(GroupId(2), "ABCDEF")),
        Box::new(|s: &mut Session| s.delete_group(GroupId(2))),
        Box::new(|s: &mut Session| s.add_picture("p3.png")),
        Box::new(|s: &mut Session| s.remove_picture("p2.png")),
        Box::new(|s: &mut Session| s.add_label("p1.png", GroupId(2), 0.5, 0.5, "new").map(drop)),
        Box::new(|s: &mut Session| s.remove_labels("p1.png", &[LabelIndex(0), LabelIndex(1)]).map(drop)),
        Box::new(|s: &mut Session| s.set_label_text("p1.png", LabelIndex(1), "changed")),
        Box::new(|s: &mut Session| s.move_label("p1.png", LabelIndex(0), 0.9, 0.1)),
        Box::new(|s: &mut Session| {
            s.move_labels_to_group("p1.png", &[LabelIndex(0), LabelIndex(1)], GroupId(2))
                .map(drop)
        }),
        Box::new(|s: &mut Session| s.move_label_to_index("p1.png", LabelIndex(1), LabelIndex(7))),
    ];

    for mode in [ViewMode::Flat, ViewMode::Grouped] {
        session.set_view_mode(mode);
        for edit in &edits {
            let before = session.snapshot();
            edit(&mut session).expect("edit");
            assert_invariants(&session);
            assert_projection_matches_store(&session);

            assert_eq!(session.undo(), Ok(true));
            assert_eq!(session.snapshot(), before);
            assert_projection_matches_store(&session);
        }
    }
    assert!(session.is_changed());
}

#[test]
fn round_trip_through_json_preserves_the_document() {
    let mut session = grouped_session();
    session
        .move_label("p1.png", LabelIndex(1), 0.25, 0.75)
        .expect("move");
    let json = session.snapshot().to_json().expect("json");

    let reopened = Session::open(TransFile::from_json(&json).expect("parse"), ViewMode::Grouped)
        .expect("open");
    assert_eq!(reopened.snapshot(), session.snapshot());
}
