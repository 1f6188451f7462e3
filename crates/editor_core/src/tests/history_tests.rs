use super::*;
use shared::domain::{Group, Label, LabelIndex, ViewMode};
use storage::EntityStore;

use crate::{action::LabelAction, view::ViewProjection};

fn fixture() -> (EntityStore, ViewProjection) {
    let mut store = EntityStore::new();
    store.add_group(Group::new("A", "FF0000")).expect("group");
    store.add_picture("p1.png").expect("picture");
    let view = ViewProjection::attach(&mut store, ViewMode::Flat);
    (store, view)
}

fn add(index: i64) -> Action {
    LabelAction::add("p1.png", Label::new(index, 0, format!("t{index}"))).into()
}

#[test]
fn empty_log_undo_and_redo_are_noops() {
    let (mut store, mut view) = fixture();
    let mut log = ActionLog::new();
    let mut ctx = EditContext {
        store: &mut store,
        view: &mut view,
    };

    assert_eq!(log.undo(&mut ctx), Ok(false));
    assert_eq!(log.redo(&mut ctx), Ok(false));
    assert!(!log.is_changed());
    assert!(!log.can_undo());
    assert!(!log.can_redo());
}

#[test]
fn undo_then_redo_replays_the_same_state() {
    let (mut store, mut view) = fixture();
    let mut log = ActionLog::new();
    let mut ctx = EditContext {
        store: &mut store,
        view: &mut view,
    };

    log.submit(add(1), &mut ctx).expect("submit");
    let committed = ctx.store.to_trans_file();
    assert_eq!(log.undo_description().as_deref(), Some("Add label 1"));

    assert_eq!(log.undo(&mut ctx), Ok(true));
    assert!(ctx.store.labels("p1.png").expect("labels").is_empty());
    assert_eq!(log.redo_description().as_deref(), Some("Add label 1"));

    assert_eq!(log.redo(&mut ctx), Ok(true));
    assert_eq!(ctx.store.to_trans_file(), committed);
    assert_eq!((log.undo_len(), log.redo_len()), (1, 0));
}

#[test]
fn fresh_submit_discards_redo_history() {
    let (mut store, mut view) = fixture();
    let mut log = ActionLog::new();
    let mut ctx = EditContext {
        store: &mut store,
        view: &mut view,
    };

    log.submit(add(1), &mut ctx).expect("submit a");
    log.undo(&mut ctx).expect("undo");
    assert!(log.can_redo());

    log.submit(add(2), &mut ctx).expect("submit b");
    assert!(!log.can_redo());
    assert_eq!(log.redo(&mut ctx), Ok(false));
    assert!(ctx.store.get_label("p1.png", LabelIndex(1)).is_err());
}

#[test]
fn failed_submit_records_nothing() {
    let (mut store, mut view) = fixture();
    let mut log = ActionLog::new();
    let mut ctx = EditContext {
        store: &mut store,
        view: &mut view,
    };

    log.submit(add(1), &mut ctx).expect("submit");
    log.undo(&mut ctx).expect("undo");
    log.mark_saved();
    log.submit(add(1), &mut ctx).expect("submit again");
    log.undo(&mut ctx).expect("undo again");
    log.mark_saved();

    let dangling: Action = LabelAction::add("p1.png", Label::new(4, 3, "")).into();
    let err = log.submit(dangling, &mut ctx).unwrap_err();
    assert!(matches!(err, StoreError::GroupIdOutOfBounds { .. }));
    assert_eq!(log.undo_len(), 0);
    assert_eq!(log.redo_len(), 1);
    assert!(!log.is_changed());
}

#[test]
fn failed_undo_keeps_the_action_on_the_undo_stack() {
    let (mut store, mut view) = fixture();
    let mut log = ActionLog::new();
    let mut ctx = EditContext {
        store: &mut store,
        view: &mut view,
    };

    log.submit(add(1), &mut ctx).expect("submit");
    ctx.store
        .remove_label("p1.png", LabelIndex(1))
        .expect("bypass the log");

    assert!(matches!(
        log.undo(&mut ctx),
        Err(StoreError::LabelNotFound { .. })
    ));
    assert_eq!((log.undo_len(), log.redo_len()), (1, 0));
}

#[test]
fn changed_flag_tracks_every_transition() {
    let (mut store, mut view) = fixture();
    let mut log = ActionLog::new();
    let mut ctx = EditContext {
        store: &mut store,
        view: &mut view,
    };

    log.submit(add(1), &mut ctx).expect("submit");
    assert!(log.is_changed());
    log.mark_saved();
    log.undo(&mut ctx).expect("undo");
    assert!(log.is_changed());
    log.mark_saved();
    log.redo(&mut ctx).expect("redo");
    assert!(log.is_changed());

    log.clear();
    assert!(!log.is_changed());
    assert!(!log.can_undo());
}
