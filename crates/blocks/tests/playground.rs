use std::rc::Rc;
use std::time::Duration;

use blockpad::{
    Block, BlockContent, BlockId, Document, DragEvent, FocusOutcome, FocusPosition, KeyEvent,
    KeyOutcome, PlateEngine, Playground, PlaygroundConfig, PlaygroundError, VirtualClock,
};

const FOCUS_DELAY: Duration = Duration::from_millis(10);

fn playground_with(texts: &[&str]) -> (Playground, Vec<BlockId>, VirtualClock) {
    playground_with_blocks(texts.iter().map(|text| Block::from_text(*text)).collect())
}

fn playground_with_blocks(blocks: Vec<Block>) -> (Playground, Vec<BlockId>, VirtualClock) {
    let ids: Vec<BlockId> = blocks.iter().map(|_| BlockId::new()).collect();
    let document = Document::with_blocks("test", ids.iter().copied().zip(blocks));
    let clock = VirtualClock::new();
    let config = PlaygroundConfig::default();
    let engine = PlateEngine::new(config.editor.clone());
    let playground =
        Playground::with_parts(config, document, Rc::new(clock.clone()), Box::new(engine));
    (playground, ids, clock)
}

fn texts(playground: &Playground) -> Vec<String> {
    playground
        .document()
        .iter()
        .map(|(_, block)| block.content.plain_text())
        .collect()
}

fn key(playground: &mut Playground, id: BlockId, keystroke: &str) -> KeyOutcome {
    playground.key_down(id, &KeyEvent::parse(keystroke)).unwrap()
}

#[test]
fn enter_splits_block_at_caret() {
    let (mut pg, ids, clock) = playground_with(&["AB"]);
    pg.click(ids[0], Some(1)).unwrap();

    assert_eq!(key(&mut pg, ids[0], "enter"), KeyOutcome::PreventDefault);

    assert_eq!(texts(&pg), vec!["A", "B"]);
    assert_eq!(pg.document().id_at(0), Some(ids[0]));
    assert_eq!(pg.revision(), 1);
    assert!(pg.document().is_consistent());

    let new_id = pg.document().id_at(1).unwrap();
    assert!(pg.tick().is_empty(), "focus waits for the delay");
    clock.advance(FOCUS_DELAY);
    assert_eq!(pg.tick(), vec![FocusOutcome::Focused(new_id)]);
    assert_eq!(pg.focused_block(), Some(new_id));
    assert!(pg.handle(new_id).unwrap().borrow().caret_at_start());
}

#[test]
fn backspace_at_start_merges_into_previous_block() {
    let (mut pg, ids, clock) = playground_with(&["P", "T"]);
    pg.click(ids[1], Some(0)).unwrap();

    assert_eq!(key(&mut pg, ids[1], "backspace"), KeyOutcome::PreventDefault);

    assert_eq!(pg.document().order(), &[ids[0]]);
    assert_eq!(texts(&pg), vec!["PT"]);
    assert_eq!(pg.revision(), 1);
    assert!(pg.handle(ids[1]).is_none());

    clock.advance(FOCUS_DELAY);
    assert_eq!(pg.tick(), vec![FocusOutcome::Focused(ids[0])]);
    let handle = pg.handle(ids[0]).unwrap();
    assert_eq!(handle.borrow().caret_offset(), 1, "caret sits at the old boundary");
}

#[test]
fn delete_at_end_pulls_next_block_in() {
    let (mut pg, ids, _clock) = playground_with(&["P", "T"]);
    pg.click(ids[0], Some(1)).unwrap();

    assert_eq!(key(&mut pg, ids[0], "delete"), KeyOutcome::PreventDefault);

    assert_eq!(pg.document().order(), &[ids[0]]);
    assert_eq!(texts(&pg), vec!["PT"]);
    assert_eq!(pg.handle(ids[0]).unwrap().borrow().caret_offset(), 1);
}

#[test]
fn merging_past_either_end_changes_nothing() {
    let (mut pg, ids, _clock) = playground_with(&["a", "b"]);
    let before = pg.document().clone();

    pg.click(ids[0], Some(0)).unwrap();
    assert_eq!(key(&mut pg, ids[0], "backspace"), KeyOutcome::PreventDefault);

    pg.click(ids[1], Some(1)).unwrap();
    assert_eq!(key(&mut pg, ids[1], "delete"), KeyOutcome::PreventDefault);

    assert_eq!(pg.document(), &before);
    assert_eq!(pg.revision(), 0);
}

#[test]
fn backspace_in_empty_block_deletes_it() {
    let (mut pg, ids, clock) = playground_with(&["ab", ""]);

    assert_eq!(key(&mut pg, ids[1], "backspace"), KeyOutcome::PreventDefault);

    assert_eq!(pg.document().order(), &[ids[0]]);
    clock.advance(FOCUS_DELAY);
    assert_eq!(pg.tick(), vec![FocusOutcome::Focused(ids[0])]);
    assert!(pg.handle(ids[0]).unwrap().borrow().caret_at_end());
}

#[test]
fn backspace_in_the_only_empty_block_keeps_it() {
    let (mut pg, ids, clock) = playground_with(&[""]);

    assert_eq!(key(&mut pg, ids[0], "backspace"), KeyOutcome::PreventDefault);

    assert_eq!(pg.document().order(), &[ids[0]]);
    assert_eq!(pg.mounted(), vec![ids[0]]);
    assert_eq!(pg.revision(), 0);
    clock.advance(FOCUS_DELAY);
    assert!(pg.tick().is_empty());

    pg.add_sibling(ids[0]).unwrap();
    assert_eq!(pg.document().len(), 2);
}

#[test]
fn unclaimed_keys_fall_through_to_the_editor() {
    let (mut pg, ids, _clock) = playground_with(&["ab"]);
    pg.click(ids[0], Some(2)).unwrap();

    assert_eq!(key(&mut pg, ids[0], "shift-enter"), KeyOutcome::Propagate);
    assert_eq!(texts(&pg), vec!["ab\n"]);

    assert_eq!(key(&mut pg, ids[0], "backspace"), KeyOutcome::Propagate);
    assert_eq!(key(&mut pg, ids[0], "backspace"), KeyOutcome::Propagate);
    assert_eq!(texts(&pg), vec!["a"]);

    assert_eq!(key(&mut pg, ids[0], "left"), KeyOutcome::Propagate);
    assert_eq!(pg.document().len(), 1);
    assert_eq!(pg.revision(), 3);
}

#[test]
fn add_type_reorder_and_merge() {
    let (mut pg, ids, clock) = playground_with(&["hello"]);
    let b1 = ids[0];

    pg.add_sibling(b1).unwrap();
    assert_eq!(pg.document().len(), 2);
    let b2 = pg.document().id_at(1).unwrap();
    assert_eq!(pg.document().block(b2).unwrap().content, BlockContent::default());
    assert_eq!(
        pg.handle(b2).unwrap().borrow().placeholder(),
        "type here"
    );

    clock.advance(FOCUS_DELAY);
    assert_eq!(pg.tick(), vec![FocusOutcome::Focused(b2)]);

    pg.input_text(b2, "world").unwrap();
    assert_eq!(pg.block_text(b2).as_deref(), Some("world"));

    pg.drag(DragEvent::Start { active: b2 }).unwrap();
    assert_eq!(pg.active_drag(), Some(b2));
    pg.drag(DragEvent::End {
        active: b2,
        over: Some(b1),
    })
    .unwrap();
    assert_eq!(pg.drag_items(), vec![b2, b1]);
    assert_eq!(pg.active_drag(), None);

    pg.click(b1, Some(0)).unwrap();
    assert_eq!(key(&mut pg, b1, "backspace"), KeyOutcome::PreventDefault);

    assert_eq!(pg.document().order(), &[b2]);
    assert_eq!(texts(&pg), vec!["worldhello"]);
    assert!(pg.document().is_consistent());
}

#[test]
fn two_focus_requests_focus_once() {
    let (mut pg, ids, clock) = playground_with(&["a", "b"]);

    pg.schedule_focus(ids[1], FocusPosition::End);
    pg.schedule_focus(ids[1], FocusPosition::Start);
    clock.advance(FOCUS_DELAY);

    assert_eq!(
        pg.tick(),
        vec![
            FocusOutcome::Focused(ids[1]),
            FocusOutcome::AlreadyFocused(ids[1])
        ]
    );
    assert!(pg.handle(ids[1]).unwrap().borrow().caret_at_end());
}

#[test]
fn click_cancels_pending_focus() {
    let (mut pg, ids, clock) = playground_with(&["a"]);

    pg.add_sibling(ids[0]).unwrap();
    assert_eq!(pg.pending_focus(), 1);

    pg.click(ids[0], None).unwrap();
    assert_eq!(pg.pending_focus(), 0);

    clock.advance(FOCUS_DELAY);
    assert!(pg.tick().is_empty());
    assert_eq!(pg.focused_block(), Some(ids[0]));
}

#[test]
fn focus_for_a_deleted_block_is_stale() {
    let (mut pg, ids, clock) = playground_with(&["a", ""]);

    pg.schedule_focus(ids[1], FocusPosition::Start);
    key(&mut pg, ids[1], "backspace");
    clock.advance(FOCUS_DELAY);

    assert_eq!(
        pg.tick(),
        vec![FocusOutcome::Stale(ids[1]), FocusOutcome::Focused(ids[0])]
    );
}

#[test]
fn drag_without_target_is_ignored() {
    let (mut pg, ids, _clock) = playground_with(&["a", "b"]);

    pg.drag(DragEvent::Start { active: ids[1] }).unwrap();
    let result = pg.drag(DragEvent::End {
        active: ids[1],
        over: None,
    });

    assert_eq!(result, Err(PlaygroundError::InvalidDropTarget));
    assert_eq!(pg.drag_items(), ids);
    assert_eq!(pg.active_drag(), None);

    let stale = pg.drag(DragEvent::End {
        active: ids[1],
        over: Some(BlockId::new()),
    });
    assert_eq!(stale, Err(PlaygroundError::StaleReference));
    assert_eq!(pg.revision(), 0);
}

#[test]
fn edits_from_an_unmounted_editor_are_dropped() {
    let (mut pg, ids, _clock) = playground_with(&["a", ""]);
    let orphan = pg.handle(ids[1]).unwrap();

    key(&mut pg, ids[1], "backspace");
    orphan.borrow_mut().insert_text("late").unwrap();

    assert_eq!(pg.document().order(), &[ids[0]]);
    assert!(pg.document().block(ids[1]).is_none());
    assert_eq!(
        pg.input_text(ids[1], "x"),
        Err(PlaygroundError::StaleReference)
    );
}

#[test]
fn teardown_unmounts_everything() {
    let (mut pg, ids, clock) = playground_with(&["a", "b"]);
    assert_eq!(pg.mounted(), ids);

    pg.teardown();

    assert!(pg.mounted().is_empty());
    assert!(pg.handle(ids[0]).is_none());
    pg.schedule_focus(ids[0], FocusPosition::Start);
    clock.advance(FOCUS_DELAY);
    assert_eq!(pg.tick(), vec![FocusOutcome::Unavailable(ids[0])]);
}

#[test]
fn editor_commands_update_the_document() {
    let (mut pg, ids, _clock) = playground_with(&["Title"]);

    pg.run_command(
        ids[0],
        "block.set_heading",
        Some(serde_json::json!({ "level": 2 })),
    )
    .unwrap();

    let block = pg.document().block(ids[0]).unwrap();
    let BlockContent::RichText { tree } = &block.content else {
        panic!("expected rich text content");
    };
    assert_eq!(tree.blocks().next().unwrap().kind, "heading");
    assert_eq!(pg.revision(), 1);
}

#[test]
fn legacy_block_becomes_rich_text_on_first_edit() {
    let (mut pg, ids, _clock) =
        playground_with_blocks(vec![Block::new(BlockContent::legacy_html("<p>old</p>"))]);
    assert_eq!(pg.handle(ids[0]).unwrap().borrow().plain_text(), "old");
    assert!(pg.document().block(ids[0]).unwrap().content.is_legacy());

    pg.click(ids[0], Some(3)).unwrap();
    pg.input_text(ids[0], "er").unwrap();

    let content = &pg.document().block(ids[0]).unwrap().content;
    assert!(!content.is_legacy());
    assert_eq!(content.plain_text(), "older");
}

#[test]
fn one_transition_per_input() {
    let (mut pg, ids, _clock) = playground_with(&["abc"]);

    pg.click(ids[0], Some(3)).unwrap();
    pg.input_text(ids[0], "d").unwrap();
    assert_eq!(pg.revision(), 1);

    pg.click(ids[0], Some(2)).unwrap();
    key(&mut pg, ids[0], "enter");
    assert_eq!(pg.revision(), 2);
    assert_eq!(texts(&pg), vec!["ab", "cd"]);
}
