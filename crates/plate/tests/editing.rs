use blockpad_plate::{EditorConfig, Editor, Node, RichTextTree};

fn editor_with(text: &str) -> Editor {
    Editor::with_tree(RichTextTree::from_text(text), EditorConfig::default())
}

#[test]
fn caret_predicates_follow_content_bounds() {
    let mut editor = editor_with("hello");
    assert!(editor.caret_at_start());
    assert!(!editor.caret_at_end());

    editor.move_to_end();
    assert!(editor.caret_at_end());
    assert_eq!(editor.caret_offset(), 5);

    editor.select_offsets(0, 5);
    assert!(!editor.caret_at_start());
    assert!(!editor.caret_at_end());
}

#[test]
fn empty_editor_is_both_at_start_and_end() {
    let editor = Editor::from_config(EditorConfig::default());
    assert!(editor.is_empty());
    assert!(editor.caret_at_start());
    assert!(editor.caret_at_end());
}

#[test]
fn split_off_moves_tail_out_of_the_editor() {
    let mut editor = editor_with("hello world");
    editor.set_caret_offset(5);

    let tail = editor.split_off_at_caret().unwrap();

    assert_eq!(editor.plain_text(), "hello");
    assert!(editor.caret_at_end());
    assert_eq!(tail.plain_text(), " world");
}

#[test]
fn split_off_takes_following_blocks_along() {
    let tree = RichTextTree::new(vec![Node::paragraph("ab"), Node::heading(2, "cd")]);
    let mut editor = Editor::with_tree(tree, EditorConfig::default());
    editor.set_caret_offset(1);

    let tail = editor.split_off_at_caret().unwrap();

    assert_eq!(editor.plain_text(), "a");
    assert_eq!(editor.tree().children.len(), 1);
    assert_eq!(tail.plain_text(), "b\ncd");
    let kinds: Vec<_> = tail.blocks().map(|b| b.kind.as_str()).collect();
    assert_eq!(kinds, vec!["paragraph", "heading"]);
}

#[test]
fn split_off_at_end_leaves_an_empty_tail() {
    let mut editor = editor_with("abc");
    editor.move_to_end();

    let tail = editor.split_off_at_caret().unwrap();

    assert_eq!(editor.plain_text(), "abc");
    assert!(tail.is_blank());
}

#[test]
fn typing_replaces_a_selection() {
    let mut editor = editor_with("hello world");
    editor.select_offsets(0, 5);

    editor.insert_text("bye").unwrap();

    assert_eq!(editor.plain_text(), "bye world");
    assert_eq!(editor.caret_offset(), 3);
}

#[test]
fn delete_backward_at_block_start_joins_blocks() {
    let tree = RichTextTree::new(vec![Node::paragraph("ab"), Node::paragraph("cd")]);
    let mut editor = Editor::with_tree(tree, EditorConfig::default());
    editor.set_caret_offset(3);

    editor.delete_backward().unwrap();

    assert_eq!(editor.plain_text(), "abcd");
    assert_eq!(editor.tree().children.len(), 1);
    assert_eq!(editor.caret_offset(), 2);
}

#[test]
fn delete_forward_at_block_end_pulls_next_block_in() {
    let tree = RichTextTree::new(vec![Node::paragraph("ab"), Node::paragraph("cd")]);
    let mut editor = Editor::with_tree(tree, EditorConfig::default());
    editor.set_caret_offset(2);

    editor.delete_forward().unwrap();

    assert_eq!(editor.plain_text(), "abcd");
    assert_eq!(editor.caret_offset(), 2);
}

#[test]
fn deleting_past_the_bounds_is_a_no_op() {
    let mut editor = editor_with("ab");
    editor.delete_backward().unwrap();
    assert_eq!(editor.plain_text(), "ab");

    editor.move_to_end();
    editor.delete_forward().unwrap();
    assert_eq!(editor.plain_text(), "ab");
}

#[test]
fn delete_respects_multibyte_characters() {
    let mut editor = editor_with("héllo");
    editor.set_caret_offset(3);

    editor.delete_backward().unwrap();

    assert_eq!(editor.plain_text(), "hllo");
    assert_eq!(editor.caret_offset(), 1);
}

#[test]
fn soft_break_stays_inside_the_block() {
    let mut editor = editor_with("ab");
    editor.move_to_end();

    editor.insert_soft_break().unwrap();

    assert_eq!(editor.tree().children.len(), 1);
    assert_eq!(editor.plain_text(), "ab\n");
    assert!(editor.caret_at_end());
}

#[test]
fn insert_break_splits_the_active_block() {
    let mut editor = editor_with("abcd");
    editor.set_caret_offset(2);

    editor.insert_break().unwrap();

    assert_eq!(editor.tree().children.len(), 2);
    assert_eq!(editor.plain_text(), "ab\ncd");
    assert_eq!(editor.caret_offset(), 3);
}

#[test]
fn editing_commands_and_queries_round_trip_through_the_registry() {
    let mut editor = Editor::from_config(EditorConfig::default());

    editor
        .run_command("core.insert_text", Some(serde_json::json!({ "text": "hi" })))
        .unwrap();

    assert_eq!(
        editor.run_query::<String>("core.plain_text", None).unwrap(),
        "hi"
    );
    assert_eq!(editor.run_query::<usize>("core.caret_offset", None).unwrap(), 2);
    assert!(editor.run_command("core.insert_text", None).is_err());
    assert!(editor.run_command("nope", None).is_err());
}

#[test]
fn load_replaces_content_and_clamps_caret() {
    let mut editor = editor_with("hello world");
    editor.move_to_end();

    editor.load(RichTextTree::from_text("hi"));

    assert_eq!(editor.plain_text(), "hi");
    assert!(editor.caret_offset() <= 2);
}
