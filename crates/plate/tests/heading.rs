use blockpad_plate::{Attrs, EditorConfig, Editor, ElementNode, Node, RichTextTree, TextNode};

#[test]
fn heading_commands_update_block_and_query() {
    let mut editor = Editor::with_tree(RichTextTree::from_text("Title"), EditorConfig::default());

    assert_eq!(
        editor
            .run_query::<Option<u64>>("block.heading_level", None)
            .unwrap(),
        None
    );

    editor
        .run_command("block.set_heading", Some(serde_json::json!({ "level": 2 })))
        .unwrap();

    assert_eq!(
        editor
            .run_query::<Option<u64>>("block.heading_level", None)
            .unwrap(),
        Some(2)
    );
    assert_eq!(editor.plain_text(), "Title");

    editor.run_command("block.unset_heading", None).unwrap();

    let Node::Element(block) = &editor.tree().children[0] else {
        panic!("expected element block");
    };
    assert_eq!(block.kind, "paragraph");
    assert!(block.attrs.get("level").is_none());
}

#[test]
fn heading_level_is_clamped_to_config() {
    let config = EditorConfig {
        heading_levels: 2,
        ..EditorConfig::default()
    };
    let mut editor = Editor::with_tree(RichTextTree::from_text("x"), config);

    editor
        .run_command("block.set_heading", Some(serde_json::json!({ "level": 5 })))
        .unwrap();

    assert_eq!(
        editor
            .run_query::<Option<u64>>("block.heading_level", None)
            .unwrap(),
        Some(2)
    );
}

#[test]
fn heading_normalize_clamps_level_attr() {
    let mut attrs = Attrs::default();
    attrs.insert("level".to_string(), serde_json::json!(42));
    let tree = RichTextTree::new(vec![Node::Element(ElementNode {
        kind: "heading".to_string(),
        attrs,
        children: vec![Node::Text(TextNode {
            text: "x".to_string(),
            marks: Default::default(),
        })],
    })]);

    let editor = Editor::with_tree(tree, EditorConfig::default());

    let Node::Element(block) = &editor.tree().children[0] else {
        panic!("expected element block");
    };
    assert_eq!(block.attrs.get("level").and_then(|v| v.as_u64()), Some(3));
}

#[test]
fn headings_disabled_downgrades_to_paragraph() {
    let config = EditorConfig {
        heading_levels: 0,
        ..EditorConfig::default()
    };
    let tree = RichTextTree::new(vec![Node::heading(1, "x")]);
    let mut editor = Editor::with_tree(tree, config);

    let Node::Element(block) = &editor.tree().children[0] else {
        panic!("expected element block");
    };
    assert_eq!(block.kind, "paragraph");
    assert_eq!(block.inline_text(), "x");
    assert!(editor.run_command("block.set_heading", None).is_err());
}

#[test]
fn break_at_end_of_heading_continues_with_paragraph() {
    let tree = RichTextTree::new(vec![Node::heading(1, "Title")]);
    let mut editor = Editor::with_tree(tree, EditorConfig::default());
    editor.move_to_end();

    editor.insert_break().unwrap();

    assert_eq!(
        editor.run_query::<Option<String>>("block.kind", None).unwrap(),
        Some("paragraph".to_string())
    );
    assert_eq!(editor.plain_text(), "Title\n");
}

#[test]
fn break_inside_heading_keeps_both_halves_headings() {
    let tree = RichTextTree::new(vec![Node::heading(1, "Title")]);
    let mut editor = Editor::with_tree(tree, EditorConfig::default());
    editor.set_caret_offset(2);

    editor.insert_break().unwrap();

    let kinds: Vec<_> = editor.tree().blocks().map(|b| b.kind.clone()).collect();
    assert_eq!(kinds, vec!["heading", "heading"]);
}
