//! Lenient reader for the small HTML subset older blocks were stored in.
//!
//! Only structure the editor can represent is kept: paragraphs, headings,
//! list items, line breaks and inline marks. Everything else is dropped and
//! its text content kept.

use crate::core::{Attrs, ElementNode, Marks, Node, RichTextTree, TextNode};
use crate::text::merge_adjacent_runs;

impl RichTextTree {
    pub fn from_legacy_html(html: &str) -> Self {
        parse_legacy_html(html)
    }
}

pub fn parse_legacy_html(html: &str) -> RichTextTree {
    let mut reader = Reader::default();
    let mut rest = html;

    while !rest.is_empty() {
        if let Some(after_lt) = rest.strip_prefix('<') {
            match after_lt.find('>') {
                Some(end) => {
                    reader.tag(&after_lt[..end]);
                    rest = &after_lt[end + 1..];
                }
                None => {
                    reader.text(rest);
                    rest = "";
                }
            }
        } else {
            let end = rest.find('<').unwrap_or(rest.len());
            reader.text(&rest[..end]);
            rest = &rest[end..];
        }
    }

    reader.finish()
}

#[derive(Default)]
struct Reader {
    blocks: Vec<Node>,
    current: Option<ElementNode>,
    marks: Marks,
    list_type: Option<&'static str>,
}

impl Reader {
    fn tag(&mut self, raw: &str) {
        let raw = raw.trim();
        if raw.starts_with('!') || raw.starts_with('?') {
            return;
        }
        let closing = raw.starts_with('/');
        let body = raw.trim_start_matches('/').trim_end_matches('/');
        let (name, attrs) = body
            .split_once(char::is_whitespace)
            .unwrap_or((body, ""));
        let name = name.to_ascii_lowercase();

        match (name.as_str(), closing) {
            ("p" | "div", false) => self.open_block("paragraph", Attrs::default()),
            ("h1" | "h2" | "h3" | "h4" | "h5" | "h6", false) => {
                let level = name[1..].parse::<u64>().unwrap_or(1);
                let mut attrs = Attrs::default();
                attrs.insert("level".to_string(), level.into());
                self.open_block("heading", attrs);
            }
            ("li", false) => {
                let mut attrs = Attrs::default();
                attrs.insert(
                    "list_type".to_string(),
                    self.list_type.unwrap_or("bulleted").into(),
                );
                self.open_block("list_item", attrs);
            }
            ("ul", false) => self.list_type = Some("bulleted"),
            ("ol", false) => self.list_type = Some("ordered"),
            ("ul" | "ol", true) => {
                self.close_block();
                self.list_type = None;
            }
            ("p" | "div" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "li", true) => {
                self.close_block()
            }
            ("br", _) => self.push_text("\n"),
            ("strong" | "b", closing) => self.marks.bold = !closing,
            ("em" | "i", closing) => self.marks.italic = !closing,
            ("u", closing) => self.marks.underline = !closing,
            ("s" | "strike" | "del", closing) => self.marks.strikethrough = !closing,
            ("code", closing) => self.marks.code = !closing,
            ("a", false) => self.marks.link = attr_value(attrs, "href"),
            ("a", true) => self.marks.link = None,
            _ => {}
        }
    }

    fn text(&mut self, raw: &str) {
        let decoded = decode_entities(raw);
        if self.current.is_none() && decoded.trim().is_empty() {
            return;
        }
        self.push_text(&decoded);
    }

    fn push_text(&mut self, text: &str) {
        let marks = self.marks.clone();
        let block = self.current.get_or_insert_with(|| ElementNode {
            kind: "paragraph".to_string(),
            attrs: Attrs::default(),
            children: Vec::new(),
        });
        block.children.push(Node::Text(TextNode {
            text: text.to_string(),
            marks,
        }));
    }

    fn open_block(&mut self, kind: &str, attrs: Attrs) {
        self.close_block();
        self.current = Some(ElementNode {
            kind: kind.to_string(),
            attrs,
            children: Vec::new(),
        });
    }

    fn close_block(&mut self) {
        if let Some(mut block) = self.current.take() {
            block.children = merge_adjacent_runs(block.children);
            if block.children.is_empty() {
                block.children.push(Node::text(""));
            }
            self.blocks.push(Node::Element(block));
        }
    }

    fn finish(mut self) -> RichTextTree {
        self.close_block();
        if self.blocks.is_empty() {
            return RichTextTree::empty();
        }
        RichTextTree::new(self.blocks)
    }
}

fn attr_value(attrs: &str, name: &str) -> Option<String> {
    let start = attrs.find(&format!("{name}="))? + name.len() + 1;
    let rest = &attrs[start..];
    let (quote, rest) = match rest.chars().next()? {
        q @ ('"' | '\'') => (Some(q), &rest[1..]),
        _ => (None, rest),
    };
    let end = match quote {
        Some(q) => rest.find(q)?,
        None => rest.find(char::is_whitespace).unwrap_or(rest.len()),
    };
    Some(decode_entities(&rest[..end]))
}

fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let Some(semi) = rest.find(';').filter(|&ix| ix <= 10) else {
            out.push('&');
            rest = &rest[1..];
            continue;
        };
        let entity = &rest[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" | "#39" => Some('\''),
            "nbsp" => Some('\u{a0}'),
            _ => entity
                .strip_prefix("#x")
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(ch) => {
                out.push(ch);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
