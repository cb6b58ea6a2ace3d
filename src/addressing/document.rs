//! In-memory rendering tree for a single chapter.
//!
//! Imported chapters carry no stable paragraph ids, so every address the
//! engine hands out is expressed against this tree: a text node handle plus a
//! character offset inside it. The tree mirrors what the renderer lays out,
//! including `<ruby>` annotations, so callers can choose to skip gloss text.

use anyhow::{anyhow, Result};
use quick_xml::events::Event;
use quick_xml::reader::Reader;

/// Handle to a node inside a [`ChapterDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// A concrete point inside a text node: the glossary's "anchor".
///
/// `offset` counts `char`s from the start of the node's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextPoint {
    pub node: NodeId,
    pub offset: usize,
}

impl TextPoint {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Element { tag: String },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Arena-backed element/text tree. Node 0 is a synthetic root element.
#[derive(Debug, Clone)]
pub struct ChapterDocument {
    nodes: Vec<Node>,
}

impl Default for ChapterDocument {
    fn default() -> Self {
        Self::new()
    }
}

const ROOT_TAG: &str = "#chapter";

// Dropped at parse time; none of them render text the reader can see.
const SKIPPED_TAGS: &[&str] = &["head", "script", "style"];

impl ChapterDocument {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Element {
                    tag: ROOT_TAG.to_string(),
                },
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(id.0).map(|node| &node.kind)
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Element { tag } => Some(tag.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Text(text) => Some(text.as_str()),
            NodeKind::Element { .. } => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|node| node.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn append_element(&mut self, parent: NodeId, tag: &str) -> NodeId {
        self.push_node(
            parent,
            NodeKind::Element {
                tag: tag.to_ascii_lowercase(),
            },
        )
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.push_node(parent, NodeKind::Text(text.to_string()))
    }

    fn push_node(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        if let Some(parent_node) = self.nodes.get_mut(parent.0) {
            parent_node.children.push(id);
        }
        id
    }

    /// Appends text under `parent`, extending the previous sibling when it is
    /// already a text node. Entity references arrive as separate tokens and
    /// must not split a run the renderer shows as one text node.
    fn append_text_run(&mut self, parent: NodeId, text: &str) {
        let last_child = self.children(parent).last().copied();
        if let Some(last) = last_child {
            if let Some(Node {
                kind: NodeKind::Text(existing),
                ..
            }) = self.nodes.get_mut(last.0)
            {
                existing.push_str(text);
                return;
            }
        }
        self.append_text(parent, text);
    }

    /// Builds the tree from chapter XHTML.
    ///
    /// Whitespace is kept verbatim so offsets line up with the laid-out text.
    /// Mismatched end tags are tolerated: an end tag only closes the innermost
    /// open element when the names agree.
    pub fn from_xhtml(content: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(content);
        reader.config_mut().trim_text(false);
        reader.config_mut().check_end_names = false;

        let mut doc = Self::new();
        let mut stack: Vec<NodeId> = vec![doc.root()];
        let mut skip_depth = 0usize;
        let mut buf = Vec::with_capacity(256);
        let mut entity_buf = String::with_capacity(16);

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let tag = local_tag_name(&reader, e.name().as_ref())?;
                    if skip_depth > 0 || SKIPPED_TAGS.contains(&tag.as_str()) {
                        skip_depth += 1;
                    } else {
                        let parent = current(&stack, &doc);
                        let id = doc.append_element(parent, &tag);
                        stack.push(id);
                    }
                }
                Ok(Event::Empty(e)) => {
                    if skip_depth == 0 {
                        let tag = local_tag_name(&reader, e.name().as_ref())?;
                        if !SKIPPED_TAGS.contains(&tag.as_str()) {
                            let parent = current(&stack, &doc);
                            doc.append_element(parent, &tag);
                        }
                    }
                }
                Ok(Event::End(e)) => {
                    if skip_depth > 0 {
                        skip_depth -= 1;
                    } else {
                        let tag = local_tag_name(&reader, e.name().as_ref())?;
                        if stack.len() > 1 {
                            let top = stack[stack.len() - 1];
                            if doc.tag(top) == Some(tag.as_str()) {
                                stack.pop();
                            }
                        }
                    }
                }
                Ok(Event::Text(e)) => {
                    if skip_depth == 0 {
                        let text = e
                            .decode()
                            .map_err(|err| anyhow!("chapter text decode failed: {err:?}"))?;
                        if !text.is_empty() {
                            let parent = current(&stack, &doc);
                            doc.append_text_run(parent, text.as_ref());
                        }
                    }
                }
                Ok(Event::CData(e)) => {
                    if skip_depth == 0 {
                        let text = reader
                            .decoder()
                            .decode(&e)
                            .map_err(|err| anyhow!("chapter cdata decode failed: {err:?}"))?;
                        let parent = current(&stack, &doc);
                        doc.append_text_run(parent, text.as_ref());
                    }
                }
                Ok(Event::GeneralRef(e)) => {
                    if skip_depth == 0 {
                        let name = e
                            .decode()
                            .map_err(|err| anyhow!("entity decode failed: {err:?}"))?;
                        let resolved = resolve_entity(&name, &mut entity_buf);
                        let parent = current(&stack, &doc);
                        doc.append_text_run(parent, &resolved);
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(err) => {
                    return Err(anyhow!(
                        "chapter XHTML parse error at byte {}: {err:?}",
                        reader.buffer_position()
                    ))
                }
            }
            buf.clear();
        }

        Ok(doc)
    }
}

fn current(stack: &[NodeId], doc: &ChapterDocument) -> NodeId {
    stack.last().copied().unwrap_or_else(|| doc.root())
}

fn local_tag_name(reader: &Reader<&[u8]>, raw: &[u8]) -> Result<String> {
    let decoded = reader
        .decoder()
        .decode(raw)
        .map_err(|err| anyhow!("tag name decode failed: {err:?}"))?;
    let local = decoded.rsplit(':').next().unwrap_or(decoded.as_ref());
    Ok(local.to_ascii_lowercase())
}

/// XML entities resolve through quick-xml; the HTML ones that show up in
/// real books get a small table. Anything else is kept literally.
fn resolve_entity(name: &str, entity_buf: &mut String) -> String {
    match name {
        "nbsp" => return "\u{a0}".to_string(),
        "ensp" => return "\u{2002}".to_string(),
        "emsp" => return "\u{2003}".to_string(),
        "thinsp" => return "\u{2009}".to_string(),
        "mdash" => return "\u{2014}".to_string(),
        "ndash" => return "\u{2013}".to_string(),
        "hellip" => return "\u{2026}".to_string(),
        _ => {}
    }

    entity_buf.clear();
    entity_buf.push('&');
    entity_buf.push_str(name);
    entity_buf.push(';');
    match quick_xml::escape::unescape(entity_buf.as_str()) {
        Ok(resolved) => resolved.into_owned(),
        Err(_) => entity_buf.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(doc: &ChapterDocument) -> Vec<String> {
        (0..doc.len())
            .filter_map(|i| doc.text(NodeId(i)).map(str::to_string))
            .collect()
    }

    #[test]
    fn parses_ruby_markup_into_separate_nodes() {
        let doc = ChapterDocument::from_xhtml(
            "<p><ruby>漢字<rt>かんじ</rt></ruby>を読む</p>".as_bytes(),
        )
        .unwrap();

        assert_eq!(texts(&doc), vec!["漢字", "かんじ", "を読む"]);
        let p = doc.children(doc.root())[0];
        assert_eq!(doc.tag(p), Some("p"));
        let ruby = doc.children(p)[0];
        assert_eq!(doc.tag(ruby), Some("ruby"));
        assert_eq!(doc.children(ruby).len(), 2);
    }

    #[test]
    fn entities_merge_into_surrounding_text() {
        let doc = ChapterDocument::from_xhtml(b"<p>Tom &amp; Jerry&nbsp;run</p>").unwrap();
        assert_eq!(texts(&doc), vec!["Tom & Jerry\u{a0}run"]);
    }

    #[test]
    fn head_and_script_content_is_dropped() {
        let doc = ChapterDocument::from_xhtml(
            b"<html><head><title>Ch 1</title></head><body><script>x()</script><p>Body</p></body></html>",
        )
        .unwrap();
        assert_eq!(texts(&doc), vec!["Body"]);
    }

    #[test]
    fn whitespace_between_blocks_is_preserved() {
        let doc = ChapterDocument::from_xhtml(b"<div><p>a</p>\n  <p>b</p></div>").unwrap();
        assert_eq!(texts(&doc), vec!["a", "\n  ", "b"]);
    }

    #[test]
    fn self_closing_elements_do_not_swallow_siblings() {
        let doc = ChapterDocument::from_xhtml(b"<p>one<br/>two</p>").unwrap();
        let p = doc.children(doc.root())[0];
        assert_eq!(doc.children(p).len(), 3);
        assert_eq!(texts(&doc), vec!["one", "two"]);
    }
}
