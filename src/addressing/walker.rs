use super::document::{ChapterDocument, NodeId, NodeKind};

/// Elements whose text is pronunciation gloss (furigana). Their text never
/// counts towards an address, so toggling gloss visibility cannot shift one.
pub const GLOSS_TAGS: &[&str] = &["rt", "rp"];

pub fn is_gloss_tag(tag: &str) -> bool {
    GLOSS_TAGS.contains(&tag)
}

/// Depth-first, document-order walk over the furigana-stable text stream.
///
/// Every address computation goes through this iterator so that offset and
/// point lookups share exactly one filter rule.
pub struct TextWalker<'a> {
    doc: &'a ChapterDocument,
    stack: Vec<NodeId>,
}

impl<'a> TextWalker<'a> {
    pub fn new(doc: &'a ChapterDocument) -> Self {
        Self {
            doc,
            stack: vec![doc.root()],
        }
    }
}

impl<'a> Iterator for TextWalker<'a> {
    type Item = (NodeId, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            match self.doc.kind(id)? {
                NodeKind::Text(text) => return Some((id, text.as_str())),
                NodeKind::Element { tag } => {
                    if is_gloss_tag(tag) {
                        continue;
                    }
                    self.stack
                        .extend(self.doc.children(id).iter().rev().copied());
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walk_skips_ruby_text_and_parentheses() {
        let doc = ChapterDocument::from_xhtml(
            "<p>前<ruby>漢<rp>(</rp><rt>かん</rt><rp>)</rp></ruby>後</p>".as_bytes(),
        )
        .unwrap();

        let walked: Vec<&str> = TextWalker::new(&doc).map(|(_, text)| text).collect();
        assert_eq!(walked, vec!["前", "漢", "後"]);
    }

    #[test]
    fn markup_nested_inside_gloss_is_skipped_too() {
        let mut doc = ChapterDocument::new();
        let ruby = doc.append_element(doc.root(), "ruby");
        let base = doc.append_text(ruby, "字");
        let rt = doc.append_element(ruby, "rt");
        let span = doc.append_element(rt, "span");
        doc.append_text(span, "じ");
        let tail = doc.append_text(doc.root(), "は");

        let walked: Vec<_> = TextWalker::new(&doc).collect();
        assert_eq!(walked, vec![(base, "字"), (tail, "は")]);
    }
}
