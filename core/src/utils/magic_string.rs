use sourcemap::{SourceMap, SourceMapBuilder};

use crate::utils::line_index::{utf16_len, LineIndex};

#[derive(Debug)]
struct Edit {
  start: usize,
  end: usize,
  content: String,
}

/// Text edits over an original string that keep track of where every
/// surviving piece of the original lands, so a source map can be generated.
/// Edits are given in byte offsets of the original and must not overlap.
pub struct MagicString<'a> {
  original: &'a str,
  intro: String,
  outro: String,
  edits: Vec<Edit>,
}

impl<'a> MagicString<'a> {
  pub fn new(original: &'a str) -> Self {
    Self {
      original,
      intro: String::new(),
      outro: String::new(),
      edits: vec![],
    }
  }

  pub fn prepend(&mut self, content: &str) -> &mut Self {
    self.intro.insert_str(0, content);
    self
  }

  pub fn append(&mut self, content: &str) -> &mut Self {
    self.outro.push_str(content);
    self
  }

  pub fn overwrite(&mut self, start: usize, end: usize, content: impl Into<String>) -> &mut Self {
    self.edits.push(Edit {
      start,
      end,
      content: content.into(),
    });
    self
  }

  pub fn insert(&mut self, pos: usize, content: impl Into<String>) -> &mut Self {
    self.overwrite(pos, pos, content)
  }

  pub fn remove(&mut self, start: usize, end: usize) -> &mut Self {
    self.overwrite(start, end, "")
  }

  /// Applies the edits. The map points from the result back into the original,
  /// which is registered under `source`.
  pub fn generate(mut self, source: &str) -> (String, SourceMap) {
    // inserts go before a replacement starting at the same offset
    self.edits.sort_by_key(|edit| (edit.start, edit.end));

    let index = LineIndex::new(self.original);
    let mut builder = SourceMapBuilder::new(None);
    let src_id = builder.add_source(source);
    let mut out = Output::default();

    out.push(&self.intro);
    let mut cursor = 0;
    for edit in &self.edits {
      if edit.start < cursor {
        log::debug!(
          "[magic_string] dropping overlapping edit {}..{}",
          edit.start,
          edit.end
        );
        continue;
      }
      out.copy(self.original, cursor, edit.start, &index, &mut builder, src_id);
      if edit.end > edit.start && !edit.content.is_empty() {
        let (src_line, src_col) = index.position(edit.start);
        builder.add_raw(out.line, out.col, src_line, src_col, Some(src_id), None, false);
      }
      out.push(&edit.content);
      cursor = cursor.max(edit.end);
    }
    out.copy(
      self.original,
      cursor,
      self.original.len(),
      &index,
      &mut builder,
      src_id,
    );
    out.push(&self.outro);

    (out.text, builder.into_sourcemap())
  }
}

#[derive(Default)]
struct Output {
  text: String,
  line: u32,
  col: u32,
}

impl Output {
  fn push(&mut self, content: &str) {
    match content.rfind('\n') {
      Some(last) => {
        self.line += content.matches('\n').count() as u32;
        self.col = utf16_len(&content[last + 1..]);
      }
      None => self.col += utf16_len(content),
    }
    self.text.push_str(content);
  }

  fn copy(
    &mut self,
    original: &str,
    start: usize,
    end: usize,
    index: &LineIndex,
    builder: &mut SourceMapBuilder,
    src_id: u32,
  ) {
    if start >= end {
      return;
    }
    let (mut src_line, src_col) = index.position(start);
    builder.add_raw(self.line, self.col, src_line, src_col, Some(src_id), None, false);
    let chunk = &original[start..end];
    let mut lines = chunk.split_inclusive('\n').peekable();
    while let Some(line) = lines.next() {
      self.push(line);
      if line.ends_with('\n') && lines.peek().is_some() {
        src_line += 1;
        builder.add_raw(self.line, 0, src_line, 0, Some(src_id), None, false);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn applies_edits_in_offset_order() {
    let code = "import a from 'a';\nconsole.log(a);\n";
    let mut s = MagicString::new(code);
    s.overwrite(31, 32, "__a.default");
    s.remove(0, 18);
    s.prepend("var __a = __require('a');\n");
    let (out, _) = s.generate("input.js");
    assert_eq!(out, "var __a = __require('a');\n\nconsole.log(__a.default);\n");
  }

  #[test]
  fn map_points_back_to_original_lines() {
    let code = "let x = 1;\nlet y = x;\n";
    let mut s = MagicString::new(code);
    s.prepend("// header\n// header\n");
    s.overwrite(19, 20, "(x + 0)");
    let (out, map) = s.generate("input.js");
    assert_eq!(out, "// header\n// header\nlet x = 1;\nlet y = (x + 0);\n");

    let token = map.lookup_token(3, 4).unwrap();
    assert_eq!(token.get_dst(), (3, 0));
    assert_eq!(token.get_src(), (1, 0));
    let token = map.lookup_token(3, 8).unwrap();
    assert_eq!(token.get_src(), (1, 8));
    let token = map.lookup_token(2, 0).unwrap();
    assert_eq!(token.get_src(), (0, 0));
    assert_eq!(token.get_source(), Some("input.js"));
    assert!(map.lookup_token(0, 3).is_none());
  }
}
