/// Byte offset to (line, column) lookups. Columns count UTF-16 code units, the
/// unit source maps use.
pub struct LineIndex<'a> {
  text: &'a str,
  line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
  pub fn new(text: &'a str) -> Self {
    let line_starts = std::iter::once(0)
      .chain(text.match_indices('\n').map(|(i, _)| i + 1))
      .collect();
    Self { text, line_starts }
  }

  /// Zero-based line and column of `offset`.
  pub fn position(&self, offset: usize) -> (u32, u32) {
    let offset = offset.min(self.text.len());
    let line = match self.line_starts.binary_search(&offset) {
      Ok(line) => line,
      Err(next) => next - 1,
    };
    let start = self.line_starts[line];
    let col = self
      .text
      .get(start..offset)
      .map_or(0, |prefix| prefix.encode_utf16().count());
    (line as u32, col as u32)
  }
}

pub fn utf16_len(text: &str) -> u32 {
  text.encode_utf16().count() as u32
}
