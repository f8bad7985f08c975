use std::collections::HashMap;
use std::path::Path;

pub use sourcemap::SourceMap;
use sourcemap::SourceMapBuilder;

use crate::graph::ModuleGraph;
use crate::types::{is_virtual_id, NormalizedOutputOptions};
use crate::utils::nodejs::{dirname, relative};

/// Where a module's linked text landed in an artifact, and how that text maps
/// back to the module's transformed source.
pub struct RenderedPosition {
  pub id: String,
  pub line: u32,
  pub map: SourceMap,
}

#[derive(Debug, PartialEq, Eq)]
pub struct OriginalPosition {
  pub source: String,
  pub line: u32,
  pub column: u32,
}

/// Maps every line of `code` to itself in `source`.
pub fn identity(source: &str, code: &str) -> SourceMap {
  let mut builder = SourceMapBuilder::new(None);
  let src_id = builder.add_source(source);
  builder.set_source_contents(src_id, Some(code));
  let lines = code.split('\n').count() as u32;
  for line in 0..lines {
    builder.add_raw(line, 0, line, 0, Some(src_id), None, false);
  }
  builder.into_sourcemap()
}

type RawMapping = (u32, u32, u32, u32, u32, Option<String>);

/// `outer` maps C to B and `inner` maps B to A; the result maps C to A and
/// keeps the sources of `inner`.
///
/// Tokens of `outer` are looked up in `inner`, and the tokens of `inner` are
/// moved along the ranges of `outer`, so whichever side is finer grained keeps
/// its precision.
pub fn chain(outer: &SourceMap, inner: &SourceMap) -> SourceMap {
  let mut mappings: Vec<RawMapping> = vec![];

  for token in outer.tokens() {
    let (line, col) = (token.get_src_line(), token.get_src_col());
    let original = match inner.lookup_token(line, col) {
      Some(original) if original.get_dst_line() == line && original.has_source() => original,
      _ => continue,
    };
    mappings.push((
      token.get_dst_line(),
      token.get_dst_col(),
      original.get_src_line(),
      original.get_src_col() + (col - original.get_dst_col()),
      original.get_raw_token().src_id,
      original.get_name().map(str::to_owned),
    ));
  }

  let mut adjusted = inner.clone();
  adjusted.adjust_mappings(outer);
  for token in adjusted.tokens() {
    if !token.has_source() {
      continue;
    }
    mappings.push((
      token.get_dst_line(),
      token.get_dst_col(),
      token.get_src_line(),
      token.get_src_col(),
      token.get_raw_token().src_id,
      token.get_name().map(str::to_owned),
    ));
  }

  // stable: looked-up tokens win over moved ones at the same position
  mappings.sort_by_key(|m| (m.0, m.1));
  mappings.dedup_by_key(|m| (m.0, m.1));

  let mut builder = SourceMapBuilder::new(None);
  let mut source_ids: HashMap<u32, u32> = HashMap::default();
  for (dst_line, dst_col, src_line, src_col, inner_id, name) in mappings {
    let src_id = match source_ids.get(&inner_id) {
      Some(id) => *id,
      None => {
        let source = match inner.get_source(inner_id) {
          Some(source) => source,
          None => continue,
        };
        let id = builder.add_source(source);
        builder.set_source_contents(id, inner.get_source_contents(inner_id));
        source_ids.insert(inner_id, id);
        id
      }
    };
    let name_id = name.as_deref().map(|name| builder.add_name(name));
    builder.add_raw(
      dst_line,
      dst_col,
      src_line,
      src_col,
      Some(src_id),
      name_id,
      false,
    );
  }
  builder.into_sourcemap()
}

/// Position in the original source for a generated position. Only tokens on
/// the same generated line are considered.
pub fn original_position(map: &SourceMap, line: u32, column: u32) -> Option<OriginalPosition> {
  let token = map.lookup_token(line, column)?;
  if token.get_dst_line() != line {
    return None;
  }
  let source = token.get_source()?;
  Some(OriginalPosition {
    source: source.to_owned(),
    line: token.get_src_line(),
    column: token.get_src_col() + (column - token.get_dst_col()),
  })
}

/// Builds the map of one artifact out of the per-module maps.
pub fn compose(
  graph: &ModuleGraph,
  target: &NormalizedOutputOptions,
  rendered_positions: &[RenderedPosition],
) -> SourceMap {
  let map_file = target.map_file();
  let map_dir = dirname(&map_file);
  let file_name = target
    .file
    .file_name()
    .map(|name| name.to_string_lossy().into_owned());

  let mut builder = SourceMapBuilder::new(file_name.as_deref());
  let mut source_ids: HashMap<String, u32> = HashMap::default();
  let mut tokens = vec![];

  for position in rendered_positions {
    if is_virtual_id(&position.id) {
      continue;
    }
    let node = match graph.get_module(&position.id).and_then(|m| m.as_mod()) {
      Some(node) => node,
      None => continue,
    };
    let composed = chain(&position.map, &node.map_fragment);

    for token in composed.tokens() {
      let raw = token.get_raw_token();
      let source = match composed.get_source(raw.src_id) {
        Some(source) => source,
        None => continue,
      };
      let src_id = *source_ids.entry(source.to_owned()).or_insert_with(|| {
        let name = if Path::new(source).is_absolute() {
          relative(map_dir, Path::new(source))
        } else {
          source.to_owned()
        };
        let id = builder.add_source(&name);
        builder.set_source_contents(id, composed.get_source_contents(raw.src_id));
        id
      });
      let name_id = token.get_name().map(|name| builder.add_name(name));
      tokens.push((
        raw.dst_line + position.line,
        raw.dst_col,
        raw.src_line,
        raw.src_col,
        src_id,
        name_id,
      ));
    }
  }

  tokens.sort_by_key(|t| (t.0, t.1));
  tokens.dedup_by_key(|t| (t.0, t.1));
  for (dst_line, dst_col, src_line, src_col, src_id, name_id) in tokens {
    builder.add_raw(
      dst_line,
      dst_col,
      src_line,
      src_col,
      Some(src_id),
      name_id,
      false,
    );
  }
  builder.into_sourcemap()
}
