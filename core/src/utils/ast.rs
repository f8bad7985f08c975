use std::ops::Range;
use std::path::Path;

use deno_ast::swc::ast::{EsVersion, Module};
use deno_ast::swc::common::{
  sync::Lrc, FileName, Globals, Mark, SourceMap, Span, Spanned, SyntaxContext, GLOBALS,
};
use deno_ast::swc::ecma_visit::VisitMutWith;
use deno_ast::swc::parser::{lexer::Lexer, EsSyntax, Parser, StringInput, Syntax, TsSyntax};
use deno_ast::swc::transforms::resolver;

use crate::utils::line_index::LineIndex;

pub struct ParsedModule {
  pub module: Module,
  start: u32,
  pub unresolved_ctxt: SyntaxContext,
  /// Carried by top-level bindings and every reference to them.
  pub top_level_ctxt: SyntaxContext,
}

impl ParsedModule {
  /// Byte range of `span` in the parsed text.
  #[inline]
  pub fn range(&self, span: Span) -> Range<usize> {
    (span.lo.0 - self.start) as usize..(span.hi.0 - self.start) as usize
  }

  #[inline]
  pub fn span_lo(&self, span: Span) -> usize {
    (span.lo.0 - self.start) as usize
  }

  #[inline]
  pub fn text<'a>(&self, code: &'a str, span: Span) -> &'a str {
    code.get(self.range(span)).unwrap_or_default()
  }
}

#[derive(Debug)]
pub struct SyntaxFailure {
  pub line: usize,
  pub column: usize,
  pub message: String,
}

pub fn syntax_for(id: &str) -> Syntax {
  let ext = Path::new(id)
    .extension()
    .and_then(|ext| ext.to_str())
    .unwrap_or("js");
  match ext {
    "ts" | "mts" | "cts" | "tsx" => Syntax::Typescript(TsSyntax {
      tsx: ext == "tsx",
      decorators: true,
      dts: false,
      no_early_errors: false,
      disallow_ambiguous_jsx_like: false,
    }),
    _ => js_syntax_for(id),
  }
}

/// Grammar for text that has already been through the TypeScript stage.
pub fn js_syntax_for(id: &str) -> Syntax {
  Syntax::Es(EsSyntax {
    jsx: id.ends_with(".jsx"),
    allow_return_outside_function: true,
    ..Default::default()
  })
}

/// Runs `f` with a fresh set of swc globals, needed for marks and hygiene.
pub fn with_globals<R>(f: impl FnOnce() -> R) -> R {
  let globals = Globals::new();
  GLOBALS.set(&globals, f)
}

/// Parses `code` and resolves its scopes. Must run inside [`with_globals`].
/// Identifiers that refer to undeclared globals carry `unresolved_ctxt`,
/// those bound at the top level carry `top_level_ctxt`.
pub fn parse(code: &str, id: &str, syntax: Syntax) -> Result<ParsedModule, SyntaxFailure> {
  let cm: Lrc<SourceMap> = Default::default();
  let fm = cm.new_source_file(FileName::Custom(id.to_owned()).into(), code.to_owned());
  let start = fm.start_pos.0;

  let lexer = Lexer::new(syntax, EsVersion::latest(), StringInput::from(&*fm), None);
  let mut parser = Parser::new_from(lexer);
  let failure = |err: deno_ast::swc::parser::error::Error| {
    let offset = err.span().lo.0.saturating_sub(start) as usize;
    let (line, col) = LineIndex::new(code).position(offset);
    SyntaxFailure {
      line: line as usize + 1,
      column: col as usize + 1,
      message: err.kind().msg().into_owned(),
    }
  };

  let mut module = parser.parse_module().map_err(failure)?;
  if let Some(err) = parser.take_errors().into_iter().next() {
    return Err(failure(err));
  }

  let unresolved_mark = Mark::new();
  let top_level_mark = Mark::new();
  module.visit_mut_with(&mut resolver(unresolved_mark, top_level_mark, false));

  Ok(ParsedModule {
    module,
    start,
    unresolved_ctxt: SyntaxContext::empty().apply_mark(unresolved_mark),
    top_level_ctxt: SyntaxContext::empty().apply_mark(top_level_mark),
  })
}

/// Whether `name` can be written as a plain JavaScript identifier.
pub fn is_identifier_name(name: &str) -> bool {
  let mut chars = name.chars();
  let valid_start = chars
    .next()
    .map_or(false, |c| c == '$' || c == '_' || c.is_alphabetic());
  valid_start && chars.all(|c| c == '$' || c == '_' || c.is_alphanumeric())
}

const RESERVED_WORDS: [&str; 46] = [
  "arguments",
  "await",
  "break",
  "case",
  "catch",
  "class",
  "const",
  "continue",
  "debugger",
  "default",
  "delete",
  "do",
  "else",
  "enum",
  "eval",
  "export",
  "extends",
  "false",
  "finally",
  "for",
  "function",
  "if",
  "implements",
  "import",
  "in",
  "instanceof",
  "interface",
  "let",
  "new",
  "null",
  "package",
  "private",
  "protected",
  "public",
  "return",
  "static",
  "super",
  "switch",
  "this",
  "throw",
  "true",
  "try",
  "typeof",
  "var",
  "void",
  "while",
];

pub fn is_binding_name(name: &str) -> bool {
  is_identifier_name(name) && !RESERVED_WORDS.contains(&name) && name != "with" && name != "yield"
}

/// Renders `name` as a JavaScript string literal.
pub fn quote(name: &str) -> String {
  serde_json::to_string(name).unwrap_or_else(|_| format!("\"{}\"", name))
}
