use std::collections::HashSet;
use std::ops::Range;

use deno_ast::swc::ast::{
  CallExpr, Callee, Decl, DefaultDecl, Expr, Ident, ImportDecl, ImportSpecifier, Lit, ModuleDecl,
  ModuleExportName, ModuleItem, NamedExport, ObjectPatProp, Pat, Prop, Str,
};
use deno_ast::swc::common::Spanned;
use deno_ast::swc::ecma_visit::{Visit, VisitWith};

use crate::utils::ast::{self, ParsedModule};
use crate::BuildError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Imported {
  Default,
  Named(String),
  Namespace,
}

impl Imported {
  pub(crate) fn from_name(name: String) -> Self {
    if name == "default" {
      Imported::Default
    } else {
      Imported::Named(name)
    }
  }
}

#[derive(Debug, Clone)]
pub struct ImportBinding {
  pub local: String,
  pub imported: Imported,
}

#[derive(Debug, Clone)]
pub struct ImportRecord {
  pub source: String,
  pub range: Range<usize>,
  pub bindings: Vec<ImportBinding>,
}

#[derive(Debug, Clone)]
pub enum ExportRecord {
  /// `export const a = 1`, `export function f() {}`; `keyword` covers `export `.
  Decl {
    keyword: Range<usize>,
    names: Vec<String>,
  },
  /// `export default function f() {}` with a name to bind.
  DefaultDecl {
    keyword: Range<usize>,
    local: String,
  },
  /// `export default <expr>` and anonymous default functions and classes.
  DefaultExpr {
    keyword: Range<usize>,
    end: usize,
  },
  /// `export { a as b }`, as (exported, local) pairs.
  Named {
    range: Range<usize>,
    specifiers: Vec<(String, String)>,
  },
  /// `export { a as b } from 'x'` and `export * as ns from 'x'`.
  ReExport {
    range: Range<usize>,
    source: String,
    specifiers: Vec<(String, Imported)>,
  },
  /// `export * from 'x'`
  Star { range: Range<usize>, source: String },
}

#[derive(Debug, Clone)]
pub struct DynamicImport {
  pub range: Range<usize>,
  pub source: String,
}

/// An identifier bound at the top level of the module, where it is declared,
/// imported or used.
#[derive(Debug, Clone)]
pub struct BindingReference {
  pub range: Range<usize>,
  pub local: String,
  // `{ foo }` has to become `{ foo: <replacement> }`
  pub shorthand: bool,
}

/// Static module structure of a transformed module.
#[derive(Debug, Clone, Default)]
pub struct ModuleScan {
  pub imports: Vec<ImportRecord>,
  pub exports: Vec<ExportRecord>,
  pub dynamic_imports: Vec<DynamicImport>,
  pub references: Vec<BindingReference>,
  /// Free variables the module reads, first use first.
  pub globals: Vec<String>,
}

impl ModuleScan {
  /// Specifiers of `import` and `export ... from`, in source order, without repeats.
  pub fn static_sources(&self) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut ranked = self
      .imports
      .iter()
      .map(|i| (i.range.start, &i.source))
      .chain(self.exports.iter().filter_map(|e| match e {
        ExportRecord::ReExport { range, source, .. } | ExportRecord::Star { range, source } => {
          Some((range.start, source))
        }
        _ => None,
      }))
      .collect::<Vec<_>>();
    ranked.sort_by_key(|(start, _)| *start);
    ranked
      .into_iter()
      .map(|(_, source)| source)
      .filter(|source| seen.insert(source.to_string()))
      .cloned()
      .collect()
  }

  /// Every specifier the module depends on: static ones first, then those
  /// only reached through `import()`.
  pub fn sources(&self) -> Vec<String> {
    let mut sources = self.static_sources();
    for dynamic in &self.dynamic_imports {
      if !sources.contains(&dynamic.source) {
        sources.push(dynamic.source.clone());
      }
    }
    sources
  }

  pub fn has_module_syntax(&self) -> bool {
    !self.imports.is_empty() || !self.exports.is_empty()
  }

  /// The import record and binding that introduce `local`, if it is imported.
  pub fn import_binding(&self, local: &str) -> Option<(&ImportRecord, &ImportBinding)> {
    self.imports.iter().find_map(|import| {
      import
        .bindings
        .iter()
        .find(|binding| binding.local == local)
        .map(|binding| (import, binding))
    })
  }

  /// Top-level names the module declares itself, in source order.
  pub fn declared_names(&self) -> Vec<String> {
    let imported = self
      .imports
      .iter()
      .flat_map(|import| import.bindings.iter().map(|binding| binding.local.as_str()))
      .collect::<HashSet<_>>();
    let mut seen = HashSet::new();
    self
      .references
      .iter()
      .filter(|reference| !imported.contains(reference.local.as_str()))
      .filter(|reference| seen.insert(reference.local.as_str()))
      .map(|reference| reference.local.clone())
      .collect()
  }
}

/// Text value of a string literal, read from its source.
pub(crate) fn str_value(parsed: &ParsedModule, code: &str, s: &Str) -> String {
  unquote(parsed.text(code, s.span))
}

fn unquote(raw: &str) -> String {
  if raw.starts_with('"') {
    if let Ok(value) = serde_json::from_str::<String>(raw) {
      return value;
    }
  }
  let inner = raw.get(1..raw.len().saturating_sub(1)).unwrap_or_default();
  let mut value = String::with_capacity(inner.len());
  let mut chars = inner.chars().peekable();
  while let Some(c) = chars.next() {
    if c != '\\' {
      value.push(c);
      continue;
    }
    match chars.next() {
      Some('n') => value.push('\n'),
      Some('r') => value.push('\r'),
      Some('t') => value.push('\t'),
      Some('b') => value.push('\u{8}'),
      Some('f') => value.push('\u{c}'),
      Some('v') => value.push('\u{b}'),
      Some('0') => value.push('\0'),
      Some('x') => push_code_unit(&mut value, take_hex(&mut chars, 2)),
      Some('u') => {
        let unit = if chars.peek() == Some(&'{') {
          chars.next();
          let digits = chars.by_ref().take_while(|c| *c != '}').collect::<String>();
          u32::from_str_radix(&digits, 16).ok()
        } else {
          take_hex(&mut chars, 4)
        };
        match unit {
          // a surrogate pair spelled as two escapes
          Some(high @ 0xD800..=0xDBFF) => {
            let mut rest = chars.clone();
            let low = match (rest.next(), rest.next()) {
              (Some('\\'), Some('u')) => take_hex(&mut rest, 4),
              _ => None,
            };
            match low {
              Some(low @ 0xDC00..=0xDFFF) => {
                chars = rest;
                push_code_unit(&mut value, Some(0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)));
              }
              _ => push_code_unit(&mut value, None),
            }
          }
          unit => push_code_unit(&mut value, unit),
        }
      }
      // line continuation
      Some('\n') => {}
      Some('\r') => {
        if chars.peek() == Some(&'\n') {
          chars.next();
        }
      }
      Some(other) => value.push(other),
      None => {}
    }
  }
  value
}

fn take_hex(chars: &mut std::iter::Peekable<std::str::Chars>, len: usize) -> Option<u32> {
  let digits = (0..len).filter_map(|_| chars.next()).collect::<String>();
  if digits.len() != len {
    return None;
  }
  u32::from_str_radix(&digits, 16).ok()
}

fn push_code_unit(value: &mut String, unit: Option<u32>) {
  value.push(unit.and_then(char::from_u32).unwrap_or('\u{fffd}'));
}

fn export_name(parsed: &ParsedModule, code: &str, name: &ModuleExportName) -> String {
  match name {
    ModuleExportName::Ident(ident) => parsed.text(code, ident.span).to_owned(),
    ModuleExportName::Str(s) => str_value(parsed, code, s),
    #[allow(unreachable_patterns)]
    _ => String::new(),
  }
}

fn collect_pat_names(parsed: &ParsedModule, code: &str, pat: &Pat, names: &mut Vec<String>) {
  match pat {
    Pat::Ident(binding) => names.push(parsed.text(code, binding.id.span).to_owned()),
    Pat::Array(array) => array
      .elems
      .iter()
      .flatten()
      .for_each(|elem| collect_pat_names(parsed, code, elem, names)),
    Pat::Rest(rest) => collect_pat_names(parsed, code, &rest.arg, names),
    Pat::Object(object) => object.props.iter().for_each(|prop| match prop {
      ObjectPatProp::KeyValue(kv) => collect_pat_names(parsed, code, &kv.value, names),
      ObjectPatProp::Assign(assign) => names.push(parsed.text(code, assign.key.id.span).to_owned()),
      ObjectPatProp::Rest(rest) => collect_pat_names(parsed, code, &rest.arg, names),
    }),
    Pat::Assign(assign) => collect_pat_names(parsed, code, &assign.left, names),
    _ => {}
  }
}

pub struct Scanner<'a> {
  parsed: &'a ParsedModule,
  code: &'a str,
  globals: HashSet<String>,
  pub result: ModuleScan,
}

impl<'a> Scanner<'a> {
  pub fn new(parsed: &'a ParsedModule, code: &'a str) -> Self {
    Self {
      parsed,
      code,
      globals: HashSet::default(),
      result: ModuleScan::default(),
    }
  }

  fn is_top_level(&self, ident: &Ident) -> bool {
    ident.ctxt == self.parsed.top_level_ctxt
  }

  fn add_reference(&mut self, ident: &Ident, shorthand: bool) {
    self.result.references.push(BindingReference {
      range: self.parsed.range(ident.span),
      local: self.text(ident),
      shorthand,
    });
  }

  fn text(&self, ident: &Ident) -> String {
    self.parsed.text(self.code, ident.span).to_owned()
  }

  fn scan_import(&mut self, decl: &ImportDecl) {
    if decl.type_only {
      return;
    }
    let bindings = decl
      .specifiers
      .iter()
      .filter_map(|specifier| {
        let (local, imported) = match specifier {
          ImportSpecifier::Named(named) => {
            if named.is_type_only {
              return None;
            }
            let imported = named
              .imported
              .as_ref()
              .map(|name| export_name(self.parsed, self.code, name))
              .unwrap_or_else(|| self.text(&named.local));
            (&named.local, Imported::from_name(imported))
          }
          ImportSpecifier::Default(default) => (&default.local, Imported::Default),
          ImportSpecifier::Namespace(namespace) => (&namespace.local, Imported::Namespace),
        };
        Some(ImportBinding {
          local: self.text(local),
          imported,
        })
      })
      .collect();

    self.result.imports.push(ImportRecord {
      source: str_value(self.parsed, self.code, &decl.src),
      range: self.parsed.range(decl.span),
      bindings,
    });
  }

  fn scan_named_export(&mut self, export: &NamedExport) {
    if export.type_only {
      return;
    }
    let range = self.parsed.range(export.span);
    match &export.src {
      Some(src) => {
        let specifiers = export
          .specifiers
          .iter()
          .filter_map(|specifier| match specifier {
            deno_ast::swc::ast::ExportSpecifier::Named(named) if !named.is_type_only => {
              let orig = export_name(self.parsed, self.code, &named.orig);
              let exported = named
                .exported
                .as_ref()
                .map(|name| export_name(self.parsed, self.code, name))
                .unwrap_or_else(|| orig.clone());
              Some((exported, Imported::from_name(orig)))
            }
            deno_ast::swc::ast::ExportSpecifier::Namespace(namespace) => Some((
              export_name(self.parsed, self.code, &namespace.name),
              Imported::Namespace,
            )),
            deno_ast::swc::ast::ExportSpecifier::Default(default) => {
              Some((self.text(&default.exported), Imported::Default))
            }
            _ => None,
          })
          .collect();
        self.result.exports.push(ExportRecord::ReExport {
          range,
          source: str_value(self.parsed, self.code, src),
          specifiers,
        });
      }
      None => {
        let specifiers = export
          .specifiers
          .iter()
          .filter_map(|specifier| match specifier {
            deno_ast::swc::ast::ExportSpecifier::Named(named) if !named.is_type_only => {
              let local = export_name(self.parsed, self.code, &named.orig);
              let exported = named
                .exported
                .as_ref()
                .map(|name| export_name(self.parsed, self.code, name))
                .unwrap_or_else(|| local.clone());
              Some((exported, local))
            }
            _ => None,
          })
          .collect();
        self
          .result
          .exports
          .push(ExportRecord::Named { range, specifiers });
      }
    }
  }

  fn scan_module_decl(&mut self, decl: &ModuleDecl) {
    match decl {
      ModuleDecl::Import(import) => self.scan_import(import),
      ModuleDecl::ExportNamed(export) => self.scan_named_export(export),
      ModuleDecl::ExportAll(export) if !export.type_only => {
        self.result.exports.push(ExportRecord::Star {
          range: self.parsed.range(export.span),
          source: str_value(self.parsed, self.code, &export.src),
        })
      }
      ModuleDecl::ExportDecl(export) => {
        let keyword = self.parsed.span_lo(export.span)..self.parsed.span_lo(export.decl.span());
        let mut names = vec![];
        match &export.decl {
          Decl::Var(var) => var
            .decls
            .iter()
            .for_each(|d| collect_pat_names(self.parsed, self.code, &d.name, &mut names)),
          Decl::Fn(f) => names.push(self.text(&f.ident)),
          Decl::Class(c) => names.push(self.text(&c.ident)),
          _ => return,
        }
        self.result.exports.push(ExportRecord::Decl { keyword, names });
      }
      ModuleDecl::ExportDefaultDecl(export) => {
        let keyword = self.parsed.span_lo(export.span)..self.parsed.span_lo(export.decl.span());
        let ident = match &export.decl {
          DefaultDecl::Fn(f) => f.ident.as_ref(),
          DefaultDecl::Class(c) => c.ident.as_ref(),
          _ => return,
        };
        let record = match ident {
          Some(ident) => ExportRecord::DefaultDecl {
            keyword,
            local: self.text(ident),
          },
          None => ExportRecord::DefaultExpr {
            keyword,
            end: self.parsed.range(export.span).end,
          },
        };
        self.result.exports.push(record);
      }
      ModuleDecl::ExportDefaultExpr(export) => {
        self.result.exports.push(ExportRecord::DefaultExpr {
          keyword: self.parsed.span_lo(export.span)..self.parsed.span_lo(export.expr.span()),
          end: self.parsed.range(export.span).end,
        });
      }
      _ => {}
    }
  }
}

impl<'a> Visit for Scanner<'a> {
  fn visit_import_decl(&mut self, _: &ImportDecl) {}

  fn visit_named_export(&mut self, export: &NamedExport) {
    // `export { a }` is re-expressed from the export record
    if export.src.is_none() {
      return;
    }
    export.visit_children_with(self);
  }

  fn visit_prop(&mut self, prop: &Prop) {
    if let Prop::Shorthand(ident) = prop {
      if self.is_top_level(ident) {
        self.add_reference(ident, true);
      } else {
        self.visit_ident(ident);
      }
      return;
    }
    prop.visit_children_with(self);
  }

  fn visit_object_pat_prop(&mut self, prop: &ObjectPatProp) {
    if let ObjectPatProp::Assign(assign) = prop {
      if self.is_top_level(&assign.key.id) {
        self.add_reference(&assign.key.id, true);
      }
      if let Some(value) = &assign.value {
        value.visit_with(self);
      }
      return;
    }
    prop.visit_children_with(self);
  }

  fn visit_ident(&mut self, ident: &Ident) {
    if self.is_top_level(ident) {
      self.add_reference(ident, false);
    } else if ident.ctxt == self.parsed.unresolved_ctxt {
      let name = self.text(ident);
      if self.globals.insert(name.clone()) {
        self.result.globals.push(name);
      }
    }
  }

  fn visit_call_expr(&mut self, call: &CallExpr) {
    if let Callee::Import(_) = &call.callee {
      match call.args.first().map(|arg| &*arg.expr) {
        Some(Expr::Lit(Lit::Str(s))) if call.args.len() == 1 => {
          self.result.dynamic_imports.push(DynamicImport {
            range: self.parsed.range(call.span),
            source: str_value(self.parsed, self.code, s),
          });
        }
        _ => log::warn!("[scanner] dynamic import with a non-literal argument is left as is"),
      }
    }
    call.visit_children_with(self);
  }
}

/// Scans the static imports and exports of a transformed module.
pub fn scan(code: &str, id: &str) -> Result<ModuleScan, BuildError> {
  ast::with_globals(|| {
    let parsed = ast::parse(code, id, ast::js_syntax_for(id)).map_err(|failure| BuildError::Parse {
      file: id.to_owned(),
      line: failure.line,
      column: failure.column,
      message: failure.message,
    })?;
    Ok(scan_parsed(&parsed, code))
  })
}

pub fn scan_parsed(parsed: &ParsedModule, code: &str) -> ModuleScan {
  let mut scanner = Scanner::new(parsed, code);
  parsed.module.body.iter().for_each(|item| {
    if let ModuleItem::ModuleDecl(decl) = item {
      scanner.scan_module_decl(decl);
    }
  });
  parsed.module.visit_with(&mut scanner);
  scanner.result.references.sort_by_key(|r| r.range.start);
  scanner.result
}

#[cfg(test)]
mod tests {
  use super::*;

  fn scan_js(code: &str) -> ModuleScan {
    scan(code, "/p/mod.js").unwrap()
  }

  #[test]
  fn collects_imports_and_references() {
    let code = r#"import def, { a as b, c } from './dep';
import * as ns from "ext";
import './side';
const obj = { c, d: b };
function shadow(c) { return c; }
export default ns.run(def);
"#;
    let scan = scan_js(code);
    assert_eq!(scan.sources(), vec!["./dep", "ext", "./side"]);
    assert_eq!(scan.imports.len(), 3);
    let bindings = &scan.imports[0].bindings;
    assert_eq!(bindings[0].local, "def");
    assert_eq!(bindings[0].imported, Imported::Default);
    assert_eq!(bindings[1].local, "b");
    assert_eq!(bindings[1].imported, Imported::Named("a".to_owned()));
    assert_eq!(scan.imports[1].bindings[0].imported, Imported::Namespace);
    assert!(scan.imports[2].bindings.is_empty());

    let refs = scan
      .references
      .iter()
      .map(|r| (r.local.as_str(), r.shorthand))
      .collect::<Vec<_>>();
    // the shadowed `c` inside `shadow` is not a top-level binding
    assert_eq!(
      refs,
      vec![
        ("obj", false),
        ("c", true),
        ("b", false),
        ("shadow", false),
        ("ns", false),
        ("def", false)
      ]
    );
    assert_eq!(scan.declared_names(), vec!["obj", "shadow"]);
    assert!(scan.import_binding("b").is_some());
    assert!(scan.import_binding("obj").is_none());
  }

  #[test]
  fn collects_globals_and_pattern_shorthands() {
    let code = "const { a = 1, b: [c] } = source;
function f() { return console.log(a, c, window); }
console.log(f);
";
    let scan = scan_js(code);
    assert_eq!(scan.globals, vec!["source", "console", "window"]);
    let refs = scan
      .references
      .iter()
      .map(|r| (r.local.as_str(), r.shorthand))
      .collect::<Vec<_>>();
    assert_eq!(
      refs,
      vec![
        ("a", true),
        ("c", false),
        ("f", false),
        ("a", false),
        ("c", false),
        ("f", false)
      ]
    );
    assert_eq!(scan.declared_names(), vec!["a", "c", "f"]);
  }

  #[test]
  fn collects_export_forms() {
    let code = r#"export const x = 1, { y, z: [w] } = obj;
export function f() {}
export class K {}
export { x as renamed, f as "string name" };
export { a as b, default as d } from './a';
export * as space from './b';
export * from './c';
export default function () {}
"#;
    let scan = scan_js(code);
    assert_eq!(scan.sources(), vec!["./a", "./b", "./c"]);
    match &scan.exports[0] {
      ExportRecord::Decl { keyword, names } => {
        assert_eq!(&code[keyword.clone()], "export ");
        assert_eq!(names, &vec!["x".to_owned(), "y".to_owned(), "w".to_owned()]);
      }
      other => panic!("unexpected {:?}", other),
    }
    match &scan.exports[3] {
      ExportRecord::Named { specifiers, .. } => assert_eq!(
        specifiers,
        &vec![
          ("renamed".to_owned(), "x".to_owned()),
          ("string name".to_owned(), "f".to_owned())
        ]
      ),
      other => panic!("unexpected {:?}", other),
    }
    match &scan.exports[4] {
      ExportRecord::ReExport { specifiers, source, .. } => {
        assert_eq!(source, "./a");
        assert_eq!(
          specifiers,
          &vec![
            ("b".to_owned(), Imported::Named("a".to_owned())),
            ("d".to_owned(), Imported::Default)
          ]
        );
      }
      other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(&scan.exports[5], ExportRecord::ReExport { specifiers, .. } if specifiers[0].1 == Imported::Namespace));
    assert!(matches!(&scan.exports[6], ExportRecord::Star { source, .. } if source == "./c"));
    match &scan.exports[7] {
      ExportRecord::DefaultExpr { keyword, .. } => {
        assert_eq!(code[keyword.clone()].trim_end(), "export default")
      }
      other => panic!("unexpected {:?}", other),
    }
  }

  #[test]
  fn finds_literal_dynamic_imports() {
    let scan = scan_js("const later = () => import('./lazy');\n");
    assert_eq!(scan.dynamic_imports.len(), 1);
    assert_eq!(scan.sources(), vec!["./lazy"]);
    assert!(!scan.has_module_syntax());
  }

  #[test]
  fn unquotes_single_quoted_strings() {
    assert_eq!(unquote("'it\\'s'"), "it's");
    assert_eq!(unquote("\"a\\nb\""), "a\nb");
    assert_eq!(unquote("'a\\nb'"), "a\nb");
    assert_eq!(unquote("'\\t\\r\\0\\v\\b\\f'"), "\t\r\0\u{b}\u{8}\u{c}");
    assert_eq!(unquote("'\\x41\\u0042\\u{1F600}'"), "AB\u{1F600}");
    assert_eq!(unquote("'\\uD83D\\uDE00'"), "\u{1F600}");
    assert_eq!(unquote("'line\\\ncontinued'"), "linecontinued");
    assert_eq!(unquote("'\\q'"), "q");
  }

  #[test]
  fn escaped_specifiers_resolve_to_their_value() {
    let scan = scan_js("import x from '.\\x2Fdep';\nexport default x;\n");
    assert_eq!(scan.sources(), vec!["./dep"]);
  }
}
