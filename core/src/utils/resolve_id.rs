use std::collections::HashSet;
use std::path::Path;

use once_cell::sync::Lazy;
use oxc_resolver::{ResolveError, ResolveOptions};

use crate::types::{is_virtual_id, NormalizedInputOptions, ResolvedId, EMPTY_MODULE_PREFIX};
use crate::utils::nodejs::{dirname, normalize_path, relative_id};
use crate::BuildError;

// from require("module").builtinModules
static BUILTIN_MODULES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
  HashSet::from([
    "_http_agent",
    "_http_client",
    "_http_common",
    "_http_incoming",
    "_http_outgoing",
    "_http_server",
    "_stream_duplex",
    "_stream_passthrough",
    "_stream_readable",
    "_stream_transform",
    "_stream_wrap",
    "_stream_writable",
    "_tls_common",
    "_tls_wrap",
    "assert",
    "async_hooks",
    "buffer",
    "child_process",
    "cluster",
    "console",
    "constants",
    "crypto",
    "dgram",
    "diagnostics_channel",
    "dns",
    "domain",
    "events",
    "fs",
    "fs/promises",
    "http",
    "http2",
    "https",
    "inspector",
    "module",
    "net",
    "os",
    "path",
    "perf_hooks",
    "process",
    "punycode",
    "querystring",
    "readline",
    "repl",
    "stream",
    "string_decoder",
    "sys",
    "timers",
    "tls",
    "trace_events",
    "tty",
    "url",
    "util",
    "v8",
    "vm",
    "wasi",
    "worker_threads",
    "zlib",
  ])
});

const EXTENSIONS: [&str; 8] = [".ts", ".tsx", ".mts", ".js", ".jsx", ".mjs", ".cjs", ".json"];

pub fn is_builtin(specifier: &str) -> bool {
  BUILTIN_MODULES.contains(specifier.strip_prefix("node:").unwrap_or(specifier))
}

#[inline]
pub(crate) fn is_path_like(specifier: &str) -> bool {
  specifier == "."
    || specifier == ".."
    || specifier.starts_with("./")
    || specifier.starts_with("../")
    || Path::new(specifier).is_absolute()
}

fn resolve_options(browser: bool) -> ResolveOptions {
  let strings = |items: &[&str]| items.iter().map(|item| item.to_string()).collect::<Vec<_>>();
  let (main_fields, condition_names) = if browser {
    (
      strings(&["browser", "module", "main"]),
      strings(&["browser", "import", "module", "default"]),
    )
  } else {
    (
      strings(&["module", "main"]),
      strings(&["import", "module", "node", "default"]),
    )
  };
  ResolveOptions {
    alias_fields: if browser {
      vec![strings(&["browser"])]
    } else {
      vec![]
    },
    main_fields,
    condition_names,
    extensions: strings(&EXTENSIONS),
    // `./foo.js` written against `foo.ts`
    extension_alias: vec![(".js".to_owned(), strings(&[".js", ".ts", ".tsx"]))],
    modules: strings(&["node_modules"]),
    builtin_modules: false,
    ..Default::default()
  }
}

enum Lookup {
  Found(ResolvedId),
  Missing,
}

pub struct Resolver<'a> {
  options: &'a NormalizedInputOptions,
  resolver: oxc_resolver::Resolver,
  // only applies `browser` field mappings, never searches node_modules
  mapping_resolver: Option<oxc_resolver::Resolver>,
}

impl<'a> Resolver<'a> {
  pub fn new(options: &'a NormalizedInputOptions) -> Self {
    let resolver = oxc_resolver::Resolver::new(resolve_options(options.browser));
    let mapping_resolver = options.browser.then(|| {
      resolver.clone_with_options(ResolveOptions {
        modules: vec![],
        ..resolve_options(true)
      })
    });
    Self {
      options,
      resolver,
      mapping_resolver,
    }
  }

  /// Maps `specifier`, as written in `importer`, to a module id. `Ok(None)`
  /// means no candidate exists.
  pub fn resolve(
    &self,
    specifier: &str,
    importer: Option<&str>,
  ) -> Result<Option<ResolvedId>, BuildError> {
    if self.options.is_external(specifier) {
      log::debug!("[resolve] {} is external", specifier);
      return Ok(Some(ResolvedId::new(specifier, true)));
    }

    let base_dir = importer
      .filter(|importer| !is_virtual_id(importer))
      .map(|importer| dirname(Path::new(importer)).to_path_buf())
      .unwrap_or_else(|| normalize_path(&self.options.cwd));

    let builtin = !is_path_like(specifier) && is_builtin(specifier);
    if builtin && self.options.prefer_builtins {
      // a `browser` mapping still wins over the built-in
      if let Some(mapping_resolver) = &self.mapping_resolver {
        if let Lookup::Found(resolved) = self.lookup(mapping_resolver, &base_dir, specifier) {
          return Ok(Some(resolved));
        }
      }
      return Ok(Some(ResolvedId::new(specifier, true)));
    }

    if let Lookup::Found(resolved) = self.lookup(&self.resolver, &base_dir, specifier) {
      return Ok(Some(resolved));
    }

    if builtin {
      log::warn!(
        "[resolve] treating built-in module {} as external",
        specifier
      );
      return Ok(Some(ResolvedId::new(specifier, true)));
    }

    Ok(None)
  }

  fn lookup(&self, resolver: &oxc_resolver::Resolver, base_dir: &Path, specifier: &str) -> Lookup {
    match resolver.resolve(base_dir, specifier) {
      Ok(resolution) => {
        let path = normalize_path(resolution.path());
        log::debug!("[resolve] {} -> {}", specifier, path.display());
        Lookup::Found(ResolvedId::new(path.to_string_lossy(), false))
      }
      // `"browser": { "x": false }`
      Err(ResolveError::Ignored(path)) => {
        let key = if is_path_like(specifier) {
          relative_id(&path.to_string_lossy(), &self.options.cwd)
        } else {
          specifier.to_owned()
        };
        log::debug!("[resolve] {} is disabled for the browser", specifier);
        Lookup::Found(ResolvedId::new(format!("{}{}", EMPTY_MODULE_PREFIX, key), false))
      }
      Err(ResolveError::NotFound(_)) => Lookup::Missing,
      Err(err) => {
        log::warn!("[resolve] cannot resolve {}: {}", specifier, err);
        Lookup::Missing
      }
    }
  }
}
