use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use sourcemap::{DecodedMap, SourceMap};

use crate::plugin_driver::{Plugin, TransformMap, TransformOutput};
use crate::types::is_virtual_id;
use crate::utils::nodejs::{dirname, join, normalize_path};
use crate::BuildError;

static SOURCE_MAPPING_URL: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"(?m)^[ \t]*//[#@][ \t]+sourceMappingURL=(\S+)[ \t]*\r?$").unwrap()
});

/// Bytes carried by a `data:` URL, base64 or percent encoded.
fn data_url_payload(url: &str) -> Result<Vec<u8>, String> {
  let rest = url
    .strip_prefix("data:")
    .ok_or_else(|| format!("not a data URL: {}", url))?;
  let (media, payload) = rest
    .split_once(',')
    .ok_or_else(|| String::from("data URL without a payload"))?;
  // `application/json;charset=utf-8;base64`
  let mut params = media.split(';').map(str::trim);
  let media_type = params.next().unwrap_or_default();
  if !media_type.is_empty() && !media_type.to_ascii_lowercase().contains("json") {
    log::warn!("[sourcemaps] reading a {} data URL as a source map", media_type);
  }
  if params.any(|param| param.eq_ignore_ascii_case("base64")) {
    base64::prelude::BASE64_STANDARD
      .decode(payload.trim())
      .map_err(|err| err.to_string())
  } else {
    Ok(urlencoding::decode_binary(payload.as_bytes()).into_owned())
  }
}

/// Picks up source maps that pre-built dependencies ship next to their code,
/// so the final maps can point into their original sources.
pub struct SourceMapsPlugin;

impl SourceMapsPlugin {
  fn decode(id: &str, url: &str) -> Result<Option<(SourceMap, PathBuf)>, BuildError> {
    let invalid = |message: String| BuildError::SourceMap {
      file: id.to_owned(),
      message,
    };
    let module_dir = dirname(Path::new(id)).to_path_buf();

    let (decoded, map_dir) = if url.starts_with("data:") {
      let payload = data_url_payload(url).map_err(invalid)?;
      let decoded = sourcemap::decode_slice(&payload).map_err(|err| invalid(err.to_string()))?;
      (decoded, module_dir)
    } else {
      let map_path = normalize_path(&join(&module_dir, Path::new(url)));
      let bytes = match fs::read(&map_path) {
        Ok(bytes) => bytes,
        Err(err) => {
          log::warn!(
            "[sourcemaps] {} references {} which could not be read: {}",
            id,
            map_path.display(),
            err
          );
          return Ok(None);
        }
      };
      let decoded = sourcemap::decode_slice(&bytes).map_err(|err| invalid(err.to_string()))?;
      (decoded, dirname(&map_path).to_path_buf())
    };

    let map = match decoded {
      DecodedMap::Regular(map) => map,
      DecodedMap::Index(index) => index.flatten().map_err(|err| invalid(err.to_string()))?,
      _ => return Err(invalid(String::from("unsupported source map flavor"))),
    };
    Ok(Some((map, map_dir)))
  }

  /// Rewrites the map's sources to absolute paths and fills in missing contents.
  fn absolutize(map: &mut SourceMap, map_dir: &Path) {
    let sources = (0..map.get_source_count())
      .map(|idx| map.get_source(idx).unwrap_or_default().to_owned())
      .collect::<Vec<_>>();
    map.set_source_root(None::<&str>);

    for (idx, source) in sources.into_iter().enumerate() {
      let idx = idx as u32;
      let path = match source.strip_prefix("file://") {
        Some(path) => PathBuf::from(path),
        None if source.contains("://") => continue,
        None => normalize_path(&join(map_dir, Path::new(&source))),
      };
      map.set_source(idx, &path.to_string_lossy());
      if map.get_source_contents(idx).is_none() {
        if let Ok(contents) = fs::read_to_string(&path) {
          map.set_source_contents(idx, Some(&contents));
        }
      }
    }
  }
}

impl Plugin for SourceMapsPlugin {
  fn get_name(&self) -> &'static str {
    "sourcemaps"
  }

  fn transform(&self, code: &str, id: &str) -> Result<Option<TransformOutput>, BuildError> {
    if is_virtual_id(id) {
      return Ok(None);
    }
    let found = match SOURCE_MAPPING_URL.captures_iter(code).last() {
      Some(found) => found,
      None => return Ok(None),
    };
    let (comment, url) = match (found.get(0), found.get(1)) {
      (Some(comment), Some(url)) => (comment.range(), url.as_str()),
      _ => return Ok(None),
    };

    let (mut map, map_dir) = match Self::decode(id, url)? {
      Some(decoded) => decoded,
      None => return Ok(None),
    };
    Self::absolutize(&mut map, &map_dir);
    log::debug!(
      "[sourcemaps] {} maps back to {} sources",
      id,
      map.get_source_count()
    );

    let mut stripped = String::with_capacity(code.len());
    stripped.push_str(&code[..comment.start]);
    stripped.push_str(&code[comment.end..]);
    Ok(Some(TransformOutput::new(
      stripped,
      TransformMap::Upstream(map),
    )))
  }
}
