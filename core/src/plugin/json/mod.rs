use sourcemap::SourceMapBuilder;

use crate::plugin_driver::{Plugin, TransformMap, TransformOutput};
use crate::utils::ast::is_binding_name;
use crate::BuildError;

const DATA: &str = "__json";

pub struct JsonPlugin;

impl Plugin for JsonPlugin {
  fn get_name(&self) -> &'static str {
    "json"
  }

  fn transform(&self, code: &str, id: &str) -> Result<Option<TransformOutput>, BuildError> {
    if !id.ends_with(".json") {
      return Ok(None);
    }
    let json_error = |err: serde_json::Error| BuildError::Json {
      file: id.to_owned(),
      message: err.to_string(),
    };

    let value: serde_json::Value =
      serde_json::from_str(code.trim_start_matches('\u{feff}')).map_err(json_error)?;
    let literal = serde_json::to_string(&value).map_err(json_error)?;

    let mut out = format!("const {} = {}; export default {};", DATA, literal, DATA);
    if let serde_json::Value::Object(object) = &value {
      object
        .keys()
        .filter(|key| is_binding_name(key) && key.as_str() != DATA)
        .for_each(|key| out.push_str(&format!(" export const {} = {}.{};", key, DATA, key)));
    }
    out.push('\n');

    let mut builder = SourceMapBuilder::new(None);
    let src_id = builder.add_source(id);
    builder.add_raw(0, 0, 0, 0, Some(src_id), None, false);

    Ok(Some(TransformOutput::new(
      out,
      TransformMap::Generated(builder.into_sourcemap()),
    )))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn inlines_objects_with_named_exports() {
    let output = JsonPlugin
      .transform("{\n  \"a\": 1,\n  \"b-c\": [true, null],\n  \"default\": 2\n}\n", "/p/data.json")
      .unwrap()
      .unwrap();
    insta::assert_snapshot!(output.code.trim_end(), @r###"const __json = {"a":1,"b-c":[true,null],"default":2}; export default __json; export const a = __json.a;"###);
    assert_eq!(output.code.lines().count(), 1);
  }

  #[test]
  fn non_objects_only_have_a_default_export() {
    let output = JsonPlugin
      .transform("[1, 2]", "/p/list.json")
      .unwrap()
      .unwrap();
    assert_eq!(output.code, "const __json = [1,2]; export default __json;\n");
  }

  #[test]
  fn skips_other_modules_and_rejects_bad_json() {
    assert!(JsonPlugin.transform("{}", "/p/a.ts").unwrap().is_none());
    let err = JsonPlugin.transform("{ a: 1 }", "/p/bad.json").err().unwrap();
    assert!(matches!(err, BuildError::Json { file, .. } if file == "/p/bad.json"));
  }
}
