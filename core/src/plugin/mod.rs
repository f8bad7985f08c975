mod commonjs;
mod json;
mod sourcemaps;
mod typescript;

pub use commonjs::CommonJsPlugin;
pub use json::JsonPlugin;
pub use sourcemaps::SourceMapsPlugin;
pub use typescript::TypeScriptPlugin;
