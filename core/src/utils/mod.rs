pub mod ast;
pub mod execution_order;
pub mod line_index;
pub mod magic_string;
pub mod nodejs;
pub mod package_json;
pub mod resolve_id;
