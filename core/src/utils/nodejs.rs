use std::path::{Component, Path, PathBuf};

// https://www.reddit.com/r/rust/comments/hkkquy/anyone_knows_how_to_fscanonicalize_but_without/
#[inline]
pub fn normalize_path(path: &Path) -> PathBuf {
  let mut components = path.components().peekable();
  let mut need_next = false;
  let mut ret = if let Some(c @ Component::Prefix(..)) = components.peek() {
    need_next = true;
    PathBuf::from(c.as_os_str())
  } else {
    PathBuf::new()
  };
  if need_next {
    components.next();
  }
  components.for_each(|component| match component {
    Component::Prefix(..) => {}
    Component::RootDir => {
      ret.push(component.as_os_str());
    }
    Component::CurDir => {}
    Component::ParentDir => {
      ret.pop();
    }
    Component::Normal(c) => {
      ret.push(c);
    }
  });
  ret
}

#[inline]
pub fn join(p1: &Path, p2: &Path) -> PathBuf {
  let p = Path::new(p1).join(p2);
  normalize_path(&p)
}

#[inline]
pub fn dirname(path: &Path) -> &Path {
  path.parent().unwrap_or(path)
}

/// `path.relative(from, to)` with `/` separators, for ids and source map entries.
pub fn relative(from: &Path, to: &Path) -> String {
  let from = normalize_path(from);
  let to = normalize_path(to);
  let from_parts = from.components().collect::<Vec<_>>();
  let to_parts = to.components().collect::<Vec<_>>();
  let common = from_parts
    .iter()
    .zip(to_parts.iter())
    .take_while(|(a, b)| a == b)
    .count();

  let mut parts = vec![String::from(".."); from_parts.len() - common];
  parts.extend(
    to_parts[common..]
      .iter()
      .map(|c| c.as_os_str().to_string_lossy().into_owned()),
  );
  parts.join("/")
}

pub fn relative_id(id: &str, cwd: &Path) -> String {
  let path = Path::new(id);
  if path.is_absolute() {
    relative(cwd, path)
  } else {
    id.to_owned()
  }
}
