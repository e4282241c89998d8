use std::{path::Path, sync::LazyLock};

use regex::Regex;

static LOCAL_LINK_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?:\.\./)*\.(?:dep|ramlx)/").expect("static regex compiles"));

/// Rewrites `.dep/` and `.ramlx/` links so they resolve from one directory
/// deeper, the position an installed dependency occupies relative to its
/// original checkout.
pub fn patch_links(content: &str) -> String {
  LOCAL_LINK_RE.replace_all(content, |captures: &regex::Captures<'_>| format!("../{}", &captures[0])).into_owned()
}

/// Applies [`patch_links`] to every `.raml` file under `root`.
pub fn patch_tree(root: &Path) -> std::io::Result<()> {
  for entry in walkdir::WalkDir::new(root).into_iter().filter_map(Result::ok) {
    if !entry.file_type().is_file() || entry.path().extension().and_then(|e| e.to_str()) != Some("raml") {
      continue;
    }
    let content = std::fs::read_to_string(entry.path())?;
    let patched = patch_links(&content);
    if patched != content {
      std::fs::write(entry.path(), patched)?;
    }
  }
  Ok(())
}
