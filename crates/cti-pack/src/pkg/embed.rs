use std::path::Path;

use include_dir::{Dir, include_dir};

/// The RAMLx spec tree shipped with the binary and extracted to `.ramlx/`.
static RAMLX_SPEC: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/assets/ramlx");

/// Replaces `dest` with a fresh copy of the embedded spec. Extraction is
/// idempotent: the resulting tree is byte-identical on every run.
pub fn extract_spec(dest: &Path) -> std::io::Result<()> {
  if dest.exists() {
    std::fs::remove_dir_all(dest)?;
  }
  std::fs::create_dir_all(dest)?;
  RAMLX_SPEC.extract(dest)
}
