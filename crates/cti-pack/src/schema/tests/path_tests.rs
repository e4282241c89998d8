use serde_json::json;

use crate::schema::GJsonPath;

#[test]
fn test_root_path() {
  let root = GJsonPath::root();
  assert!(root.is_root());
  assert_eq!(root.as_str(), ".");
  assert_eq!(root.tokens().count(), 0);
}

#[test]
fn test_join_and_item() {
  let path = GJsonPath::root().join("headers").item().join("subject");
  assert_eq!(path.as_str(), ".headers.#.subject");
  let tokens: Vec<_> = path.tokens().collect();
  assert_eq!(tokens, ["headers", "#", "subject"]);
}

#[test]
fn test_lookup_scalar() {
  let document = json!({"name": "alpha", "nested": {"id": 7}});
  let values = GJsonPath::from(".nested.id").lookup(&document);
  assert_eq!(values, [&json!(7)]);
}

#[test]
fn test_lookup_root_returns_document() {
  let document = json!({"a": 1});
  assert_eq!(GJsonPath::root().lookup(&document), [&document]);
}

#[test]
fn test_lookup_fans_out_over_arrays() {
  let document = json!({"items": [{"ref": "a"}, {"ref": "b"}, {"other": 1}]});
  let values = GJsonPath::from(".items.#.ref").lookup(&document);
  assert_eq!(values, [&json!("a"), &json!("b")]);
}

#[test]
fn test_lookup_missing_key_is_empty() {
  let document = json!({"a": 1});
  assert!(GJsonPath::from(".b").lookup(&document).is_empty());
}
