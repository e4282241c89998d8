use crate::{Identifier, ParseError};

#[test]
fn test_parse_root_identifier() {
  let id: Identifier = "cti.a.p.message.v1.0".parse().expect("should parse");
  assert!(id.is_root());
  assert_eq!(id.segments().len(), 1);
  assert_eq!(id.segments()[0].vendor, "a");
  assert_eq!(id.segments()[0].package, "p");
  assert_eq!(id.segments()[0].entity, vec!["message"]);
  assert_eq!(id.to_string(), "cti.a.p.message.v1.0");
}

#[test]
fn test_parse_descendant_chain() {
  let id: Identifier = "cti.x.y.a.v1.0~x.y.b.v1.0~x.y.c.v1.0".parse().expect("should parse");
  assert_eq!(id.segments().len(), 3);
  assert!(!id.is_root());
}

#[test]
fn test_parent_drops_last_segment() {
  let id: Identifier = "cti.x.y.a.v1.0~x.y.b.v1.0~x.y.c.v1.0".parse().expect("should parse");
  assert_eq!(id.parent().to_string(), "cti.x.y.a.v1.0~x.y.b.v1.0");
}

#[test]
fn test_parent_of_root_is_itself() {
  let id: Identifier = "cti.x.y.a.v1.0".parse().expect("should parse");
  assert_eq!(id.parent(), id);
}

#[test]
fn test_base_drops_descendants() {
  let id: Identifier = "cti.x.y.a.v1.0~x.y.b.v1.0~x.y.c.v1.0".parse().expect("should parse");
  assert_eq!(id.base().to_string(), "cti.x.y.a.v1.0");
}

#[test]
fn test_multi_token_entity_names() {
  let id: Identifier = "cti.a.p.settings.email.v2.13".parse().expect("should parse");
  assert_eq!(id.segments()[0].entity, vec!["settings", "email"]);
  let version = id.segments()[0].version.expect("has version");
  assert_eq!(version.major, Some(2));
  assert_eq!(version.minor, Some(13));
}

#[test]
fn test_attribute_selector_suffix() {
  let id: Identifier = "cti.a.p.message.v1.0@headers.subject".parse().expect("should parse");
  assert_eq!(id.attribute(), Some("headers.subject"));
  assert_eq!(id.to_string(), "cti.a.p.message.v1.0@headers.subject");
}

#[test]
fn test_round_trip_is_fixed_point() {
  for raw in [
    "cti.a.p.message.v1.0",
    "cti.x.y.a.v1.0~x.y.b.v1.0",
    "cti.a.p.settings.email.v2.13~a.p.custom.v1.1",
    "cti.a.p.message.v1.0@body",
    "cti.a.p.*",
    "cti.a.p.message.v1.*",
  ] {
    let first: Identifier = raw.parse().expect("should parse");
    let second: Identifier = first.to_string().parse().expect("formatted form should parse");
    assert_eq!(first, second, "round trip failed for {raw}");
  }
}

#[test]
fn test_missing_cti_head() {
  let err = "ct.a.p.message.v1.0".parse::<Identifier>().unwrap_err();
  assert!(matches!(err, ParseError::InvalidStructure(_)));
}

#[test]
fn test_empty_token_position() {
  let err = "cti.a..message.v1.0".parse::<Identifier>().unwrap_err();
  assert_eq!(err, ParseError::EmptyToken(1));
}

#[test]
fn test_invalid_version() {
  for raw in ["cti.a.p.message.v1", "cti.a.p.message.1.0", "cti.a.p.message.vx.0"] {
    let err = raw.parse::<Identifier>().unwrap_err();
    assert!(matches!(err, ParseError::InvalidVersion(_)), "expected version error for {raw}");
  }
}

#[test]
fn test_segment_requires_entity_name() {
  let err = "cti.a.p.v1.0".parse::<Identifier>().unwrap_err();
  assert!(matches!(err, ParseError::InvalidStructure(_)));
}

#[test]
fn test_uppercase_tokens_rejected() {
  let err = "cti.a.p.Message.v1.0".parse::<Identifier>().unwrap_err();
  assert!(matches!(err, ParseError::InvalidStructure(_)));
}

#[test]
fn test_wildcard_only_in_final_segment() {
  let err = "cti.a.p.*~a.p.x.v1.0".parse::<Identifier>().unwrap_err();
  assert!(matches!(err, ParseError::InvalidStructure(_)));
}

#[test]
fn test_pattern_detection() {
  let concrete: Identifier = "cti.a.p.message.v1.0".parse().expect("should parse");
  assert!(!concrete.is_pattern());

  for raw in ["cti.a.p.*", "cti.a.p.message.v1.*", "cti.a.*.message.v1.0"] {
    let pattern: Identifier = raw.parse().expect("should parse");
    assert!(pattern.is_pattern(), "{raw} should be a pattern");
  }
}
