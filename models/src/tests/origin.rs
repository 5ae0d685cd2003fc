use crate::{ModelError, Origin};

/// **VALUE**: Verifies that the wildcard origin is rejected.
///
/// **WHY THIS MATTERS**: Broadcasting a handshake to `*` hands the private port to
/// whatever document happens to be loaded in the frame. An `Origin` must never be
/// able to represent "anyone".
///
/// **BUG THIS CATCHES**: Would catch if the wildcard check is removed and `*`
/// reaches `Url::parse` (which would also fail, but with a misleading message), or
/// if someone adds a special-case constructor for it.
#[test]
fn given_wildcard_when_parsing_origin_then_returns_validation_error() {
    // GIVEN/WHEN: Parsing "*"
    let result = Origin::parse("*");

    // THEN: Explicit wildcard rejection
    match result {
        Err(ModelError::Validation { message, .. }) => {
            assert_eq!(message, "Wildcard origin is not allowed");
        }
        other => panic!("Expected validation error, got {other:?}"),
    }
}

#[test]
fn given_url_with_path_when_parsing_origin_then_keeps_scheme_host_port_only() {
    let origin = Origin::parse("http://localhost:3000/iframe?debug=1").unwrap();

    assert_eq!(origin.as_str(), "http://localhost:3000");
}

#[test]
fn given_default_port_when_parsing_origin_then_port_is_omitted() {
    let origin = Origin::parse("https://host.test:443").unwrap();

    assert_eq!(origin, Origin::parse("https://host.test").unwrap());
    assert_eq!(origin.to_string(), "https://host.test");
}

/// **VALUE**: Verifies that opaque origins are rejected.
///
/// **BUG THIS CATCHES**: Would catch if `data:` or `file:` URLs were accepted as a
/// trusted origin; their serialization is `null`, which would compare equal to any
/// other opaque sender.
#[test]
fn given_opaque_url_when_parsing_origin_then_returns_validation_error() {
    let result = Origin::parse("data:text/plain,hello");

    assert!(matches!(result, Err(ModelError::Validation { .. })));
}

#[test]
fn given_origin_json_when_deserialized_then_is_normalised() {
    let origin: Origin = serde_json::from_str("\"http://LOCALHOST:3000/\"").unwrap();

    assert_eq!(origin.as_str(), "http://localhost:3000");
}
