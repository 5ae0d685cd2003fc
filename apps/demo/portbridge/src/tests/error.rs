use crate::error::PortbridgeError;

use channel_core::{ChannelError, ConfigError};
use common::ErrorLocation;

use std::panic::Location;

/// **VALUE**: Verifies demo errors serialize with their variant and message.
///
/// **WHY THIS MATTERS**: On failure the demo prints the error as JSON so scripts can
/// tell a timeout from a bad config without parsing log text.
#[test]
fn given_portbridge_error_when_serialized_then_tagged_with_variant() {
    // GIVEN: A timeout
    let err = PortbridgeError::Timeout {
        message: String::from("Host not connected after 5s"),
        location: ErrorLocation::from(Location::caller()),
    };

    // WHEN: Serializing to JSON
    let json = serde_json::to_value(&err).unwrap();

    // THEN: Adjacently tagged
    assert_eq!(json["type"], "Timeout");
    assert_eq!(json["data"]["message"], "Host not connected after 5s");
    assert!(json["data"]["location"]["line"].as_u64().unwrap() > 0);
}

#[test]
fn given_config_error_when_converted_then_config_variant_keeps_reason() {
    let source = ConfigError::ValidationError {
        location: ErrorLocation::from(Location::caller()),
        reason: String::from("Invalid trusted_origin: Wildcard origin is not allowed"),
    };

    let err = PortbridgeError::from(source);

    assert!(matches!(err, PortbridgeError::Config { .. }));
    assert!(err.to_string().contains("Wildcard"));
}

#[test]
fn given_closed_endpoint_when_converted_then_channel_variant() {
    let source = ChannelError::EndpointClosed {
        message: String::from("Parent endpoint has stopped"),
        location: ErrorLocation::from(Location::caller()),
    };

    let err: PortbridgeError = source.into();

    assert!(matches!(err, PortbridgeError::Channel { .. }));
    assert!(err.to_string().starts_with("Channel Error"));
}
