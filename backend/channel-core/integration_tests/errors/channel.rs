use channel_core::ChannelError;
use common::ErrorLocation;
use models::ModelError;

use std::panic::Location;

use log::Level;

/// **VALUE**: Verifies channel errors render their kind, message and location.
///
/// **WHY THIS MATTERS**: Channel errors never reach the application; they only
/// show up in logs. A log line without the rejecting call site is close to useless
/// when several places can drop the same message.
///
/// **BUG THIS CATCHES**: Would catch a variant losing its `location` field or a
/// Display format that drops it.
#[test]
#[track_caller]
fn given_origin_mismatch_when_formatted_then_includes_location() {
    // GIVEN: An origin mismatch with location
    let location = ErrorLocation::from(Location::caller());
    let err = ChannelError::OriginMismatch {
        message: "Handshake from https://evil.example rejected".to_string(),
        location,
    };

    // WHEN: Formatting
    let error_string = format!("{}", err);

    // THEN: Kind, message and file
    assert!(error_string.contains("Origin Mismatch Error"));
    assert!(error_string.contains("https://evil.example"));
    assert!(error_string.contains("channel.rs"));
}

/// **VALUE**: Verifies the log level assigned to each kind of dropped message.
///
/// **WHY THIS MATTERS**: Session mismatches are expected on every reconnect and
/// would flood logs at a higher level; origin rejections are security relevant and
/// must not be hidden at `Trace`.
#[test]
fn given_each_variant_when_severity_queried_then_matches_expected_level() {
    let location = ErrorLocation::from(Location::caller());
    let cases = [
        (
            ChannelError::SessionMismatch {
                message: String::new(),
                location,
            },
            Level::Trace,
        ),
        (
            ChannelError::Malformed {
                message: String::new(),
                location,
            },
            Level::Debug,
        ),
        (
            ChannelError::TargetUnreachable {
                message: String::new(),
                location,
            },
            Level::Debug,
        ),
        (
            ChannelError::PortClosed {
                message: String::new(),
                location,
            },
            Level::Debug,
        ),
        (
            ChannelError::OriginMismatch {
                message: String::new(),
                location,
            },
            Level::Warn,
        ),
        (
            ChannelError::MissingEndpoint {
                message: String::new(),
                location,
            },
            Level::Warn,
        ),
        (
            ChannelError::EndpointClosed {
                message: String::new(),
                location,
            },
            Level::Error,
        ),
    ];

    for (error, level) in cases {
        assert_eq!(error.severity(), level, "Wrong severity for {error:?}");
    }
}

#[test]
fn given_model_error_when_converted_then_malformed_with_original_message() {
    // GIVEN: A wire decode failure
    let model_error = ModelError::Malformed {
        message: "unknown variant `PING`".to_string(),
        location: ErrorLocation::from(Location::caller()),
    };

    // WHEN: Converting
    let err = ChannelError::from(model_error);

    // THEN: Malformed, message kept
    assert!(matches!(err, ChannelError::Malformed { .. }));
    assert!(err.to_string().contains("PING"));
}
