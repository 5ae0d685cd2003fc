use crate::ErrorLocation;

use std::panic::Location;

/// **VALUE**: Verifies that a captured location points at the calling line.
///
/// **WHY THIS MATTERS**: Every channel and config error embeds an `ErrorLocation`.
/// Dropped handshakes are only diagnosable from logs, so the location has to name
/// the line that rejected the message rather than the error type's definition.
///
/// **BUG THIS CATCHES**: Would catch if `Location::caller()` stopped being forwarded
/// or if file/line/column were swapped during a refactor.
#[test]
fn given_caller_location_when_converted_then_matches_line_of_capture() {
    // GIVEN: The line we capture on
    let expected_line = line!() + 3;

    // WHEN: Capturing the location
    let location = ErrorLocation::from(Location::caller());

    // THEN: File and line match this test
    assert!(location.file.ends_with("error_location.rs"));
    assert_eq!(location.line, expected_line);
    assert!(location.column > 0, "Column should be 1-based");
}

/// **VALUE**: Verifies the `[file:line:column]` display format used in log lines.
#[test]
fn given_location_when_displayed_then_uses_bracketed_triple() {
    // GIVEN: A fixed location
    let location = ErrorLocation {
        file: "src/endpoint/child.rs",
        line: 42,
        column: 9,
    };

    // WHEN: Formatting
    let formatted = location.to_string();

    // THEN: Bracketed file:line:column
    assert_eq!(formatted, "[src/endpoint/child.rs:42:9]");
}

/// **VALUE**: Verifies that `#[track_caller]` helpers report distinct call sites.
///
/// **BUG THIS CATCHES**: Would catch if a constructor lost `#[track_caller]`, which
/// would make every rejection in an endpoint report the same line.
#[test]
fn given_track_caller_helper_when_called_twice_then_lines_differ() {
    // GIVEN: A helper mirroring the error constructors
    #[track_caller]
    fn raise() -> ErrorLocation {
        ErrorLocation::from(Location::caller())
    }

    // WHEN: Calling from two lines
    let first = raise();
    let second = raise();

    // THEN: Same file, consecutive lines
    assert_eq!(first.file, second.file);
    assert_eq!(first.line + 1, second.line);
}
