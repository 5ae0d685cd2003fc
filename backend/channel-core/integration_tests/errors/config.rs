use channel_core::{ChannelConfig, ConfigError, ParentEndpoint};

/// **VALUE**: Verifies a parent refuses to start without a target.
///
/// **WHY THIS MATTERS**: A parent with nowhere to send its handshake would sit in
/// `Connecting` forever. Failing at build time makes the wiring mistake obvious.
#[tokio::test]
async fn given_builder_without_target_when_built_then_validation_error() {
    // GIVEN: A builder with no target
    let builder = ParentEndpoint::builder();

    // WHEN: Building
    let result = builder.build();

    // THEN: Validation error naming the target
    let Err(ConfigError::ValidationError { reason, .. }) = result else {
        panic!("Expected ValidationError");
    };
    assert!(reason.contains("target"));
}

#[tokio::test]
async fn given_invalid_config_when_building_parent_then_rejected() {
    let mut config = ChannelConfig::default();
    config.trusted_origin = String::from("*");

    let result = ParentEndpoint::builder()
        .with_target(channel_core::FrameSlot::new())
        .with_config(config)
        .build();

    assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
}
