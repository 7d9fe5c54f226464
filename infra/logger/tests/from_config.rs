use gatekit_domain::config::LoggingConfig;
use gatekit_logger::{Logger, LoggerError};

#[test]
fn logging_section_installs_the_subscriber_once() {
    let config = LoggingConfig {
        name: "gatekit-from-config".to_owned(),
        level: "debug".to_owned(),
        env_filter: Some("gatekit_availability=trace".to_owned()),
        ..LoggingConfig::default()
    };

    let logger = Logger::from_config(&config).expect("first install");
    assert!(logger.guard().is_none(), "no path configured, so no file writer");

    let err = Logger::from_config(&config).expect_err("a subscriber is already installed");
    assert!(matches!(err, LoggerError::Subscriber { .. }));
}

#[test]
fn unknown_level_is_rejected_before_installing() {
    let config = LoggingConfig { level: "chatty".to_owned(), ..LoggingConfig::default() };
    let err = Logger::from_config(&config).expect_err("level must be known");
    assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));
}
