//! Configuration validation utilities.

use regex::Regex;

use chaskis_core::config::MAX_QUIT_MESSAGE_LENGTH;
use chaskis_framework::{BRIDGE_MESSAGE_GROUP, BRIDGE_USER_GROUP};

use super::error::{ConfigError, ConfigResult};
use super::schema::{
    ChaskisConfig, EngineConfig, IrcConfigFile, LogOutput, LoggingConfig, PluginsConfig,
};

/// Validates the entire configuration.
pub fn validate_config(config: &ChaskisConfig) -> ConfigResult<()> {
    validate_irc_config(&config.irc)?;
    validate_engine_config(&config.engine)?;
    validate_plugins_config(&config.plugins)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

fn validate_irc_config(irc: &IrcConfigFile) -> ConfigResult<()> {
    if irc.server.trim().is_empty() {
        return Err(ConfigError::missing_field("irc.server"));
    }
    if irc.port == 0 {
        return Err(ConfigError::validation("Port must be greater than 0"));
    }

    if irc.channels.is_empty() {
        return Err(ConfigError::validation("At least one channel must be configured"));
    }
    if irc.channels.iter().any(|c| c.trim().is_empty()) {
        return Err(ConfigError::validation("Channel names cannot be blank"));
    }

    if irc.nick.trim().is_empty() {
        return Err(ConfigError::missing_field("irc.nick"));
    }
    if irc.user_name.as_deref().is_some_and(|u| u.trim().is_empty()) {
        return Err(ConfigError::validation("User name cannot be blank"));
    }
    if irc.real_name.trim().is_empty() {
        return Err(ConfigError::missing_field("irc.real_name"));
    }

    if irc.quit_message.chars().count() > MAX_QUIT_MESSAGE_LENGTH {
        return Err(ConfigError::validation(format!(
            "Quit message cannot exceed {MAX_QUIT_MESSAGE_LENGTH} characters"
        )));
    }
    if irc.quit_message.contains(['\r', '\n']) {
        return Err(ConfigError::validation("Quit message cannot contain line breaks"));
    }

    if irc.admins.iter().any(|a| a.trim().is_empty()) {
        return Err(ConfigError::validation("Admin names cannot be blank"));
    }

    for (nick, message) in &irc.bridge_bots {
        validate_bridge_bot(nick, message)?;
    }

    Ok(())
}

fn validate_bridge_bot(nick_pattern: &str, message_pattern: &str) -> ConfigResult<()> {
    Regex::new(nick_pattern).map_err(|e| ConfigError::invalid_pattern(nick_pattern, e))?;
    let message =
        Regex::new(message_pattern).map_err(|e| ConfigError::invalid_pattern(message_pattern, e))?;

    for group in [BRIDGE_USER_GROUP, BRIDGE_MESSAGE_GROUP] {
        if !message.capture_names().flatten().any(|name| name == group) {
            return Err(ConfigError::invalid_pattern(
                message_pattern,
                format!("missing named group '{group}'"),
            ));
        }
    }
    Ok(())
}

fn validate_engine_config(engine: &EngineConfig) -> ConfigResult<()> {
    if engine.handler_timeout_ms == 0 {
        return Err(ConfigError::validation("Handler timeout must be greater than 0"));
    }
    if engine.dispatch_queue_capacity == 0 {
        return Err(ConfigError::validation("Dispatch queue capacity must be greater than 0"));
    }
    if engine.worker_pool_size == 0 {
        return Err(ConfigError::validation("Worker pool size must be greater than 0"));
    }

    if engine.watchdog_enabled {
        if engine.watchdog_period_ms == 0 {
            return Err(ConfigError::validation("Watchdog period must be greater than 0"));
        }
        if engine.watchdog_timeout_ms == 0 {
            return Err(ConfigError::validation("Watchdog timeout must be greater than 0"));
        }
    }

    if engine.reconnect_initial_delay_ms == 0 {
        return Err(ConfigError::validation(
            "Initial reconnect delay must be greater than 0",
        ));
    }
    if engine.reconnect_max_delay_ms < engine.reconnect_initial_delay_ms {
        return Err(ConfigError::validation(
            "Max reconnect delay must be greater than or equal to initial delay",
        ));
    }
    if !(engine.reconnect_multiplier.is_finite() && engine.reconnect_multiplier >= 1.0) {
        return Err(ConfigError::validation(
            "Reconnect multiplier must be a finite number of at least 1.0",
        ));
    }

    Ok(())
}

fn validate_plugins_config(plugins: &PluginsConfig) -> ConfigResult<()> {
    for (plugin, channels) in &plugins.blacklist {
        if plugin.trim().is_empty() {
            return Err(ConfigError::validation("Blacklist plugin name cannot be empty"));
        }
        if channels.iter().any(|channel| channel.trim().is_empty()) {
            return Err(ConfigError::validation(format!(
                "Blacklisted channel for plugin '{plugin}' cannot be empty"
            )));
        }
    }
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ChaskisConfig {
        let mut config = ChaskisConfig::default();
        config.irc.server = "irc.example.net".into();
        config.irc.channels = vec!["#room".into()];
        config
    }

    #[test]
    fn accepts_minimal_config() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn server_is_required() {
        let mut config = valid();
        config.irc.server.clear();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { field }) if field == "irc.server"
        ));
    }

    #[test]
    fn rejects_zero_port() {
        let mut config = valid();
        config.irc.port = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn channels_are_required_and_non_blank() {
        let mut config = valid();
        config.irc.channels.clear();
        assert!(validate_config(&config).is_err());

        config.irc.channels = vec!["#room".into(), "  ".into()];
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn quit_message_limits() {
        let mut config = valid();
        config.irc.quit_message = "x".repeat(MAX_QUIT_MESSAGE_LENGTH);
        assert!(validate_config(&config).is_ok());

        config.irc.quit_message.push('x');
        assert!(validate_config(&config).is_err());

        config.irc.quit_message = "bye\r\nQUIT".into();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn bridge_pattern_needs_both_groups() {
        let mut config = valid();
        config
            .irc
            .bridge_bots
            .insert("^relay$".into(), r"^<(?P<bridgeUser>\w+)> .+$".into());
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidPattern { .. })
        ));

        config.irc.bridge_bots.insert(
            "^relay$".into(),
            r"^<(?P<bridgeUser>\w+)> (?P<bridgeMessage>.+)$".into(),
        );
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn bridge_pattern_must_compile() {
        let mut config = valid();
        config.irc.bridge_bots.insert("(".into(), "x".into());
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidPattern { pattern, .. }) if pattern == "("
        ));
    }

    #[test]
    fn reconnect_bounds() {
        let mut config = valid();
        config.engine.reconnect_max_delay_ms = 10;
        config.engine.reconnect_initial_delay_ms = 100;
        assert!(validate_config(&config).is_err());

        let mut config = valid();
        config.engine.reconnect_multiplier = 0.5;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn reconnect_multiplier_must_be_finite() {
        for multiplier in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let mut config = valid();
            config.engine.reconnect_multiplier = multiplier;
            assert!(
                matches!(validate_config(&config), Err(ConfigError::ValidationError { .. })),
                "accepted multiplier {multiplier}"
            );
        }

        let mut config = valid();
        config.engine.reconnect_multiplier = 1e30;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn watchdog_timings_are_ignored_while_disabled() {
        let mut config = valid();
        config.engine.watchdog_enabled = false;
        config.engine.watchdog_period_ms = 0;
        config.engine.watchdog_timeout_ms = 0;
        assert!(validate_config(&config).is_ok());

        config.engine.watchdog_enabled = true;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn watchdog_timeout_must_be_positive() {
        let mut config = valid();
        config.engine.watchdog_timeout_ms = 0;
        assert!(validate_config(&config).is_err());

        config.engine.watchdog_enabled = false;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn file_output_needs_a_path() {
        let mut config = valid();
        config.logging.output = LogOutput::File;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn blacklist_entries_must_be_named() {
        let mut config = valid();
        config
            .plugins
            .blacklist
            .insert("echo".into(), vec!["#quiet".into()]);
        assert!(validate_config(&config).is_ok());

        config.plugins.blacklist.insert("echo".into(), vec![" ".into()]);
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));

        config.plugins.blacklist.clear();
        config.plugins.blacklist.insert("".into(), vec!["#quiet".into()]);
        assert!(validate_config(&config).is_err());
    }
}
