use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Poll interval is non-zero and below the production timeout
/// - Simulation delay ranges are ordered
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    let production = &config.production;
    if production.poll_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "production.poll_interval_secs cannot be 0".to_string(),
        ));
    }
    if production.timeout_secs < production.poll_interval_secs {
        return Err(ConfigError::ValidationError(format!(
            "production.timeout_secs ({}) must be at least poll_interval_secs ({})",
            production.timeout_secs, production.poll_interval_secs
        )));
    }
    if production.prompt_match_prefix_chars == 0 && !production.strict_id_matching {
        return Err(ConfigError::ValidationError(
            "production.prompt_match_prefix_chars cannot be 0 unless strict_id_matching is set"
                .to_string(),
        ));
    }

    let sim = &config.simulation;
    if sim.submit_delay_min_ms > sim.submit_delay_max_ms {
        return Err(ConfigError::ValidationError(
            "simulation.submit_delay_min_ms exceeds submit_delay_max_ms".to_string(),
        ));
    }
    if sim.render_delay_min_ms > sim.render_delay_max_ms {
        return Err(ConfigError::ValidationError(
            "simulation.render_delay_min_ms exceeds render_delay_max_ms".to_string(),
        ));
    }
    if sim.poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "simulation.poll_interval_ms cannot be 0".to_string(),
        ));
    }

    Ok(())
}
