use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Provider timeout is not 0
/// - Cache chunk size, when set, is not 0
/// - Orchestrator batch/worker bounds and backoff range
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.provider.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "provider.timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.cache.chunk_size == Some(0) {
        return Err(ConfigError::ValidationError(
            "cache.chunk_size cannot be 0".to_string(),
        ));
    }

    let orchestrator = &config.orchestrator;
    if orchestrator.batch_size == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.batch_size cannot be 0".to_string(),
        ));
    }
    if orchestrator.max_concurrent_fetches == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.max_concurrent_fetches cannot be 0".to_string(),
        ));
    }
    if orchestrator.max_concurrent_fetches > orchestrator.batch_size {
        return Err(ConfigError::ValidationError(format!(
            "orchestrator.max_concurrent_fetches ({}) cannot exceed batch_size ({})",
            orchestrator.max_concurrent_fetches, orchestrator.batch_size
        )));
    }
    if orchestrator.backoff_base_ms > orchestrator.backoff_max_ms {
        return Err(ConfigError::ValidationError(format!(
            "orchestrator.backoff_base_ms ({}) cannot exceed backoff_max_ms ({})",
            orchestrator.backoff_base_ms, orchestrator.backoff_max_ms
        )));
    }

    Ok(())
}
