use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("database error: {message}")]
    Database { message: String },
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl InfraError {
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failing_layer() {
        assert_eq!(
            InfraError::database("pool timed out").to_string(),
            "database error: pool timed out"
        );
        assert_eq!(
            InfraError::configuration("unsupported store url").to_string(),
            "configuration error: unsupported store url"
        );
        assert_eq!(
            InfraError::telemetry("already set").to_string(),
            "telemetry initialization failed: already set"
        );
    }
}
