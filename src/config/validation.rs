//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check fixed routes point at usable targets
//! - Detect endpoint paths that would collide
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::{HeaderName, HeaderValue};
use thiserror::Error;

use crate::config::schema::RelayConfig;
use crate::upstream::url::validate;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_body_size == 0 {
        errors.push(ValidationError::new("listener.max_body_size", "must be > 0"));
    }

    for (field, value) in [
        ("timeouts.forward_secs", config.timeouts.forward_secs),
        ("timeouts.download_secs", config.timeouts.download_secs),
        ("timeouts.relay_connect_secs", config.timeouts.relay_connect_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be > 0"));
        }
    }

    if config.relay.outbox_capacity == 0 {
        errors.push(ValidationError::new("relay.outbox_capacity", "must be > 0"));
    }

    if HeaderName::from_bytes(config.endpoints.target_header.as_bytes()).is_err() {
        errors.push(ValidationError::new(
            "endpoints.target_header",
            "not a valid header name",
        ));
    }
    if HeaderValue::from_str(&config.outbound.user_agent).is_err() {
        errors.push(ValidationError::new(
            "outbound.user_agent",
            "not a valid header value",
        ));
    }
    if let Some(custom) = &config.outbound.custom_header {
        if HeaderName::from_bytes(custom.as_bytes()).is_err() {
            errors.push(ValidationError::new(
                "outbound.custom_header",
                "not a valid header name",
            ));
        }
    }
    if config.endpoints.target_param.is_empty() {
        errors.push(ValidationError::new("endpoints.target_param", "must not be empty"));
    }

    let mut paths = HashSet::new();
    let endpoint_paths = [
        ("endpoints.forward_path", &config.endpoints.forward_path),
        ("endpoints.download_path", &config.endpoints.download_path),
        ("endpoints.websocket_path", &config.endpoints.websocket_path),
    ];
    for (field, path) in endpoint_paths {
        check_path(field, path, &mut paths, &mut errors);
    }

    for (i, route) in config.routes.iter().enumerate() {
        let field = format!("routes[{}]", i);
        check_path(&format!("{}.path_prefix", field), &route.path_prefix, &mut paths, &mut errors);
        if !validate(&route.target) {
            errors.push(ValidationError::new(
                format!("{}.target", field),
                format!("'{}' is not an absolute http(s) or ws(s) URL", route.target),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_path(
    field: &str,
    path: &str,
    seen: &mut HashSet<String>,
    errors: &mut Vec<ValidationError>,
) {
    if !path.starts_with('/') || path.len() < 2 {
        errors.push(ValidationError::new(field, "must start with '/' and name a segment"));
    } else if path.ends_with('/') {
        errors.push(ValidationError::new(field, "must not end with '/'"));
    } else if path.contains(['{', '}', '*', '?', '#']) {
        errors.push(ValidationError::new(field, "must be a literal path"));
    } else if !seen.insert(path.to_string()) {
        errors.push(ValidationError::new(field, format!("'{}' is already mounted", path)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RouteConfig;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&RelayConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = RelayConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.timeouts.download_secs = 0;
        config.endpoints.download_path = "/proxy".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.field == "endpoints.download_path"));
    }

    #[test]
    fn rejects_capture_syntax_in_paths() {
        let mut config = RelayConfig::default();
        config.endpoints.forward_path = "/proxy/{id}".into();
        config.outbound.user_agent = "bad\nagent".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.field == "endpoints.forward_path"));
        assert!(errors.iter().any(|e| e.field == "outbound.user_agent"));
    }

    #[test]
    fn rejects_route_with_bad_target() {
        let mut config = RelayConfig::default();
        config.routes.push(RouteConfig {
            name: "legacy".into(),
            path_prefix: "/legacy".into(),
            target: "ftp://10.0.0.5".into(),
        });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "routes[0].target");
    }
}
