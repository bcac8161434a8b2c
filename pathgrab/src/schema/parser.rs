use crate::error::Result;
use super::types::{DomainConfig, LayoutConfig};
use std::path::Path;

/// Parse a configuration file (YAML, or JSON as its subset) into a LayoutConfig
pub fn parse_config(path: &Path) -> Result<LayoutConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_config_str(&content)
}

/// Parse a configuration string into a LayoutConfig
pub fn parse_config_str(content: &str) -> Result<LayoutConfig> {
    let config: LayoutConfig = serde_yaml::from_str(content)?;
    Ok(config)
}

/// Parse a single domain definition
pub fn parse_domain_str(content: &str) -> Result<DomainConfig> {
    let domain: DomainConfig = serde_yaml::from_str(content)?;
    Ok(domain)
}
