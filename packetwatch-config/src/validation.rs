//! Custom validation functions for configuration.
//!
//! Provides shared validation logic used across multiple configuration modules.

use validator::ValidationError;

/// Validate that an interface name is plausible for Linux, macOS or Windows
/// (`eth0`, `en0`, `Wi-Fi`, `vlan.100`, `\Device\NPF_{GUID}`).
pub fn validate_interface(name: &str) -> Result<(), ValidationError> {
    let valid = !name.is_empty() && name.len() <= 64;

    let re = regex::Regex::new(r"^[a-zA-Z0-9_.:\-\\{} ]+$")
        .map_err(|_| ValidationError::new("invalid_regex"))?;

    if valid && re.is_match(name) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_interface"))
    }
}

/// Validate that a BPF expression is non-empty and single-line.
pub fn validate_filter(filter: &str) -> Result<(), ValidationError> {
    if filter.trim().is_empty() || filter.contains('\n') {
        return Err(ValidationError::new("invalid_filter"));
    }
    Ok(())
}

/// Validate that a given value is a power of two.
pub fn validate_power_of_two(value: usize) -> Result<(), ValidationError> {
    if value.is_power_of_two() {
        Ok(())
    } else {
        Err(ValidationError::new("must_be_power_of_two"))
    }
}

/// Validate that a log filter parses as `target=level` directives.
pub fn validate_log_filter(filter: &str) -> Result<(), ValidationError> {
    let re = regex::Regex::new(r"^[a-zA-Z0-9_:=,\-]+$")
        .map_err(|_| ValidationError::new("invalid_regex"))?;
    if re.is_match(filter) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_log_filter"))
    }
}
