//! Name validation for user-supplied volume and network names
//!
//! Names must start with an alphanumeric character and contain only
//! alphanumerics, `_`, `.` and `-`. Callers run these checks before building
//! arguments; the argument builder trusts its input.

use crate::errors::ValidationError;

fn validate_name(what: &'static str, name: &str) -> Result<(), ValidationError> {
    let mut chars = name.chars();
    let first = chars.next().ok_or(ValidationError::Empty { what })?;

    if !first.is_ascii_alphanumeric() {
        return Err(ValidationError::InvalidStart {
            what,
            name: name.to_string(),
        });
    }

    if let Some(ch) = chars.find(|ch| !ch.is_ascii_alphanumeric() && !matches!(*ch, '_' | '.' | '-'))
    {
        return Err(ValidationError::InvalidCharacter {
            what,
            name: name.to_string(),
            ch,
        });
    }

    Ok(())
}

pub fn validate_volume_name(name: &str) -> Result<(), ValidationError> {
    validate_name("Volume", name)
}

pub fn validate_network_name(name: &str) -> Result<(), ValidationError> {
    validate_name("Network", name)
}
