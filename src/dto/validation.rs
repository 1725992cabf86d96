//! Validation helpers for DTOs.

use std::collections::HashSet;

use uuid::Uuid;
use validator::ValidationError;

/// Rejects labels made only of whitespace.
pub fn validate_label(label: &str) -> Result<(), ValidationError> {
    if label.trim().is_empty() {
        let mut err = ValidationError::new("blank_label");
        err.message = Some("Label must not be blank".into());
        return Err(err);
    }
    Ok(())
}

/// Rejects competitor lists naming the same competitor twice.
pub fn validate_distinct_ids(ids: &[Uuid]) -> Result<(), ValidationError> {
    let mut seen = HashSet::with_capacity(ids.len());
    if let Some(duplicate) = ids.iter().find(|id| !seen.insert(**id)) {
        let mut err = ValidationError::new("duplicate_competitor");
        err.message = Some(format!("Competitor `{duplicate}` is listed more than once").into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_label() {
        assert!(validate_label("sumo").is_ok());
        assert!(validate_label("").is_err());
        assert!(validate_label("   ").is_err());
    }

    #[test]
    fn test_validate_distinct_ids() {
        let id = Uuid::new_v4();
        assert!(validate_distinct_ids(&[id, Uuid::new_v4()]).is_ok());
        assert!(validate_distinct_ids(&[id, id]).is_err());
    }
}
