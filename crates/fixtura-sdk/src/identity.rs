//! Collision-free instance naming.
//!
//! Parallel tests never coordinate: every name carries a freshly generated
//! suffix, so two fixtures built from the same file with the same label
//! still get distinct names.

use fixtura_common::constants::DEFAULT_LABEL;
use fixtura_common::types::InstanceName;

/// Source of collision-resistant unique strings.
pub trait IdentityProvider: Send + Sync {
    /// Returns a new unique string.
    fn generate(&self) -> String;
}

/// Random UUID v4 suffixes.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdentity;

impl IdentityProvider for UuidIdentity {
    fn generate(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Composes `<prefix><label>-<suffix>`.
///
/// Characters outside `[a-zA-Z0-9_.-]` in the label are replaced by `-`;
/// an empty label falls back to the default label.
#[must_use]
pub fn instance_name(prefix: &str, label: &str, suffix: &str) -> InstanceName {
    let label: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') { c } else { '-' })
        .collect();
    let label = if label.is_empty() { DEFAULT_LABEL } else { label.as_str() };
    InstanceName::new(format!("{prefix}{label}-{suffix}"))
}
