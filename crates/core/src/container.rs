//! Container identity and label schema
//!
//! Every container Alcatraz manages carries three labels so it can be
//! rediscovered after its project directory moves and enumerated across the
//! host (§3). The container name itself is derived once from the project
//! UUID and never rewritten.

use tracing::instrument;

/// Container label schema for Alcatraz identification.
pub const LABEL_PROJECT_ID: &str = "alca.project.id";
pub const LABEL_PROJECT_PATH: &str = "alca.project.path";
pub const LABEL_VERSION: &str = "alca.version";

/// Current state-schema version stamped onto every container this tool
/// creates. Bump when the state document or label schema changes shape.
pub const STATE_SCHEMA_VERSION: &str = "1";

/// Number of leading characters of the raw `project_id` string used in the
/// container name.
const NAME_PREFIX_LEN: usize = 12;

/// A project's container identity: the UUID that never changes and the
/// container name deterministically derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerIdentity {
    pub project_id: String,
    pub container_name: String,
}

impl ContainerIdentity {
    /// Derive a container name from a project UUID: `"alca-" + first 12
    /// characters of the UUID string, taken verbatim (hyphens included).
    #[instrument]
    pub fn container_name_for(project_id: &str) -> String {
        let prefix: String = project_id.chars().take(NAME_PREFIX_LEN).collect();
        format!("alca-{prefix}")
    }

    /// Build an identity from an existing or freshly generated project UUID.
    pub fn new(project_id: impl Into<String>) -> Self {
        let project_id = project_id.into();
        let container_name = Self::container_name_for(&project_id);
        Self {
            project_id,
            container_name,
        }
    }

    /// The three labels to apply when creating the container, keyed by the
    /// constants above.
    pub fn labels(&self, project_path: &str) -> Vec<(&'static str, String)> {
        vec![
            (LABEL_PROJECT_ID, self.project_id.clone()),
            (LABEL_PROJECT_PATH, project_path.to_string()),
            (LABEL_VERSION, STATE_SCHEMA_VERSION.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_name_is_alca_prefixed_first_12_raw_chars() {
        let uuid_like = "550e8400-e29b-41d4-a716-446655440000";
        let name = ContainerIdentity::container_name_for(uuid_like);
        assert_eq!(name, "alca-550e8400-e29");
    }

    #[test]
    fn test_labels_include_all_three_constants() {
        let identity = ContainerIdentity::new("01234567-89ab-cdef-0000-000000000000");
        let labels = identity.labels("/home/user/project");
        let keys: Vec<_> = labels.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![LABEL_PROJECT_ID, LABEL_PROJECT_PATH, LABEL_VERSION]);
        assert_eq!(labels[2].1, STATE_SCHEMA_VERSION);
    }

    #[test]
    fn test_container_name_is_deterministic() {
        let id = "abcdef01-2345-6789-abcd-ef0123456789";
        assert_eq!(
            ContainerIdentity::container_name_for(id),
            ContainerIdentity::container_name_for(id)
        );
    }
}
