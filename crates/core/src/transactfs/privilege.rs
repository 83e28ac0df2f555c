//! Privilege grouping and the batched escalation script
//!
//! Given the ordered operation list from a diff, split it into maximal
//! consecutive runs of equal `needs_privilege` and render each privileged
//! run as a single shell script for one escalation invocation (§4.1, §4.7).

use base64::{engine::general_purpose::STANDARD, Engine as _};

use super::ops::{FileOp, OpKind};

/// Split `ops` into maximal consecutive runs of equal `needs_privilege`.
/// Operations preserve their relative order within and across groups; the
/// flattened concatenation of the result equals `ops`.
pub fn group_by_privilege(ops: &[FileOp]) -> Vec<(bool, Vec<FileOp>)> {
    let mut groups: Vec<(bool, Vec<FileOp>)> = Vec::new();
    for op in ops {
        match groups.last_mut() {
            Some((privileged, group)) if *privileged == op.needs_privilege => {
                group.push(op.clone());
            }
            _ => groups.push((op.needs_privilege, vec![op.clone()])),
        }
    }
    groups
}

/// Render a privileged group as a single POSIX shell script: `set -e`,
/// `mkdir -p` for each parent, base64-encoded payloads decoded into place,
/// an explicit `chmod` after each write, and `rm -f` for deletes.
pub fn render_script(ops: &[FileOp]) -> String {
    let mut script = String::from("set -e\n");
    for op in ops {
        let path = shell_quote(&op.path.to_string_lossy());
        match op.kind {
            OpKind::Create | OpKind::Update => {
                let parent = op
                    .path
                    .parent()
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_default();
                if !parent.is_empty() {
                    script.push_str(&format!("mkdir -p {}\n", shell_quote(&parent)));
                }
                let content = op.content.as_deref().unwrap_or(&[]);
                let encoded = STANDARD.encode(content);
                script.push_str(&format!(
                    "echo {} | base64 -d > {}\n",
                    shell_quote(&encoded),
                    path
                ));
                script.push_str(&format!("chmod {:o} {}\n", op.mode, path));
            }
            OpKind::Chmod => {
                script.push_str(&format!("chmod {:o} {}\n", op.mode, path));
            }
            OpKind::Delete => {
                script.push_str(&format!("rm -f {}\n", path));
            }
        }
    }
    script
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn op(path: &str, privileged: bool) -> FileOp {
        FileOp::create(PathBuf::from(path), b"x".to_vec(), 0o644, privileged)
    }

    #[test]
    fn test_group_by_privilege_preserves_order() {
        let ops = vec![
            op("/a", false),
            op("/b", false),
            op("/c", true),
            op("/d", true),
            op("/e", false),
        ];
        let groups = group_by_privilege(&ops);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].0, false);
        assert_eq!(groups[1].0, true);
        assert_eq!(groups[2].0, false);

        let flattened: Vec<_> = groups.iter().flat_map(|(_, g)| g.clone()).collect();
        assert_eq!(flattened, ops);
    }

    #[test]
    fn test_group_by_privilege_single_group_when_uniform() {
        let ops = vec![op("/a", true), op("/b", true)];
        let groups = group_by_privilege(&ops);
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn test_render_script_contains_set_dash_e_and_base64_payload() {
        let ops = vec![FileOp::create(
            PathBuf::from("/etc/alca/rule"),
            b"hello".to_vec(),
            0o644,
            true,
        )];
        let script = render_script(&ops);
        assert!(script.starts_with("set -e\n"));
        assert!(script.contains("mkdir -p '/etc/alca'"));
        assert!(script.contains("base64 -d"));
        assert!(script.contains("chmod 644"));
    }

    #[test]
    fn test_render_script_delete_uses_rm_f() {
        let ops = vec![FileOp::delete(PathBuf::from("/etc/alca/rule"), true)];
        let script = render_script(&ops);
        assert!(script.contains("rm -f '/etc/alca/rule'"));
    }
}
