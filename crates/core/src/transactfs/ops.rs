//! Filesystem operations and the diff decision table
//!
//! A [`FileOp`] is the unit TransactFs hands to its executor: one concrete
//! filesystem effect, already decided against the actual filesystem's
//! current state (§3, §4.1's decision table).

use std::path::PathBuf;

/// The kind of effect a [`FileOp`] applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Create,
    Update,
    Chmod,
    Delete,
}

/// One concrete filesystem effect, computed by [`super::TransactFs::diff`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOp {
    pub path: PathBuf,
    pub kind: OpKind,
    /// Present for `Create`/`Update`, absent otherwise.
    pub content: Option<Vec<u8>>,
    pub mode: u32,
    pub needs_privilege: bool,
}

impl FileOp {
    pub fn create(path: PathBuf, content: Vec<u8>, mode: u32, needs_privilege: bool) -> Self {
        Self {
            path,
            kind: OpKind::Create,
            content: Some(content),
            mode,
            needs_privilege,
        }
    }

    pub fn update(path: PathBuf, content: Vec<u8>, mode: u32, needs_privilege: bool) -> Self {
        Self {
            path,
            kind: OpKind::Update,
            content: Some(content),
            mode,
            needs_privilege,
        }
    }

    pub fn chmod(path: PathBuf, mode: u32, needs_privilege: bool) -> Self {
        Self {
            path,
            kind: OpKind::Chmod,
            content: None,
            mode,
            needs_privilege,
        }
    }

    pub fn delete(path: PathBuf, needs_privilege: bool) -> Self {
        Self {
            path,
            kind: OpKind::Delete,
            content: None,
            mode: 0,
            needs_privilege,
        }
    }
}
