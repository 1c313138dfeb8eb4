//! Operation scripts: the ordered, sized program a worker executes.

use serde::{Deserialize, Serialize};

use crate::{Attributes, Operation, OperationStatus};

/// Cross-cutting execution policy copied from the snapshot and config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPolicy {
    /// Overwrite existing targets only when they are older.
    pub overwrite_older: bool,
    pub copy_security: bool,
    pub copy_attrs: bool,
    pub preserve_dir_time: bool,
    pub ignore_ads: bool,
    pub skip_empty_dirs: bool,
    pub use_recycle_bin: bool,
    pub invert_recycle_bin: bool,
    pub start_on_idle: bool,
    /// Transfer rate limit in bytes per second.
    pub speed_limit: Option<u32>,
    /// Mask applied to attributes written to copied files.
    pub clear_readonly_mask: Attributes,
    pub target_supports_ads: bool,
    pub target_is_fat32: bool,
    pub target_supports_encryption: bool,
    pub confirm_delete_hidden_file: bool,
    pub confirm_delete_hidden_dir: bool,
    pub confirm_delete_nonempty_dir: bool,
    pub fast_dir_move: bool,
}

impl ExecutionPolicy {
    /// Check if deletions go to the recycle bin.
    pub fn recycle(&self) -> bool {
        self.use_recycle_bin != self.invert_recycle_bin
    }
}

impl Default for ExecutionPolicy {
    fn default() -> Self {
        Self {
            overwrite_older: false,
            copy_security: false,
            copy_attrs: false,
            preserve_dir_time: false,
            ignore_ads: false,
            skip_empty_dirs: false,
            use_recycle_bin: false,
            invert_recycle_bin: false,
            start_on_idle: false,
            speed_limit: None,
            clear_readonly_mask: Attributes(u32::MAX),
            target_supports_ads: false,
            target_is_fat32: false,
            target_supports_encryption: true,
            confirm_delete_hidden_file: true,
            confirm_delete_hidden_dir: true,
            confirm_delete_nonempty_dir: true,
            fast_dir_move: true,
        }
    }
}

/// An ordered sequence of operations plus aggregate counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationScript {
    operations: Vec<Operation>,
    /// Number of file items.
    pub file_count: usize,
    /// Number of directory items.
    pub dir_count: usize,
    /// Sum of the real sizes of all file transfers.
    pub total_file_size: u64,
    pub policy: ExecutionPolicy,
    pub is_copy_or_move: bool,
    pub is_copy: bool,
    /// Roots that change notification should be scoped to.
    pub work_paths: Vec<String>,
    good: bool,
    #[serde(skip)]
    capacity_limit: Option<usize>,
}

impl Default for OperationScript {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationScript {
    /// Create an empty, well-formed script.
    pub fn new() -> Self {
        Self {
            operations: Vec::new(),
            file_count: 0,
            dir_count: 0,
            total_file_size: 0,
            policy: ExecutionPolicy::default(),
            is_copy_or_move: false,
            is_copy: false,
            work_paths: Vec::new(),
            good: true,
            capacity_limit: None,
        }
    }

    /// Create a script that refuses to grow past `limit` operations.
    pub fn with_capacity_limit(limit: usize) -> Self {
        Self {
            capacity_limit: Some(limit),
            ..Self::new()
        }
    }

    /// Append an operation.
    ///
    /// Returns false, and marks the script as not well-formed, if the script
    /// is exhausted or memory for the operation cannot be reserved.
    pub fn append(&mut self, op: Operation) -> bool {
        if !self.good {
            return false;
        }
        let exhausted = self
            .capacity_limit
            .is_some_and(|limit| self.operations.len() >= limit);
        if exhausted || self.operations.try_reserve(1).is_err() {
            self.good = false;
            return false;
        }
        self.operations.push(op);
        true
    }

    /// Check if every append so far succeeded.
    pub fn is_good(&self) -> bool {
        self.good
    }

    /// Sum of the weights of all operations.
    ///
    /// Always derived from the operations themselves, never stored.
    pub fn total_weight(&self) -> u64 {
        self.operations.iter().map(|op| op.weight).sum()
    }

    /// Register a root directory for change notification.
    pub fn add_work_path(&mut self, path: impl Into<String>) {
        let path = path.into();
        if !path.is_empty() && !self.work_paths.contains(&path) {
            self.work_paths.push(path);
        }
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn get(&self, index: usize) -> Option<&Operation> {
        self.operations.get(index)
    }

    /// Update the execution status of one operation.
    pub fn set_status(&mut self, index: usize, status: OperationStatus) {
        if let Some(op) = self.operations.get_mut(index) {
            op.status = status;
        }
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.operations.iter()
    }

    /// Number of operations with the given status.
    pub fn count_status(&self, status: OperationStatus) -> usize {
        self.operations.iter().filter(|op| op.status == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{OpPath, Opcode};

    fn delete_op(name: &str) -> Operation {
        Operation::new(
            Opcode::DeleteFile,
            OpPath::new(name, name),
            Attributes::NONE,
            crate::DELETE_FILE_WEIGHT,
        )
    }

    #[test]
    fn test_append_and_total_weight() {
        let mut script = OperationScript::new();
        assert!(script.append(delete_op("a")));
        assert!(script.append(delete_op("b")));

        assert_eq!(script.len(), 2);
        assert_eq!(script.total_weight(), 2 * crate::DELETE_FILE_WEIGHT);
        assert!(script.is_good());
    }

    #[test]
    fn test_default_script_is_runnable() {
        let script = OperationScript::default();
        assert!(script.is_good());
        assert_eq!(script, OperationScript::new());
        assert_eq!(script.total_weight(), 0);
    }

    #[test]
    fn test_exhaustion_marks_script_bad() {
        let mut script = OperationScript::with_capacity_limit(1);
        assert!(script.append(delete_op("a")));
        assert!(!script.append(delete_op("b")));
        assert!(!script.is_good());

        // A bad script stays bad.
        assert!(!script.append(delete_op("c")));
        assert_eq!(script.len(), 1);
    }

    #[test]
    fn test_work_paths_are_deduplicated() {
        let mut script = OperationScript::new();
        script.add_work_path("/src");
        script.add_work_path("/src");
        script.add_work_path("");
        assert_eq!(script.work_paths, vec!["/src".to_string()]);
    }

    #[test]
    fn test_recycle_inversion() {
        let mut policy = ExecutionPolicy::default();
        assert!(!policy.recycle());
        policy.invert_recycle_bin = true;
        assert!(policy.recycle());
        policy.use_recycle_bin = true;
        assert!(!policy.recycle());
    }
}
