use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::paths;

/// A destination folder scheduled for opening after the run, with an optional
/// file to pre-select in the opened window.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FolderTarget {
    pub directory: PathBuf,
    pub should_open: bool,
    pub file_to_select: Option<PathBuf>,
}

/// Deduplicating collection of folder targets.
///
/// Two registrations for the same directory (compared case-insensitively
/// after trailing-separator normalization) merge into one target: the open
/// flags OR together and the first selection request wins. Insertion order
/// of first sight is preserved.
#[derive(Debug, Default)]
pub struct FolderTargetSet {
    targets: Vec<FolderTarget>,
    index: HashMap<String, usize>,
}

impl FolderTargetSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, directory: &Path, should_open: bool, file_to_select: Option<&Path>) {
        let key = paths::dedup_key(directory);
        match self.index.get(&key) {
            Some(&position) => {
                let target = &mut self.targets[position];
                target.should_open |= should_open;
                if target.file_to_select.is_none() {
                    target.file_to_select = file_to_select.map(Path::to_path_buf);
                }
            }
            None => {
                self.index.insert(key, self.targets.len());
                self.targets.push(FolderTarget {
                    directory: paths::normalize_path(directory),
                    should_open,
                    file_to_select: file_to_select.map(Path::to_path_buf),
                });
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// The targets actually flagged for opening, in first-registration order.
    pub fn to_open(&self) -> Vec<FolderTarget> {
        self.targets
            .iter()
            .filter(|target| target.should_open)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_directories_merge_into_one_target() {
        let mut set = FolderTargetSet::new();
        set.register(Path::new(r"C:\Users\T\Documents\Custom Templates"), false, None);
        set.register(Path::new(r"c:\users\t\documents\custom templates\"), true, None);

        assert_eq!(set.len(), 1);
        let open = set.to_open();
        assert_eq!(open.len(), 1);
        assert!(open[0].should_open);
        assert_eq!(
            open[0].directory,
            PathBuf::from(r"C:\Users\T\Documents\Custom Templates")
        );
    }

    #[test]
    fn first_selection_request_wins() {
        let mut set = FolderTargetSet::new();
        let dir = Path::new("/tmp/templates");
        set.register(dir, true, Some(Path::new("/tmp/templates/A.dotx")));
        set.register(dir, true, Some(Path::new("/tmp/templates/B.dotx")));

        let open = set.to_open();
        assert_eq!(
            open[0].file_to_select,
            Some(PathBuf::from("/tmp/templates/A.dotx"))
        );
    }

    #[test]
    fn selection_attaches_even_when_registered_later() {
        let mut set = FolderTargetSet::new();
        let dir = Path::new("/tmp/templates");
        set.register(dir, true, None);
        set.register(dir, false, Some(Path::new("/tmp/templates/C.dotx")));

        let open = set.to_open();
        assert_eq!(open.len(), 1);
        assert_eq!(
            open[0].file_to_select,
            Some(PathBuf::from("/tmp/templates/C.dotx"))
        );
    }

    #[test]
    fn unopened_targets_are_filtered_out() {
        let mut set = FolderTargetSet::new();
        set.register(Path::new("/a"), false, None);
        set.register(Path::new("/b"), true, None);
        set.register(Path::new("/c"), false, None);

        let open = set.to_open();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].directory, PathBuf::from("/b"));
    }

    #[test]
    fn insertion_order_is_preserved() {
        let mut set = FolderTargetSet::new();
        set.register(Path::new("/b"), true, None);
        set.register(Path::new("/a"), true, None);
        set.register(Path::new("/b"), true, None);

        let open = set.to_open();
        assert_eq!(open[0].directory, PathBuf::from("/b"));
        assert_eq!(open[1].directory, PathBuf::from("/a"));
    }
}
