//! Session/entity filter shared by every storage backend's `get_all`.

use crate::domain::session::SessionRecord;
use crate::task::TaskId;

/// Filter applied by [`crate::store::StorageBackend::get_all`].
///
/// `task_id` is normalized by stripping a leading `#` prior to comparison;
/// records whose `task_id` is `None` never match a positive `task_id`
/// filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFilter {
    pub task_id: Option<TaskId>,
    pub repo_name: Option<String>,
    pub branch: Option<String>,
}

impl SessionFilter {
    #[must_use]
    pub fn matches(&self, record: &SessionRecord) -> bool {
        if let Some(task_id) = &self.task_id {
            match &record.task_id {
                Some(record_task_id) if record_task_id.number() == task_id.number() => {}
                _ => return false,
            }
        }
        if let Some(repo_name) = &self.repo_name {
            if &record.repo_name != repo_name {
                return false;
            }
        }
        if let Some(branch) = &self.branch {
            if record.branch.as_deref() != Some(branch.as_str()) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::SessionName;

    fn sample(task_id: Option<TaskId>) -> SessionRecord {
        let mut record = SessionRecord::new(
            SessionName::parse("s1").expect("valid"),
            "org/repo".into(),
            "https://example.com/org/repo".into(),
        );
        record.task_id = task_id;
        record
    }

    #[test]
    fn null_task_id_excluded_from_positive_match() {
        let filter = SessionFilter {
            task_id: Some(TaskId::new(1)),
            ..Default::default()
        };
        assert!(!filter.matches(&sample(None)));
    }

    #[test]
    fn task_id_filter_ignores_leading_hash_via_normalization() {
        let filter = SessionFilter {
            task_id: Some(TaskId::parse("#1").expect("valid")),
            ..Default::default()
        };
        assert!(filter.matches(&sample(Some(TaskId::parse("1").expect("valid")))));
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(SessionFilter::default().matches(&sample(None)));
    }
}
