use crate::json_io::{read_json_or_default, update_json};
use crate::layout::Layout;
use crate::{Result, SketchbookError};

/// Favourited sketch ids, persisted as a bare JSON array.
///
/// Ids are not checked against the sketch store, so a purged sketch can
/// leave a stale entry behind.
#[derive(Debug, Clone, Copy)]
pub struct StarIndex<'a> {
    layout: &'a Layout,
}

impl<'a> StarIndex<'a> {
    pub fn new(layout: &'a Layout) -> Self {
        Self { layout }
    }

    pub fn list(&self) -> Result<Vec<String>> {
        read_json_or_default(&self.layout.starred_index())
    }

    pub fn is_starred(&self, id: &str) -> Result<bool> {
        Ok(self.list()?.iter().any(|starred| starred == id))
    }

    /// Flips membership and returns the new state.
    pub fn toggle(&self, id: &str) -> Result<bool> {
        if id.is_empty() {
            return Err(SketchbookError::InvalidName("empty sketch id".to_string()));
        }
        update_json(&self.layout.starred_index(), |ids: &mut Vec<String>| {
            if let Some(pos) = ids.iter().position(|starred| starred == id) {
                ids.remove(pos);
                Ok(false)
            } else {
                ids.push(id.to_string());
                Ok(true)
            }
        })
    }

    /// Carries a star across a sketch rename. No-op when `old` is not starred.
    pub(crate) fn replace(&self, old: &str, new: &str) -> Result<()> {
        let path = self.layout.starred_index();
        if !path.exists() {
            return Ok(());
        }
        update_json(&path, |ids: &mut Vec<String>| {
            let Some(pos) = ids.iter().position(|starred| starred == old) else {
                return Ok(());
            };
            if ids.iter().any(|starred| starred == new) {
                ids.remove(pos);
            } else {
                ids[pos] = new.to_string();
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn toggle_flips_membership_and_keeps_order() {
        let dir = TempDir::new().expect("tempdir");
        let layout = Layout::new(dir.path());
        let stars = StarIndex::new(&layout);

        assert!(stars.toggle("A").expect("star a"));
        assert!(stars.toggle("B").expect("star b"));
        assert!(!stars.toggle("A").expect("unstar a"));
        assert_eq!(stars.list().expect("list"), vec!["B".to_string()]);
        assert!(stars.is_starred("B").expect("query"));

        let raw = std::fs::read_to_string(layout.starred_index()).expect("read");
        let parsed: Vec<String> = serde_json::from_str(&raw).expect("array");
        assert_eq!(parsed, vec!["B".to_string()]);
    }

    #[test]
    fn stale_ids_are_allowed() {
        let dir = TempDir::new().expect("tempdir");
        let layout = Layout::new(dir.path());
        let stars = StarIndex::new(&layout);
        assert!(stars.toggle("NeverCreated").expect("toggle"));
        assert_eq!(stars.list().expect("list"), vec!["NeverCreated".to_string()]);
    }

    #[test]
    fn replace_without_index_creates_nothing() {
        let dir = TempDir::new().expect("tempdir");
        let layout = Layout::new(dir.path());
        StarIndex::new(&layout).replace("A", "B").expect("replace");
        assert!(!layout.starred_index().exists());
    }
}
