use std::ops::Range;

/// The version chain of one resource. Holds no payload; versions are stored in the cache.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Resource {
    /// The active version.
    index: usize,
    /// The version that was last saved. `None` if no version that still exists is saved.
    saved_index: Option<usize>,
    /// The undo bin that produced the active version. `None` if that bin was discarded.
    global_index: Option<usize>,
    /// Whether each version represents a present resource. Always at least `index + 1` long.
    exists: Vec<bool>,
}

impl Resource {
    pub(crate) fn new(exists: bool) -> Self {
        Self {
            index: 0,
            saved_index: Some(0),
            global_index: Some(0),
            exists: vec![exists],
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn saved_index(&self) -> Option<usize> {
        self.saved_index
    }

    pub fn global_index(&self) -> Option<usize> {
        self.global_index
    }

    /// The number of versions, including ones that can only be reached with redo.
    pub fn num_versions(&self) -> usize {
        self.exists.len()
    }

    /// Whether the active version represents a present resource.
    pub fn exists(&self) -> bool {
        self.exists[self.index]
    }

    pub fn is_changed(&self) -> bool {
        self.saved_index != Some(self.index)
    }

    /// The version an edit made during undo bin `history_index` writes to, and whether that version is new.
    pub(crate) fn edit_version(&self, history_index: usize) -> (usize, bool) {
        if self.global_index != Some(history_index) {
            (self.index + 1, true)
        } else {
            (self.index, false)
        }
    }

    /// Makes the version given by [`edit_version`](Self::edit_version) active.
    pub(crate) fn commit_edit(&mut self, history_index: usize, exists: bool) {
        let (version, append) = self.edit_version(history_index);
        if append {
            self.exists.push(exists);
            self.index = version;
            self.global_index = Some(history_index);
        } else {
            self.exists[version] = exists;
        }
        if self.saved_index == Some(self.index) {
            self.saved_index = None;
        }
    }

    pub(crate) fn step_back(&mut self) {
        debug_assert!(self.index > 0);
        self.index = self.index.saturating_sub(1);
    }

    pub(crate) fn step_forward(&mut self) {
        debug_assert!(self.index + 1 < self.exists.len());
        self.index += 1;
    }

    pub(crate) fn mark_saved(&mut self) {
        self.saved_index = Some(self.index);
    }

    /// Drops every version after the active one and returns the dropped range.
    ///
    /// `history_index` is the undo bin that is being kept as the newest bin; a `global_index` past it no longer refers to a
    /// bin and is cleared.
    pub(crate) fn discard_future(&mut self, history_index: usize) -> Range<usize> {
        if matches!(self.saved_index, Some(saved) if saved > self.index) {
            self.saved_index = None;
        }
        if matches!(self.global_index, Some(global) if global > history_index) {
            self.global_index = None;
        }
        let dropped = self.index + 1..self.exists.len();
        self.exists.truncate(self.index + 1);
        dropped
    }

    pub(crate) fn restore_global_index(&mut self, history_index: usize) {
        self.global_index = Some(history_index);
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_edit_in_a_bin_appends_then_amends() {
        let mut r = Resource::new(true);
        assert!(!r.is_changed());

        assert_eq!(r.edit_version(1), (1, true));
        r.commit_edit(1, false);
        assert_eq!(r.index(), 1);
        assert!(!r.exists());
        assert!(r.is_changed());

        assert_eq!(r.edit_version(1), (1, false));
        r.commit_edit(1, true);
        assert_eq!(r.index(), 1);
        assert_eq!(r.num_versions(), 2);
        assert!(r.exists());
    }

    #[test]
    fn amending_the_saved_version_invalidates_it() {
        let mut r = Resource::new(true);
        r.commit_edit(0, false);
        assert_eq!(r.index(), 0);
        assert_eq!(r.saved_index(), None);
        r.mark_saved();
        assert_eq!(r.saved_index(), Some(0));
    }

    #[test]
    fn discard_future_truncates() {
        let mut r = Resource::new(true);
        r.commit_edit(1, true);
        r.commit_edit(2, true);
        r.mark_saved();
        r.step_back();
        r.step_back();

        assert_eq!(r.discard_future(0), 1..3);
        assert_eq!(r.num_versions(), 1);
        assert_eq!(r.saved_index(), None);
        assert_eq!(r.global_index(), None);
    }
}
