use chrono::{DateTime, Duration, Utc};
use course_core::model::SectionId;

/// Quiet period after the last keystroke before a note save fires.
pub const AUTOSAVE_QUIET_MS: i64 = 1000;

/// How long the save indicator shows `Saved` before reverting to `Idle`.
pub const SAVED_STATUS_HOLD_MS: i64 = 3000;

/// Save-indicator state exposed to presentation components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    Saved,
}

/// A note edit waiting out its quiet period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSave {
    pub section_id: SectionId,
    pub text: String,
    pub due_at: DateTime<Utc>,
}

/// Explicit cancellable debounce timer for note autosave.
///
/// At most one save is ever pending: each edit replaces the text and
/// restarts the quiet period, so only the most recent edit is persisted.
/// Deadlines are computed against caller-supplied time.
#[derive(Debug, Default)]
pub struct NoteAutosave {
    pending: Option<PendingSave>,
}

impl NoteAutosave {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms (or re-arms) the timer for an edit made at `now`.
    pub fn record_edit(&mut self, section_id: SectionId, text: String, now: DateTime<Utc>) {
        self.pending = Some(PendingSave {
            section_id,
            text,
            due_at: now + Duration::milliseconds(AUTOSAVE_QUIET_MS),
        });
    }

    /// Takes the pending save once its quiet period has elapsed.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Option<PendingSave> {
        if self.pending.as_ref().is_some_and(|p| p.due_at <= now) {
            self.pending.take()
        } else {
            None
        }
    }

    /// Takes the pending save regardless of its deadline. Called on
    /// teardown and navigation so the last edit is never lost.
    pub fn flush(&mut self) -> Option<PendingSave> {
        self.pending.take()
    }

    /// Drops the pending save without persisting it.
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// Tracks the `Idle -> Saving -> Saved -> Idle` indicator cycle.
#[derive(Debug, Default)]
pub struct SaveIndicator {
    status: SaveStatus,
    saved_at: Option<DateTime<Utc>>,
}

impl SaveIndicator {
    #[must_use]
    pub fn status(&self) -> SaveStatus {
        self.status
    }

    pub fn begin_saving(&mut self) {
        self.status = SaveStatus::Saving;
        self.saved_at = None;
    }

    pub fn mark_saved(&mut self, now: DateTime<Utc>) {
        self.status = SaveStatus::Saved;
        self.saved_at = Some(now);
    }

    /// Reverts `Saved` to `Idle` once the hold period has elapsed.
    pub fn refresh(&mut self, now: DateTime<Utc>) {
        if self.status == SaveStatus::Saved
            && self
                .saved_at
                .is_some_and(|at| now - at >= Duration::milliseconds(SAVED_STATUS_HOLD_MS))
        {
            self.status = SaveStatus::Idle;
            self.saved_at = None;
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::time::fixed_now;

    fn at(ms: i64) -> DateTime<Utc> {
        fixed_now() + Duration::milliseconds(ms)
    }

    #[test]
    fn rapid_edits_collapse_to_one_save_with_final_text() {
        let section = SectionId::new(1);
        let mut autosave = NoteAutosave::new();

        autosave.record_edit(section, "h".into(), at(0));
        assert!(autosave.take_due(at(200)).is_none());
        autosave.record_edit(section, "he".into(), at(200));
        autosave.record_edit(section, "hel".into(), at(400));
        autosave.record_edit(section, "hello".into(), at(900));

        // Nothing fires before the quiet period after the last keystroke.
        assert!(autosave.take_due(at(1899)).is_none());

        let save = autosave.take_due(at(1900)).expect("due save");
        assert_eq!(save.text, "hello");
        assert_eq!(save.due_at, at(1900));

        // Exactly one save: the timer is spent.
        assert!(autosave.take_due(at(5000)).is_none());
        assert!(!autosave.is_pending());
    }

    #[test]
    fn flush_takes_early_and_cancel_drops() {
        let section = SectionId::new(1);
        let mut autosave = NoteAutosave::new();

        autosave.record_edit(section, "draft".into(), at(0));
        let flushed = autosave.flush().expect("flushed save");
        assert_eq!(flushed.text, "draft");

        autosave.record_edit(section, "gone".into(), at(100));
        autosave.cancel();
        assert!(autosave.take_due(at(10_000)).is_none());
    }

    #[test]
    fn latest_edit_wins_across_sections() {
        let mut autosave = NoteAutosave::new();
        autosave.record_edit(SectionId::new(1), "first".into(), at(0));
        autosave.record_edit(SectionId::new(2), "second".into(), at(100));

        let save = autosave.take_due(at(1100)).expect("due save");
        assert_eq!(save.section_id, SectionId::new(2));
        assert_eq!(save.text, "second");
    }

    #[test]
    fn saved_indicator_reverts_after_hold() {
        let mut indicator = SaveIndicator::default();
        assert_eq!(indicator.status(), SaveStatus::Idle);

        indicator.begin_saving();
        assert_eq!(indicator.status(), SaveStatus::Saving);

        indicator.mark_saved(at(0));
        indicator.refresh(at(2999));
        assert_eq!(indicator.status(), SaveStatus::Saved);

        indicator.refresh(at(3000));
        assert_eq!(indicator.status(), SaveStatus::Idle);
    }
}
