//! Pending/committed tracking for edits that must be confirmed by a remote
//! write before they become the visible state.

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq)]
pub enum MutationState<T> {
    Idle,
    Pending { previous: T, proposed: T },
    Committed,
    Failed { error: String },
}

/// A value shown to the user together with the state of its latest edit.
///
/// While an edit is pending the proposed value is visible; a failed write puts
/// the previous value back.
#[derive(Debug, Clone)]
pub struct TrackedPlan<T> {
    visible: T,
    state: MutationState<T>,
}

impl<T: Clone> TrackedPlan<T> {
    pub fn new(value: T) -> Self {
        Self {
            visible: value,
            state: MutationState::Idle,
        }
    }

    pub fn visible(&self) -> &T {
        &self.visible
    }

    pub fn state(&self) -> &MutationState<T> {
        &self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, MutationState::Pending { .. })
    }

    /// Show `proposed` and remember what to go back to.
    pub fn begin(&mut self, proposed: T) -> AppResult<()> {
        if self.is_pending() {
            return Err(AppError::Validation(
                "another change to this plan is still being saved".into(),
            ));
        }
        let previous = std::mem::replace(&mut self.visible, proposed.clone());
        self.state = MutationState::Pending { previous, proposed };
        Ok(())
    }

    /// Keep the proposed value. `confirmed` is what the remote side stored.
    pub fn commit(&mut self, confirmed: T) {
        if self.is_pending() {
            self.visible = confirmed;
            self.state = MutationState::Committed;
        }
    }

    /// Restore the value shown before `begin`.
    pub fn fail(&mut self, error: impl Into<String>) {
        let state = std::mem::replace(&mut self.state, MutationState::Idle);
        match state {
            MutationState::Pending { previous, .. } => {
                self.visible = previous;
                self.state = MutationState::Failed {
                    error: error.into(),
                };
            }
            other => self.state = other,
        }
    }

    /// Replace the visible value outside of an edit, e.g. after a reload.
    pub fn reset(&mut self, value: T) {
        self.visible = value;
        self.state = MutationState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_keeps_confirmed_value() {
        let mut t = TrackedPlan::new(1);
        t.begin(2).expect("begin");
        assert_eq!(*t.visible(), 2);
        assert!(t.is_pending());
        t.commit(2);
        assert_eq!(*t.visible(), 2);
        assert_eq!(*t.state(), MutationState::Committed);
    }

    #[test]
    fn failure_restores_previous_value() {
        let mut t = TrackedPlan::new("old".to_string());
        t.begin("new".to_string()).expect("begin");
        t.fail("remote service returned 500");
        assert_eq!(t.visible(), "old");
        assert!(matches!(t.state(), MutationState::Failed { .. }));
    }

    #[test]
    fn second_begin_while_pending_is_rejected() {
        let mut t = TrackedPlan::new(1);
        t.begin(2).expect("begin");
        assert!(t.begin(3).is_err());
        assert_eq!(*t.visible(), 2);
    }

    #[test]
    fn commit_or_fail_without_pending_is_a_no_op() {
        let mut t = TrackedPlan::new(5);
        t.commit(9);
        t.fail("nothing pending");
        assert_eq!(*t.visible(), 5);
        assert_eq!(*t.state(), MutationState::Idle);
    }
}
