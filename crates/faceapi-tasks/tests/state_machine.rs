//! Task status state machine tests.
//!
//! Covers the full 4x4 transition matrix: 3 valid transitions, 4
//! self-transition rejections, 8 terminal-state rejections and 1 skip
//! (`queued -> finished/failed` without starting).

// ─── is_terminal Tests ──────────────────────────────────────────────────────

mod is_terminal {
    use faceapi_tasks::TaskStatus;

    #[test]
    fn queued_and_started_are_not_terminal() {
        assert!(!TaskStatus::Queued.is_terminal());
        assert!(!TaskStatus::Started.is_terminal());
    }

    #[test]
    fn finished_and_failed_are_terminal() {
        assert!(TaskStatus::Finished.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
    }
}

// ─── Valid Transitions (3 total) ────────────────────────────────────────────

mod valid_transitions {
    use faceapi_tasks::TaskStatus;

    #[test]
    fn queued_to_started() {
        assert!(TaskStatus::Queued.can_transition_to(&TaskStatus::Started));
        assert!(TaskStatus::Queued
            .validate_transition("t1", &TaskStatus::Started)
            .is_ok());
    }

    #[test]
    fn started_to_finished() {
        assert!(TaskStatus::Started
            .validate_transition("t1", &TaskStatus::Finished)
            .is_ok());
    }

    #[test]
    fn started_to_failed() {
        assert!(TaskStatus::Started
            .validate_transition("t1", &TaskStatus::Failed)
            .is_ok());
    }
}

// ─── Rejected Transitions ───────────────────────────────────────────────────

mod rejected_transitions {
    use faceapi_tasks::{TaskError, TaskStatus};

    const ALL: [TaskStatus; 4] = [
        TaskStatus::Queued,
        TaskStatus::Started,
        TaskStatus::Finished,
        TaskStatus::Failed,
    ];

    #[test]
    fn self_transitions_rejected() {
        for status in ALL {
            assert!(
                !status.can_transition_to(&status),
                "{status} -> {status} must be rejected"
            );
        }
    }

    #[test]
    fn terminal_states_reject_everything() {
        for from in [TaskStatus::Finished, TaskStatus::Failed] {
            for to in ALL {
                let err = from.validate_transition("t-term", &to).unwrap_err();
                match err {
                    TaskError::InvalidTransition {
                        task_id,
                        suggested_action,
                        ..
                    } => {
                        assert_eq!(task_id, "t-term");
                        assert!(suggested_action.unwrap().contains("terminal"));
                    },
                    other => panic!("unexpected error: {other}"),
                }
            }
        }
    }

    #[test]
    fn queued_cannot_terminate_directly() {
        assert!(!TaskStatus::Queued.can_transition_to(&TaskStatus::Finished));
        assert!(!TaskStatus::Queued.can_transition_to(&TaskStatus::Failed));
    }

    #[test]
    fn started_cannot_go_back_to_queued() {
        assert!(!TaskStatus::Started.can_transition_to(&TaskStatus::Queued));
    }

    #[test]
    fn exactly_three_valid_transitions() {
        let valid = ALL
            .iter()
            .flat_map(|from| ALL.iter().map(move |to| (from, to)))
            .filter(|(from, to)| from.can_transition_to(to))
            .count();
        assert_eq!(valid, 3);
    }
}
