//! Per-day attendance state machine.
//!
//! A person's day moves `None → LoggedIn → LoggedOut`. Each successful
//! identification advances one step; `LoggedOut` is terminal until the
//! local date changes.

use crate::types::{daily_window, Action, AttendanceEvent};
use chrono::NaiveDateTime;
use thiserror::Error;

/// Maximum number of events a person may hold for one day.
pub const MAX_EVENTS_PER_DAY: usize = 2;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("{person_id} has {count} events for one day (at most {MAX_EVENTS_PER_DAY} allowed)")]
    TooManyEvents { person_id: String, count: usize },
    #[error("{person_id} has an out-of-order day: {actions}")]
    OutOfOrder { person_id: String, actions: String },
}

/// Where a person is in their working day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayState {
    /// No events today.
    None,
    /// One LOGIN event today.
    LoggedIn,
    /// LOGIN then LOGOUT today. Terminal.
    LoggedOut,
}

impl DayState {
    /// Classify a daily window, rejecting windows that break the day invariant.
    pub fn from_window(person_id: &str, window: &[AttendanceEvent]) -> Result<Self, PolicyError> {
        let actions: Vec<Action> = window.iter().map(|e| e.action).collect();
        match actions.as_slice() {
            [] => Ok(DayState::None),
            [Action::Login] => Ok(DayState::LoggedIn),
            [Action::Login, Action::Logout] => Ok(DayState::LoggedOut),
            _ if actions.len() > MAX_EVENTS_PER_DAY => Err(PolicyError::TooManyEvents {
                person_id: person_id.to_string(),
                count: actions.len(),
            }),
            _ => Err(PolicyError::OutOfOrder {
                person_id: person_id.to_string(),
                actions: actions
                    .iter()
                    .map(Action::as_str)
                    .collect::<Vec<_>>()
                    .join(","),
            }),
        }
    }

    /// The action the next successful scan records, if any.
    pub fn next_action(&self) -> Option<Action> {
        match self {
            DayState::None => Some(Action::Login),
            DayState::LoggedIn => Some(Action::Logout),
            DayState::LoggedOut => None,
        }
    }
}

/// What to do with a successful identification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Append this event. `expected_prior` is the window size it was decided against.
    Record {
        event: AttendanceEvent,
        expected_prior: usize,
    },
    /// Both events already exist for today.
    AlreadyComplete,
    /// `now` does not come after today's last event.
    TooSoon,
}

/// Decide the next step for `person_id` at `now` given their event history.
///
/// Only events dated `now.date()` are considered; older days never affect today.
pub fn decide(
    person_id: &str,
    history: &[AttendanceEvent],
    now: NaiveDateTime,
) -> Result<Decision, PolicyError> {
    let window = daily_window(history, now.date());
    let state = DayState::from_window(person_id, &window)?;

    let Some(action) = state.next_action() else {
        return Ok(Decision::AlreadyComplete);
    };

    if let Some(last) = window.last() {
        if now <= last.timestamp {
            return Ok(Decision::TooSoon);
        }
    }

    Ok(Decision::Record {
        event: AttendanceEvent {
            person_id: person_id.to_string(),
            timestamp: now,
            action,
        },
        expected_prior: window.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::parse_timestamp;

    fn at(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    fn event(ts: &str, action: Action) -> AttendanceEvent {
        AttendanceEvent { person_id: "E100".into(), timestamp: at(ts), action }
    }

    fn recorded(decision: Decision) -> (AttendanceEvent, usize) {
        match decision {
            Decision::Record { event, expected_prior } => (event, expected_prior),
            other => panic!("expected a record, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_day_logs_in() {
        let (event, prior) = recorded(decide("E100", &[], at("2024-03-10 09:00:00")).unwrap());
        assert_eq!(event.action, Action::Login);
        assert_eq!(event.timestamp, at("2024-03-10 09:00:00"));
        assert_eq!(prior, 0);
    }

    #[test]
    fn test_logged_in_logs_out() {
        let history = vec![event("2024-03-10 09:00:00", Action::Login)];
        let (event, prior) = recorded(decide("E100", &history, at("2024-03-10 18:00:00")).unwrap());
        assert_eq!(event.action, Action::Logout);
        assert_eq!(prior, 1);
    }

    #[test]
    fn test_logged_out_is_terminal() {
        let history = vec![
            event("2024-03-10 09:00:00", Action::Login),
            event("2024-03-10 18:00:00", Action::Logout),
        ];
        let decision = decide("E100", &history, at("2024-03-10 19:00:00")).unwrap();
        assert_eq!(decision, Decision::AlreadyComplete);
    }

    #[test]
    fn test_previous_days_are_ignored() {
        let history = vec![
            event("2024-03-09 09:00:00", Action::Login),
            event("2024-03-09 18:00:00", Action::Logout),
        ];
        let (event, _) = recorded(decide("E100", &history, at("2024-03-10 08:30:00")).unwrap());
        assert_eq!(event.action, Action::Login);
    }

    #[test]
    fn test_unfinished_previous_day_does_not_carry_over() {
        let history = vec![event("2024-03-09 09:00:00", Action::Login)];
        let (event, _) = recorded(decide("E100", &history, at("2024-03-10 09:00:00")).unwrap());
        assert_eq!(event.action, Action::Login);
    }

    #[test]
    fn test_same_second_rescan_is_too_soon() {
        let history = vec![event("2024-03-10 09:00:00", Action::Login)];
        let decision = decide("E100", &history, at("2024-03-10 09:00:00")).unwrap();
        assert_eq!(decision, Decision::TooSoon);
    }

    #[test]
    fn test_logout_first_is_rejected() {
        let history = vec![event("2024-03-10 09:00:00", Action::Logout)];
        let err = decide("E100", &history, at("2024-03-10 10:00:00")).unwrap_err();
        assert!(matches!(err, PolicyError::OutOfOrder { .. }));
    }

    #[test]
    fn test_three_events_is_rejected() {
        let history = vec![
            event("2024-03-10 09:00:00", Action::Login),
            event("2024-03-10 12:00:00", Action::Logout),
            event("2024-03-10 13:00:00", Action::Login),
        ];
        let err = decide("E100", &history, at("2024-03-10 18:00:00")).unwrap_err();
        assert_eq!(err, PolicyError::TooManyEvents { person_id: "E100".into(), count: 3 });
    }

    #[test]
    fn test_day_never_exceeds_two_events() {
        // Drive a day through many scans and check the invariant after each.
        let mut history = Vec::new();
        for hour in 8..20 {
            let now = at(&format!("2024-03-10 {hour:02}:00:00"));
            if let Decision::Record { event, .. } = decide("E100", &history, now).unwrap() {
                history.push(event);
            }
            let window = daily_window(&history, now.date());
            assert!(window.len() <= MAX_EVENTS_PER_DAY);
            DayState::from_window("E100", &window).unwrap();
        }
        let actions: Vec<Action> = history.iter().map(|e| e.action).collect();
        assert_eq!(actions, vec![Action::Login, Action::Logout]);
    }
}
