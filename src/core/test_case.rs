use std::collections::HashSet;

use log::{debug, warn};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize, Serializer};

use crate::core::{Chromosome, Payload, SearchError};
use crate::sut::{Action, ActionResult, ScreenState, UiDriver};

/// What a payload recorded while it was executed on the application under test.
pub trait ExecutionTrace: Payload {
    /// The number of crashes observed.
    ///
    /// returns: `usize`
    fn crashes(&self) -> usize;

    /// The distinct activities visited.
    ///
    /// returns: `HashSet<&str>`
    fn visited_activities(&self) -> HashSet<&str>;

    /// The number of actions executed on the application.
    ///
    /// returns: `usize`
    fn executed_actions(&self) -> usize;
}

/// A test case: the ordered sequence of actions executed after an application reset, with the
/// screens and activities it went through.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    /// The executed actions.
    actions: Vec<Action>,
    /// The visited screen state ids in order of discovery.
    visited_states: Vec<String>,
    /// The visited activities in order of discovery.
    visited_activities: Vec<String>,
    /// Whether the last action crashed the application.
    crash_detected: bool,
}

impl TestCase {
    /// Create an empty test case.
    ///
    /// returns: `TestCase`
    pub fn new() -> Self {
        Self::default()
    }

    /// The executed actions.
    ///
    /// returns: `&[Action]`
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// The visited screen state ids.
    ///
    /// returns: `&[String]`
    pub fn visited_states(&self) -> &[String] {
        &self.visited_states
    }

    /// Whether the test case crashed the application.
    ///
    /// returns: `bool`
    pub fn crash_detected(&self) -> bool {
        self.crash_detected
    }

    /// Append an action without executing it.
    ///
    /// # Arguments
    ///
    /// * `action`: The action.
    pub fn push_action(&mut self, action: Action) {
        self.actions.push(action);
    }

    /// Mark the test case as crashing.
    pub fn set_crash_detected(&mut self) {
        self.crash_detected = true;
    }

    /// Record a visited screen. States and activities are stored once, in order of discovery.
    ///
    /// # Arguments
    ///
    /// * `state`: The screen state.
    pub fn record_state(&mut self, state: &ScreenState) {
        if !self.visited_states.contains(&state.id) {
            self.visited_states.push(state.id.clone());
        }
        if !self.visited_activities.contains(&state.activity) {
            self.visited_activities.push(state.activity.clone());
        }
    }

    /// Execute an action on the application and record it. This returns `Ok(true)` when the test
    /// case can continue with another action and `Ok(false)` when its construction must stop:
    /// - the application was left (outbound action);
    /// - the application crashed, in which case the test case is marked as crashing;
    /// - the action failed for an unknown reason.
    ///
    /// A lost emulator is fatal and returned as [`SearchError::EmulatorCrash`].
    ///
    /// # Arguments
    ///
    /// * `driver`: The driver of the application under test.
    /// * `action`: The action to execute.
    ///
    /// returns: `Result<bool, SearchError>`
    pub fn apply(&mut self, driver: &mut dyn UiDriver, action: &Action) -> Result<bool, SearchError> {
        let result = driver.execute_action(action)?;
        if result == ActionResult::FailureEmulatorCrash {
            return Err(SearchError::EmulatorCrash(format!(
                "lost the device while executing '{action}'"
            )));
        }
        self.actions.push(action.clone());

        match result {
            ActionResult::Success | ActionResult::SuccessNewState => {
                let state = driver.current_screen_state()?;
                self.record_state(&state);
                Ok(true)
            }
            ActionResult::SuccessOutbound => {
                debug!("Action '{action}' left the application");
                Ok(false)
            }
            ActionResult::FailureAppCrash => {
                warn!("Action '{action}' crashed the application");
                self.crash_detected = true;
                Ok(false)
            }
            ActionResult::FailureUnknown | ActionResult::FailureEmulatorCrash => {
                warn!("Action '{action}' failed for an unknown reason");
                Ok(false)
            }
        }
    }
}

impl Payload for TestCase {
    fn length(&self) -> usize {
        self.actions.len()
    }
}

impl ExecutionTrace for TestCase {
    fn crashes(&self) -> usize {
        usize::from(self.crash_detected)
    }

    fn executed_actions(&self) -> usize {
        self.actions.len()
    }

    fn visited_activities(&self) -> HashSet<&str> {
        self.visited_activities.iter().map(|a| a.as_str()).collect()
    }
}

/// An ordered collection of test cases.
#[derive(Debug, Clone, Default)]
pub struct TestSuite {
    test_cases: Vec<Chromosome<TestCase>>,
}

impl TestSuite {
    /// Create a suite.
    ///
    /// # Arguments
    ///
    /// * `test_cases`: The test cases.
    ///
    /// returns: `TestSuite`
    pub fn new(test_cases: Vec<Chromosome<TestCase>>) -> Self {
        Self { test_cases }
    }

    /// The test cases in the suite.
    ///
    /// returns: `&[Chromosome<TestCase>]`
    pub fn test_cases(&self) -> &[Chromosome<TestCase>] {
        &self.test_cases
    }
}

impl Payload for TestSuite {
    fn length(&self) -> usize {
        self.test_cases.len()
    }
}

impl ExecutionTrace for TestSuite {
    fn crashes(&self) -> usize {
        self.test_cases.iter().map(|t| t.payload().crashes()).sum()
    }

    fn executed_actions(&self) -> usize {
        self.test_cases.iter().map(|t| t.length()).sum()
    }

    fn visited_activities(&self) -> HashSet<&str> {
        self.test_cases
            .iter()
            .flat_map(|t| t.payload().visited_activities.iter().map(|a| a.as_str()))
            .collect()
    }
}

impl Serialize for TestSuite {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.test_cases.len()))?;
        for test_case in &self.test_cases {
            seq.serialize_element(test_case.payload())?;
        }
        seq.end()
    }
}

#[cfg(test)]
mod test {
    use crate::core::test_utils::MockDriver;
    use crate::core::{Chromosome, ExecutionTrace, Payload, SearchError, TestCase, TestSuite};
    use crate::sut::{Action, UiDriver};

    #[test]
    fn test_apply_records_states_and_activities() {
        let mut driver = MockDriver::new(3);
        driver.reset_app().unwrap();
        let mut t = TestCase::new();
        assert!(t.apply(&mut driver, &Action::new("go:1")).unwrap());
        assert!(t.apply(&mut driver, &Action::new("go:2")).unwrap());
        assert!(t.apply(&mut driver, &Action::new("go:1")).unwrap());

        assert_eq!(t.length(), 3);
        assert_eq!(t.visited_states(), &["s1".to_string(), "s2".to_string()]);
        assert_eq!(t.visited_activities().len(), 2);
        assert!(!t.crash_detected());
    }

    #[test]
    fn test_apply_stops_on_app_crash_and_outbound() {
        let mut driver = MockDriver::new(3);
        let mut t = TestCase::new();
        assert!(!t.apply(&mut driver, &Action::new("crash")).unwrap());
        assert!(t.crash_detected());
        assert_eq!(t.length(), 1);

        let mut t = TestCase::new();
        assert!(!t.apply(&mut driver, &Action::new("leave")).unwrap());
        assert!(!t.crash_detected());
    }

    #[test]
    fn test_apply_fails_on_emulator_crash() {
        let mut driver = MockDriver::new(3);
        let mut t = TestCase::new();
        let err = t.apply(&mut driver, &Action::new("kill")).unwrap_err();
        assert!(matches!(err, SearchError::EmulatorCrash(_)));
        assert!(err.is_fatal());
        assert_eq!(t.length(), 0);
    }

    #[test]
    fn test_suite_trace() {
        let mut crashing = TestCase::new();
        crashing.set_crash_detected();
        let suite = TestSuite::new(vec![
            Chromosome::new(crashing),
            Chromosome::new(TestCase::new()),
        ]);
        assert_eq!(suite.length(), 2);
        assert_eq!(suite.crashes(), 1);
        let json = serde_json::to_string(&suite).unwrap();
        assert!(json.starts_with('['));
    }
}
