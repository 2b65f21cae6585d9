//! The contract with the application under test (SUT).
//!
//! The search engine never talks to a device directly. Chromosome factories, crossover and
//! mutation operators receive a [`SharedDriver`] through their constructor and use it to reset the
//! application, list and execute actions and read the current screen.
use std::cell::RefCell;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::core::SearchError;

/// An opaque action that can be executed on a screen of the application (a click, a text input,
/// a system event, ...). Two actions are the same when their identifiers match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Action(pub String);

impl Action {
    /// Create a new action.
    ///
    /// # Arguments
    ///
    /// * `id`: The action identifier.
    ///
    /// returns: `Action`
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }

    /// The action identifier.
    ///
    /// returns: `&str`
    pub fn id(&self) -> &str {
        &self.0
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The screen the application is showing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScreenState {
    /// The identity of the abstract screen state.
    pub id: String,
    /// The name of the activity owning the screen.
    pub activity: String,
}

impl ScreenState {
    pub fn new(id: &str, activity: &str) -> Self {
        Self {
            id: id.to_string(),
            activity: activity.to_string(),
        }
    }
}

/// The outcome of executing an [`Action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionResult {
    /// The action was executed and the screen is a known one.
    Success,
    /// The action was executed and reached a screen never seen before.
    SuccessNewState,
    /// The action was executed but the application under test was left.
    SuccessOutbound,
    /// The application crashed.
    FailureAppCrash,
    /// The device or emulator is not reachable anymore.
    FailureEmulatorCrash,
    /// The action could not be executed for an unknown reason.
    FailureUnknown,
}

/// The device/UI layer executing actions on the application under test.
pub trait UiDriver {
    /// Restart the application from a clean state.
    ///
    /// return: `Result<(), SearchError>`
    fn reset_app(&mut self) -> Result<(), SearchError>;

    /// List the actions that can be executed on a screen.
    ///
    /// # Arguments
    ///
    /// * `state`: The screen state.
    ///
    /// returns: `Result<Vec<Action>, SearchError>`
    fn executable_actions(&self, state: &ScreenState) -> Result<Vec<Action>, SearchError>;

    /// Execute an action on the current screen.
    ///
    /// # Arguments
    ///
    /// * `action`: The action to execute.
    ///
    /// returns: `Result<ActionResult, SearchError>`. The error is reserved to transport failures;
    /// crashes are reported with the [`ActionResult`] variants.
    fn execute_action(&mut self, action: &Action) -> Result<ActionResult, SearchError>;

    /// Get the screen currently shown by the application.
    ///
    /// returns: `Result<ScreenState, SearchError>`
    fn current_screen_state(&self) -> Result<ScreenState, SearchError>;
}

/// A handle to the single application instance. Only one operator at a time can borrow it, so
/// two executions on the SUT can never overlap.
pub type SharedDriver = Rc<RefCell<dyn UiDriver>>;

/// Borrow the driver mutably, failing instead of panicking when another operator holds it.
///
/// # Arguments
///
/// * `driver`: The shared driver.
///
/// returns: `Result<std::cell::RefMut<dyn UiDriver>, SearchError>`
pub(crate) fn borrow_driver(
    driver: &SharedDriver,
) -> Result<std::cell::RefMut<'_, dyn UiDriver + 'static>, SearchError> {
    driver.try_borrow_mut().map_err(|_| {
        SearchError::Driver("the application under test is already being driven".to_string())
    })
}
