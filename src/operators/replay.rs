use log::debug;
use rand::prelude::SliceRandom;
use rand::RngCore;

use crate::core::{Payload, SearchError, TestCase};
use crate::sut::{Action, UiDriver};

/// Reset the application and start a new test case from its first screen.
///
/// # Arguments
///
/// * `driver`: The driver of the application under test.
///
/// returns: `Result<TestCase, SearchError>`
pub(crate) fn start_test_case(driver: &mut dyn UiDriver) -> Result<TestCase, SearchError> {
    driver.reset_app()?;
    let mut test_case = TestCase::new();
    test_case.record_state(&driver.current_screen_state()?);
    Ok(test_case)
}

/// Replay a sequence of actions on a freshly reset application. Actions that are not executable
/// on the screen reached so far are skipped.
///
/// # Arguments
///
/// * `driver`: The driver of the application under test.
/// * `actions`: The actions to replay.
///
/// returns: `Result<(TestCase, bool), SearchError>`. The new test case and whether more actions
/// can be appended to it.
pub(crate) fn replay(
    driver: &mut dyn UiDriver,
    actions: &[Action],
) -> Result<(TestCase, bool), SearchError> {
    let mut test_case = start_test_case(driver)?;
    for action in actions {
        let state = driver.current_screen_state()?;
        if !driver.executable_actions(&state)?.contains(action) {
            debug!("Skipping action '{action}' not executable on state '{}'", state.id);
            continue;
        }
        if !test_case.apply(driver, action)? {
            return Ok((test_case, false));
        }
    }
    Ok((test_case, true))
}

/// Extend a test case with uniformly random executable actions until it has `max_actions`
/// actions or an action ends it.
///
/// # Arguments
///
/// * `driver`: The driver of the application under test.
/// * `test_case`: The test case to extend.
/// * `max_actions`: The maximum test case length.
/// * `rng`: The random number generator.
///
/// returns: `Result<(), SearchError>`
pub(crate) fn random_walk(
    driver: &mut dyn UiDriver,
    test_case: &mut TestCase,
    max_actions: usize,
    rng: &mut dyn RngCore,
) -> Result<(), SearchError> {
    while test_case.length() < max_actions {
        let state = driver.current_screen_state()?;
        let actions = driver.executable_actions(&state)?;
        let Some(action) = actions.choose(rng) else {
            debug!("No executable action on state '{}'", state.id);
            break;
        };
        if !test_case.apply(driver, action)? {
            break;
        }
    }
    Ok(())
}
