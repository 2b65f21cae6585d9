use std::cell::RefCell;
use std::env;
use std::error::Error;
use std::path::PathBuf;
use std::rc::Rc;

use log::LevelFilter;

use evotest::algorithms::{GaBuilder, GaConfig, Registry};
use evotest::core::{
    ActivityCoverageFitness, CrashFitness, FitnessFunction, SearchError, TestLengthFitness,
    TestSuite,
};
use evotest::sut::{Action, ActionResult, ScreenState, UiDriver};

/// A simulated note-taking application. Each screen lists the actions it accepts and where each
/// action leads:
/// - `list` (MainActivity) opens the editor or the settings;
/// - `editor` (EditorActivity) saves a note, goes back, or crashes when an empty note is saved;
/// - `settings` (SettingsActivity) opens the about screen or goes back;
/// - `about` (SettingsActivity) goes back or opens the website in another application.
struct NotesApp {
    current: &'static str,
    note_is_empty: bool,
}

impl NotesApp {
    fn new() -> Self {
        Self {
            current: "list",
            note_is_empty: true,
        }
    }

    fn activity(screen: &str) -> &'static str {
        match screen {
            "list" => "MainActivity",
            "editor" => "EditorActivity",
            _ => "SettingsActivity",
        }
    }
}

impl UiDriver for NotesApp {
    fn reset_app(&mut self) -> Result<(), SearchError> {
        self.current = "list";
        self.note_is_empty = true;
        Ok(())
    }

    fn executable_actions(&self, state: &ScreenState) -> Result<Vec<Action>, SearchError> {
        let actions: &[&str] = match state.id.as_str() {
            "list" => &["new-note", "open-settings"],
            "editor" => &["type-text", "save", "back"],
            "settings" => &["open-about", "back"],
            "about" => &["open-website", "back"],
            other => {
                return Err(SearchError::Driver(format!("Unknown screen '{other}'")));
            }
        };
        Ok(actions.iter().map(|a| Action::new(a)).collect())
    }

    fn execute_action(&mut self, action: &Action) -> Result<ActionResult, SearchError> {
        let (next, result) = match (self.current, action.id()) {
            ("list", "new-note") => ("editor", ActionResult::SuccessNewState),
            ("list", "open-settings") => ("settings", ActionResult::SuccessNewState),
            ("editor", "type-text") => {
                self.note_is_empty = false;
                ("editor", ActionResult::Success)
            }
            ("editor", "save") if self.note_is_empty => ("list", ActionResult::FailureAppCrash),
            ("editor", "save") | ("editor", "back") => ("list", ActionResult::Success),
            ("settings", "open-about") => ("about", ActionResult::SuccessNewState),
            ("settings", "back") | ("about", "back") => ("list", ActionResult::Success),
            ("about", "open-website") => ("about", ActionResult::SuccessOutbound),
            _ => (self.current, ActionResult::FailureUnknown),
        };
        self.current = next;
        Ok(result)
    }

    fn current_screen_state(&self) -> Result<ScreenState, SearchError> {
        Ok(ScreenState::new(self.current, Self::activity(self.current)))
    }
}

/// Generate test suites for a simulated application with Sapienz. The three objectives are the
/// activity coverage and the number of crashes (maximised), and the suite length (minimised).
/// The algorithm and its operators are picked by identifier from a JSON configuration.
///
/// `cargo run --example sapienz_search --release`
fn main() -> Result<(), Box<dyn Error>> {
    // Add log
    env_logger::builder().filter_level(LevelFilter::Info).init();

    let driver = Rc::new(RefCell::new(NotesApp::new()));
    let test_cases_per_suite = 3;
    let registry = Registry::<TestSuite>::for_test_suites(driver, 8, test_cases_per_suite);

    let config = GaConfig::from_json(
        r#"{
            "algorithm": "sapienz",
            "chromosome_factory": "suite",
            "selection": "random",
            "crossover": "uniform_suite",
            "mutation": "suite_cut_point",
            "termination": "iter_or_time",
            "population_size": 10,
            "max_generations": 20,
            "search_budget_secs": 60,
            "seed": 10
        }"#,
    )?;
    let fitness_functions = vec![
        Box::new(ActivityCoverageFitness::new(3)) as Box<dyn FitnessFunction<TestSuite>>,
        Box::new(CrashFitness::new(test_cases_per_suite)),
        Box::new(TestLengthFitness::new(8 * test_cases_per_suite)),
    ];
    let mut algo = GaBuilder::new(&registry, config).build(fitness_functions)?;
    algo.run()?;

    for (i, suite) in algo.result().iter().take(3).enumerate() {
        println!("Suite #{} with {} test cases", i + 1, suite.length());
        for test_case in suite.payload().test_cases() {
            let actions = test_case
                .payload()
                .actions()
                .iter()
                .map(|a| a.id())
                .collect::<Vec<&str>>();
            println!("\t{}", actions.join(" -> "));
        }
    }

    // Export serialised results at last generation
    let out_path = PathBuf::from(&env::current_dir()?)
        .join("demos")
        .join("results");
    std::fs::create_dir_all(&out_path)?;
    algo.save_to_json(&out_path.join("Sapienz_notes_app.json"))?;

    Ok(())
}
