use std::cell::Cell;
use std::collections::HashSet;
use std::rc::Rc;

use rand::{Rng, RngCore};
use serde::Serialize;

use crate::core::{Chromosome, FitnessFunction, FitnessFunctions, Payload, SearchError, TestCase};
use crate::operators::{ChromosomeFactory, Crossover, Mutation};
use crate::sut::{Action, ActionResult, ScreenState, UiDriver};

/// A payload with a length only.
#[derive(Debug, Clone)]
pub(crate) struct Blob(pub usize);

impl Payload for Blob {
    fn length(&self) -> usize {
        self.0
    }
}

/// A payload carrying its own fitness values, one per objective.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct Point {
    pub values: Vec<f64>,
    pub length: usize,
}

impl Payload for Point {
    fn length(&self) -> usize {
        self.length
    }
}

/// Create one chromosome per vector of fitness values, all with length 1.
pub(crate) fn points(values: &[&[f64]]) -> Vec<Chromosome<Point>> {
    values
        .iter()
        .map(|v| point(v, 1))
        .collect()
}

pub(crate) fn point(values: &[f64], length: usize) -> Chromosome<Point> {
    Chromosome::new(Point {
        values: values.to_vec(),
        length,
    })
}

/// Read the fitness value at `index` from a [`Point`].
pub(crate) struct PointFitness {
    pub index: usize,
    pub maximizing: bool,
}

impl FitnessFunction<Point> for PointFitness {
    fn name(&self) -> String {
        format!("obj{}", self.index)
    }

    fn fitness(&self, chromosome: &Chromosome<Point>) -> Result<f64, SearchError> {
        chromosome
            .payload()
            .values
            .get(self.index)
            .copied()
            .ok_or_else(|| SearchError::Evaluation(self.name(), "missing value".to_string()))
    }

    fn is_maximizing(&self) -> bool {
        self.maximizing
    }
}

/// One [`PointFitness`] per direction (`true` for maximising).
pub(crate) fn point_objectives(directions: &[bool]) -> FitnessFunctions<Point> {
    directions
        .iter()
        .enumerate()
        .map(|(index, maximizing)| {
            Box::new(PointFitness {
                index,
                maximizing: *maximizing,
            }) as Box<dyn FitnessFunction<Point>>
        })
        .collect()
}

/// Create random points and count the calls.
pub(crate) struct PointFactory {
    pub objectives: usize,
    pub created: Rc<Cell<usize>>,
}

impl PointFactory {
    pub fn new(objectives: usize) -> Self {
        Self {
            objectives,
            created: Rc::new(Cell::new(0)),
        }
    }
}

impl ChromosomeFactory<Point> for PointFactory {
    fn create_chromosome(&mut self, rng: &mut dyn RngCore) -> Result<Chromosome<Point>, SearchError> {
        self.created.set(self.created.get() + 1);
        let values = (0..self.objectives)
            .map(|_| rng.gen_range(0.0..1.0))
            .collect::<Vec<f64>>();
        Ok(point(&values, rng.gen_range(1..10)))
    }

    fn name(&self) -> String {
        "PointFactory".to_string()
    }
}

/// Move a point by a small random step and count the calls.
pub(crate) struct PointMutation {
    pub calls: Rc<Cell<usize>>,
}

impl PointMutation {
    pub fn new() -> Self {
        Self {
            calls: Rc::new(Cell::new(0)),
        }
    }
}

impl Mutation<Point> for PointMutation {
    fn mutate(
        &mut self,
        parent: &Chromosome<Point>,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Chromosome<Point>>, SearchError> {
        self.calls.set(self.calls.get() + 1);
        let values = parent
            .payload()
            .values
            .iter()
            .map(|v| (v + rng.gen_range(-0.2..0.2)).clamp(0.0, 1.0))
            .collect::<Vec<f64>>();
        let length = (parent.length() as i64 + rng.gen_range(-1..=1)).max(1) as usize;
        Ok(vec![point(&values, length)])
    }

    fn name(&self) -> String {
        "PointMutation".to_string()
    }
}

/// Swap the values of two points after the first objective and count the calls.
pub(crate) struct PointCrossover {
    pub calls: Rc<Cell<usize>>,
}

impl PointCrossover {
    pub fn new() -> Self {
        Self {
            calls: Rc::new(Cell::new(0)),
        }
    }
}

impl Crossover<Point> for PointCrossover {
    fn cross(
        &mut self,
        parents: &[Chromosome<Point>],
        _rng: &mut dyn RngCore,
    ) -> Result<Vec<Chromosome<Point>>, SearchError> {
        self.calls.set(self.calls.get() + 1);
        let (a, b) = (&parents[0].payload().values, &parents[1].payload().values);
        let mut child1 = a.clone();
        let mut child2 = b.clone();
        for i in 1..a.len().min(b.len()) {
            std::mem::swap(&mut child1[i], &mut child2[i]);
        }
        Ok(vec![
            point(&child1, parents[0].length()),
            point(&child2, parents[1].length()),
        ])
    }

    fn name(&self) -> String {
        "PointCrossover".to_string()
    }
}

/// Build a test case from action identifiers without executing it.
pub(crate) fn test_case(actions: &[&str]) -> TestCase {
    let mut test_case = TestCase::new();
    for action in actions {
        test_case.push_action(Action::new(action));
    }
    test_case
}

/// A scripted application with `n` screens `s0..sN`. On every screen, `go:j` moves to screen
/// `sj`; screen `si` belongs to activity `act{i % 2}`. Special actions:
/// - `crash` crashes the application;
/// - `leave` leaves the application;
/// - `kill` loses the emulator;
/// - anything else fails for an unknown reason.
pub(crate) struct MockDriver {
    states: usize,
    current: usize,
    visited: HashSet<usize>,
    extra_actions: Vec<Action>,
    only_actions: Option<Vec<Action>>,
    pub resets: usize,
    pub executions: usize,
}

impl MockDriver {
    pub fn new(states: usize) -> Self {
        Self {
            states,
            current: 0,
            visited: HashSet::from([0]),
            extra_actions: Vec::new(),
            only_actions: None,
            resets: 0,
            executions: 0,
        }
    }

    /// Make a special action executable on every screen.
    pub fn with_action(mut self, action: &str) -> Self {
        self.extra_actions.push(Action::new(action));
        self
    }

    /// Make a special action the only executable action.
    pub fn only_action(mut self, action: &str) -> Self {
        self.only_actions = Some(vec![Action::new(action)]);
        self
    }
}

impl UiDriver for MockDriver {
    fn reset_app(&mut self) -> Result<(), SearchError> {
        self.current = 0;
        self.resets += 1;
        Ok(())
    }

    fn executable_actions(&self, _state: &ScreenState) -> Result<Vec<Action>, SearchError> {
        if let Some(only) = &self.only_actions {
            return Ok(only.clone());
        }
        let mut actions = (0..self.states)
            .map(|j| Action::new(&format!("go:{j}")))
            .collect::<Vec<_>>();
        actions.extend(self.extra_actions.iter().cloned());
        Ok(actions)
    }

    fn execute_action(&mut self, action: &Action) -> Result<ActionResult, SearchError> {
        self.executions += 1;
        let result = match action.id() {
            "crash" => {
                self.current = 0;
                ActionResult::FailureAppCrash
            }
            "leave" => ActionResult::SuccessOutbound,
            "kill" => ActionResult::FailureEmulatorCrash,
            id => match id.strip_prefix("go:").and_then(|j| j.parse::<usize>().ok()) {
                Some(j) if j < self.states => {
                    self.current = j;
                    if self.visited.insert(j) {
                        ActionResult::SuccessNewState
                    } else {
                        ActionResult::Success
                    }
                }
                _ => ActionResult::FailureUnknown,
            },
        };
        Ok(result)
    }

    fn current_screen_state(&self) -> Result<ScreenState, SearchError> {
        Ok(ScreenState::new(
            &format!("s{}", self.current),
            &format!("act{}", self.current % 2),
        ))
    }
}
