use std::time::Duration;

/// The progress of a run, as seen by a [`TerminationCondition`] between two generations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchProgress {
    /// The number of completed generations.
    pub generation: usize,
    /// The time elapsed since the initial population was created.
    pub elapsed: Duration,
}

/// Trait to define a condition that causes an algorithm to terminate. The condition is consulted
/// once per generation boundary, never while a generation is being created.
pub trait TerminationCondition {
    /// Whether the condition is met.
    ///
    /// # Arguments
    ///
    /// * `progress`: The progress of the run.
    ///
    /// returns: `bool`
    fn is_met(&self, progress: &SearchProgress) -> bool;

    /// A name describing the condition.
    ///
    /// returns: `String`
    fn name(&self) -> String;
}

/// Number of generations after which a genetic algorithm terminates.
#[derive(Debug, Clone)]
pub struct IterTermination(pub usize);

impl TerminationCondition for IterTermination {
    fn is_met(&self, progress: &SearchProgress) -> bool {
        progress.generation >= self.0
    }

    fn name(&self) -> String {
        format!("maximum number of generations ({})", self.0)
    }
}

/// Elapsed time after which a genetic algorithm terminates.
#[derive(Debug, Clone)]
pub struct TimeTermination(pub Duration);

impl TerminationCondition for TimeTermination {
    fn is_met(&self, progress: &SearchProgress) -> bool {
        progress.elapsed >= self.0
    }

    fn name(&self) -> String {
        format!("maximum duration ({:?})", self.0)
    }
}

/// Never terminate. Used when the run is stopped by a fatal error or by the caller driving
/// [`crate::algorithms::GeneticAlgorithm::evolve`] directly.
#[derive(Debug, Clone)]
pub struct NeverTermination;

impl TerminationCondition for NeverTermination {
    fn is_met(&self, _progress: &SearchProgress) -> bool {
        false
    }

    fn name(&self) -> String {
        "never".to_string()
    }
}

/// Stop when at least one condition is met.
pub struct AnyOf(pub Vec<Box<dyn TerminationCondition>>);

impl TerminationCondition for AnyOf {
    fn is_met(&self, progress: &SearchProgress) -> bool {
        self.0.iter().any(|c| c.is_met(progress))
    }

    fn name(&self) -> String {
        self.0
            .iter()
            .map(|cond| cond.name())
            .collect::<Vec<String>>()
            .join(" OR ")
    }
}

/// Stop when all the conditions are met.
pub struct AllOf(pub Vec<Box<dyn TerminationCondition>>);

impl TerminationCondition for AllOf {
    fn is_met(&self, progress: &SearchProgress) -> bool {
        !self.0.is_empty() && self.0.iter().all(|c| c.is_met(progress))
    }

    fn name(&self) -> String {
        self.0
            .iter()
            .map(|cond| cond.name())
            .collect::<Vec<String>>()
            .join(" AND ")
    }
}
