use std::cell::RefCell;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

use log::debug;

use crate::core::{Chromosome, ChromosomeId, ExecutionTrace, SearchError};

/// A testing target: a measure in `[0, 1]` of how close a chromosome is to cover one goal (a
/// branch, an activity, a crash, ...). A maximising function has optimal value `1` and a
/// minimising one has optimal value `0`.
pub trait FitnessFunction<T> {
    /// The name of the target.
    ///
    /// returns: `String`
    fn name(&self) -> String;

    /// Evaluate a chromosome. This may block on the application under test or on the coverage
    /// collaborator.
    ///
    /// # Arguments
    ///
    /// * `chromosome`: The chromosome to evaluate.
    ///
    /// returns: `Result<f64, SearchError>`. The fitness in `[0, 1]`.
    fn fitness(&self, chromosome: &Chromosome<T>) -> Result<f64, SearchError>;

    /// Whether `1` (and not `0`) is the optimal value.
    ///
    /// returns: `bool`
    fn is_maximizing(&self) -> bool;

    /// Convert a fitness value to a value where `1` is always optimal, so that maximising and
    /// minimising targets can be compared.
    ///
    /// # Arguments
    ///
    /// * `value`: The raw fitness value.
    ///
    /// returns: `f64`
    fn normalize(&self, value: f64) -> f64 {
        if self.is_maximizing() {
            value
        } else {
            1.0 - value
        }
    }

    /// Evaluate a chromosome and normalise its fitness (see [`FitnessFunction::normalize`]).
    ///
    /// # Arguments
    ///
    /// * `chromosome`: The chromosome to evaluate.
    ///
    /// returns: `Result<f64, SearchError>`
    fn normalized_fitness(&self, chromosome: &Chromosome<T>) -> Result<f64, SearchError> {
        Ok(self.normalize(self.fitness(chromosome)?))
    }

    /// The value denoting a covered target.
    ///
    /// returns: `f64`
    fn optimal_value(&self) -> f64 {
        if self.is_maximizing() {
            1.0
        } else {
            0.0
        }
    }

    /// Whether a raw fitness value covers the target.
    ///
    /// returns: `bool`
    fn is_optimal(&self, value: f64) -> bool {
        self.normalize(value) >= 1.0
    }

    /// Whether a raw fitness value shows no progress at all toward the target.
    ///
    /// returns: `bool`
    fn is_unreachable(&self, value: f64) -> bool {
        self.normalize(value) <= 0.0
    }
}

/// The boxed fitness functions a run works with. Their order is the order of the objectives.
pub type FitnessFunctions<T> = Vec<Box<dyn FitnessFunction<T>>>;

/// The coverage collaborator: turns the execution of a chromosome on the instrumented
/// application into a value in `[0, 1]` for a target.
pub trait CoverageSource {
    /// Get the coverage of a target.
    ///
    /// # Arguments
    ///
    /// * `chromosome`: The chromosome identity.
    /// * `target`: The target identifier.
    ///
    /// returns: `Result<f64, SearchError>`
    fn coverage(&self, chromosome: ChromosomeId, target: &str) -> Result<f64, SearchError>;
}

/// Coverage values collected for one chromosome.
struct CachedCoverage<T> {
    /// Used to find out whether the chromosome is still referenced.
    chromosome: Weak<T>,
    /// The coverage by target identifier.
    values: HashMap<String, f64>,
}

/// Per-run state shared by all the coverage-based fitness functions of a run: the coverage
/// collaborator and the values already collected for each chromosome. A value is fetched once
/// per chromosome and target; values of chromosomes that are no longer referenced by any
/// population or archive are evicted.
pub struct CoverageContext<T> {
    /// The coverage collaborator.
    source: Box<dyn CoverageSource>,
    /// The collected values by chromosome.
    cache: RefCell<HashMap<ChromosomeId, CachedCoverage<T>>>,
}

impl<T> CoverageContext<T> {
    /// Create a new context for a run.
    ///
    /// # Arguments
    ///
    /// * `source`: The coverage collaborator.
    ///
    /// returns: `Rc<CoverageContext<T>>`
    pub fn new(source: Box<dyn CoverageSource>) -> Rc<Self> {
        Rc::new(Self {
            source,
            cache: RefCell::new(HashMap::new()),
        })
    }

    /// Get the coverage value of a chromosome for a target, querying the collaborator only when
    /// the value was never collected.
    ///
    /// # Arguments
    ///
    /// * `chromosome`: The chromosome.
    /// * `target`: The target identifier.
    ///
    /// returns: `Result<f64, SearchError>`
    pub fn coverage(&self, chromosome: &Chromosome<T>, target: &str) -> Result<f64, SearchError> {
        if let Some(value) = self
            .cache
            .borrow()
            .get(&chromosome.id())
            .and_then(|c| c.values.get(target))
        {
            return Ok(*value);
        }

        let value = self.source.coverage(chromosome.id(), target)?;
        if !(0.0..=1.0).contains(&value) {
            return Err(SearchError::Evaluation(
                target.to_string(),
                format!(
                    "the coverage {value} of {} is outside the [0, 1] range",
                    chromosome.id()
                ),
            ));
        }

        let is_new = !self.cache.borrow().contains_key(&chromosome.id());
        if is_new {
            self.evict_unreachable();
        }
        self.cache
            .borrow_mut()
            .entry(chromosome.id())
            .or_insert_with(|| CachedCoverage {
                chromosome: chromosome.downgrade(),
                values: HashMap::new(),
            })
            .values
            .insert(target.to_string(), value);
        Ok(value)
    }

    /// Drop the values of the chromosomes that are not referenced anymore.
    ///
    /// returns: `usize`. The number of evicted chromosomes.
    pub fn evict_unreachable(&self) -> usize {
        let mut cache = self.cache.borrow_mut();
        let before = cache.len();
        cache.retain(|_, c| c.chromosome.strong_count() > 0);
        let evicted = before - cache.len();
        if evicted > 0 {
            debug!("Evicted the coverage of {evicted} unreachable chromosomes");
        }
        evicted
    }

    /// The number of chromosomes with collected values.
    ///
    /// returns: `usize`
    pub fn cached_chromosomes(&self) -> usize {
        self.cache.borrow().len()
    }
}

/// The coverage of one target reported by the coverage collaborator. Coverage is maximised by
/// default; use [`TargetCoverageFitness::minimizing`] for distance-like measures.
pub struct TargetCoverageFitness<T> {
    /// The target identifier.
    target: String,
    /// The run context shared by all the targets.
    context: Rc<CoverageContext<T>>,
    /// Whether the value is maximised.
    maximizing: bool,
}

impl<T> TargetCoverageFitness<T> {
    pub fn new(target: &str, context: Rc<CoverageContext<T>>) -> Self {
        Self {
            target: target.to_string(),
            context,
            maximizing: true,
        }
    }

    pub fn minimizing(target: &str, context: Rc<CoverageContext<T>>) -> Self {
        Self {
            target: target.to_string(),
            context,
            maximizing: false,
        }
    }

    /// Build one fitness function per target, all sharing the same context.
    ///
    /// # Arguments
    ///
    /// * `targets`: The target identifiers.
    /// * `context`: The run context.
    ///
    /// returns: `FitnessFunctions<T>`
    pub fn for_targets(targets: &[&str], context: Rc<CoverageContext<T>>) -> FitnessFunctions<T>
    where
        T: 'static,
    {
        targets
            .iter()
            .map(|t| Box::new(Self::new(t, context.clone())) as Box<dyn FitnessFunction<T>>)
            .collect()
    }
}

impl<T> FitnessFunction<T> for TargetCoverageFitness<T> {
    fn name(&self) -> String {
        self.target.clone()
    }

    fn fitness(&self, chromosome: &Chromosome<T>) -> Result<f64, SearchError> {
        self.context.coverage(chromosome, &self.target)
    }

    fn is_maximizing(&self) -> bool {
        self.maximizing
    }
}

/// Prefer short tests: the number of executed actions divided by `max_length`, minimised. For a
/// suite this counts the actions of all its test cases.
pub struct TestLengthFitness<T> {
    max_length: usize,
    _payload: PhantomData<T>,
}

impl<T> TestLengthFitness<T> {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length: max_length.max(1),
            _payload: PhantomData,
        }
    }
}

impl<T: ExecutionTrace> FitnessFunction<T> for TestLengthFitness<T> {
    fn name(&self) -> String {
        "test length".to_string()
    }

    fn fitness(&self, chromosome: &Chromosome<T>) -> Result<f64, SearchError> {
        let actions = chromosome.payload().executed_actions();
        Ok((actions as f64 / self.max_length as f64).min(1.0))
    }

    fn is_maximizing(&self) -> bool {
        false
    }
}

/// Reward crashes: the number of crashes divided by `max_crashes`, maximised.
pub struct CrashFitness<T> {
    max_crashes: usize,
    _payload: PhantomData<T>,
}

impl<T> CrashFitness<T> {
    pub fn new(max_crashes: usize) -> Self {
        Self {
            max_crashes: max_crashes.max(1),
            _payload: PhantomData,
        }
    }
}

impl<T: ExecutionTrace> FitnessFunction<T> for CrashFitness<T> {
    fn name(&self) -> String {
        "crashes".to_string()
    }

    fn fitness(&self, chromosome: &Chromosome<T>) -> Result<f64, SearchError> {
        let crashes = chromosome.payload().crashes();
        Ok((crashes as f64 / self.max_crashes as f64).min(1.0))
    }

    fn is_maximizing(&self) -> bool {
        true
    }
}

/// The share of the application activities a chromosome visits, maximised.
pub struct ActivityCoverageFitness<T> {
    total_activities: usize,
    _payload: PhantomData<T>,
}

impl<T> ActivityCoverageFitness<T> {
    pub fn new(total_activities: usize) -> Self {
        Self {
            total_activities: total_activities.max(1),
            _payload: PhantomData,
        }
    }
}

impl<T: ExecutionTrace> FitnessFunction<T> for ActivityCoverageFitness<T> {
    fn name(&self) -> String {
        "activity coverage".to_string()
    }

    fn fitness(&self, chromosome: &Chromosome<T>) -> Result<f64, SearchError> {
        let visited = chromosome.payload().visited_activities().len();
        Ok((visited as f64 / self.total_activities as f64).min(1.0))
    }

    fn is_maximizing(&self) -> bool {
        true
    }
}
