use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize, Serializer};

/// Counter handing out unique chromosome identities.
static NEXT_CHROMOSOME_ID: AtomicU64 = AtomicU64::new(1);

/// The stable identity of a [`Chromosome`]. Clones of a chromosome share the same identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChromosomeId(u64);

impl ChromosomeId {
    fn next() -> Self {
        Self(NEXT_CHROMOSOME_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The numeric value of the identity.
    ///
    /// returns: `u64`
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl Display for ChromosomeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The content evolved by the search. The engine never inspects a payload, except for its
/// length which is used to break ties between equally fit chromosomes.
pub trait Payload {
    /// The length of the payload: the number of actions of a test case or the number of test
    /// cases in a suite.
    ///
    /// returns: `usize`
    fn length(&self) -> usize;
}

/// A candidate test artifact evolved by the search. This is a cheap handle: cloning a chromosome
/// shares its payload and identity, so the same chromosome can sit in the population and in an
/// archive at the same time.
///
/// # Example
/// ```
/// use evotest::core::{Chromosome, TestCase};
/// use evotest::sut::Action;
///
/// let mut test_case = TestCase::new();
/// test_case.push_action(Action::new("click:ok"));
/// let chromosome = Chromosome::new(test_case);
/// let copy = chromosome.clone();
/// assert_eq!(chromosome.id(), copy.id());
/// assert_eq!(chromosome.length(), 1);
/// ```
#[derive(Debug)]
pub struct Chromosome<T> {
    /// The chromosome identity.
    id: ChromosomeId,
    /// The test case or test suite.
    payload: Rc<T>,
}

impl<T> Chromosome<T> {
    /// Wrap a payload into a new chromosome with a fresh identity.
    ///
    /// # Arguments
    ///
    /// * `payload`: The test case or test suite.
    ///
    /// returns: `Chromosome<T>`
    pub fn new(payload: T) -> Self {
        Self {
            id: ChromosomeId::next(),
            payload: Rc::new(payload),
        }
    }

    /// The chromosome identity.
    ///
    /// returns: `ChromosomeId`
    pub fn id(&self) -> ChromosomeId {
        self.id
    }

    /// The payload.
    ///
    /// returns: `&T`
    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// A weak reference to the payload. This does not keep the chromosome alive and is used by
    /// caches to detect chromosomes no population or archive references anymore.
    ///
    /// returns: `Weak<T>`
    pub fn downgrade(&self) -> Weak<T> {
        Rc::downgrade(&self.payload)
    }
}

impl<T: Payload> Chromosome<T> {
    /// The payload length.
    ///
    /// returns: `usize`
    pub fn length(&self) -> usize {
        self.payload.length()
    }
}

impl<T> Clone for Chromosome<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            payload: self.payload.clone(),
        }
    }
}

impl<T> PartialEq for Chromosome<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Chromosome<T> {}

impl<T> Hash for Chromosome<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T: Payload> Display for Chromosome<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Chromosome({}, length={})", self.id, self.length())
    }
}

/// A chromosome is serialised as its payload.
impl<T: Serialize> Serialize for Chromosome<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.payload.as_ref().serialize(serializer)
    }
}

/// An ordered list of chromosomes.
pub type Population<T> = Vec<Chromosome<T>>;
