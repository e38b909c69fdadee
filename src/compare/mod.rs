//! Comparator contract shared by every feature category.
//!
//! A comparator scores either two single feature values (pairwise) or two
//! collections of feature values (set). [`Comparator::compare`] picks the
//! strategy from the operand shapes: if either side is a collection the set
//! strategy runs, otherwise the pairwise one.

use anyhow::Result;

pub mod binary;
pub mod demographics;
pub mod distribution;
pub mod encounter;
pub mod ontology;

pub use binary::BinaryComparator;
pub use demographics::DemographicsComparator;
pub use distribution::DistributionComparator;
pub use encounter::{
    AggregateMethod, Category, CategoryScores, CategoryWeights, CompareConfig,
    EncounterComparator, EncounterSimilarity,
};
pub use ontology::DiagnosisComparator;

/// Outcome of a pairwise comparison.
///
/// `Incomparable` is distinct from a valid `Score(0.0)`: it marks inputs that
/// carry no comparable signal and is dropped from set aggregation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Similarity {
    Score(f64),
    Incomparable,
}

impl Similarity {
    pub fn score(self) -> Option<f64> {
        match self {
            Self::Score(v) => Some(v),
            Self::Incomparable => None,
        }
    }

    pub fn is_incomparable(self) -> bool {
        matches!(self, Self::Incomparable)
    }

    /// Collapse to the "no evidence" convention used above the comparator layer.
    pub fn or_zero(self) -> f64 {
        self.score().unwrap_or(0.0)
    }
}

/// One side of a comparison: a single feature value or a collection.
#[derive(Debug)]
pub enum Operand<'a, T> {
    Single(&'a T),
    Set(&'a [T]),
}

impl<T> Clone for Operand<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Operand<'_, T> {}

impl<'a, T> Operand<'a, T> {
    pub fn as_slice(self) -> &'a [T] {
        match self {
            Self::Single(item) => std::slice::from_ref(item),
            Self::Set(items) => items,
        }
    }

    pub fn is_set(self) -> bool {
        matches!(self, Self::Set(_))
    }
}

pub trait Comparator {
    type Item;

    /// Score two single values; `Incomparable` when preconditions fail.
    fn compare_pair(&self, a: &Self::Item, b: &Self::Item) -> Result<Similarity>;

    /// Score two collections; always resolves to a number.
    fn compare_set(&self, a: &[Self::Item], b: &[Self::Item]) -> Result<f64>;

    fn compare(
        &self,
        a: Operand<'_, Self::Item>,
        b: Operand<'_, Self::Item>,
    ) -> Result<Similarity> {
        match (a, b) {
            (Operand::Single(a), Operand::Single(b)) => self.compare_pair(a, b),
            (a, b) => {
                let score = self.compare_set(a.as_slice(), b.as_slice())?;
                Ok(Similarity::Score(score))
            }
        }
    }
}
