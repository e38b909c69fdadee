use std::collections::{HashMap, HashSet};

use anyhow::{Result, bail};
use serde::Serialize;
use tracing::{debug, info, warn};

#[cfg(feature = "mt")]
use rayon::prelude::*;

use crate::cohort::{AdmissionId, Encounter};
use crate::compare::{AggregateMethod, CategoryScores, EncounterComparator, EncounterSimilarity};
use crate::io::sink::SimilaritySink;

/// Unordered encounter pair keyed by its sorted admission ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CanonicalPair(AdmissionId, AdmissionId);

impl CanonicalPair {
    pub fn new(a: AdmissionId, b: AdmissionId) -> Self {
        if a <= b { Self(a, b) } else { Self(b, a) }
    }

    pub fn first(&self) -> AdmissionId {
        self.0
    }

    pub fn second(&self) -> AdmissionId {
        self.1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PairResult {
    pub encounter_a: AdmissionId,
    pub encounter_b: AdmissionId,
    pub similarity: EncounterSimilarity,
}

impl PairResult {
    pub fn is_self_pair(&self) -> bool {
        self.encounter_a == self.encounter_b
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PairStats {
    /// Ordered pairs emitted, self-pairs included.
    pub raw_entries: usize,
    /// Distinct canonical pairs actually computed.
    pub unique_pairs: usize,
    pub cache_hits: usize,
    /// Pairs whose comparison failed and were recorded as no evidence.
    pub failed_pairs: usize,
}

/// Full ordered result set of an all-pairs run.
#[derive(Debug, Clone, PartialEq)]
pub struct PairwiseRun {
    pub entries: Vec<PairResult>,
    pub stats: PairStats,
}

impl PairwiseRun {
    pub fn get(&self, a: AdmissionId, b: AdmissionId) -> Option<&PairResult> {
        self.entries
            .iter()
            .find(|r| r.encounter_a == a && r.encounter_b == b)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepStats {
    pub batches: usize,
    pub skipped_batches: usize,
    pub pairs_written: usize,
    pub failed_pairs: usize,
}

struct PairOutcome {
    similarity: EncounterSimilarity,
    failed: bool,
}

/// Drives the encounter comparator over a cohort.
#[derive(Debug, Clone, Copy)]
pub struct PairwiseEngine<'a> {
    comparator: EncounterComparator<'a>,
    threads: usize,
}

impl<'a> PairwiseEngine<'a> {
    /// `threads == 0` uses the rayon default.
    pub fn new(comparator: EncounterComparator<'a>, threads: usize) -> Self {
        Self {
            comparator,
            threads,
        }
    }

    pub fn comparator(&self) -> &EncounterComparator<'a> {
        &self.comparator
    }

    /// Every ordered pair (self-pairs included). Each canonical pair is
    /// computed once and its result reused for the mirrored entry.
    pub fn compare_all(&self, encounters: &[Encounter]) -> Result<PairwiseRun> {
        ensure_tfidf_ready(encounters)?;
        let n = encounters.len();

        let mut slots: HashMap<CanonicalPair, usize> = HashMap::new();
        let mut jobs: Vec<(usize, usize)> = Vec::new();
        let mut plan: Vec<(usize, usize, usize)> = Vec::with_capacity(n * n);
        for i in 0..n {
            for j in 0..n {
                let key = CanonicalPair::new(encounters[i].hadm_id, encounters[j].hadm_id);
                let slot = *slots.entry(key).or_insert_with(|| {
                    jobs.push((i, j));
                    jobs.len() - 1
                });
                plan.push((i, j, slot));
            }
        }

        let executor = Executor::new(self.threads)?;
        let outcomes = executor.map(&jobs, |&(i, j)| {
            self.compare_one(&encounters[i], &encounters[j])
        });

        let entries: Vec<PairResult> = plan
            .iter()
            .map(|&(i, j, slot)| PairResult {
                encounter_a: encounters[i].hadm_id,
                encounter_b: encounters[j].hadm_id,
                similarity: outcomes[slot].similarity,
            })
            .collect();

        let stats = PairStats {
            raw_entries: entries.len(),
            unique_pairs: jobs.len(),
            cache_hits: entries.len() - jobs.len(),
            failed_pairs: outcomes.iter().filter(|o| o.failed).count(),
        };
        info!(
            raw_entries = stats.raw_entries,
            unique_pairs = stats.unique_pairs,
            cache_hits = stats.cache_hits,
            failed_pairs = stats.failed_pairs,
            "pairs_computed"
        );
        Ok(PairwiseRun { entries, stats })
    }

    /// Upper-triangle sweep of unique non-self pairs in canonical order.
    ///
    /// Anchors (encounters sorted by admission id) are split into row-blocks of
    /// `batch_size`; batch `k` holds every pair whose smaller id is one of the
    /// block's anchors. Batches before `start_batch` are skipped so an
    /// interrupted sweep can resume.
    pub fn sweep_batched(
        &self,
        encounters: &[Encounter],
        batch_size: usize,
        start_batch: usize,
        sink: &mut dyn SimilaritySink,
    ) -> Result<SweepStats> {
        if batch_size == 0 {
            bail!("batch size must be at least 1");
        }
        ensure_tfidf_ready(encounters)?;

        let mut order: Vec<usize> = (0..encounters.len()).collect();
        order.sort_by_key(|&idx| encounters[idx].hadm_id);
        let n = order.len();
        let n_batches = n.div_ceil(batch_size);
        if start_batch > n_batches {
            bail!(
                "start batch {} is past the last batch ({} batches)",
                start_batch,
                n_batches
            );
        }

        let executor = Executor::new(self.threads)?;
        let mut stats = SweepStats::default();
        for batch in 0..n_batches {
            if batch < start_batch {
                stats.skipped_batches += 1;
                continue;
            }
            let row_start = batch * batch_size;
            let row_end = (row_start + batch_size).min(n);
            let mut jobs: Vec<(usize, usize)> = Vec::new();
            for p in row_start..row_end {
                for q in (p + 1)..n {
                    jobs.push((order[p], order[q]));
                }
            }

            let outcomes =
                executor.map(&jobs, |&(i, j)| self.compare_one(&encounters[i], &encounters[j]));
            let records: Vec<PairResult> = jobs
                .iter()
                .zip(outcomes.iter())
                .map(|(&(i, j), outcome)| PairResult {
                    encounter_a: encounters[i].hadm_id,
                    encounter_b: encounters[j].hadm_id,
                    similarity: outcome.similarity,
                })
                .collect();
            sink.write_batch(batch, &records)?;

            let failed = outcomes.iter().filter(|o| o.failed).count();
            stats.batches += 1;
            stats.pairs_written += records.len();
            stats.failed_pairs += failed;
            info!(batch, pairs = records.len(), failed, "batch_persisted");
        }
        Ok(stats)
    }

    fn compare_one(&self, a: &Encounter, b: &Encounter) -> PairOutcome {
        match self.comparator.compare(a, b) {
            Ok(similarity) => {
                debug!(encounter_a = a.hadm_id, encounter_b = b.hadm_id, "pair_compared");
                PairOutcome {
                    similarity,
                    failed: false,
                }
            }
            Err(err) => {
                warn!(
                    encounter_a = a.hadm_id,
                    encounter_b = b.hadm_id,
                    error = %err,
                    "pair_comparison_failed"
                );
                PairOutcome {
                    similarity: self.no_evidence(),
                    failed: true,
                }
            }
        }
    }

    fn no_evidence(&self) -> EncounterSimilarity {
        match self.comparator.aggregate_method() {
            AggregateMethod::None => EncounterSimilarity::Categories(CategoryScores::uniform(0.0)),
            _ => EncounterSimilarity::Aggregate(0.0),
        }
    }
}

/// Admission ids anchoring the batches before `batch` in [`PairwiseEngine::sweep_batched`].
pub fn anchors_before_batch(
    encounters: &[Encounter],
    batch_size: usize,
    batch: usize,
) -> HashSet<AdmissionId> {
    let mut ids: Vec<AdmissionId> = encounters.iter().map(|e| e.hadm_id).collect();
    ids.sort_unstable();
    let done = batch.saturating_mul(batch_size).min(ids.len());
    ids[..done].iter().copied().collect()
}

/// Every diagnosis must carry its TF-IDF weight before pairs are dispatched.
fn ensure_tfidf_ready(encounters: &[Encounter]) -> Result<()> {
    for encounter in encounters {
        if let Some(d) = encounter.diagnoses.iter().find(|d| d.tfidf.is_none()) {
            bail!(
                "tf-idf score missing for diagnosis '{}' of admission {} (cohort tf-idf pre-pass not run)",
                d.code,
                encounter.hadm_id
            );
        }
    }
    Ok(())
}

struct Executor {
    #[cfg(feature = "mt")]
    pool: rayon::ThreadPool,
}

impl Executor {
    fn new(threads: usize) -> Result<Self> {
        #[cfg(feature = "mt")]
        {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| anyhow::anyhow!("failed to build thread pool: {}", e))?;
            Ok(Self { pool })
        }

        #[cfg(not(feature = "mt"))]
        {
            let _ = threads;
            Ok(Self {})
        }
    }

    fn map<T, U, F>(&self, items: &[T], f: F) -> Vec<U>
    where
        T: Sync,
        U: Send,
        F: Fn(&T) -> U + Sync + Send,
    {
        #[cfg(feature = "mt")]
        {
            self.pool.install(|| items.par_iter().map(&f).collect())
        }

        #[cfg(not(feature = "mt"))]
        {
            items.iter().map(f).collect()
        }
    }
}
