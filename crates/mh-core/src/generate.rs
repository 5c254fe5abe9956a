//! Synthetic raw dataset generation.
//!
//! Columns are sampled one at a time, in a fixed order, from a single seeded
//! RNG. Stress levels start from a normal base value; demographic biases are
//! then applied to the whole column, one predicate mask at a time, before the
//! final clamp. Several biases can hit the same row and they simply add up.

use crate::artifact;
use mh_common::schema::RAW_COLUMNS;
use mh_common::{DestressMethod, Error, Gender, RawRecord, Result, Sector, StressSource};
use mh_config::{PipelineConfig, MAX_RECORD_COUNT};
use rand::distr::weighted::WeightedIndex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;
use std::ops::Range;
use std::path::PathBuf;
use tracing::{debug, info};

/// Ages are drawn uniformly from this half-open range.
pub const AGE_RANGE: Range<u32> = 22..65;

/// Sampling weights aligned with `Gender::ALL`.
pub const GENDER_WEIGHTS: [f64; 3] = [0.48, 0.48, 0.04];

pub const BASE_STRESS_MEAN: f64 = 5.5;
pub const BASE_STRESS_STD_DEV: f64 = 1.5;

pub const SLEEP_HOURS_MEAN: f64 = 6.5;
pub const SLEEP_HOURS_STD_DEV: f64 = 1.5;

/// Inclusive bounds of the integer stress scale.
pub const STRESS_LEVEL_MIN: u8 = 1;
pub const STRESS_LEVEL_MAX: u8 = 10;

/// Row predicate selecting which records receive a stress bias.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BiasPredicate {
    AgeBelow(u32),
    SectorIs(Sector),
}

impl BiasPredicate {
    /// Evaluate the predicate over the whole batch.
    fn mask(&self, batch: &RawColumns) -> Vec<bool> {
        match *self {
            BiasPredicate::AgeBelow(limit) => batch.ages.iter().map(|&a| a < limit).collect(),
            BiasPredicate::SectorIs(want) => batch.sectors.iter().map(|&s| s == want).collect(),
        }
    }
}

/// Additive adjustment applied to base stress where the predicate holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StressBias {
    pub predicate: BiasPredicate,
    pub delta: f64,
}

/// Younger workers and the health sector report more stress.
pub const DEMOGRAPHIC_BIASES: [StressBias; 2] = [
    StressBias {
        predicate: BiasPredicate::AgeBelow(30),
        delta: 0.8,
    },
    StressBias {
        predicate: BiasPredicate::SectorIs(Sector::Health),
        delta: 1.0,
    },
];

/// Column-oriented batch of sampled values, before ids are attached.
#[derive(Debug, Clone, Default)]
pub struct RawColumns {
    pub ages: Vec<u32>,
    pub genders: Vec<Gender>,
    pub sectors: Vec<Sector>,
    pub stress_sources: Vec<StressSource>,
    pub destress_methods: Vec<DestressMethod>,
    pub stress_levels: Vec<u8>,
    pub sleep_hours: Vec<f64>,
}

impl RawColumns {
    /// Zip columns into records with ids `0..len`.
    ///
    /// Every column must hold the same number of values.
    fn into_records(self) -> Vec<RawRecord> {
        let n = self.ages.len();
        (0..n)
            .map(|i| RawRecord {
                id: i as u64,
                age: self.ages[i],
                gender: self.genders[i],
                sector: self.sectors[i],
                stress_level: self.stress_levels[i],
                stress_source: self.stress_sources[i],
                destress_method: self.destress_methods[i],
                sleep_hours: self.sleep_hours[i],
            })
            .collect()
    }
}

/// Add every bias to `stress` wherever its predicate holds.
pub fn apply_biases(stress: &mut [f64], batch: &RawColumns, biases: &[StressBias]) {
    for bias in biases {
        let mask = bias.predicate.mask(batch);
        let mut hits = 0usize;
        for (value, hit) in stress.iter_mut().zip(mask) {
            if hit {
                *value += bias.delta;
                hits += 1;
            }
        }
        debug!(predicate = ?bias.predicate, delta = bias.delta, hits, "stress bias applied");
    }
}

/// Clamp to the stress scale and truncate to integer levels.
pub fn clamp_to_levels(stress: &[f64]) -> Vec<u8> {
    let min = f64::from(STRESS_LEVEL_MIN);
    let max = f64::from(STRESS_LEVEL_MAX);
    stress.iter().map(|&s| s.clamp(min, max) as u8).collect()
}

fn sample_uniform<T: Copy>(rng: &mut StdRng, set: &[T], n: usize) -> Vec<T> {
    (0..n)
        .map(|_| set[rng.random_range(0..set.len())])
        .collect()
}

/// Sample `record_count` raw records from `seed`.
///
/// Identical inputs always produce identical records.
pub fn generate_records(record_count: usize, seed: u64) -> Result<Vec<RawRecord>> {
    if record_count > MAX_RECORD_COUNT {
        return Err(Error::InvalidRecordCount {
            requested: record_count,
            max: MAX_RECORD_COUNT,
        });
    }

    let gender_dist =
        WeightedIndex::new(GENDER_WEIGHTS).map_err(|e| Error::Sampling(e.to_string()))?;
    let stress_dist = Normal::new(BASE_STRESS_MEAN, BASE_STRESS_STD_DEV)
        .map_err(|e| Error::Sampling(e.to_string()))?;
    let sleep_dist = Normal::new(SLEEP_HOURS_MEAN, SLEEP_HOURS_STD_DEV)
        .map_err(|e| Error::Sampling(e.to_string()))?;

    let mut rng = StdRng::seed_from_u64(seed);
    let n = record_count;

    let mut batch = RawColumns {
        ages: (0..n).map(|_| rng.random_range(AGE_RANGE)).collect(),
        genders: (0..n)
            .map(|_| Gender::ALL[rng.sample(&gender_dist)])
            .collect(),
        sectors: sample_uniform(&mut rng, Sector::ALL, n),
        stress_sources: sample_uniform(&mut rng, StressSource::ALL, n),
        destress_methods: sample_uniform(&mut rng, DestressMethod::ALL, n),
        ..Default::default()
    };

    let mut stress: Vec<f64> = (0..n).map(|_| rng.sample(stress_dist)).collect();
    apply_biases(&mut stress, &batch, &DEMOGRAPHIC_BIASES);
    batch.stress_levels = clamp_to_levels(&stress);

    // Not clamped: negative or >24 values are possible.
    batch.sleep_hours = (0..n).map(|_| rng.sample(sleep_dist)).collect();

    Ok(batch.into_records())
}

/// Generate the raw artifact and return its path.
///
/// The config is validated first, so a stage invoked directly by an external
/// orchestrator rejects the same values the CLI does.
pub fn generate(config: &PipelineConfig) -> Result<PathBuf> {
    let path = config.raw_path();
    info!(
        records = config.record_count,
        seed = config.seed,
        path = %path.display(),
        "generating raw dataset"
    );

    let result = config
        .validate()
        .into_result()
        .map_err(Error::from)
        .and_then(|_| generate_records(config.record_count, config.seed))
        .and_then(|records| {
            artifact::write_csv(&path, &RAW_COLUMNS, &records)?;
            Ok(records.len())
        });

    match result {
        Ok(rows) => {
            info!(rows, path = %path.display(), "raw dataset written");
            Ok(path)
        }
        Err(e) => {
            artifact::discard(&path);
            Err(e)
        }
    }
}
