//! Derived feature computation.
//!
//! Reads the raw artifact, appends `age_group` and `risk_category`, and
//! writes the enriched artifact. Rows are never dropped or coerced: any
//! value outside the binning or risk domain aborts the stage.

use crate::artifact;
use crate::generate::{STRESS_LEVEL_MAX, STRESS_LEVEL_MIN};
use mh_common::schema::{COL_AGE, COL_STRESS_LEVEL, ENRICHED_COLUMNS, RAW_COLUMNS};
use mh_common::{AgeGroup, EnrichedRecord, Error, RawRecord, Result, RiskCategory};
use mh_config::PipelineConfig;
use std::path::{Path, PathBuf};
use tracing::info;

/// Map an age onto its generational bin.
///
/// Bins are `(20,30]`, `(30,40]`, `(40,50]`, `(50,100]`. Returns `None`
/// for ages outside `(20, 100]`.
pub fn age_group(age: u32) -> Option<AgeGroup> {
    AgeGroup::ALL
        .iter()
        .zip(AgeGroup::EDGES.windows(2))
        .find(|(_, edge)| age > edge[0] && age <= edge[1])
        .map(|(group, _)| *group)
}

/// Classify a stress level; first matching rule wins.
///
/// Returns `None` for levels outside the 1-10 scale instead of guessing.
pub fn risk_category(stress_level: u8) -> Option<RiskCategory> {
    if !(STRESS_LEVEL_MIN..=STRESS_LEVEL_MAX).contains(&stress_level) {
        return None;
    }
    let category = if stress_level >= 8 {
        RiskCategory::High
    } else if stress_level >= 5 {
        RiskCategory::Moderate
    } else {
        RiskCategory::Low
    };
    Some(category)
}

/// Check that ids form the sequence `0..n` in file order.
pub fn check_id_sequence<I>(ids: I) -> Result<()>
where
    I: IntoIterator<Item = u64>,
{
    for (row, id) in ids.into_iter().enumerate() {
        let expected = row as u64;
        if id != expected {
            return Err(Error::IdSequence {
                row: expected,
                expected,
                found: id,
            });
        }
    }
    Ok(())
}

/// Compute both derived columns for a raw batch.
pub fn transform_records(raw: Vec<RawRecord>) -> Result<Vec<EnrichedRecord>> {
    check_id_sequence(raw.iter().map(|r| r.id))?;

    let age_groups = raw
        .iter()
        .enumerate()
        .map(|(row, r)| {
            age_group(r.age).ok_or_else(|| Error::OutOfDomain {
                column: COL_AGE.to_string(),
                value: r.age.to_string(),
                row: row as u64,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let risks = raw
        .iter()
        .enumerate()
        .map(|(row, r)| {
            risk_category(r.stress_level).ok_or_else(|| Error::OutOfDomain {
                column: COL_STRESS_LEVEL.to_string(),
                value: r.stress_level.to_string(),
                row: row as u64,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(raw
        .into_iter()
        .zip(age_groups)
        .zip(risks)
        .map(|((r, group), risk)| EnrichedRecord::from_raw(r, group, risk))
        .collect())
}

/// Enrich the raw artifact at `raw_path` and return the enriched path.
pub fn transform(config: &PipelineConfig, raw_path: &Path) -> Result<PathBuf> {
    let path = config.enriched_path();
    info!(input = %raw_path.display(), output = %path.display(), "transforming dataset");

    let result = artifact::read_csv::<RawRecord>(raw_path, &RAW_COLUMNS)
        .and_then(transform_records)
        .and_then(|records| {
            artifact::write_csv(&path, &ENRICHED_COLUMNS, &records).map(|_| records.len())
        });

    match result {
        Ok(rows) => {
            info!(rows, path = %path.display(), "enriched dataset written");
            Ok(path)
        }
        Err(e) => {
            artifact::discard(&path);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mh_common::{DestressMethod, Gender, Sector, StressSource};
    use proptest::prelude::*;

    fn raw(id: u64, age: u32, stress_level: u8) -> RawRecord {
        RawRecord {
            id,
            age,
            gender: Gender::Female,
            sector: Sector::Education,
            stress_level,
            stress_source: StressSource::Workload,
            destress_method: DestressMethod::Socializing,
            sleep_hours: 7.0,
        }
    }

    #[test]
    fn test_boundary_ages_fall_in_lower_bin() {
        assert_eq!(age_group(21), Some(AgeGroup::GenZ));
        assert_eq!(age_group(30), Some(AgeGroup::GenZ));
        assert_eq!(age_group(31), Some(AgeGroup::Millennials));
        assert_eq!(age_group(40), Some(AgeGroup::Millennials));
        assert_eq!(age_group(41), Some(AgeGroup::GenX));
        assert_eq!(age_group(50), Some(AgeGroup::GenX));
        assert_eq!(age_group(51), Some(AgeGroup::Boomers));
        assert_eq!(age_group(100), Some(AgeGroup::Boomers));
    }

    #[test]
    fn test_ages_outside_edges_have_no_bin() {
        assert_eq!(age_group(0), None);
        assert_eq!(age_group(20), None);
        assert_eq!(age_group(101), None);
    }

    #[test]
    fn test_risk_cascade_exact() {
        let expected = [
            (1, RiskCategory::Low),
            (2, RiskCategory::Low),
            (3, RiskCategory::Low),
            (4, RiskCategory::Low),
            (5, RiskCategory::Moderate),
            (6, RiskCategory::Moderate),
            (7, RiskCategory::Moderate),
            (8, RiskCategory::High),
            (9, RiskCategory::High),
            (10, RiskCategory::High),
        ];
        for (level, category) in expected {
            assert_eq!(risk_category(level), Some(category), "level {level}");
        }
    }

    #[test]
    fn test_risk_out_of_scale_fails() {
        assert_eq!(risk_category(0), None);
        assert_eq!(risk_category(11), None);
    }

    #[test]
    fn test_transform_appends_features() {
        let enriched = transform_records(vec![raw(0, 30, 8), raw(1, 64, 4)]).unwrap();
        assert_eq!(enriched.len(), 2);
        assert_eq!(enriched[0].age_group, AgeGroup::GenZ);
        assert_eq!(enriched[0].risk_category, RiskCategory::High);
        assert_eq!(enriched[1].age_group, AgeGroup::Boomers);
        assert_eq!(enriched[1].risk_category, RiskCategory::Low);
    }

    #[test]
    fn test_out_of_domain_stress_names_row() {
        let err = transform_records(vec![raw(0, 30, 5), raw(1, 30, 12)]).unwrap_err();
        match err {
            Error::OutOfDomain { column, value, row } => {
                assert_eq!(column, COL_STRESS_LEVEL);
                assert_eq!(value, "12");
                assert_eq!(row, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_out_of_domain_age() {
        let err = transform_records(vec![raw(0, 120, 5)]).unwrap_err();
        assert!(matches!(err, Error::OutOfDomain { ref column, .. } if column == COL_AGE));
    }

    #[test]
    fn test_id_gap_rejected() {
        let err = transform_records(vec![raw(0, 30, 5), raw(2, 30, 5)]).unwrap_err();
        assert!(matches!(
            err,
            Error::IdSequence {
                expected: 1,
                found: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_empty_batch() {
        assert!(transform_records(Vec::new()).unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn prop_every_generated_age_has_one_bin(age in 22u32..65) {
            let matches = AgeGroup::EDGES
                .windows(2)
                .filter(|edge| age > edge[0] && age <= edge[1])
                .count();
            prop_assert_eq!(matches, 1);
            prop_assert!(age_group(age).is_some());
        }

        #[test]
        fn prop_bins_are_monotonic(a in 21u32..=100, b in 21u32..=100) {
            prop_assume!(a <= b);
            prop_assert!(age_group(a).unwrap() <= age_group(b).unwrap());
        }

        #[test]
        fn prop_risk_is_monotonic(a in 1u8..=10, b in 1u8..=10) {
            prop_assume!(a <= b);
            // High < Moderate < Low in declaration order, so risk decreases
            // as the declared index grows.
            prop_assert!(risk_category(a).unwrap() >= risk_category(b).unwrap());
        }
    }
}
