//! Column layout and schema versioning for pipeline artifacts.

/// Current schema version for all artifacts.
///
/// Follows semver: MAJOR.MINOR.PATCH
/// - MAJOR: Breaking changes (column removals, type changes, closed-set changes)
/// - MINOR: Additive changes (new derived columns)
/// - PATCH: Bug fixes, documentation
pub const SCHEMA_VERSION: &str = "1.0.0";

pub const COL_ID: &str = "id";
pub const COL_AGE: &str = "age";
pub const COL_GENDER: &str = "gender";
pub const COL_SECTOR: &str = "sector";
pub const COL_STRESS_LEVEL: &str = "stress_level";
pub const COL_STRESS_SOURCE: &str = "stress_source";
pub const COL_DESTRESS_METHOD: &str = "destress_method";
pub const COL_SLEEP_HOURS: &str = "sleep_hours";
pub const COL_AGE_GROUP: &str = "age_group";
pub const COL_RISK_CATEGORY: &str = "risk_category";

/// Columns of the raw artifact, in file order.
pub const RAW_COLUMNS: [&str; 8] = [
    COL_ID,
    COL_AGE,
    COL_GENDER,
    COL_SECTOR,
    COL_STRESS_LEVEL,
    COL_STRESS_SOURCE,
    COL_DESTRESS_METHOD,
    COL_SLEEP_HOURS,
];

/// Columns of the enriched artifact, in file order.
pub const ENRICHED_COLUMNS: [&str; 10] = [
    COL_ID,
    COL_AGE,
    COL_GENDER,
    COL_SECTOR,
    COL_STRESS_LEVEL,
    COL_STRESS_SOURCE,
    COL_DESTRESS_METHOD,
    COL_SLEEP_HOURS,
    COL_AGE_GROUP,
    COL_RISK_CATEGORY,
];

/// Find the first required column absent from `headers`.
pub fn first_missing_column<'a, I, S>(required: &[&'a str], headers: I) -> Option<&'a str>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let present: Vec<String> = headers
        .into_iter()
        .map(|h| h.as_ref().trim().to_string())
        .collect();
    required
        .iter()
        .copied()
        .find(|col| !present.iter().any(|h| h == col))
}

/// Check if a schema version is compatible with current.
pub fn is_compatible(version: &str) -> bool {
    let major = |v: &str| {
        v.split('.')
            .next()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(0)
    };
    major(SCHEMA_VERSION) == major(version)
}
