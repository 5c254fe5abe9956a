//! Record types and closed categorical sets shared by all stages.
//!
//! Every categorical column is backed by an enum whose serialized label is
//! stable across runs. Adding, removing, or relabeling a member is a
//! breaking schema change.

use crate::schema::{
    COL_AGE_GROUP, COL_DESTRESS_METHOD, COL_GENDER, COL_RISK_CATEGORY, COL_SECTOR,
    COL_STRESS_SOURCE,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when a label does not belong to a closed set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLabel {
    pub set: &'static str,
    pub label: String,
}

impl fmt::Display for UnknownLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a member of {}", self.label, self.set)
    }
}

impl std::error::Error for UnknownLabel {}

macro_rules! closed_set {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $label:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            /// All members in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Stable serialized label.
            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(self.label())
            }
        }

        impl FromStr for $name {
            type Err = UnknownLabel;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok($name::$variant),)+
                    _ => Err(UnknownLabel {
                        set: stringify!($name),
                        label: s.to_string(),
                    }),
                }
            }
        }
    };
}

closed_set! {
    /// Self-reported gender. Sampled with non-uniform weights.
    Gender {
        Male => "Male",
        Female => "Female",
        NonBinary => "Non-binary",
    }
}

closed_set! {
    /// Industry sector of the employee.
    Sector {
        Technology => "Technology",
        Health => "Health",
        Finance => "Finance",
        Education => "Education",
        Construction => "Construction",
        Retail => "Retail",
    }
}

closed_set! {
    /// Main reported source of stress.
    StressSource {
        Workload => "Workload",
        Finances => "Finances",
        Family => "Family",
        Health => "Health",
    }
}

closed_set! {
    /// Preferred way to de-stress.
    DestressMethod {
        Sport => "Sport",
        Nature => "Nature",
        VideoGames => "Video games",
        Socializing => "Socializing",
    }
}

closed_set! {
    /// Ordered generational age bins.
    ///
    /// Derived from `age` with edges `[20, 30, 40, 50, 100]`; each bin is
    /// lower-exclusive and upper-inclusive, so an age of exactly 30 falls
    /// into `GenZ`. Declaration order is the chart order.
    AgeGroup {
        GenZ => "Gen Z (20-29)",
        Millennials => "Millennials (30-39)",
        GenX => "Gen X (40-49)",
        Boomers => "Boomers (50+)",
    }
}

closed_set! {
    /// Risk tier derived from `stress_level` alone.
    RiskCategory {
        High => "High",
        Moderate => "Moderate",
        Low => "Low",
    }
}

impl AgeGroup {
    /// Bin edges; bin `i` covers `(EDGES[i], EDGES[i + 1]]`.
    pub const EDGES: [u32; 5] = [20, 30, 40, 50, 100];
}

/// Check `value` against the closed set backing `column`.
///
/// Returns `None` when `column` is not categorical.
pub fn check_label(column: &str, value: &str) -> Option<Result<(), UnknownLabel>> {
    fn member<T: FromStr<Err = UnknownLabel>>(value: &str) -> Result<(), UnknownLabel> {
        value.parse::<T>().map(|_| ())
    }

    let check: fn(&str) -> Result<(), UnknownLabel> = match column {
        COL_GENDER => member::<Gender>,
        COL_SECTOR => member::<Sector>,
        COL_STRESS_SOURCE => member::<StressSource>,
        COL_DESTRESS_METHOD => member::<DestressMethod>,
        COL_AGE_GROUP => member::<AgeGroup>,
        COL_RISK_CATEGORY => member::<RiskCategory>,
        _ => return None,
    };
    Some(check(value))
}

/// One simulated employee as produced by the generator.
///
/// Field order matches [`crate::schema::RAW_COLUMNS`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: u64,
    pub age: u32,
    pub gender: Gender,
    pub sector: Sector,
    pub stress_level: u8,
    pub stress_source: StressSource,
    pub destress_method: DestressMethod,
    pub sleep_hours: f64,
}

/// Raw record plus the two derived features.
///
/// Field order matches [`crate::schema::ENRICHED_COLUMNS`]. The raw fields
/// are spelled out rather than flattened so the CSV codec can map columns by
/// header name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub id: u64,
    pub age: u32,
    pub gender: Gender,
    pub sector: Sector,
    pub stress_level: u8,
    pub stress_source: StressSource,
    pub destress_method: DestressMethod,
    pub sleep_hours: f64,
    pub age_group: AgeGroup,
    pub risk_category: RiskCategory,
}

impl EnrichedRecord {
    pub fn from_raw(raw: RawRecord, age_group: AgeGroup, risk_category: RiskCategory) -> Self {
        EnrichedRecord {
            id: raw.id,
            age: raw.age,
            gender: raw.gender,
            sector: raw.sector,
            stress_level: raw.stress_level,
            stress_source: raw.stress_source,
            destress_method: raw.destress_method,
            sleep_hours: raw.sleep_hours,
            age_group,
            risk_category,
        }
    }
}
