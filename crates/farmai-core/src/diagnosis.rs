// Weighted diagnosis rubric and score aggregation.
//
// The rubric is a static table of four categories, each holding weighted
// items that are assessed on a five-level scale. An item's contribution is
// `weight * level / 5`; unassessed items contribute nothing. The weights
// sum to 101, which is therefore the maximum score.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::fields::{FieldSpec, FieldValues};

// ---------------------------------------------------------------------------
// Level
// ---------------------------------------------------------------------------

/// A selected assessment level, 1 (I) through 5 (V).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Level(u8);

impl Level {
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> Option<Self> {
        (1..=Self::MAX).contains(&value).then_some(Self(value))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Roman numeral label used on the sheet.
    pub fn roman(self) -> &'static str {
        ["I", "II", "III", "IV", "V"][usize::from(self.0 - 1)]
    }
}

impl TryFrom<u8> for Level {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Level::new(value).ok_or_else(|| format!("level must be 1..=5, got {value}"))
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> u8 {
        level.0
    }
}

// ---------------------------------------------------------------------------
// Rubric
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RubricItem {
    pub key: &'static str,
    pub label: &'static str,
    pub weight: f64,
    /// What each level I..V looks like on a farm.
    pub levels: [&'static str; 5],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RubricCategory {
    pub key: &'static str,
    pub label: &'static str,
    pub items: &'static [RubricItem],
}

impl RubricCategory {
    pub fn max_score(&self) -> f64 {
        self.items.iter().map(|i| i.weight).sum()
    }
}

const fn item(
    key: &'static str,
    label: &'static str,
    weight: f64,
    levels: [&'static str; 5],
) -> RubricItem {
    RubricItem {
        key,
        label,
        weight,
        levels,
    }
}

pub const RUBRIC: &[RubricCategory] = &[
    RubricCategory {
        key: "facilities",
        label: "Facilities & automation",
        items: &[
            item("house_height", "House side height", 5.0, [
                "Under 1.2 m",
                "1.2 to 1.4 m",
                "1.4 to 1.6 m",
                "1.6 to 1.8 m",
                "1.8 m or more",
            ]),
            item("insulation_heating", "Insulation & heating", 5.0, [
                "Triple-layer house",
                "Double-layer house with water curtain",
                "Triple-layer house with water curtain",
                "Triple layer, water curtain and auxiliary heating",
                "Triple layer, multi-layer curtain, water curtain and auxiliary heating",
            ]),
            item("nutrient_supply", "Nutrient supply system", 5.0, [
                "Timer dosing with drain monitoring",
                "Timer dosing with supply monitoring",
                "Flow-based dosing with drain monitoring",
                "Flow-based dosing with supply monitoring",
                "Flow-based dosing with supply and drain monitoring",
            ]),
            item("climate_automation", "Environment automation", 5.0, [
                "Manual operation",
                "Manual roll-up winders",
                "Portable electric winders",
                "Semi-automatic with sensors and timers",
                "Fully automatic",
            ]),
            item("labor_saving", "Labour saving", 5.0, [
                "No transport equipment, manual sprayer",
                "Carrying trays, manual sprayer",
                "Push carts, automatic sprayer",
                "Hanging rail carts, automatic sprayer",
                "Hanging rail carts, unmanned spraying",
            ]),
        ],
    },
    RubricCategory {
        key: "environment",
        label: "Environment management",
        items: &[
            item("light", "Light management", 4.0, [
                "Outer film renewed every 3 years, inner every 2",
                "Outer film every 3 years, inner yearly",
                "PO outer film, inner yearly, shading paint",
                "PO outer film, inner yearly, shading screen",
                "PO outer film, inner yearly, shading screen, supplemental lighting",
            ]),
            item("heating_start", "Heating start timing", 4.0, [
                "Same time as previous years",
                "Follows neighbouring farms",
                "Based on own records",
                "When forecast lows fall below 5 °C",
                "When forecast lows fall below 10 °C",
            ]),
            item("temp_humidity", "House temperature & humidity", 4.0, [
                "Not managed",
                "Suitable range for the variety unknown",
                "Managed to suit the variety",
                "Managed to suit conditions",
                "Managed for both variety and conditions",
            ]),
            item("co2", "CO2 use", 4.0, [
                "Not used",
                "Rice straw",
                "Combustion CO2 on a timer",
                "Liquefied CO2 on a timer",
                "Liquefied CO2 with timer and concentration control",
            ]),
            item("bed_disinfection", "Bed (substrate) disinfection", 4.0, [
                "None",
                "Covered solarisation for 10+ days",
                "Chemical treatment plus 10+ days solarisation",
                "Fumigant plus 5+ days solarisation",
                "Fumigant plus 10+ days solarisation",
            ]),
            item("irrigation", "Irrigation", 4.0, [
                "Fixed amount on a fixed schedule",
                "Fixed amount per growth stage",
                "Adjusted for growth stage and crop condition",
                "Adjusted for stage, condition and weather",
                "Adjusted for stage, condition, weather and sensor readings",
            ]),
            item("nutrient_solution", "Nutrient solution management", 4.0, [
                "Not managed",
                "By plant size",
                "By growth stage",
                "By growth stage and time of year",
                "By growth stage, time of year and season",
            ]),
            item("substrate", "Substrate", 3.0, [
                "Properties unknown",
                "Properties known",
                "Properties and suitable solution strength known",
                "Properties, strength and dosing method matched",
                "Properties, strength, dosing and equipment matched",
            ]),
        ],
    },
    RubricCategory {
        key: "crop",
        label: "Crop management",
        items: &[
            item("planting_time", "Planting time", 5.0, [
                "Same date as previous years",
                "Seedling condition judged by feel",
                "Seedling condition and age",
                "Seedling condition, age and weather",
                "Planted after confirming flower bud initiation",
            ]),
            item("establishment", "Establishment", 5.0, [
                "Sprinkler irrigation",
                "Sprinkler plus shading",
                "Drip irrigation plus shading",
                "Drip, shading and preventive spraying",
                "All of the above, shading removed after establishment",
            ]),
            item("pollination", "Pollination", 5.0, [
                "Too few honeybees",
                "Enough honeybees",
                "Enough honeybees, handling precautions known",
                "As above, bumblebees in poor weather",
                "As above, with temperature and humidity control",
            ]),
            item("pest_control", "Pest control", 5.0, [
                "Pesticides after outbreaks",
                "Preventive spraying, thresholds unknown",
                "Preventive spraying within thresholds",
                "Preventive before flowering, environmental control after",
                "Natural enemies and improved growing environment",
            ]),
            item("fruit_thinning", "Fruit & flower thinning", 5.0, [
                "Left unmanaged",
                "Mainly fruit thinning",
                "Mainly flower thinning",
                "Fruit thinning plus truss removal after harvest",
                "Flower thinning plus truss removal after harvest",
            ]),
        ],
    },
    RubricCategory {
        key: "business",
        label: "Business management",
        items: &[
            item("grading", "Grading", 4.0, [
                "Ungraded, personal standard",
                "Producer group standard, graded individually",
                "Regional standard, graded individually",
                "Regional standard, graded jointly",
                "Regional standard, graded jointly under a brand",
            ]),
            item("quality_certification", "Quality certification", 4.0, [
                "Conventional growing",
                "GAP or transitioning to pesticide-free",
                "Organic practices",
                "Certified organic",
                "Certified organic with export-grade traceability",
            ]),
            item("cooperative", "Cooperative management", 3.0, [
                "Nothing shared",
                "One of purchasing, sales, labour or facilities shared",
                "Two of them shared",
                "Three of them shared",
                "All shared",
            ]),
            item("records", "Records & analysis", 3.0, [
                "No records",
                "One record type kept",
                "Two record types kept",
                "Three record types kept",
                "Four or more record types kept",
            ]),
            item("finance", "Financial management", 3.0, [
                "Not considered",
                "Rough plan",
                "Yearly plan based on income",
                "Long-term plan run year by year",
                "Long-term plan with monthly cash flow",
            ]),
            item("information", "Use of farming information", 3.0, [
                "No interest",
                "TV and newspapers",
                "Farming trade press",
                "Trade press and agency information",
                "Broad information gathering online",
            ]),
        ],
    },
];

/// Look up an item anywhere in `rubric`.
pub fn find_item<'a>(rubric: &'a [RubricCategory], key: &str) -> Option<&'a RubricItem> {
    rubric.iter().flat_map(|c| c.items).find(|i| i.key == key)
}

/// Sum of all item weights.
pub fn max_score(rubric: &[RubricCategory]) -> f64 {
    rubric.iter().map(RubricCategory::max_score).sum()
}

/// Σ weight × level / 5 over every item in `rubric`. Items with no level
/// contribute 0; keys not in the rubric are ignored.
pub fn total_score(rubric: &[RubricCategory], levels: &BTreeMap<String, Level>) -> f64 {
    rubric.iter().map(|c| category_score(c, levels)).sum()
}

fn category_score(category: &RubricCategory, levels: &BTreeMap<String, Level>) -> f64 {
    category
        .items
        .iter()
        .filter_map(|item| {
            levels
                .get(item.key)
                .map(|level| item.weight * f64::from(level.get()) / f64::from(Level::MAX))
        })
        .sum()
}

// ---------------------------------------------------------------------------
// Score breakdown
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub key: String,
    pub label: String,
    pub score: f64,
    pub max: f64,
    /// Items with a level selected.
    pub assessed: usize,
    pub items: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub categories: Vec<CategoryScore>,
    pub total: f64,
    pub max: f64,
}

impl ScoreBreakdown {
    pub fn compute(rubric: &[RubricCategory], levels: &BTreeMap<String, Level>) -> Self {
        let categories: Vec<CategoryScore> = rubric
            .iter()
            .map(|c| CategoryScore {
                key: c.key.to_string(),
                label: c.label.to_string(),
                score: category_score(c, levels),
                max: c.max_score(),
                assessed: c.items.iter().filter(|i| levels.contains_key(i.key)).count(),
                items: c.items.len(),
            })
            .collect();
        let total = categories.iter().map(|c| c.score).sum();
        Self {
            categories,
            total,
            max: max_score(rubric),
        }
    }

    /// `total / max`, or 0 for an empty rubric.
    pub fn fraction(&self) -> f64 {
        if self.max > 0.0 {
            self.total / self.max
        } else {
            0.0
        }
    }

    pub fn is_assessed(&self) -> bool {
        self.categories.iter().any(|c| c.assessed > 0)
    }

    pub fn category(&self, key: &str) -> Option<&CategoryScore> {
        self.categories.iter().find(|c| c.key == key)
    }

    /// Multi-line summary for prompts and reports.
    pub fn to_text(&self) -> String {
        if !self.is_assessed() {
            return "No diagnosis recorded.".to_string();
        }
        let mut out = format!("Total: {:.1} / {:.0}\n", self.total, self.max);
        for c in &self.categories {
            out.push_str(&format!(
                "- {}: {:.1} / {:.0} ({} of {} items assessed)\n",
                c.label, c.score, c.max, c.assessed, c.items
            ));
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Unscored sheet sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceIndicator {
    pub key: &'static str,
    pub label: &'static str,
    pub unit: &'static str,
    pub bands: [&'static str; 5],
}

pub const PERFORMANCE_INDICATORS: &[PerformanceIndicator] = &[
    PerformanceIndicator {
        key: "yield",
        label: "Yield per 10a",
        unit: "kg",
        bands: [
            "Under 2,000 kg",
            "2,000 to 3,000 kg",
            "3,000 to 4,000 kg",
            "4,000 to 5,000 kg",
            "5,000 kg or more",
        ],
    },
    PerformanceIndicator {
        key: "price",
        label: "Received price",
        unit: "KRW/kg",
        bands: [
            "Under 60% of market price",
            "60 to 70% of market price",
            "70 to 80% of market price",
            "80 to 90% of market price",
            "90% of market price or more",
        ],
    },
    PerformanceIndicator {
        key: "scale",
        label: "Business scale",
        unit: "m²",
        bands: [
            "Under 1,000 m²",
            "1,000 to 3,000 m²",
            "3,000 to 5,000 m²",
            "5,000 to 10,000 m²",
            "10,000 m² or more",
        ],
    },
];

const PERFORMANCE_FIELDS: &[FieldSpec] = &[
    FieldSpec::number("yield", "Yield per 10a", Some("kg")),
    FieldSpec::number("price", "Received price", Some("KRW/kg")),
    FieldSpec::number("scale", "Business scale", Some("m²")),
];

pub const GENERAL_INFO_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("survey_date", "Survey date"),
    FieldSpec::number("round", "Round", None),
    FieldSpec::number("own_area", "Owned area", Some("m²")),
    FieldSpec::number("rented_area", "Rented area", Some("m²")),
    FieldSpec::number("fog_systems", "Fog systems", None),
    FieldSpec::number("sorters", "Sorters", None),
    FieldSpec::number("sprayers", "Sprayers", None),
    FieldSpec::number("tractors", "Tractors", None),
    FieldSpec::number("cultivators", "Cultivators", None),
    FieldSpec::number("cold_storage", "Cold storage", Some("m²")),
    FieldSpec::number("freezer", "Freezer", None),
    FieldSpec::number("annual_production", "Annual production", Some("kg")),
    FieldSpec::number("income_main", "Income from main crop", Some("KRW")),
    FieldSpec::number("income_other", "Other income", Some("KRW")),
];

// ---------------------------------------------------------------------------
// DiagnosisSheet
// ---------------------------------------------------------------------------

/// Everything entered on the diagnosis screen for one farm.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosisSheet {
    pub general: FieldValues,
    pub performance: FieldValues,
    pub performance_levels: BTreeMap<String, Level>,
    pub levels: BTreeMap<String, Level>,
}

impl DiagnosisSheet {
    /// Select a level for a rubric item.
    pub fn set_level(&mut self, key: &str, level: Level) -> Result<(), ValidationError> {
        if find_item(RUBRIC, key).is_none() {
            return Err(ValidationError::new(
                format!("diagnosis.{key}"),
                "unknown rubric item",
            ));
        }
        self.levels.insert(key.to_string(), level);
        Ok(())
    }

    pub fn clear_level(&mut self, key: &str) {
        self.levels.remove(key);
    }

    pub fn level(&self, key: &str) -> Option<Level> {
        self.levels.get(key).copied()
    }

    /// Select a band for a performance indicator.
    pub fn set_performance_level(
        &mut self,
        key: &str,
        level: Level,
    ) -> Result<(), ValidationError> {
        if !PERFORMANCE_INDICATORS.iter().any(|p| p.key == key) {
            return Err(ValidationError::new(
                format!("performance.{key}"),
                "unknown indicator",
            ));
        }
        self.performance_levels.insert(key.to_string(), level);
        Ok(())
    }

    pub fn set_general<I, K, V>(&mut self, inputs: I) -> Result<(), ValidationError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.general = FieldValues::validated("general", GENERAL_INFO_FIELDS, inputs)?;
        Ok(())
    }

    pub fn set_performance<I, K, V>(&mut self, inputs: I) -> Result<(), ValidationError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.performance = FieldValues::validated("performance", PERFORMANCE_FIELDS, inputs)?;
        Ok(())
    }

    pub fn score(&self) -> ScoreBreakdown {
        ScoreBreakdown::compute(RUBRIC, &self.levels)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn lv(n: u8) -> Level {
        Level::new(n).unwrap()
    }

    fn levels(pairs: &[(&str, u8)]) -> BTreeMap<String, Level> {
        pairs.iter().map(|(k, v)| (k.to_string(), lv(*v))).collect()
    }

    #[test]
    fn rubric_shape() {
        let items: usize = RUBRIC.iter().map(|c| c.items.len()).sum();
        assert_eq!(RUBRIC.len(), 4);
        assert_eq!(items, 24);
        assert_eq!(max_score(RUBRIC), 101.0);
    }

    #[test]
    fn rubric_keys_are_unique() {
        let mut keys: Vec<&str> = RUBRIC.iter().flat_map(|c| c.items).map(|i| i.key).collect();
        let n = keys.len();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), n);
    }

    #[test]
    fn total_is_zero_when_nothing_assessed() {
        assert_eq!(total_score(RUBRIC, &BTreeMap::new()), 0.0);
    }

    #[test]
    fn weight_five_at_level_three_is_three() {
        let total = total_score(RUBRIC, &levels(&[("house_height", 3)]));
        assert!((total - 3.0).abs() < 1e-9);
    }

    #[test]
    fn each_level_step_adds_a_fifth_of_the_weight() {
        for item in RUBRIC.iter().flat_map(|c| c.items) {
            for l in 1..5u8 {
                let lower = total_score(RUBRIC, &levels(&[(item.key, l)]));
                let higher = total_score(RUBRIC, &levels(&[(item.key, l + 1)]));
                assert!(
                    (higher - lower - item.weight / 5.0).abs() < 1e-9,
                    "{} at level {l}",
                    item.key
                );
            }
        }
    }

    #[test]
    fn all_top_levels_reach_max() {
        let all: BTreeMap<String, Level> = RUBRIC
            .iter()
            .flat_map(|c| c.items)
            .map(|i| (i.key.to_string(), lv(5)))
            .collect();
        let breakdown = ScoreBreakdown::compute(RUBRIC, &all);
        assert!((breakdown.total - 101.0).abs() < 1e-9);
        assert!((breakdown.fraction() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn breakdown_subtotals_by_category() {
        let breakdown = ScoreBreakdown::compute(
            RUBRIC,
            &levels(&[("substrate", 5), ("grading", 1), ("records", 2)]),
        );
        let env = breakdown.category("environment").unwrap();
        assert!((env.score - 3.0).abs() < 1e-9);
        assert_eq!(env.max, 31.0);
        assert_eq!(env.assessed, 1);

        let business = breakdown.category("business").unwrap();
        assert!((business.score - (0.8 + 1.2)).abs() < 1e-9);
        assert!((breakdown.total - 5.0).abs() < 1e-9);
    }

    #[test]
    fn level_rejects_out_of_range() {
        assert!(Level::new(0).is_none());
        assert!(Level::new(6).is_none());
        assert_eq!(lv(4).roman(), "IV");
        assert!(serde_json::from_str::<Level>("7").is_err());
        assert_eq!(serde_json::from_str::<Level>("2").unwrap(), lv(2));
    }

    #[test]
    fn sheet_rejects_unknown_item() {
        let mut sheet = DiagnosisSheet::default();
        let err = sheet.set_level("greenhouse_color", lv(3)).unwrap_err();
        assert_eq!(err.field, "diagnosis.greenhouse_color");

        sheet.set_level("co2", lv(3)).unwrap();
        assert_eq!(sheet.level("co2"), Some(lv(3)));
        sheet.clear_level("co2");
        assert_eq!(sheet.score().total, 0.0);
    }

    #[test]
    fn sheet_performance_and_general_are_validated() {
        let mut sheet = DiagnosisSheet::default();
        sheet.set_performance([("yield", "3500")]).unwrap();
        sheet.set_performance_level("yield", lv(3)).unwrap();
        assert!(sheet.set_performance_level("profit", lv(3)).is_err());
        assert!(sheet.set_general([("tractors", "two")]).is_err());
        sheet.set_general([("tractors", "2")]).unwrap();
        assert_eq!(sheet.general.number("tractors"), Some(2.0));
    }

    #[test]
    fn sheet_json_round_trip_keeps_levels() {
        let mut sheet = DiagnosisSheet::default();
        sheet.set_level("pollination", lv(5)).unwrap();
        let json = serde_json::to_string(&sheet).unwrap();
        let back: DiagnosisSheet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sheet);
        assert!((back.score().total - 5.0).abs() < 1e-9);
    }

    #[test]
    fn summary_text_mentions_unassessed_state() {
        let empty = DiagnosisSheet::default().score();
        assert_eq!(empty.to_text(), "No diagnosis recorded.");
    }
}
