// Data-entry wizard: the five ordered steps, their field schemas, and the
// per-farm collection of recorded step data.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::fields::{FieldSpec, FieldValues};

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataStep {
    Environment,
    Irrigation,
    Growth,
    Pest,
    Management,
}

const ENVIRONMENT_FIELDS: &[FieldSpec] = &[
    FieldSpec::number("day_temp", "Day temperature", Some("°C")),
    FieldSpec::number("night_temp", "Night temperature", Some("°C")),
    FieldSpec::number("humidity", "Humidity", Some("%")),
    FieldSpec::number("co2", "CO2 concentration", Some("ppm")),
    FieldSpec::number("light", "Light intensity", Some("lux")),
    FieldSpec::number("external_temp", "Outside temperature", Some("°C")),
    FieldSpec::text("weather", "Weather"),
];

const IRRIGATION_FIELDS: &[FieldSpec] = &[
    FieldSpec::number("supply_ec", "Supply EC", Some("mS/cm")),
    FieldSpec::number("supply_ph", "Supply pH", None),
    FieldSpec::number("drain_ec", "Drain EC", Some("mS/cm")),
    FieldSpec::number("drain_ph", "Drain pH", None),
    FieldSpec::number("moisture", "Substrate moisture", Some("%")),
    FieldSpec::number("supply_amount", "Supply volume", Some("L")),
    FieldSpec::number("drain_amount", "Drain volume", Some("L")),
];

const GROWTH_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("stage", "Growth stage"),
    FieldSpec::long_text("description", "Growth observations"),
    FieldSpec::text("photo", "Photo path"),
];

const PEST_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("diseases", "Diseases observed"),
    FieldSpec::text("pests", "Pests observed"),
    FieldSpec::text("affected_parts", "Affected parts"),
    FieldSpec::text("severity", "Severity"),
    FieldSpec::text("control_method", "Control method"),
    FieldSpec::text("control_result", "Control result"),
    FieldSpec::text("photo", "Photo path"),
];

const MANAGEMENT_FIELDS: &[FieldSpec] = &[
    FieldSpec::number("production", "Production", Some("kg")),
    FieldSpec::number("sales", "Sales volume", Some("kg")),
    FieldSpec::number("revenue", "Revenue", Some("KRW")),
    FieldSpec::number("production_cost", "Production cost", Some("KRW")),
    FieldSpec::text("period", "Period"),
    FieldSpec::long_text("notes", "Notes"),
];

impl DataStep {
    pub const ALL: [DataStep; 5] = [
        DataStep::Environment,
        DataStep::Irrigation,
        DataStep::Growth,
        DataStep::Pest,
        DataStep::Management,
    ];

    /// Path segment and storage suffix.
    pub fn slug(self) -> &'static str {
        match self {
            DataStep::Environment => "environment",
            DataStep::Irrigation => "irrigation",
            DataStep::Growth => "growth",
            DataStep::Pest => "pest",
            DataStep::Management => "management",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.slug() == slug)
    }

    pub fn title(self) -> &'static str {
        match self {
            DataStep::Environment => "Environment",
            DataStep::Irrigation => "Irrigation",
            DataStep::Growth => "Growth",
            DataStep::Pest => "Pest & disease",
            DataStep::Management => "Business management",
        }
    }

    pub fn fields(self) -> &'static [FieldSpec] {
        match self {
            DataStep::Environment => ENVIRONMENT_FIELDS,
            DataStep::Irrigation => IRRIGATION_FIELDS,
            DataStep::Growth => GROWTH_FIELDS,
            DataStep::Pest => PEST_FIELDS,
            DataStep::Management => MANAGEMENT_FIELDS,
        }
    }

    /// 1-based position, for "step 2 of 5" displays.
    pub fn number(self) -> usize {
        self.index() + 1
    }

    /// The following step; `None` after the last one.
    pub fn next(self) -> Option<Self> {
        Self::ALL.get(self.index() + 1).copied()
    }

    /// The preceding step; `None` before the first one.
    pub fn previous(self) -> Option<Self> {
        self.index().checked_sub(1).map(|i| Self::ALL[i])
    }

    /// Validate raw form input for this step.
    pub fn validate<I, K, V>(self, inputs: I) -> Result<FieldValues, ValidationError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        FieldValues::validated(self.slug(), self.fields(), inputs)
    }

    fn index(self) -> usize {
        match self {
            DataStep::Environment => 0,
            DataStep::Irrigation => 1,
            DataStep::Growth => 2,
            DataStep::Pest => 3,
            DataStep::Management => 4,
        }
    }
}

impl fmt::Display for DataStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

// ---------------------------------------------------------------------------
// FarmRecords
// ---------------------------------------------------------------------------

/// Everything recorded through the wizard for one farm. Steps that were
/// skipped are absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FarmRecords {
    steps: BTreeMap<DataStep, FieldValues>,
}

impl FarmRecords {
    pub fn insert(&mut self, step: DataStep, values: FieldValues) {
        if values.is_empty() {
            self.steps.remove(&step);
        } else {
            self.steps.insert(step, values);
        }
    }

    pub fn get(&self, step: DataStep) -> Option<&FieldValues> {
        self.steps.get(&step)
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DataStep, &FieldValues)> {
        self.steps.iter().map(|(s, v)| (*s, v))
    }

    /// Revenue minus production cost, when both were recorded.
    pub fn net_profit(&self) -> Option<f64> {
        let management = self.get(DataStep::Management)?;
        Some(management.number("revenue")? - management.number("production_cost")?)
    }

    /// Human-readable "label: value unit" lines per step.
    pub fn to_text(&self) -> String {
        if self.is_empty() {
            return "No field data recorded.".to_string();
        }
        let mut out = String::new();
        for (step, values) in self.iter() {
            out.push_str(&format!("[{}]\n", step.title()));
            for spec in step.fields() {
                if let Some(value) = values.get(spec.key) {
                    match spec.unit {
                        Some(unit) => out.push_str(&format!("- {}: {value} {unit}\n", spec.label)),
                        None => out.push_str(&format!("- {}: {value}\n", spec.label)),
                    }
                }
            }
            if step == DataStep::Management {
                if let Some(profit) = self.net_profit() {
                    out.push_str(&format!("- Net profit: {profit} KRW\n"));
                }
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
