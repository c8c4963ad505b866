// Farm records: the create input, the partial update, and validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{require_text, ValidationError};

/// A registered farm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Farm {
    pub farm_id: String,
    pub name: String,
    pub location: String,
    pub owner_name: String,
    /// Cultivated area in square metres.
    pub size: Option<f64>,
    pub crop: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Farm {
    /// Crop name, or `-` when none is recorded.
    pub fn crop_display(&self) -> &str {
        self.crop.as_deref().filter(|c| !c.is_empty()).unwrap_or("-")
    }

    /// Area with unit, or `-` when unknown.
    pub fn size_display(&self) -> String {
        match self.size {
            Some(size) => format!("{size} m²"),
            None => "-".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// NewFarm
// ---------------------------------------------------------------------------

/// Input for creating a farm. The identifier and timestamps are assigned
/// by the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewFarm {
    pub name: String,
    pub location: String,
    pub owner_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop: Option<String>,
}

impl NewFarm {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        require_text("location", &self.location)?;
        require_text("owner_name", &self.owner_name)?;
        if let Some(size) = self.size {
            validate_size(size)?;
        }
        Ok(())
    }

    /// Build the stored record with a fresh UUID and both timestamps set to
    /// `now`. Text fields are trimmed; a blank crop becomes `None`.
    pub fn into_farm(self, now: DateTime<Utc>) -> Farm {
        Farm {
            farm_id: uuid::Uuid::new_v4().to_string(),
            name: self.name.trim().to_string(),
            location: self.location.trim().to_string(),
            owner_name: self.owner_name.trim().to_string(),
            size: self.size,
            crop: normalize_crop(self.crop),
            created_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// FarmUpdate
// ---------------------------------------------------------------------------

/// Partial update keyed by `farm_id`. `None` means "leave unchanged".
///
/// The nullable columns use a nested option: `Some(None)` clears the value,
/// `Some(Some(v))` sets it. Serializes to exactly the supplied columns,
/// which is the PATCH body a PostgREST backend expects.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FarmUpdate {
    #[serde(skip)]
    pub farm_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop: Option<Option<String>>,
}

impl FarmUpdate {
    pub fn new(farm_id: impl Into<String>) -> Self {
        Self {
            farm_id: farm_id.into(),
            ..Default::default()
        }
    }

    /// True when no field is supplied.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.location.is_none()
            && self.owner_name.is_none()
            && self.size.is_none()
            && self.crop.is_none()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("farm_id", &self.farm_id)?;
        if let Some(name) = &self.name {
            require_text("name", name)?;
        }
        if let Some(location) = &self.location {
            require_text("location", location)?;
        }
        if let Some(owner) = &self.owner_name {
            require_text("owner_name", owner)?;
        }
        if let Some(Some(size)) = self.size {
            validate_size(size)?;
        }
        Ok(())
    }

    /// Apply the supplied fields to `farm`. The identifier and creation
    /// time never change; `updated_at` becomes `now` when anything was
    /// supplied.
    pub fn apply(&self, farm: &mut Farm, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            farm.name = name.trim().to_string();
        }
        if let Some(location) = &self.location {
            farm.location = location.trim().to_string();
        }
        if let Some(owner) = &self.owner_name {
            farm.owner_name = owner.trim().to_string();
        }
        if let Some(size) = self.size {
            farm.size = size;
        }
        if let Some(crop) = &self.crop {
            farm.crop = normalize_crop(crop.clone());
        }
        if !self.is_empty() {
            farm.updated_at = now;
        }
    }

    /// The update that turns `before` into the values of `after`, listing
    /// only the fields that differ. Used by edit forms, which hold a full
    /// copy of the record.
    pub fn diff(before: &Farm, after: &NewFarm) -> Self {
        let mut update = FarmUpdate::new(before.farm_id.clone());
        if after.name.trim() != before.name {
            update.name = Some(after.name.clone());
        }
        if after.location.trim() != before.location {
            update.location = Some(after.location.clone());
        }
        if after.owner_name.trim() != before.owner_name {
            update.owner_name = Some(after.owner_name.clone());
        }
        if after.size != before.size {
            update.size = Some(after.size);
        }
        let crop = normalize_crop(after.crop.clone());
        if crop != before.crop {
            update.crop = Some(crop);
        }
        update
    }
}

fn validate_size(size: f64) -> Result<(), ValidationError> {
    if !size.is_finite() || size < 0.0 {
        return Err(ValidationError::new(
            "size",
            format!("must be a non-negative number, got {size}"),
        ));
    }
    Ok(())
}

fn normalize_crop(crop: Option<String>) -> Option<String> {
    crop.map(|c| c.trim().to_string()).filter(|c| !c.is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
