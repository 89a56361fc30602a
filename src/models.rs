//! Data models for plant diagnosis.
//!
//! This module contains the core data structures shared by the aggregator,
//! the classifier client and the report generators.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw classifier output: label → probability, in the order the API sent it.
///
/// Labels have the form `"<PlantType>___<Condition>"`.
pub type ClassificationMap = IndexMap<String, f64>;

/// A single condition reported for a plant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Condition name with underscores replaced by spaces.
    pub display_name: String,
    /// Probability reported by the classifier.
    pub probability: f64,
    /// Whether the condition is the healthy marker.
    pub is_healthy: bool,
}

impl Condition {
    /// Returns the health status implied by this condition.
    pub fn status(&self) -> HealthStatus {
        if self.is_healthy {
            HealthStatus::Healthy
        } else {
            HealthStatus::Diseased
        }
    }
}

/// All conditions reported for one plant species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantGroup {
    /// Plant species name, as it appears before the label separator.
    pub plant_type: String,
    /// Conditions ordered by descending probability.
    pub conditions: Vec<Condition>,
    /// Sum of all condition probabilities for this plant.
    pub total_probability: f64,
}

/// The overall diagnosis derived from a classification map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    /// Plant group with the greatest total probability.
    pub leading_plant: PlantGroup,
    /// Most probable condition of the leading plant.
    pub leading_condition: Condition,
    /// All plant groups ordered by descending total probability.
    pub groups: Vec<PlantGroup>,
}

impl Diagnosis {
    /// Health status of the leading condition.
    pub fn status(&self) -> HealthStatus {
        self.leading_condition.status()
    }

    /// Largest individual condition probability across every group.
    ///
    /// Used as the reference when scaling probability bars.
    pub fn max_probability(&self) -> f64 {
        self.groups
            .iter()
            .flat_map(|g| &g.conditions)
            .map(|c| c.probability)
            .fold(0.0, f64::max)
    }

    /// Total number of conditions across all groups.
    pub fn condition_count(&self) -> usize {
        self.groups.iter().map(|g| g.conditions.len()).sum()
    }
}

/// Health verdict of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Diseased,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "Healthy"),
            HealthStatus::Diseased => write!(f, "Diseased"),
        }
    }
}

impl HealthStatus {
    /// Returns an emoji representation of the status.
    pub fn emoji(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "🟢",
            HealthStatus::Diseased => "🔴",
        }
    }
}

/// Details of the uploaded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    /// File name sent with the upload.
    pub file_name: String,
    /// Detected image format (e.g. "PNG").
    pub format: String,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// File size in bytes.
    pub size_bytes: u64,
}

impl ImageInfo {
    /// Width divided by height, `None` for a zero height.
    pub fn aspect_ratio(&self) -> Option<f64> {
        (self.height > 0).then(|| self.width as f64 / self.height as f64)
    }

    /// Aspect ratio with two decimals, or "n/a".
    pub fn aspect_ratio_display(&self) -> String {
        self.aspect_ratio()
            .map(|r| format!("{:.2}", r))
            .unwrap_or_else(|| "n/a".to_string())
    }

    /// Human-readable file size.
    pub fn size_display(&self) -> String {
        let size = self.size_bytes as f64;
        if size >= 1024.0 * 1024.0 {
            format!("{:.2} MB", size / (1024.0 * 1024.0))
        } else if size >= 1024.0 {
            format!("{:.2} KB", size / 1024.0)
        } else {
            format!("{} B", self.size_bytes)
        }
    }
}

/// Metadata about a diagnosis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Image path or saved results file the diagnosis came from.
    pub source: String,
    /// Classification endpoint, if one was contacted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    /// Date and time of the analysis.
    pub analysis_date: DateTime<Utc>,
    /// Uploaded image details, when an image was given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageInfo>,
    /// Whether the built-in sample response replaced a failed request.
    pub used_fallback: bool,
    /// Note shown alongside the results (e.g. the request failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Duration of the run in seconds.
    pub duration_seconds: f64,
}

/// The complete diagnosis report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub diagnosis: Diagnosis,
}
