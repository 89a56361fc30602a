//! Diagnosis aggregation.
//!
//! Reshapes the flat label → probability map returned by the classifier
//! into per-plant groups, picks the most likely plant and condition, and
//! provides the display helpers used by the report generators.

use crate::models::{ClassificationMap, Condition, Diagnosis, PlantGroup};
use indexmap::IndexMap;
use std::cmp::Ordering;
use thiserror::Error;

/// Separator between plant type and condition in a classification label.
pub const LABEL_SEPARATOR: &str = "___";

/// Condition tokens recognized as "healthy" (compared lower-cased).
pub const DEFAULT_HEALTHY_MARKERS: &[&str] = &["saludable", "healthy"];

/// Errors raised while aggregating or formatting classifier output.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DiagnosisError {
    /// A label lacks the plant/condition separator.
    #[error("malformed classification label '{label}': expected '<plant>___<condition>'")]
    MalformedLabel { label: String },

    /// The classification map has no entries.
    #[error("classification map is empty; nothing to diagnose")]
    EmptyInput,

    /// A probability outside [0, 1] was given for display.
    #[error("probability {value} is outside the range [0, 1]")]
    OutOfRange { value: f64 },

    /// A label carries NaN or an infinite probability.
    #[error("probability for '{label}' is not a finite number")]
    NonFiniteProbability { label: String },
}

/// Label interpretation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelConfig {
    /// Lower-cased condition tokens that mean "healthy".
    pub healthy_markers: Vec<String>,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self::new(DEFAULT_HEALTHY_MARKERS.iter().copied())
    }
}

impl From<&crate::config::LabelsConfig> for LabelConfig {
    fn from(config: &crate::config::LabelsConfig) -> Self {
        Self::new(config.healthy_markers.iter().map(String::as_str))
    }
}

impl LabelConfig {
    /// Build a config from marker words; they are lower-cased once here.
    pub fn new<'a>(markers: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            healthy_markers: markers.into_iter().map(|m| m.to_lowercase()).collect(),
        }
    }

    /// Whether a raw condition token is a healthy marker.
    pub fn is_healthy(&self, raw_condition: &str) -> bool {
        let lowered = raw_condition.to_lowercase();
        self.healthy_markers.iter().any(|m| *m == lowered)
    }
}

/// Split a label into `(plant_type, raw_condition)` on the first separator.
pub fn parse_label(label: &str) -> Result<(&str, &str), DiagnosisError> {
    label
        .split_once(LABEL_SEPARATOR)
        .ok_or_else(|| DiagnosisError::MalformedLabel {
            label: label.to_string(),
        })
}

/// Turn a raw condition token into its display form.
pub fn display_condition(raw_condition: &str) -> String {
    raw_condition.replace('_', " ")
}

/// Group classifier output by plant type.
///
/// Conditions within a group and the groups themselves are sorted by
/// descending probability. Both sorts are stable, so equal values keep the
/// order in which they first appeared in `map`.
pub fn group_by_plant(
    map: &ClassificationMap,
    labels: &LabelConfig,
) -> Result<Vec<PlantGroup>, DiagnosisError> {
    let mut grouped: IndexMap<&str, Vec<Condition>> = IndexMap::new();

    for (label, &probability) in map {
        let (plant_type, raw_condition) = parse_label(label)?;
        if !probability.is_finite() {
            return Err(DiagnosisError::NonFiniteProbability {
                label: label.clone(),
            });
        }

        grouped.entry(plant_type).or_default().push(Condition {
            display_name: display_condition(raw_condition),
            probability,
            is_healthy: labels.is_healthy(raw_condition),
        });
    }

    let mut groups: Vec<PlantGroup> = grouped
        .into_iter()
        .map(|(plant_type, mut conditions)| {
            conditions.sort_by(|a, b| descending(a.probability, b.probability));
            let total_probability = conditions.iter().map(|c| c.probability).sum();
            PlantGroup {
                plant_type: plant_type.to_string(),
                conditions,
                total_probability,
            }
        })
        .collect();

    groups.sort_by(|a, b| descending(a.total_probability, b.total_probability));

    Ok(groups)
}

/// Build the full diagnosis for a classification map.
pub fn diagnose(map: &ClassificationMap, labels: &LabelConfig) -> Result<Diagnosis, DiagnosisError> {
    if map.is_empty() {
        return Err(DiagnosisError::EmptyInput);
    }

    let groups = group_by_plant(map, labels)?;
    let leading_plant = leading_plant(&groups)
        .cloned()
        .ok_or(DiagnosisError::EmptyInput)?;
    let leading_condition = leading_condition(&leading_plant)
        .cloned()
        .ok_or(DiagnosisError::EmptyInput)?;

    Ok(Diagnosis {
        leading_plant,
        leading_condition,
        groups,
    })
}

/// The group with the greatest total probability.
///
/// Ties go to the group that comes first in `groups`.
pub fn leading_plant(groups: &[PlantGroup]) -> Option<&PlantGroup> {
    first_max_by(groups, |g| g.total_probability)
}

/// The condition of `group` with the greatest probability.
///
/// Ties go to the condition that comes first in the group.
pub fn leading_condition(group: &PlantGroup) -> Option<&Condition> {
    first_max_by(&group.conditions, |c| c.probability)
}

/// Format a probability in [0, 1] as a percentage with two decimals.
pub fn format_percentage(p: f64) -> Result<String, DiagnosisError> {
    if !(0.0..=1.0).contains(&p) {
        return Err(DiagnosisError::OutOfRange { value: p });
    }
    // -0.0 + 0.0 is +0.0
    let p = p + 0.0;
    Ok(format!("{:.2}%", p * 100.0))
}

/// Scale `p` against `max_p` to a bar length in [0, 100].
///
/// A zero maximum means no condition has any signal, so every bar is empty.
pub fn scale_for_display(p: f64, max_p: f64) -> f64 {
    if max_p == 0.0 {
        return 0.0;
    }
    let scaled = (p / max_p) * 100.0;
    if scaled.is_finite() {
        scaled.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

fn descending(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

fn first_max_by<T>(items: &[T], key: impl Fn(&T) -> f64) -> Option<&T> {
    items.iter().fold(None, |best: Option<&T>, item| match best {
        Some(current) if key(item) <= key(current) => Some(current),
        _ => Some(item),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_of(entries: &[(&str, f64)]) -> ClassificationMap {
        entries
            .iter()
            .map(|(label, p)| (label.to_string(), *p))
            .collect()
    }

    fn sample_map() -> ClassificationMap {
        map_of(&[
            ("Manzana___Podredumbre_negra", 0.022210918366909027),
            ("Manzana___Roña_del_manzano", 0.6731756329536438),
            ("Manzana___saludable", 0.2475418746471405),
            ("Maíz___Mancha_foliar_por_Cercospora", 0.02118958719074726),
            ("Maíz___Tizón_foliar_norteño", 0.0009554149582982063),
            ("Maíz___saludable", 0.013545230962336063),
            ("Tomate___Mancha_foliar_por_Septoriosis", 0.007391240913420916),
            ("Tomate___Tizón_tardío", 0.0006959199672564864),
            ("Tomate___saludable", 0.002276195678859949),
            ("Uva___Sarampión_negro", 0.0017166787292808294),
            ("Uva___Tizón_foliar_Isariopsis", 0.001491655595600605),
            ("Uva___saludable", 0.007809591479599476),
        ])
    }

    #[test]
    fn test_group_single_plant() {
        let map = map_of(&[
            ("Maíz___saludable", 0.0135),
            ("Maíz___Tizón_foliar_norteño", 0.00096),
        ]);

        let groups = group_by_plant(&map, &LabelConfig::default()).unwrap();

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].plant_type, "Maíz");
        let names: Vec<&str> = groups[0]
            .conditions
            .iter()
            .map(|c| c.display_name.as_str())
            .collect();
        assert_eq!(names, vec!["saludable", "Tizón foliar norteño"]);
        assert!(groups[0].conditions[0].is_healthy);
        assert!(!groups[0].conditions[1].is_healthy);
        assert!((groups[0].total_probability - 0.01446).abs() < 1e-9);
    }

    #[test]
    fn test_diagnose_picks_leading_plant_and_condition() {
        let map = map_of(&[
            ("Maíz___saludable", 0.0135),
            ("Maíz___Tizón_foliar_norteño", 0.00096),
            ("Manzana___Roña_del_manzano", 0.673),
            ("Manzana___saludable", 0.2475),
        ]);

        let diagnosis = diagnose(&map, &LabelConfig::default()).unwrap();

        assert_eq!(diagnosis.leading_plant.plant_type, "Manzana");
        assert_eq!(diagnosis.leading_condition.display_name, "Roña del manzano");
        assert!(!diagnosis.leading_condition.is_healthy);
        assert_eq!(diagnosis.groups.len(), 2);
        assert_eq!(diagnosis.groups[1].plant_type, "Maíz");
    }

    #[test]
    fn test_leading_plant_has_max_total() {
        let map = sample_map();
        let diagnosis = diagnose(&map, &LabelConfig::default()).unwrap();
        let groups = group_by_plant(&map, &LabelConfig::default()).unwrap();

        let max_total = groups
            .iter()
            .map(|g| g.total_probability)
            .fold(f64::MIN, f64::max);
        assert_eq!(diagnosis.leading_plant.total_probability, max_total);
    }

    #[test]
    fn test_groups_and_conditions_sorted_descending() {
        let groups = group_by_plant(&sample_map(), &LabelConfig::default()).unwrap();

        for pair in groups.windows(2) {
            assert!(pair[0].total_probability >= pair[1].total_probability);
        }
        for group in &groups {
            for pair in group.conditions.windows(2) {
                assert!(pair[0].probability >= pair[1].probability);
            }
        }
        let order: Vec<&str> = groups.iter().map(|g| g.plant_type.as_str()).collect();
        assert_eq!(order, vec!["Manzana", "Maíz", "Uva", "Tomate"]);
    }

    #[test]
    fn test_group_totals_match_condition_sums() {
        let groups = group_by_plant(&sample_map(), &LabelConfig::default()).unwrap();

        for group in &groups {
            let sum: f64 = group.conditions.iter().map(|c| c.probability).sum();
            assert!((sum - group.total_probability).abs() < 1e-9);
        }
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let map = map_of(&[
            ("Uva___Sarampión_negro", 0.2),
            ("Tomate___Tizón_tardío", 0.1),
            ("Tomate___saludable", 0.1),
            ("Uva___saludable", 0.0),
        ]);

        let diagnosis = diagnose(&map, &LabelConfig::default()).unwrap();

        // Both plants total 0.2; Uva was seen first.
        assert_eq!(diagnosis.leading_plant.plant_type, "Uva");
        assert_eq!(diagnosis.groups[1].plant_type, "Tomate");
        // Tomate's two conditions tie; insertion order is kept.
        assert_eq!(diagnosis.groups[1].conditions[0].display_name, "Tizón tardío");
        assert_eq!(diagnosis.groups[1].conditions[1].display_name, "saludable");
    }

    #[test]
    fn test_leading_reductions_prefer_first_on_tie() {
        let group = PlantGroup {
            plant_type: "Tomate".to_string(),
            conditions: vec![
                Condition {
                    display_name: "a".to_string(),
                    probability: 0.4,
                    is_healthy: false,
                },
                Condition {
                    display_name: "b".to_string(),
                    probability: 0.4,
                    is_healthy: true,
                },
            ],
            total_probability: 0.8,
        };
        let other = PlantGroup {
            plant_type: "Uva".to_string(),
            ..group.clone()
        };

        assert_eq!(leading_condition(&group).unwrap().display_name, "a");
        let groups = [group, other];
        assert_eq!(leading_plant(&groups).unwrap().plant_type, "Tomate");
        assert!(leading_plant(&[]).is_none());
    }

    #[test]
    fn test_diagnose_empty_map() {
        let result = diagnose(&ClassificationMap::new(), &LabelConfig::default());
        assert_eq!(result, Err(DiagnosisError::EmptyInput));
    }

    #[test]
    fn test_malformed_label() {
        let map = map_of(&[("NoSeparatorKey", 0.5)]);
        let result = group_by_plant(&map, &LabelConfig::default());
        assert_eq!(
            result,
            Err(DiagnosisError::MalformedLabel {
                label: "NoSeparatorKey".to_string()
            })
        );
    }

    #[test]
    fn test_split_on_first_separator_only() {
        let (plant, condition) = parse_label("Maíz___Roya___común").unwrap();
        assert_eq!(plant, "Maíz");
        assert_eq!(condition, "Roya___común");
        assert_eq!(display_condition(condition), "Roya   común");
    }

    #[test]
    fn test_non_finite_probability_rejected() {
        let map = map_of(&[("Uva___saludable", f64::NAN)]);
        assert!(matches!(
            group_by_plant(&map, &LabelConfig::default()),
            Err(DiagnosisError::NonFiniteProbability { .. })
        ));
    }

    #[test]
    fn test_healthy_marker_case_insensitive() {
        let labels = LabelConfig::default();
        assert!(labels.is_healthy("saludable"));
        assert!(labels.is_healthy("Saludable"));
        assert!(labels.is_healthy("HEALTHY"));
        assert!(!labels.is_healthy("Tizón_tardío"));
    }

    #[test]
    fn test_custom_healthy_markers() {
        let labels = LabelConfig::new(["Gezond"]);
        let map = map_of(&[("Appel___gezond", 0.9), ("Appel___saludable", 0.1)]);

        let groups = group_by_plant(&map, &labels).unwrap();

        assert!(groups[0].conditions[0].is_healthy);
        assert!(!groups[0].conditions[1].is_healthy);
    }

    #[test]
    fn test_format_percentage() {
        assert_eq!(format_percentage(0.022210918366909027).unwrap(), "2.22%");
        assert_eq!(format_percentage(0.0).unwrap(), "0.00%");
        assert_eq!(format_percentage(1.0).unwrap(), "100.00%");
    }

    #[test]
    fn test_format_percentage_negative_zero() {
        let parsed: ClassificationMap =
            serde_json::from_str(r#"{"Uva___saludable": -0.0}"#).unwrap();
        let p = parsed["Uva___saludable"];
        assert!(p.is_sign_negative());
        assert_eq!(format_percentage(p).unwrap(), "0.00%");
        assert_eq!(format_percentage(-0.0).unwrap(), "0.00%");
    }

    #[test]
    fn test_format_percentage_out_of_range() {
        assert_eq!(
            format_percentage(1.5),
            Err(DiagnosisError::OutOfRange { value: 1.5 })
        );
        assert!(format_percentage(-0.01).is_err());
        assert!(format_percentage(f64::NAN).is_err());
    }

    #[test]
    fn test_scale_for_display() {
        assert_eq!(scale_for_display(0.5, 0.0), 0.0);
        assert_eq!(scale_for_display(0.25, 0.5), 50.0);
        assert_eq!(scale_for_display(0.9, 0.5), 100.0);
        assert_eq!(scale_for_display(-0.1, 0.5), 0.0);
    }
}
