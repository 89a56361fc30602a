//! Report generation.
//!
//! This module renders a diagnosis as a terminal summary, a Markdown
//! report or a JSON document.

use crate::analysis::{format_percentage, scale_for_display};
use crate::config::ReportConfig;
use crate::models::{Condition, Diagnosis, ImageInfo, PlantGroup, Report, ReportMetadata};
use anyhow::Result;

/// Generate the summary printed to the terminal.
pub fn generate_text_summary(report: &Report, config: &ReportConfig) -> Result<String> {
    let diagnosis = &report.diagnosis;
    let mut output = String::new();

    if let Some(ref note) = report.metadata.note {
        output.push_str(&format!("⚠️  {}\n\n", note));
    }

    output.push_str(&format!(
        "{} {} - {} ({})\n",
        diagnosis.status().emoji(),
        diagnosis.leading_plant.plant_type,
        condition_label(&diagnosis.leading_condition),
        format_percentage(diagnosis.leading_condition.probability)?
    ));

    let max_probability = diagnosis.max_probability();
    let (shown, hidden) = visible_groups(diagnosis, config.max_groups);

    for group in shown {
        output.push_str(&format!(
            "\n   {} (total {})\n",
            group.plant_type,
            format_total(group.total_probability)
        ));
        for condition in &group.conditions {
            output.push_str(&format!(
                "     {} {:<32} {} {:>7}\n",
                condition.status().emoji(),
                condition_label(condition),
                probability_bar(condition.probability, max_probability, config.bar_width),
                format_percentage(condition.probability)?
            ));
        }
    }

    if hidden > 0 {
        output.push_str(&format!("\n   ... {} more plant group(s) not shown\n", hidden));
    }

    Ok(output)
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report, config: &ReportConfig) -> Result<String> {
    let mut output = String::new();

    // Title
    output.push_str("# Plant Diagnosis Report\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));

    if let Some(ref note) = report.metadata.note {
        output.push_str(&format!("> ⚠️ **Note:** {}\n\n", note));
    }

    output.push_str(&generate_diagnosis_section(&report.diagnosis)?);

    if config.include_image_details {
        if let Some(ref image) = report.metadata.image {
            output.push_str(&generate_image_section(image));
        }
    }

    output.push_str(&generate_details_section(&report.diagnosis, config)?);

    output.push_str(&generate_footer());

    Ok(output)
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Source:** `{}`\n", metadata.source));
    if let Some(ref url) = metadata.api_url {
        section.push_str(&format!("- **Classifier:** {}\n", url));
    }
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        metadata.analysis_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if metadata.used_fallback {
        section.push_str("- **Data:** built-in sample (request failed)\n");
    }
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the headline diagnosis section.
fn generate_diagnosis_section(diagnosis: &Diagnosis) -> Result<String> {
    let mut section = String::new();
    let status = diagnosis.status();

    section.push_str("## Diagnosis\n\n");
    section.push_str(&format!(
        "| Plant | Condition | Status | Confidence |\n|:---|:---|:---:|:---:|\n| **{}** | {} | {} {} | {} |\n\n",
        diagnosis.leading_plant.plant_type,
        condition_label(&diagnosis.leading_condition),
        status.emoji(),
        status,
        format_percentage(diagnosis.leading_condition.probability)?
    ));

    Ok(section)
}

/// Generate the image details section.
fn generate_image_section(image: &ImageInfo) -> String {
    let mut section = String::new();

    section.push_str("## Image\n\n");
    section.push_str(&format!("- **File:** {}\n", image.file_name));
    section.push_str(&format!("- **Format:** {}\n", image.format));
    section.push_str(&format!(
        "- **Dimensions:** {} x {} px\n",
        image.width, image.height
    ));
    section.push_str(&format!(
        "- **Aspect Ratio:** {}\n",
        image.aspect_ratio_display()
    ));
    section.push_str(&format!("- **Size:** {}\n\n", image.size_display()));

    section
}

/// Generate the per-plant detailed results.
fn generate_details_section(diagnosis: &Diagnosis, config: &ReportConfig) -> Result<String> {
    let mut section = String::new();
    let max_probability = diagnosis.max_probability();
    let (shown, hidden) = visible_groups(diagnosis, config.max_groups);

    section.push_str("## Detailed Results\n\n");

    for group in shown {
        section.push_str(&generate_group_table(group, max_probability)?);
    }

    if hidden > 0 {
        section.push_str(&format!("*{} more plant group(s) not shown.*\n\n", hidden));
    }

    Ok(section)
}

/// Generate the table for a single plant group.
fn generate_group_table(group: &PlantGroup, max_probability: f64) -> Result<String> {
    let mut table = String::new();

    table.push_str(&format!(
        "### {}\n\n*Combined probability: {}*\n\n",
        group.plant_type,
        format_total(group.total_probability)
    ));
    table.push_str("| Condition | Status | Probability | Relative |\n");
    table.push_str("|:---|:---:|---:|:---|\n");

    for condition in &group.conditions {
        table.push_str(&format!(
            "| {} | {} | {} | `{}` |\n",
            condition_label(condition),
            condition.status().emoji(),
            format_percentage(condition.probability)?,
            probability_bar(condition.probability, max_probability, 10)
        ));
    }
    table.push('\n');

    Ok(table)
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Report generated by CropDoc*\n".to_string()
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Condition name as shown to the user.
fn condition_label(condition: &Condition) -> String {
    if condition.is_healthy {
        "Healthy".to_string()
    } else {
        condition.display_name.clone()
    }
}

/// Group totals are sums of independent scores and may exceed 100%.
fn format_total(total: f64) -> String {
    format!("{:.2}%", total * 100.0)
}

/// Text bar of `width` cells filled proportionally to `p / max_p`.
fn probability_bar(p: f64, max_p: f64, width: usize) -> String {
    let filled = ((scale_for_display(p, max_p) / 100.0) * width as f64).round() as usize;
    let filled = filled.min(width);
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

/// Split groups into those to render and the count of hidden ones.
fn visible_groups(diagnosis: &Diagnosis, max_groups: usize) -> (&[PlantGroup], usize) {
    let groups = diagnosis.groups.as_slice();
    if max_groups == 0 || groups.len() <= max_groups {
        (groups, 0)
    } else {
        (&groups[..max_groups], groups.len() - max_groups)
    }
}
