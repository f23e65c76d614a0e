use std::io::IsTerminal;

use owo_colors::OwoColorize;
use terminal_size::{terminal_size, Width};

use crate::config::ColorMode;
use crate::dataset::{DataPoint, Dataset};
use crate::model::{EvaluationReport, Model};
use crate::scoring::registry::VariantInfo;
use crate::scoring::{Parameter, ParameterKind};

/// Check if stdout is a TTY (for auto-detecting color support)
pub fn should_use_colors() -> bool {
    std::io::stdout().is_terminal()
}

/// Resolve the configured color mode against the terminal
pub fn use_colors(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => should_use_colors(),
    }
}

/// One decimal, or `-` for a point that has not been scored
pub fn format_score(score: Option<f64>) -> String {
    match score {
        Some(s) => format!("{:.1}", s),
        None => "-".to_string(),
    }
}

/// Get terminal width, defaulting to None for pipes (unlimited)
fn get_terminal_width() -> Option<usize> {
    terminal_size().map(|(Width(w), _)| w as usize)
}

/// Truncate a name to fit available width, accounting for Unicode
fn truncate_name(name: &str, max_width: usize) -> String {
    let chars: Vec<char> = name.chars().collect();
    if chars.len() <= max_width {
        name.to_string()
    } else if max_width > 3 {
        format!("{}...", chars[..max_width - 3].iter().collect::<String>())
    } else {
        chars[..max_width].iter().collect()
    }
}

/// Per-parameter lines for `--explain`: `raw -> score xweight`
fn format_explanation(point: &DataPoint, model: &Model, use_colors: bool) -> Vec<String> {
    point
        .parameter_datas
        .iter()
        .map(|entry| {
            let weight = model
                .parameter(&entry.name)
                .map(|p| format!("x{}", p.weight()))
                .unwrap_or_else(|| "(not in model)".to_string());
            let score = format!("{:.1}", entry.score);
            if use_colors {
                format!(
                    "        {}: {} -> {} {}",
                    entry.name.cyan(),
                    entry.value,
                    score.bold(),
                    weight.dimmed()
                )
            } else {
                format!("        {}: {} -> {} {}", entry.name, entry.value, score, weight)
            }
        })
        .collect()
}

/// Format points as a ranked table with columns: Index, Score, Name
/// No headers (minimal format)
/// Index column: 3 chars (fits "99."), right-aligned
/// Score column is right-aligned, 6 chars wide (fits "-100.0")
///
/// With `explain`, each row is followed by how every parameter contributed.
pub fn format_ranked_table(
    points: &[&DataPoint],
    use_colors: bool,
    limit: Option<usize>,
    explain: Option<&Model>,
) -> String {
    if points.is_empty() {
        return "No data points found.".to_string();
    }

    let term_width = get_terminal_width();
    let index_width = 3;
    let score_width = 6;
    let separator = "  ";
    let fixed_width = index_width + 1 + score_width + separator.len();

    let shown = limit.unwrap_or(points.len()).min(points.len());
    let mut lines = Vec::with_capacity(shown);
    for (idx, point) in points.iter().take(shown).enumerate() {
        // 1-based index, right-aligned with trailing dot
        let index_str = format!("{:>2}.", idx + 1);
        let score_padded = format!("{:>width$}", format_score(point.total_score), width = score_width);

        let name = match term_width {
            Some(width) if width > fixed_width + 10 => truncate_name(&point.name, width - fixed_width),
            // Very narrow terminal, show truncated
            Some(_) => truncate_name(&point.name, 20),
            // No terminal (pipe), don't truncate
            None => point.name.clone(),
        };

        if use_colors {
            lines.push(format!(
                "{} {}{}{}",
                index_str.dimmed(),
                score_padded.bold(),
                separator,
                name
            ));
        } else {
            lines.push(format!("{} {}{}{}", index_str, score_padded, separator, name));
        }

        if let Some(model) = explain {
            lines.extend(format_explanation(point, model, use_colors));
        }
    }

    if shown < points.len() {
        lines.push(format!("... {} more", points.len() - shown));
    }
    lines.join("\n")
}

/// Format points as tab-separated values for scripting
/// Columns: total, name, then each raw value in entry order (no headers, no colors)
pub fn format_tsv(points: &[&DataPoint]) -> String {
    points
        .iter()
        .map(|point| {
            let total = point.total_score.map(|s| format!("{:.1}", s)).unwrap_or_default();
            let mut columns = vec![total, point.name.clone()];
            columns.extend(point.parameter_datas.iter().map(|e| e.value.to_string()));
            columns.join("\t")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Registry listing: tag, applicable value type, description and fields
pub fn format_variants(variants: &[VariantInfo], use_colors: bool) -> String {
    variants
        .iter()
        .map(|v| {
            let header = if use_colors {
                format!("{} ({})", v.tag.bold(), v.applies_to.cyan())
            } else {
                format!("{} ({})", v.tag, v.applies_to)
            };
            let mut lines = vec![header, format!("  {}", v.description)];
            for field in v.fields {
                lines.push(format!("    {}: {}", field.name, field.description));
            }
            lines.join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_kind(kind: &ParameterKind) -> String {
    match kind {
        ParameterKind::Numerical {
            value_range: Some(r),
        } => format!("numerical [{}..{}]", r.min, r.max),
        ParameterKind::Time { range: Some(r) } => {
            format!("time [{}..{}]", r.start.to_rfc3339(), r.end.to_rfc3339())
        }
        ParameterKind::Enum { labels } => {
            let labels: Vec<String> = labels.iter().map(|(l, s)| format!("{}={}", l, s)).collect();
            format!("enum {{{}}}", labels.join(", "))
        }
        other => other.tag().to_string(),
    }
}

/// One line per parameter: name, kind, weight, normalizer
pub fn format_parameter(parameter: &Parameter, use_colors: bool) -> String {
    let line = if use_colors {
        format!(
            "{}  {}  weight {}  {}",
            parameter.name().bold(),
            format_kind(parameter.kind()),
            parameter.weight(),
            parameter.normalizer().cyan()
        )
    } else {
        format!(
            "{}  {}  weight {}  {}",
            parameter.name(),
            format_kind(parameter.kind()),
            parameter.weight(),
            parameter.normalizer()
        )
    };
    match parameter.description() {
        Some(d) => format!("{}\n      {}", line, d),
        None => line,
    }
}

pub fn format_model(model: &Model, use_colors: bool) -> String {
    let mut lines = Vec::new();
    if use_colors {
        lines.push(model.name.bold().to_string());
    } else {
        lines.push(model.name.clone());
    }
    if let Some(ref d) = model.description {
        lines.push(format!("  {}", d));
    }

    lines.push(format!("Parameters ({}):", model.parameters().len()));
    for (idx, parameter) in model.parameters().iter().enumerate() {
        lines.push(format!("{:>3}. {}", idx, format_parameter(parameter, use_colors)));
    }

    lines.push(format!("Datasets ({}):", model.datasets.len()));
    for dataset in &model.datasets {
        lines.push(format!("  - {}", format_dataset_line(dataset)));
    }
    lines.join("\n")
}

/// `name (N points, M scored)`
pub fn format_dataset_line(dataset: &Dataset) -> String {
    let scored = dataset.data_points.iter().filter(|p| p.is_scored()).count();
    format!("{} ({} points, {} scored)", dataset.name, dataset.len(), scored)
}

/// Per-dataset outcome of an evaluation, one line each
pub fn format_report(report: &EvaluationReport, use_colors: bool) -> String {
    report
        .outcomes
        .iter()
        .map(|outcome| match &outcome.result {
            Ok(summary) => {
                let best = summary
                    .best
                    .as_ref()
                    .map(|(name, total)| format!(", best {} ({:.1})", name, total))
                    .unwrap_or_default();
                format!("{}: {} points scored{}", outcome.dataset, summary.points, best)
            }
            Err(e) => {
                if use_colors {
                    format!("{}: {} {}", outcome.dataset, "rejected:".red(), e)
                } else {
                    format!("{}: rejected: {}", outcome.dataset, e)
                }
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Names one per line, or `empty` when there are none
pub fn format_names(names: &[String], empty: &str) -> String {
    if names.is_empty() {
        empty.to_string()
    } else {
        names.join("\n")
    }
}
