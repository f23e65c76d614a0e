pub mod formatter;

pub use formatter::{
    format_dataset_line, format_model, format_names, format_parameter, format_ranked_table,
    format_report, format_score, format_tsv, format_variants, should_use_colors, use_colors,
};
