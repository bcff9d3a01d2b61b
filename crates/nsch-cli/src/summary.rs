use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use crate::types::RunResult;

pub fn print_summary(result: &RunResult) {
    println!("Output: {}", result.outputs.table.display());
    println!("Codebook: {}", result.outputs.codebook.display());
    println!("Audit report: {}", result.outputs.audit_report.display());
    println!(
        "Rows: {}  Variables: {} ({} factor)",
        result.rows, result.variables, result.factors
    );

    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Year"),
        header_cell("Rows"),
        header_cell("Columns"),
        header_cell("Categorical"),
        header_cell("Numeric"),
        header_cell("Absent"),
        header_cell("Warnings"),
    ]);
    apply_summary_table_style(&mut table);
    for index in 1..7 {
        align_column(&mut table, index, CellAlignment::Right);
    }
    let mut total_rows = 0usize;
    let mut total_warnings = 0usize;
    for year in &result.years {
        total_rows += year.rows;
        total_warnings += year.warnings;
        table.add_row(vec![
            Cell::new(year.year)
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            Cell::new(year.rows),
            Cell::new(year.columns),
            Cell::new(year.categorical),
            Cell::new(year.numeric),
            count_cell(year.absent, Color::Yellow),
            count_cell(year.warnings, Color::Yellow),
        ]);
    }
    table.add_row(vec![
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        Cell::new(total_rows).add_attribute(Attribute::Bold),
        dim_cell("-"),
        dim_cell("-"),
        dim_cell("-"),
        dim_cell("-"),
        count_cell(total_warnings, Color::Yellow).add_attribute(Attribute::Bold),
    ]);
    println!("{table}");
    print_warning_table(result);
    if result.failed {
        eprintln!(
            "error: {} warning(s) recorded and --fail-on-warnings is set",
            result.warning_count()
        );
    }
}

fn print_warning_table(result: &RunResult) {
    if result.warnings.is_empty() {
        return;
    }
    let mut table = Table::new();
    table.set_header(vec![header_cell("Warning"), header_cell("Count")]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    for (kind, count) in &result.warnings {
        table.add_row(vec![
            Cell::new(kind.as_str()),
            count_cell(*count, Color::Yellow),
        ]);
    }
    println!();
    println!("Warnings (all run-level; see the audit report for details):");
    println!("{table}");
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(100);
}

pub fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

pub fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn count_cell(count: usize, color: Color) -> Cell {
    if count > 0 {
        Cell::new(count).fg(color).add_attribute(Attribute::Bold)
    } else {
        dim_cell(count)
    }
}

pub fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
