use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use crate::commands::RunResult;

pub fn print_summary(result: &RunResult) {
    println!("Output: {}", result.output_folder.display());
    if !result.tables.is_empty() {
        println!("{}", summary_table(result));
    }
    if result.has_errors() {
        eprintln!("Errors:");
        for error in &result.errors {
            eprintln!("- {error}");
        }
    }
}

/// Per-chain table with a totals row.
pub fn summary_table(result: &RunResult) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Chain"),
        header_cell("Table"),
        header_cell("Sources"),
        header_cell("Rows"),
        header_cell("Columns"),
        header_cell("Seconds"),
        header_cell("Output"),
    ]);
    apply_summary_table_style(&mut table);
    for index in [2, 3, 4, 5] {
        align_column(&mut table, index, CellAlignment::Right);
    }
    let mut total_rows = 0usize;
    for summary in &result.tables {
        total_rows += summary.rows;
        table.add_row(vec![
            Cell::new(&summary.chain)
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            Cell::new(&summary.table),
            Cell::new(summary.sources),
            Cell::new(summary.rows),
            Cell::new(summary.columns),
            Cell::new(format!("{:.1}", summary.elapsed.as_secs_f64())),
            dim_cell(summary.path.display()),
        ]);
    }
    table.add_row(vec![
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        Cell::new(format!("{} tables", result.tables.len())).fg(Color::Cyan),
        dim_cell("-"),
        Cell::new(total_rows).add_attribute(Attribute::Bold),
        dim_cell("-"),
        dim_cell("-"),
        error_cell(result.errors.len()),
    ]);
    table
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
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(140);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn error_cell(count: usize) -> Cell {
    match count {
        0 => dim_cell("no failed chains"),
        1 => Cell::new("1 failed chain").fg(Color::Red),
        n => Cell::new(format!("{n} failed chains")).fg(Color::Red),
    }
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
