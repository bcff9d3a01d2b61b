use anyhow::{Context, Result, anyhow};
use comfy_table::{Cell, CellAlignment, Table};
use tracing::{info, info_span};

use nsch_cli::pipeline::{OutputPaths, parse_years, run_pipeline, write_outputs};
use nsch_ingest::{load_transformation_spec, read_label_definitions, year_of};
use nsch_model::VariableClass;

use crate::cli::{LabelsArgs, RunArgs};
use crate::summary::{align_column, apply_table_style, dim_cell, header_cell};
use crate::types::RunResult;

pub fn run_harmonize(args: &RunArgs) -> Result<RunResult> {
    let years = parse_years(&args.years)?;
    let _run_span = info_span!("run", data_dir = %args.data_dir.display()).entered();
    let spec = load_transformation_spec(&args.config)
        .with_context(|| format!("load configuration {}", args.config.display()))?;
    info!(
        years = ?years,
        variables = spec.desired_variables.len(),
        "configuration loaded"
    );

    let mut output = run_pipeline(&args.data_dir, &years, &spec, args.side_table.as_deref())?;
    let outputs = OutputPaths::beside(
        &args.output,
        args.codebook.clone(),
        args.audit_report.clone(),
    );
    write_outputs(&mut output, &outputs)?;

    let warnings = output.audit.counts_by_kind();
    Ok(RunResult {
        outputs,
        rows: output.table.height(),
        variables: output.table.schema.variables.len(),
        factors: output.table.schema.factor_count(),
        failed: args.fail_on_warnings && !output.audit.is_empty(),
        years: output.years,
        warnings,
    })
}

pub fn run_labels(args: &LabelsArgs) -> Result<()> {
    let year = args
        .year
        .or_else(|| year_of(&args.file))
        .ok_or_else(|| anyhow!("no survey year in {}; pass --year", args.file.display()))?;
    let labels = read_label_definitions(&args.file, year)
        .with_context(|| format!("parse {}", args.file.display()))?;

    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Variable"),
        header_cell("Class"),
        header_cell("Codes"),
        header_cell("Description"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 2, CellAlignment::Right);
    let mut categorical = 0usize;
    let variables = labels.variables();
    for variable in &variables {
        let class = labels.classify(variable);
        let codes = labels.value_labels(variable).map_or(0, |group| group.len());
        if class == VariableClass::Categorical {
            categorical += 1;
        }
        table.add_row(vec![
            Cell::new(variable),
            Cell::new(class.as_str()),
            if codes > 0 { Cell::new(codes) } else { dim_cell("-") },
            labels
                .variable_description(variable)
                .map_or_else(|| dim_cell("-"), Cell::new),
        ]);
    }
    println!("Year: {year}");
    println!("{table}");
    println!(
        "{} variable(s): {categorical} categorical, {} pass-through",
        variables.len(),
        variables.len() - categorical
    );
    Ok(())
}
