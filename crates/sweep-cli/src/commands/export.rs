use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use sweep_exp::SweepReport;
use tracing::info;

use super::split_names;

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Report written by `sweep run`.
    #[arg(long)]
    pub report: PathBuf,
    /// Destination CSV file.
    #[arg(long)]
    pub out: PathBuf,
    /// Result fields to export; defaults to the fields recorded in the report.
    #[arg(long, value_name = "FIELD")]
    pub fields: Vec<String>,
    /// Also write the report's artefacts into this directory.
    #[arg(long)]
    pub artifacts: Option<PathBuf>,
}

pub fn run(args: &ExportArgs) -> Result<(), Box<dyn Error>> {
    let report = SweepReport::load_json(&args.report)?;
    let mut fields = split_names(&args.fields);
    if fields.is_empty() {
        fields = report.fields.clone();
    }
    report.write_csv(&args.out, &fields)?;
    if let Some(dir) = &args.artifacts {
        let written = report.export_artifacts(dir)?;
        info!(artifacts = written.len(), dir = %dir.display(), "artefacts exported");
    }
    info!(rows = report.rows.len(), out = %args.out.display(), "report exported");
    Ok(())
}
