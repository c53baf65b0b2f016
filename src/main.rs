use std::process::ExitCode;

fn main() -> anyhow::Result<ExitCode> {
    roi_sheet::cli::run()
}
