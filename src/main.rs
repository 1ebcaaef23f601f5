use std::process::ExitCode;

mod app;
mod logging;

fn main() -> ExitCode {
    let args = pdf_exporter::cli::parse();
    app::run(args)
}
