use clap::Parser;
use log::{debug, error};
use std::error::Error;

mod args;
mod intake;

use crate::args::{Args, Command};
use crate::intake::{ErrorKind, FillOptions, ScoreOptions};

fn main() {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
    debug!("args: {:?}", args);

    let config = args.config.as_deref();
    let res = match &args.command {
        Command::Sign {
            organization,
            valid_for_hours,
            base_url,
        } => intake::run_sign(config, organization, *valid_for_hours, base_url.as_deref()),
        Command::Verify { link } => intake::run_verify(config, link),
        Command::Fill {
            link,
            respondent,
            date,
        } => intake::run_fill(
            config,
            &FillOptions {
                link: link.as_deref(),
                respondent: respondent.as_deref(),
                date: date.as_deref(),
            },
        ),
        Command::Score {
            input,
            input_type,
            excel_worksheet_name,
            link,
            respondent,
            date,
            out,
            reference,
            submit,
        } => intake::run_score(
            config,
            &ScoreOptions {
                input,
                input_type: input_type.as_deref(),
                worksheet: excel_worksheet_name.as_deref(),
                link: link.as_deref(),
                respondent: respondent.as_deref(),
                date: date.as_deref(),
                out: out.as_deref(),
                reference: reference.as_deref(),
                submit: *submit,
            },
        ),
    };

    if let Err(e) = res {
        error!("{:?}", e);
        eprintln!("Error: {}", e);
        let mut source = e.source();
        while let Some(s) = source {
            eprintln!("  caused by: {}", s);
            source = s.source();
        }
        // Rejected links exit with their own code.
        let code = match e.kind() {
            ErrorKind::LinkValidation => 2,
            _ => 1,
        };
        std::process::exit(code);
    }
}
