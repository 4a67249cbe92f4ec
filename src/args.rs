use clap::{Parser, Subcommand};

/// This is an intake program for Likert-scale questionnaires.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The JSON configuration: default organization, link secret, catalog and store.
    /// Without it, the built-in catalog is used and nothing can be signed or submitted.
    #[clap(short, long, value_parser, global = true)]
    pub config: Option<String>,

    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false, global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Issues a signed link for an organization.
    Sign {
        /// The organization the link grants access for.
        #[clap(short, long, value_parser)]
        organization: String,
        /// (default 72) How long the link stays valid, in hours.
        #[clap(long, value_parser, default_value_t = 72)]
        valid_for_hours: u64,
        /// (optional) The address of the form. If provided, a full link is printed instead of the query string.
        #[clap(long, value_parser)]
        base_url: Option<String>,
    },
    /// Checks a link (full URL or query string) against the configured secret.
    Verify {
        #[clap(value_parser)]
        link: String,
    },
    /// Fills in the questionnaire interactively and submits it to the store.
    Fill {
        /// (URL or query string, optional) The signed link of the respondent.
        #[clap(short, long, value_parser)]
        link: Option<String>,
        /// (optional) The name of the respondent. Asked for if not provided.
        #[clap(short, long, value_parser)]
        respondent: Option<String>,
        /// (default today, dd/mm/yyyy) The date recorded with the answers.
        #[clap(long, value_parser)]
        date: Option<String>,
    },
    /// Scores a file of answers, and optionally submits it to the store.
    Score {
        /// (file path) The answers: one row per item with the item id and the answer.
        #[clap(short, long, value_parser)]
        input: String,
        /// (csv, xlsx or json; default from the file extension) The type of the input.
        #[clap(long, value_parser)]
        input_type: Option<String>,
        /// (default first sheet) When using an Excel file, indicates the name of the worksheet to use.
        #[clap(long, value_parser)]
        excel_worksheet_name: Option<String>,
        /// (URL or query string, optional) The signed link the answers were collected with.
        #[clap(short, long, value_parser)]
        link: Option<String>,
        #[clap(short, long, value_parser)]
        respondent: Option<String>,
        /// (default today, dd/mm/yyyy) The date recorded with the answers.
        #[clap(long, value_parser)]
        date: Option<String>,
        /// (file path, 'stdout' or empty) If specified, the summary of the scores will be written in JSON format to the
        /// given location.
        #[clap(short, long, value_parser)]
        out: Option<String>,
        /// (file path) A reference summary in JSON format. If provided, the computed summary must match it.
        #[clap(long, value_parser)]
        reference: Option<String>,
        /// If passed as an argument, the rows are appended to the configured store.
        #[clap(long, takes_value = false)]
        submit: bool,
    },
}
