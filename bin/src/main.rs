use std::{
    ffi::OsString,
    io::{self, Write},
    process::exit,
};

use clap::{builder::NonEmptyStringValueParser, Parser};
use gcp_id_token::{
    ApplicationDefaultCredentials, IamCredentialsClient, IdTokenGenerator, IdentityTokenFetcher,
};

/// Prints a sigstore identity token for a Google Cloud service account.
///
/// Works with any application default credentials, including workload
/// identity federation credentials.
///
/// Takes exactly two positional arguments. There are no flags: anything
/// else, `--help` included, prints the usage line.
#[derive(Parser)]
#[command(
    about,
    long_about = None,
    disable_help_flag = true,
    disable_version_flag = true
)]
struct Cli {
    /// Project the service account belongs to
    #[arg(value_parser = NonEmptyStringValueParser::new(), allow_hyphen_values = true)]
    project_id: String,
    /// Service account name: the part of the email before '@'
    #[arg(value_parser = NonEmptyStringValueParser::new(), allow_hyphen_values = true)]
    service_account_name: String,
}

fn usage<W: Write>(out: &mut W, program: &str) -> i32 {
    if let Err(e) = writeln!(out, "Usage: {} <project_id> <service_account_name>", program) {
        eprintln!("Error: failed to write usage: {}", e);
    }
    1
}

fn run<I, T, G, W>(args: I, generator: G, out: &mut W) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
    G: IdTokenGenerator,
    W: Write,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    let program = match args.first() {
        Some(program) => program.to_string_lossy().into_owned(),
        None => "gcp-id-token".into(),
    };

    // Program name plus two values, a `--` separator does not count as one
    if args.len() != 3 {
        return usage(out, &program);
    }
    let cli = match Cli::try_parse_from(args.iter()) {
        Ok(cli) => cli,
        Err(_) => return usage(out, &program),
    };

    let fetcher = IdentityTokenFetcher::new(generator);
    match fetcher.fetch(&cli.project_id, &cli.service_account_name) {
        Ok(token) => match writeln!(out, "{}", token) {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("Error: failed to write token: {}", e);
                1
            }
        },
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn main() {
    env_logger::init();

    let client = IamCredentialsClient::new(ApplicationDefaultCredentials);
    exit(run(std::env::args_os(), client, &mut io::stdout()));
}
