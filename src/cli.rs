use crate::{
    ContentStore, DecoderConfig, DedupPolicy, Error, Extractor, Result, UnknownAttributes,
};
use clap::{Arg, ArgAction, ArgMatches, Command};
use tracing::error;

pub struct Cli;

impl Cli {
    pub fn build_command() -> Command {
        Command::new("maltap")
            .about("Extracts tween animations and interpolators from Android applications")
            .long_about("Extracts tween animations and interpolators from Android applications.\n\nCompiled res/anim and res/interpolator resources are decoded to a canonical XML form, hashed, and stored in an SQLite database with one table per resource kind.")
            .version(env!("CARGO_PKG_VERSION"))
            .subcommand_required(true)
            .arg_required_else_help(true)
            .subcommand(
                Command::new("extract")
                    .about("Scan APKs or extracted application directories into the database")
                    .arg(
                        Arg::new("database")
                            .short('d')
                            .long("database")
                            .env("MALTAP_DATABASE")
                            .default_value("animations.db")
                            .help("SQLite database to write to"),
                    )
                    .arg(
                        Arg::new("package")
                            .short('p')
                            .long("package")
                            .help("Package name to record instead of the one found in each input"),
                    )
                    .arg(
                        Arg::new("dedup")
                            .long("dedup")
                            .value_parser(DedupPolicy::NAMES)
                            .default_value("per-file")
                            .help("Which stored rows make an incoming resource a duplicate"),
                    )
                    .arg(keep_unknown_arg())
                    .arg(
                        Arg::new("input")
                            .help("APK files or extracted application directories")
                            .required(true)
                            .num_args(1..)
                            .action(ArgAction::Append),
                    ),
            )
            .subcommand(
                Command::new("dump")
                    .about("Print the canonical form of one compiled animation or interpolator")
                    .arg(keep_unknown_arg())
                    .arg(
                        Arg::new("file")
                            .help("Compiled XML resource file")
                            .required(true)
                            .index(1),
                    ),
            )
    }

    pub fn run() -> Result<()> {
        let matches = Self::build_command().get_matches();
        Self::run_with_matches(matches)
    }

    pub fn run_with_matches(matches: ArgMatches) -> Result<()> {
        match matches.subcommand() {
            Some(("extract", sub)) => Self::extract(sub),
            Some(("dump", sub)) => Self::dump(sub),
            _ => Err(Error::Usage("Expected a subcommand: extract or dump".to_string())),
        }
    }

    fn extract(matches: &ArgMatches) -> Result<()> {
        let database = required(matches, "database")?;
        let dedup: DedupPolicy = required(matches, "dedup")?.parse()?;
        let package = matches.get_one::<String>("package").cloned();
        let inputs: Vec<&String> = matches
            .get_many::<String>("input")
            .map(|values| values.collect())
            .unwrap_or_default();

        let store = ContentStore::open(database, dedup)?;
        let mut extractor = Extractor::new(decoder_config(matches), store);

        let mut failed = 0;
        for input in &inputs {
            match extractor.scan_path(input, package.clone()) {
                Ok(report) => {
                    println!(
                        "{}: {} animations, {} interpolators written ({} duplicates skipped, {} resources failed)",
                        report.package,
                        report.animations.written,
                        report.interpolators.written,
                        report.animations.skipped + report.interpolators.skipped,
                        report.failures.len()
                    );
                    for failure in &report.failures {
                        println!("  {}: {}", failure.file_name, failure.error);
                    }
                }
                Err(e) => {
                    error!(input = %input, error = %e, "scan failed");
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            return Err(Error::ScanFailed {
                failed,
                total: inputs.len(),
            });
        }
        Ok(())
    }

    fn dump(matches: &ArgMatches) -> Result<()> {
        let file = required(matches, "file")?;
        let xml = Extractor::dump_file(file, decoder_config(matches))?;
        println!("{}", xml);
        Ok(())
    }
}

fn keep_unknown_arg() -> Arg {
    Arg::new("keep-unknown-attributes")
        .long("keep-unknown-attributes")
        .help("Keep animation attributes outside the tween vocabulary")
        .action(ArgAction::SetTrue)
}

fn decoder_config(matches: &ArgMatches) -> DecoderConfig {
    let unknown_attributes = if matches.get_flag("keep-unknown-attributes") {
        UnknownAttributes::Keep
    } else {
        UnknownAttributes::Drop
    };
    DecoderConfig {
        unknown_attributes,
        ..DecoderConfig::default()
    }
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a String> {
    matches
        .get_one::<String>(name)
        .ok_or_else(|| Error::Usage(format!("Missing argument: {}", name)))
}
