extern crate clap;
#[macro_use] extern crate derive_more;
extern crate env_logger;
extern crate nro_merge;

use clap::App;
use clap::Arg;
use clap::ArgMatches;
use clap::SubCommand;
use nro_merge::merge;
use nro_merge::merge::{LocateOpts, Merge, MergeOpts};


fn main() {
    let matches = Options::matches();
    init_logging(&matches);

    let res = match Options::create(&matches) {
        Err(e) => Err(e),
        Ok(Options::Merge(opts)) => {
            Merge::execute(&opts)
                .map(|report| {
                    println!("{}", report.v4_file.display());
                    println!("{}", report.v6_file.display());
                })
                .map_err(Error::MergeError)
        }
        Ok(Options::Locate(opts)) => {
            opts.execute().map_err(Error::MergeError)
        }
    };

    if let Err(e) = res {
        eprintln!("Failed to retrieve and merge NRO statistics: {}", e);
        ::std::process::exit(1);
    }
}

fn init_logging(matches: &ArgMatches) {
    let verbose = matches.subcommand()
        .1
        .map(|sub| sub.is_present("verbose"))
        .unwrap_or(false);
    let default = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default)
    ).init();
}

enum Options {
    Merge(MergeOpts),
    Locate(LocateOpts)
}

impl Options {
    fn matches() -> ArgMatches<'static> {
        let date = Arg::with_name("date")
            .short("d")
            .long("date")
            .value_name("DATE")
            .help("Day to merge, as yyyy-mm-dd or yyyymmdd.")
            .required(true);

        let verbose = Arg::with_name("verbose")
            .short("v")
            .long("verbose")
            .help("Log debug output.");

        App::new("NLnet Labs NRO stats merger")
            .version("0.1.0")
            .about("Merges the delegated stats of the five RIRs")
            .subcommand(SubCommand::with_name("merge")
                .about("Merge the stats of all registries for one day")
                .arg(date.clone())
                .arg(Arg::with_name("output")
                    .short("o")
                    .long("output")
                    .value_name("DIR")
                    .help("Directory to write the merged files to.")
                    .required(true))
                .arg(Arg::with_name("archive-dir")
                    .short("a")
                    .long("archive-dir")
                    .value_name("DIR")
                    .help("Local mirror of the stats archive. \
                           Default: fetch over HTTP")
                    .required(false))
                .arg(Arg::with_name("base-url")
                    .short("u")
                    .long("base-url")
                    .value_name("URL")
                    .help("Base URL of the stats archive. \
                           Default: https://ftp.ripe.net/pub/stats")
                    .conflicts_with("archive-dir")
                    .required(false))
                .arg(Arg::with_name("format")
                    .short("f")
                    .long("format")
                    .value_name("csv | json")
                    .help("Specify output format, defaults to csv")
                    .required(false))
                .arg(Arg::with_name("strict")
                    .long("strict")
                    .help("Abort on the first malformed delegation record."))
                .arg(verbose.clone())
            )
            .subcommand(SubCommand::with_name("locate")
                .about("Show where each registry's stats for a day are archived")
                .arg(date)
                .arg(verbose)
            )
            .get_matches()
    }

    fn create(matches: &ArgMatches) -> Result<Self, Error> {
        if let Some(opts) = matches.subcommand_matches("merge") {
            Ok(Options::Merge(MergeOpts::parse(opts)?))
        } else if let Some(opts) = matches.subcommand_matches("locate") {
            Ok(Options::Locate(LocateOpts::parse(opts)?))
        } else {
            Err(Error::msg("No sub-command given. See --help for options."))
        }
    }
}


//------------ Error --------------------------------------------------------

#[derive(Debug, Display)]
pub enum Error {
    #[display(fmt = "{}", _0)]
    WithMessage(String),

    #[display(fmt = "{}", _0)]
    MergeError(merge::Error),
}

impl Error {
    pub fn msg(s: &str) -> Self {
        Error::WithMessage(s.to_string())
    }
}

impl From<merge::Error> for Error {
    fn from(e: merge::Error) -> Self { Error::MergeError(e) }
}
