//! Merging the stats of all registries for one day.
use std::fs::File;
use std::io;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use chrono::NaiveDate;
use clap::ArgMatches;
use crate::archive;
use crate::archive::ArchiveLocation;
use crate::delegations::Registry;
use crate::fetch;
use crate::fetch::Archive;
use crate::index;
use crate::index::{IngestStats, RecordIndex};
use crate::ip::AddressFamily;
use crate::output;
use crate::output::{Ipv4Line, Ipv6Line, OutputFormat};


/// Parses `yyyy-mm-dd` or `yyyymmdd`.
pub fn parse_day(s: &str) -> Result<NaiveDate, Error> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y%m%d"))
        .map_err(|_| Error::InvalidDate(s.to_string()))
}


//------------ ArchiveOpts ---------------------------------------------------

/// Where to take the stats files from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ArchiveOpts {
    Remote(String),
    Local(PathBuf)
}

impl ArchiveOpts {
    fn parse(matches: &ArgMatches) -> Self {
        if let Some(dir) = matches.value_of("archive-dir") {
            ArchiveOpts::Local(PathBuf::from(dir))
        } else {
            let url = matches.value_of("base-url")
                .unwrap_or(fetch::DEFAULT_BASE_URL);
            ArchiveOpts::Remote(url.to_string())
        }
    }

    fn open(&self) -> Result<Archive, Error> {
        match self {
            ArchiveOpts::Remote(url) => Ok(Archive::remote(url)?),
            ArchiveOpts::Local(dir) => Ok(Archive::local(dir.clone()))
        }
    }
}


//------------ MergeOpts -----------------------------------------------------

/// Options for the Merge
#[derive(Clone, Debug)]
pub struct MergeOpts {
    day: NaiveDate,
    output: PathBuf,
    archive: ArchiveOpts,
    format: OutputFormat,
    strict: bool
}

impl MergeOpts {
    pub fn new(
        day: NaiveDate,
        output: PathBuf,
        archive: ArchiveOpts,
        format: OutputFormat,
        strict: bool
    ) -> Self {
        MergeOpts { day, output, archive, format, strict }
    }

    pub fn parse(matches: &ArgMatches) -> Result<Self, Error> {
        let day = parse_day(matches.value_of("date").unwrap_or_default())?;

        let output = matches.value_of("output")
            .map(PathBuf::from)
            .ok_or_else(|| Error::msg("No output directory given"))?;

        let archive = ArchiveOpts::parse(matches);

        let format = match matches.value_of("format") {
            Some(format) => OutputFormat::from_str(format)?,
            None => OutputFormat::Csv
        };

        let strict = matches.is_present("strict");

        Ok(MergeOpts { day, output, archive, format, strict })
    }
}


//------------ MergeReport ---------------------------------------------------

/// What a merge produced.
#[derive(Clone, Debug)]
pub struct MergeReport {
    pub v4_file: PathBuf,
    pub v6_file: PathBuf,
    pub v4_rows: usize,
    pub v6_rows: usize,
    pub sources: Vec<(Registry, Option<IngestStats>)>
}


//------------ Merge ---------------------------------------------------------

/// Fetches the stats of all registries for a day, merges them and writes
/// the consolidated IPv4 and IPv6 files.
pub struct Merge;

impl Merge {
    pub fn execute(options: &MergeOpts) -> Result<MergeReport, Error> {
        let archive = options.archive.open()?;
        let mut index = RecordIndex::default();
        let mut sources = Vec::new();

        for registry in Registry::ALL.iter() {
            let stats = Self::ingest_registry(
                &archive, &mut index, *registry, options
            )?;
            sources.push((*registry, stats));
        }

        Self::write(&index, options, sources)
    }

    fn ingest_registry(
        archive: &Archive,
        index: &mut RecordIndex,
        registry: Registry,
        options: &MergeOpts
    ) -> Result<Option<IngestStats>, Error> {
        let location = match ArchiveLocation::locate(registry, options.day)? {
            Some(location) => location,
            None => return Ok(None)
        };

        let reader = archive.open(&location)?;
        let stats = index.ingest_lines(reader, options.strict)?;

        info!(
            "Parsed {} stats for {}: {} records, {} other lines, \
             {} rejected, {} duplicate prefixes",
            registry,
            options.day,
            stats.records,
            stats.skipped,
            stats.rejected,
            stats.duplicates
        );
        Ok(Some(stats))
    }

    fn write(
        index: &RecordIndex,
        options: &MergeOpts,
        sources: Vec<(Registry, Option<IngestStats>)>
    ) -> Result<MergeReport, Error> {
        let v4_file = options.output.join(
            options.format.file_name(options.day, AddressFamily::Ipv4)
        );
        let v6_file = options.output.join(
            options.format.file_name(options.day, AddressFamily::Ipv6)
        );
        let (v4, v6) = index.finalize();

        info!("Writing IPv4 stats to {}", v4_file.display());
        let v4_rows = output::write_rows(
            Self::create(&v4_file)?, v4.map(Ipv4Line::from), options.format
        )?;

        info!("Writing IPv6 stats to {}", v6_file.display());
        let v6_rows = output::write_rows(
            Self::create(&v6_file)?, v6.map(Ipv6Line::from), options.format
        )?;

        info!("Wrote {} IPv4 and {} IPv6 rows", v4_rows, v6_rows);
        Ok(MergeReport { v4_file, v6_file, v4_rows, v6_rows, sources })
    }

    fn create(path: &Path) -> Result<BufWriter<File>, Error> {
        let file = File::create(path).map_err(|e| {
            Error::CannotWrite(path.to_string_lossy().to_string(), e)
        })?;
        Ok(BufWriter::new(file))
    }
}


//------------ LocateOpts ----------------------------------------------------

/// Options for listing archive locations.
pub struct LocateOpts {
    day: NaiveDate
}

impl LocateOpts {
    pub fn parse(matches: &ArgMatches) -> Result<Self, Error> {
        let day = parse_day(matches.value_of("date").unwrap_or_default())?;
        Ok(LocateOpts { day })
    }

    /// Prints where each registry's file for the day is found.
    pub fn execute(&self) -> Result<(), Error> {
        for registry in Registry::ALL.iter() {
            match ArchiveLocation::locate(*registry, self.day)? {
                Some(location) => println!("{}", location),
                None => println!("{}: not archived on {}", registry, self.day)
            }
        }
        Ok(())
    }
}


//------------ Error --------------------------------------------------------

#[derive(Debug, Display)]
pub enum Error {
    #[display(fmt = "{}", _0)]
    WithMessage(String),

    #[display(fmt = "Invalid date: {}. Use yyyy-mm-dd or yyyymmdd", _0)]
    InvalidDate(String),

    #[display(fmt = "Cannot write file {}: {}", _0, _1)]
    CannotWrite(String, io::Error),

    #[display(fmt = "{}", _0)]
    Archive(archive::Error),

    #[display(fmt = "{}", _0)]
    Fetch(fetch::Error),

    #[display(fmt = "{}", _0)]
    Index(index::Error),

    #[display(fmt = "{}", _0)]
    Output(output::Error),
}

impl Error {
    pub fn msg(s: &str) -> Self {
        Error::WithMessage(s.to_string())
    }
}

impl From<archive::Error> for Error {
    fn from(e: archive::Error) -> Self { Error::Archive(e) }
}

impl From<fetch::Error> for Error {
    fn from(e: fetch::Error) -> Self { Error::Fetch(e) }
}

impl From<index::Error> for Error {
    fn from(e: index::Error) -> Self { Error::Index(e) }
}

impl From<output::Error> for Error {
    fn from(e: output::Error) -> Self { Error::Output(e) }
}


//------------ Tests --------------------------------------------------------
