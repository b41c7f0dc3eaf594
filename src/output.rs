//! Writing the merged rows as CSV or JSON.
use std::io;
use std::io::Write;
use std::str::FromStr;
use chrono::NaiveDate;
use serde::Serialize;
use crate::delegations::Registry;
use crate::index::{Delegation, Ipv4Delegation, Row};
use crate::ip::AddressFamily;


//------------ OutputFormat --------------------------------------------------

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OutputFormat {
    Csv,
    Json
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json"
        }
    }

    /// The name of the output file for one family of a day's merge.
    pub fn file_name(self, day: NaiveDate, family: AddressFamily) -> String {
        let suffix = match family {
            AddressFamily::Ipv4 => "v4",
            AddressFamily::Ipv6 => "v6"
        };
        format!(
            "nrostats-{}-{}.{}",
            day.format("%Y%m%d"), suffix, self.extension()
        )
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            f => Err(Error::UnsupportedFormat(f.to_string()))
        }
    }
}


//------------ OutputRow -----------------------------------------------------

/// A row that can be written in either output format.
///
/// The CSV header is written even when there are no rows, so it cannot be
/// taken from the first serialized row.
pub trait OutputRow: Serialize {
    const CSV_HEADER: &'static [&'static str];
}


//------------ Ipv4Line ------------------------------------------------------

#[derive(Clone, Debug, Serialize)]
pub struct Ipv4Line<'a> {
    prefix: String,
    rir: Registry,
    date: &'a str,
    country_code: &'a str,
    status: &'a str,
    block_start: String,
    block_ip_count: u64
}

impl<'a> From<Row<'a, Ipv4Delegation>> for Ipv4Line<'a> {
    fn from(row: Row<'a, Ipv4Delegation>) -> Self {
        let delegation = row.entry.delegation();
        Ipv4Line {
            prefix: row.prefix.to_string(),
            rir: delegation.registry(),
            date: delegation.date(),
            country_code: delegation.country(),
            status: delegation.status(),
            block_start: row.entry.block_start().to_string(),
            block_ip_count: row.entry.block_size()
        }
    }
}

impl<'a> OutputRow for Ipv4Line<'a> {
    const CSV_HEADER: &'static [&'static str] = &[
        "prefix", "rir", "date", "country_code", "status",
        "block_start", "block_ip_count"
    ];
}


//------------ Ipv6Line ------------------------------------------------------

#[derive(Clone, Debug, Serialize)]
pub struct Ipv6Line<'a> {
    prefix: String,
    rir: Registry,
    date: &'a str,
    country_code: &'a str,
    status: &'a str
}

impl<'a> From<Row<'a, Delegation>> for Ipv6Line<'a> {
    fn from(row: Row<'a, Delegation>) -> Self {
        Ipv6Line {
            prefix: row.prefix.to_string(),
            rir: row.entry.registry(),
            date: row.entry.date(),
            country_code: row.entry.country(),
            status: row.entry.status()
        }
    }
}

impl<'a> OutputRow for Ipv6Line<'a> {
    const CSV_HEADER: &'static [&'static str] = &[
        "prefix", "rir", "date", "country_code", "status"
    ];
}


//------------ write_rows ----------------------------------------------------

/// Writes all rows in the given format and returns how many were written.
pub fn write_rows<W, R, I>(
    mut writer: W,
    rows: I,
    format: OutputFormat
) -> Result<usize, Error>
where W: Write, R: OutputRow, I: IntoIterator<Item = R> {
    let mut count = 0;
    match format {
        OutputFormat::Csv => {
            let mut wtr = csv::WriterBuilder::new()
                .has_headers(false)
                .terminator(csv::Terminator::Any(b'\n'))
                .from_writer(&mut writer);
            wtr.write_record(R::CSV_HEADER)?;
            for row in rows {
                wtr.serialize(row)?;
                count += 1;
            }
            wtr.flush()?;
        }
        OutputFormat::Json => {
            write!(writer, "[")?;
            for row in rows {
                if count > 0 {
                    write!(writer, ",")?;
                }
                writeln!(writer)?;
                serde_json::to_writer(&mut writer, &row)?;
                count += 1;
            }
            writeln!(writer, "\n]")?;
        }
    }
    writer.flush()?;
    Ok(count)
}


//------------ Error --------------------------------------------------------

#[derive(Debug, Display)]
pub enum Error {
    #[display(fmt = "Unsupported format: {}. Supported are: csv|json", _0)]
    UnsupportedFormat(String),

    #[display(fmt = "{}", _0)]
    Io(io::Error),

    #[display(fmt = "{}", _0)]
    CsvError(csv::Error),

    #[display(fmt = "{}", _0)]
    JsonError(serde_json::Error),
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self { Error::Io(e) }
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self { Error::CsvError(e) }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self { Error::JsonError(e) }
}


//------------ Tests --------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegations::DelegationRecord;
    use crate::index::RecordIndex;

    fn index_of(lines: &[&str]) -> RecordIndex {
        let mut index = RecordIndex::default();
        for line in lines {
            let record = DelegationRecord::parse_line(line).unwrap().unwrap();
            index.ingest(&record).unwrap();
        }
        index
    }

    fn written<R: OutputRow, I: IntoIterator<Item = R>>(
        rows: I,
        format: OutputFormat
    ) -> String {
        let mut buf = Vec::new();
        write_rows(&mut buf, rows, format).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn should_name_files() {
        let day = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        assert_eq!(
            "nrostats-20200101-v4.csv",
            OutputFormat::Csv.file_name(day, AddressFamily::Ipv4)
        );
        assert_eq!(
            "nrostats-20200101-v6.json",
            OutputFormat::Json.file_name(day, AddressFamily::Ipv6)
        );
        assert!(OutputFormat::from_str("html").is_err());
    }

    #[test]
    fn should_write_ipv4_csv() {
        let index = index_of(&[
            "arin|US|ipv4|10.0.0.0|3|20000101|assigned",
        ]);
        let rows = index.finalize().0.map(Ipv4Line::from);
        assert_eq!(
            "prefix,rir,date,country_code,status,block_start,block_ip_count\n\
             10.0.0.0/31,ARIN,20000101,US,assigned,10.0.0.0,3\n\
             10.0.0.2/32,ARIN,20000101,US,assigned,10.0.0.0,3\n",
            written(rows, OutputFormat::Csv)
        );
    }

    #[test]
    fn should_write_ipv6_csv() {
        let index = index_of(&[
            "ripencc|NL|ipv6|2001:db8::|32|20200101|allocated",
        ]);
        let rows = index.finalize().1.map(Ipv6Line::from);
        assert_eq!(
            "prefix,rir,date,country_code,status\n\
             2001:db8::/32,RIPENCC,20200101,NL,allocated\n",
            written(rows, OutputFormat::Csv)
        );
    }

    #[test]
    fn should_quote_csv_fields() {
        let index = index_of(&[
            "ripencc|NL|ipv6|2001:db8::|32|20200101|allocated, \"pending\"",
        ]);
        let rows = index.finalize().1.map(Ipv6Line::from);
        assert_eq!(
            "prefix,rir,date,country_code,status\n\
             2001:db8::/32,RIPENCC,20200101,NL,\"allocated, \"\"pending\"\"\"\n",
            written(rows, OutputFormat::Csv)
        );
    }

    #[test]
    fn should_write_csv_header_without_rows() {
        let index = RecordIndex::default();
        let rows = index.finalize().0.map(Ipv4Line::from);
        assert_eq!(
            "prefix,rir,date,country_code,status,block_start,block_ip_count\n",
            written(rows, OutputFormat::Csv)
        );
    }

    #[test]
    fn should_write_json() {
        let index = index_of(&[
            "ripencc|NL|ipv6|2001:db8::|32|20200101|allocated",
            "apnic|AU|ipv6|2001:db8::|32|20200102|assigned",
        ]);
        let rows = index.finalize().1.map(Ipv6Line::from);
        let json: serde_json::Value = serde_json::from_str(
            &written(rows, OutputFormat::Json)
        ).unwrap();

        let rows = json.as_array().unwrap();
        assert_eq!(2, rows.len());
        assert_eq!("2001:db8::/32", rows[0]["prefix"]);
        assert_eq!("RIPENCC", rows[0]["rir"]);
        assert_eq!("APNIC", rows[1]["rir"]);
        assert_eq!("20200102", rows[1]["date"]);
    }

    #[test]
    fn should_write_empty_json_array() {
        let index = RecordIndex::default();
        let rows = index.finalize().1.map(Ipv6Line::from);
        assert_eq!("[\n]\n", written(rows, OutputFormat::Json));
    }
}
