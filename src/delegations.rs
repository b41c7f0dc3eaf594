//! Parse delegated (extended) stats lines
//!
//! Each registry publishes a `|` separated file with version, summary and
//! record lines. Only IPv4 and IPv6 records are of interest here:
//!
//! `registry|cc|type|start|value|date|status[|extensions...]`
use std::fmt;
use std::fmt::Display;
use std::num::ParseIntError;
use std::str::FromStr;
use crate::ip::{AddressFamily, IpPrefixError};


//------------ Registry -----------------------------------------------------

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Registry {
    Afrinic,
    Arin,
    Apnic,
    Lacnic,
    RipeNcc
}

impl Registry {
    /// All registries, in the order their sources are merged.
    pub const ALL: [Registry; 5] = [
        Registry::Afrinic,
        Registry::Arin,
        Registry::Apnic,
        Registry::Lacnic,
        Registry::RipeNcc,
    ];

    /// The lower case token used in the stats files and archive paths.
    pub fn token(self) -> &'static str {
        match self {
            Registry::Afrinic => "afrinic",
            Registry::Arin    => "arin",
            Registry::Apnic   => "apnic",
            Registry::Lacnic  => "lacnic",
            Registry::RipeNcc => "ripencc"
        }
    }
}

impl FromStr for Registry {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "afrinic" => Ok(Registry::Afrinic),
            "arin"    => Ok(Registry::Arin),
            "apnic"   => Ok(Registry::Apnic),
            "lacnic"  => Ok(Registry::Lacnic),
            "ripencc" => Ok(Registry::RipeNcc),
            _ => Err(Error::UnknownRegistry(s.to_string()))
        }
    }
}

impl fmt::Display for Registry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.token().to_uppercase())
    }
}


//------------ DelegationRecord ---------------------------------------------

/// A single IPv4 or IPv6 delegation.
///
/// For IPv4 `block_size` is an address count, for IPv6 a prefix length.
/// Only an IPv4 block can be empty; an IPv6 length of 0 is `::/0`.
/// The start address is kept right aligned, see `ip::AddressFamily`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DelegationRecord {
    registry: Registry,
    country: String,
    family: AddressFamily,
    block_start: u128,
    block_size: u64,
    date: String,
    status: String
}

impl DelegationRecord {
    pub fn new(
        registry: Registry,
        country: &str,
        family: AddressFamily,
        block_start: u128,
        block_size: u64,
        date: &str,
        status: &str
    ) -> Result<Self, Error> {
        if family == AddressFamily::Ipv4 && block_size == 0 {
            return Err(Error::EmptyBlock)
        }
        Ok(DelegationRecord {
            registry,
            country: country.to_string(),
            family,
            block_start,
            block_size,
            date: date.to_string(),
            status: status.to_string()
        })
    }

    pub fn registry(&self) -> Registry { self.registry }
    pub fn country(&self) -> &str { &self.country }
    pub fn family(&self) -> AddressFamily { self.family }
    pub fn block_start(&self) -> u128 { self.block_start }
    pub fn block_size(&self) -> u64 { self.block_size }
    pub fn date(&self) -> &str { &self.date }
    pub fn status(&self) -> &str { &self.status }

    /// Parses one line of a stats file.
    ///
    /// Returns `Ok(None)` for anything that is not an IPv4 or IPv6 record
    /// line: version and summary lines, ASN records, comments, short lines.
    /// A line that claims to be an IP record but does not parse is an
    /// error.
    pub fn parse_line(line: &str) -> Result<Option<Self>, Error> {
        let line = line.trim_end_matches(|c| c == '\r' || c == '\n');
        let fields: Vec<&str> = line.split('|').collect();

        if fields.len() < 7 {
            return Ok(None)
        }
        let family = match AddressFamily::from_str(fields[2]) {
            Ok(family) => family,
            Err(_) => return Ok(None)
        };

        let registry = Registry::from_str(fields[0])?;
        let block_start = family.parse_address(fields[3])?;
        let block_size = match family {
            AddressFamily::Ipv4 => u64::from_str(fields[4])?,
            AddressFamily::Ipv6 => u64::from(u8::from_str(fields[4])?)
        };

        DelegationRecord::new(
            registry, fields[1], family, block_start, block_size,
            fields[5], fields[6]
        ).map(Some)
    }
}

impl fmt::Display for DelegationRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}|{}|{}|{}",
            self.registry.token(),
            self.country,
            self.family,
            self.family.format_address(self.block_start),
            self.block_size,
            self.date,
            self.status
        )
    }
}


//------------ Error --------------------------------------------------------

#[derive(Debug, Display)]
pub enum Error {
    #[display(fmt = "unknown registry: {}", _0)]
    UnknownRegistry(String),

    #[display(fmt = "delegation of zero size")]
    EmptyBlock,

    #[display(fmt = "Error parsing delegation: {}", _0)]
    ParseError(String),
}

impl Error {
    fn parse_error(e: impl Display) -> Self {
        Error::ParseError(format!("{}", e))
    }
}

impl From<IpPrefixError> for Error {
    fn from(e: IpPrefixError) -> Self { Self::parse_error(e) }
}

impl From<ParseIntError> for Error {
    fn from(e: ParseIntError) -> Self { Self::parse_error(e) }
}


//------------ Tests --------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Option<DelegationRecord> {
        DelegationRecord::parse_line(line).unwrap()
    }

    #[test]
    fn should_parse_ipv4_record() {
        let rec = parse(
            "ripencc|NL|ipv4|193.0.0.0|2048|19930901|allocated|a1b2c3|e-stats"
        ).unwrap();
        assert_eq!(Registry::RipeNcc, rec.registry());
        assert_eq!("NL", rec.country());
        assert_eq!(AddressFamily::Ipv4, rec.family());
        assert_eq!(0xc100_0000, rec.block_start());
        assert_eq!(2048, rec.block_size());
        assert_eq!("19930901", rec.date());
        assert_eq!("allocated", rec.status());
    }

    #[test]
    fn should_parse_ipv6_record() {
        let rec = parse("apnic|AU|ipv6|2001:db8::|32|20200101|allocated\r\n")
            .unwrap();
        assert_eq!(Registry::Apnic, rec.registry());
        assert_eq!(AddressFamily::Ipv6, rec.family());
        assert_eq!(32, rec.block_size());
        assert_eq!("allocated", rec.status());
        assert_eq!(
            "apnic|AU|ipv6|2001:db8::|32|20200101|allocated",
            rec.to_string()
        );
    }

    #[test]
    fn should_skip_non_record_lines() {
        assert_eq!(None, parse("2|apnic|20200101|63553|19830613|20191231|+1000"));
        assert_eq!(None, parse("apnic|*|ipv4|*|31427|summary"));
        assert_eq!(None, parse("apnic|JP|asn|173|1|20020801|allocated"));
        assert_eq!(None, parse("# comment"));
        assert_eq!(None, parse(""));
        assert_eq!(None, parse("arin|US|ipv4|3.0.0.0|16777216|19880223"));
    }

    #[test]
    fn should_reject_broken_records() {
        assert!(DelegationRecord::parse_line(
            "iana|ZZ|ipv4|0.0.0.0|16777216|19810101|reserved"
        ).is_err());
        assert!(DelegationRecord::parse_line(
            "arin|US|ipv4|3.0.0|256|19880223|allocated"
        ).is_err());
        assert!(DelegationRecord::parse_line(
            "arin|US|ipv4|3.0.0.0|-1|19880223|allocated"
        ).is_err());
        assert!(DelegationRecord::parse_line(
            "arin|US|ipv4|3.0.0.0|0|19880223|allocated"
        ).is_err());
        assert!(DelegationRecord::parse_line(
            "arin|US|ipv6|2001:db8::|300|19880223|allocated"
        ).is_err());
    }

    #[test]
    fn should_accept_ipv6_default_route() {
        let rec = parse("ripencc|ZZ|ipv6|::|0|20200101|reserved").unwrap();
        assert_eq!(AddressFamily::Ipv6, rec.family());
        assert_eq!(0, rec.block_start());
        assert_eq!(0, rec.block_size());
    }

    #[test]
    fn should_read_registry_tokens() {
        for reg in Registry::ALL.iter() {
            assert_eq!(*reg, Registry::from_str(reg.token()).unwrap());
        }
        assert_eq!(Registry::RipeNcc, Registry::from_str("RIPENCC").unwrap());
        assert_eq!("RIPENCC", Registry::RipeNcc.to_string());
        assert_eq!("AFRINIC", Registry::Afrinic.to_string());
    }
}
