//! The record index: merges delegation records of all registries into one
//! trie per address family.
use std::convert::TryFrom;
use std::io::BufRead;
use std::net::Ipv4Addr;
use crate::decompose;
use crate::delegations;
use crate::delegations::{DelegationRecord, Registry};
use crate::ip::{AddressFamily, IpPrefix, IpPrefixError};
use crate::trie;
use crate::trie::{Entries, PrefixTrie};


//------------ Delegation ----------------------------------------------------

/// What is kept of a record for every prefix it lands on.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Delegation {
    registry: Registry,
    country: String,
    date: String,
    status: String
}

impl Delegation {
    fn from_record(record: &DelegationRecord) -> Self {
        Delegation {
            registry: record.registry(),
            country: record.country().to_string(),
            date: record.date().to_string(),
            status: record.status().to_string()
        }
    }

    pub fn registry(&self) -> Registry { self.registry }
    pub fn country(&self) -> &str { &self.country }
    pub fn date(&self) -> &str { &self.date }
    pub fn status(&self) -> &str { &self.status }
}


//------------ Ipv4Delegation ------------------------------------------------

/// An IPv4 delegation attached to one fragment of its original block.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Ipv4Delegation {
    delegation: Delegation,
    block_start: Ipv4Addr,
    block_size: u64,
    used: u64
}

impl Ipv4Delegation {
    pub fn delegation(&self) -> &Delegation { &self.delegation }

    /// Start of the block as delegated, before decomposition.
    pub fn block_start(&self) -> Ipv4Addr { self.block_start }

    /// Address count of the block as delegated.
    pub fn block_size(&self) -> u64 { self.block_size }

    /// Addresses of the block covered by this fragment.
    pub fn used(&self) -> u64 { self.used }
}


//------------ IngestStats ---------------------------------------------------

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct IngestStats {
    pub lines: usize,
    pub records: usize,
    pub skipped: usize,
    pub rejected: usize,
    pub duplicates: usize
}


//------------ RecordIndex ---------------------------------------------------

#[derive(Clone, Debug)]
pub struct RecordIndex {
    v4: PrefixTrie<Ipv4Delegation>,
    v6: PrefixTrie<Delegation>
}

impl Default for RecordIndex {
    fn default() -> Self {
        RecordIndex {
            v4: PrefixTrie::new(AddressFamily::Ipv4),
            v6: PrefixTrie::new(AddressFamily::Ipv6)
        }
    }
}

impl RecordIndex {
    pub fn v4(&self) -> &PrefixTrie<Ipv4Delegation> { &self.v4 }
    pub fn v6(&self) -> &PrefixTrie<Delegation> { &self.v6 }

    /// Adds a record, returning the number of prefixes it landed on that
    /// already carried a delegation.
    ///
    /// All prefixes are computed before the first one is attached, so a
    /// failing record leaves the index untouched.
    pub fn ingest(&mut self, record: &DelegationRecord) -> Result<usize, Error> {
        match record.family() {
            AddressFamily::Ipv4 => self.ingest_v4(record),
            AddressFamily::Ipv6 => self.ingest_v6(record)
        }
    }

    fn ingest_v4(&mut self, record: &DelegationRecord) -> Result<usize, Error> {
        let start = u32::try_from(record.block_start()).map_err(|_| {
            IpPrefixError::AddressOutOfRange(AddressFamily::Ipv4)
        })?;
        let fragments = decompose::decompose(start, record.block_size())?;
        let delegation = Delegation::from_record(record);

        let mut duplicates = 0;
        for fragment in fragments {
            let prefix = fragment.prefix();
            let insertion = self.v4.insert_exact(&prefix)?;
            if insertion.existed {
                warn!("{} already in prefix index", prefix);
                duplicates += 1;
            }
            self.v4.attach(insertion.node, Ipv4Delegation {
                delegation: delegation.clone(),
                block_start: Ipv4Addr::from(start),
                block_size: record.block_size(),
                used: fragment.used()
            });
        }
        Ok(duplicates)
    }

    fn ingest_v6(&mut self, record: &DelegationRecord) -> Result<usize, Error> {
        if record.block_size() > 128 {
            return Err(Error::InvalidPrefix(IpPrefixError::LengthOutOfRange(
                AddressFamily::Ipv6, record.block_size() as u8
            )))
        }
        let prefix = IpPrefix::new(
            AddressFamily::Ipv6,
            record.block_start(),
            record.block_size() as u8
        )?;

        let insertion = self.v6.insert_exact(&prefix)?;
        if insertion.existed {
            warn!("{} already in prefix index", prefix);
        }
        self.v6.attach(insertion.node, Delegation::from_record(record));
        Ok(if insertion.existed { 1 } else { 0 })
    }

    /// Parses and ingests all lines of one stats source.
    ///
    /// Lines that are not IP records are skipped. Lines that are broken IP
    /// records are logged and skipped, unless `strict` is set, in which case
    /// the first one aborts with an error. Records ingested before that
    /// point stay in the index.
    pub fn ingest_lines<R: BufRead>(
        &mut self,
        mut reader: R,
        strict: bool
    ) -> Result<IngestStats, Error> {
        let mut stats = IngestStats::default();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break
            }
            stats.lines += 1;
            let line = String::from_utf8_lossy(&buf);

            let res = DelegationRecord::parse_line(&line)
                .map_err(Error::from)
                .and_then(|record| match record {
                    Some(record) => self.ingest(&record).map(Some),
                    None => Ok(None)
                });

            match res {
                Ok(Some(duplicates)) => {
                    stats.records += 1;
                    stats.duplicates += duplicates;
                }
                Ok(None) => stats.skipped += 1,
                Err(e) => {
                    if strict {
                        return Err(Error::Rejected(line.trim_end().to_string(), Box::new(e)))
                    }
                    warn!("skipping record '{}': {}", line.trim_end(), e);
                    stats.rejected += 1;
                }
            }
        }
        Ok(stats)
    }

    /// Returns the merged IPv4 and IPv6 rows in ascending prefix order.
    pub fn finalize(&self) -> (Rows<Ipv4Delegation>, Rows<Delegation>) {
        (Rows::new(&self.v4), Rows::new(&self.v6))
    }
}


//------------ Rows ----------------------------------------------------------

/// One output row: a prefix and one of the delegations attached to it.
#[derive(Clone, Copy, Debug)]
pub struct Row<'a, T> {
    pub prefix: IpPrefix,
    pub entry: &'a T
}

pub struct Rows<'a, T> {
    entries: Entries<'a, T>
}

impl<'a, T> Rows<'a, T> {
    fn new(trie: &'a PrefixTrie<T>) -> Self {
        Rows { entries: Entries::new(trie) }
    }
}

impl<'a, T> Iterator for Rows<'a, T> {
    type Item = Row<'a, T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next().map(|(prefix, entry)| Row { prefix, entry })
    }
}


//------------ Error --------------------------------------------------------

#[derive(Debug, Display)]
pub enum Error {
    #[display(fmt = "{}", _0)]
    Io(::std::io::Error),

    #[display(fmt = "{}", _0)]
    Record(delegations::Error),

    #[display(fmt = "{}", _0)]
    Block(decompose::Error),

    #[display(fmt = "{}", _0)]
    InvalidPrefix(IpPrefixError),

    #[display(fmt = "{}", _0)]
    Trie(trie::Error),

    #[display(fmt = "rejected '{}': {}", _0, _1)]
    Rejected(String, Box<Error>),
}

impl From<::std::io::Error> for Error {
    fn from(e: ::std::io::Error) -> Self { Error::Io(e) }
}

impl From<delegations::Error> for Error {
    fn from(e: delegations::Error) -> Self { Error::Record(e) }
}

impl From<decompose::Error> for Error {
    fn from(e: decompose::Error) -> Self { Error::Block(e) }
}

impl From<IpPrefixError> for Error {
    fn from(e: IpPrefixError) -> Self { Error::InvalidPrefix(e) }
}

impl From<trie::Error> for Error {
    fn from(e: trie::Error) -> Self { Error::Trie(e) }
}


//------------ Tests --------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn record(line: &str) -> DelegationRecord {
        DelegationRecord::parse_line(line).unwrap().unwrap()
    }

    fn pfx(s: &str) -> IpPrefix {
        IpPrefix::from_str(s).unwrap()
    }

    fn index_of(lines: &[&str]) -> RecordIndex {
        let mut index = RecordIndex::default();
        for line in lines {
            index.ingest(&record(line)).unwrap();
        }
        index
    }

    fn v4_rows(index: &RecordIndex) -> Vec<String> {
        index.finalize().0.map(|row| {
            format!(
                "{} {} {} {}/{}",
                row.prefix,
                row.entry.delegation().registry(),
                row.entry.used(),
                row.entry.block_start(),
                row.entry.block_size()
            )
        }).collect()
    }

    #[test]
    fn should_finalize_ipv6_record() {
        let index = index_of(&[
            "ripencc|NL|ipv6|2001:db8::|32|20200101|allocated"
        ]);
        let (v4, v6) = index.finalize();
        assert_eq!(0, v4.count());

        let rows: Vec<Row<Delegation>> = v6.collect();
        assert_eq!(1, rows.len());
        assert_eq!("2001:db8::/32", rows[0].prefix.to_string());
        assert_eq!(Registry::RipeNcc, rows[0].entry.registry());
        assert_eq!("20200101", rows[0].entry.date());
        assert_eq!("NL", rows[0].entry.country());
        assert_eq!("allocated", rows[0].entry.status());
    }

    #[test]
    fn should_finalize_ipv6_default_route() {
        let mut index = RecordIndex::default();
        let stats = index.ingest_lines(
            "ripencc|ZZ|ipv6|::|0|20200101|reserved\n".as_bytes(), false
        ).unwrap();
        assert_eq!(1, stats.records);
        assert_eq!(0, stats.rejected);

        let rows: Vec<Row<Delegation>> = index.finalize().1.collect();
        assert_eq!(1, rows.len());
        assert_eq!("::/0", rows[0].prefix.to_string());
        assert_eq!("reserved", rows[0].entry.status());
    }

    #[test]
    fn should_decompose_ipv4_records() {
        let index = index_of(&[
            "arin|US|ipv4|10.0.0.0|3|20000101|assigned"
        ]);
        assert_eq!(
            vec![
                "10.0.0.0/31 ARIN 2 10.0.0.0/3",
                "10.0.0.2/32 ARIN 1 10.0.0.0/3",
            ],
            v4_rows(&index)
        );
    }

    #[test]
    fn should_keep_both_copies_of_duplicate_record() {
        let line = "lacnic|BR|ipv4|200.0.0.0|768|20000101|allocated";
        let mut index = RecordIndex::default();
        assert_eq!(0, index.ingest(&record(line)).unwrap());
        assert_eq!(2, index.ingest(&record(line)).unwrap());

        for prefix in &["200.0.0.0/23", "200.0.2.0/24"] {
            let entries = index.v4().get_exact(&pfx(prefix)).unwrap();
            assert_eq!(2, entries.len());
            assert_eq!(entries[0], entries[1]);
        }
    }

    #[test]
    fn should_attach_overlapping_registries() {
        let index = index_of(&[
            "arin|US|ipv4|192.0.2.0|512|20000101|allocated",
            "ripencc|NL|ipv4|192.0.2.0|256|20100101|assigned",
        ]);
        let entries = index.v4().get_exact(&pfx("192.0.2.0/23")).unwrap();
        assert_eq!(1, entries.len());

        let index = index_of(&[
            "arin|US|ipv4|192.0.2.0|384|20000101|allocated",
            "ripencc|NL|ipv4|192.0.2.0|256|20100101|assigned",
        ]);
        let entries = index.v4().get_exact(&pfx("192.0.2.0/24")).unwrap();
        let registries: Vec<Registry> = entries.iter()
            .map(|e| e.delegation().registry())
            .collect();
        assert_eq!(vec![Registry::Arin, Registry::RipeNcc], registries);
    }

    #[test]
    fn should_order_independent_of_ingestion() {
        let lines = [
            "afrinic|ZA|ipv4|41.0.0.0|1536|20080101|allocated",
            "apnic|AU|ipv4|1.0.0.0|256|20110811|assigned",
            "ripencc|NL|ipv4|193.0.0.0|2048|19930901|allocated",
            "arin|US|ipv4|3.0.0.0|16777216|19880223|allocated",
            "lacnic|BR|ipv4|200.0.0.0|768|20000101|allocated",
        ];
        let forward = v4_rows(&index_of(&lines));
        let mut reversed = lines.to_vec();
        reversed.reverse();
        let backward = v4_rows(&index_of(&reversed));

        assert_eq!(forward, backward);
        assert_eq!("1.0.0.0/24 APNIC 256 1.0.0.0/256", forward[0]);
        assert_eq!(7, forward.len());
    }

    #[test]
    fn should_leave_index_untouched_on_error() {
        let mut index = RecordIndex::default();
        let bad = DelegationRecord::new(
            Registry::Arin, "US", AddressFamily::Ipv4,
            0xffff_ff00, 512, "20000101", "allocated"
        ).unwrap();
        assert!(index.ingest(&bad).is_err());
        assert_eq!(1, index.v4().node_count());

        let bad = DelegationRecord::new(
            Registry::Arin, "US", AddressFamily::Ipv6,
            1, 64, "20000101", "allocated"
        ).unwrap();
        assert!(index.ingest(&bad).is_err());
        assert_eq!(1, index.v6().node_count());
    }

    #[test]
    fn should_ingest_lines() {
        let data = "\
2|lacnic|20200101|3|19870101|20191231|-0300
lacnic|*|ipv4|*|2|summary
lacnic|BR|ipv4|200.0.0.0|768|20000101|allocated
lacnic|BR|asn|28000|1|20000101|allocated
lacnic|BR|ipv4|200.0.0.|256|20000101|allocated
lacnic|AR|ipv6|2800::|12|20000101|allocated
";
        let mut index = RecordIndex::default();
        let stats = index.ingest_lines(data.as_bytes(), false).unwrap();
        assert_eq!(
            IngestStats {
                lines: 6, records: 2, skipped: 3, rejected: 1, duplicates: 0
            },
            stats
        );
        assert_eq!(2, index.finalize().0.count());
        assert_eq!(1, index.finalize().1.count());

        let mut index = RecordIndex::default();
        assert!(index.ingest_lines(data.as_bytes(), true).is_err());
    }
}
