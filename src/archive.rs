//! Where the historical stats of each registry live.
//!
//! The RIPE NCC mirrors the stats files of all five registries, but the
//! layout of that archive changed over the years and some days are simply
//! absent. All of that is expressed as data in the tables below; `locate`
//! only interprets them.
use std::fmt;
use chrono::{Datelike, NaiveDate};
use crate::delegations::Registry;


//------------ Compression ---------------------------------------------------

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Compression {
    Plain,
    Gzip,
    Bzip2
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Compression::Plain => write!(f, "plain"),
            Compression::Gzip  => write!(f, "gzip"),
            Compression::Bzip2 => write!(f, "bzip2")
        }
    }
}


//------------ Tables --------------------------------------------------------

/// A day written as `yyyymmdd`.
type Day = u32;

/// A naming scheme in use up to and including `until`.
///
/// Path templates are relative to the archive base and may use `{year}`
/// for the year directory, `{date}` for `yyyymmdd` and `{dashed}` for
/// `yyyy-mm-dd`.
struct Era {
    until: Option<Day>,
    path: &'static str,
    compression: Compression
}

struct SourceTable {
    /// First day present in the archive.
    first_day: Day,

    /// Inclusive ranges of absent days, and the day used instead.
    missing: &'static [(Day, Day, Day)],

    /// Days whose file sits in the directory of another year.
    year_dirs: &'static [(Day, i32)],

    /// Naming schemes, oldest first.
    eras: &'static [Era]
}

static AFRINIC: SourceTable = SourceTable {
    first_day: 2005_03_03,
    missing: &[
        (2011_01_01, 2011_05_15, 2011_05_16),
        (2014_12_31, 2015_01_06, 2015_01_07),
        (2015_12_31, 2016_01_04, 2016_01_05),
        (2016_12_31, 2016_12_31, 2017_01_01),
        (2017_12_31, 2018_01_03, 2018_01_04),
    ],
    year_dirs: &[
        (2012_12_31, 2013),
    ],
    eras: &[
        Era {
            until: None,
            path: "afrinic/{year}/delegated-afrinic-{date}",
            compression: Compression::Plain
        },
    ]
};

static ARIN: SourceTable = SourceTable {
    first_day: 2003_11_20,
    missing: &[
        (2019_08_25, 2019_08_25, 2019_08_26),
    ],
    year_dirs: &[],
    eras: &[
        Era {
            until: Some(2007_09_30),
            path: "arin/archive/{year}/delegated-arin-{date}.gz",
            compression: Compression::Gzip
        },
        Era {
            until: Some(2013_03_04),
            path: "arin/archive/{year}/delegated-arin-{date}",
            compression: Compression::Plain
        },
        Era {
            until: Some(2016_12_31),
            path: "arin/archive/{year}/delegated-arin-extended-{date}",
            compression: Compression::Plain
        },
        Era {
            until: None,
            path: "arin/delegated-arin-extended-{date}",
            compression: Compression::Plain
        },
    ]
};

static APNIC: SourceTable = SourceTable {
    first_day: 2001_05_01,
    missing: &[
        (2001_05_02, 2001_05_31, 2001_06_01),
        (2001_06_02, 2001_08_31, 2001_09_01),
        (2001_09_02, 2001_09_30, 2001_10_01),
        (2001_10_02, 2001_10_31, 2001_11_01),
        (2001_11_02, 2001_11_30, 2001_12_01),
        (2001_12_02, 2001_12_31, 2002_01_01),
        (2002_01_02, 2002_01_31, 2002_02_01),
        (2002_02_02, 2002_02_28, 2002_03_01),
        (2002_03_02, 2002_03_31, 2002_04_01),
        (2002_04_02, 2002_04_30, 2002_05_01),
        (2002_05_02, 2002_05_31, 2002_06_01),
        (2002_06_02, 2002_06_30, 2002_07_01),
        (2002_07_02, 2002_07_31, 2002_08_01),
        (2002_08_02, 2002_08_31, 2002_09_01),
        (2002_09_02, 2002_09_30, 2002_10_01),
        (2002_10_02, 2002_10_31, 2002_11_01),
        (2002_11_02, 2002_11_30, 2002_12_01),
        (2002_12_02, 2002_12_31, 2003_01_01),
        (2003_01_02, 2003_01_31, 2003_02_01),
        (2003_02_02, 2003_02_28, 2003_03_01),
        (2003_03_02, 2003_03_31, 2003_04_01),
        (2003_04_02, 2003_04_30, 2003_05_01),
        (2003_05_02, 2003_05_07, 2003_05_08),
    ],
    year_dirs: &[
        (2010_12_31, 2011),
        (2011_12_31, 2012),
        (2012_12_31, 2013),
        (2013_12_31, 2014),
        (2014_12_31, 2015),
        (2015_12_31, 2016),
        (2016_12_31, 2017),
        (2017_12_31, 2018),
        (2018_12_31, 2019),
    ],
    eras: &[
        Era {
            until: Some(2003_10_08),
            path: "apnic/{year}/apnic-{dashed}.gz",
            compression: Compression::Gzip
        },
        Era {
            until: None,
            path: "apnic/{year}/delegated-apnic-{date}.gz",
            compression: Compression::Gzip
        },
    ]
};

static LACNIC: SourceTable = SourceTable {
    first_day: 2004_01_01,
    missing: &[
        (2018_09_26, 2018_09_26, 2018_09_27),
        (2018_11_10, 2018_11_10, 2018_11_11),
        (2019_12_21, 2019_12_21, 2019_12_22),
        (2020_04_22, 2020_04_22, 2020_04_23),
    ],
    year_dirs: &[],
    eras: &[
        Era {
            until: None,
            path: "lacnic/delegated-lacnic-{date}",
            compression: Compression::Plain
        },
    ]
};

static RIPENCC: SourceTable = SourceTable {
    first_day: 2003_11_26,
    missing: &[],
    year_dirs: &[
        (2004_01_01, 2003),
    ],
    eras: &[
        Era {
            until: None,
            path: "ripencc/{year}/delegated-ripencc-{date}.bz2",
            compression: Compression::Bzip2
        },
    ]
};

fn table(registry: Registry) -> &'static SourceTable {
    match registry {
        Registry::Afrinic => &AFRINIC,
        Registry::Arin    => &ARIN,
        Registry::Apnic   => &APNIC,
        Registry::Lacnic  => &LACNIC,
        Registry::RipeNcc => &RIPENCC
    }
}

fn day_of(date: NaiveDate) -> Day {
    date.year() as u32 * 10000 + date.month() * 100 + date.day()
}

fn date_of(day: Day) -> Result<NaiveDate, Error> {
    NaiveDate::from_ymd_opt((day / 10000) as i32, day / 100 % 100, day % 100)
        .ok_or(Error::InvalidTableDay(day))
}


//------------ ArchiveLocation -----------------------------------------------

/// The file holding a registry's stats for some requested day.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ArchiveLocation {
    registry: Registry,
    requested: NaiveDate,
    day: NaiveDate,
    path: String,
    compression: Compression
}

impl ArchiveLocation {
    pub fn registry(&self) -> Registry { self.registry }
    pub fn requested(&self) -> NaiveDate { self.requested }

    /// The day whose data the file holds. Differs from the requested day
    /// when that day is absent from the archive.
    pub fn day(&self) -> NaiveDate { self.day }

    /// Path relative to the archive base.
    pub fn path(&self) -> &str { &self.path }
    pub fn compression(&self) -> Compression { self.compression }

    pub fn is_substitute(&self) -> bool { self.day != self.requested }

    /// Finds the file for the given registry and day.
    ///
    /// Returns `None` for days before the registry's first archived day;
    /// such a registry contributes no records.
    pub fn locate(
        registry: Registry,
        requested: NaiveDate
    ) -> Result<Option<Self>, Error> {
        let table = table(registry);
        let mut day = day_of(requested);

        if day < table.first_day {
            info!(
                "{} is not in the {} archive, which starts at {}",
                requested, registry, date_of(table.first_day)?
            );
            return Ok(None)
        }

        for &(from, to, substitute) in table.missing {
            if day >= from && day <= to {
                info!(
                    "{} is missing for {}, replacing it by {}",
                    requested, registry, date_of(substitute)?
                );
                day = substitute;
            }
        }

        let date = date_of(day)?;
        let mut year = date.year();
        for &(exception, dir_year) in table.year_dirs {
            if day == exception {
                info!(
                    "{} is in another year directory for {}, using {}",
                    date, registry, dir_year
                );
                year = dir_year;
            }
        }

        let era = table.eras.iter()
            .find(|era| era.until.map(|until| day <= until).unwrap_or(true))
            .ok_or(Error::NoEra(registry, date))?;

        let path = era.path
            .replace("{year}", &year.to_string())
            .replace("{date}", &date.format("%Y%m%d").to_string())
            .replace("{dashed}", &date.format("%Y-%m-%d").to_string());

        Ok(Some(ArchiveLocation {
            registry,
            requested,
            day: date,
            path,
            compression: era.compression
        }))
    }
}

impl fmt::Display for ArchiveLocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {} ({})", self.registry, self.path, self.compression)?;
        if self.is_substitute() {
            write!(f, ", substituting {} for {}", self.day, self.requested)?;
        }
        Ok(())
    }
}


//------------ Error --------------------------------------------------------

#[derive(Debug, Display)]
pub enum Error {
    #[display(fmt = "invalid day in archive table: {}", _0)]
    InvalidTableDay(u32),

    #[display(fmt = "no file naming scheme for {} on {}", _0, _1)]
    NoEra(Registry, NaiveDate),
}


//------------ Tests --------------------------------------------------------
