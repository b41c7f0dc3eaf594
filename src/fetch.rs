//! Opening stats files, either from the RIPE NCC archive over HTTP or from
//! a local mirror with the same layout.
use std::fs::File;
use std::io;
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use bzip2::read::MultiBzDecoder;
use flate2::read::MultiGzDecoder;
use crate::archive::{ArchiveLocation, Compression};

pub const DEFAULT_BASE_URL: &str = "https://ftp.ripe.net/pub/stats";


//------------ Archive -------------------------------------------------------

pub enum Archive {
    Remote {
        base_url: String,
        client: reqwest::blocking::Client
    },
    Local(PathBuf)
}

impl Archive {
    pub fn remote(base_url: &str) -> Result<Self, Error> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| Error::Http(base_url.to_string(), e))?;
        Ok(Archive::Remote {
            base_url: base_url.trim_end_matches('/').to_string(),
            client
        })
    }

    pub fn local(dir: PathBuf) -> Self {
        Archive::Local(dir)
    }

    /// Opens the file at the location, decompressed and line buffered.
    pub fn open(
        &self,
        location: &ArchiveLocation
    ) -> Result<Box<dyn BufRead>, Error> {
        let raw: Box<dyn Read> = match self {
            Archive::Remote { base_url, client } => {
                let url = format!("{}/{}", base_url, location.path());
                info!("Fetching {} data from {}", location.registry(), url);
                let response = client.get(&url)
                    .send()
                    .and_then(|r| r.error_for_status())
                    .map_err(|e| Error::Http(url.clone(), e))?;
                Box::new(response)
            }
            Archive::Local(dir) => {
                let path = dir.join(location.path());
                info!(
                    "Reading {} data from {}",
                    location.registry(), path.display()
                );
                let file = File::open(&path).map_err(|e| {
                    Error::CannotRead(path.to_string_lossy().to_string(), e)
                })?;
                Box::new(file)
            }
        };
        Ok(decompress(raw, location.compression()))
    }
}


//------------ decompress ----------------------------------------------------

pub fn decompress(
    raw: Box<dyn Read>,
    compression: Compression
) -> Box<dyn BufRead> {
    debug!("Opening {} stream", compression);
    match compression {
        Compression::Plain => Box::new(BufReader::new(raw)),
        Compression::Gzip => Box::new(BufReader::new(MultiGzDecoder::new(raw))),
        Compression::Bzip2 => Box::new(BufReader::new(MultiBzDecoder::new(raw)))
    }
}


//------------ Error --------------------------------------------------------

#[derive(Debug, Display)]
pub enum Error {
    #[display(fmt = "Cannot read file {}: {}", _0, _1)]
    CannotRead(String, io::Error),

    #[display(fmt = "Failed to download {}: {}", _0, _1)]
    Http(String, reqwest::Error),
}


//------------ Tests --------------------------------------------------------
