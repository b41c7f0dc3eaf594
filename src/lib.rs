extern crate bzip2;
extern crate chrono;
extern crate clap;
extern crate csv;
#[macro_use] extern crate derive_more;
extern crate flate2;
#[macro_use] extern crate log;
extern crate reqwest;
#[macro_use] extern crate serde_derive;
extern crate serde;
extern crate serde_json;

pub mod archive;
pub mod decompose;
pub mod delegations;
pub mod fetch;
pub mod index;
pub mod ip;
pub mod merge;
pub mod output;
pub mod trie;
