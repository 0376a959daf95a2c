use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::types::Payload;

/// A recorded search: one line of the query file
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRecord {
    pub query: Vec<f32>,
}

/// Streams one JSON document per line, without reading the whole file
pub struct JsonLines<T> {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line: usize,
    _record: PhantomData<T>,
}

impl<T: DeserializeOwned> JsonLines<T> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        Ok(Self {
            path,
            lines: BufReader::new(file).lines(),
            line: 0,
            _record: PhantomData,
        })
    }
}

impl<T: DeserializeOwned> Iterator for JsonLines<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = match self.lines.next()? {
            Ok(line) => line,
            Err(e) => return Some(Err(e.into())),
        };
        self.line += 1;

        Some(serde_json::from_str(&line).map_err(|source| Error::Record {
            path: self.path.clone(),
            line: self.line,
            source,
        }))
    }
}

pub type PayloadStream = JsonLines<Payload>;
pub type QueryStream = JsonLines<QueryRecord>;
