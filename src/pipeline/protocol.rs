//! Coordinator ⇄ worker wire format.
//!
//! One JSON document per line over the worker's stdin/stdout:
//!
//! ```text
//! coordinator → worker   WorkerSettings            (once, first line)
//! coordinator → worker   JobEnvelope { index, job } (per job)
//! worker → coordinator   ResultEnvelope { index, result }
//! ```
//!
//! The worker exits when its stdin reaches EOF. Logging goes to stderr so
//! stdout carries protocol lines only.
//!
//! Paths travel through [`raw_path`]: a JSON string when the path is UTF-8,
//! an array of its raw bytes otherwise. Unix file names are arbitrary bytes,
//! and a file must not fail just because its name is not UTF-8.

use crate::config::CollaboratorSettings;
use crate::job::ConversionJob;
use crate::output::ConversionResult;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

/// Process-wide settings for one worker, sent before the first job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSettings {
    #[serde(with = "raw_path")]
    pub output_root: PathBuf,
    pub collaborators: CollaboratorSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEnvelope {
    pub index: usize,
    pub job: ConversionJob,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub index: usize,
    pub result: ConversionResult,
}

/// Serialise `msg` as a single newline-terminated line.
pub fn encode_line<T: Serialize>(msg: &T) -> io::Result<String> {
    let mut line = serde_json::to_string(msg).map_err(io::Error::other)?;
    line.push('\n');
    Ok(line)
}

/// Write `msg` as one line and flush.
pub fn write_message<W: Write, T: Serialize>(writer: &mut W, msg: &T) -> io::Result<()> {
    writer.write_all(encode_line(msg)?.as_bytes())?;
    writer.flush()
}

/// Read the next message; `Ok(None)` at EOF. Blank lines are skipped.
pub fn read_message<R: BufRead, T: DeserializeOwned>(reader: &mut R) -> io::Result<Option<T>> {
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        if !line.trim().is_empty() {
            break;
        }
    }
    serde_json::from_str(line.trim_end())
        .map(Some)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

// ── Path encoding ────────────────────────────────────────────────────────

/// Lossless `serde(with = ...)` codec for [`PathBuf`] fields.
pub mod raw_path {
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
    use std::path::{Path, PathBuf};

    #[derive(Deserialize)]
    #[serde(untagged)]
    pub(super) enum Repr {
        Text(String),
        Bytes(Vec<u8>),
    }

    impl Repr {
        pub(super) fn into_path<E: de::Error>(self) -> Result<PathBuf, E> {
            match self {
                Repr::Text(text) => Ok(PathBuf::from(text)),
                Repr::Bytes(bytes) => from_bytes(bytes).map_err(E::custom),
            }
        }
    }

    pub fn serialize<S: Serializer>(path: &Path, s: S) -> Result<S::Ok, S::Error> {
        match path.to_str() {
            Some(text) => s.serialize_str(text),
            None => to_bytes(path).serialize(s),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<PathBuf, D::Error> {
        Repr::deserialize(d)?.into_path()
    }

    #[cfg(unix)]
    fn to_bytes(path: &Path) -> Vec<u8> {
        use std::os::unix::ffi::OsStrExt;
        path.as_os_str().as_bytes().to_vec()
    }

    #[cfg(unix)]
    fn from_bytes(bytes: Vec<u8>) -> Result<PathBuf, String> {
        use std::os::unix::ffi::OsStringExt;
        Ok(PathBuf::from(std::ffi::OsString::from_vec(bytes)))
    }

    // Non-unix names that are not UTF-8 are unpaired UTF-16 surrogates; they
    // travel as UTF-8 bytes with the surrogates replaced.
    #[cfg(not(unix))]
    fn to_bytes(path: &Path) -> Vec<u8> {
        path.to_string_lossy().into_owned().into_bytes()
    }

    #[cfg(not(unix))]
    fn from_bytes(bytes: Vec<u8>) -> Result<PathBuf, String> {
        String::from_utf8(bytes)
            .map(PathBuf::from)
            .map_err(|e| format!("path is not valid UTF-8: {e}"))
    }

    /// The same codec for `Option<PathBuf>`.
    pub mod option {
        use super::Repr;
        use serde::{Deserialize, Deserializer, Serialize, Serializer};
        use std::path::{Path, PathBuf};

        struct Raw<'a>(&'a Path);

        impl Serialize for Raw<'_> {
            fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                super::serialize(self.0, s)
            }
        }

        pub fn serialize<S: Serializer>(path: &Option<PathBuf>, s: S) -> Result<S::Ok, S::Error> {
            match path {
                Some(p) => s.serialize_some(&Raw(p)),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<PathBuf>, D::Error> {
            Option::<Repr>::deserialize(d)?
                .map(Repr::into_path)
                .transpose()
        }
    }
}
