use std::{
    fmt,
    fs::{self, File},
    io::{self, Read},
    path::Path,
    str::FromStr,
};

use sha2::{Digest, Sha256};

use super::{Error, config::DEFAULT_BUFFER_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha256,
    /// Used to check a file against an entity tag that carries the content's MD5.
    Md5,
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DigestAlgorithm::Sha256 => f.write_str("sha256"),
            DigestAlgorithm::Md5 => f.write_str("md5"),
        }
    }
}

impl FromStr for DigestAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(DigestAlgorithm::Sha256),
            "md5" => Ok(DigestAlgorithm::Md5),
            other => Err(format!("unsupported digest algorithm: {other}")),
        }
    }
}

enum Hasher {
    Sha256(Sha256),
    Md5(md5::Context),
}

impl Hasher {
    fn new(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Sha256 => Hasher::Sha256(Sha256::new()),
            DigestAlgorithm::Md5 => Hasher::Md5(md5::Context::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Sha256(hasher) => hasher.update(data),
            Hasher::Md5(context) => context.consume(data),
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            Hasher::Sha256(hasher) => hex::encode(hasher.finalize()),
            Hasher::Md5(context) => hex::encode(context.compute().0),
        }
    }
}

/// Strips the weak prefix and the surrounding quotes of an entity tag:
/// `W/"abc123"` and `"abc123"` both become `abc123`.
pub fn normalize_validator(validator: &str) -> &str {
    let validator = validator.trim();
    let validator = validator.strip_prefix("W/").unwrap_or(validator);
    validator.trim_matches('"')
}

pub(super) fn digest_file_with_buffer(
    path: &Path,
    algorithm: DigestAlgorithm,
    buffer_size: usize,
) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Hasher::new(algorithm);
    let mut buffer = vec![0; buffer_size.max(1)];

    loop {
        let count = match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(count) => count,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..count]);
    }

    Ok(hasher.finalize_hex())
}

/// Lowercase hex digest of the file at `path`.
pub fn digest_file(path: &Path, algorithm: DigestAlgorithm) -> io::Result<String> {
    digest_file_with_buffer(path, algorithm, DEFAULT_BUFFER_SIZE)
}

pub(super) fn verify_file_with_buffer(
    path: &Path,
    algorithm: DigestAlgorithm,
    expected_hex: &str,
    buffer_size: usize,
) -> Result<(), Error> {
    let actual = digest_file_with_buffer(path, algorithm, buffer_size)?;
    let expected = normalize_validator(expected_hex);
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(Error::DigestMismatch {
            algorithm,
            expected: expected.to_string(),
            actual,
        })
    }
}

/// Compares the file's digest with `expected_hex`, ignoring case and surrounding quotes.
pub fn verify_file(
    path: &Path,
    algorithm: DigestAlgorithm,
    expected_hex: &str,
) -> Result<(), Error> {
    verify_file_with_buffer(path, algorithm, expected_hex, DEFAULT_BUFFER_SIZE)
}

/// Reads the expected digest from a checksum file such as `sha256sum` output
/// (`<hex>  <name>`): the first whitespace-separated token.
pub fn read_checksum_file(path: &Path) -> Result<String, Error> {
    let contents = fs::read_to_string(path)?;
    contents
        .split_whitespace()
        .next()
        .map(str::to_string)
        .ok_or_else(|| Error::EmptyChecksumFile(path.to_path_buf()))
}
