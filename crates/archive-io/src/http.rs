use std::io::Read as _;
use std::sync::Mutex;

use crate::error::{Error, HttpError};
use crate::random_access::{CancelToken, RandomAccess};

/// How strictly a caller requires snapshot consistency (spec §4.2 step 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotPolicy {
    /// Accept a weak ETag or a bare `Last-Modified` as the validator.
    #[default]
    BestEffort,
    /// Fail with [`HttpError::StrongEtagRequired`] unless a strong ETag is present.
    RequireStrongEtag,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Validator {
    StrongEtag(String),
    LastModified(String),
    None,
}

struct Snapshot {
    size: u64,
    validator: Validator,
    accepts_ranges: bool,
}

/// A `RandomAccess` over a single HTTP(S) resource, treating a sequence of
/// range reads as reads from one immutable snapshot (C3, spec §4.2).
pub struct HttpAccess {
    url: String,
    agent: ureq::Agent,
    policy: SnapshotPolicy,
    snapshot: Mutex<Option<Snapshot>>,
}

impl HttpAccess {
    /// Create a new HTTP-backed source. Discovery (HEAD, or GET with
    /// `Range: bytes=0-0` as fallback) happens lazily on first use.
    pub fn new(url: impl Into<String>, policy: SnapshotPolicy) -> Self {
        HttpAccess {
            url: url.into(),
            agent: ureq::AgentBuilder::new().build(),
            policy,
            snapshot: Mutex::new(None),
        }
    }

    fn discover(&self) -> Result<Snapshot, Error> {
        let head_resp = self
            .agent
            .head(&self.url)
            .set("Accept-Encoding", "identity")
            .call();

        let (size, validator, accepts_ranges) = match head_resp {
            Ok(resp) => {
                check_content_encoding(resp.header("Content-Encoding"))?;
                let size = resp
                    .header("Content-Length")
                    .and_then(|s| s.parse::<u64>().ok())
                    .ok_or(Error::SizeUnavailable)?;
                let accepts_ranges = resp.header("Accept-Ranges") == Some("bytes");
                (size, extract_validator(&resp), accepts_ranges)
            }
            Err(ureq::Error::Status(403, _))
            | Err(ureq::Error::Status(405, _))
            | Err(ureq::Error::Status(501, _)) => {
                let resp = self
                    .agent
                    .get(&self.url)
                    .set("Accept-Encoding", "identity")
                    .set("Range", "bytes=0-0")
                    .call()
                    .map_err(|e| Error::Http(HttpError::Transport(e.to_string())))?;
                check_content_encoding(resp.header("Content-Encoding"))?;
                let total = parse_content_range_total(resp.header("Content-Range"))?;
                (total, extract_validator(&resp), true)
            }
            Err(e) => return Err(Error::Http(HttpError::Transport(e.to_string()))),
        };

        if self.policy == SnapshotPolicy::RequireStrongEtag
            && !matches!(validator, Validator::StrongEtag(_))
        {
            return Err(Error::Http(HttpError::StrongEtagRequired));
        }

        Ok(Snapshot { size, validator, accepts_ranges })
    }

    /// Discover the snapshot if this is the first call, then return a copy
    /// of its fields from inside the lock's critical section — callers
    /// never need to pull the `Option` back out themselves.
    fn ensure_snapshot(&self) -> Result<(u64, Validator, bool), Error> {
        let mut guard = self.snapshot.lock().unwrap();
        let snap = match guard.take() {
            Some(snap) => snap,
            None => self.discover()?,
        };
        let view = (snap.size, snap.validator.clone(), snap.accepts_ranges);
        *guard = Some(snap);
        Ok(view)
    }
}

fn check_content_encoding(encoding: Option<&str>) -> Result<(), Error> {
    match encoding {
        None | Some("identity") | Some("") => Ok(()),
        Some(other) => Err(Error::Http(HttpError::ContentEncoding(other.to_string()))),
    }
}

fn extract_validator(resp: &ureq::Response) -> Validator {
    if let Some(etag) = resp.header("ETag") {
        if !etag.starts_with("W/") {
            return Validator::StrongEtag(etag.to_string());
        }
    }
    if let Some(lm) = resp.header("Last-Modified") {
        return Validator::LastModified(lm.to_string());
    }
    Validator::None
}

fn parse_content_range_total(header: Option<&str>) -> Result<u64, Error> {
    // Expected form: "bytes start-end/total".
    let header = header.ok_or(Error::Http(HttpError::RangeInvalid))?;
    let rest = header.strip_prefix("bytes ").ok_or(Error::Http(HttpError::RangeInvalid))?;
    let (_, total_str) = rest.split_once('/').ok_or(Error::Http(HttpError::RangeInvalid))?;
    if total_str == "*" {
        return Err(Error::SizeUnavailable);
    }
    total_str.parse().map_err(|_| Error::Http(HttpError::RangeInvalid))
}

fn parse_content_range_bounds(header: &str) -> Result<(u64, u64), Error> {
    let rest = header.strip_prefix("bytes ").ok_or(Error::Http(HttpError::RangeInvalid))?;
    let (range, _total) = rest.split_once('/').ok_or(Error::Http(HttpError::RangeInvalid))?;
    let (start, end) = range.split_once('-').ok_or(Error::Http(HttpError::RangeInvalid))?;
    let start: u64 = start.parse().map_err(|_| Error::Http(HttpError::RangeInvalid))?;
    let end: u64 = end.parse().map_err(|_| Error::Http(HttpError::RangeInvalid))?;
    Ok((start, end))
}

impl RandomAccess for HttpAccess {
    fn size(&self) -> Result<u64, Error> {
        let (size, _validator, _accepts_ranges) = self.ensure_snapshot()?;
        Ok(size)
    }

    fn read(&self, offset: u64, length: u64, cancel: &CancelToken) -> Result<Vec<u8>, Error> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if length == 0 {
            return Ok(Vec::new());
        }

        let (size, remembered_validator, requires_range) = self.ensure_snapshot()?;

        if offset > size {
            return Err(Error::InvalidRange { offset, length, size: Some(size) });
        }
        let end = (offset + length - 1).min(size.saturating_sub(1));

        let mut req = self
            .agent
            .get(&self.url)
            .set("Accept-Encoding", "identity")
            .set("Range", &format!("bytes={offset}-{end}"));
        if let Validator::StrongEtag(etag) = &remembered_validator {
            req = req.set("If-Range", etag);
        }

        let resp = req.call().map_err(|e| Error::Http(HttpError::Transport(e.to_string())))?;
        check_content_encoding(resp.header("Content-Encoding"))?;

        let current_validator = extract_validator(&resp);
        if current_validator != remembered_validator
            && !matches!((&current_validator, &remembered_validator), (Validator::None, _) | (_, Validator::None))
        {
            return Err(Error::Http(HttpError::ResourceChanged));
        }

        match resp.status() {
            206 => {
                let content_range = resp.header("Content-Range").ok_or(Error::Http(HttpError::RangeInvalid))?;
                let (got_start, got_end) = parse_content_range_bounds(content_range)?;
                if got_start != offset || got_end != end {
                    return Err(Error::Http(HttpError::RangeInvalid));
                }
                let expected_len = (end - offset + 1) as usize;
                let mut body = Vec::with_capacity(expected_len);
                resp.into_reader()
                    .take(expected_len as u64 + 1)
                    .read_to_end(&mut body)
                    .map_err(Error::IO)?;
                if body.len() != expected_len {
                    return Err(Error::Http(HttpError::BadResponse));
                }
                Ok(body)
            }
            200 if requires_range => Err(Error::Http(HttpError::ResourceChanged)),
            200 => {
                let mut body = Vec::new();
                resp.into_reader()
                    .take(4096)
                    .read_to_end(&mut body)
                    .map_err(Error::IO)?;
                Err(Error::Http(HttpError::RangeUnsupported))
            }
            status => Err(Error::Http(HttpError::Transport(format!("unexpected status {status}")))),
        }
    }
}
