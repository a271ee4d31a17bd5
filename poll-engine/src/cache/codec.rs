//! Binary cache format.
//!
//! Little-endian throughout. A file is an `i64` creation timestamp in 100 ns
//! ticks since 0001-01-01T00:00:00Z, followed by poll records until the end
//! of the data:
//!
//! ```text
//! u16 year | u8 month | u8 day | u8 flags
//! [u8 region]            if flags & REGION
//! [string url]           if flags & URL
//! string pollster label
//! u32 pollster code
//! i32 party count
//! party count × ([u8; 3] party id | f32 share)
//! ```
//!
//! Strings are a LEB128 byte length followed by UTF-8.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use std::io::{self, Cursor, Read, Write};
use thiserror::Error;

use crate::party::{Party, PartyId};
use crate::poll::{PollResult, RawPoll};
use crate::pollster::PollsterSource;
use crate::region::Region;

const FLAG_SYNTHETIC: u8 = 0b001;
const FLAG_REGION: u8 = 0b010;
const FLAG_URL: u8 = 0b100;

const TICKS_PER_SECOND: i64 = 10_000_000;
/// Ticks between 0001-01-01 and 1970-01-01.
const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

/// Decoding failure. Any of these discards the whole cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Unexpected end of cache data")]
    Truncated,

    #[error("Invalid date {year:04}-{month:02}-{day:02}")]
    InvalidDate { year: u16, month: u8, day: u8 },

    #[error("Invalid creation timestamp {0}")]
    InvalidTimestamp(i64),

    #[error("Unknown region code {0}")]
    UnknownRegion(u8),

    #[error("Negative party count {0}")]
    NegativeCount(i32),

    #[error("String length {0} out of range")]
    InvalidLength(u64),

    #[error("Invalid UTF-8 in cache string")]
    InvalidUtf8,

    #[error("Year {0} does not fit the cache format")]
    YearOutOfRange(i32),

    #[error("Timestamp {0} does not fit the cache format")]
    TimestampOutOfRange(DateTime<Utc>),

    #[error("Cache I/O error: {0}")]
    Io(#[source] io::Error),
}

impl From<io::Error> for CacheError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Self::Truncated
        } else {
            Self::Io(err)
        }
    }
}

impl From<CacheError> for poll_common::Error {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Io(io) => Self::Io(io),
            other => Self::Cache(other.to_string()),
        }
    }
}

// ============================================================================
// Timestamps
// ============================================================================

pub fn to_ticks(at: DateTime<Utc>) -> Option<i64> {
    at.timestamp()
        .checked_mul(TICKS_PER_SECOND)?
        .checked_add(UNIX_EPOCH_TICKS)?
        .checked_add(i64::from(at.timestamp_subsec_nanos() / 100))
}

pub fn from_ticks(ticks: i64) -> Option<DateTime<Utc>> {
    let relative = ticks.checked_sub(UNIX_EPOCH_TICKS)?;
    let secs = relative.div_euclid(TICKS_PER_SECOND);
    let nanos = (relative.rem_euclid(TICKS_PER_SECOND) * 100) as u32;
    DateTime::from_timestamp(secs, nanos)
}

// ============================================================================
// Strings
// ============================================================================

fn write_varint<W: Write>(w: &mut W, mut value: u64) -> io::Result<()> {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            return w.write_u8(byte);
        }
        w.write_u8(byte | 0x80)?;
    }
}

fn read_varint<R: Read>(r: &mut R) -> Result<u64, CacheError> {
    let mut value: u64 = 0;
    let mut shift = 0;
    loop {
        let byte = r.read_u8()?;
        if shift >= 64 {
            return Err(CacheError::InvalidLength(value));
        }
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
    }
}

fn write_string<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    write_varint(w, s.len() as u64)?;
    w.write_all(s.as_bytes())
}

fn read_string<R: Read>(r: &mut R) -> Result<String, CacheError> {
    let len = read_varint(r)?;
    let mut buf = Vec::new();
    r.take(len).read_to_end(&mut buf)?;
    if (buf.len() as u64) < len {
        return Err(CacheError::Truncated);
    }
    String::from_utf8(buf).map_err(|_| CacheError::InvalidUtf8)
}

// ============================================================================
// Records
// ============================================================================

pub fn write_header<W: Write>(w: &mut W, created: DateTime<Utc>) -> Result<(), CacheError> {
    let ticks = to_ticks(created).ok_or(CacheError::TimestampOutOfRange(created))?;
    w.write_i64::<LittleEndian>(ticks)?;
    Ok(())
}

pub fn read_header<R: Read>(r: &mut R) -> Result<DateTime<Utc>, CacheError> {
    let ticks = r.read_i64::<LittleEndian>()?;
    from_ticks(ticks).ok_or(CacheError::InvalidTimestamp(ticks))
}

pub fn write_poll<W: Write>(w: &mut W, poll: &RawPoll) -> Result<(), CacheError> {
    let date = poll.date();
    let year = u16::try_from(date.year()).map_err(|_| CacheError::YearOutOfRange(date.year()))?;
    w.write_u16::<LittleEndian>(year)?;
    w.write_u8(date.month() as u8)?;
    w.write_u8(date.day() as u8)?;

    let mut flags = 0;
    if poll.is_synthetic() {
        flags |= FLAG_SYNTHETIC;
    }
    if poll.region().is_some() {
        flags |= FLAG_REGION;
    }
    if poll.url().is_some() {
        flags |= FLAG_URL;
    }
    w.write_u8(flags)?;

    if let Some(region) = poll.region() {
        w.write_u8(region.code())?;
    }
    if let Some(url) = poll.url() {
        write_string(w, url)?;
    }
    write_string(w, poll.pollster())?;
    w.write_u32::<LittleEndian>(poll.source().code())?;

    let shares = poll.shares();
    w.write_i32::<LittleEndian>(shares.len() as i32)?;
    for (party, share) in shares {
        w.write_all(&party.as_bytes())?;
        w.write_f32::<LittleEndian>(share as f32)?;
    }
    Ok(())
}

pub fn read_poll<R: Read>(r: &mut R) -> Result<RawPoll, CacheError> {
    let year = r.read_u16::<LittleEndian>()?;
    let month = r.read_u8()?;
    let day = r.read_u8()?;
    let date = NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day))
        .ok_or(CacheError::InvalidDate { year, month, day })?;

    let flags = r.read_u8()?;
    let region = if flags & FLAG_REGION != 0 {
        let code = r.read_u8()?;
        Some(Region::from_code(code).ok_or(CacheError::UnknownRegion(code))?)
    } else {
        None
    };
    let url = if flags & FLAG_URL != 0 {
        Some(read_string(r)?)
    } else {
        None
    };
    let pollster = read_string(r)?;
    let source = PollsterSource::from_code(r.read_u32::<LittleEndian>()?);

    let count = r.read_i32::<LittleEndian>()?;
    if count < 0 {
        return Err(CacheError::NegativeCount(count));
    }

    let mut builder = RawPoll::builder(date)
        .region(region)
        .pollster(pollster)
        .source(source)
        .synthetic(flags & FLAG_SYNTHETIC != 0);
    if let Some(url) = url {
        builder = builder.url(url);
    }

    for _ in 0..count {
        let mut id = [0u8; 3];
        r.read_exact(&mut id)?;
        let share = r.read_f32::<LittleEndian>()?;

        // Identifiers this build does not know count as Other
        let party = PartyId::from_bytes(id)
            .filter(|id| Party::get(*id).is_some())
            .unwrap_or(PartyId::OTHER);
        builder = builder.share(party, f64::from(share));
    }

    Ok(builder.build())
}

/// Serialize a whole cache file.
pub fn encode(created: DateTime<Utc>, polls: &[RawPoll]) -> Result<Vec<u8>, CacheError> {
    let mut out = Vec::new();
    write_header(&mut out, created)?;
    for poll in polls {
        write_poll(&mut out, poll)?;
    }
    Ok(out)
}

/// Deserialize a whole cache file. Any error invalidates everything.
pub fn decode(bytes: &[u8]) -> Result<(DateTime<Utc>, Vec<RawPoll>), CacheError> {
    let mut cursor = Cursor::new(bytes);
    let created = read_header(&mut cursor)?;

    let mut polls = Vec::new();
    while (cursor.position() as usize) < bytes.len() {
        polls.push(read_poll(&mut cursor)?);
    }
    Ok((created, polls))
}
