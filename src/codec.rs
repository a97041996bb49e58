// BiliSub - Bilibili metadata and subtitle client
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Video identifier codec (av <-> BV)
//!
//! Bilibili addresses every video by two parallel ids:
//! - **aid** (`av170001`): an unsigned integer below 2^51
//! - **bvid** (`BV17x411w7KC`): 12 characters, `BV1` prefix followed by nine
//!   base-58 digits, XOR-masked and permuted
//!
//! The conversion is pure and lossless in both directions. The alphabet, the
//! XOR/mask constants and the swap positions are owned by the platform and
//! must stay exactly as written here.
//!
//! # Algorithm
//! Encode: `tmp = (2^51 | aid) ^ XOR_CODE`, fill positions 11..=3 with base-58
//! digits right to left, then swap positions 3<->9 and 4<->7.
//!
//! Decode: undo the swaps, fold the nine digits after the prefix,
//! `aid = (tmp & MASK_CODE) ^ XOR_CODE`.

use crate::error::{BiliError, Result};
use regex::Regex;
use std::fmt;
use std::str::FromStr;

/// Base-58 digit table, position-significant
const ALPHABET: &[u8; 58] = b"FcwAPNKTMug3GV5Lj7EJnHpWsx4tb8haYeviqBz6rkCy12mUSDQX9RdoZf";

const XOR_CODE: u64 = 23442827791579;
const MASK_CODE: u64 = 2251799813685247;

/// Exclusive upper bound for a numeric id (2^51)
pub const MAX_AID: u64 = 1 << 51;

const BASE: u64 = 58;
const BV_LEN: usize = 12;
const BV_PREFIX: &[u8; 3] = b"BV1";

/// Character swaps applied after the digit fill (self-inverse)
const SWAPS: [(usize, usize); 2] = [(3, 9), (4, 7)];

lazy_static::lazy_static! {
    static ref BVID_IN_TEXT: Regex = Regex::new(r"BV1[0-9A-Za-z]{9}").unwrap();
    static ref AID_IN_TEXT: Regex = Regex::new(r"(?i)(?:^|[^0-9a-z])av(\d+)").unwrap();
}

/// Convert a numeric id (aid) to its coded form (bvid)
///
/// # Errors
/// `InvalidIdentifierFormat` if `aid >= 2^51`
pub fn aid_to_bvid(aid: u64) -> Result<String> {
    if aid >= MAX_AID {
        return Err(BiliError::invalid_id(format!(
            "numeric id {} is out of range (must be below {})",
            aid, MAX_AID
        )));
    }

    let mut bytes = [b'0'; BV_LEN];
    bytes[..3].copy_from_slice(BV_PREFIX);

    // (2^51 | aid) ^ XOR always lands in [2^51, 2^52): exactly nine digits
    let mut tmp = (MAX_AID | aid) ^ XOR_CODE;
    let mut idx = BV_LEN - 1;
    while tmp != 0 && idx >= BV_PREFIX.len() {
        bytes[idx] = ALPHABET[(tmp % BASE) as usize];
        tmp /= BASE;
        idx -= 1;
    }

    for (a, b) in SWAPS {
        bytes.swap(a, b);
    }

    // every byte comes from ALPHABET, BV_PREFIX or b'0'
    Ok(bytes.iter().map(|&b| b as char).collect())
}

/// Convert a coded id (bvid) to its numeric form (aid)
///
/// # Errors
/// `InvalidIdentifierFormat` if the input is not 12 characters, lacks the
/// `BV1` prefix, contains a character outside the alphabet, or does not
/// decode to a canonical id.
pub fn bvid_to_aid(bvid: &str) -> Result<u64> {
    let raw = bvid.as_bytes();
    if raw.len() != BV_LEN {
        return Err(BiliError::invalid_id(format!(
            "'{}' must be exactly {} characters",
            bvid, BV_LEN
        )));
    }
    if &raw[..3] != BV_PREFIX {
        return Err(BiliError::invalid_id(format!("'{}' must start with BV1", bvid)));
    }

    let mut bytes = [0u8; BV_LEN];
    bytes.copy_from_slice(raw);
    for (a, b) in SWAPS {
        bytes.swap(a, b);
    }

    let mut tmp: u64 = 0;
    for &ch in &bytes[BV_PREFIX.len()..] {
        let digit = alphabet_index(ch).ok_or_else(|| {
            BiliError::invalid_id(format!(
                "'{}' contains invalid character '{}'",
                bvid,
                char::from(ch)
            ))
        })?;
        tmp = tmp * BASE + digit;
    }

    // Canonical ids always carry the 2^51 marker bit and nothing above it
    if tmp >> 51 != 1 {
        return Err(BiliError::invalid_id(format!(
            "'{}' is not a canonical BV id",
            bvid
        )));
    }

    Ok((tmp & MASK_CODE) ^ XOR_CODE)
}

fn alphabet_index(ch: u8) -> Option<u64> {
    ALPHABET.iter().position(|&c| c == ch).map(|i| i as u64)
}

/// A video identifier in either of its two forms
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VideoId {
    /// `aid`, e.g. `170001`
    Numeric(u64),
    /// `bvid`, e.g. `BV17x411w7KC`
    Coded(String),
}

impl VideoId {
    /// Parse user input into a video id
    ///
    /// Accepts `BV…` ids, `av123`/`AV123`, bare digits, and URLs or text that
    /// contain one of those. The chosen form is validated before returning.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();

        if trimmed.starts_with("BV") {
            bvid_to_aid(trimmed)?;
            return Ok(VideoId::Coded(trimmed.to_string()));
        }

        let digits = trimmed
            .strip_prefix("av")
            .or_else(|| trimmed.strip_prefix("AV"))
            .unwrap_or(trimmed);
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            return Self::numeric_from_digits(digits);
        }

        if let Some(found) = BVID_IN_TEXT.find(trimmed) {
            bvid_to_aid(found.as_str())?;
            return Ok(VideoId::Coded(found.as_str().to_string()));
        }
        if let Some(caps) = AID_IN_TEXT.captures(trimmed) {
            return Self::numeric_from_digits(&caps[1]);
        }

        Err(BiliError::invalid_id(format!(
            "'{}' is neither a BV id nor an av id",
            trimmed
        )))
    }

    fn numeric_from_digits(digits: &str) -> Result<Self> {
        let aid: u64 = digits
            .parse()
            .map_err(|_| BiliError::invalid_id(format!("'{}' is not a valid av number", digits)))?;
        if aid >= MAX_AID {
            return Err(BiliError::invalid_id(format!(
                "numeric id {} is out of range",
                aid
            )));
        }
        Ok(VideoId::Numeric(aid))
    }

    /// Numeric form, decoding if necessary
    pub fn aid(&self) -> Result<u64> {
        match self {
            VideoId::Numeric(aid) => Ok(*aid),
            VideoId::Coded(bvid) => bvid_to_aid(bvid),
        }
    }

    /// Coded form, encoding if necessary
    pub fn bvid(&self) -> Result<String> {
        match self {
            VideoId::Numeric(aid) => aid_to_bvid(*aid),
            VideoId::Coded(bvid) => Ok(bvid.clone()),
        }
    }

    /// Both forms at once: `(aid, bvid)`
    pub fn normalize(&self) -> Result<(u64, String)> {
        Ok((self.aid()?, self.bvid()?))
    }
}

impl FromStr for VideoId {
    type Err = BiliError;

    fn from_str(s: &str) -> Result<Self> {
        VideoId::parse(s)
    }
}

impl From<u64> for VideoId {
    fn from(aid: u64) -> Self {
        VideoId::Numeric(aid)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoId::Numeric(aid) => write!(f, "av{}", aid),
            VideoId::Coded(bvid) => f.write_str(bvid),
        }
    }
}
