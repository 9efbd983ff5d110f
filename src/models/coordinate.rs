use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Storage-type tag the codec is registered under
pub const COORDINATE_TAG: &str = "Coordinate";

/// An immutable (x, y) geographic point.
///
/// Listings use x = latitude and y = longitude. Equality and hashing work on
/// the numeric pair, so two coordinates decoded from differently padded text
/// still compare equal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Coordinate {
    x: f64,
    y: f64,
}

impl Coordinate {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    /// `x,y` form used by the distance matrix API
    pub fn as_query(&self) -> String {
        format!("{},{}", self.x, self.y)
    }

    // -0.0 and 0.0 must hash identically since they compare equal
    fn key(&self) -> (u64, u64) {
        ((self.x + 0.0).to_bits(), (self.y + 0.0).to_bits())
    }
}

impl PartialEq for Coordinate {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Coordinate {}

impl Hash for Coordinate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Parses the `x,y` form used on the command line.
impl FromStr for Coordinate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (x, y) = s
            .split_once(',')
            .ok_or_else(|| Error::Config(format!("expected `x,y`, got {s:?}")))?;
        let parse = |part: &str| {
            part.trim()
                .parse::<f64>()
                .map_err(|e| Error::Config(format!("invalid coordinate {s:?}: {e}")))
        };
        Ok(Self::new(parse(x)?, parse(y)?))
    }
}

/// Encodes a coordinate as `%.7f;%.7f`.
pub fn encode(coordinate: &Coordinate) -> String {
    format!("{:.7};{:.7}", coordinate.x, coordinate.y)
}

/// Decodes the text produced by [`encode`].
pub fn decode(text: &str) -> Result<Coordinate> {
    let malformed = |reason: String| Error::MalformedValue {
        field: String::new(),
        storage: COORDINATE_TAG,
        value: text.to_string(),
        reason,
    };

    let parts: Vec<&str> = text.split(';').collect();
    if parts.len() != 2 {
        return Err(malformed(format!(
            "expected 2 `;`-separated parts, found {}",
            parts.len()
        )));
    }

    let x = parts[0]
        .trim()
        .parse::<f64>()
        .map_err(|e| malformed(e.to_string()))?;
    let y = parts[1]
        .trim()
        .parse::<f64>()
        .map_err(|e| malformed(e.to_string()))?;
    Ok(Coordinate::new(x, y))
}
