use std::fmt;

/// Exponential implementation used by the Gupta inner loop.
///
/// Selected once from an integer mode when the term is configured. The
/// approximate flavors trade accuracy for speed; the limit flavors evaluate
/// `(1 + x/n)^n` by repeated squaring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpFlavor {
    #[default]
    Standard,
    /// Schraudolph's IEEE-754 bit construction.
    Schraudolph,
    /// Schraudolph with the product truncated before the bias is added.
    TruncatedSchraudolph,
    /// `(1 + x/2^k)^(2^k)` with `k` squarings.
    Limit { squarings: u32 },
}

const SCHRAUDOLPH_SCALE: f64 = 1_512_775.0;
const SCHRAUDOLPH_BIAS: i64 = 1_072_632_447;

impl ExpFlavor {
    /// Maps a numeric mode to its flavor; `None` for unknown modes.
    pub fn from_mode(mode: u8) -> Option<Self> {
        match mode {
            0 | 3 | 10 => Some(Self::Standard),
            1 => Some(Self::Schraudolph),
            2 => Some(Self::TruncatedSchraudolph),
            4..=9 => Some(Self::Limit {
                squarings: u32::from(mode) + 3,
            }),
            _ => None,
        }
    }

    pub fn mode(&self) -> u8 {
        match self {
            Self::Standard => 0,
            Self::Schraudolph => 1,
            Self::TruncatedSchraudolph => 2,
            Self::Limit { squarings } => (*squarings as u8).saturating_sub(3),
        }
    }

    #[inline]
    pub fn exp(&self, x: f64) -> f64 {
        match *self {
            Self::Standard => x.exp(),
            Self::Schraudolph => {
                let bits = (SCHRAUDOLPH_SCALE * x + SCHRAUDOLPH_BIAS as f64) as i64;
                f64::from_bits((bits << 32) as u64)
            }
            Self::TruncatedSchraudolph => {
                let bits = (SCHRAUDOLPH_SCALE * x) as i64 + SCHRAUDOLPH_BIAS;
                f64::from_bits((bits << 32) as u64)
            }
            Self::Limit { squarings } => {
                let n = f64::from(1u32 << squarings);
                let mut y = 1.0 + x / n;
                for _ in 0..squarings {
                    y *= y;
                }
                y
            }
        }
    }
}

impl fmt::Display for ExpFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::Schraudolph => write!(f, "schraudolph"),
            Self::TruncatedSchraudolph => write!(f, "truncated-schraudolph"),
            Self::Limit { squarings } => write!(f, "limit-{}", 1u32 << squarings),
        }
    }
}
