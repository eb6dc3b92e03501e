use {
    super::PositionError,
    serde::{Deserialize, Deserializer, Serialize, Serializer, de},
    std::{
        cmp::Ordering,
        fmt,
        iter::Sum,
        ops::{Add, AddAssign},
        str::FromStr,
    },
};

/// Size of a ring identifier, in bytes.
///
/// The ring is the cyclic space `[0, 2^512)`.
pub const ID_SIZE: usize = 64;

/// Number of 64-bit limbs in a ring identifier.
const LIMBS: usize = ID_SIZE / 8;

/// Number of leading bytes printed by the short form of a position.
const SHORT_ID_SIZE: usize = 6;

/// Position on the ring.
///
/// Stored big-endian, so the derived byte-wise ordering is the numeric one.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RingPosition([u8; ID_SIZE]);

impl RingPosition {
    pub const ZERO: Self = Self([0; ID_SIZE]);
    pub const MAX: Self = Self([u8::MAX; ID_SIZE]);

    pub const fn from_be_bytes(bytes: [u8; ID_SIZE]) -> Self {
        Self(bytes)
    }

    /// Position whose leading bytes are `prefix`, the rest being zero.
    ///
    /// Identifiers are digests, so their most significant bytes are the
    /// meaningful ones: `from_prefix(&[0x40])` is a quarter of the ring.
    /// Bytes past [`ID_SIZE`] are ignored.
    pub fn from_prefix(prefix: &[u8]) -> Self {
        let mut bytes = [0; ID_SIZE];
        let len = prefix.len().min(ID_SIZE);
        bytes[..len].copy_from_slice(&prefix[..len]);
        Self(bytes)
    }

    /// Position with the given value in its least significant bytes.
    pub fn from_u64(value: u64) -> Self {
        let mut bytes = [0; ID_SIZE];
        bytes[ID_SIZE - 8..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ID_SIZE] {
        &self.0
    }

    /// Short form of the position, the first few bytes in hex.
    pub fn short(&self) -> ShortPosition<'_> {
        ShortPosition(self)
    }

    /// Little-endian 64-bit limbs.
    fn limbs(&self) -> [u64; LIMBS] {
        let mut limbs = [0; LIMBS];
        for (i, chunk) in self.0.rchunks_exact(8).enumerate() {
            let mut word = [0; 8];
            word.copy_from_slice(chunk);
            limbs[i] = u64::from_be_bytes(word);
        }
        limbs
    }
}

impl fmt::Display for RingPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|b| write!(f, "{b:02x}"))
    }
}

impl fmt::Debug for RingPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RingPosition({})", self.short())
    }
}

/// Hex digits are right-aligned: `"ff"` is the position 255.
impl FromStr for RingPosition {
    type Err = PositionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix("0x").unwrap_or(s);
        if s.is_empty() {
            return Err(PositionError::Empty);
        }
        if s.len() > ID_SIZE * 2 {
            return Err(PositionError::TooLong(s.len()));
        }

        let mut bytes = [0; ID_SIZE];
        // Walk from the least significant digit.
        for (i, c) in s.chars().rev().enumerate() {
            let nibble = c.to_digit(16).ok_or(PositionError::Digit(c))? as u8;
            bytes[ID_SIZE - 1 - i / 2] |= nibble << (4 * (i % 2));
        }
        Ok(Self(bytes))
    }
}

impl Serialize for RingPosition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RingPosition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// See [`RingPosition::short()`].
pub struct ShortPosition<'a>(&'a RingPosition);

impl fmt::Display for ShortPosition<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.0[..SHORT_ID_SIZE]
            .iter()
            .try_for_each(|b| write!(f, "{b:02x}"))
    }
}

/// Exact length of a stretch of the ring, from zero up to the whole ring.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RingSpan([u64; LIMBS + 1]);

impl RingSpan {
    pub const ZERO: Self = Self([0; LIMBS + 1]);

    /// Length of the whole ring, `2^512`.
    pub const RING: Self = {
        let mut limbs = [0; LIMBS + 1];
        limbs[LIMBS] = 1;
        Self(limbs)
    };

    /// Distance travelled from `start` forward to `end`, modulo ring size.
    pub fn between(start: &RingPosition, end: &RingPosition) -> Self {
        let (start, end) = (start.limbs(), end.limbs());
        let mut limbs = [0; LIMBS + 1];
        let mut borrow = false;
        for i in 0..LIMBS {
            let (diff, b1) = end[i].overflowing_sub(start[i]);
            let (diff, b2) = diff.overflowing_sub(borrow as u64);
            limbs[i] = diff;
            borrow = b1 || b2;
        }
        // A final borrow is the wrap around zero, which the modulus absorbs.
        Self(limbs)
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|limb| *limb == 0)
    }

    /// Nearest double precision value.
    pub fn to_f64(&self) -> f64 {
        const LIMB_BASE: f64 = 18_446_744_073_709_551_616.0;
        self.0
            .iter()
            .rev()
            .fold(0.0, |acc, limb| acc * LIMB_BASE + *limb as f64)
    }

    /// `self / total`, or zero when `total` is empty.
    pub fn ratio(&self, total: &RingSpan) -> f64 {
        if total.is_zero() {
            return 0.0;
        }
        self.to_f64() / total.to_f64()
    }
}

impl Add for RingSpan {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        let mut limbs = [0; LIMBS + 1];
        let mut carry = false;
        for (i, limb) in limbs.iter_mut().enumerate() {
            let (sum, c1) = self.0[i].overflowing_add(rhs.0[i]);
            let (sum, c2) = sum.overflowing_add(carry as u64);
            *limb = sum;
            carry = c1 || c2;
        }
        debug_assert!(!carry, "ring span overflow");
        Self(limbs)
    }
}

impl AddAssign for RingSpan {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for RingSpan {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(RingSpan::ZERO, Add::add)
    }
}

impl Ord for RingSpan {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.iter().rev().cmp(other.0.iter().rev())
    }
}

impl PartialOrd for RingSpan {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for RingSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RingSpan({:e})", self.to_f64())
    }
}

/// A half-open range of the ring, `[start, end)`.
///
/// The range wraps around zero when `end < start`. A range whose ends
/// coincide covers the whole ring; such ranges are only made through
/// [`RingRange::full()`], [`RingRange::new()`] refuses zero-width input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RingRange {
    start: RingPosition,
    end: RingPosition,
}

impl RingRange {
    /// Range `[start, end)`, or `None` when it would be zero-width.
    pub fn new(start: RingPosition, end: RingPosition) -> Option<Self> {
        (start != end).then_some(Self { start, end })
    }

    /// The whole ring, starting (and ending) at `origin`.
    pub fn full(origin: RingPosition) -> Self {
        Self {
            start: origin,
            end: origin,
        }
    }

    pub fn start(&self) -> &RingPosition {
        &self.start
    }

    pub fn end(&self) -> &RingPosition {
        &self.end
    }

    pub fn is_full(&self) -> bool {
        self.start == self.end
    }

    /// Whether the range crosses zero (the full ring does).
    pub fn wraps(&self) -> bool {
        self.end <= self.start
    }

    /// Check if the given position is in the range.
    pub fn contains(&self, position: &RingPosition) -> bool {
        if self.start < self.end {
            self.start <= *position && *position < self.end
        } else {
            *position >= self.start || *position < self.end
        }
    }

    /// Length of the range.
    pub fn span(&self) -> RingSpan {
        if self.is_full() {
            RingSpan::RING
        } else {
            RingSpan::between(&self.start, &self.end)
        }
    }
}

impl fmt::Display for RingRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start.short(), self.end.short())
    }
}
