//! Construction parameters shared by every container.

use crate::error::ConfigError;

/// Segments hold `1 << DEFAULT_SEGMENT_BITS` slots unless configured otherwise.
pub const DEFAULT_SEGMENT_BITS: u32 = 8;
pub const MIN_SEGMENT_BITS: u32 = 1;
pub const MAX_SEGMENT_BITS: u32 = 24;

/// Per-instance storage settings.
///
/// ```
/// use segtable::{SegmentedVector, StorageConfig};
///
/// let config = StorageConfig::new().with_segment_bits(4).with_shrink(true);
/// let v: SegmentedVector<u32> = SegmentedVector::with_config(config).unwrap();
/// assert_eq!(v.segment_len(), 16);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StorageConfig {
    /// log2 of the number of slots per segment.
    pub segment_bits: u32,
    /// Release trailing segments once they are no longer needed.
    pub shrink: bool,
    /// Start the container in read-only mode.
    pub read_only: bool,
}

impl StorageConfig {
    pub const fn new() -> Self {
        Self {
            segment_bits: DEFAULT_SEGMENT_BITS,
            shrink: false,
            read_only: false,
        }
    }

    pub const fn with_segment_bits(mut self, bits: u32) -> Self {
        self.segment_bits = bits;
        self
    }

    pub const fn with_shrink(mut self, shrink: bool) -> Self {
        self.shrink = shrink;
        self
    }

    pub const fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Number of slots per segment. Only meaningful for a validated config.
    pub const fn segment_len(&self) -> usize {
        1 << self.segment_bits
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if (MIN_SEGMENT_BITS..=MAX_SEGMENT_BITS).contains(&self.segment_bits) {
            Ok(())
        } else {
            Err(ConfigError::SegmentBitsOutOfRange(self.segment_bits))
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let c = StorageConfig::default();
        assert_eq!(c.segment_bits, DEFAULT_SEGMENT_BITS);
        assert_eq!(c.segment_len(), 256);
        assert!(!c.shrink);
        assert!(!c.read_only);
        assert!(c.validate().is_ok());
    }

    /// Invariant: zero-width segments and absurdly large ones are rejected.
    #[test]
    fn segment_bits_bounds() {
        assert_eq!(
            StorageConfig::new().with_segment_bits(0).validate(),
            Err(ConfigError::SegmentBitsOutOfRange(0))
        );
        assert!(StorageConfig::new().with_segment_bits(1).validate().is_ok());
        assert!(StorageConfig::new()
            .with_segment_bits(MAX_SEGMENT_BITS)
            .validate()
            .is_ok());
        assert!(StorageConfig::new()
            .with_segment_bits(MAX_SEGMENT_BITS + 1)
            .validate()
            .is_err());
    }

    #[test]
    fn error_message_names_the_range() {
        let e = StorageConfig::new().with_segment_bits(40).validate().unwrap_err();
        assert_eq!(e.to_string(), "segment bits must be in 1..=24, got 40");
    }

    /// Invariant: a config survives a JSON round trip, and missing fields take
    /// their defaults.
    #[cfg(feature = "serde")]
    #[test]
    fn serde_round_trip() {
        let c = StorageConfig::new()
            .with_segment_bits(6)
            .with_shrink(true)
            .with_read_only(true);
        let json = serde_json::to_string(&c).unwrap();
        let back: StorageConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);

        let partial: StorageConfig = serde_json::from_str(r#"{"shrink": true}"#).unwrap();
        assert_eq!(partial, StorageConfig::new().with_shrink(true));

        // deserialization does not validate; construction does
        let bad: StorageConfig = serde_json::from_str(r#"{"segment_bits": 0}"#).unwrap();
        assert_eq!(bad.validate(), Err(ConfigError::SegmentBitsOutOfRange(0)));
    }
}
