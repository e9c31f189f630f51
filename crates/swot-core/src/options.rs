//! Training options
//!
//! Static configuration consulted by the tracker and the loop. Every count
//! and threshold is a positive integer; `batch_delay_ms` may be zero.

use crate::error::OptionsError;
use serde::{Deserialize, Serialize};

/// Training configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
    /// Questions attempted concurrently per batch
    pub batch_size: usize,
    /// Maximum number of rounds per run
    pub max_loop_count: u32,
    /// Per-question attempt cap within one note version
    pub max_verify_count: u32,
    /// Clean batches after which the current note version is certified
    pub max_certify_count: u32,
    /// Consecutive correct answers (version scope) to mark a question simple
    pub version_simple_threshold: u32,
    /// Correct answers without any error (total scope) to mark a question simple
    pub total_simple_threshold: u32,
    /// Errors (version scope) to mark a question skipped
    pub version_skip_threshold: u32,
    /// Errors (total scope) to mark a question skipped
    pub total_skip_threshold: u32,
    /// Pause between batches in milliseconds
    pub batch_delay_ms: u64,
}

impl Options {
    /// Create default options
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With batch size
    #[inline]
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// With loop budget
    #[inline]
    #[must_use]
    pub fn with_max_loop_count(mut self, max: u32) -> Self {
        self.max_loop_count = max;
        self
    }

    /// With per-question attempt cap
    #[inline]
    #[must_use]
    pub fn with_max_verify_count(mut self, max: u32) -> Self {
        self.max_verify_count = max;
        self
    }

    /// With certification threshold
    #[inline]
    #[must_use]
    pub fn with_max_certify_count(mut self, max: u32) -> Self {
        self.max_certify_count = max;
        self
    }

    /// With version and total simple thresholds
    #[inline]
    #[must_use]
    pub fn with_simple_thresholds(mut self, version: u32, total: u32) -> Self {
        self.version_simple_threshold = version;
        self.total_simple_threshold = total;
        self
    }

    /// With version and total skip thresholds
    #[inline]
    #[must_use]
    pub fn with_skip_thresholds(mut self, version: u32, total: u32) -> Self {
        self.version_skip_threshold = version;
        self.total_skip_threshold = total;
        self
    }

    /// With inter-batch delay
    #[inline]
    #[must_use]
    pub fn with_batch_delay_ms(mut self, delay_ms: u64) -> Self {
        self.batch_delay_ms = delay_ms;
        self
    }

    /// Check every positive-integer field
    ///
    /// # Errors
    /// `OptionsError::NotPositive` naming the first zero field
    pub fn validate(&self) -> Result<(), OptionsError> {
        let checks: [(&'static str, u64); 8] = [
            ("batchSize", self.batch_size as u64),
            ("maxLoopCount", u64::from(self.max_loop_count)),
            ("maxVerifyCount", u64::from(self.max_verify_count)),
            ("maxCertifyCount", u64::from(self.max_certify_count)),
            ("versionSimpleThreshold", u64::from(self.version_simple_threshold)),
            ("totalSimpleThreshold", u64::from(self.total_simple_threshold)),
            ("versionSkipThreshold", u64::from(self.version_skip_threshold)),
            ("totalSkipThreshold", u64::from(self.total_skip_threshold)),
        ];
        match checks.iter().find(|(_, value)| *value == 0) {
            Some((name, _)) => Err(OptionsError::NotPositive(name)),
            None => Ok(()),
        }
    }

    /// Merge a partial update, validating the result
    ///
    /// `self` is left untouched when the merged options do not validate.
    ///
    /// # Errors
    /// `OptionsError::NotPositive` if the merge produces a zero field
    pub fn apply(&mut self, patch: &OptionsPatch) -> Result<(), OptionsError> {
        let mut merged = self.clone();
        if let Some(v) = patch.batch_size {
            merged.batch_size = v;
        }
        if let Some(v) = patch.max_loop_count {
            merged.max_loop_count = v;
        }
        if let Some(v) = patch.max_verify_count {
            merged.max_verify_count = v;
        }
        if let Some(v) = patch.max_certify_count {
            merged.max_certify_count = v;
        }
        if let Some(v) = patch.version_simple_threshold {
            merged.version_simple_threshold = v;
        }
        if let Some(v) = patch.total_simple_threshold {
            merged.total_simple_threshold = v;
        }
        if let Some(v) = patch.version_skip_threshold {
            merged.version_skip_threshold = v;
        }
        if let Some(v) = patch.total_skip_threshold {
            merged.total_skip_threshold = v;
        }
        if let Some(v) = patch.batch_delay_ms {
            merged.batch_delay_ms = v;
        }
        merged.validate()?;
        *self = merged;
        Ok(())
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            batch_size: 5,
            max_loop_count: 10,
            max_verify_count: 3,
            max_certify_count: 5,
            version_simple_threshold: 2,
            total_simple_threshold: 4,
            version_skip_threshold: 2,
            total_skip_threshold: 4,
            batch_delay_ms: 1000,
        }
    }
}

/// Partial options update for `assign_options`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct OptionsPatch {
    pub batch_size: Option<usize>,
    pub max_loop_count: Option<u32>,
    pub max_verify_count: Option<u32>,
    pub max_certify_count: Option<u32>,
    pub version_simple_threshold: Option<u32>,
    pub total_simple_threshold: Option<u32>,
    pub version_skip_threshold: Option<u32>,
    pub total_skip_threshold: Option<u32>,
    pub batch_delay_ms: Option<u64>,
}

impl OptionsPatch {
    /// Empty patch
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the patch changes nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
