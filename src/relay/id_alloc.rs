//! Transfer ID 分配 - 随机 32 位，避开正在跟踪的 ID

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::ops::RangeInclusive;
use tracing::warn;

use crate::error::{RelayError, RelayResult};

/// 最大尝试次数
pub const MAX_ALLOCATION_ATTEMPTS: u32 = 64;

/// 随机 ID 分配器
pub struct IdAllocator {
    rng: StdRng,
    /// None 表示整个 i32 范围
    range: Option<RangeInclusive<i32>>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            range: None,
        }
    }

    /// 固定种子（测试用）
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            range: None,
        }
    }

    /// 只在给定范围内抽取
    pub fn within(mut self, range: RangeInclusive<i32>) -> Self {
        self.range = Some(range);
        self
    }

    /// 均匀抽取，直到不在 `existing` 中
    pub fn allocate(&mut self, existing: &HashSet<i32>) -> RelayResult<i32> {
        for _ in 0..MAX_ALLOCATION_ATTEMPTS {
            let candidate: i32 = match &self.range {
                Some(range) => self.rng.gen_range(range.clone()),
                None => self.rng.gen(),
            };
            if !existing.contains(&candidate) {
                return Ok(candidate);
            }
        }

        warn!(
            tracked = existing.len(),
            attempts = MAX_ALLOCATION_ATTEMPTS,
            "Transfer id allocation exhausted"
        );
        Err(RelayError::IdExhausted {
            attempts: MAX_ALLOCATION_ATTEMPTS,
        })
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
