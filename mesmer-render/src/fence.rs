//! Blocking and non-blocking waits on GPU fences.

use std::time::Duration;

use tracing::{trace, warn};

use crate::error::RenderError;
use crate::gpu::{FenceStatus, Gpu};
use crate::Result;

/// Upper bound on a single wait call. Waits longer than this are retried.
pub const FENCE_WAIT_SLICE: Duration = Duration::from_millis(50);

/// Report a slow fence every this many timed-out slices.
const SLOW_FENCE_REPORT_EVERY: u32 = 40;

/// Block until `fence` signals, waiting at most `slice` per call.
///
/// Returns how many slices timed out before the fence signaled.
pub fn await_fence<G: Gpu>(gpu: &G, fence: &G::Fence, slice: Duration) -> Result<u32> {
    let mut timeouts = 0u32;
    loop {
        match gpu.client_wait(fence, slice) {
            FenceStatus::Signaled => {
                if timeouts > 0 {
                    trace!(timeouts, "Fence signaled after retries");
                }
                return Ok(timeouts);
            }
            FenceStatus::TimedOut => {
                timeouts = timeouts.saturating_add(1);
                if timeouts % SLOW_FENCE_REPORT_EVERY == 0 {
                    warn!(
                        waited_ms = slice.as_millis() as u64 * u64::from(timeouts),
                        "Still waiting on GPU fence"
                    );
                }
            }
            FenceStatus::Failed => return Err(RenderError::FenceFailed),
        }
    }
}

/// Check `fence` without blocking.
pub fn poll_fence<G: Gpu>(gpu: &G, fence: &G::Fence) -> FenceStatus {
    gpu.client_wait(fence, Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{HeadlessConfig, HeadlessGpu};

    #[test]
    fn await_retries_until_signaled() {
        let gpu = HeadlessGpu::new(HeadlessConfig {
            fence_timeouts: 5,
            ..HeadlessConfig::default()
        });
        let fence = gpu.create_fence().unwrap();
        assert_eq!(await_fence(&gpu, &fence, Duration::from_millis(1)).unwrap(), 5);
        gpu.delete_fence(fence);
    }

    #[test]
    fn poll_does_not_block() {
        let gpu = HeadlessGpu::new(HeadlessConfig {
            fence_timeouts: 1,
            ..HeadlessConfig::default()
        });
        let fence = gpu.create_fence().unwrap();
        assert_eq!(poll_fence(&gpu, &fence), FenceStatus::TimedOut);
        assert_eq!(poll_fence(&gpu, &fence), FenceStatus::Signaled);
        gpu.delete_fence(fence);
    }

    #[test]
    fn deleted_fence_fails() {
        let gpu = HeadlessGpu::new(HeadlessConfig::default());
        let fence = gpu.create_fence().unwrap();
        let stale = crate::headless::HeadlessFence(fence.0);
        gpu.delete_fence(fence);
        assert!(matches!(
            await_fence(&gpu, &stale, FENCE_WAIT_SLICE),
            Err(RenderError::FenceFailed)
        ));
    }
}
