use crate::utils::now;
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU32, Ordering};

/// Seeded from the clock so tokens differ across process restarts.
static GLOBAL_ID_COUNTER: Lazy<AtomicU32> = Lazy::new(|| AtomicU32::new(now() as u32));

/// Returns a process-unique, non-zero `u32`.
///
/// Used for session validation tokens, where `0` means "no token".
#[inline]
pub fn generate_u32_id() -> u32 {
    loop {
        let id = GLOBAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        if id != 0 {
            return id;
        }
    }
}
