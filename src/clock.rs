// Host clock. All deadlines in the settlement core are compared against
// unix seconds passed in explicitly, so tests can drive time themselves;
// the HTTP layer reads the wall clock here.

use std::time::{SystemTime, UNIX_EPOCH};

pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}
