pub mod token;

use chrono::{DateTime, SubsecRound, Utc};

/// Current time at the microsecond precision the database keeps.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
