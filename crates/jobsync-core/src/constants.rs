//! Defaults shared by configuration and the services.

/// Collection holding one document per work session.
pub const DEFAULT_COLLECTION: &str = "job_logs";

/// Prefix of every photo object in the blob store.
pub const DEFAULT_PHOTO_PREFIX: &str = "job-photos";

pub const CONFIRM_TIMEOUT_SECS: u64 = 15;
pub const SAFETY_TIMEOUT_SECS: u64 = 20;
pub const AUTOSAVE_QUIET_MS: u64 = 1000;
pub const GEO_TIMEOUT_SECS: u64 = 8;
pub const GEO_MAX_AGE_SECS: u64 = 60;
pub const MAX_PHOTO_SIZE_MB: u64 = 10;

pub const RECENT_SHOWN: usize = 5;
pub const RECENT_PRIMARY_LIMIT: usize = 10;
pub const RECENT_FALLBACK_LIMIT: usize = 200;

/// Job type selected before the first clock-in.
pub const DEFAULT_JOB_TYPE: &str = "Service Call";

/// Job types offered by the selector. Free-form values are accepted as well.
pub const JOB_TYPE_PRESETS: [&str; 4] = [
    "Service Call",
    "Installation",
    "Preventative Maintenance",
    "Consultation",
];

/// Label used when a completed session carries no job type.
pub const UNKNOWN_JOB_TYPE_LABEL: &str = "General";
