//! Field names of the `job_logs` documents.

pub const USER_ID: &str = "userId";
pub const STATUS: &str = "status";
pub const START_TIME: &str = "startTime";
pub const END_TIME: &str = "endTime";
pub const JOB_TYPE: &str = "jobType";
pub const SITE_NAME: &str = "siteName";
pub const ADDRESS: &str = "address";
pub const CONTACT_NAME: &str = "contactName";
pub const CONTACT_PHONE: &str = "contactPhone";
pub const NOTES: &str = "notes";
pub const START_LOCATION: &str = "startLocation";
pub const END_LOCATION: &str = "endLocation";
pub const PHOTOS: &str = "photos";
pub const CLIENT_TOKEN: &str = "clientToken";
