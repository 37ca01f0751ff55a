pub mod document;
pub mod fields;
pub mod location;
pub mod photo;
pub mod session;

pub use document::Document;
pub use location::GeoPoint;
pub use photo::{JobPhoto, PhotoKind, UploadKind};
pub use session::{DetailField, JobDetails, JobSession, NewJobSession, SessionStatus};
