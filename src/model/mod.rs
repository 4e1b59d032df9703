//! Domain types: candidate profile, run policy, postings, and application records.

pub mod application;
pub mod policy;
pub mod posting;
pub mod profile;

pub use application::{
    ApplicationRecord, ApplicationStatus, Confidence, EvidenceEntry, GeneratedMaterials,
    SourceDetail,
};
pub use policy::Policy;
pub use posting::{Posting, QueueItem};
pub use profile::{Constraints, Education, Experience, Fact, Profile, Project, ProofItem};
