// Shared data model: candidate profiles, job requirements, ranked results and per-candidate warnings.
// Everything here is plain serde data; behavior lives in profile/, screening/ and extraction/.

pub mod candidate;
pub mod ranking;
pub mod requirements;
pub mod warnings;
