// Live manifest tracking: parsing, the known-segment window and the refresh step.

mod fetcher;
mod parser;
mod state;

pub use fetcher::ManifestFetcher;
pub use parser::{ParsedManifest, parse_manifest};
pub use state::{ManifestState, MergeOutcome, Segment, merge_segments};
