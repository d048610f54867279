mod downloader;
mod resolve;

pub use downloader::SegmentDownloader;
pub use resolve::resolve_segment_url;
