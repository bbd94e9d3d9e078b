//! Service modules for the NAP audit pipeline
//!
//! Record source → places lookup → comparator → result sink, driven by the
//! audit runner.

pub mod audit_runner;
pub mod comparator;
pub mod places_client;
pub mod record_source;
pub mod result_sink;

pub use audit_runner::AuditRunner;
pub use comparator::{Comparison, NapComparator};
pub use places_client::{LookupError, PlaceLookup, PlacesClient, SearchQuery};
pub use record_source::RecordSource;
pub use result_sink::{read_rows, BlobSink, FileSink, ResultSink};
