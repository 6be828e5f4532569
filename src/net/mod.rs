//! Network Collaborators
//!
//! URL probing and sitemap resolution, both behind traits so stage tests
//! run against scripted doubles.

pub mod probe;
pub mod sitemap;

pub use probe::{HttpProber, ProbeOutcome, SharedProber, UrlProber, probe_all};
pub use sitemap::{CompanyResolver, SharedResolver, SitemapResolver};
