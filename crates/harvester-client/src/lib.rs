pub mod currency;
pub mod enrichment;
pub mod extract;
pub mod fetcher;
pub mod text;

pub use currency::ErApiConverter;
pub use enrichment::PolygonClient;
pub use extract::{ExtractorRegistry, PropertyExtractor};
pub use fetcher::ReqwestFetcher;
