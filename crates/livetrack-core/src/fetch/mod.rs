pub mod query;
pub mod source;

pub use query::{CacheStamp, StatisticsQuery};
pub use source::{FetchError, HttpStatisticsSource, StatisticsSource};
