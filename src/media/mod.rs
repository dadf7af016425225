//! Media queries: feature table, expressions, query lists, and result cache keys.

pub mod cache_key;
pub mod device;
pub mod expression;
pub mod feature;
pub mod query;

pub use cache_key::MediaQueryResultCacheKey;
pub use device::{Device, MediaContext, Scan};
pub use expression::{MediaExpression, Range};
pub use feature::{find_feature, Length, LengthUnit, MediaFeature, MediaValue, ResolutionUnit};
pub use query::{MediaList, MediaQuery};
