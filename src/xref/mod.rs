pub mod global;

use crate::tags::TagIndex;
use anyhow::Result;

/// A secondary source of definitions, queried per symbol.
///
/// Results come back in the same [`TagIndex`] shape as a parsed tags file, so
/// they can be fed straight into the resolver.
#[async_trait::async_trait]
pub trait DefinitionSource: Send + Sync {
    async fn definitions(&self, symbol: &str) -> Result<TagIndex>;
    fn name(&self) -> &str;
}
