use crate::context::OperationContext;
use crate::error::{PipelineError, PipelineResult};
use crate::loader::{DocumentLoader, ReadLocale, ReadSource};
use crate::step::Step;
use async_trait::async_trait;
use folio_model::{Operation, VersionOperation};

/// Loads the stored document an update or delete starts from.
///
/// Updates read the locale being written without fallback, so values of
/// another locale never leak in. An area without a stored document has no
/// original; its update creates it.
pub struct FetchOriginal {
    loader: DocumentLoader,
}

impl FetchOriginal {
    pub fn new(loader: DocumentLoader) -> Self {
        Self { loader }
    }
}

#[async_trait]
impl Step for FetchOriginal {
    fn name(&self) -> &'static str {
        "fetch_original"
    }

    async fn run(&self, mut ctx: OperationContext) -> PipelineResult<OperationContext> {
        let id = ctx.require_id()?;
        let source = match (ctx.version_operation, ctx.params.version_id) {
            (Some(VersionOperation::UpdateVersion), Some(version_id)) => {
                ReadSource::Version(version_id)
            }
            _ => ReadSource::Main,
        };
        let locale = ReadLocale {
            locale: &ctx.locale,
            fallback: None,
        };
        let original = self.loader.load(&ctx.collection, id, locale, source).await?;
        match original {
            Some(doc) => ctx.original = Some(doc),
            None if ctx.collection.is_area() && ctx.operation == Operation::Update => {}
            None => return Err(PipelineError::NotFound(format!("{}/{}", ctx.slug(), id))),
        }
        Ok(ctx)
    }
}
