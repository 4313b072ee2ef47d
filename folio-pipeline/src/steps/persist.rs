//! Persistence of a written document: root row, block and tree rows,
//! relation rows and version rows.
//!
//! All of these are skipped for transitions that only touch version rows.
//! Independent row writes of one step are issued concurrently through the
//! shared transaction.

use crate::context::OperationContext;
use crate::error::{PipelineError, PipelineResult};
use crate::step::Step;
use async_trait::async_trait;
use chrono::Utc;
use folio_diff::{diff_relations, diff_tree};
use folio_model::{
    BlockIdent, Data, DocumentStatus, Operation, TreeBlock, VersionOperation, assemble_document,
    split_document,
};
use folio_storage::{RootData, RowTable, VersionRow};
use folio_types::{DocumentId, RowId, VersionId};
use futures::future::try_join_all;
use tracing::debug;

fn root_status(ctx: &OperationContext) -> Option<DocumentStatus> {
    if !ctx.collection.has_drafts() {
        return None;
    }
    match (ctx.operation, ctx.params.draft) {
        (Operation::Create, Some(true)) => Some(DocumentStatus::Draft),
        _ => Some(DocumentStatus::Published),
    }
}

/// Writes the shared root data and the locale row, splitting the data into
/// rows for the steps that follow. Assigns the document id on create.
pub struct PersistRoot;

#[async_trait]
impl Step for PersistRoot {
    fn name(&self) -> &'static str {
        "persist_root"
    }

    async fn run(&self, mut ctx: OperationContext) -> PipelineResult<OperationContext> {
        if !ctx.writes_main_document() {
            return Ok(ctx);
        }
        let id = *ctx.params.id.get_or_insert_with(DocumentId::new);
        let split = split_document(&ctx.collection.fields, &ctx.data, Some(&ctx.locale))?;
        let root = RootData {
            shared: split.shared.clone(),
            locale: ctx.locale.clone(),
            localized: split.localized.clone(),
            status: root_status(&ctx),
        };

        let tx = ctx.transaction()?;
        match ctx.operation {
            Operation::Create => tx.create_root(ctx.slug(), id, &root).await?,
            _ => tx.update_root(ctx.slug(), id, &root).await?,
        }
        debug!(
            "{}/{}: root written ({} block, {} tree, {} relation rows pending)",
            ctx.slug(),
            id,
            split.blocks.len(),
            split.tree.len(),
            split.relations.len()
        );
        ctx.rows = Some(split);
        Ok(ctx)
    }
}

/// Reconciles the stored block or tree rows of the written locale with the
/// incoming ones.
///
/// Added rows always get a fresh id; the id is written back into the split
/// rows so the version snapshot matches what was stored.
pub struct PersistRows {
    table: RowTable,
}

impl PersistRows {
    pub fn blocks() -> Self {
        Self { table: RowTable::Blocks }
    }

    pub fn tree() -> Self {
        Self { table: RowTable::Tree }
    }
}

#[async_trait]
impl Step for PersistRows {
    fn name(&self) -> &'static str {
        match self.table {
            RowTable::Blocks => "persist_blocks",
            RowTable::Tree => "persist_tree",
        }
    }

    async fn run(&self, mut ctx: OperationContext) -> PipelineResult<OperationContext> {
        if !ctx.writes_main_document() {
            return Ok(ctx);
        }
        let id = ctx.require_id()?;
        let existing: Vec<TreeBlock> = match ctx.operation {
            Operation::Create => Vec::new(),
            _ => ctx
                .transaction()?
                .rows(self.table, ctx.slug(), id)
                .await?
                .into_iter()
                .filter(|row| row.locale.as_ref().is_none_or(|l| *l == ctx.locale))
                .collect(),
        };
        let mut rows = ctx
            .rows
            .take()
            .ok_or_else(|| PipelineError::Operation("document was not split into rows".into()))?;
        let incoming = match self.table {
            RowTable::Blocks => &mut rows.blocks,
            RowTable::Tree => &mut rows.tree,
        };

        let diff = diff_tree(&existing, incoming);
        let mut added = Vec::with_capacity(diff.to_add.len());
        let mut pending = diff.to_add.iter().peekable();
        for row in incoming.iter_mut() {
            if pending.peek().is_some_and(|next| **next == *row) {
                pending.next();
                let row_id = RowId::new();
                row.id = Some(BlockIdent::Stable(row_id));
                added.push((row_id, row.clone()));
            }
        }

        {
            let tx = ctx.transaction()?;
            let slug = ctx.slug();
            try_join_all(
                added
                    .iter()
                    .map(|(row_id, row)| tx.create_row(self.table, slug, id, *row_id, row)),
            )
            .await?;
            try_join_all(
                diff.to_update
                    .iter()
                    .filter_map(|row| row.stable_id().map(|row_id| (row_id, row)))
                    .map(|(row_id, row)| tx.update_row(self.table, row_id, row)),
            )
            .await?;
            try_join_all(
                diff.to_delete
                    .iter()
                    .filter_map(TreeBlock::stable_id)
                    .map(|row_id| tx.delete_row(self.table, row_id)),
            )
            .await?;
        }
        debug!(
            "{}/{}: {} +{} ~{} -{}",
            ctx.slug(),
            id,
            self.table,
            diff.to_add.len(),
            diff.to_update.len(),
            diff.to_delete.len()
        );

        ctx.rows = Some(rows);
        match self.table {
            RowTable::Blocks => ctx.diffs.blocks = Some(diff),
            RowTable::Tree => ctx.diffs.tree = Some(diff),
        }
        Ok(ctx)
    }
}

/// Reconciles stored relation rows with the incoming references. Rows of
/// other locales are left alone.
pub struct PersistRelations;

#[async_trait]
impl Step for PersistRelations {
    fn name(&self) -> &'static str {
        "persist_relations"
    }

    async fn run(&self, mut ctx: OperationContext) -> PipelineResult<OperationContext> {
        if !ctx.writes_main_document() {
            return Ok(ctx);
        }
        let id = ctx.require_id()?;
        let existing = match ctx.operation {
            Operation::Create => Vec::new(),
            _ => ctx.transaction()?.relations(ctx.slug(), id).await?,
        };
        let incoming = ctx
            .rows
            .as_ref()
            .map(|rows| rows.relations.as_slice())
            .ok_or_else(|| PipelineError::Operation("document was not split into rows".into()))?;
        let diff = diff_relations(&existing, incoming, Some(&ctx.locale));

        {
            let tx = ctx.transaction()?;
            let slug = ctx.slug();
            try_join_all(
                diff.to_add
                    .iter()
                    .map(|record| tx.create_relation(slug, id, RowId::new(), record)),
            )
            .await?;
            try_join_all(
                diff.to_update
                    .iter()
                    .filter_map(|record| record.id.map(|row_id| (row_id, record)))
                    .map(|(row_id, record)| tx.update_relation(row_id, record)),
            )
            .await?;
            try_join_all(
                diff.to_delete
                    .iter()
                    .filter_map(|record| record.id)
                    .map(|row_id| tx.delete_relation(row_id)),
            )
            .await?;
        }
        debug!(
            "{}/{}: relations +{} ~{} -{} ({} kept for other locales)",
            ctx.slug(),
            id,
            diff.to_add.len(),
            diff.to_update.len(),
            diff.to_delete.len(),
            diff.preserved.len()
        );
        ctx.diffs.relations = Some(diff);
        Ok(ctx)
    }
}

/// Records the version row a transition calls for and prunes old ones.
///
/// Creates of versioned collections record their first version. The id of
/// an inserted version becomes the addressed version of the run so draft
/// saves re-read what they wrote.
pub struct PersistVersion;

impl PersistVersion {
    fn snapshot(ctx: &OperationContext) -> Data {
        match (&ctx.rows, ctx.writes_main_document()) {
            (Some(rows), true) => assemble_document(
                &ctx.collection.fields,
                &rows.shared,
                Some(&rows.localized),
                &rows.blocks,
                &rows.tree,
                &rows.relations,
            ),
            _ => ctx.data.clone(),
        }
    }
}

#[async_trait]
impl Step for PersistVersion {
    fn name(&self) -> &'static str {
        "persist_version"
    }

    async fn run(&self, mut ctx: OperationContext) -> PipelineResult<OperationContext> {
        let Some(versions) = ctx.collection.versions.clone() else {
            return Ok(ctx);
        };
        let id = ctx.require_id()?;
        let status = match (ctx.operation, ctx.version_operation) {
            (Operation::Create, _) => root_status(&ctx).unwrap_or(DocumentStatus::Published),
            (_, Some(VersionOperation::UpdateVersion)) => {
                let version_id = ctx.params.version_id.ok_or_else(|| {
                    PipelineError::Operation("version update without a version id".into())
                })?;
                let status = ctx
                    .original
                    .as_ref()
                    .and_then(|original| original.status)
                    .unwrap_or(DocumentStatus::Draft);
                let data = Self::snapshot(&ctx);
                ctx.transaction()?.update_version(version_id, status, &data).await?;
                debug!("{}/{}: version {} rewritten", ctx.slug(), id, version_id);
                return Ok(ctx);
            }
            (_, Some(transition)) if transition.inserts_version() => transition
                .version_status()
                .unwrap_or(DocumentStatus::Published),
            _ => return Ok(ctx),
        };

        let now = Utc::now();
        let version = VersionRow {
            id: VersionId::new(),
            collection: ctx.slug().to_string(),
            parent_id: id,
            status,
            locale: ctx.locale.clone(),
            data: Self::snapshot(&ctx),
            created_at: now,
            updated_at: now,
        };
        let tx = ctx.transaction()?;
        tx.insert_version(&version).await?;
        if let Some(keep) = versions.max_per_doc {
            let pruned = tx.prune_versions(ctx.slug(), id, keep as usize).await?;
            if pruned > 0 {
                debug!("{}/{}: pruned {} old versions", ctx.slug(), id, pruned);
            }
        }
        debug!("{}/{}: {} version {} recorded", ctx.slug(), id, status.as_str(), version.id);
        ctx.params.version_id = Some(version.id);
        Ok(ctx)
    }
}
