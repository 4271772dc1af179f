// src/ingest.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Connection;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument};

use crate::{
    config::{Config, ConfigError},
    process::{derive_emails, normalize, NormalizeOptions, StudentRecord},
    sheets::{SheetError, SheetSource},
    store::{insert_student, resolve, NewStudent, SectionKey, Session, SpecialityKey},
};

/// Self-imposed pause between batches.
#[async_trait]
pub trait Throttle: Send {
    async fn pause(&mut self, delay: Duration);
}

/// Sleeps on the tokio timer.
pub struct Sleep;

#[async_trait]
impl Throttle for Sleep {
    async fn pause(&mut self, delay: Duration) {
        sleep(delay).await;
    }
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub batch_size: usize,
    pub delay: Duration,
    pub normalize: NormalizeOptions,
    /// Derive `email`/`email_alt` when set.
    pub email_domain: Option<String>,
}

impl From<&Config> for IngestOptions {
    fn from(cfg: &Config) -> Self {
        Self {
            batch_size: cfg.batch_size,
            delay: cfg.delay(),
            normalize: cfg.normalize_options(),
            email_domain: cfg.email_domain.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Size of every batch, in order.
    pub batches: Vec<usize>,
    pub sheets_ok: usize,
    pub sheets_failed: Vec<String>,
    pub records: usize,
}

impl RunSummary {
    fn start() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            batches: Vec::new(),
            sheets_ok: 0,
            sheets_failed: Vec::new(),
            records: 0,
        }
    }
}

/// Drives a run: sheets are read, normalized and written one at a time,
/// with one transaction per sheet.
pub struct Ingest<'s, S, T> {
    session: Session,
    source: &'s S,
    throttle: T,
    opts: IngestOptions,
}

impl<'s, S: SheetSource, T: Throttle> Ingest<'s, S, T> {
    pub fn new(
        session: Session,
        source: &'s S,
        throttle: T,
        opts: IngestOptions,
    ) -> Result<Self, ConfigError> {
        if opts.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        Ok(Self {
            session,
            source,
            throttle,
            opts,
        })
    }

    pub fn session(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Process every URL. Per-sheet failures are logged and skipped; the
    /// throttle runs after each batch, the last one included.
    pub async fn run(&mut self, urls: &[String]) -> RunSummary {
        let mut summary = RunSummary::start();
        let total = urls.len().div_ceil(self.opts.batch_size);

        for (n, batch) in urls.chunks(self.opts.batch_size).enumerate() {
            info!(batch = n + 1, of = total, size = batch.len(), "starting batch");

            for url in batch {
                match self.ingest_sheet(url).await {
                    Ok(count) => {
                        summary.sheets_ok += 1;
                        summary.records += count;
                    }
                    Err(e) => {
                        match e.downcast_ref::<SheetError>() {
                            Some(SheetError::Api { status, message }) => {
                                error!(%url, status, %message, "API error accessing sheet")
                            }
                            _ => error!(%url, error = %format!("{:#}", e), "error accessing sheet"),
                        }
                        summary.sheets_failed.push(url.clone());
                    }
                }
            }

            summary.batches.push(batch.len());
            info!(
                delay_secs = self.opts.delay.as_secs_f64(),
                "delaying before the next batch"
            );
            self.throttle.pause(self.opts.delay).await;
        }

        let finished_at = Utc::now();
        let elapsed = finished_at - summary.started_at;
        summary.finished_at = Some(finished_at);
        info!(
            started_at = %summary.started_at,
            elapsed_secs = elapsed.num_milliseconds() as f64 / 1000.0,
            ok = summary.sheets_ok,
            failed = summary.sheets_failed.len(),
            records = summary.records,
            "run finished"
        );
        summary
    }

    /// Read one sheet and commit all its records, or nothing.
    #[instrument(level = "info", skip(self))]
    async fn ingest_sheet(&mut self, url: &str) -> Result<usize> {
        let rows = self.source.read_first_sheet(url).await?;
        let records = normalize(&rows, &self.opts.normalize);
        info!(rows = rows.len(), records = records.len(), "data from sheet");

        let mut tx = self
            .session
            .conn()
            .begin()
            .await
            .context("opening transaction")?;

        for (idx, rec) in records.iter().enumerate() {
            let student = StudentRecord::from(rec);

            let speciality =
                SpecialityKey::new(student.palier.as_deref(), student.specialite.as_deref());
            let section = SectionKey::new(student.section.as_deref());
            let speciality_id = resolve(&mut *tx, &speciality).await?;
            let section_id = resolve(&mut *tx, &section).await?;

            let emails = self.opts.email_domain.as_deref().map(|domain| {
                derive_emails(
                    student.prenom.as_deref().unwrap_or_default(),
                    student.nom.as_deref().unwrap_or_default(),
                    domain,
                )
            });

            let row = NewStudent {
                record: &student,
                speciality_id,
                section_id,
                emails,
            };
            insert_student(&mut *tx, &row).await?;
            debug!(record = idx + 1, ?student, "inserted");
        }

        tx.commit().await.context("committing sheet")?;
        Ok(records.len())
    }

    /// End of run: release the database session.
    pub async fn close(self) -> Result<()> {
        self.session.close().await
    }
}
