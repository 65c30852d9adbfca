//! Worker pool for one screening batch.
//!
//! Architecture: up to `max_concurrency` worker tasks (never more than there are documents) share a bounded job queue. Each worker runs
//! extraction and profile building on the blocking thread pool under the per-document
//! timeout, scores the result on the async side and sends the row back over the results
//! channel. Only the vocabulary and the similarity cache are shared between workers.

use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::ScreeningConfig;
use crate::extraction::{ExtractionError, ResumeDocument};
use crate::models::candidate::{AnalyzedCandidate, DocumentStatus};
use crate::models::ranking::ScoredCandidate;
use crate::models::requirements::JobRequirements;
use crate::models::warnings::{CandidateWarning, Stage, WarningKind};
use crate::profile::vocabulary::SkillVocabulary;
use crate::profile::{self, ProfileOptions};
use crate::screening::fit_scoring::FitScorer;

/// Read-only inputs shared by every worker in a batch.
pub struct ScreeningContext {
    pub vocabulary: Arc<SkillVocabulary>,
    pub scorer: FitScorer,
    pub requirements: JobRequirements,
    pub config: ScreeningConfig,
    /// "Present" for every document in the batch.
    pub as_of: NaiveDate,
}

/// Submit documents via [`submit()`](ScreeningPool::submit); rows arrive on the results
/// channel handed to [`new()`](ScreeningPool::new). The channel closes once
/// [`shutdown()`](ScreeningPool::shutdown) has drained every worker.
pub struct ScreeningPool {
    job_tx: async_channel::Sender<ResumeDocument>,
    pool_handle: JoinHandle<()>,
    workers: usize,
}

/// Workers worth spawning for `documents` documents under a `max_concurrency` cap.
pub fn worker_count(max_concurrency: usize, documents: usize) -> usize {
    max_concurrency.min(documents).max(1)
}

impl ScreeningPool {
    /// Spawns `workers` worker tasks (at least one).
    pub fn new(
        ctx: Arc<ScreeningContext>,
        workers: usize,
        cancel: CancellationToken,
        result_tx: mpsc::UnboundedSender<ScoredCandidate>,
    ) -> Self {
        let workers = workers.max(1);
        let (job_tx, job_rx) = async_channel::bounded::<ResumeDocument>(workers * 2);

        let pool_handle = tokio::spawn(async move {
            let mut handles = Vec::with_capacity(workers);
            for _ in 0..workers {
                handles.push(tokio::spawn(worker_loop(
                    job_rx.clone(),
                    ctx.clone(),
                    cancel.clone(),
                    result_tx.clone(),
                )));
            }

            // Workers hold the only receivers and senders from here on.
            drop(job_rx);
            drop(result_tx);

            for h in handles {
                if let Err(e) = h.await {
                    warn!("Screening worker exited abnormally: {}", e);
                }
            }
        });

        Self {
            job_tx,
            pool_handle,
            workers,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Queues one document, waiting while the queue is full. Returns false once the pool
    /// has no workers left to receive it.
    pub async fn submit(&self, doc: ResumeDocument) -> bool {
        self.job_tx.send(doc).await.is_ok()
    }

    /// Closes the queue and waits for every worker to finish.
    pub async fn shutdown(self) {
        self.job_tx.close();
        let _ = self.pool_handle.await;
    }
}

async fn worker_loop(
    job_rx: async_channel::Receiver<ResumeDocument>,
    ctx: Arc<ScreeningContext>,
    cancel: CancellationToken,
    result_tx: mpsc::UnboundedSender<ScoredCandidate>,
) {
    // Keep receiving after cancellation so a blocked submitter is never stranded.
    while let Ok(doc) = job_rx.recv().await {
        if cancel.is_cancelled() {
            debug!(candidate_id = %doc.candidate_id, "Skipping document: screening cancelled");
            continue;
        }

        let candidate_id = doc.candidate_id.clone();
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(candidate_id = %candidate_id, "Abandoned in-flight document: screening cancelled");
            }
            row = process_document(doc, &ctx) => {
                let _ = result_tx.send(row);
            }
        }
    }
}

/// Extract → profile → score for one document. Never fails; problems become warnings on
/// an UNREADABLE row.
pub async fn process_document(doc: ResumeDocument, ctx: &ScreeningContext) -> ScoredCandidate {
    let started = Instant::now();
    let timeout = ctx.config.per_document_timeout();
    let candidate_id = doc.candidate_id.clone();

    let options = ProfileOptions {
        fuzzy_match_threshold: ctx.config.fuzzy_match_threshold,
        as_of: ctx.as_of,
        deadline: started.checked_add(timeout),
    };
    let vocabulary = ctx.vocabulary.clone();
    let handle =
        tokio::task::spawn_blocking(move || profile::analyze(&doc, &vocabulary, &options));

    let analyzed = match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(analyzed)) => analyzed,
        Ok(Err(e)) => {
            warn!(candidate_id = %candidate_id, "Document worker failed: {}", e);
            AnalyzedCandidate::unreadable(
                &candidate_id,
                CandidateWarning::new(
                    Stage::Extraction,
                    WarningKind::WorkerFailed,
                    format!("document worker failed: {e}"),
                ),
            )
        }
        Err(_) => AnalyzedCandidate::unreadable(
            &candidate_id,
            profile::extraction_warning(
                Stage::Extraction,
                &ExtractionError::ExtractionTimeout(started.elapsed()),
            ),
        ),
    };

    if analyzed.status == DocumentStatus::Unreadable {
        let reason = analyzed
            .warnings
            .last()
            .map(|w| w.message.as_str())
            .unwrap_or("unknown");
        warn!(candidate_id = %candidate_id, "Document unreadable: {}", reason);
    }

    let row = ctx
        .scorer
        .score(analyzed, &ctx.requirements, &ctx.config)
        .await;

    debug!(
        candidate_id = %candidate_id,
        composite = row.composite_score,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Scored document"
    );
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::docx::tests::build_docx;
    use crate::screening::jd_parser::parse_requirements;
    use crate::similarity::{CachedSimilarity, LexicalSimilarity};
    use bytes::Bytes;

    fn context(config: ScreeningConfig) -> Arc<ScreeningContext> {
        let vocabulary = Arc::new(SkillVocabulary::builtin());
        let requirements =
            parse_requirements("Required: Python, SQL. Preferred: AWS.", &vocabulary).unwrap();
        Arc::new(ScreeningContext {
            vocabulary,
            scorer: FitScorer::new(Arc::new(CachedSimilarity::new(LexicalSimilarity))),
            requirements,
            config,
            as_of: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        })
    }

    fn resume(name: &str, skills: &str) -> ResumeDocument {
        ResumeDocument::new(
            name,
            None,
            Bytes::from(build_docx(&["Skills", skills])),
        )
    }

    async fn run(
        ctx: Arc<ScreeningContext>,
        cancel: CancellationToken,
        docs: Vec<ResumeDocument>,
    ) -> Vec<ScoredCandidate> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let workers = worker_count(ctx.config.max_concurrency, docs.len());
        let pool = ScreeningPool::new(ctx, workers, cancel, tx);
        assert_eq!(pool.workers(), workers);
        for doc in docs {
            assert!(pool.submit(doc).await);
        }
        pool.shutdown().await;

        let mut rows = Vec::new();
        while let Some(row) = rx.recv().await {
            rows.push(row);
        }
        rows.sort_by(|a, b| a.candidate_id.cmp(&b.candidate_id));
        rows
    }

    #[tokio::test]
    async fn test_every_document_yields_a_row() {
        let config = ScreeningConfig {
            max_concurrency: 2,
            ..Default::default()
        };
        let docs: Vec<ResumeDocument> = (0..7)
            .map(|i| resume(&format!("c{i}.docx"), "Python, SQL"))
            .collect();
        let rows = run(context(config), CancellationToken::new(), docs).await;
        assert_eq!(rows.len(), 7);
        assert!(rows.iter().all(|r| r.status == DocumentStatus::Parsed));
    }

    #[test]
    fn test_worker_count_capped_by_document_count() {
        assert_eq!(worker_count(16, 2), 2);
        assert_eq!(worker_count(4, 100), 4);
        assert_eq!(worker_count(4, 0), 1);
    }

    #[tokio::test]
    async fn test_small_batch_spawns_one_worker_per_document() {
        let config = ScreeningConfig {
            max_concurrency: 16,
            ..Default::default()
        };
        let (tx, mut rx) = mpsc::unbounded_channel();
        let pool = ScreeningPool::new(context(config), worker_count(16, 2), CancellationToken::new(), tx);
        assert_eq!(pool.workers(), 2);

        assert!(pool.submit(resume("a.docx", "Python")).await);
        assert!(pool.submit(resume("b.docx", "SQL")).await);
        pool.shutdown().await;

        let mut rows = 0;
        while rx.recv().await.is_some() {
            rows += 1;
        }
        assert_eq!(rows, 2);
    }

    #[tokio::test]
    async fn test_bad_document_does_not_affect_siblings() {
        let docs = vec![
            resume("good.docx", "Python, SQL, AWS"),
            ResumeDocument::new("bad.docx", None, Bytes::from_static(b"not a zip")),
            ResumeDocument::new("notes.txt", None, Bytes::from_static(b"Python")),
        ];
        let rows = run(context(ScreeningConfig::default()), CancellationToken::new(), docs).await;
        assert_eq!(rows.len(), 3);

        let by_id = |id: &str| rows.iter().find(|r| r.candidate_id == id).unwrap();
        assert_eq!(by_id("good.docx").status, DocumentStatus::Parsed);
        assert_eq!(by_id("bad.docx").warnings[0].kind, WarningKind::CorruptDocument);
        assert_eq!(by_id("notes.txt").warnings[0].kind, WarningKind::UnsupportedFormat);
        assert_eq!(by_id("notes.txt").status, DocumentStatus::Unreadable);
    }

    #[tokio::test]
    async fn test_timeout_yields_unreadable_row() {
        let config = ScreeningConfig {
            per_document_timeout_seconds: 1e-9,
            ..Default::default()
        };
        let rows = run(
            context(config),
            CancellationToken::new(),
            vec![resume("slow.docx", "Python")],
        )
        .await;
        assert_eq!(rows[0].status, DocumentStatus::Unreadable);
        assert_eq!(rows[0].warnings[0].kind, WarningKind::ExtractionTimeout);
    }

    #[tokio::test]
    async fn test_cancelled_pool_skips_pending_documents() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let docs = (0..5)
            .map(|i| resume(&format!("c{i}.docx"), "Python"))
            .collect();
        let rows = run(context(ScreeningConfig::default()), cancel, docs).await;
        assert!(rows.is_empty());
    }
}
