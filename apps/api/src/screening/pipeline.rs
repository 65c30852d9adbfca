//! Batch screening: validate → parse requirements → fan out to the pool → collect → rank.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ScreeningConfig;
use crate::extraction::ResumeDocument;
use crate::models::candidate::AnalyzedCandidate;
use crate::models::ranking::{RankedList, ScoredCandidate};
use crate::models::requirements::JobRequirements;
use crate::models::warnings::{CandidateWarning, Stage, WarningKind};
use crate::profile::vocabulary::SkillVocabulary;
use crate::screening::fit_scoring::FitScorer;
use crate::screening::pool::{worker_count, ScreeningContext, ScreeningPool};
use crate::screening::{jd_parser, ranker, ScreeningError};
use crate::similarity::SimilarityScorer;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningReport {
    pub screening_id: Uuid,
    pub requirements: JobRequirements,
    pub ranked: RankedList,
}

/// Screens `docs` against `job_description`. Per-document failures become UNREADABLE rows;
/// only configuration problems, an empty job description or cancellation fail the batch.
pub async fn run_batch(
    mut docs: Vec<ResumeDocument>,
    job_description: &str,
    config: &ScreeningConfig,
    vocabulary: Arc<SkillVocabulary>,
    similarity: Arc<dyn SimilarityScorer>,
    cancel: CancellationToken,
) -> Result<ScreeningReport, ScreeningError> {
    config.validate()?;
    let requirements = jd_parser::parse_requirements(job_description, &vocabulary)?;

    let screening_id = Uuid::new_v4();
    let started = Instant::now();
    let as_of = config
        .as_of
        .unwrap_or_else(|| chrono::Utc::now().date_naive());

    make_ids_unique(&mut docs);
    let expected: Vec<String> = docs.iter().map(|d| d.candidate_id.clone()).collect();
    let workers = worker_count(config.max_concurrency, docs.len());

    info!(
        %screening_id,
        documents = docs.len(),
        workers,
        required = requirements.required_skills.len(),
        preferred = requirements.preferred_skills.len(),
        backend = similarity.backend(),
        "Screening started"
    );

    let scorer = FitScorer::new(similarity);
    let ctx = Arc::new(ScreeningContext {
        vocabulary,
        scorer: scorer.clone(),
        requirements: requirements.clone(),
        config: config.clone(),
        as_of,
    });

    let (result_tx, mut result_rx) = mpsc::unbounded_channel();
    let pool = ScreeningPool::new(ctx, workers, cancel.clone(), result_tx);
    for doc in docs {
        if cancel.is_cancelled() || !pool.submit(doc).await {
            break;
        }
    }
    pool.shutdown().await;

    let mut rows: HashMap<String, ScoredCandidate> = HashMap::with_capacity(expected.len());
    while let Some(row) = result_rx.recv().await {
        rows.insert(row.candidate_id.clone(), row);
    }

    if cancel.is_cancelled() {
        info!(
            %screening_id,
            completed = rows.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Screening cancelled"
        );
        return Err(ScreeningError::Cancelled);
    }

    let mut collected = Vec::with_capacity(expected.len());
    for candidate_id in &expected {
        match rows.remove(candidate_id) {
            Some(row) => collected.push(row),
            None => {
                warn!(%screening_id, candidate_id = %candidate_id, "No result for document, marking unreadable");
                let missing = AnalyzedCandidate::unreadable(
                    candidate_id,
                    CandidateWarning::new(
                        Stage::Extraction,
                        WarningKind::WorkerFailed,
                        "document produced no result",
                    ),
                );
                collected.push(scorer.score(missing, &requirements, config).await);
            }
        }
    }

    let ranked = ranker::rank(collected);

    info!(
        %screening_id,
        documents = ranked.len(),
        top = ranked.candidates.first().map(|c| c.candidate_id.as_str()).unwrap_or("-"),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Screening finished"
    );

    Ok(ScreeningReport {
        screening_id,
        requirements,
        ranked,
    })
}

/// Candidate IDs must be unique for ranking and result collection; repeats get " (2)", " (3)", ….
fn make_ids_unique(docs: &mut [ResumeDocument]) {
    let mut seen: HashSet<String> = HashSet::new();
    for doc in docs.iter_mut() {
        if seen.insert(doc.candidate_id.clone()) {
            continue;
        }
        let mut n = 2;
        let unique = loop {
            let attempt = format!("{} ({n})", doc.candidate_id);
            if !seen.contains(&attempt) {
                break attempt;
            }
            n += 1;
        };
        seen.insert(unique.clone());
        doc.candidate_id = unique;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FactorWeights;
    use crate::extraction::docx::tests::build_docx;
    use crate::extraction::pdf::tests::build_pdf;
    use crate::models::candidate::DocumentStatus;
    use crate::similarity::{CachedSimilarity, LexicalSimilarity};
    use bytes::Bytes;
    use chrono::NaiveDate;

    const JD: &str = "Required: Python, SQL. Preferred: AWS. Bachelor's degree and 3 years experience.";

    fn config() -> ScreeningConfig {
        ScreeningConfig {
            as_of: NaiveDate::from_ymd_opt(2024, 6, 1),
            ..Default::default()
        }
    }

    fn similarity() -> Arc<dyn SimilarityScorer> {
        Arc::new(CachedSimilarity::new(LexicalSimilarity))
    }

    fn candidate_a() -> ResumeDocument {
        ResumeDocument::new(
            "a.docx",
            None,
            Bytes::from(build_docx(&[
                "Alice Example",
                "Skills",
                "Python, SQL, AWS",
                "Experience",
                "Data Engineer, Acme, Jan 2019 - Jan 2024",
                "Education",
                "Bachelor of Science in Computer Science",
            ])),
        )
    }

    fn candidate_b() -> ResumeDocument {
        ResumeDocument::new(
            "b.pdf",
            Some("application/pdf"),
            Bytes::from(build_pdf(&[&[
                "Bob Example",
                "Skills",
                "Python",
                "Experience",
                "Junior Developer, Initech, Jan 2023 - Jan 2024",
            ]])),
        )
    }

    async fn screen(docs: Vec<ResumeDocument>, config: &ScreeningConfig) -> ScreeningReport {
        run_batch(
            docs,
            JD,
            config,
            Arc::new(SkillVocabulary::builtin()),
            similarity(),
            CancellationToken::new(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_end_to_end_ranking() {
        let report = screen(vec![candidate_b(), candidate_a()], &config()).await;
        let ranked = &report.ranked;

        assert_eq!(ranked.candidate_ids(), vec!["a.docx", "b.pdf"]);
        let a = &ranked.candidates[0];
        let b = &ranked.candidates[1];
        assert_eq!(a.rank, 1);
        assert_eq!(a.composite_score, 100);
        assert_eq!(b.rank, 2);
        assert!(b.composite_score < 40, "b scored {}", b.composite_score);
        assert_eq!(b.missing_required_skills, vec!["SQL"]);
        assert_eq!(b.status, DocumentStatus::Parsed);
    }

    #[tokio::test]
    async fn test_identical_inputs_serialize_identically() {
        let first = screen(vec![candidate_a(), candidate_b()], &config()).await;
        let second = screen(vec![candidate_a(), candidate_b()], &config()).await;
        assert_eq!(
            serde_json::to_vec(&first.ranked).unwrap(),
            serde_json::to_vec(&second.ranked).unwrap()
        );
        assert_ne!(first.screening_id, second.screening_id);
    }

    #[tokio::test]
    async fn test_unreadable_documents_still_ranked() {
        let docs = vec![
            candidate_a(),
            ResumeDocument::new("scan.png", Some("image/png"), Bytes::from_static(b"\x89PNG")),
            ResumeDocument::new("broken.pdf", None, Bytes::from_static(b"%PDF-1.4 truncated")),
        ];
        let report = screen(docs, &config()).await;
        assert_eq!(report.ranked.len(), 3);
        assert_eq!(report.ranked.candidates[0].candidate_id, "a.docx");

        let unreadable: Vec<&str> = report
            .ranked
            .candidates
            .iter()
            .filter(|c| c.status == DocumentStatus::Unreadable)
            .map(|c| c.candidate_id.as_str())
            .collect();
        assert_eq!(unreadable, vec!["broken.pdf", "scan.png"]);
    }

    #[tokio::test]
    async fn test_duplicate_ids_are_suffixed() {
        let report = screen(vec![candidate_a(), candidate_a()], &config()).await;
        assert_eq!(report.ranked.candidate_ids(), vec!["a.docx", "a.docx (2)"]);
    }

    #[tokio::test]
    async fn test_invalid_weights_fail_before_processing() {
        let bad = ScreeningConfig {
            factor_weights: FactorWeights {
                skills: 50.0,
                experience: 25.0,
                education: 15.0,
            },
            ..config()
        };
        let err = run_batch(
            vec![candidate_a()],
            JD,
            &bad,
            Arc::new(SkillVocabulary::builtin()),
            similarity(),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ScreeningError::InvalidWeightConfig(_)));
    }

    #[tokio::test]
    async fn test_empty_job_description_is_fatal() {
        let err = run_batch(
            vec![candidate_a()],
            "  ",
            &config(),
            Arc::new(SkillVocabulary::builtin()),
            similarity(),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ScreeningError::EmptyJobDescription));
    }

    #[tokio::test]
    async fn test_cancelled_batch_returns_error() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = run_batch(
            vec![candidate_a(), candidate_b()],
            JD,
            &config(),
            Arc::new(SkillVocabulary::builtin()),
            similarity(),
            cancel,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ScreeningError::Cancelled));
    }

    #[test]
    fn test_make_ids_unique() {
        let doc = |id: &str| ResumeDocument::new(id, None, Bytes::new());
        let mut docs = vec![doc("x"), doc("x (2)"), doc("x"), doc("x")];
        make_ids_unique(&mut docs);
        let ids: Vec<&str> = docs.iter().map(|d| d.candidate_id.as_str()).collect();
        assert_eq!(ids, vec!["x", "x (2)", "x (3)", "x (4)"]);
    }
}
