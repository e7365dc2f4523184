//! AnalystPool and ContradictionDetector: the two consumers of ingested
//! document content that reason over tenant-defined rules and cross-document
//! relationships. Both degrade to keyword heuristics when the LLM is
//! unavailable rather than failing the ingest pipeline.

use std::sync::Arc;

use chrono::Utc;
use hive_core::model::{
    GraphEdgeRecord, MatchType, Notification, NotificationLevel, RelationshipType, Rule,
    RuleEvent, RuleEventStatus, RuleEventType, RuleMatch,
};
use hive_core::ports::{
    EmbeddingPort, GraphStorePort, LlmClient, NotificationSender, RuleEventStorePort,
    RuleMatchStorePort, RuleStorePort,
};
use storage::vector_store::VectorStore;
use tracing::{debug, warn};

use crate::queue::AnalystJob;
use crate::worker_pool::WorkerPool;

const DEFAULT_WORKERS: usize = 3;
const QUEUE_CAPACITY: usize = 100;
const CROSS_DOC_CANDIDATES: usize = 10;
const CONTRADICTION_PEERS: usize = 5;

const CROSS_DOC_KEYWORDS: &[&str] = &[
    "contradict",
    "agreement",
    "existing document",
    "other document",
    "previous document",
    "conflict",
    "violate",
    "inconsistent",
];

/// Keyword tie-break used for cross-doc rules when the LLM is unavailable.
const CROSS_DOC_FALLBACK_KEYWORDS: &[&str] = &["confidential", "pricing", "price", "secret"];

fn is_cross_doc_rule(query: &str) -> bool {
    let lower = query.to_lowercase();
    CROSS_DOC_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

fn rule_hit_single(query: &str, filename: &str) -> String {
    format!("\u{26A0}\u{FE0F} Rule Hit: '{query}' detected in {filename}")
}

fn rule_hit_cross(query: &str, filename: &str, candidate: &str) -> String {
    format!("\u{26A0}\u{FE0F} Rule Hit: '{query}' detected between {filename} and {candidate}")
}

fn single_doc_prompt(query: &str, content: &str) -> String {
    format!(
        "Does the following document match the rule \"{query}\"? Answer YES or NO, then a short reason.\n\n{content}"
    )
}

fn cross_doc_prompt(query: &str, content: &str, candidate_content: &str) -> String {
    format!(
        "Rule: \"{query}\". Document A:\n{content}\n\nDocument B:\n{candidate_content}\n\nDoes the rule apply across these two documents? Answer YES or NO, then a short reason."
    )
}

fn contradiction_prompt(content: &str, candidate_content: &str) -> String {
    format!(
        "Document A:\n{content}\n\nDocument B:\n{candidate_content}\n\nDo these two documents contradict each other? Answer YES or NO, then a short reason."
    )
}

fn parse_yes(response: &str) -> bool {
    response.trim_start().to_uppercase().starts_with("YES")
}

fn explanation_of(response: &str) -> String {
    response.splitn(2, '\n').nth(1).unwrap_or(response).trim().to_string()
}

const SNIPPET_WINDOW_CHARS: usize = 500;
const MAX_SINGLE_DOC_SNIPPETS: usize = 3;

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// First 3 `SNIPPET_WINDOW_CHARS`-wide chunks of `content`, reusing the same
/// sentence-boundary-aware splitter the ingest pipeline chunks documents
/// with, just at a tighter target size suited to a rule-match excerpt.
fn single_doc_snippets(content: &str) -> Vec<String> {
    hive_core::chunker::chunk_text_with(content, SNIPPET_WINDOW_CHARS, 0)
        .into_iter()
        .take(MAX_SINGLE_DOC_SNIPPETS)
        .map(|chunk| chunk.content)
        .collect()
}

fn cross_doc_snippets(filename: &str, content: &str, candidate_id: &str, candidate_content: &str) -> Vec<String> {
    vec![
        format!("{filename}: {}", truncate_chars(content, SNIPPET_WINDOW_CHARS)),
        format!("{candidate_id}: {}", truncate_chars(candidate_content, SNIPPET_WINDOW_CHARS)),
    ]
}

pub struct AnalystContext {
    pub llm: Arc<dyn LlmClient>,
    pub embedder: Arc<dyn EmbeddingPort>,
    pub vector_store: Arc<VectorStore>,
    pub rule_store: Arc<dyn RuleStorePort>,
    pub rule_match_store: Arc<dyn RuleMatchStorePort>,
    pub rule_event_store: Arc<dyn RuleEventStorePort>,
    pub notifier: Arc<dyn NotificationSender>,
}

pub struct AnalystPool {
    inner: WorkerPool<AnalystJob>,
}

impl AnalystPool {
    pub fn new(ctx: AnalystContext) -> Self {
        Self::with_workers(ctx, DEFAULT_WORKERS)
    }

    pub fn with_workers(ctx: AnalystContext, workers: usize) -> Self {
        let ctx = Arc::new(ctx);
        let inner = WorkerPool::spawn("analyst", workers, QUEUE_CAPACITY, move |job: AnalystJob| {
            let ctx = ctx.clone();
            async move {
                process_analyst_job(&ctx, job).await;
            }
        });
        Self { inner }
    }

    pub fn submit(&self, job: AnalystJob) {
        self.inner.try_enqueue(job);
    }

    pub async fn shutdown(self) {
        self.inner.shutdown().await;
    }
}

async fn process_analyst_job(ctx: &AnalystContext, job: AnalystJob) {
    ctx.rule_event_store
        .record(RuleEvent {
            rule_id: None,
            rule_query: None,
            document: job.document_id.clone(),
            event_type: RuleEventType::Processing,
            status: RuleEventStatus::Started,
            message: format!("analyzing {}", job.filename),
            tenant_id: job.tenant_id.clone(),
            timestamp: Utc::now(),
        })
        .await;

    let rules = ctx.rule_store.active_rules(&job.tenant_id).await;
    for rule in &rules {
        if is_cross_doc_rule(&rule.query) {
            check_cross_doc_rule(ctx, &job, rule).await;
        } else {
            check_single_doc_rule(ctx, &job, rule).await;
        }
    }

    ctx.rule_event_store
        .record(RuleEvent {
            rule_id: None,
            rule_query: None,
            document: job.document_id.clone(),
            event_type: RuleEventType::Processing,
            status: RuleEventStatus::Completed,
            message: format!("finished analyzing {}", job.filename),
            tenant_id: job.tenant_id.clone(),
            timestamp: Utc::now(),
        })
        .await;
}

async fn check_single_doc_rule(ctx: &AnalystContext, job: &AnalystJob, rule: &Rule) {
    ctx.rule_event_store
        .record(RuleEvent {
            rule_id: Some(rule.id),
            rule_query: Some(rule.query.clone()),
            document: job.document_id.clone(),
            event_type: RuleEventType::Checking,
            status: RuleEventStatus::Started,
            message: format!("checking rule '{}' against {}", rule.query, job.filename),
            tenant_id: job.tenant_id.clone(),
            timestamp: Utc::now(),
        })
        .await;

    let (matched, explanation) = match ctx.llm.complete(&single_doc_prompt(&rule.query, &job.content)).await {
        Ok(response) => (parse_yes(&response), explanation_of(&response)),
        Err(err) => {
            debug!(error = %err, rule_id = %rule.id, "llm unavailable for single-doc rule check");
            let matched = job.content.to_lowercase().contains(&rule.query.to_lowercase());
            (matched, String::new())
        }
    };

    ctx.rule_event_store
        .record(RuleEvent {
            rule_id: Some(rule.id),
            rule_query: Some(rule.query.clone()),
            document: job.document_id.clone(),
            event_type: if matched {
                RuleEventType::Matched
            } else {
                RuleEventType::NotMatched
            },
            status: RuleEventStatus::Completed,
            message: format!("checked rule '{}' against {}", rule.query, job.filename),
            tenant_id: job.tenant_id.clone(),
            timestamp: Utc::now(),
        })
        .await;

    if !matched {
        return;
    }

    ctx.rule_match_store
        .record(RuleMatch {
            rule_id: rule.id,
            rule_query: rule.query.clone(),
            uploaded_doc: job.document_id.clone(),
            matched_doc: String::new(),
            match_type: MatchType::SingleDoc,
            ai_explanation: explanation,
            matched_chunks: single_doc_snippets(&job.content),
            client_id: job.client_id.clone(),
            tenant_id: job.tenant_id.clone(),
            timestamp: Utc::now(),
        })
        .await;

    if let Some(client_id) = &job.client_id {
        ctx.notifier
            .send(
                client_id,
                Notification::alert(
                    rule_hit_single(&rule.query, &job.filename),
                    NotificationLevel::Warning,
                ),
            )
            .await;
    }
}

async fn check_cross_doc_rule(ctx: &AnalystContext, job: &AnalystJob, rule: &Rule) {
    let candidates = retrieve_peers(ctx, job, CROSS_DOC_CANDIDATES).await;

    if candidates.is_empty() {
        debug!(rule_id = %rule.id, "no cross-doc peers, falling back to single-doc evaluation");
        check_single_doc_rule(ctx, job, rule).await;
        return;
    }

    for candidate in candidates {
        ctx.rule_event_store
            .record(RuleEvent {
                rule_id: Some(rule.id),
                rule_query: Some(rule.query.clone()),
                document: job.document_id.clone(),
                event_type: RuleEventType::Checking,
                status: RuleEventStatus::Started,
                message: format!(
                    "checking rule '{}' between {} and {}",
                    rule.query, job.filename, candidate.document_id
                ),
                tenant_id: job.tenant_id.clone(),
                timestamp: Utc::now(),
            })
            .await;

        let (matched, explanation) = match ctx
            .llm
            .complete(&cross_doc_prompt(&rule.query, &job.content, &candidate.content))
            .await
        {
            Ok(response) => (parse_yes(&response), explanation_of(&response)),
            Err(err) => {
                debug!(error = %err, rule_id = %rule.id, "llm unavailable for cross-doc rule check");
                let lower = job.content.to_lowercase();
                let matched = CROSS_DOC_FALLBACK_KEYWORDS
                    .iter()
                    .any(|kw| lower.contains(kw) && candidate.content.to_lowercase().contains(kw));
                (matched, String::new())
            }
        };

        ctx.rule_event_store
            .record(RuleEvent {
                rule_id: Some(rule.id),
                rule_query: Some(rule.query.clone()),
                document: job.document_id.clone(),
                event_type: if matched {
                    RuleEventType::Matched
                } else {
                    RuleEventType::NotMatched
                },
                status: RuleEventStatus::Completed,
                message: format!(
                    "checked rule '{}' between {} and {}",
                    rule.query, job.filename, candidate.document_id
                ),
                tenant_id: job.tenant_id.clone(),
                timestamp: Utc::now(),
            })
            .await;

        if !matched {
            continue;
        }

        ctx.rule_match_store
            .record(RuleMatch {
                rule_id: rule.id,
                rule_query: rule.query.clone(),
                uploaded_doc: job.document_id.clone(),
                matched_doc: candidate.document_id.clone(),
                match_type: MatchType::CrossDoc,
                ai_explanation: explanation,
                matched_chunks: cross_doc_snippets(
                    &job.filename,
                    &job.content,
                    &candidate.document_id,
                    &candidate.content,
                ),
                client_id: job.client_id.clone(),
                tenant_id: job.tenant_id.clone(),
                timestamp: Utc::now(),
            })
            .await;

        if let Some(client_id) = &job.client_id {
            ctx.notifier
                .send(
                    client_id,
                    Notification::alert(
                        rule_hit_cross(&rule.query, &job.filename, &candidate.document_id),
                        NotificationLevel::Critical,
                    ),
                )
                .await;
        }
    }
}

struct Peer {
    document_id: String,
    content: String,
}

/// Embeds the job's content and searches the tenant's vector collection for
/// its nearest `limit` neighbours, excluding itself.
async fn retrieve_peers(ctx: &AnalystContext, job: &AnalystJob, limit: usize) -> Vec<Peer> {
    let embedding = match ctx.embedder.embed(&job.content).await {
        Ok(embedding) => embedding,
        Err(err) => {
            warn!(error = %err, "embedding unavailable, skipping cross-doc retrieval");
            return Vec::new();
        }
    };

    ctx.vector_store
        .search(&job.tenant_id, &embedding, limit + 1)
        .await
        .into_iter()
        .filter_map(|point| {
            let document_id = point.payload.get("document_id")?.clone();
            if document_id == job.document_id {
                return None;
            }
            let content = point.payload.get("content").cloned().unwrap_or_default();
            Some(Peer { document_id, content })
        })
        .take(limit)
        .collect()
}

/// Compares a freshly ingested document against its nearest semantic peers
/// and records a `contradicts` edge for every pair the LLM flags.
pub struct ContradictionDetector {
    llm: Arc<dyn LlmClient>,
    embedder: Arc<dyn EmbeddingPort>,
    vector_store: Arc<VectorStore>,
    graph_store: Arc<dyn GraphStorePort>,
}

impl ContradictionDetector {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        embedder: Arc<dyn EmbeddingPort>,
        vector_store: Arc<VectorStore>,
        graph_store: Arc<dyn GraphStorePort>,
    ) -> Self {
        Self {
            llm,
            embedder,
            vector_store,
            graph_store,
        }
    }

    pub async fn check_document(&self, document_id: &str, tenant_id: &str, content: &str) {
        let embedding = match self.embedder.embed(content).await {
            Ok(embedding) => embedding,
            Err(err) => {
                warn!(error = %err, "embedding unavailable, skipping contradiction check");
                return;
            }
        };

        let peers = self
            .vector_store
            .search(tenant_id, &embedding, CONTRADICTION_PEERS + 1)
            .await;

        for peer in peers {
            let Some(peer_doc) = peer.payload.get("document_id") else {
                continue;
            };
            if peer_doc == document_id {
                continue;
            }
            let peer_content = peer.payload.get("content").cloned().unwrap_or_default();

            let response = match self
                .llm
                .complete(&contradiction_prompt(content, &peer_content))
                .await
            {
                Ok(response) => response,
                Err(err) => {
                    debug!(error = %err, "llm unavailable, skipping contradiction pair");
                    continue;
                }
            };

            if !parse_yes(&response) {
                continue;
            }

            let edge = GraphEdgeRecord {
                source_doc: document_id.to_string(),
                target_doc: peer_doc.clone(),
                relationship_type: RelationshipType::Contradicts,
                description: explanation_of(&response),
                created_at: Utc::now(),
            };
            if let Err(err) = self.graph_store.add_edge(edge).await {
                warn!(error = %err, "failed to record contradiction edge");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_cross_doc_rules_by_keyword() {
        assert!(is_cross_doc_rule("flag any agreement that conflicts"));
        assert!(is_cross_doc_rule("check against existing document"));
        assert!(!is_cross_doc_rule("flag any mention of pricing"));
    }

    #[test]
    fn alert_messages_match_exact_format() {
        assert_eq!(
            rule_hit_single("secret", "a.txt"),
            "\u{26A0}\u{FE0F} Rule Hit: 'secret' detected in a.txt"
        );
        assert_eq!(
            rule_hit_cross("secret", "a.txt", "b.txt"),
            "\u{26A0}\u{FE0F} Rule Hit: 'secret' detected between a.txt and b.txt"
        );
    }

    #[test]
    fn parse_yes_is_case_insensitive_and_prefix_only() {
        assert!(parse_yes("YES, because of X"));
        assert!(parse_yes("yes"));
        assert!(!parse_yes("no, not a match"));
    }

    #[test]
    fn explanation_of_drops_the_yes_no_line() {
        assert_eq!(
            explanation_of("YES\nmentions the riverbank deal explicitly"),
            "mentions the riverbank deal explicitly"
        );
    }

    #[test]
    fn single_doc_snippets_caps_at_three() {
        let sentence = "The quick brown fox jumps over the lazy dog. ";
        let snippets = single_doc_snippets(&sentence.repeat(80));
        assert!(snippets.len() <= MAX_SINGLE_DOC_SNIPPETS);
        assert!(!snippets.is_empty());
    }

    #[test]
    fn single_doc_snippets_caps_each_window_at_snippet_size() {
        let snippets = single_doc_snippets(&"x".repeat(1600));
        assert!(snippets.len() <= MAX_SINGLE_DOC_SNIPPETS);
        assert!(snippets.iter().all(|s| s.chars().count() <= SNIPPET_WINDOW_CHARS));
    }

    #[test]
    fn cross_doc_snippets_label_each_side() {
        let snippets = cross_doc_snippets("a.txt", "content a", "doc-b", "content b");
        assert_eq!(snippets, vec!["a.txt: content a".to_string(), "doc-b: content b".to_string()]);
    }
}
