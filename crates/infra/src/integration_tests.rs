//! Integration tests for the indexing jobs driven through the dispatcher.
//!
//! Tests: Queue → JobDispatcher → handler → repositories / search index → follow-on jobs
//!
//! Verifies:
//! - The embedding pipeline is resumable in batches and completes exactly once
//! - Provider and infrastructure failures end in a re-queue, a retry or FAILED
//! - Synchronizers relocate chunks and converge
//! - Supplementary jobs (storage usage, stalled recovery, migration)

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;
    use proptest::prelude::*;
    use serde_json::json;

    use ragworks_core::{
        Bot, ChunkHeader, Document, DocumentChunk, DocumentFolder, DocumentStatus, FolderPath,
        SearchMethod, SearchTarget, Tenant,
    };
    use ragworks_indexing::{
        CalculateStorageUsageMessage, CreateEmbeddings, CreateEmbeddingsMessage,
        EmbeddingProgress, IndexingServices, IndexingSettings, JobMessage, JobPublisher,
        MigrateBotSearchMethodMessage, SyncDocumentNameMessage, SyncDocumentPath,
        SyncDocumentPathMessage, register_handlers,
    };
    use ragworks_jobs::{
        DispatchError, Dispatched, Disposition, InMemoryQueueTransport, JobDispatcher, JobName,
        RetryPolicy, encode_payload,
    };

    use ragworks_indexing::EmbeddingService;

    use crate::embedding::FakeEmbeddingService;
    use crate::repository::{
        InMemoryBotRepository, InMemoryDocumentFolderRepository, InMemoryDocumentRepository,
        InMemoryTenantRepository,
    };
    use crate::search::InMemorySearchIndex;

    const EMBEDDINGS: &str = "create-embeddings";
    const STORAGE: &str = "calculate-storage-usage";
    const PATH_SYNC: &str = "sync-document-path";

    struct World {
        transport: Arc<InMemoryQueueTransport>,
        tenants: Arc<InMemoryTenantRepository>,
        bots: Arc<InMemoryBotRepository>,
        documents: Arc<InMemoryDocumentRepository>,
        folders: Arc<InMemoryDocumentFolderRepository>,
        search: Arc<InMemorySearchIndex>,
        embeddings: Arc<FakeEmbeddingService>,
        services: IndexingServices,
        dispatcher: JobDispatcher<Arc<InMemoryQueueTransport>>,
        tenant: Tenant,
    }

    impl World {
        fn new() -> Self {
            let transport = Arc::new(InMemoryQueueTransport::new());
            let tenants = Arc::new(InMemoryTenantRepository::new());
            let bots = Arc::new(InMemoryBotRepository::new());
            let documents = Arc::new(InMemoryDocumentRepository::new());
            let folders = Arc::new(InMemoryDocumentFolderRepository::new());
            let search = Arc::new(InMemorySearchIndex::new());
            let embeddings = Arc::new(FakeEmbeddingService::new());

            let services = IndexingServices {
                tenants: tenants.clone(),
                bots: bots.clone(),
                documents: documents.clone(),
                folders: folders.clone(),
                search: search.clone(),
                embeddings: embeddings.clone(),
                publisher: JobPublisher::new(transport.clone()),
            };

            let mut dispatcher = JobDispatcher::new(transport.clone());
            register_handlers(&mut dispatcher, &services, IndexingSettings::default());

            let tenant = Tenant::new("acme", "https://acme.search.example", "acme-chunks");
            tenants.insert(tenant.clone());

            Self {
                transport,
                tenants,
                bots,
                documents,
                folders,
                search,
                embeddings,
                services,
                dispatcher,
                tenant,
            }
        }

        fn target(&self) -> SearchTarget {
            self.tenant.search_target()
        }

        fn bot(&self, method: SearchMethod) -> Bot {
            let bot = Bot::new(self.tenant.id, "support", method);
            self.bots.insert(bot.clone());
            bot
        }

        fn document(&self, bot: &Bot, name: &str) -> Document {
            let document = Document::new(self.tenant.id, bot.id, name, "pdf").with_file_size(1024);
            self.documents.insert(document.clone());
            document
        }

        /// Index `count` unvectorized chunks laid out for `path`.
        fn chunks(&self, bot: &Bot, document: &Document, path: &FolderPath, count: usize) {
            let file_name = document.file_name();
            let header = ChunkHeader::new(path, &file_name);
            let chunks = (0..count).map(|i| {
                let body = format!("page body {i}");
                DocumentChunk {
                    id: format!("{}-{i:04}", document.id),
                    bot_id: bot.id,
                    document_id: document.id,
                    document_folder_id: document.document_folder_id,
                    content: if bot.search_method.embeds_path_in_content() {
                        format!("{}\n{body}", header.as_str())
                    } else {
                        body
                    },
                    blob_path: document.blob_path(path.as_str()),
                    file_name: file_name.clone(),
                    page_number: u32::try_from(i).unwrap() + 1,
                    is_vectorized: false,
                    content_vector: None,
                    title_vector: None,
                }
            });
            self.search.insert(&self.target(), chunks);
        }

        fn vectorize_all(&self, document: &Document, with_title: bool) {
            let chunks = self.search.chunks(&self.target(), document.id).into_iter().map(|mut c| {
                c.set_vectors(vec![0.5], with_title.then(|| vec![0.5]));
                c
            });
            self.search.insert(&self.target(), chunks);
        }

        fn publish<M: JobMessage>(&self, message: &M) {
            self.services.publisher.publish(message).unwrap();
        }

        fn run(&self, job: JobName) -> Result<Dispatched, DispatchError> {
            self.dispatcher.execute(job.as_str())
        }

        /// Execute `job` until its queue is idle; returns the number of handled messages.
        fn drain(&self, job: JobName) -> usize {
            let mut handled = 0;
            while self.run(job).unwrap() != Dispatched::Idle {
                handled += 1;
                assert!(handled < 1000, "queue never drained");
            }
            handled
        }

        fn status(&self, document: &Document) -> DocumentStatus {
            self.documents.get(document.id).unwrap().status
        }

        fn unvectorized(&self, document: &Document) -> usize {
            self.search
                .chunks(&self.target(), document.id)
                .iter()
                .filter(|c| !c.is_vectorized)
                .count()
        }

        fn embeddings_message(&self, bot: &Bot, document: &Document) -> CreateEmbeddingsMessage {
            CreateEmbeddingsMessage::new(self.tenant.id, bot.id, document.id)
        }
    }

    // ---------------------------------------------------------------------
    // Embedding pipeline
    // ---------------------------------------------------------------------

    #[test]
    fn small_document_completes_in_one_invocation() {
        let w = World::new();
        let bot = w.bot(SearchMethod::Hybrid);
        let doc = w.document(&bot, "handbook");
        w.chunks(&bot, &doc, &FolderPath::root(), 40);
        w.publish(&w.embeddings_message(&bot, &doc));

        assert!(matches!(w.run(JobName::CreateEmbeddings).unwrap(), Dispatched::Completed { .. }));

        assert_eq!(w.status(&doc), DocumentStatus::Completed);
        assert_eq!(w.unvectorized(&doc), 0);
        assert!(w.transport.is_empty(EMBEDDINGS));
        assert_eq!(w.transport.payloads(STORAGE), vec![json!({ "tenant_id": w.tenant.id })]);
        assert!(w.transport.is_empty(PATH_SYNC));
        // content + title vector per chunk
        assert_eq!(w.embeddings.calls(), 80);
    }

    #[test]
    fn one_hundred_fifty_chunks_take_two_invocations() {
        let w = World::new();
        let bot = w.bot(SearchMethod::Hybrid);
        let doc = Document::new(w.tenant.id, bot.id, "synced", "docx").with_external_id("box:991");
        w.documents.insert(doc.clone());
        w.chunks(&bot, &doc, &FolderPath::root(), 150);
        w.publish(&w.embeddings_message(&bot, &doc));

        // First pass: 100 chunks, re-enqueued.
        w.run(JobName::CreateEmbeddings).unwrap();
        assert_eq!(w.search.uploaded_chunks(), 100);
        assert_eq!(w.unvectorized(&doc), 50);
        assert_eq!(w.status(&doc), DocumentStatus::Processing);
        assert_eq!(
            w.transport.payloads(EMBEDDINGS),
            vec![serde_json::to_value(w.embeddings_message(&bot, &doc)).unwrap()]
        );
        assert!(w.transport.is_empty(STORAGE));

        // Second pass: the remaining 50, completed.
        w.run(JobName::CreateEmbeddings).unwrap();
        assert_eq!(w.search.uploaded_chunks(), 150);
        assert_eq!(w.unvectorized(&doc), 0);
        assert_eq!(w.status(&doc), DocumentStatus::Completed);
        assert!(w.transport.is_empty(EMBEDDINGS));
        assert_eq!(w.transport.len(STORAGE), 1);
        assert_eq!(
            w.transport.payloads(PATH_SYNC),
            vec![json!({
                "tenant_id": w.tenant.id,
                "bot_id": bot.id,
                "document_folder_id": null,
                "document_ids": [doc.id],
            })]
        );

        // The connector follow-up finds nothing to move and ends the chain.
        let uploads = w.search.upload_calls();
        w.run(JobName::SyncDocumentPath).unwrap();
        assert_eq!(w.search.upload_calls(), uploads);
        assert!(w.transport.is_empty(EMBEDDINGS));
        assert!(w.transport.is_empty(PATH_SYNC));
        assert_eq!(w.status(&doc), DocumentStatus::Completed);
    }

    #[test]
    fn provider_failure_keeps_the_chunks_before_it() {
        let w = World::new();
        // One provider call per chunk.
        let bot = w.bot(SearchMethod::SemanticHybrid);
        let doc = w.document(&bot, "manual");
        w.chunks(&bot, &doc, &FolderPath::root(), 20);
        w.embeddings.fail_from_call(7);

        let progress = CreateEmbeddings::new(w.services.clone())
            .execute(&w.embeddings_message(&bot, &doc), 1, RetryPolicy::default())
            .unwrap();

        assert_eq!(
            progress,
            EmbeddingProgress::Requeued {
                vectorized: 6,
                remaining: 14
            }
        );
        assert_eq!(w.search.uploaded_chunks(), 6);
        assert_eq!(w.unvectorized(&doc), 14);
        assert_ne!(w.status(&doc), DocumentStatus::Completed);
        assert_eq!(w.transport.len(EMBEDDINGS), 1);
        assert!(w.transport.is_empty(STORAGE));
    }

    #[test]
    fn failure_on_first_chunk_uploads_nothing() {
        let w = World::new();
        let bot = w.bot(SearchMethod::Vector);
        let doc = w.document(&bot, "manual");
        w.chunks(&bot, &doc, &FolderPath::root(), 5);
        w.embeddings.fail_from_call(1);

        let progress = CreateEmbeddings::new(w.services.clone())
            .execute(&w.embeddings_message(&bot, &doc), 1, RetryPolicy::default())
            .unwrap();

        assert!(matches!(progress, EmbeddingProgress::Requeued { vectorized: 0, .. }));
        assert_eq!(w.search.upload_calls(), 0);
        assert_eq!(w.transport.len(EMBEDDINGS), 1);
    }

    #[test]
    fn failed_upload_requeues_without_completing() {
        let w = World::new();
        let bot = w.bot(SearchMethod::Hybrid);
        let doc = w.document(&bot, "manual");
        w.chunks(&bot, &doc, &FolderPath::root(), 10);
        w.search.fail_uploads(true);
        w.publish(&w.embeddings_message(&bot, &doc));

        assert!(matches!(w.run(JobName::CreateEmbeddings).unwrap(), Dispatched::Completed { .. }));

        assert_eq!(w.status(&doc), DocumentStatus::Processing);
        assert_eq!(w.unvectorized(&doc), 10);
        assert_eq!(w.transport.len(EMBEDDINGS), 1);

        w.search.fail_uploads(false);
        w.drain(JobName::CreateEmbeddings);
        assert_eq!(w.status(&doc), DocumentStatus::Completed);
    }

    #[test]
    fn completed_document_makes_no_provider_calls() {
        let w = World::new();
        let bot = w.bot(SearchMethod::Hybrid);
        let mut doc = w.document(&bot, "done");
        doc.set_status(DocumentStatus::Completed);
        w.documents.insert(doc.clone());
        w.chunks(&bot, &doc, &FolderPath::root(), 30);
        w.vectorize_all(&doc, true);
        w.publish(&w.embeddings_message(&bot, &doc));

        w.run(JobName::CreateEmbeddings).unwrap();

        assert_eq!(w.embeddings.calls(), 0);
        assert_eq!(w.search.upload_calls(), 0);
        assert_eq!(w.status(&doc), DocumentStatus::Completed);
        assert!(w.transport.is_empty(STORAGE));
    }

    #[test]
    fn chunks_missing_a_title_vector_are_picked_up() {
        let w = World::new();
        let bot = w.bot(SearchMethod::Hybrid);
        let doc = w.document(&bot, "half");
        w.chunks(&bot, &doc, &FolderPath::root(), 4);
        w.vectorize_all(&doc, false);

        w.publish(&w.embeddings_message(&bot, &doc));
        w.run(JobName::CreateEmbeddings).unwrap();

        assert_eq!(w.search.uploaded_chunks(), 4);
        assert!(
            w.search
                .chunks(&w.target(), doc.id)
                .iter()
                .all(|c| c.has_required_vectors(SearchMethod::Hybrid))
        );
    }

    #[test]
    fn keyword_only_bot_is_a_configuration_error() {
        let w = World::new();
        let bot = w.bot(SearchMethod::Bm25);
        let doc = w.document(&bot, "plain");
        w.publish(&w.embeddings_message(&bot, &doc));

        let err = w.run(JobName::CreateEmbeddings).unwrap_err();

        assert!(matches!(err, DispatchError::Failed { disposition: Disposition::Poisoned, .. }));
        assert_eq!(w.transport.poisoned(EMBEDDINGS).len(), 1);
        assert_eq!(w.status(&doc), DocumentStatus::Pending);
    }

    #[test]
    fn deleting_document_is_skipped() {
        let w = World::new();
        let bot = w.bot(SearchMethod::Hybrid);
        let mut doc = w.document(&bot, "gone");
        doc.set_status(DocumentStatus::Deleting);
        w.documents.insert(doc.clone());
        w.chunks(&bot, &doc, &FolderPath::root(), 3);
        w.publish(&w.embeddings_message(&bot, &doc));

        assert!(matches!(w.run(JobName::CreateEmbeddings).unwrap(), Dispatched::Completed { .. }));
        assert_eq!(w.embeddings.calls(), 0);
        assert_eq!(w.status(&doc), DocumentStatus::Deleting);
    }

    #[test]
    fn search_outage_below_budget_leaves_the_message_queued() {
        let w = World::new();
        let bot = w.bot(SearchMethod::Hybrid);
        let doc = w.document(&bot, "manual");
        w.search.fail_reads(true);
        w.publish(&w.embeddings_message(&bot, &doc));

        let err = w.run(JobName::CreateEmbeddings).unwrap_err();

        assert!(matches!(err, DispatchError::Failed { disposition: Disposition::Requeued, .. }));
        assert_eq!(w.transport.len(EMBEDDINGS), 1);
        assert!(w.transport.poisoned(EMBEDDINGS).is_empty());
        assert_eq!(w.status(&doc), DocumentStatus::Pending);
    }

    #[test]
    fn infrastructure_failure_on_final_attempt_marks_the_document_failed() {
        let w = World::new();
        let bot = w.bot(SearchMethod::Hybrid);
        let doc = w.document(&bot, "manual");
        w.search.fail_reads(true);
        let body = encode_payload(&w.embeddings_message(&bot, &doc)).unwrap();
        // Leased as delivery 4 of 5: the next delivery would be poisoned unhandled.
        w.transport.send_with_dequeue_count(EMBEDDINGS, &body, 3);

        assert!(w.run(JobName::CreateEmbeddings).is_err());
        assert_eq!(w.status(&doc), DocumentStatus::Failed);

        w.transport.expire_leases(EMBEDDINGS);
        assert!(matches!(
            w.run(JobName::CreateEmbeddings).unwrap(),
            Dispatched::Poisoned { dequeue_count: 5, .. }
        ));
        assert_eq!(w.transport.poisoned(EMBEDDINGS).len(), 1);
    }

    #[test]
    fn exhausted_message_is_poisoned_without_touching_the_document() {
        let w = World::new();
        let bot = w.bot(SearchMethod::Hybrid);
        let doc = w.document(&bot, "manual");
        w.chunks(&bot, &doc, &FolderPath::root(), 3);
        let body = encode_payload(&w.embeddings_message(&bot, &doc)).unwrap();
        w.transport.send_with_dequeue_count(EMBEDDINGS, &body, 5);

        assert!(matches!(w.run(JobName::CreateEmbeddings).unwrap(), Dispatched::Poisoned { .. }));
        assert_eq!(w.embeddings.calls(), 0);
        assert_eq!(w.status(&doc), DocumentStatus::Pending);
        assert!(w.transport.is_empty(EMBEDDINGS));
    }

    #[test]
    fn provider_that_never_recovers_ends_in_failed() {
        let w = World::new();
        let bot = w.bot(SearchMethod::Hybrid);
        let doc = w.document(&bot, "manual");
        w.chunks(&bot, &doc, &FolderPath::root(), 5);
        w.embeddings.fail_from_call(1);
        w.publish(&w.embeddings_message(&bot, &doc));

        // One pass per delivery the budget allows, each failing on its first call.
        assert_eq!(w.drain(JobName::CreateEmbeddings), 5);

        assert_eq!(w.embeddings.calls(), 5);
        assert_eq!(w.status(&doc), DocumentStatus::Failed);
        assert_eq!(w.unvectorized(&doc), 5);
        assert!(w.transport.is_empty(EMBEDDINGS));
        assert!(w.transport.is_empty(STORAGE));
    }

    #[test]
    fn progress_resets_the_failed_pass_counter() {
        let w = World::new();
        let bot = w.bot(SearchMethod::SemanticHybrid);
        let doc = w.document(&bot, "long");
        w.chunks(&bot, &doc, &FolderPath::root(), 150);
        let message = CreateEmbeddingsMessage {
            failed_passes: 4,
            ..w.embeddings_message(&bot, &doc)
        };

        let progress = CreateEmbeddings::new(w.services.clone())
            .execute(&message, 1, RetryPolicy::default())
            .unwrap();

        assert_eq!(
            progress,
            EmbeddingProgress::Requeued {
                vectorized: 100,
                remaining: 50
            }
        );
        assert_eq!(
            w.transport.payloads(EMBEDDINGS),
            vec![serde_json::to_value(w.embeddings_message(&bot, &doc)).unwrap()]
        );
    }

    #[test]
    fn failed_passes_are_carried_on_the_requeued_message() {
        let w = World::new();
        let bot = w.bot(SearchMethod::Vector);
        let doc = w.document(&bot, "manual");
        w.chunks(&bot, &doc, &FolderPath::root(), 2);
        w.embeddings.fail_from_call(1);
        let message = CreateEmbeddingsMessage {
            failed_passes: 3,
            ..w.embeddings_message(&bot, &doc)
        };
        let use_case = CreateEmbeddings::new(w.services.clone());

        use_case.execute(&message, 1, RetryPolicy::default()).unwrap();
        assert_eq!(w.transport.payloads(EMBEDDINGS)[0]["failed_passes"], 4);

        let last = CreateEmbeddingsMessage {
            failed_passes: 4,
            ..message
        };
        let progress = use_case.execute(&last, 1, RetryPolicy::default()).unwrap();
        assert_eq!(progress, EmbeddingProgress::GaveUp { failed_passes: 5 });
        assert_eq!(w.status(&doc), DocumentStatus::Failed);
        assert_eq!(w.transport.len(EMBEDDINGS), 1);
    }

    #[test]
    fn redelivered_message_after_completion_is_harmless() {
        let w = World::new();
        let bot = w.bot(SearchMethod::Hybrid);
        let doc = w.document(&bot, "twice");
        w.chunks(&bot, &doc, &FolderPath::root(), 10);
        w.publish(&w.embeddings_message(&bot, &doc));
        w.publish(&w.embeddings_message(&bot, &doc));

        assert_eq!(w.drain(JobName::CreateEmbeddings), 2);

        assert_eq!(w.search.uploaded_chunks(), 10);
        assert_eq!(w.embeddings.calls(), 20);
        assert_eq!(w.status(&doc), DocumentStatus::Completed);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn pipeline_needs_one_invocation_per_batch(n in 0usize..=350) {
            let w = World::new();
            let bot = w.bot(SearchMethod::SemanticHybrid);
            let doc = w.document(&bot, "sized");
            w.chunks(&bot, &doc, &FolderPath::root(), n);
            w.publish(&w.embeddings_message(&bot, &doc));

            let invocations = w.drain(JobName::CreateEmbeddings);

            prop_assert_eq!(invocations, n.div_ceil(100).max(1));
            prop_assert_eq!(w.unvectorized(&doc), 0);
            prop_assert_eq!(w.status(&doc), DocumentStatus::Completed);
            prop_assert_eq!(w.search.uploaded_chunks(), n);
        }
    }

    // ---------------------------------------------------------------------
    // Synchronizers
    // ---------------------------------------------------------------------

    #[test]
    fn rename_revectorizes_path_embedding_methods() {
        let w = World::new();
        let bot = w.bot(SearchMethod::Hybrid);
        let mut doc = w.document(&bot, "draft");
        doc.set_status(DocumentStatus::Completed);
        w.documents.insert(doc.clone());
        w.chunks(&bot, &doc, &FolderPath::root(), 3);
        w.vectorize_all(&doc, true);

        doc.name = "final".to_string();
        w.documents.insert(doc.clone());
        w.publish(&SyncDocumentNameMessage {
            tenant_id: w.tenant.id,
            bot_id: bot.id,
            document_id: doc.id,
        });
        w.run(JobName::SyncDocumentName).unwrap();

        let chunks = w.search.chunks(&w.target(), doc.id);
        assert!(chunks.iter().all(|c| c.content.starts_with("/final.pdf\n")));
        assert!(chunks.iter().all(|c| c.file_name == "final.pdf"));
        assert!(chunks.iter().all(|c| c.blob_path == format!("{}/final.pdf", bot.id)));
        assert!(chunks.iter().all(|c| !c.is_vectorized && c.content_vector.is_none()));
        assert_eq!(w.status(&doc), DocumentStatus::Processing);
        assert_eq!(w.transport.len(EMBEDDINGS), 1);

        w.drain(JobName::CreateEmbeddings);
        assert_eq!(w.status(&doc), DocumentStatus::Completed);
    }

    #[test]
    fn rename_under_ursa_recomputes_only_title_vectors() {
        let w = World::new();
        let bot = w.bot(SearchMethod::Ursa);
        let mut doc = w.document(&bot, "draft");
        w.chunks(&bot, &doc, &FolderPath::root(), 3);
        w.publish(&w.embeddings_message(&bot, &doc));
        w.drain(JobName::CreateEmbeddings);
        let before = w.search.chunks(&w.target(), doc.id);
        let calls = w.embeddings.calls();

        doc = w.documents.get(doc.id).unwrap();
        doc.name = "final".to_string();
        w.documents.insert(doc.clone());
        w.publish(&SyncDocumentNameMessage {
            tenant_id: w.tenant.id,
            bot_id: bot.id,
            document_id: doc.id,
        });
        w.run(JobName::SyncDocumentName).unwrap();

        let renamed = w.search.chunks(&w.target(), doc.id);
        assert!(renamed.iter().all(|c| c.file_name == "final.pdf" && !c.is_vectorized));
        assert!(renamed.iter().all(|c| c.content.starts_with("page body")));
        assert!(renamed.iter().all(|c| c.title_vector.is_none() && c.content_vector.is_some()));
        assert_eq!(w.status(&doc), DocumentStatus::Processing);
        assert_eq!(w.transport.len(EMBEDDINGS), 1);

        w.drain(JobName::CreateEmbeddings);

        let title = FakeEmbeddingService::new().generate_embeddings("final.pdf").unwrap();
        let after = w.search.chunks(&w.target(), doc.id);
        assert_eq!(w.embeddings.calls() - calls, 3);
        assert!(after.iter().all(|c| c.is_vectorized && c.title_vector.as_ref() == Some(&title)));
        for (old, new) in before.iter().zip(&after) {
            assert_eq!(old.content_vector, new.content_vector);
        }
        assert_eq!(w.status(&doc), DocumentStatus::Completed);
    }

    #[test]
    fn folder_move_under_ursa_keeps_vectors() {
        let w = World::new();
        let bot = w.bot(SearchMethod::Ursa);
        let folder = DocumentFolder::new(bot.id, "archive", None);
        w.folders.insert(folder.clone());
        let mut doc = Document::new(w.tenant.id, bot.id, "report", "pdf").in_folder(folder.id);
        doc.set_status(DocumentStatus::Completed);
        w.documents.insert(doc.clone());
        w.chunks(&bot, &doc, &FolderPath::root(), 3);
        w.vectorize_all(&doc, true);

        w.publish(&SyncDocumentPathMessage {
            tenant_id: w.tenant.id,
            bot_id: bot.id,
            document_folder_id: Some(folder.id),
            document_ids: vec![doc.id],
        });
        w.run(JobName::SyncDocumentPath).unwrap();

        let chunks = w.search.chunks(&w.target(), doc.id);
        assert!(chunks.iter().all(|c| c.blob_path == format!("{}/archive/report.pdf", bot.id)));
        assert!(chunks.iter().all(|c| c.is_vectorized && c.title_vector.is_some()));
        assert_eq!(w.status(&doc), DocumentStatus::Completed);
        assert!(w.transport.is_empty(EMBEDDINGS));
    }

    #[test]
    fn rename_resolves_the_folder_chain() {
        let w = World::new();
        let bot = w.bot(SearchMethod::SemanticHybrid);
        let contracts = DocumentFolder::new(bot.id, "contracts", None);
        let year = DocumentFolder::new(bot.id, "2024", Some(contracts.id));
        w.folders.insert(contracts.clone());
        w.folders.insert(year.clone());

        let doc = Document::new(w.tenant.id, bot.id, "nda", "pdf").in_folder(year.id);
        w.documents.insert(doc.clone());
        w.chunks(&bot, &doc, &FolderPath::root(), 2);

        w.publish(&SyncDocumentNameMessage {
            tenant_id: w.tenant.id,
            bot_id: bot.id,
            document_id: doc.id,
        });
        w.run(JobName::SyncDocumentName).unwrap();

        let chunks = w.search.chunks(&w.target(), doc.id);
        assert!(chunks.iter().all(|c| c.content.starts_with("/contracts/2024/nda.pdf\n")));
        assert!(chunks.iter().all(|c| c.blob_path == format!("{}/contracts/2024/nda.pdf", bot.id)));
        assert!(chunks.iter().all(|c| c.document_folder_id == Some(year.id)));
    }

    #[test]
    fn missing_folder_poisons_the_rename() {
        let w = World::new();
        let bot = w.bot(SearchMethod::Hybrid);
        let orphan = DocumentFolder::new(bot.id, "lost", None);
        let doc = Document::new(w.tenant.id, bot.id, "nda", "pdf").in_folder(orphan.id);
        w.documents.insert(doc.clone());

        w.publish(&SyncDocumentNameMessage {
            tenant_id: w.tenant.id,
            bot_id: bot.id,
            document_id: doc.id,
        });
        let err = w.run(JobName::SyncDocumentName).unwrap_err();

        assert!(matches!(err, DispatchError::Failed { disposition: Disposition::Poisoned, .. }));
    }

    #[test]
    fn bulk_path_sync_defers_documents_past_the_chunk_cap() {
        let w = World::new();
        let bot = w.bot(SearchMethod::Hybrid);
        let folder = DocumentFolder::new(bot.id, "renamed", None);
        w.folders.insert(folder.clone());

        let docs: Vec<Document> = (0..4)
            .map(|i| {
                let doc = Document::new(w.tenant.id, bot.id, format!("doc{i}"), "pdf").in_folder(folder.id);
                w.documents.insert(doc.clone());
                // Indexed under the folder's old name.
                let old = FolderPath::from_ancestors(&[DocumentFolder {
                    name: "old".to_string(),
                    ..folder.clone()
                }])
                .unwrap();
                w.chunks(&bot, &doc, &old, 400);
                doc
            })
            .collect();

        let message = SyncDocumentPathMessage {
            tenant_id: w.tenant.id,
            bot_id: bot.id,
            document_folder_id: Some(folder.id),
            document_ids: docs.iter().map(|d| d.id).collect(),
        };
        let report = SyncDocumentPath::new(w.services.clone()).execute(&message).unwrap();

        // 400 + 400 + 400 reaches the cap of 1000 after the third document.
        assert_eq!(report.documents, 3);
        assert_eq!(report.processed_chunks, 1200);
        assert_eq!(report.deferred, 1);
        assert_eq!(
            w.transport.payloads(PATH_SYNC),
            vec![json!({
                "tenant_id": w.tenant.id,
                "bot_id": bot.id,
                "document_folder_id": folder.id,
                "document_ids": [docs[3].id],
            })]
        );
        assert_eq!(w.transport.len(EMBEDDINGS), 3);
        for doc in &docs[..3] {
            assert_eq!(w.status(doc), DocumentStatus::Processing);
            assert!(
                w.search
                    .chunks(&w.target(), doc.id)
                    .iter()
                    .all(|c| c.content.starts_with(&format!("/renamed/{}\n", doc.file_name())))
            );
        }
        assert_eq!(w.status(&docs[3]), DocumentStatus::Pending);

        // The follow-up finishes the last document.
        w.run(JobName::SyncDocumentPath).unwrap();
        assert!(w.transport.is_empty(PATH_SYNC));
        assert_eq!(w.transport.len(EMBEDDINGS), 4);
    }

    #[test]
    fn bulk_path_sync_skips_missing_documents_and_converges() {
        let w = World::new();
        let bot = w.bot(SearchMethod::Bm25);
        let doc = w.document(&bot, "kept");
        w.chunks(&bot, &doc, &FolderPath::root(), 5);

        let message = SyncDocumentPathMessage {
            tenant_id: w.tenant.id,
            bot_id: bot.id,
            document_folder_id: None,
            document_ids: vec![ragworks_core::DocumentId::new(), doc.id],
        };
        let report = SyncDocumentPath::new(w.services.clone()).execute(&message).unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.documents, 1);
        assert_eq!(w.search.upload_calls(), 0);
        assert!(w.transport.is_empty(PATH_SYNC));
        assert!(w.transport.is_empty(EMBEDDINGS));
    }

    #[test]
    fn unknown_folder_in_path_sync_is_fatal() {
        let w = World::new();
        let bot = w.bot(SearchMethod::Hybrid);
        w.publish(&SyncDocumentPathMessage {
            tenant_id: w.tenant.id,
            bot_id: bot.id,
            document_folder_id: Some(ragworks_core::DocumentFolderId::new()),
            document_ids: Vec::new(),
        });

        let err = w.run(JobName::SyncDocumentPath).unwrap_err();
        assert!(matches!(err, DispatchError::Failed { disposition: Disposition::Poisoned, .. }));
    }

    // ---------------------------------------------------------------------
    // Supplementary jobs
    // ---------------------------------------------------------------------

    #[test]
    fn storage_usage_ignores_deleting_documents() {
        let w = World::new();
        let bot = w.bot(SearchMethod::Hybrid);
        for (name, size, status) in [
            ("a", 100, DocumentStatus::Completed),
            ("b", 250, DocumentStatus::Processing),
            ("c", 4000, DocumentStatus::Deleting),
        ] {
            let mut doc = Document::new(w.tenant.id, bot.id, name, "pdf").with_file_size(size);
            doc.status = status;
            w.documents.insert(doc);
        }

        w.publish(&CalculateStorageUsageMessage { tenant_id: w.tenant.id });
        w.run(JobName::CalculateStorageUsage).unwrap();

        assert_eq!(w.tenants.get(w.tenant.id).unwrap().document_storage_bytes, 350);
    }

    #[test]
    fn stalled_documents_are_reenqueued_once() {
        let w = World::new();
        let bot = w.bot(SearchMethod::Hybrid);
        let mut stalled = w.document(&bot, "stuck");
        stalled.updated_at = Utc::now() - chrono::Duration::hours(7);
        w.documents.insert(stalled.clone());
        let mut finished = w.document(&bot, "done");
        finished.status = DocumentStatus::Completed;
        finished.updated_at = Utc::now() - chrono::Duration::hours(7);
        w.documents.insert(finished);
        w.document(&bot, "fresh");

        assert_eq!(w.run(JobName::RecoverStalledDocuments).unwrap(), Dispatched::TimerCompleted);
        assert_eq!(
            w.transport.payloads(EMBEDDINGS),
            vec![serde_json::to_value(w.embeddings_message(&bot, &stalled)).unwrap()]
        );

        w.run(JobName::RecoverStalledDocuments).unwrap();
        assert_eq!(w.transport.len(EMBEDDINGS), 1);
    }

    #[test]
    fn stalled_recovery_respects_the_threshold_setting() {
        let w = World::new();
        let bot = w.bot(SearchMethod::Hybrid);
        let mut doc = w.document(&bot, "stuck");
        doc.updated_at = Utc::now() - chrono::Duration::minutes(10);
        w.documents.insert(doc);

        let mut dispatcher = JobDispatcher::new(w.transport.clone());
        register_handlers(
            &mut dispatcher,
            &w.services,
            IndexingSettings {
                stalled_threshold: Duration::from_secs(60),
            },
        );
        dispatcher.execute("recover-stalled-documents").unwrap();

        assert_eq!(w.transport.len(EMBEDDINGS), 1);
    }

    #[test]
    fn migration_to_ursa_strips_headers_and_reembeds() {
        let w = World::new();
        let bot = w.bot(SearchMethod::Hybrid);
        let doc = w.document(&bot, "guide");
        w.chunks(&bot, &doc, &FolderPath::root(), 3);
        w.vectorize_all(&doc, true);

        w.publish(&MigrateBotSearchMethodMessage {
            tenant_id: w.tenant.id,
            bot_id: bot.id,
            search_method: SearchMethod::Ursa,
        });
        w.run(JobName::MigrateBotSearchMethod).unwrap();

        assert_eq!(w.bots.get(bot.id).unwrap().search_method, SearchMethod::Ursa);
        let chunks = w.search.chunks(&w.target(), doc.id);
        assert!(chunks.iter().all(|c| c.content.starts_with("page body") && !c.is_vectorized));
        assert_eq!(w.status(&doc), DocumentStatus::Processing);

        w.drain(JobName::CreateEmbeddings);
        assert_eq!(w.status(&doc), DocumentStatus::Completed);
    }

    #[test]
    fn migration_to_keyword_search_completes_without_embeddings() {
        let w = World::new();
        let bot = w.bot(SearchMethod::Ursa);
        let doc = w.document(&bot, "guide");
        w.chunks(&bot, &doc, &FolderPath::root(), 2);

        w.publish(&MigrateBotSearchMethodMessage {
            tenant_id: w.tenant.id,
            bot_id: bot.id,
            search_method: SearchMethod::Bm25,
        });
        w.run(JobName::MigrateBotSearchMethod).unwrap();

        let chunks = w.search.chunks(&w.target(), doc.id);
        assert!(chunks.iter().all(|c| c.content.starts_with("/guide.pdf\npage body")));
        assert_eq!(w.status(&doc), DocumentStatus::Completed);
        assert!(w.transport.is_empty(EMBEDDINGS));
    }

    #[test]
    fn migration_is_never_retried() {
        let w = World::new();
        let bot = w.bot(SearchMethod::Hybrid);
        w.document(&bot, "guide");
        w.search.fail_reads(true);

        w.publish(&MigrateBotSearchMethodMessage {
            tenant_id: w.tenant.id,
            bot_id: bot.id,
            search_method: SearchMethod::Vector,
        });
        let err = w.run(JobName::MigrateBotSearchMethod).unwrap_err();

        assert!(matches!(err, DispatchError::Failed { disposition: Disposition::Poisoned, .. }));
        assert_eq!(w.transport.poisoned("migrate-bot-search-method").len(), 1);
    }
}
