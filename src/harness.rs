//! The harness context.
//!
//! [`Harness`] is built once from a [`Config`] and wires the backends into
//! every component. It is immutable afterwards; share it by reference or
//! behind an `Arc`. There is no process-wide client: tests build their own
//! harness around in-process fakes with [`Harness::with_backends`].
//!
//! | Provider | Index service | Generative model |
//! |----------|---------------|------------------|
//! | `gemini` | Gemini file-search stores | Gemini `generateContent` |
//! | `local` | directory under `state_dir` | none |
//! | `disabled` | none | none |
//!
//! A provider that cannot be brought up (for example, `gemini` without an
//! API key) degrades to "none" with a warning; operations needing it then
//! fail with [`HarnessError::NotConfigured`](crate::error::HarnessError).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use advisory_harness_core::cooldown::GateDecision;
use advisory_harness_core::models::{IngestSummary, RemoteIndexHandle, UploadOutcome};
use advisory_harness_core::visual::{Classification, VisualStyle};

use crate::classify::QueryClassifier;
use crate::config::Config;
use crate::dedup::Deduplicator;
use crate::error::HarnessResult;
use crate::gate::CooldownGate;
use crate::gemini::GeminiClient;
use crate::index::IndexResolver;
use crate::infographic::InfographicGenerator;
use crate::ingest::FanOutUploader;
use crate::ledger::Ledger;
use crate::local_index::LocalIndexService;
use crate::progress::IngestProgressReporter;
use crate::reference::{load_reference_images, ReferenceImage};
use crate::remote::{GenerativeModel, IndexService};

pub struct Harness {
    config: Config,
    resolver: Arc<IndexResolver>,
    dedup: Arc<Deduplicator>,
    uploader: FanOutUploader,
    gate: Arc<CooldownGate>,
    infographics: InfographicGenerator,
    classifier: QueryClassifier,
}

impl Harness {
    /// Build the harness, bringing up the backend named by
    /// `remote.provider`.
    pub fn from_config(config: Config) -> Self {
        let (index, model): (Option<Arc<dyn IndexService>>, Option<Arc<dyn GenerativeModel>>) =
            match config.remote.provider.as_str() {
                "gemini" => match GeminiClient::new(&config.remote) {
                    Ok(client) => {
                        let client = Arc::new(client);
                        let index: Arc<dyn IndexService> = client.clone();
                        let model: Arc<dyn GenerativeModel> = client;
                        (Some(index), Some(model))
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Gemini backend unavailable; remote operations disabled");
                        (None, None)
                    }
                },
                "local" => {
                    let index: Arc<dyn IndexService> =
                        Arc::new(LocalIndexService::new(config.storage.local_index_root()));
                    (Some(index), None)
                }
                _ => (None, None),
            };
        Self::with_backends(config, index, model)
    }

    /// Build the harness around explicit backends.
    pub fn with_backends(
        config: Config,
        index: Option<Arc<dyn IndexService>>,
        model: Option<Arc<dyn GenerativeModel>>,
    ) -> Self {
        let storage = &config.storage;

        let resolver = Arc::new(IndexResolver::new(storage.index_handle_path(), index));
        let dedup = Arc::new(Deduplicator::new(
            resolver.clone(),
            Ledger::new(storage.upload_cache_path()),
        ));
        let uploader = FanOutUploader::new(dedup.clone(), config.ingest.clone());
        let gate = Arc::new(CooldownGate::from_config(
            Ledger::new(storage.cooldown_path()),
            &config.gate,
        ));
        let infographics = InfographicGenerator::new(
            gate.clone(),
            model.clone(),
            storage.output_dir.clone(),
            config.remote.image_model.clone(),
            config.remote.text_model.clone(),
        );
        let classifier = QueryClassifier::new(model, config.remote.text_model.clone());

        Self {
            config,
            resolver,
            dedup,
            uploader,
            gate,
            infographics,
            classifier,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn resolver(&self) -> &IndexResolver {
        &self.resolver
    }

    pub fn deduplicator(&self) -> &Deduplicator {
        &self.dedup
    }

    pub fn gate(&self) -> &CooldownGate {
        &self.gate
    }

    pub fn infographics(&self) -> &InfographicGenerator {
        &self.infographics
    }

    pub fn ensure_index(&self) -> HarnessResult<RemoteIndexHandle> {
        self.resolver.ensure_index()
    }

    pub fn upload_if_needed(&self, path: &Path) -> UploadOutcome {
        self.dedup.upload_if_needed(path)
    }

    /// Upload explicit files through the worker pool.
    pub fn upload_files(
        &self,
        files: &[PathBuf],
        progress: &dyn IngestProgressReporter,
    ) -> anyhow::Result<IngestSummary> {
        self.uploader.upload_all(files, progress)
    }

    /// Ingest `root`, or the configured knowledge base when `None`.
    pub fn ingest_directory(
        &self,
        root: Option<&Path>,
        progress: &dyn IngestProgressReporter,
    ) -> anyhow::Result<IngestSummary> {
        let root = root.unwrap_or(self.config.ingest.root.as_path());
        self.uploader.ingest_directory(root, progress)
    }

    pub fn evaluate_gate(&self, topic: &str, force: bool) -> GateDecision {
        self.gate.evaluate(topic, force)
    }

    pub fn should_generate(&self, topic: &str, force: bool) -> bool {
        self.gate.should_generate(topic, force)
    }

    pub fn record_generation(&self, topic: &str) -> bool {
        self.gate.record_generation(topic)
    }

    pub fn classify_query(&self, question: &str) -> Classification {
        self.classifier.classify_query(question)
    }

    /// Generate an infographic, attaching up to two reference images from
    /// `reference_category` when given.
    pub fn generate_infographic(
        &self,
        content: &str,
        topic: &str,
        language: &str,
        force: bool,
        reference_category: Option<&str>,
    ) -> HarnessResult<Option<PathBuf>> {
        let references = reference_category
            .map(|category| self.reference_images(category, 2))
            .unwrap_or_default();
        self.infographics
            .generate_with_references(content, topic, language, force, &references)
    }

    pub fn generate_svg(&self, content: &str, style: VisualStyle) -> HarnessResult<Option<String>> {
        self.infographics.generate_svg(content, style)
    }

    pub fn reference_images(&self, category: &str, max: usize) -> Vec<ReferenceImage> {
        load_reference_images(&self.config.storage.reference_dir, category, max)
    }
}
