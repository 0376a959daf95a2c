use std::path::PathBuf;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, info, warn};

use crate::backend::{BackendFactory, CollectionSpec, Distance, IdScheme, VectorBackend};
use crate::config::{BackendKind, PartialBatchPolicy, TargetDescriptor};
use crate::error::{Error, Result, Section};
use crate::records::{PayloadStream, QueryStream};
use crate::report::{ResultRecord, Stopwatch, load_result_name, search_result_name, write_result};
use crate::types::{DEFAULT_TOP_K, Payload, PointBatch, SearchParams};
use crate::vectors::{VectorArray, VectorView};

/// Settings shared by every target of a run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Directory result records are written to
    pub out_dir: PathBuf,
    /// Applied to targets that do not set `partial_batch` themselves
    pub partial_batch: PartialBatchPolicy,
    /// Draw a progress bar on stderr
    pub show_progress: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("out"),
            partial_batch: PartialBatchPolicy::default(),
            show_progress: true,
        }
    }
}

impl RunOptions {
    fn progress(&self, len: Option<u64>) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        match len {
            Some(len) => {
                let pb = ProgressBar::new(len);
                let style = ProgressStyle::with_template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} records",
                )
                .map(|s| s.progress_chars("#>-"))
                .unwrap_or_else(|_| ProgressStyle::default_bar());
                pb.set_style(style);
                pb
            }
            None => {
                let pb = ProgressBar::new_spinner();
                let style =
                    ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {pos} queries")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner());
                pb.set_style(style);
                pb
            }
        }
    }
}

/// What happened to a single target
#[derive(Debug)]
pub enum TargetOutcome {
    /// The run completed and its record was written to `path`
    Written {
        collection: String,
        path: PathBuf,
        duration: f64,
    },
    /// `db_type` did not name a known backend
    Skipped { db_type: String },
    /// The run aborted; no record was written
    Failed { collection: String, error: Error },
}

/// One outcome per target, in configuration order
#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<TargetOutcome>,
}

impl RunSummary {
    pub fn written(&self) -> usize {
        self.count(|o| matches!(o, TargetOutcome::Written { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, TargetOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, TargetOutcome::Failed { .. }))
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    fn count(&self, pred: impl Fn(&TargetOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }
}

fn skipped(target: &TargetDescriptor, err: Error) -> TargetOutcome {
    warn!("{}: object {:?}", err, target);
    TargetOutcome::Skipped {
        db_type: target.db_type.clone(),
    }
}

fn finished(target: &TargetDescriptor, result: Result<(PathBuf, f64)>) -> TargetOutcome {
    match result {
        Ok((path, duration)) => TargetOutcome::Written {
            collection: target.collection.clone(),
            path,
            duration,
        },
        Err(error) => {
            error!(collection = %target.collection, db_type = %target.db_type, error = %error, "Target failed");
            TargetOutcome::Failed {
                collection: target.collection.clone(),
                error,
            }
        }
    }
}

/// Bulk-loads vectors and payloads into each target
pub struct LoadRunner<'a> {
    factory: &'a dyn BackendFactory,
    options: RunOptions,
}

impl<'a> LoadRunner<'a> {
    pub fn new(factory: &'a dyn BackendFactory, options: RunOptions) -> Self {
        Self { factory, options }
    }

    /// Load every target in order; fails only when there are no targets
    pub async fn run(&self, targets: &[TargetDescriptor]) -> Result<RunSummary> {
        if targets.is_empty() {
            return Err(Error::MissingSection(Section::Load));
        }

        let mut summary = RunSummary::default();
        for (i, target) in targets.iter().enumerate() {
            info!("=> Running load config {}/{}", i + 1, targets.len());

            let outcome = match target.backend_kind() {
                Ok(kind) => finished(target, self.load_target(kind, target).await),
                Err(err) => skipped(target, err),
            };
            summary.outcomes.push(outcome);
        }
        Ok(summary)
    }

    async fn load_target(
        &self,
        kind: BackendKind,
        target: &TargetDescriptor,
    ) -> Result<(PathBuf, f64)> {
        target.require_endpoint()?;
        let dimension = target.dimension.ok_or_else(|| {
            Error::Config(format!(
                "'dimension' is required for collection '{}'",
                target.collection
            ))
        })?;
        let vectors_path = target.require_path(&target.path_to_vectors, "path_to_vectors")?;
        let payload_path = target.require_path(&target.path_to_payload, "path_to_payload")?;

        let mut backend = self.factory.create(kind, target)?;
        backend.connect().await?;
        backend
            .ensure_collection(&CollectionSpec {
                name: target.collection.clone(),
                dimension,
                distance: Distance::Cosine,
            })
            .await?;

        let stopwatch = Stopwatch::start();

        let vectors = VectorArray::open(&vectors_path)?;
        let view = vectors.view()?;
        if view.dimension() != dimension {
            return Err(Error::Config(format!(
                "collection '{}' expects dimension {} but {} holds {}-dimensional vectors",
                target.collection,
                dimension,
                vectors.path().display(),
                view.dimension()
            )));
        }
        let payloads = PayloadStream::open(&payload_path)?;

        let capabilities = backend.capabilities();
        let batch_size = target.batch_size.unwrap_or(capabilities.batch_size).max(1);
        let policy = target.partial_batch.unwrap_or(self.options.partial_batch);

        let progress = self.options.progress(Some(view.rows() as u64));
        let mut loader = BatchLoader::new(&*backend, &view, capabilities.id_scheme, batch_size);
        for payload in payloads {
            loader.push(payload?).await?;
            progress.inc(1);
        }
        loader.finish(policy).await?;
        progress.finish_and_clear();

        let timing = stopwatch.stop();
        info!(
            collection = %target.collection,
            backend = backend.name(),
            upserted = loader.upserted,
            batches = loader.batches,
            duration_s = timing.duration.as_secs_f64(),
            "Load complete"
        );
        backend.disconnect().await?;

        let record = ResultRecord::new(target.clone(), timing);
        let path = write_result(
            &self.options.out_dir,
            &load_result_name(&target.collection, kind),
            &record,
        )?;
        Ok((path, record.duration))
    }
}

/// Groups payloads into batches and pairs them with vector rows by position
struct BatchLoader<'a, 'v> {
    backend: &'a dyn VectorBackend,
    view: &'a VectorView<'v>,
    id_scheme: IdScheme,
    batch_size: usize,
    pending: Vec<Payload>,
    offset: usize,
    upserted: usize,
    batches: usize,
}

impl<'a, 'v> BatchLoader<'a, 'v> {
    fn new(
        backend: &'a dyn VectorBackend,
        view: &'a VectorView<'v>,
        id_scheme: IdScheme,
        batch_size: usize,
    ) -> Self {
        Self {
            backend,
            view,
            id_scheme,
            batch_size,
            pending: Vec::with_capacity(batch_size),
            offset: 0,
            upserted: 0,
            batches: 0,
        }
    }

    async fn push(&mut self, payload: Payload) -> Result<()> {
        self.pending.push(payload);
        if self.pending.len() == self.batch_size {
            self.flush().await?;
        }
        Ok(())
    }

    async fn finish(&mut self, policy: PartialBatchPolicy) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        match policy {
            PartialBatchPolicy::Flush => {
                debug!(records = self.pending.len(), "Flushing final partial batch");
                self.flush().await
            }
            PartialBatchPolicy::Drop => {
                warn!(
                    dropped = self.pending.len(),
                    batch_size = self.batch_size,
                    "Dropping final partial batch"
                );
                self.pending.clear();
                Ok(())
            }
        }
    }

    async fn flush(&mut self) -> Result<()> {
        let len = self.pending.len();
        let start = self.offset;

        let vectors = self.view.slice(start, len)?;
        let ids = (start..start + len)
            .map(|offset| self.id_scheme.id_for(offset))
            .collect();
        let payloads = std::mem::replace(&mut self.pending, Vec::with_capacity(self.batch_size));

        self.backend
            .upsert_batch(PointBatch {
                ids,
                vectors,
                payloads,
            })
            .await?;
        debug!(start, len, "Upserted batch");

        self.offset += len;
        self.upserted += len;
        self.batches += 1;
        Ok(())
    }
}

/// Replays recorded queries against each target
pub struct SearchRunner<'a> {
    factory: &'a dyn BackendFactory,
    options: RunOptions,
}

impl<'a> SearchRunner<'a> {
    pub fn new(factory: &'a dyn BackendFactory, options: RunOptions) -> Self {
        Self { factory, options }
    }

    /// Search every target in order; fails only when there are no targets
    pub async fn run(&self, targets: &[TargetDescriptor]) -> Result<RunSummary> {
        if targets.is_empty() {
            return Err(Error::MissingSection(Section::Search));
        }

        let mut summary = RunSummary::default();
        for (i, target) in targets.iter().enumerate() {
            info!("=> Running search config {}/{}", i + 1, targets.len());

            let outcome = match target.backend_kind() {
                Ok(kind) => finished(target, self.search_target(kind, target).await),
                Err(err) => skipped(target, err),
            };
            summary.outcomes.push(outcome);
        }
        Ok(summary)
    }

    async fn search_target(
        &self,
        kind: BackendKind,
        target: &TargetDescriptor,
    ) -> Result<(PathBuf, f64)> {
        target.require_endpoint()?;
        let tests_path = target.require_path(&target.path_to_tests, "path_to_tests")?;

        let mut backend = self.factory.create(kind, target)?;
        backend.connect().await?;
        backend.open_collection(&target.collection).await?;

        let params = SearchParams {
            top_k: target.top_k.unwrap_or(DEFAULT_TOP_K),
        };

        let stopwatch = Stopwatch::start();

        let progress = self.options.progress(None);
        let mut issued = 0usize;
        for record in QueryStream::open(&tests_path)? {
            let record = record?;
            let results = backend.query(&record.query, &params).await?;
            debug!(hits = results.results.len(), "Query returned");
            issued += 1;
            progress.inc(1);
        }
        progress.finish_and_clear();

        let timing = stopwatch.stop();
        info!(
            collection = %target.collection,
            backend = backend.name(),
            queries = issued,
            duration_s = timing.duration.as_secs_f64(),
            "Search complete"
        );
        backend.disconnect().await?;

        let record = ResultRecord::new(target.clone(), timing);
        let path = write_result(
            &self.options.out_dir,
            &search_result_name(&target.collection, kind),
            &record,
        )?;
        Ok((path, record.duration))
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use ndarray::Array2;

    use super::*;
    use crate::backend::Capabilities;
    use crate::types::{PointId, SearchResults};

    #[derive(Default)]
    struct Recorded {
        collections: Vec<CollectionSpec>,
        opened: Vec<String>,
        batches: Vec<PointBatch>,
        queries: Vec<(Vec<f32>, usize)>,
    }

    struct MockBackend {
        capabilities: Capabilities,
        recorded: Arc<Mutex<Recorded>>,
        /// Upserts and queries error out
        failing: bool,
    }

    #[async_trait]
    impl VectorBackend for MockBackend {
        fn name(&self) -> &str {
            "mock"
        }

        fn capabilities(&self) -> Capabilities {
            self.capabilities
        }

        async fn connect(&mut self) -> Result<()> {
            Ok(())
        }

        async fn disconnect(&mut self) -> Result<()> {
            Ok(())
        }

        async fn ensure_collection(&mut self, spec: &CollectionSpec) -> Result<()> {
            self.recorded.lock().unwrap().collections.push(spec.clone());
            Ok(())
        }

        async fn open_collection(&mut self, name: &str) -> Result<()> {
            self.recorded.lock().unwrap().opened.push(name.to_string());
            Ok(())
        }

        async fn upsert_batch(&self, batch: PointBatch) -> Result<()> {
            if self.failing {
                return Err(Error::Upsert("connection reset".into()));
            }
            self.recorded.lock().unwrap().batches.push(batch);
            Ok(())
        }

        async fn query(&self, vector: &[f32], params: &SearchParams) -> Result<SearchResults> {
            if self.failing {
                return Err(Error::QueryExecution("deadline exceeded".into()));
            }
            self.recorded
                .lock()
                .unwrap()
                .queries
                .push((vector.to_vec(), params.top_k));
            Ok(SearchResults::default())
        }
    }

    const SINGLE: Capabilities = Capabilities {
        batch_size: 1,
        id_scheme: IdScheme::OneBasedNumeric,
    };

    const BATCHED: Capabilities = Capabilities {
        batch_size: 1000,
        id_scheme: IdScheme::ZeroBasedText,
    };

    fn mock_factory(
        capabilities: Capabilities,
        recorded: Arc<Mutex<Recorded>>,
    ) -> impl BackendFactory {
        move |_kind: BackendKind, target: &TargetDescriptor| -> Result<Box<dyn VectorBackend>> {
            Ok(Box::new(MockBackend {
                capabilities,
                recorded: recorded.clone(),
                failing: target.collection == "broken",
            }))
        }
    }

    fn options(out_dir: &Path) -> RunOptions {
        RunOptions {
            out_dir: out_dir.to_path_buf(),
            partial_batch: PartialBatchPolicy::Flush,
            show_progress: false,
        }
    }

    /// Row `i` of the array is filled with `i`; payload line `i` is `{"row": i}`
    fn write_dataset(dir: &Path, rows: usize, payload_lines: usize, dim: usize) {
        let array = Array2::from_shape_fn((rows, dim), |(i, _)| i as f32);
        ndarray_npy::write_npy(dir.join("vectors.npy"), &array).unwrap();

        let payloads: String = (0..payload_lines)
            .map(|i| format!("{{\"row\": {i}}}\n"))
            .collect();
        std::fs::write(dir.join("payloads.jsonl"), payloads).unwrap();
    }

    fn load_target(dir: &Path, db_type: &str, collection: &str, dim: usize) -> TargetDescriptor {
        serde_yaml::from_str(&format!(
            "db_type: {db_type}\nurl: http://localhost\ncollection: {collection}\ndimension: {dim}\npath_to_vectors: {}\npath_to_payload: {}\n",
            dir.join("vectors.npy").display(),
            dir.join("payloads.jsonl").display(),
        ))
        .unwrap()
    }

    fn search_target(db_type: &str, collection: &str, tests: &Path) -> TargetDescriptor {
        serde_yaml::from_str(&format!(
            "db_type: {db_type}\nurl: localhost\ncollection: {collection}\npath_to_tests: {}\n",
            tests.display()
        ))
        .unwrap()
    }

    fn count_files(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn test_single_record_loader_assigns_sequential_ids() {
        let data = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_dataset(data.path(), 5, 5, 3);

        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let factory = mock_factory(SINGLE, recorded.clone());
        let runner = LoadRunner::new(&factory, options(out.path()));

        let summary = runner
            .run(&[load_target(data.path(), "qdrant", "wiki", 3)])
            .await
            .unwrap();
        assert_eq!(summary.written(), 1);

        let recorded = recorded.lock().unwrap();
        assert_eq!(
            recorded.collections,
            vec![CollectionSpec {
                name: "wiki".into(),
                dimension: 3,
                distance: Distance::Cosine,
            }]
        );
        assert_eq!(recorded.batches.len(), 5);
        for (i, batch) in recorded.batches.iter().enumerate() {
            assert_eq!(batch.ids, vec![PointId::Num(i as u64 + 1)]);
            assert_eq!(batch.vectors, vec![vec![i as f32; 3]]);
            assert_eq!(batch.payloads[0]["row"], i);
        }
        assert!(out.path().join("wiki_qdrant_result.json").exists());
    }

    #[tokio::test]
    async fn test_batched_loader_flushes_partial_batch() {
        let data = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_dataset(data.path(), 1500, 1500, 2);

        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let factory = mock_factory(BATCHED, recorded.clone());
        let runner = LoadRunner::new(&factory, options(out.path()));

        runner
            .run(&[load_target(data.path(), "chroma", "wiki", 2)])
            .await
            .unwrap();

        let recorded = recorded.lock().unwrap();
        let sizes: Vec<usize> = recorded.batches.iter().map(PointBatch::len).collect();
        assert_eq!(sizes, vec![1000, 500]);
        assert_eq!(recorded.batches[0].ids[0], PointId::Text("0".into()));
        assert_eq!(recorded.batches[0].ids[999], PointId::Text("999".into()));
        assert_eq!(recorded.batches[1].ids[0], PointId::Text("1000".into()));
        assert_eq!(recorded.batches[1].vectors[0], vec![1000.0, 1000.0]);
        assert_eq!(recorded.batches[1].payloads[499]["row"], 1499);
    }

    #[tokio::test]
    async fn test_batched_loader_can_drop_partial_batch() {
        let data = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_dataset(data.path(), 1500, 1500, 2);

        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let factory = mock_factory(BATCHED, recorded.clone());
        let runner = LoadRunner::new(
            &factory,
            RunOptions {
                partial_batch: PartialBatchPolicy::Drop,
                ..options(out.path())
            },
        );

        let summary = runner
            .run(&[load_target(data.path(), "chroma", "wiki", 2)])
            .await
            .unwrap();
        assert_eq!(summary.written(), 1);

        let recorded = recorded.lock().unwrap();
        let upserted: usize = recorded.batches.iter().map(PointBatch::len).sum();
        assert_eq!(recorded.batches.len(), 1);
        assert_eq!(upserted, 1000);
    }

    #[tokio::test]
    async fn test_target_policy_overrides_run_policy() {
        let data = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_dataset(data.path(), 1500, 1500, 2);

        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let factory = mock_factory(BATCHED, recorded.clone());
        let runner = LoadRunner::new(&factory, options(out.path()));

        let mut target = load_target(data.path(), "chroma", "wiki", 2);
        target.partial_batch = Some(PartialBatchPolicy::Drop);
        target.batch_size = Some(400);
        runner.run(&[target]).await.unwrap();

        let recorded = recorded.lock().unwrap();
        let sizes: Vec<usize> = recorded.batches.iter().map(PointBatch::len).collect();
        assert_eq!(sizes, vec![400, 400, 400]);
    }

    #[tokio::test]
    async fn test_unknown_backend_is_skipped() {
        let data = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_dataset(data.path(), 3, 3, 2);

        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let factory = mock_factory(SINGLE, recorded.clone());
        let runner = LoadRunner::new(&factory, options(out.path()));

        let targets = vec![
            load_target(data.path(), "milvus", "wiki", 2),
            load_target(data.path(), "qdrant", "wiki", 2),
        ];
        let summary = runner.run(&targets).await.unwrap();

        assert!(matches!(
            summary.outcomes[0],
            TargetOutcome::Skipped { ref db_type } if db_type == "milvus"
        ));
        assert!(matches!(summary.outcomes[1], TargetOutcome::Written { .. }));
        assert_eq!(count_files(out.path()), 1);
        assert!(out.path().join("wiki_qdrant_result.json").exists());
        assert_eq!(recorded.lock().unwrap().collections.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_target_does_not_stop_the_run() {
        let data = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_dataset(data.path(), 3, 3, 2);

        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let factory = mock_factory(SINGLE, recorded.clone());
        let runner = LoadRunner::new(&factory, options(out.path()));

        let targets = vec![
            load_target(data.path(), "qdrant", "broken", 2),
            load_target(data.path(), "chroma", "wiki", 2),
        ];
        let summary = runner.run(&targets).await.unwrap();

        assert!(matches!(
            summary.outcomes[0],
            TargetOutcome::Failed {
                error: Error::Upsert(_),
                ..
            }
        ));
        assert!(summary.has_failures());
        assert_eq!(summary.written(), 1);
        assert!(!out.path().join("broken_qdrant_result.json").exists());
        assert!(out.path().join("wiki_chroma_result.json").exists());
    }

    #[tokio::test]
    async fn test_more_payloads_than_vectors_fails_the_target() {
        let data = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_dataset(data.path(), 2, 3, 2);

        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let factory = mock_factory(SINGLE, recorded.clone());
        let runner = LoadRunner::new(&factory, options(out.path()));

        let summary = runner
            .run(&[load_target(data.path(), "qdrant", "wiki", 2)])
            .await
            .unwrap();

        assert!(matches!(
            summary.outcomes[0],
            TargetOutcome::Failed {
                error: Error::VectorOutOfRange { rows: 2, .. },
                ..
            }
        ));
        assert_eq!(count_files(out.path()), 0);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_fails_the_target() {
        let data = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_dataset(data.path(), 2, 2, 4);

        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let factory = mock_factory(SINGLE, recorded.clone());
        let runner = LoadRunner::new(&factory, options(out.path()));

        let summary = runner
            .run(&[load_target(data.path(), "qdrant", "wiki", 8)])
            .await
            .unwrap();
        assert_eq!(summary.failed(), 1);
        assert!(recorded.lock().unwrap().batches.is_empty());
    }

    #[tokio::test]
    async fn test_empty_target_lists_are_reported() {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let factory = mock_factory(SINGLE, recorded);

        let load = LoadRunner::new(&factory, RunOptions::default()).run(&[]).await;
        assert!(matches!(load, Err(Error::MissingSection(Section::Load))));

        let search = SearchRunner::new(&factory, RunOptions::default()).run(&[]).await;
        assert!(matches!(search, Err(Error::MissingSection(Section::Search))));
    }

    #[tokio::test]
    async fn test_search_issues_each_recorded_query() {
        let data = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        std::fs::write(
            data.path().join("tests.jsonl"),
            "{\"query\": [1.0, 0.0]}\n{\"query\": [0.0, 1.0]}\n{\"query\": [0.5, 0.5]}\n",
        )
        .unwrap();

        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let factory = mock_factory(BATCHED, recorded.clone());
        let runner = SearchRunner::new(&factory, options(out.path()));

        let target: TargetDescriptor = serde_yaml::from_str(&format!(
            "db_type: chroma\nurl: localhost\ncollection: wiki\ntop_k: 3\npath_to_tests: {}\n",
            data.path().join("tests.jsonl").display()
        ))
        .unwrap();
        let summary = runner.run(&[target]).await.unwrap();
        assert_eq!(summary.written(), 1);

        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.opened, vec!["wiki".to_string()]);
        assert_eq!(
            recorded.queries,
            vec![(vec![1.0, 0.0], 3), (vec![0.0, 1.0], 3), (vec![0.5, 0.5], 3)]
        );

        let text =
            std::fs::read_to_string(out.path().join("search_wiki_chroma_result.json")).unwrap();
        let record: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert!(record["duration"].as_f64().unwrap() >= 0.0);
        assert_eq!(record["top_k"], 3);
    }

    #[tokio::test]
    async fn test_search_without_tests_path_fails() {
        let out = tempfile::tempdir().unwrap();
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let factory = mock_factory(SINGLE, recorded.clone());
        let runner = SearchRunner::new(&factory, options(out.path()));

        let target: TargetDescriptor =
            serde_yaml::from_str("db_type: qdrant\nurl: x\ncollection: wiki\n").unwrap();
        let summary = runner.run(&[target]).await.unwrap();

        assert!(matches!(
            summary.outcomes[0],
            TargetOutcome::Failed {
                error: Error::Config(_),
                ..
            }
        ));
        assert!(recorded.lock().unwrap().opened.is_empty());
    }

    #[tokio::test]
    async fn test_failed_search_target_does_not_stop_the_run() {
        let data = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let good = data.path().join("good.jsonl");
        let bad = data.path().join("bad.jsonl");
        std::fs::write(&good, "{\"query\": [1.0, 0.0]}\n{\"query\": [0.0, 1.0]}\n").unwrap();
        std::fs::write(&bad, "{\"query\": [1.0, 0.0]}\n{\"query\": oops}\n").unwrap();

        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let factory = mock_factory(BATCHED, recorded.clone());
        let runner = SearchRunner::new(&factory, options(out.path()));

        let targets = vec![
            search_target("qdrant", "broken", &good),
            search_target("chroma", "truncated", &bad),
            search_target("chroma", "wiki", &good),
        ];
        let summary = runner.run(&targets).await.unwrap();

        assert!(matches!(
            summary.outcomes[0],
            TargetOutcome::Failed {
                error: Error::QueryExecution(_),
                ..
            }
        ));
        assert!(matches!(
            summary.outcomes[1],
            TargetOutcome::Failed {
                error: Error::Record { line: 2, .. },
                ..
            }
        ));
        assert!(matches!(summary.outcomes[2], TargetOutcome::Written { .. }));
        assert_eq!(summary.failed(), 2);

        assert_eq!(count_files(out.path()), 1);
        assert!(out.path().join("search_wiki_chroma_result.json").exists());
        // first line of the truncated file plus both lines against wiki
        assert_eq!(recorded.lock().unwrap().queries.len(), 3);
    }

    #[tokio::test]
    async fn test_sparse_entries_fail_or_skip_individually() {
        let data = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_dataset(data.path(), 3, 3, 2);

        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let factory = mock_factory(SINGLE, recorded.clone());
        let runner = LoadRunner::new(&factory, options(out.path()));

        let config = crate::config::Config::from_str(&format!(
            "load_config:\n  - db_type: milvus\n    url: x\n  - db_type: qdrant\n    url: x\n    dimension: 2\n  - db_type: qdrant\n    url: x\n    collection: wiki\n    dimension: 2\n    path_to_vectors: {}\n    path_to_payload: {}\n",
            data.path().join("vectors.npy").display(),
            data.path().join("payloads.jsonl").display(),
        ))
        .unwrap();
        let summary = runner.run(config.load_targets()).await.unwrap();

        assert!(matches!(summary.outcomes[0], TargetOutcome::Skipped { .. }));
        assert!(matches!(
            summary.outcomes[1],
            TargetOutcome::Failed {
                error: Error::Config(ref msg),
                ..
            } if msg.contains("'collection'")
        ));
        assert!(matches!(summary.outcomes[2], TargetOutcome::Written { .. }));
        assert_eq!(recorded.lock().unwrap().collections.len(), 1);
        assert!(out.path().join("wiki_qdrant_result.json").exists());
    }
}
