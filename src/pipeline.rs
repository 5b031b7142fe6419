//! Wires configuration, storage and OCR into a core [`Engine`].

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use copycat_core::{Engine, Extractor};

use crate::config::Config;
use crate::db;
use crate::ocr::TesseractOcr;
use crate::sqlite_repo::SqliteRepository;

/// An engine over the configured SQLite database.
pub struct Pipeline {
    pub engine: Engine,
    pub repo: Arc<SqliteRepository>,
}

impl Pipeline {
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        let repo = Arc::new(SqliteRepository::new(pool));

        let mut extractor = Extractor::new(config.extraction_limits());
        if config.ocr.enabled {
            debug!(command = %config.ocr.command, "OCR enabled");
            extractor = extractor.with_ocr(Arc::new(TesseractOcr::from_config(&config.ocr)));
        }

        // One process serves one command, so a refit after recording would
        // be discarded on exit; `rebuild` persists nothing either and the
        // next evaluation fits the corpus it reads.
        let engine = Engine::new(repo.clone(), extractor)
            .with_detection(config.detection_params())
            .with_model(config.model_params())
            .with_rebuild_after_record(false);

        Ok(Self { engine, repo })
    }

    pub async fn close(self) {
        self.repo.pool().close().await;
    }
}
