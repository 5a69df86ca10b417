//! Dataset sources and the fallback loader

use super::record::{DatasetOrigin, PimaDataset};
use super::synthetic;
use crate::config::LoaderConfig;
use crate::core::{Dataset, FetchError};
use log::{info, warn};
use reqwest::blocking::Client;
use std::io::Cursor;
use std::path::PathBuf;
use std::time::Duration;

/// Something that can produce the Pima table
pub trait DatasetSource {
    fn fetch(&self) -> Result<PimaDataset, FetchError>;

    /// Human readable description used in logs
    fn describe(&self) -> String;
}

/// Blocking HTTP GET of a CSV body
#[derive(Debug, Clone)]
pub struct HttpSource {
    url: String,
    timeout: Duration,
}

impl HttpSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }
}

impl DatasetSource for HttpSource {
    fn fetch(&self) -> Result<PimaDataset, FetchError> {
        let client = Client::builder().timeout(self.timeout).build()?;
        let response = client.get(&self.url).send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.text()?;
        PimaDataset::from_reader(Cursor::new(body), DatasetOrigin::Remote(self.url.clone()))
    }

    fn describe(&self) -> String {
        format!("{} (timeout {}s)", self.url, self.timeout.as_secs_f64())
    }
}

/// CSV file on the local filesystem
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DatasetSource for FileSource {
    fn fetch(&self) -> Result<PimaDataset, FetchError> {
        PimaDataset::from_file(&self.path)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Seeded synthetic table; never fails
#[derive(Debug, Clone, Copy)]
pub struct SyntheticSource {
    rows: usize,
    seed: u64,
}

impl SyntheticSource {
    pub fn new(rows: usize, seed: u64) -> Self {
        Self { rows, seed }
    }
}

impl DatasetSource for SyntheticSource {
    fn fetch(&self) -> Result<PimaDataset, FetchError> {
        Ok(synthetic::generate(self.rows, self.seed))
    }

    fn describe(&self) -> String {
        format!("synthetic ({} rows, seed {})", self.rows, self.seed)
    }
}

/// The source a loader configuration points at
pub fn primary_source(config: &LoaderConfig) -> Box<dyn DatasetSource> {
    if config.offline {
        Box::new(SyntheticSource::new(config.synthetic_rows, config.synthetic_seed))
    } else if let Some(path) = &config.file {
        Box::new(FileSource::new(path.clone()))
    } else {
        Box::new(HttpSource::new(config.url.clone(), config.timeout))
    }
}

/// Load the dataset, falling back to synthetic data on any fetch failure
pub fn load(config: &LoaderConfig) -> PimaDataset {
    load_with(primary_source(config).as_ref(), config)
}

/// Load from an explicit source with the same fallback as [`load`]
pub fn load_with(source: &dyn DatasetSource, config: &LoaderConfig) -> PimaDataset {
    info!("Loading dataset from {}", source.describe());

    source
        .fetch()
        .and_then(|dataset| check_shape(dataset, config.expected_rows))
        .map(|dataset| {
            info!(
                "Loaded {} records ({} diabetic) from {}",
                dataset.len(),
                dataset.positive_count(),
                dataset.origin()
            );
            dataset
        })
        .unwrap_or_else(|err| {
            warn!(
                "Dataset unavailable from {}: {err}; using synthetic data (seed {})",
                source.describe(),
                config.synthetic_seed
            );
            synthetic::generate(config.synthetic_rows, config.synthetic_seed)
        })
}

fn check_shape(
    dataset: PimaDataset,
    expected_rows: Option<usize>,
) -> Result<PimaDataset, FetchError> {
    match expected_rows {
        Some(expected) if dataset.len() != expected => Err(FetchError::Shape {
            expected,
            actual: dataset.len(),
        }),
        _ => Ok(dataset),
    }
}
