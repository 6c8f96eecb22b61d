//! Bulk extraction of byte ranges to files.
//!
//! Each [`ExtractJob`] copies `length` bytes starting at `position` of its
//! source into a destination file, creating parent directories as needed.
//! Jobs are independent: every job runs, failures are collected into the
//! [`ExtractReport`] and never stop their siblings.
//!
//! With the `parallel` feature (default) jobs fan out over a dedicated Rayon
//! pool of at most [`ExtractOptions::max_threads`] workers.  Each worker opens
//! its own source handle.  Progress is reported on the calling thread as the
//! share of finished jobs.

use std::fs::{self, File};
use std::io::{self, BufWriter, Cursor, Write};
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use crate::io_stream::{copy_part, DEFAULT_BUFFER_SIZE};
use crate::progress::{percent, ProgressFn};

// ── Options ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Upper bound on concurrent jobs.  0 is treated as 1.
    pub max_threads: usize,
    /// Copy buffer per job.
    pub buffer_size: usize,
    /// Run jobs on a worker pool.  Ignored without the `parallel` feature.
    pub parallel:    bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            max_threads: 4,
            buffer_size: DEFAULT_BUFFER_SIZE,
            parallel:    true,
        }
    }
}

impl ExtractOptions {
    pub fn sequential() -> Self {
        Self { parallel: false, ..Self::default() }
    }
}

// ── Jobs ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum JobSource {
    /// Opened separately by every job that uses it.
    Path(PathBuf),
    Bytes(Arc<[u8]>),
}

#[derive(Debug, Clone)]
pub struct ExtractJob {
    pub source:      JobSource,
    pub destination: PathBuf,
    pub position:    u64,
    pub length:      u64,
}

#[derive(Error, Debug)]
#[error("Extracting {} failed: {source}", destination.display())]
pub struct ExtractError {
    pub destination: PathBuf,
    #[source]
    pub source:      io::Error,
}

#[derive(Debug, Default)]
pub struct ExtractReport {
    pub completed: usize,
    pub bytes:     u64,
    pub errors:    Vec<ExtractError>,
}

impl ExtractReport {
    pub fn is_success(&self) -> bool { self.errors.is_empty() }

    fn record(&mut self, outcome: Result<u64, ExtractError>) {
        match outcome {
            Ok(n) => {
                self.completed += 1;
                self.bytes += n;
            }
            Err(e) => {
                warn!(destination = %e.destination.display(), error = %e.source, "extraction job failed");
                self.errors.push(e);
            }
        }
    }
}

// ── Extractor ────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct Extractor {
    options: ExtractOptions,
    jobs:    Vec<ExtractJob>,
}

impl Extractor {
    pub fn new(options: ExtractOptions) -> Self {
        Self { options, jobs: Vec::new() }
    }

    pub fn options(&self) -> &ExtractOptions { &self.options }

    pub fn jobs(&self) -> &[ExtractJob] { &self.jobs }

    pub fn len(&self) -> usize { self.jobs.len() }

    pub fn is_empty(&self) -> bool { self.jobs.is_empty() }

    pub fn add(&mut self, job: ExtractJob) {
        self.jobs.push(job);
    }

    pub fn add_from_path(
        &mut self,
        source:      impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        position:    u64,
        length:      u64,
    ) {
        self.add(ExtractJob {
            source: JobSource::Path(source.into()),
            destination: destination.into(),
            position,
            length,
        });
    }

    pub fn add_from_bytes(
        &mut self,
        source:      Arc<[u8]>,
        destination: impl Into<PathBuf>,
        position:    u64,
        length:      u64,
    ) {
        self.add(ExtractJob { source: JobSource::Bytes(source), destination: destination.into(), position, length });
    }

    pub fn clear(&mut self) {
        self.jobs.clear();
    }

    /// Run every queued job and clear the queue.
    pub fn run(&mut self, progress: Option<&mut ProgressFn<'_>>) -> ExtractReport {
        let jobs = std::mem::take(&mut self.jobs);

        #[cfg(feature = "parallel")]
        {
            if self.options.parallel && self.options.max_threads > 1 && jobs.len() > 1 {
                match rayon::ThreadPoolBuilder::new().num_threads(self.options.max_threads).build() {
                    Ok(pool) => return run_parallel(&pool, &jobs, self.options.buffer_size, progress),
                    Err(e) => warn!(error = %e, "extraction pool unavailable, running sequentially"),
                }
            }
        }

        run_sequential(&jobs, self.options.buffer_size, progress)
    }
}

fn run_sequential(
    jobs:         &[ExtractJob],
    buffer_size:  usize,
    mut progress: Option<&mut ProgressFn<'_>>,
) -> ExtractReport {
    let mut report = ExtractReport::default();
    for (i, job) in jobs.iter().enumerate() {
        report.record(run_job(job, buffer_size));
        if let Some(cb) = progress.as_deref_mut() {
            cb(percent(i as u64 + 1, jobs.len() as u64));
        }
    }
    report
}

#[cfg(feature = "parallel")]
fn run_parallel(
    pool:         &rayon::ThreadPool,
    jobs:         &[ExtractJob],
    buffer_size:  usize,
    mut progress: Option<&mut ProgressFn<'_>>,
) -> ExtractReport {
    use rayon::prelude::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::mpsc;

    let total = jobs.len() as u64;
    let done = AtomicU64::new(0);
    let (tx, rx) = mpsc::channel::<()>();

    let outcomes = std::thread::scope(|scope| {
        let workers = scope.spawn(|| {
            pool.install(|| {
                jobs.par_iter()
                    .map_with(tx, |tx, job| {
                        let outcome = run_job(job, buffer_size);
                        done.fetch_add(1, Ordering::AcqRel);
                        let _ = tx.send(());
                        outcome
                    })
                    .collect::<Vec<_>>()
            })
        });

        // Ends once every worker's sender is dropped.
        for () in rx {
            if let Some(cb) = progress.as_deref_mut() {
                cb(percent(done.load(Ordering::Acquire), total));
            }
        }
        workers.join()
    });

    let outcomes = match outcomes {
        Ok(o) => o,
        Err(panic) => std::panic::resume_unwind(panic),
    };
    let mut report = ExtractReport::default();
    for outcome in outcomes {
        report.record(outcome);
    }
    report
}

fn run_job(job: &ExtractJob, buffer_size: usize) -> Result<u64, ExtractError> {
    copy_job(job, buffer_size).map_err(|source| ExtractError { destination: job.destination.clone(), source })
}

fn copy_job(job: &ExtractJob, buffer_size: usize) -> io::Result<u64> {
    if let Some(parent) = job.destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(File::create(&job.destination)?);
    let copied = match &job.source {
        JobSource::Path(path) => copy_part(&mut File::open(path)?, &mut out, job.position, job.length, buffer_size)?,
        JobSource::Bytes(data) => {
            copy_part(&mut Cursor::new(&data[..]), &mut out, job.position, job.length, buffer_size)?
        }
    };
    out.flush()?;

    if copied != job.length {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("source ended after {copied} of {} bytes", job.length),
        ));
    }
    Ok(copied)
}
