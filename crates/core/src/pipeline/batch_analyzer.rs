use std::path::PathBuf;
use std::sync::Arc;

use crate::capture::domain::frame_source::{CaptureError, FrameSource, VideoSource};
use crate::pipeline::analysis_session::{Analysis, AnalysisError, AnalysisSession, FaceAnalyzer};

const DEFAULT_CHANNEL_CAPACITY: usize = 8;

/// Analyzes many stored frames on a fixed pool of worker threads.
///
/// Layout: `feeder → [worker × N] → collector`. Each worker runs its own
/// [`AnalysisSession`], so every file gets its own capture handle.
pub struct BatchAnalyzer {
    source: Arc<dyn FrameSource>,
    analyzer: FaceAnalyzer,
    workers: usize,
    channel_capacity: usize,
}

impl BatchAnalyzer {
    pub fn new(source: Arc<dyn FrameSource>, analyzer: FaceAnalyzer, workers: usize) -> Self {
        Self {
            source,
            analyzer,
            workers: workers.max(1),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// One result per path, in input order.
    pub fn analyze_all(&self, paths: &[PathBuf]) -> Vec<Result<Analysis, AnalysisError>> {
        let (job_tx, job_rx) = crossbeam_channel::bounded::<(usize, PathBuf)>(self.channel_capacity);
        let (result_tx, result_rx) =
            crossbeam_channel::bounded::<(usize, Result<Analysis, AnalysisError>)>(
                self.channel_capacity,
            );

        let workers = self.workers.min(paths.len().max(1));
        log::debug!("Batch of {} frames on {workers} workers", paths.len());

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let session = AnalysisSession::new(self.source.clone(), self.analyzer.clone());
                scope.spawn(move || {
                    for (index, path) in job_rx {
                        let result = session.analyze(&VideoSource::File(path));
                        if result_tx.send((index, result)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(job_rx);
            drop(result_tx);

            scope.spawn(move || {
                for job in paths.iter().cloned().enumerate() {
                    if job_tx.send(job).is_err() {
                        break;
                    }
                }
            });

            let mut slots: Vec<Option<Result<Analysis, AnalysisError>>> =
                (0..paths.len()).map(|_| None).collect();
            for (index, result) in result_rx {
                slots[index] = Some(result);
            }
            slots
                .into_iter()
                .zip(paths)
                .map(|(slot, path)| {
                    slot.unwrap_or_else(|| {
                        Err(AnalysisError::FrameReadFailure(CaptureError::Read(format!(
                            "worker stopped before analyzing {}",
                            path.display()
                        ))))
                    })
                })
                .collect()
        })
    }
}
