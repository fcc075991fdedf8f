use std::any::Any;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Mutex, PoisonError};
use std::thread;

use log::{debug, warn};

use crate::trim::{trim_file, TrimRequest, TrimResult};
use crate::{ProgressReporter, WavTrimError};

/// A request that did not produce a trimmed file.
#[derive(Debug)]
pub struct TrimFailure {
    pub source: PathBuf,
    pub error: WavTrimError,
}

/// Everything the workers produced, owned by the coordinating thread.
#[derive(Debug, Default)]
pub struct Dispatched {
    /// Successful trims sorted by source path.
    pub results: Vec<TrimResult>,
    /// Failed requests sorted by source path.
    pub failures: Vec<TrimFailure>,
}

type Outcome = Result<TrimResult, TrimFailure>;

/// Fixed-size pool of worker threads fed from a bounded work queue.
#[derive(Clone, Copy, Debug)]
pub struct Dispatcher {
    threads: NonZeroUsize,
}

impl Dispatcher {
    pub fn new(threads: NonZeroUsize) -> Self {
        Self { threads }
    }

    pub fn threads(&self) -> NonZeroUsize {
        self.threads
    }

    /// Trim every request with [`trim_file`].
    pub fn dispatch<P>(&self, requests: Vec<TrimRequest>, progress: &P) -> Dispatched
    where
        P: ProgressReporter + ?Sized,
    {
        self.dispatch_with(requests, progress, trim_file)
    }

    /// Run `operation` once per request across the worker pool.
    ///
    /// Requests are queued in order before any worker starts. Each worker
    /// pulls requests until the queue is drained and pushes exactly one
    /// outcome per request, so a failing or panicking request only affects
    /// its own entry. All workers are joined before the results are drained
    /// and sorted.
    pub fn dispatch_with<P, F>(
        &self,
        requests: Vec<TrimRequest>,
        progress: &P,
        operation: F,
    ) -> Dispatched
    where
        P: ProgressReporter + ?Sized,
        F: Fn(&TrimRequest) -> Result<TrimResult, WavTrimError> + Sync,
    {
        if requests.is_empty() {
            return Dispatched::default();
        }

        let expected = requests.len();
        let (work_tx, work_rx) = mpsc::sync_channel::<TrimRequest>(expected);
        for request in requests {
            // capacity covers every request and the receiver is still alive
            let _ = work_tx.send(request);
        }
        drop(work_tx);

        let work_rx = Mutex::new(work_rx);
        let (result_tx, result_rx) = mpsc::sync_channel::<Outcome>(expected);
        let workers = self.threads.get().min(expected);
        debug!("starting {workers} worker(s) for {expected} request(s)");
        progress.start(expected);

        thread::scope(|scope| {
            for id in 0..workers {
                let results = result_tx.clone();
                let queue = &work_rx;
                let operation = &operation;
                scope.spawn(move || worker(id, queue, results, operation, progress));
            }
        });
        drop(result_tx);

        let mut dispatched = Dispatched::default();
        for outcome in result_rx.try_iter() {
            match outcome {
                Ok(result) => dispatched.results.push(result),
                Err(failure) => dispatched.failures.push(failure),
            }
        }
        debug_assert_eq!(
            dispatched.results.len() + dispatched.failures.len(),
            expected
        );

        dispatched
            .results
            .sort_by(|a, b| a.source.as_os_str().cmp(b.source.as_os_str()));
        dispatched
            .failures
            .sort_by(|a, b| a.source.as_os_str().cmp(b.source.as_os_str()));
        progress.finish();

        dispatched
    }
}

fn worker<P, F>(
    id: usize,
    queue: &Mutex<Receiver<TrimRequest>>,
    results: SyncSender<Outcome>,
    operation: &F,
    progress: &P,
) where
    P: ProgressReporter + ?Sized,
    F: Fn(&TrimRequest) -> Result<TrimResult, WavTrimError> + Sync,
{
    debug!("worker {id} started");
    loop {
        // the guard is released before the request is processed
        let next = queue.lock().unwrap_or_else(PoisonError::into_inner).recv();
        let Ok(request) = next else {
            break;
        };

        let outcome = run_request(&request, operation);
        match &outcome {
            Ok(result) => progress.trimmed(result),
            Err(failure) => {
                warn!("skipping '{}': {}", failure.source.display(), failure.error);
                progress.failed(&failure.source, &failure.error);
            }
        }
        if results.send(outcome).is_err() {
            break;
        }
    }
    debug!("worker {id} finished");
}

fn run_request<F>(request: &TrimRequest, operation: &F) -> Outcome
where
    F: Fn(&TrimRequest) -> Result<TrimResult, WavTrimError>,
{
    let error = match panic::catch_unwind(AssertUnwindSafe(|| operation(request))) {
        Ok(Ok(result)) => return Ok(result),
        Ok(Err(error)) => error,
        Err(payload) => WavTrimError::WorkerPanic {
            path: request.source.clone(),
            message: panic_message(payload.as_ref()),
        },
    };

    Err(TrimFailure {
        source: request.source.clone(),
        error,
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("unknown panic payload")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingProgress {
        started: AtomicUsize,
        trimmed: AtomicUsize,
        failed: AtomicUsize,
    }

    impl CountingProgress {
        fn new() -> Self {
            Self {
                started: AtomicUsize::new(0),
                trimmed: AtomicUsize::new(0),
                failed: AtomicUsize::new(0),
            }
        }
    }

    impl ProgressReporter for CountingProgress {
        fn start(&self, total: usize) {
            self.started.store(total, Ordering::SeqCst);
        }

        fn trimmed(&self, _result: &TrimResult) {
            self.trimmed.fetch_add(1, Ordering::SeqCst);
        }

        fn failed(&self, _path: &Path, _error: &WavTrimError) {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn requests(count: usize) -> Vec<TrimRequest> {
        (0..count)
            .map(|i| {
                TrimRequest::new(format!("/in/{i:02}.wav"), Duration::from_secs(1), false)
            })
            .collect()
    }

    fn fake_trim(request: &TrimRequest) -> Result<TrimResult, WavTrimError> {
        thread::sleep(Duration::from_millis(2));
        Ok(TrimResult {
            source: request.source.clone(),
            output: request.source.with_extension("out"),
            sample_rate: 100,
            source_frames: 300,
            skipped_frames: 100,
            output_frames: 200,
            source_duration: 3.0,
            output_duration: 2.0,
        })
    }

    fn threads(count: usize) -> NonZeroUsize {
        NonZeroUsize::new(count).unwrap()
    }

    #[test]
    fn every_request_yields_exactly_one_result() {
        let progress = CountingProgress::new();
        let dispatched =
            Dispatcher::new(threads(4)).dispatch_with(requests(10), &progress, fake_trim);

        assert!(dispatched.failures.is_empty());
        assert_eq!(dispatched.results.len(), 10);
        let unique: HashSet<_> = dispatched.results.iter().map(|r| &r.source).collect();
        assert_eq!(unique.len(), 10);

        let sources: Vec<_> = dispatched.results.iter().map(|r| r.source.clone()).collect();
        let mut sorted = sources.clone();
        sorted.sort();
        assert_eq!(sources, sorted);

        assert_eq!(progress.started.load(Ordering::SeqCst), 10);
        assert_eq!(progress.trimmed.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn failures_are_isolated_per_request() {
        let progress = CountingProgress::new();
        let flaky = |request: &TrimRequest| {
            if request.source.ends_with("03.wav") {
                return Err(WavTrimError::OutputExists {
                    path: request.source.clone(),
                });
            }
            fake_trim(request)
        };
        let dispatched = Dispatcher::new(threads(3)).dispatch_with(requests(6), &progress, flaky);

        assert_eq!(dispatched.results.len(), 5);
        assert_eq!(dispatched.failures.len(), 1);
        assert_eq!(dispatched.failures[0].source, PathBuf::from("/in/03.wav"));
        assert_eq!(progress.failed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_request_does_not_take_down_the_pool() {
        let progress = CountingProgress::new();
        let exploding = |request: &TrimRequest| {
            if request.source.ends_with("01.wav") {
                panic!("decoder exploded");
            }
            fake_trim(request)
        };
        let dispatched =
            Dispatcher::new(threads(2)).dispatch_with(requests(5), &progress, exploding);

        assert_eq!(dispatched.results.len(), 4);
        assert_eq!(dispatched.failures.len(), 1);
        match &dispatched.failures[0].error {
            WavTrimError::WorkerPanic { message, .. } => {
                assert_eq!(message, "decoder exploded")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn more_threads_than_requests_is_fine() {
        let progress = CountingProgress::new();
        let dispatched =
            Dispatcher::new(threads(16)).dispatch_with(requests(2), &progress, fake_trim);
        assert_eq!(dispatched.results.len(), 2);
    }

    #[test]
    fn empty_request_list_starts_nothing() {
        let progress = CountingProgress::new();
        let dispatched =
            Dispatcher::new(threads(4)).dispatch_with(Vec::new(), &progress, fake_trim);

        assert!(dispatched.results.is_empty());
        assert!(dispatched.failures.is_empty());
        assert_eq!(progress.started.load(Ordering::SeqCst), 0);
    }
}
