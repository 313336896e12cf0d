//! Bounded worker pool over a crossbeam channel.
//!
//! Results come back in input order regardless of completion order, so
//! callers get deterministic output from parallel work.

use std::thread;

use crossbeam_channel::unbounded;

/// Apply `f` to every item on at most `workers` threads.
pub fn run_ordered<T, R, F>(items: Vec<T>, workers: usize, f: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync,
{
    let total = items.len();
    let workers = workers.clamp(1, total.max(1));

    if workers == 1 {
        return items.into_iter().map(f).collect();
    }

    let (job_tx, job_rx) = unbounded::<(usize, T)>();
    let (done_tx, done_rx) = unbounded::<(usize, R)>();

    for job in items.into_iter().enumerate() {
        // Receiver is alive until the scope below ends.
        let _ = job_tx.send(job);
    }
    drop(job_tx);

    thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let done_tx = done_tx.clone();
            let f = &f;
            scope.spawn(move || {
                for (idx, item) in job_rx.iter() {
                    let _ = done_tx.send((idx, f(item)));
                }
            });
        }
    });
    drop(done_tx);

    let mut slots: Vec<Option<R>> = (0..total).map(|_| None).collect();
    for (idx, result) in done_rx.iter() {
        slots[idx] = Some(result);
    }
    slots.into_iter().flatten().collect()
}
