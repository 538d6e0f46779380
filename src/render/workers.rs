//! The render worker pool.
//!
//! A fixed set of threads renders dirty rows in parallel into the
//! frame's pixel buffer. Rows are moved out of the grid into jobs and
//! handed back over a results channel, so no two threads ever touch
//! the same cells; the pixel buffer is shared through a raw
//! [`Image`] view whose disjoint-row discipline the orchestrator
//! enforces.
//!
//! Per frame, each worker consumes exactly one start token and
//! exactly one barrier, posting exactly one done token in between.
//! That pairing is what lets the orchestrator wait for `count` done
//! tokens and know every dispatched row has been rendered.

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};

use crate::error::Error;
use crate::terminal::grid::Row;

use super::cell::{render_row, RenderContext};
use super::pixels::Image;

/// Per-frame state handed to each worker with its start token.
#[derive(Clone)]
struct FrameStart {
    ctx: Arc<RenderContext>,
    pix: Image,
}

enum Gate {
    Start(FrameStart),
    Exit,
}

enum Job {
    Row { view_row: u16, row: Row },
    Barrier,
}

pub struct WorkerPool {
    count: usize,
    gate_tx: Sender<Gate>,
    job_tx: Sender<Job>,
    done_rx: Receiver<()>,
    results_rx: Receiver<(u16, Row)>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `count` workers. `count == 0` produces an empty pool; the
    /// orchestrator then renders rows inline.
    pub fn spawn(count: usize) -> Result<Self, Error> {
        let (gate_tx, gate_rx) = crossbeam_channel::unbounded::<Gate>();
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<Job>();
        let (done_tx, done_rx) = crossbeam_channel::unbounded::<()>();
        let (results_tx, results_rx) = crossbeam_channel::unbounded::<(u16, Row)>();

        let mut handles = Vec::with_capacity(count);
        for id in 0..count {
            let gate_rx = gate_rx.clone();
            let job_rx = job_rx.clone();
            let done_tx = done_tx.clone();
            let results_tx = results_tx.clone();

            let handle = std::thread::Builder::new()
                .name(format!("squall:render:{id}"))
                .spawn(move || worker_loop(gate_rx, job_rx, done_tx, results_tx))
                .map_err(Error::WorkerSpawn)?;
            handles.push(handle);
        }

        Ok(Self {
            count,
            gate_tx,
            job_tx,
            done_rx,
            results_rx,
            handles,
        })
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Release one start token per worker for the coming frame.
    pub fn begin_frame(&self, ctx: Arc<RenderContext>, pix: Image) {
        let start = FrameStart { ctx, pix };
        for _ in 0..self.count {
            if self.gate_tx.send(Gate::Start(start.clone())).is_err() {
                tracing::error!("render worker gate closed");
                return;
            }
        }
    }

    /// Queue one dirty row for rendering.
    pub fn submit(&self, view_row: u16, row: Row) {
        if self
            .job_tx
            .send(Job::Row { view_row, row })
            .is_err()
        {
            tracing::error!("render worker queue closed");
        }
    }

    /// Barrier: wait until every worker has drained the queue, and
    /// collect the rendered rows.
    pub fn finish_frame(&self) -> Vec<(u16, Row)> {
        for _ in 0..self.count {
            if self.job_tx.send(Job::Barrier).is_err() {
                tracing::error!("render worker queue closed");
                break;
            }
        }

        for _ in 0..self.count {
            if self.done_rx.recv().is_err() {
                tracing::error!("render worker exited mid-frame");
                break;
            }
        }

        self.results_rx.try_iter().collect()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        for _ in 0..self.count {
            let _ = self.gate_tx.send(Gate::Exit);
        }
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(
    gate_rx: Receiver<Gate>,
    job_rx: Receiver<Job>,
    done_tx: Sender<()>,
    results_tx: Sender<(u16, Row)>,
) {
    while let Ok(gate) = gate_rx.recv() {
        let frame = match gate {
            Gate::Start(frame) => frame,
            Gate::Exit => return,
        };

        loop {
            match job_rx.recv() {
                Ok(Job::Row { view_row, mut row }) => {
                    render_row(&frame.ctx, frame.pix, &mut row, view_row);
                    if results_tx.send((view_row, row)).is_err() {
                        return;
                    }
                }
                Ok(Job::Barrier) => {
                    if done_tx.send(()).is_err() {
                        return;
                    }
                    break;
                }
                Err(_) => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::cell::RenderContext;
    use crate::terminal::grid::Row;
    use crate::testutil::{test_terminal, TestCanvas};

    #[test]
    fn workers_render_rows_and_hand_them_back() {
        let term = test_terminal(4, 3);
        let ctx = Arc::new(RenderContext::from_term(&term));
        let mut canvas = TestCanvas::for_term(&term);

        let pool = WorkerPool::spawn(2).expect("spawn workers");
        pool.begin_frame(Arc::clone(&ctx), canvas.image());

        for r in 0..3u16 {
            let mut row = Row::new(4);
            for cell in &mut row.cells {
                cell.set_char('#');
            }
            pool.submit(r, row);
        }

        let mut results = pool.finish_frame();
        results.sort_by_key(|(r, _)| *r);

        assert_eq!(results.len(), 3, "every row comes back");
        for (r, row) in &results {
            assert!(
                row.cells.iter().all(|c| c.is_clean()),
                "row {r} fully rendered"
            );
        }

        // Every cell of every row was drawn with the glyph mask.
        assert!(
            canvas.rect_is(
                crate::render::pixels::Rect::new(
                    0,
                    0,
                    4 * term.cell_width,
                    3 * term.cell_height
                ),
                |px| px & 0xffffff == term.colors.fg
            ),
            "all three rows composited"
        );
    }

    #[test]
    fn frames_can_follow_each_other() {
        let term = test_terminal(2, 1);
        let mut canvas = TestCanvas::for_term(&term);

        let pool = WorkerPool::spawn(3).expect("spawn workers");

        for _ in 0..4 {
            let ctx = Arc::new(RenderContext::from_term(&term));
            pool.begin_frame(Arc::clone(&ctx), canvas.image());

            let mut row = Row::new(2);
            row.cells[0].set_char('x');
            pool.submit(0, row);

            let results = pool.finish_frame();
            assert_eq!(results.len(), 1);
        }
    }
}
