//! Off-main-thread layout computation.
//!
//! Layout work is expressed as typed request/response messages correlated
//! by id, behind a [`LayoutBackend`] trait. [`InlineBackend`] runs the
//! simulation synchronously on submit; [`ThreadBackend`] runs it on a
//! dedicated thread, with newer requests superseding whatever is in flight.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;

use notegraph_core::Vec2;
use tracing::debug;

use crate::params::ForceParams;
use crate::sim::{LayoutEngine, LayoutPhase, LayoutSnapshot};

/// One layout job.
#[derive(Debug, Clone)]
pub struct LayoutRequest {
    /// Caller-chosen correlation id, echoed on every response.
    pub id: u64,
    pub snapshot: LayoutSnapshot,
    pub params: ForceParams,
    pub max_iterations: u64,
    /// Emit a `Progress` response every this many iterations.
    pub progress_every: u64,
}

/// Responses for a [`LayoutRequest`], matched up by `id`.
#[derive(Debug, Clone)]
pub enum LayoutResponse {
    Progress {
        id: u64,
        iterations: u64,
        positions: Vec<Vec2>,
    },
    Complete {
        id: u64,
        iterations: u64,
        positions: Vec<Vec2>,
    },
    Failed {
        id: u64,
        message: String,
    },
}

impl LayoutResponse {
    pub fn request_id(&self) -> u64 {
        match self {
            Self::Progress { id, .. } | Self::Complete { id, .. } | Self::Failed { id, .. } => *id,
        }
    }
}

/// Where layout jobs run. Submission never blocks on the simulation;
/// results come back through `poll`.
pub trait LayoutBackend {
    fn submit(&mut self, request: LayoutRequest);
    /// Next pending response, if any.
    fn poll(&mut self) -> Option<LayoutResponse>;
}

/// Run one request, emitting responses as it goes. `superseded` is checked
/// at each progress point; returning a new request abandons the current
/// job in its favor.
fn execute(
    request: LayoutRequest,
    mut emit: impl FnMut(LayoutResponse),
    mut superseded: impl FnMut() -> Option<LayoutRequest>,
) -> Option<LayoutRequest> {
    let LayoutRequest {
        id,
        snapshot,
        params,
        max_iterations,
        progress_every,
    } = request;

    if snapshot.nodes.is_empty() {
        emit(LayoutResponse::Failed {
            id,
            message: "empty graph".into(),
        });
        return None;
    }

    let mut engine = LayoutEngine::new(params);
    engine.set_graph(snapshot);
    engine.start();

    let every = progress_every.max(1);
    let mut iterations = 0;
    while iterations < max_iterations && engine.step() == LayoutPhase::Running {
        iterations += 1;
        if iterations % every == 0 {
            emit(LayoutResponse::Progress {
                id,
                iterations,
                positions: engine.positions().to_vec(),
            });
            if let Some(next) = superseded() {
                debug!(id, superseded_by = next.id, "layout job superseded");
                return Some(next);
            }
        }
    }

    emit(LayoutResponse::Complete {
        id,
        iterations,
        positions: engine.positions().to_vec(),
    });
    None
}

/// Runs each job synchronously on submit. The fallback when spawning a
/// thread is not worth it (small graphs) or not wanted (tests).
#[derive(Debug, Default)]
pub struct InlineBackend {
    responses: VecDeque<LayoutResponse>,
}

impl InlineBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LayoutBackend for InlineBackend {
    fn submit(&mut self, request: LayoutRequest) {
        let responses = &mut self.responses;
        execute(request, |response| responses.push_back(response), || None);
    }

    fn poll(&mut self) -> Option<LayoutResponse> {
        self.responses.pop_front()
    }
}

/// Runs jobs on a dedicated worker thread.
///
/// Submitting while a job is in flight supersedes it: the worker abandons
/// the old job at its next progress point and picks up the newest request.
/// Dropping the backend closes the request channel and joins the thread.
#[derive(Debug)]
pub struct ThreadBackend {
    request_tx: Option<Sender<LayoutRequest>>,
    response_rx: Receiver<LayoutResponse>,
    handle: Option<JoinHandle<()>>,
}

impl ThreadBackend {
    pub fn new() -> Self {
        let (request_tx, request_rx) = mpsc::channel::<LayoutRequest>();
        let (response_tx, response_rx) = mpsc::channel();

        let handle = std::thread::spawn(move || {
            let mut carried: Option<LayoutRequest> = None;
            loop {
                let mut request = match carried.take() {
                    Some(request) => request,
                    None => match request_rx.recv() {
                        Ok(request) => request,
                        Err(_) => break,
                    },
                };
                // Collapse any backlog down to the newest request.
                while let Ok(newer) = request_rx.try_recv() {
                    request = newer;
                }

                let tx = response_tx.clone();
                carried = execute(
                    request,
                    |response| {
                        let _ = tx.send(response);
                    },
                    || request_rx.try_recv().ok(),
                );
            }
        });

        Self {
            request_tx: Some(request_tx),
            response_rx,
            handle: Some(handle),
        }
    }
}

impl Default for ThreadBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutBackend for ThreadBackend {
    fn submit(&mut self, request: LayoutRequest) {
        if let Some(tx) = &self.request_tx {
            let _ = tx.send(request);
        }
    }

    fn poll(&mut self) -> Option<LayoutResponse> {
        self.response_rx.try_recv().ok()
    }
}

impl Drop for ThreadBackend {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop.
        self.request_tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
