//! Render executor.
//!
//! One dedicated thread owns the GPU device for the whole process. Every
//! device call is shipped to it as a job; `&mut Gpu` only exists while a job
//! runs, so nothing outside this thread can reach the device.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use anyhow::{Context, Result};
use parking_lot::Mutex;

use crate::device::{Gpu, GpuBackend, SamplerPolicy};

type Job = Box<dyn FnOnce(&mut Gpu) + Send>;

enum Msg {
    Job(Job),
    Stop,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ExecutorError {
    /// The executor thread has exited; the job never ran.
    #[error("render executor has stopped")]
    Stopped,
    /// A blocking call was issued from a job already running on the executor.
    #[error("blocking render call issued from the render thread")]
    Reentrant,
}

struct Inner {
    name: String,
    tx: Sender<Msg>,
    thread_id: ThreadId,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.tx.send(Msg::Stop).ok();
        // The last handle can be dropped by a job on the executor itself.
        if thread::current().id() == self.thread_id {
            return;
        }
        if let Some(handle) = self.thread.lock().take() {
            if handle.join().is_err() {
                log::error!("render executor `{}` panicked", self.name);
            }
        }
    }
}

/// Handle to the render thread. Cheap to clone; the thread stops when the
/// last handle is dropped or [`shutdown`](Self::shutdown) is called.
#[derive(Clone)]
pub struct RenderExecutor {
    inner: Arc<Inner>,
}

impl RenderExecutor {
    /// Starts the render thread and builds the backend on it.
    ///
    /// Backends need not be `Send`: `factory` runs on the new thread and the
    /// device never leaves it. Blocks until initialization has finished.
    pub fn spawn<F>(name: &str, sampler: SamplerPolicy, factory: F) -> Result<Self>
    where
        F: FnOnce() -> Result<Box<dyn GpuBackend>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<Msg>();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<&'static str>>(1);

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let backend = match factory() {
                    Ok(backend) => backend,
                    Err(e) => {
                        ready_tx.send(Err(e)).ok();
                        return;
                    }
                };
                let mut gpu = Gpu::new(backend, sampler);
                ready_tx.send(Ok(gpu.backend_name())).ok();
                serve(&mut gpu, rx);
            })
            .context("failed to spawn render executor thread")?;

        let backend = match ready_rx.recv() {
            Ok(Ok(backend)) => backend,
            Ok(Err(e)) => {
                handle.join().ok();
                return Err(e.context("GPU backend initialization failed"));
            }
            Err(_) => {
                handle.join().ok();
                anyhow::bail!("render executor `{name}` exited during startup");
            }
        };
        log::info!("render executor `{name}` running on {backend} backend");

        let thread_id = handle.thread().id();
        Ok(Self {
            inner: Arc::new(Inner {
                name: name.to_string(),
                tx,
                thread_id,
                thread: Mutex::new(Some(handle)),
            }),
        })
    }

    /// Runs `f` on the render thread and waits for its result.
    pub fn run<R, F>(&self, f: F) -> Result<R, ExecutorError>
    where
        F: FnOnce(&mut Gpu) -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_render_thread() {
            debug_assert!(false, "RenderExecutor::run called from the render thread");
            return Err(ExecutorError::Reentrant);
        }
        let (done_tx, done_rx) = mpsc::sync_channel(1);
        self.send(Box::new(move |gpu| {
            done_tx.send(f(gpu)).ok();
        }))?;
        // A dropped sender means the thread stopped with the job still queued.
        done_rx.recv().map_err(|_| ExecutorError::Stopped)
    }

    /// Queues `f` without waiting. Jobs run in submission order.
    pub fn post<F>(&self, f: F) -> Result<(), ExecutorError>
    where
        F: FnOnce(&mut Gpu) + Send + 'static,
    {
        self.send(Box::new(f))
    }

    /// Stops the thread after the jobs queued so far. Later submissions fail
    /// with [`ExecutorError::Stopped`].
    pub fn shutdown(&self) {
        self.inner.tx.send(Msg::Stop).ok();
        if self.is_render_thread() {
            return;
        }
        if let Some(handle) = self.inner.thread.lock().take() {
            handle.join().ok();
        }
    }

    pub fn is_render_thread(&self) -> bool {
        thread::current().id() == self.inner.thread_id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    fn send(&self, job: Job) -> Result<(), ExecutorError> {
        self.inner
            .tx
            .send(Msg::Job(job))
            .map_err(|_| ExecutorError::Stopped)
    }
}

fn serve(gpu: &mut Gpu, rx: Receiver<Msg>) {
    let mut served = 0u64;
    while let Ok(msg) = rx.recv() {
        match msg {
            Msg::Job(job) => {
                job(gpu);
                served += 1;
            }
            Msg::Stop => break,
        }
    }
    log::debug!("render executor stopped after {served} jobs");
}
