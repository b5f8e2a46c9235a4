//! Message-passing executor.
//!
//! The coordinator (this process) owns the image. Workers share no memory
//! with it: for every pass each worker is sent the rows it needs, computes
//! its partition from that private copy, and sends back only its own rows.
//!
//! ```text
//! gradient:  Load(whole image | halo window) + Run(Gradient, partition)  -> Slice
//! rescale:   Load(own rows) + Run(Rescale(global min/max), partition)    -> Slice
//! ```
//!
//! Each worker's exchange runs on its own scoped thread so workers compute
//! concurrently; the pass returns after every slice is gathered.
//!
//! Workers are either child processes speaking the protocol on stdin/stdout
//! ([`ProcessGroupExecutor::spawn`]) or threads connected only by channels
//! ([`ProcessGroupExecutor::in_process`]). Both run the same [`run_worker`]
//! loop.

pub mod message;
pub mod transport;
mod worker;

pub use worker::{run_worker, serve_stdio};

use std::io::{BufReader, BufWriter};
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;
use std::time::Instant;

use sobel_core::{validate_partitions, ImageBuffer, Partition, Pass, ValueRange};
use tracing::{debug, info, trace, warn};

use self::message::{Reply, Request};
use self::transport::{channel_pair, recv, send, Endpoint, FramedStream};
use super::PassExecutor;
use crate::config::{Distribution, ProcessGroupConfig};
use crate::{ComputeError, ComputeResult};

/// Minimum group size; a single worker would leave nothing to distribute.
pub const MIN_WORKERS: u32 = 2;

enum WorkerHandle {
    Process(Child),
    Thread(JoinHandle<ComputeResult<()>>),
}

/// Coordinator's connection to one worker.
struct WorkerLink {
    rank: u32,
    endpoint: Box<dyn Endpoint + Send>,
    handle: Option<WorkerHandle>,
}

impl WorkerLink {
    fn failed(&self, reason: impl Into<String>) -> ComputeError {
        ComputeError::WorkerFailed {
            rank: self.rank,
            reason: reason.into(),
        }
    }

    fn send(&mut self, request: &Request) -> ComputeResult<()> {
        let rank = self.rank;
        send(&mut self.endpoint, request).map_err(|e| match e {
            ComputeError::Io(io) => ComputeError::WorkerFailed {
                rank,
                reason: format!("send failed: {io}"),
            },
            other => other,
        })
    }

    fn recv(&mut self) -> ComputeResult<Reply> {
        match recv::<_, Reply>(&mut self.endpoint)? {
            Some(Reply::Failed { reason }) => Err(self.failed(reason)),
            Some(reply) => Ok(reply),
            None => Err(self.failed("worker closed the connection")),
        }
    }

    fn handshake(&mut self, size: u32) -> ComputeResult<()> {
        self.send(&Request::Init {
            rank: self.rank,
            size,
        })?;
        match self.recv()? {
            Reply::Ready { rank } if rank == self.rank => Ok(()),
            other => Err(ComputeError::Protocol(format!(
                "worker {} answered Init with {:?}",
                self.rank, other
            ))),
        }
    }

    /// Sends the rows and the run request, then waits for the slice.
    fn exchange(
        &mut self,
        load: Request,
        pass: &Pass,
        partition: &Partition,
    ) -> ComputeResult<(Vec<u32>, ValueRange)> {
        self.send(&load)?;
        self.send(&Request::Run {
            pass: *pass,
            partition: *partition,
        })?;
        match self.recv()? {
            Reply::Slice {
                worker_id,
                start_row,
                pixels,
                range,
            } if worker_id == partition.worker_id && start_row == partition.start_row => {
                Ok((pixels, range))
            }
            other => Err(ComputeError::Protocol(format!(
                "worker {} answered Run with unexpected {:?}",
                self.rank,
                short_reply(&other)
            ))),
        }
    }

    fn shutdown(&mut self) {
        if let Err(e) = self.send(&Request::Shutdown) {
            trace!(rank = self.rank, error = %e, "shutdown not delivered");
        }
        match self.handle.take() {
            Some(WorkerHandle::Process(mut child)) => match child.wait() {
                Ok(status) if !status.success() => {
                    warn!(rank = self.rank, %status, "worker process exited with failure")
                }
                Ok(_) => {}
                Err(e) => warn!(rank = self.rank, error = %e, "cannot reap worker process"),
            },
            Some(WorkerHandle::Thread(handle)) => match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(rank = self.rank, error = %e, "worker thread failed"),
                Err(_) => warn!(rank = self.rank, "worker thread panicked"),
            },
            None => {}
        }
    }
}

/// Kills a worker that cannot join the group and waits for it to exit.
fn reap_after_kill(rank: u32, child: &mut Child) {
    if let Err(e) = child.kill() {
        warn!(rank, error = %e, "cannot kill worker process");
    }
    if let Err(e) = child.wait() {
        warn!(rank, error = %e, "cannot reap worker process");
    }
}

/// Describes a reply without dumping its pixel payload.
fn short_reply(reply: &Reply) -> String {
    match reply {
        Reply::Ready { rank } => format!("Ready {{ rank: {rank} }}"),
        Reply::Slice {
            worker_id,
            start_row,
            pixels,
            ..
        } => format!(
            "Slice {{ worker_id: {worker_id}, start_row: {start_row}, {} pixels }}",
            pixels.len()
        ),
        Reply::Failed { reason } => format!("Failed {{ {reason} }}"),
    }
}

/// Coordinator of a group of message-passing workers.
pub struct ProcessGroupExecutor {
    links: Vec<WorkerLink>,
    distribution: Distribution,
}

impl ProcessGroupExecutor {
    /// Spawns `config.workers` copies of `config.program`.
    ///
    /// Fails with [`ComputeError::Configuration`] before spawning anything if
    /// fewer than two workers are requested.
    pub fn spawn(config: ProcessGroupConfig) -> ComputeResult<Self> {
        check_group_size(config.workers)?;

        let mut exec = Self {
            links: Vec::with_capacity(config.workers as usize),
            distribution: config.distribution,
        };
        for rank in 0..config.workers {
            let mut child = Command::new(&config.program)
                .args(&config.args)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::inherit())
                .spawn()
                .map_err(|e| ComputeError::WorkerFailed {
                    rank,
                    reason: format!("cannot spawn {}: {e}", config.program.display()),
                })?;
            let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
                (Some(stdin), Some(stdout)) => (stdin, stdout),
                _ => {
                    reap_after_kill(rank, &mut child);
                    return Err(ComputeError::WorkerFailed {
                        rank,
                        reason: "worker pipes unavailable".into(),
                    });
                }
            };
            trace!(rank, pid = child.id(), "spawned worker");
            let endpoint = FramedStream::new(BufReader::new(stdout), BufWriter::new(stdin));
            exec.links.push(WorkerLink {
                rank,
                endpoint: Box::new(endpoint),
                handle: Some(WorkerHandle::Process(child)),
            });
        }
        exec.handshake()?;
        info!(workers = config.workers, program = %config.program.display(), "process group ready");
        Ok(exec)
    }

    /// Runs `workers` workers on threads connected only through channels.
    pub fn in_process(workers: u32, distribution: Distribution) -> ComputeResult<Self> {
        check_group_size(workers)?;

        let mut exec = Self {
            links: Vec::with_capacity(workers as usize),
            distribution,
        };
        for rank in 0..workers {
            let (coordinator, mut worker) = channel_pair();
            let handle = std::thread::Builder::new()
                .name(format!("sobel-rank-{rank}"))
                .spawn(move || run_worker(&mut worker))?;
            exec.links.push(WorkerLink {
                rank,
                endpoint: Box::new(coordinator),
                handle: Some(WorkerHandle::Thread(handle)),
            });
        }
        exec.handshake()?;
        debug!(workers, "in-process group ready");
        Ok(exec)
    }

    /// Gradient-pass distribution in use.
    pub fn distribution(&self) -> Distribution {
        self.distribution
    }

    fn handshake(&mut self) -> ComputeResult<()> {
        let size = self.links.len() as u32;
        self.links.iter_mut().try_for_each(|link| link.handshake(size))
    }

    /// The `Load` request that gives a worker the rows it needs.
    fn load_for(&self, image: &ImageBuffer, pass: &Pass, partition: &Partition) -> Request {
        let rows = match (pass, self.distribution) {
            (Pass::Gradient, Distribution::Broadcast) => 0..image.height(),
            (Pass::Gradient, Distribution::Halo) => partition.halo_rows(image.height()),
            (Pass::Rescale(_), _) => partition.rows(),
        };
        let width = image.width() as usize;
        let span = rows.start as usize * width..rows.end as usize * width;
        let pixels = image.pixels()[span].to_vec();
        Request::Load {
            width: image.width(),
            height: image.height(),
            first_row: rows.start,
            pixels,
        }
    }
}

fn check_group_size(workers: u32) -> ComputeResult<()> {
    if workers < MIN_WORKERS {
        return Err(ComputeError::Configuration(format!(
            "process group needs at least {MIN_WORKERS} workers, got {workers}"
        )));
    }
    Ok(())
}

impl PassExecutor for ProcessGroupExecutor {
    fn name(&self) -> &'static str {
        "process"
    }

    fn workers(&self) -> u32 {
        self.links.len() as u32
    }

    fn run_pass(
        &mut self,
        image: &mut ImageBuffer,
        partitions: &[Partition],
        pass: &Pass,
    ) -> ComputeResult<Vec<ValueRange>> {
        validate_partitions(partitions, image.height())?;
        if partitions.len() != self.links.len() {
            return Err(ComputeError::Configuration(format!(
                "{} partitions for a group of {} workers",
                partitions.len(),
                self.links.len()
            )));
        }

        let start = Instant::now();
        let loads: Vec<Request> = partitions
            .iter()
            .map(|p| self.load_for(image, pass, p))
            .collect();
        trace!(pass = pass.name(), distribution = ?self.distribution, "scattering rows");

        let results: Vec<ComputeResult<(Vec<u32>, ValueRange)>> = std::thread::scope(|scope| {
            let handles: Vec<_> = self
                .links
                .iter_mut()
                .zip(loads)
                .zip(partitions)
                .map(|((link, load), part)| scope.spawn(move || link.exchange(load, pass, part)))
                .collect();
            handles
                .into_iter()
                .enumerate()
                .map(|(rank, h)| {
                    h.join().unwrap_or_else(|_| {
                        Err(ComputeError::WorkerFailed {
                            rank: rank as u32,
                            reason: "coordinator thread panicked".into(),
                        })
                    })
                })
                .collect()
        });

        let width = image.width();
        let mut out = vec![0u32; image.len()];
        let mut ranges = Vec::with_capacity(partitions.len());
        for (part, result) in partitions.iter().zip(results) {
            let (pixels, range) = result?;
            let dst = &mut out[part.index_range(width)];
            if pixels.len() != dst.len() {
                return Err(ComputeError::Protocol(format!(
                    "worker {} returned {} pixels for {} rows",
                    part.worker_id,
                    pixels.len(),
                    part.row_count
                )));
            }
            dst.copy_from_slice(&pixels);
            ranges.push(range);
        }
        image.replace_pixels(out)?;

        debug!(
            pass = pass.name(),
            workers = partitions.len(),
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "process group pass done"
        );
        Ok(ranges)
    }
}

impl Drop for ProcessGroupExecutor {
    fn drop(&mut self) {
        for link in &mut self.links {
            link.shutdown();
        }
    }
}
