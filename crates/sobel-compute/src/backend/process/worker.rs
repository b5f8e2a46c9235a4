//! Worker side of the process group.

use std::io::{BufReader, BufWriter};

use sobel_core::{Partition, Pass, RowBand, Snapshot, ValueRange};
use tracing::{debug, trace};

use super::message::{Reply, Request};
use super::transport::{recv, send, Endpoint, FramedStream};
use crate::{ComputeError, ComputeResult};

/// Rows of the image held by a worker.
struct Loaded {
    width: u32,
    height: u32,
    first_row: u32,
    pixels: Vec<u32>,
}

impl Loaded {
    fn snapshot(&self) -> ComputeResult<Snapshot<'_>> {
        Ok(Snapshot::window(
            self.width,
            self.height,
            self.first_row,
            &self.pixels,
        )?)
    }
}

/// Rows a pass must be able to read for `partition`.
fn required_rows(pass: &Pass, partition: &Partition, height: u32) -> std::ops::Range<u32> {
    match pass {
        Pass::Gradient => partition.halo_rows(height),
        Pass::Rescale(_) => partition.rows(),
    }
}

fn compute(
    loaded: &Loaded,
    pass: &Pass,
    partition: &Partition,
) -> ComputeResult<(Vec<u32>, ValueRange)> {
    let snapshot = loaded.snapshot()?;
    let needed = required_rows(pass, partition, loaded.height);
    if needed.is_empty()
        || !snapshot.holds_row(needed.start)
        || !snapshot.holds_row(needed.end - 1)
    {
        return Err(ComputeError::Protocol(format!(
            "{} of rows {:?} needs rows {:?}, worker holds {}..{}",
            pass.name(),
            partition.rows(),
            needed,
            snapshot.first_row(),
            snapshot.first_row() + snapshot.rows()
        )));
    }

    let mut out = vec![0u32; partition.row_count as usize * loaded.width as usize];
    let range = {
        let mut band = RowBand::new(partition.start_row, loaded.width, &mut out)?;
        pass.apply(&snapshot, &mut band)
    };
    Ok((out, range))
}

/// Serves requests on `endpoint` until `Shutdown` or the link closes.
///
/// Failures to compute a slice are reported to the coordinator as
/// [`Reply::Failed`]; only transport failures end the loop with an error.
pub fn run_worker<E: Endpoint + ?Sized>(endpoint: &mut E) -> ComputeResult<()> {
    let mut rank = None;
    let mut loaded: Option<Loaded> = None;

    while let Some(request) = recv::<E, Request>(endpoint)? {
        match request {
            Request::Init { rank: r, size } => {
                debug!(rank = r, size, "worker joined group");
                rank = Some(r);
                send(endpoint, &Reply::Ready { rank: r })?;
            }
            Request::Load {
                width,
                height,
                first_row,
                pixels,
            } => {
                trace!(?rank, width, height, first_row, len = pixels.len(), "loaded rows");
                loaded = Some(Loaded {
                    width,
                    height,
                    first_row,
                    pixels,
                });
            }
            Request::Run { pass, partition } => {
                let reply = match &loaded {
                    None => Reply::Failed {
                        reason: "run requested before any rows were loaded".into(),
                    },
                    Some(data) => match compute(data, &pass, &partition) {
                        Ok((pixels, range)) => Reply::Slice {
                            worker_id: partition.worker_id,
                            start_row: partition.start_row,
                            pixels,
                            range,
                        },
                        Err(e) => Reply::Failed {
                            reason: e.to_string(),
                        },
                    },
                };
                send(endpoint, &reply)?;
            }
            Request::Shutdown => {
                debug!(?rank, "worker shutting down");
                return Ok(());
            }
        }
    }
    debug!(?rank, "coordinator closed the link");
    Ok(())
}

/// Runs the worker loop on this process's stdin/stdout.
pub fn serve_stdio() -> ComputeResult<()> {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut stream = FramedStream::new(
        BufReader::new(stdin.lock()),
        BufWriter::new(stdout.lock()),
    );
    run_worker(&mut stream)
}
