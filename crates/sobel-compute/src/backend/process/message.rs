//! Worker protocol messages.
//!
//! Messages are serialized with MessagePack. One exchange per worker and pass:
//!
//! ```text
//! coordinator                         worker
//!     Init { rank, size }      ->
//!                              <-     Ready { rank }
//!     Load { rows of image }   ->                  (broadcast / halo / own slice)
//!     Run { pass, partition }  ->
//!                              <-     Slice { rows, range }  |  Failed { reason }
//!     ...
//!     Shutdown                 ->
//! ```

use serde::{Deserialize, Serialize};
use sobel_core::{Partition, Pass, ValueRange};

use crate::{ComputeError, ComputeResult};

/// Coordinator to worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    /// Assigns the worker its rank in a group of `size`.
    Init { rank: u32, size: u32 },
    /// Replaces the worker's copy of the image with rows
    /// `first_row..first_row + pixels.len() / width`.
    Load {
        width: u32,
        height: u32,
        first_row: u32,
        pixels: Vec<u32>,
    },
    /// Applies `pass` to `partition` using the loaded rows.
    Run { pass: Pass, partition: Partition },
    /// Ends the worker loop.
    Shutdown,
}

/// Worker to coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reply {
    /// Handshake answer to [`Request::Init`].
    Ready { rank: u32 },
    /// Output rows of one partition and the range of values in them.
    Slice {
        worker_id: u32,
        start_row: u32,
        pixels: Vec<u32>,
        range: ValueRange,
    },
    /// The request could not be served.
    Failed { reason: String },
}

/// Encodes a message as MessagePack.
pub fn encode<T: Serialize>(msg: &T) -> ComputeResult<Vec<u8>> {
    rmp_serde::to_vec(msg).map_err(|e| ComputeError::Protocol(format!("encode: {e}")))
}

/// Decodes a MessagePack message.
pub fn decode<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> ComputeResult<T> {
    rmp_serde::from_slice(bytes).map_err(|e| ComputeError::Protocol(format!("decode: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sobel_core::{FlatRangePolicy, Rescaler};

    #[test]
    fn test_run_carries_rescaler() {
        let rescaler =
            Rescaler::new(ValueRange { min: 3, max: 900 }, FlatRangePolicy::Zero).unwrap();
        let req = Request::Run {
            pass: Pass::Rescale(rescaler),
            partition: Partition { worker_id: 2, start_row: 10, row_count: 5 },
        };
        let back: Request = decode(&encode(&req).unwrap()).unwrap();
        assert_eq!(back, req);
    }

    #[test]
    fn test_garbage_is_protocol_error() {
        let err = decode::<Reply>(&[0xc1, 0x00, 0xff]).unwrap_err();
        assert!(matches!(err, ComputeError::Protocol(_)));
    }
}
