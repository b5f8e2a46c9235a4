//! Framed transports between coordinator and workers.
//!
//! A frame is a little-endian `u32` payload length followed by the payload.
//! [`FramedStream`] runs frames over any byte stream (child stdin/stdout);
//! [`ChannelEndpoint`] passes whole frames over mpsc channels so a group can
//! also run inside one process.

use std::io::{ErrorKind, Read, Write};
use std::sync::mpsc::{channel, Receiver, Sender};

use serde::{Deserialize, Serialize};

use super::message::{decode, encode};
use crate::{ComputeError, ComputeResult};

/// Largest frame accepted, 1 GiB.
pub const MAX_FRAME_LEN: usize = 1 << 30;

/// One side of a bidirectional frame link.
pub trait Endpoint {
    /// Sends one frame.
    fn send_frame(&mut self, payload: &[u8]) -> ComputeResult<()>;

    /// Receives one frame; `None` once the peer has closed the link.
    fn recv_frame(&mut self) -> ComputeResult<Option<Vec<u8>>>;
}

impl<E: Endpoint + ?Sized> Endpoint for Box<E> {
    fn send_frame(&mut self, payload: &[u8]) -> ComputeResult<()> {
        (**self).send_frame(payload)
    }

    fn recv_frame(&mut self) -> ComputeResult<Option<Vec<u8>>> {
        (**self).recv_frame()
    }
}

/// Encodes and sends a message.
pub fn send<E: Endpoint + ?Sized, T: Serialize>(endpoint: &mut E, msg: &T) -> ComputeResult<()> {
    endpoint.send_frame(&encode(msg)?)
}

/// Receives and decodes a message; `None` on a closed link.
pub fn recv<E, T>(endpoint: &mut E) -> ComputeResult<Option<T>>
where
    E: Endpoint + ?Sized,
    T: for<'de> Deserialize<'de>,
{
    match endpoint.recv_frame()? {
        Some(frame) => decode(&frame).map(Some),
        None => Ok(None),
    }
}

/// Length-prefixed frames over a reader/writer pair.
pub struct FramedStream<R, W> {
    reader: R,
    writer: W,
}

impl<R: Read, W: Write> FramedStream<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }
}

impl<R: Read, W: Write> Endpoint for FramedStream<R, W> {
    fn send_frame(&mut self, payload: &[u8]) -> ComputeResult<()> {
        if payload.len() > MAX_FRAME_LEN {
            return Err(ComputeError::Protocol(format!(
                "frame of {} bytes exceeds limit",
                payload.len()
            )));
        }
        self.writer.write_all(&(payload.len() as u32).to_le_bytes())?;
        self.writer.write_all(payload)?;
        self.writer.flush()?;
        Ok(())
    }

    fn recv_frame(&mut self) -> ComputeResult<Option<Vec<u8>>> {
        let mut len = [0u8; 4];
        match self.reader.read_exact(&mut len) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let len = u32::from_le_bytes(len) as usize;
        if len > MAX_FRAME_LEN {
            return Err(ComputeError::Protocol(format!(
                "incoming frame of {len} bytes exceeds limit"
            )));
        }
        let mut payload = vec![0u8; len];
        self.reader.read_exact(&mut payload).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => ComputeError::Protocol("truncated frame".into()),
            _ => e.into(),
        })?;
        Ok(Some(payload))
    }
}

/// Frames passed over in-memory channels.
pub struct ChannelEndpoint {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
}

/// Two connected channel endpoints.
pub fn channel_pair() -> (ChannelEndpoint, ChannelEndpoint) {
    let (a_tx, b_rx) = channel();
    let (b_tx, a_rx) = channel();
    (
        ChannelEndpoint { tx: a_tx, rx: a_rx },
        ChannelEndpoint { tx: b_tx, rx: b_rx },
    )
}

impl Endpoint for ChannelEndpoint {
    fn send_frame(&mut self, payload: &[u8]) -> ComputeResult<()> {
        self.tx
            .send(payload.to_vec())
            .map_err(|_| ComputeError::Io(std::io::Error::from(ErrorKind::BrokenPipe)))
    }

    fn recv_frame(&mut self) -> ComputeResult<Option<Vec<u8>>> {
        Ok(self.rx.recv().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::process::message::Request;
    use std::io::Cursor;

    #[test]
    fn test_frames_over_byte_stream() {
        let mut wire = Vec::new();
        {
            let mut out = FramedStream::new(std::io::empty(), &mut wire);
            send(&mut out, &Request::Init { rank: 1, size: 3 }).unwrap();
            send(&mut out, &Request::Shutdown).unwrap();
        }
        let mut inp = FramedStream::new(Cursor::new(wire), std::io::sink());
        let a: Option<Request> = recv(&mut inp).unwrap();
        let b: Option<Request> = recv(&mut inp).unwrap();
        let c: Option<Request> = recv(&mut inp).unwrap();
        assert_eq!(a, Some(Request::Init { rank: 1, size: 3 }));
        assert_eq!(b, Some(Request::Shutdown));
        assert_eq!(c, None);
    }

    #[test]
    fn test_truncated_frame() {
        let mut wire = 10u32.to_le_bytes().to_vec();
        wire.extend_from_slice(&[1, 2, 3]);
        let mut inp = FramedStream::new(Cursor::new(wire), std::io::sink());
        assert!(matches!(inp.recv_frame(), Err(ComputeError::Protocol(_))));
    }

    #[test]
    fn test_channel_pair() {
        let (mut a, mut b) = channel_pair();
        a.send_frame(b"ping").unwrap();
        assert_eq!(b.recv_frame().unwrap(), Some(b"ping".to_vec()));
        drop(a);
        assert_eq!(b.recv_frame().unwrap(), None);
    }
}
