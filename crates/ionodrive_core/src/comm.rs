//! Worker group and collective operations.
//!
//! Every worker runs the same control flow, so collectives are matched by
//! call order: the n-th collective on one worker pairs with the n-th on every
//! other worker. Messages carry that sequence number; a message that arrives
//! for the next collective before the current one completes is parked.

use crate::error::{DriverError, DriverResult};
use crossbeam_channel::{unbounded, Receiver, Sender};

/// Collective operations the driver needs from the worker group.
pub trait Communicator: Send {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    /// Minimum of `value` over all workers.
    fn all_reduce_min(&mut self, value: f64) -> DriverResult<f64>;

    /// True on every worker if `flag` is true on any worker.
    fn all_reduce_any(&mut self, flag: bool) -> DriverResult<bool>;

    fn barrier(&mut self) -> DriverResult<()>;

    fn is_root(&self) -> bool {
        self.rank() == 0
    }
}

/// Turns a local outcome into a group-wide one.
///
/// Every worker votes; if any worker failed, all of them return an error.
/// Workers that succeeded locally report [`DriverError::PeerFailure`].
pub fn agree<T>(
    comm: &mut dyn Communicator,
    local: DriverResult<T>,
    stage: &'static str,
) -> DriverResult<T> {
    let failed = comm.all_reduce_any(local.is_err())?;
    match local {
        Err(err) => Err(err),
        Ok(_) if failed => Err(DriverError::PeerFailure { stage }),
        Ok(value) => Ok(value),
    }
}

/// A group of one.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialComm;

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_reduce_min(&mut self, value: f64) -> DriverResult<f64> {
        Ok(value)
    }

    fn all_reduce_any(&mut self, flag: bool) -> DriverResult<bool> {
        Ok(flag)
    }

    fn barrier(&mut self) -> DriverResult<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum Payload {
    Min(f64),
    Any(bool),
    Barrier,
}

#[derive(Debug, Clone, Copy)]
struct Envelope {
    seq: u64,
    payload: Payload,
}

/// One member of an in-process worker group.
pub struct ChannelComm {
    rank: usize,
    size: usize,
    seq: u64,
    peers: Vec<(usize, Sender<Envelope>)>,
    inbox: Receiver<Envelope>,
    parked: Vec<Envelope>,
}

impl ChannelComm {
    /// Creates a fully connected group; element `r` belongs to rank `r`.
    #[must_use]
    pub fn group(size: usize) -> Vec<ChannelComm> {
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..size).map(|_| unbounded()).unzip();
        receivers
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| ChannelComm {
                rank,
                size,
                seq: 0,
                peers: senders
                    .iter()
                    .enumerate()
                    .filter(|(peer, _)| *peer != rank)
                    .map(|(peer, tx)| (peer, tx.clone()))
                    .collect(),
                inbox,
                parked: Vec::new(),
            })
            .collect()
    }

    fn exchange(&mut self, payload: Payload) -> DriverResult<Vec<Payload>> {
        self.seq += 1;
        let seq = self.seq;

        for (peer, tx) in &self.peers {
            tx.send(Envelope { seq, payload }).map_err(|_| {
                DriverError::communication(format!("worker {peer} left the group"))
            })?;
        }

        let mut received = Vec::with_capacity(self.size);
        received.push(payload);

        let mut waiting = Vec::new();
        for envelope in self.parked.drain(..) {
            if envelope.seq == seq {
                received.push(envelope.payload);
            } else {
                waiting.push(envelope);
            }
        }
        self.parked = waiting;

        while received.len() < self.size {
            let envelope = self.inbox.recv().map_err(|_| {
                DriverError::communication(format!(
                    "worker {} lost its peers during collective {seq}",
                    self.rank
                ))
            })?;
            if envelope.seq == seq {
                received.push(envelope.payload);
            } else {
                self.parked.push(envelope);
            }
        }

        Ok(received)
    }
}

impl Communicator for ChannelComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn all_reduce_min(&mut self, value: f64) -> DriverResult<f64> {
        let mut min = value;
        for payload in self.exchange(Payload::Min(value))? {
            match payload {
                Payload::Min(v) => min = min.min(v),
                other => {
                    return Err(DriverError::communication(format!(
                        "mismatched collective: expected min, got {other:?}"
                    )))
                }
            }
        }
        Ok(min)
    }

    fn all_reduce_any(&mut self, flag: bool) -> DriverResult<bool> {
        let mut any = false;
        for payload in self.exchange(Payload::Any(flag))? {
            match payload {
                Payload::Any(v) => any |= v,
                other => {
                    return Err(DriverError::communication(format!(
                        "mismatched collective: expected any, got {other:?}"
                    )))
                }
            }
        }
        Ok(any)
    }

    fn barrier(&mut self) -> DriverResult<()> {
        for payload in self.exchange(Payload::Barrier)? {
            if !matches!(payload, Payload::Barrier) {
                return Err(DriverError::communication(format!(
                    "mismatched collective: expected barrier, got {payload:?}"
                )));
            }
        }
        Ok(())
    }
}
