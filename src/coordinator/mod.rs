//! Process coordination
//!
//! A fixed group of processes runs the same program in lockstep. The only
//! cross-process primitives are a barrier and a broadcast from the leader
//! (rank 0). Everything the harness shares between ranks goes through them.
//!
//! # Architecture
//!
//! - **Transport**: point-to-point message delivery between the leader and
//!   each follower (`tcp` across processes, `local` across threads)
//! - **Coordinator**: the collectives, built once on top of any transport
//! - **Leader**: capability token; leader-gated APIs require one, and only
//!   rank 0 can obtain it
//!
//! # Modules
//!
//! - `protocol`: message definitions and framing
//! - `tcp`: multi-process transport
//! - `local`: in-process transport

pub mod local;
pub mod protocol;
pub mod tcp;

use crate::config::CoordinatorConfig;
use crate::error::{Error, Result};
use protocol::Message;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

pub use local::LocalTransport;
pub use tcp::TcpTransport;

/// Rank of the leader process
pub const LEADER_RANK: usize = 0;

/// Point-to-point delivery between group members
///
/// The leader may address any peer; followers only address `LEADER_RANK`.
/// Messages between one pair of ranks arrive in the order they were sent.
pub trait Transport: Send {
    /// This process's rank
    fn rank(&self) -> usize;

    /// Number of processes in the group
    fn world_size(&self) -> usize;

    /// Send a message to `peer`
    fn send(&mut self, peer: usize, msg: &Message) -> Result<()>;

    /// Block until the next message from `peer` arrives
    fn recv(&mut self, peer: usize) -> Result<Message>;
}

/// Proof of being the leader
///
/// Zero-sized and only constructible by a `Coordinator` on rank 0, so any API
/// taking `&Leader` cannot be called from a follower.
#[derive(Debug)]
pub struct Leader {
    _seal: (),
}

/// What this process is allowed to do
#[derive(Debug)]
pub enum Role {
    Leader(Leader),
    Follower { rank: usize },
}

/// State that only exists on the leader
#[derive(Debug)]
pub enum Gated<T> {
    Leader(T),
    Follower,
}

impl<T> Gated<T> {
    /// Leader's state, `None` on followers
    pub fn as_mut(&mut self) -> Option<&mut T> {
        match self {
            Gated::Leader(value) => Some(value),
            Gated::Follower => None,
        }
    }

    pub fn as_ref(&self) -> Option<&T> {
        match self {
            Gated::Leader(value) => Some(value),
            Gated::Follower => None,
        }
    }

    pub fn into_leader(self) -> Option<T> {
        match self {
            Gated::Leader(value) => Some(value),
            Gated::Follower => None,
        }
    }

    pub fn is_leader(&self) -> bool {
        matches!(self, Gated::Leader(_))
    }
}

/// Coordination context for one program run
///
/// Passed explicitly to every component that needs to synchronise. All ranks
/// must issue the same collectives in the same order.
pub struct Coordinator {
    transport: Box<dyn Transport>,
    seq: u64,
}

impl Coordinator {
    /// Wrap a connected transport
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self { transport, seq: 0 }
    }

    /// Join the group described by `config`
    ///
    /// A group of one needs no network; larger groups use TCP.
    pub fn connect(config: &CoordinatorConfig) -> Result<Self> {
        if config.world_size == 1 {
            return Ok(Self::solo());
        }
        let transport = TcpTransport::connect(config)?;
        Ok(Self::new(Box::new(transport)))
    }

    /// A group containing only this process
    pub fn solo() -> Self {
        Self::new(Box::new(LocalTransport::solo()))
    }

    /// `world_size` coordinators wired to each other in-process
    ///
    /// Element `i` has rank `i`; hand each to its own thread.
    pub fn local_group(world_size: usize) -> Vec<Self> {
        LocalTransport::group(world_size)
            .into_iter()
            .map(|t| Self::new(Box::new(t)))
            .collect()
    }

    pub fn rank(&self) -> usize {
        self.transport.rank()
    }

    pub fn world_size(&self) -> usize {
        self.transport.world_size()
    }

    pub fn is_leader(&self) -> bool {
        self.rank() == LEADER_RANK
    }

    /// Leader capability, `None` on followers
    pub fn leader(&self) -> Option<Leader> {
        self.is_leader().then_some(Leader { _seal: () })
    }

    pub fn role(&self) -> Role {
        match self.leader() {
            Some(leader) => Role::Leader(leader),
            None => Role::Follower { rank: self.rank() },
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    /// Block until every rank reaches this barrier
    pub fn barrier(&mut self) -> Result<()> {
        let seq = self.next_seq();
        debug!(seq, rank = self.rank(), "barrier");

        if self.is_leader() {
            for peer in 1..self.world_size() {
                match self.transport.recv(peer)? {
                    Message::Arrive { seq: got } if got == seq => {}
                    other => return Err(out_of_step(peer, "ARRIVE", seq, &other)),
                }
            }
            for peer in 1..self.world_size() {
                self.transport.send(peer, &Message::Release { seq })?;
            }
        } else {
            self.transport.send(LEADER_RANK, &Message::Arrive { seq })?;
            match self.transport.recv(LEADER_RANK)? {
                Message::Release { seq: got } if got == seq => {}
                other => return Err(out_of_step(LEADER_RANK, "RELEASE", seq, &other)),
            }
        }
        Ok(())
    }

    /// Every rank returns the leader's `value`; followers' values are ignored
    pub fn broadcast<T>(&mut self, value: T) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let seq = self.next_seq();
        debug!(seq, rank = self.rank(), "broadcast");

        if self.is_leader() {
            let payload = rmp_serde::to_vec(&value)?;
            for peer in 1..self.world_size() {
                self.transport.send(peer, &Message::Broadcast { seq, payload: payload.clone() })?;
            }
            Ok(value)
        } else {
            match self.transport.recv(LEADER_RANK)? {
                Message::Broadcast { seq: got, payload } if got == seq => {
                    Ok(rmp_serde::from_slice(&payload)?)
                }
                other => Err(out_of_step(LEADER_RANK, "BROADCAST", seq, &other)),
            }
        }
    }

    /// Evaluate `f` on the leader only, then share its result with every rank
    ///
    /// The leader finishes `f` before any follower observes the value.
    pub fn on_leader<T, F>(&mut self, f: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&Leader) -> T,
    {
        match self.role() {
            Role::Leader(leader) => {
                let value = f(&leader);
                self.broadcast(value)
            }
            Role::Follower { .. } => self.receive(),
        }
    }

    /// Run a fallible leader-only step and make its failure fatal everywhere
    ///
    /// The step's value stays on the leader; only the outcome is broadcast.
    /// Followers get `Error::LeaderFailed` when the leader's step failed.
    pub fn leader_only<T, F>(&mut self, step: &str, f: F) -> Result<Gated<T>>
    where
        F: FnOnce(&Leader) -> Result<T>,
    {
        match self.role() {
            Role::Leader(leader) => {
                let outcome = f(&leader);
                let failure = outcome.as_ref().err().map(|e| e.to_string());
                self.broadcast(failure)?;
                outcome.map(Gated::Leader)
            }
            Role::Follower { .. } => match self.receive::<Option<String>>()? {
                None => Ok(Gated::Follower),
                Some(message) => Err(Error::LeaderFailed {
                    step: step.to_string(),
                    message,
                }),
            },
        }
    }

    /// Follower side of a broadcast
    fn receive<T: DeserializeOwned>(&mut self) -> Result<T> {
        let seq = self.next_seq();
        debug!(seq, rank = self.rank(), "broadcast");
        match self.transport.recv(LEADER_RANK)? {
            Message::Broadcast { seq: got, payload } if got == seq => Ok(rmp_serde::from_slice(&payload)?),
            other => Err(out_of_step(LEADER_RANK, "BROADCAST", seq, &other)),
        }
    }
}

fn out_of_step(peer: usize, expected: &str, seq: u64, got: &Message) -> Error {
    let got_desc = match got {
        Message::Arrive { seq } | Message::Release { seq } | Message::Broadcast { seq, .. } => {
            format!("{}({})", got.kind(), seq)
        }
        other => other.kind().to_string(),
    };
    Error::Coordination(format!(
        "ranks out of lockstep: expected {}({}) from rank {}, got {}",
        expected, seq, peer, got_desc
    ))
}
