//! In-process transport
//!
//! Ranks are threads of one process wired together with unbounded crossbeam
//! channels. Used for the single-process group and for exercising multi-rank
//! behaviour without sockets.

use super::protocol::Message;
use super::{Transport, LEADER_RANK};
use crate::error::{Error, Result};
use crossbeam::channel::{unbounded, Receiver, Sender};

/// One rank's end of an in-process group
pub struct LocalTransport {
    rank: usize,
    world_size: usize,

    /// Indexed by peer rank; the leader has an entry per follower, a follower
    /// only at `LEADER_RANK`
    outbox: Vec<Option<Sender<Message>>>,
    inbox: Vec<Option<Receiver<Message>>>,
}

impl LocalTransport {
    /// A group of one
    pub fn solo() -> Self {
        Self {
            rank: LEADER_RANK,
            world_size: 1,
            outbox: vec![None],
            inbox: vec![None],
        }
    }

    /// Build a fully wired group of `world_size` ranks
    ///
    /// # Panics
    ///
    /// Panics if `world_size` is zero.
    pub fn group(world_size: usize) -> Vec<Self> {
        assert!(world_size > 0, "a group needs at least one rank");

        let mut members: Vec<Self> = (0..world_size)
            .map(|rank| Self {
                rank,
                world_size,
                outbox: vec![None; world_size],
                inbox: (0..world_size).map(|_| None).collect(),
            })
            .collect();

        for follower in 1..world_size {
            let (to_follower, follower_rx) = unbounded();
            let (to_leader, leader_rx) = unbounded();

            members[LEADER_RANK].outbox[follower] = Some(to_follower);
            members[LEADER_RANK].inbox[follower] = Some(leader_rx);
            members[follower].outbox[LEADER_RANK] = Some(to_leader);
            members[follower].inbox[LEADER_RANK] = Some(follower_rx);
        }

        members
    }

    fn no_link(&self, peer: usize) -> Error {
        Error::Coordination(format!("rank {} has no link to rank {}", self.rank, peer))
    }
}

impl Transport for LocalTransport {
    fn rank(&self) -> usize {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.world_size
    }

    fn send(&mut self, peer: usize, msg: &Message) -> Result<()> {
        let tx = self
            .outbox
            .get(peer)
            .and_then(Option::as_ref)
            .ok_or_else(|| self.no_link(peer))?;
        tx.send(msg.clone())
            .map_err(|_| Error::Coordination(format!("rank {} disconnected", peer)))
    }

    fn recv(&mut self, peer: usize) -> Result<Message> {
        let rx = self
            .inbox
            .get(peer)
            .and_then(Option::as_ref)
            .ok_or_else(|| self.no_link(peer))?;
        rx.recv()
            .map_err(|_| Error::Coordination(format!("rank {} disconnected", peer)))
    }
}
