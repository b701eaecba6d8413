//! TCP transport
//!
//! The leader listens on `leader_addr` and accepts one connection per
//! follower. Followers connect (retrying while the leader is not listening
//! yet) and introduce themselves with HELLO; the leader answers WELCOME once
//! it has checked the protocol version and rank.
//!
//! The transport is blocking: each call drives a private current-thread tokio
//! runtime to completion.

use super::protocol::*;
use super::{Transport, LEADER_RANK};
use crate::config::CoordinatorConfig;
use crate::error::{Error, Result};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Runtime;
use tokio::time::sleep;
use tracing::{debug, info};

/// One rank's connections to the rest of the group
pub struct TcpTransport {
    rank: usize,
    world_size: usize,
    runtime: Runtime,

    /// Indexed by peer rank; the leader holds one stream per follower, a
    /// follower only the stream at `LEADER_RANK`
    streams: Vec<Option<TcpStream>>,
}

impl TcpTransport {
    /// Form the group described by `config`
    ///
    /// Blocks until every follower has joined (leader) or until the leader
    /// has welcomed this process (follower).
    pub fn connect(config: &CoordinatorConfig) -> Result<Self> {
        if config.world_size == 0 || config.rank >= config.world_size {
            return Err(Error::InvalidConfig(format!(
                "rank {} is outside a group of {}",
                config.rank, config.world_size
            )));
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let streams = if config.rank == LEADER_RANK {
            runtime.block_on(accept_followers(config))?
        } else {
            runtime.block_on(join_leader(config))?
        };

        Ok(Self {
            rank: config.rank,
            world_size: config.world_size,
            runtime,
            streams,
        })
    }
}

impl Transport for TcpTransport {
    fn rank(&self) -> usize {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.world_size
    }

    fn send(&mut self, peer: usize, msg: &Message) -> Result<()> {
        let stream = link(&mut self.streams, self.rank, peer)?;
        self.runtime
            .block_on(write_message(stream, msg))
            .map_err(|e| Error::Coordination(format!("send to rank {} failed: {}", peer, e)))
    }

    fn recv(&mut self, peer: usize) -> Result<Message> {
        let stream = link(&mut self.streams, self.rank, peer)?;
        self.runtime
            .block_on(read_message(stream))
            .map_err(|e| Error::Coordination(format!("receive from rank {} failed: {}", peer, e)))
    }
}

fn link(streams: &mut [Option<TcpStream>], rank: usize, peer: usize) -> Result<&mut TcpStream> {
    streams
        .get_mut(peer)
        .and_then(Option::as_mut)
        .ok_or_else(|| Error::Coordination(format!("rank {} has no link to rank {}", rank, peer)))
}

/// Leader side of group formation
async fn accept_followers(config: &CoordinatorConfig) -> Result<Vec<Option<TcpStream>>> {
    let listener = TcpListener::bind(&config.leader_addr).await.map_err(|e| {
        Error::Coordination(format!("failed to bind leader on {}: {}", config.leader_addr, e))
    })?;

    info!(
        "Leader listening on {}, waiting for {} followers",
        config.leader_addr,
        config.world_size - 1
    );

    let mut streams: Vec<Option<TcpStream>> = (0..config.world_size).map(|_| None).collect();
    let mut joined = 0;

    while joined < config.world_size - 1 {
        let (mut stream, addr) = listener.accept().await?;
        stream.set_nodelay(true)?;

        let hello = match read_message(&mut stream).await? {
            Message::Hello(hello) => hello,
            other => {
                return Err(Error::Coordination(format!(
                    "expected HELLO from {}, got {}",
                    addr,
                    other.kind()
                )))
            }
        };

        if hello.protocol_version != PROTOCOL_VERSION {
            return Err(Error::Coordination(format!(
                "protocol version mismatch: leader={}, rank {}={}",
                PROTOCOL_VERSION, hello.rank, hello.protocol_version
            )));
        }
        if hello.world_size != config.world_size {
            return Err(Error::Coordination(format!(
                "world size mismatch: leader={}, rank {}={}",
                config.world_size, hello.rank, hello.world_size
            )));
        }
        if hello.rank == LEADER_RANK || hello.rank >= config.world_size {
            return Err(Error::Coordination(format!(
                "follower at {} claims invalid rank {}",
                addr, hello.rank
            )));
        }
        if streams[hello.rank].is_some() {
            return Err(Error::Coordination(format!("rank {} joined twice", hello.rank)));
        }

        write_message(
            &mut stream,
            &Message::Welcome(WelcomeMessage {
                protocol_version: PROTOCOL_VERSION,
                world_size: config.world_size,
            }),
        )
        .await?;

        info!("Rank {} joined from {} ({})", hello.rank, hello.node, addr);
        streams[hello.rank] = Some(stream);
        joined += 1;
    }

    info!("All {} ranks connected", config.world_size);
    Ok(streams)
}

/// Follower side of group formation
async fn join_leader(config: &CoordinatorConfig) -> Result<Vec<Option<TcpStream>>> {
    let retry_interval = Duration::from_millis(config.retry_interval_ms);
    let mut attempt = 0;

    let mut stream = loop {
        match TcpStream::connect(&config.leader_addr).await {
            Ok(stream) => break stream,
            Err(e) if attempt < config.connect_retries => {
                attempt += 1;
                debug!(
                    "Leader at {} not reachable ({}), retry {}/{}",
                    config.leader_addr, e, attempt, config.connect_retries
                );
                sleep(retry_interval).await;
            }
            Err(e) => {
                return Err(Error::Coordination(format!(
                    "failed to connect to leader at {} after {} retries: {}",
                    config.leader_addr, attempt, e
                )))
            }
        }
    };
    stream.set_nodelay(true)?;

    write_message(
        &mut stream,
        &Message::Hello(HelloMessage {
            protocol_version: PROTOCOL_VERSION,
            rank: config.rank,
            world_size: config.world_size,
            node: get_node_id(),
        }),
    )
    .await?;

    match read_message(&mut stream).await? {
        Message::Welcome(welcome) if welcome.world_size == config.world_size => {}
        Message::Welcome(welcome) => {
            return Err(Error::Coordination(format!(
                "world size mismatch: leader={}, rank {}={}",
                welcome.world_size, config.rank, config.world_size
            )))
        }
        other => {
            return Err(Error::Coordination(format!(
                "expected WELCOME from leader, got {}",
                other.kind()
            )))
        }
    }

    debug!("Rank {} joined leader at {}", config.rank, config.leader_addr);

    let mut streams: Vec<Option<TcpStream>> = (0..config.world_size).map(|_| None).collect();
    streams[LEADER_RANK] = Some(stream);
    Ok(streams)
}

/// Get node identifier (hostname, or "unknown")
fn get_node_id() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}
