//! Adapter for emulation engines that run on their own thread.
//!
//! The engine thread owns the engine. The host asks it to advance one frame
//! and blocks until the frame completes. Memory reads and writes from other
//! parties are queued as requests and serviced between engine slices, the
//! points where the engine's memory is consistent, so a caller blocks until
//! the engine reaches such a point.

use std::collections::VecDeque;
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use thiserror::Error;

use crate::error::AccessFault;
use crate::memory::{DomainAccess, DomainBackend, Endian, MemoryDomain};

/// An engine driven in slices by the bridge thread.
pub trait ForeignEngine: Send + 'static {
    /// Runs up to the next safe point; returns `true` when that point ends a frame.
    fn run_slice(&mut self) -> bool;

    /// Bytes of engine memory exposed to the host.
    fn memory_size(&self) -> u64;

    /// Reads engine memory; only called at a safe point.
    fn peek(&self, addr: u64) -> u8;

    /// Writes engine memory; only called at a safe point.
    fn poke(&mut self, addr: u64, value: u8);
}

/// Failures talking to the engine thread.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The OS refused to start the engine thread.
    #[error("failed to start engine thread")]
    Spawn(#[source] io::Error),
    /// The engine thread has stopped (shut down or panicked).
    #[error("engine thread is not running")]
    Disconnected,
    /// Address outside the engine's exposed memory.
    #[error("address {addr:#X} is outside the engine's {size:#X} bytes of memory")]
    OutOfRange {
        /// Requested address.
        addr: u64,
        /// Exposed memory size.
        size: u64,
    },
}

/// Result of one frame advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameReport {
    /// Frames completed by the engine, this one included.
    pub frame: u64,
    /// Slices the frame took.
    pub slices: u32,
}

#[derive(Debug)]
enum MemoryRequest {
    Peek { addr: u64, reply: Sender<u8> },
    Poke { addr: u64, value: u8, reply: Sender<()> },
}

#[derive(Debug)]
enum Request {
    AdvanceFrame(Sender<FrameReport>),
    Memory(MemoryRequest),
    Shutdown,
}

struct EngineThread<E> {
    engine: E,
    inbox: Receiver<Request>,
    deferred: VecDeque<Request>,
    frame: u64,
}

impl<E: ForeignEngine> EngineThread<E> {
    fn run(mut self) {
        loop {
            let request = match self.deferred.pop_front() {
                Some(request) => request,
                None => match self.inbox.recv() {
                    Ok(request) => request,
                    Err(_) => break,
                },
            };
            match request {
                Request::AdvanceFrame(reply) => {
                    let report = self.advance_frame();
                    // The requester may have given up waiting.
                    let _ = reply.send(report);
                }
                Request::Memory(request) => self.service(request),
                Request::Shutdown => break,
            }
        }
        tracing::debug!(frame = self.frame, "engine thread exiting");
    }

    fn advance_frame(&mut self) -> FrameReport {
        let mut slices = 0;
        loop {
            let frame_done = self.engine.run_slice();
            slices += 1;
            self.service_pending();
            if frame_done {
                break;
            }
        }
        self.frame += 1;
        FrameReport {
            frame: self.frame,
            slices,
        }
    }

    // Handles queued memory requests without blocking; anything else waits for the frame to end.
    fn service_pending(&mut self) {
        while let Ok(request) = self.inbox.try_recv() {
            match request {
                Request::Memory(request) => self.service(request),
                other => self.deferred.push_back(other),
            }
        }
    }

    fn service(&mut self, request: MemoryRequest) {
        match request {
            MemoryRequest::Peek { addr, reply } => {
                let _ = reply.send(self.engine.peek(addr));
            }
            MemoryRequest::Poke { addr, value, reply } => {
                self.engine.poke(addr, value);
                let _ = reply.send(());
            }
        }
    }
}

/// Owner of the engine thread. Dropping it stops and joins the thread.
#[derive(Debug)]
pub struct EngineBridge {
    requests: Sender<Request>,
    thread: Option<JoinHandle<()>>,
    memory_size: u64,
}

impl EngineBridge {
    /// Moves `engine` onto a new thread.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Spawn`] when the thread cannot be created.
    pub fn spawn<E: ForeignEngine>(engine: E) -> Result<Self, BridgeError> {
        let memory_size = engine.memory_size();
        let (requests, inbox) = mpsc::channel();
        let worker = EngineThread {
            engine,
            inbox,
            deferred: VecDeque::new(),
            frame: 0,
        };
        let thread = thread::Builder::new()
            .name("retrace-engine".to_owned())
            .spawn(move || worker.run())
            .map_err(BridgeError::Spawn)?;
        tracing::debug!(memory_size, "engine thread started");
        Ok(Self {
            requests,
            thread: Some(thread),
            memory_size,
        })
    }

    /// Runs the engine to the end of its current frame and waits for it.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Disconnected`] when the engine thread has stopped.
    pub fn frame_advance(&mut self) -> Result<FrameReport, BridgeError> {
        let (reply, done) = mpsc::channel();
        self.requests
            .send(Request::AdvanceFrame(reply))
            .map_err(|_| BridgeError::Disconnected)?;
        done.recv().map_err(|_| BridgeError::Disconnected)
    }

    /// Cloneable, sendable handle for memory access.
    #[must_use]
    pub fn handle(&self) -> BridgeHandle {
        BridgeHandle {
            requests: self.requests.clone(),
            memory_size: self.memory_size,
        }
    }

    /// Byte-wide domain whose accesses rendezvous with the engine thread.
    #[must_use]
    pub fn memory_domain(&self, name: impl Into<String>, endian: Endian) -> MemoryDomain {
        MemoryDomain::new(
            name,
            endian,
            1,
            DomainBackend::Custom {
                size: self.memory_size,
                access: Box::new(self.handle()),
            },
        )
    }
}

impl Drop for EngineBridge {
    fn drop(&mut self) {
        // Fails only when the thread already exited.
        let _ = self.requests.send(Request::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("engine thread panicked");
            } else {
                tracing::debug!("engine thread stopped");
            }
        }
    }
}

/// Memory access to a bridged engine from any thread.
#[derive(Debug, Clone)]
pub struct BridgeHandle {
    requests: Sender<Request>,
    memory_size: u64,
}

impl BridgeHandle {
    fn check(&self, addr: u64) -> Result<(), BridgeError> {
        if addr < self.memory_size {
            Ok(())
        } else {
            Err(BridgeError::OutOfRange {
                addr,
                size: self.memory_size,
            })
        }
    }

    /// Reads one byte at the engine's next safe point.
    ///
    /// # Errors
    ///
    /// Fails for an out-of-range address or a stopped engine.
    pub fn read(&self, addr: u64) -> Result<u8, BridgeError> {
        self.check(addr)?;
        let (reply, value) = mpsc::channel();
        self.requests
            .send(Request::Memory(MemoryRequest::Peek { addr, reply }))
            .map_err(|_| BridgeError::Disconnected)?;
        value.recv().map_err(|_| BridgeError::Disconnected)
    }

    /// Writes one byte at the engine's next safe point and waits for it to land.
    ///
    /// # Errors
    ///
    /// Fails for an out-of-range address or a stopped engine.
    pub fn write(&self, addr: u64, value: u8) -> Result<(), BridgeError> {
        self.check(addr)?;
        let (reply, done) = mpsc::channel();
        self.requests
            .send(Request::Memory(MemoryRequest::Poke { addr, value, reply }))
            .map_err(|_| BridgeError::Disconnected)?;
        done.recv().map_err(|_| BridgeError::Disconnected)
    }
}

impl DomainAccess for BridgeHandle {
    fn peek(&self, addr: u64) -> Result<u8, AccessFault> {
        self.read(addr).map_err(AccessFault::from)
    }

    fn poke(&mut self, addr: u64, value: u8) -> Result<(), AccessFault> {
        self.write(addr, value).map_err(AccessFault::from)
    }
}

impl From<BridgeError> for AccessFault {
    fn from(error: BridgeError) -> Self {
        Self::new(error.to_string())
    }
}
