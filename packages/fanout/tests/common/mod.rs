#![allow(dead_code)]

use std::io::{self, Read};
use std::os::fd::OwnedFd;
use std::os::unix::net::UnixStream;
use std::time::{Duration, Instant};

use fanout::{Endpoint, EndpointKind, FanoutError, PtyAllocator, PtyPair, Sink, SinkKind, Source};

/// Hands out socket pairs instead of ptys. The far end of each pair is kept
/// so tests can read what the recreated sink writes.
#[derive(Default)]
pub struct StreamAllocator {
    pub peers: Vec<UnixStream>,
    pub fail: bool,
}

impl PtyAllocator for StreamAllocator {
    fn allocate(&mut self) -> fanout::Result<PtyPair> {
        if self.fail {
            return Err(FanoutError::PtyAllocation(nix::errno::Errno::EMFILE));
        }
        let (master, peer) = UnixStream::pair().expect("socketpair");
        let slave = peer.try_clone().expect("clone peer");
        peer.set_nonblocking(true).expect("nonblocking peer");
        let name = format!("/dev/fake/{}", self.peers.len());
        self.peers.push(peer);
        Ok(PtyPair {
            master: OwnedFd::from(master),
            slave: OwnedFd::from(slave),
            name,
        })
    }
}

/// A sink writing into one end of a socket pair; the other end is returned.
pub fn stream_sink(kind: SinkKind, name: &str) -> (Sink, UnixStream) {
    let (ours, theirs) = UnixStream::pair().expect("socketpair");
    ours.set_nonblocking(true).expect("nonblocking");
    theirs.set_nonblocking(true).expect("nonblocking peer");
    let endpoint = Endpoint::from_parts(OwnedFd::from(ours), name, EndpointKind::PtyMaster, None);
    (Sink::from_endpoint(kind, endpoint, false), theirs)
}

/// A sink whose send buffer is already full, so every write would block.
pub fn full_sink(name: &str) -> (Sink, UnixStream) {
    let (ours, theirs) = UnixStream::pair().expect("socketpair");
    ours.set_nonblocking(true).expect("nonblocking");
    let block = [0u8; 4096];
    loop {
        match io::Write::write(&mut &ours, &block) {
            Ok(_) => continue,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) => panic!("filling socket: {e}"),
        }
    }
    let endpoint = Endpoint::from_parts(OwnedFd::from(ours), name, EndpointKind::PtyMaster, None);
    (Sink::from_endpoint(SinkKind::PtyMaster, endpoint, false), theirs)
}

/// A sink writing into a pipe that is already full. The read end comes back
/// non-blocking.
pub fn full_pipe_sink(name: &str) -> (Sink, Endpoint) {
    let (read, write) = nix::unistd::pipe().expect("pipe");
    let writer = Endpoint::from_parts(write, name, EndpointKind::PtyMaster, None);
    let reader = Endpoint::from_parts(read, "pipe-reader", EndpointKind::Device, None);
    fanout::mode::set_non_blocking(&writer).expect("nonblocking writer");
    fanout::mode::set_non_blocking(&reader).expect("nonblocking reader");

    let block = [0u8; 4096];
    loop {
        match writer.write(&block) {
            Ok(_) => continue,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) => panic!("filling pipe: {e}"),
        }
    }
    (Sink::from_endpoint(SinkKind::PtyMaster, writer, false), reader)
}

/// Read exactly `len` bytes that are already buffered in a non-blocking
/// endpoint.
pub fn take(reader: &Endpoint, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        match reader.read(&mut out[filled..]) {
            Ok(0) => panic!("unexpected end of stream"),
            Ok(n) => filled += n,
            Err(e) => panic!("take: {e}"),
        }
    }
    out
}

/// Everything currently buffered in a non-blocking endpoint.
pub fn drain_endpoint(reader: &Endpoint) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => out.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) => panic!("drain: {e}"),
        }
    }
    out
}

/// A source backed by a socket pair; write to the returned stream to feed it.
pub fn stream_source() -> (Source, UnixStream) {
    let (ours, theirs) = UnixStream::pair().expect("socketpair");
    ours.set_nonblocking(true).expect("nonblocking");
    let endpoint = Endpoint::from_parts(OwnedFd::from(ours), "test-source", EndpointKind::Device, None);
    (Source::from_endpoint(endpoint), theirs)
}

/// Everything currently readable from a non-blocking stream.
pub fn drain(stream: &UnixStream) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match (&*stream).read(&mut buf) {
            Ok(0) => break,
            Ok(n) => out.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) => panic!("drain: {e}"),
        }
    }
    out
}

/// Read from a blocking reader until `len` bytes arrive or the deadline passes.
pub fn read_exact_within(reader: &mut impl Read, len: usize, limit: Duration) -> Vec<u8> {
    let deadline = Instant::now() + limit;
    let mut out = Vec::new();
    let mut buf = [0u8; 256];
    while out.len() < len && Instant::now() < deadline {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => out.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(5))
            }
            Err(e) => panic!("read: {e}"),
        }
    }
    out
}
