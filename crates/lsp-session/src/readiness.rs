//! Read-readiness checks for the connection's input stream.
//!
//! The frame reader waits on a [`Readiness`] handle before the first read of
//! each frame so an embedding process can multiplex the input descriptor with
//! other event sources. In-memory streams use [`AlwaysReady`].

use std::io;

/// Blocks until the input stream has bytes (or end-of-stream) to deliver.
pub trait Readiness {
    /// Waits until a read on the input stream will not block.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if readiness cannot be determined.
    fn wait_readable(&mut self) -> io::Result<()>;
}

/// Readiness for streams that never block, such as in-memory buffers.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysReady;

impl Readiness for AlwaysReady {
    fn wait_readable(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(unix)]
pub use self::unix::PollReadiness;

#[cfg(unix)]
mod unix {
    use std::io;
    use std::os::fd::AsFd;

    use nix::errno::Errno;
    use nix::poll::{PollFd, PollFlags, PollTimeout, poll};

    use super::Readiness;

    /// Readiness backed by `poll(2)` on a file descriptor.
    ///
    /// Hang-up and error conditions also count as readable: the following
    /// read then reports end-of-stream or the failure.
    #[derive(Debug)]
    pub struct PollReadiness<F> {
        source: F,
    }

    impl<F: AsFd> PollReadiness<F> {
        /// Wraps a descriptor owner, typically a duplicate of the input fd.
        #[must_use]
        pub fn new(source: F) -> Self {
            Self { source }
        }
    }

    impl<F: AsFd> Readiness for PollReadiness<F> {
        fn wait_readable(&mut self) -> io::Result<()> {
            loop {
                let mut fds = [PollFd::new(self.source.as_fd(), PollFlags::POLLIN)];
                match poll(&mut fds, PollTimeout::NONE) {
                    Ok(_) => return Ok(()),
                    Err(Errno::EINTR) => {}
                    Err(errno) => return Err(io::Error::from(errno)),
                }
            }
        }
    }

}
