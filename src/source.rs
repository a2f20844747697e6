// src/source.rs

//! Forward-only byte sources feeding a [`crate::stream::Stream`].

use std::io::{self, ErrorKind, Read};

/// Why a source stopped producing bytes.
#[derive(Debug)]
pub enum SourceEnd {
    /// Clean end of data.
    Eof,
    /// The source failed. The detail stays on the Rust side; the demuxer only sees a read error.
    Failed(io::Error),
}

/// Result of one [`Source::pull`].
///
/// A pull may deliver bytes *and* an end condition at once; the bytes are consumed first and the
/// end condition is reported on the following pull.
#[derive(Debug)]
pub struct Pulled {
    pub len: usize,
    pub end: Option<SourceEnd>,
}

impl Pulled {
    pub fn bytes(len: usize) -> Self {
        Self { len, end: None }
    }

    pub fn eof() -> Self {
        Self {
            len: 0,
            end: Some(SourceEnd::Eof),
        }
    }

    pub fn failed(err: io::Error) -> Self {
        Self {
            len: 0,
            end: Some(SourceEnd::Failed(err)),
        }
    }
}

/// A forward-only byte source.
///
/// The stream never seeks. It moves the source into the session, so a source must be `Send` but
/// need not be `Sync`.
pub trait Source {
    /// Fill the front of `buf` with up to `buf.len()` bytes.
    ///
    /// Returning fewer bytes than asked for is fine; returning zero bytes with no end condition is
    /// treated as end of data.
    fn pull(&mut self, buf: &mut [u8]) -> Pulled;

    /// Release whatever the source holds. Called exactly once by [`crate::stream::Stream::close`].
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<S: Source + ?Sized> Source for Box<S> {
    fn pull(&mut self, buf: &mut [u8]) -> Pulled {
        (**self).pull(buf)
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

/// Adapts any [`Read`] into a [`Source`].
pub struct ReadSource<R> {
    inner: R,
}

impl<R: Read> ReadSource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Source for ReadSource<R> {
    fn pull(&mut self, buf: &mut [u8]) -> Pulled {
        loop {
            match self.inner.read(buf) {
                Ok(0) => return Pulled::eof(),
                Ok(n) => return Pulled::bytes(n),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Pulled::failed(e),
            }
        }
    }
}
