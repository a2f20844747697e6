// src/stream.rs

//! Pull-based Ogg Opus decoding over any forward-only byte source.
//!
//! libopusfile drives the reads: every `op_read` may call back into Rust for more bytes. The
//! callback finds its source through the process-wide [`Registry`], keyed by a per-stream id that
//! is passed to libopusfile as its opaque stream pointer. The entry only exists while a native
//! call is in progress, so a stream that is dropped without `close` leaves nothing behind.
//!
//! Current mode: **unseekable**. Seek/tell callbacks are not provided, so libopusfile never
//! rewinds and works in a single forward pass.

use std::io;
use std::mem;
use std::os::raw::{c_int, c_uchar, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::ptr::{self, NonNull};
use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::bridge::{Registry, id_from_token};
use crate::error::{Result, Usage};
use crate::ffi::{self, OggOpusFile, OpusFileCallbacks};
use crate::params::{MAX_ENCODED_FRAME_SIZE, clamp_len};
use crate::source::{Pulled, ReadSource, Source, SourceEnd};
use crate::status::StreamError;

/// Every stream currently inside a native call, by id.
static FEEDS: LazyLock<Registry<Arc<Mutex<Feed>>>> = LazyLock::new(Registry::new);

static CALLBACKS: OpusFileCallbacks = OpusFileCallbacks {
    read: Some(read_callback),
    seek: None,
    tell: None,
    close: None,
};

/// The Rust half of a stream: the source plus what the read callback remembers between calls.
struct Feed {
    source: Box<dyn Source + Send>,
    scratch: Vec<u8>,
    /// Terminal condition delivered together with bytes, reported on the next call.
    pending: Option<SourceEnd>,
}

impl Feed {
    fn new(source: Box<dyn Source + Send>) -> Self {
        Self {
            source,
            scratch: vec![0; MAX_ENCODED_FRAME_SIZE],
            pending: None,
        }
    }

    /// Pull up to `want` bytes into `scratch`.
    ///
    /// Returns the byte count, `0` at end of data (or for a zero-byte request) or `-1` on failure.
    /// Once the source has ended it is not pulled again.
    fn fill(&mut self, want: usize) -> c_int {
        // A zero-byte request says nothing about the source; an empty pull must not end it.
        if want == 0 {
            return 0;
        }
        if let Some(end) = &self.pending {
            return end_code(end);
        }

        let want = want.min(self.scratch.len());
        let Pulled { len, end } = self.source.pull(&mut self.scratch[..want]);
        let len = len.min(want);

        if let Some(SourceEnd::Failed(e)) = &end {
            debug!(error = %e, "stream source failed");
        }
        if len == 0 {
            let end = end.unwrap_or(SourceEnd::Eof);
            let code = end_code(&end);
            self.pending = Some(end);
            return code;
        }
        self.pending = end;
        len as c_int
    }
}

fn end_code(end: &SourceEnd) -> c_int {
    match end {
        SourceEnd::Eof => 0,
        SourceEnd::Failed(_) => -1,
    }
}

/// `op_read_func` handed to libopusfile.
unsafe extern "C" fn read_callback(stream: *mut c_void, buf: *mut c_uchar, nbytes: c_int) -> c_int {
    let id = id_from_token(stream);
    let Some(feed) = FEEDS.get(id) else {
        trace!(id, "read callback for unregistered stream");
        return -1;
    };
    if buf.is_null() || nbytes < 0 {
        return -1;
    }

    let filled = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut feed = feed.lock();
        let n = feed.fill(nbytes as usize);
        if n > 0 {
            // Safety: libopusfile hands us a writable buffer of at least `nbytes` bytes and
            // `fill` never returns more than that.
            unsafe { ptr::copy_nonoverlapping(feed.scratch.as_ptr(), buf, n as usize) };
        }
        n
    }));

    match filled {
        Ok(n) => n,
        Err(_) => {
            debug!(id, "stream source panicked");
            feed.lock().pending = Some(SourceEnd::Failed(io::Error::other("source panicked")));
            -1
        }
    }
}

/// An open libopusfile handle and the feed its callbacks read from.
struct Session {
    handle: NonNull<OggOpusFile>,
    id: usize,
    feed: Arc<Mutex<Feed>>,
}

impl Session {
    /// Run a native call with this session's feed reachable from the read callback.
    fn call<R>(&self, f: impl FnOnce(*mut OggOpusFile) -> R) -> R {
        let _registered = FEEDS.register(self.id, Arc::clone(&self.feed));
        f(self.handle.as_ptr())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Safety: the handle came from op_open_callbacks and is freed only here.
        unsafe { ffi::op_free(self.handle.as_ptr()) };
    }
}

// Safety: the handle is only used through `&mut Stream`, and libopusfile keeps no thread-affine
// state.
unsafe impl Send for Session {}

enum State {
    Unopened,
    Open(Session),
    /// End of stream has been reported once.
    Exhausted(Session),
    Closed,
    /// Opening failed under this key; the session is unusable.
    Failed(usize),
}

/// A decoder over an Ogg Opus byte stream.
///
/// Output is always 48 kHz. Samples are interleaved with the stream's own channel count, which
/// callers are expected to know in advance.
pub struct Stream {
    state: State,
}

impl Default for Stream {
    fn default() -> Self {
        Self {
            state: State::Unopened,
        }
    }
}

impl Stream {
    /// Open a stream over `source`, reading and validating the Opus headers.
    pub fn new<S>(source: S) -> Result<Self>
    where
        S: Source + Send + 'static,
    {
        let mut stream = Self::default();
        stream.init(source)?;
        Ok(stream)
    }

    /// Open a stream over any [`io::Read`].
    ///
    /// Reader errors reach libopusfile as a plain read failure; their detail is not preserved.
    pub fn from_reader<R>(reader: R) -> Result<Self>
    where
        R: io::Read + Send + 'static,
    {
        Self::new(ReadSource::new(reader))
    }

    /// Open a zero-value stream. Allowed once per value, even if opening fails.
    pub fn init<S>(&mut self, source: S) -> Result<()>
    where
        S: Source + Send + 'static,
    {
        if !matches!(self.state, State::Unopened) {
            return Err(Usage::AlreadyInitialized.into());
        }

        let feed = Arc::new(Mutex::new(Feed::new(Box::new(source))));
        let id = FEEDS.next_id();
        let mut status: c_int = 0;
        let raw = {
            let registered = FEEDS.register(id, Arc::clone(&feed));
            unsafe {
                ffi::op_open_callbacks(registered.token(), &CALLBACKS, ptr::null(), 0, &mut status)
            }
        };

        match NonNull::new(raw) {
            Some(handle) if status == 0 => {
                debug!(id, "ogg opus stream opened");
                self.state = State::Open(Session { handle, id, feed });
                Ok(())
            }
            handle => {
                if let Some(handle) = handle {
                    unsafe { ffi::op_free(handle.as_ptr()) };
                }
                let code = if status < 0 {
                    status
                } else {
                    StreamError::Fault.code()
                };
                debug!(id, code, "ogg opus stream failed to open");
                self.state = State::Failed(id);
                Err(StreamError::from_code(code).into())
            }
        }
    }

    /// Decode the next chunk into interleaved 16-bit PCM.
    ///
    /// Returns `Some(samples_per_channel)`, possibly fewer than fit, or `None` once at end of
    /// stream. An empty buffer reads nothing and returns `Some(0)`.
    pub fn read(&mut self, pcm: &mut [i16]) -> Result<Option<usize>> {
        let session = self.session()?;
        if pcm.is_empty() {
            return Ok(Some(0));
        }
        let ret = session.call(|of| unsafe {
            ffi::op_read(of, pcm.as_mut_ptr(), clamp_len(pcm.len()), ptr::null_mut())
        });
        self.finish_read(ret)
    }

    /// Decode the next chunk into interleaved `f32` PCM. See [`Stream::read`].
    pub fn read_float(&mut self, pcm: &mut [f32]) -> Result<Option<usize>> {
        let session = self.session()?;
        if pcm.is_empty() {
            return Ok(Some(0));
        }
        let ret = session.call(|of| unsafe {
            ffi::op_read_float(of, pcm.as_mut_ptr(), clamp_len(pcm.len()), ptr::null_mut())
        });
        self.finish_read(ret)
    }

    /// Free the native handle, then close the source and return its result.
    pub fn close(&mut self) -> Result<()> {
        match mem::replace(&mut self.state, State::Closed) {
            State::Open(session) | State::Exhausted(session) => {
                let id = session.id;
                let feed = Arc::clone(&session.feed);
                drop(session);
                debug!(id, "ogg opus stream closed");
                let closed = feed.lock().source.close();
                Ok(closed?)
            }
            State::Closed => Err(Usage::AlreadyClosed.into()),
            other => {
                self.state = other;
                Err(Usage::StreamNotOpen.into())
            }
        }
    }

    fn session(&self) -> Result<&Session> {
        match &self.state {
            State::Open(session) => Ok(session),
            State::Exhausted(_) => Err(Usage::StreamExhausted.into()),
            _ => Err(Usage::StreamNotOpen.into()),
        }
    }

    fn finish_read(&mut self, ret: c_int) -> Result<Option<usize>> {
        if ret < 0 {
            return Err(StreamError::from_code(ret).into());
        }
        if ret == 0 {
            if let State::Open(session) = mem::replace(&mut self.state, State::Closed) {
                debug!(id = session.id, "ogg opus stream exhausted");
                self.state = State::Exhausted(session);
            }
            return Ok(None);
        }
        Ok(Some(ret as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::ogg_opus_tone;
    use std::collections::VecDeque;

    /// Replays a fixed list of pulls and counts how often it was asked.
    struct Script {
        steps: VecDeque<Pulled>,
        pulls: Arc<Mutex<usize>>,
    }

    impl Script {
        fn new(steps: Vec<Pulled>) -> (Self, Arc<Mutex<usize>>) {
            let pulls = Arc::new(Mutex::new(0));
            let script = Self {
                steps: steps.into(),
                pulls: Arc::clone(&pulls),
            };
            (script, pulls)
        }
    }

    impl Source for Script {
        fn pull(&mut self, buf: &mut [u8]) -> Pulled {
            *self.pulls.lock() += 1;
            let step = self.steps.pop_front().unwrap_or_else(Pulled::eof);
            buf[..step.len].fill(0x4f);
            step
        }
    }

    fn call(id: usize, buf: &mut [u8]) -> c_int {
        unsafe { read_callback(id as *mut c_void, buf.as_mut_ptr(), buf.len() as c_int) }
    }

    fn with_feed<S: Source + Send + 'static>(source: S, f: impl FnOnce(usize)) {
        let feed = Arc::new(Mutex::new(Feed::new(Box::new(source))));
        let id = FEEDS.next_id();
        let _registered = FEEDS.register(id, feed);
        f(id);
    }

    #[test]
    fn unknown_key_is_a_read_failure() {
        let id = FEEDS.next_id();
        assert_eq!(call(id, &mut [0u8; 16]), -1);
    }

    #[test]
    fn bytes_with_error_come_first() {
        let err = io::Error::other("gone");
        let (script, pulls) = Script::new(vec![Pulled {
            len: 5,
            end: Some(SourceEnd::Failed(err)),
        }]);

        with_feed(script, |id| {
            let mut buf = [0u8; 16];
            assert_eq!(call(id, &mut buf), 5);
            assert_eq!(&buf[..5], &[0x4f; 5]);
            assert_eq!(call(id, &mut buf), -1);
            assert_eq!(call(id, &mut buf), -1);
        });
        assert_eq!(*pulls.lock(), 1);
    }

    #[test]
    fn bytes_with_eof_then_zero() {
        let (script, pulls) = Script::new(vec![Pulled {
            len: 3,
            end: Some(SourceEnd::Eof),
        }]);

        with_feed(script, |id| {
            let mut buf = [0u8; 16];
            assert_eq!(call(id, &mut buf), 3);
            assert_eq!(call(id, &mut buf), 0);
            assert_eq!(call(id, &mut buf), 0);
        });
        assert_eq!(*pulls.lock(), 1);
    }

    #[test]
    fn zero_byte_request_leaves_source_open() {
        with_feed(ReadSource::new(io::repeat(7)), |id| {
            assert_eq!(call(id, &mut []), 0);
            let mut buf = [0u8; 8];
            assert_eq!(call(id, &mut buf), 8);
            assert_eq!(buf, [7; 8]);
        });
    }

    #[test]
    fn empty_pull_without_signal_is_end_of_data() {
        let (script, _) = Script::new(vec![Pulled::bytes(0)]);
        with_feed(script, |id| {
            assert_eq!(call(id, &mut [0u8; 8]), 0);
        });
    }

    #[test]
    fn requests_are_capped_at_scratch_size() {
        struct Greedy;
        impl Source for Greedy {
            fn pull(&mut self, buf: &mut [u8]) -> Pulled {
                Pulled::bytes(buf.len())
            }
        }

        with_feed(Greedy, |id| {
            let mut big = vec![0u8; MAX_ENCODED_FRAME_SIZE * 3];
            assert_eq!(call(id, &mut big), MAX_ENCODED_FRAME_SIZE as c_int);
            assert_eq!(call(id, &mut big[..7]), 7);
        });
    }

    #[test]
    fn panicking_source_is_contained() {
        struct Bomb;
        impl Source for Bomb {
            fn pull(&mut self, _: &mut [u8]) -> Pulled {
                panic!("source blew up");
            }
        }

        with_feed(Bomb, |id| {
            assert_eq!(call(id, &mut [0u8; 8]), -1);
            assert_eq!(call(id, &mut [0u8; 8]), -1);
        });
    }

    #[test]
    fn unopened_stream_rejects_io() {
        let mut stream = Stream::default();
        let err = stream.read(&mut [0i16; 960]).unwrap_err();
        assert_eq!(err.usage(), Some(Usage::StreamNotOpen));
        let err = stream.close().unwrap_err();
        assert_eq!(err.usage(), Some(Usage::StreamNotOpen));
    }

    #[test]
    fn failed_open_is_final() {
        let mut stream = Stream::default();
        let err = stream.init(ReadSource::new(io::empty())).unwrap_err();
        assert!(matches!(err, crate::error::Error::Stream(_)), "{err:?}");

        let err = stream.init(ReadSource::new(io::empty())).unwrap_err();
        assert_eq!(err.usage(), Some(Usage::AlreadyInitialized));
        let err = stream.read_float(&mut [0.0f32; 16]).unwrap_err();
        assert_eq!(err.usage(), Some(Usage::StreamNotOpen));

        let State::Failed(id) = stream.state else {
            panic!("stream is not in the failed state");
        };
        assert!(FEEDS.get(id).is_none());
    }

    #[test]
    fn feed_is_registered_only_during_native_calls() {
        let data = ogg_opus_tone(1, 4);
        let mut stream = Stream::new(ReadSource::new(io::Cursor::new(data))).unwrap();
        let id = match &stream.state {
            State::Open(session) => session.id,
            _ => panic!("stream did not open"),
        };
        assert!(FEEDS.get(id).is_none());

        let mut pcm = [0i16; 960];
        assert!(stream.read(&mut pcm).unwrap().is_some());
        assert!(FEEDS.get(id).is_none());

        while stream.read(&mut pcm).unwrap().is_some() {}
        assert!(FEEDS.get(id).is_none());
        stream.close().unwrap();
    }
}
