#![cfg(feature = "stream")]

use std::cell::Cell;
use std::io::{Read, Result as IoResult};

use opusbind::{Pulled, Source, Stream};

/// Ensures the stream accepts `Send` sources that are not `Sync`.
///
/// This matters for truly streaming sources (like HTTP request bodies) that are moved into a
/// dedicated decode thread and are never accessed concurrently.
#[test]
fn stream_accepts_send_non_sync_readers() {
    struct NotSyncReader {
        inner: std::io::Cursor<Vec<u8>>,
        _marker: Cell<u8>,
    }

    impl Read for NotSyncReader {
        fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
            self.inner.read(buf)
        }
    }

    let reader = NotSyncReader {
        inner: std::io::Cursor::new(Vec::new()),
        _marker: Cell::new(0),
    };

    // Opening fails on empty input; the point of this test is that it compiles and runs without
    // requiring `R: Sync`.
    let res = Stream::from_reader(reader);
    assert!(res.is_err());
}

#[test]
fn stream_accepts_send_non_sync_sources() {
    struct NotSyncSource {
        pulls: Cell<usize>,
    }

    impl Source for NotSyncSource {
        fn pull(&mut self, _buf: &mut [u8]) -> Pulled {
            self.pulls.set(self.pulls.get() + 1);
            Pulled::eof()
        }
    }

    let res = std::thread::spawn(|| Stream::new(NotSyncSource { pulls: Cell::new(0) }).is_err())
        .join()
        .unwrap();
    assert!(res);
}
