// src/ffi.rs

//! Raw libopusfile declarations, only what the stream needs.
//!
//! Layouts follow `opusfile.h`. Linking is set up by `build.rs`.

#![allow(non_camel_case_types)]

use std::os::raw::{c_int, c_uchar, c_void};

/// Opaque decoder handle.
#[repr(C)]
pub struct OggOpusFile {
    _private: [u8; 0],
}

pub type op_read_func =
    unsafe extern "C" fn(stream: *mut c_void, ptr: *mut c_uchar, nbytes: c_int) -> c_int;
pub type op_seek_func =
    unsafe extern "C" fn(stream: *mut c_void, offset: i64, whence: c_int) -> c_int;
pub type op_tell_func = unsafe extern "C" fn(stream: *mut c_void) -> i64;
pub type op_close_func = unsafe extern "C" fn(stream: *mut c_void) -> c_int;

/// Callback table for `op_open_callbacks`. `None` seek/tell marks the stream unseekable.
#[repr(C)]
pub struct OpusFileCallbacks {
    pub read: Option<op_read_func>,
    pub seek: Option<op_seek_func>,
    pub tell: Option<op_tell_func>,
    pub close: Option<op_close_func>,
}

unsafe extern "C" {
    pub fn op_open_callbacks(
        stream: *mut c_void,
        cb: *const OpusFileCallbacks,
        initial_data: *const c_uchar,
        initial_bytes: usize,
        error: *mut c_int,
    ) -> *mut OggOpusFile;

    pub fn op_free(of: *mut OggOpusFile);

    /// Returns samples per channel, `0` at end of stream, or a negative `OP_*` code.
    pub fn op_read(
        of: *mut OggOpusFile,
        pcm: *mut i16,
        buf_size: c_int,
        li: *mut c_int,
    ) -> c_int;

    pub fn op_read_float(
        of: *mut OggOpusFile,
        pcm: *mut f32,
        buf_size: c_int,
        li: *mut c_int,
    ) -> c_int;
}
