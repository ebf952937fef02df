//! The Lookup ABI (§4.H, §6): a C entry point an external packet
//! processor links against.
//!
//! `lb_coordinator_new` hands the caller a real boxed pointer (no
//! process-wide global holds the only reference). But `lb_lookup`'s own
//! signature carries no handle parameter, so the coordinator a lookup
//! resolves against still has to live somewhere `lb_lookup` can reach
//! without one — an `Arc` clone sits in a single process-lifetime slot
//! that `lb_coordinator_new` installs and `lb_coordinator_free` clears.
//! The caller's boxed pointer and that slot each hold independent `Arc`
//! references to the same [`Handle`]; freeing the caller's pointer drops
//! only the caller's reference, while `lb_coordinator_free` is what
//! actually retires the coordinator from the lookup path.

use std::ffi::c_void;
use std::ptr;
use std::slice;
use std::sync::Arc;

use parking_lot::Mutex;

struct Handle {
    _runtime: tokio::runtime::Runtime,
    worker: Mutex<lb_core::Worker>,
}

static ACTIVE: Mutex<Option<Arc<Handle>>> = Mutex::new(None);

/// Parses `config_json` (a buffer of `config_len` UTF-8 bytes) and installs
/// it as the running configuration, replacing any previous one. Returns a
/// boxed handle pointer on success, or null on any parse/address/primality
/// failure — address/primality failures still panic the process per §7's
/// programmer-error policy; only a malformed/garbled buffer returns null.
///
/// # Safety
///
/// `config_json` must point to at least `config_len` readable bytes. The
/// returned pointer must eventually be passed to [`lb_coordinator_free`]
/// exactly once, and not used after that call.
#[no_mangle]
pub unsafe extern "C" fn lb_coordinator_new(config_json: *const u8, config_len: u32) -> *mut c_void {
    if config_json.is_null() {
        return ptr::null_mut();
    }
    let bytes = unsafe { slice::from_raw_parts(config_json, config_len as usize) };
    let Ok(text) = std::str::from_utf8(bytes) else {
        return ptr::null_mut();
    };
    let Ok(cfg) = lb_config::parse(text) else {
        return ptr::null_mut();
    };

    let Ok(runtime) = tokio::runtime::Runtime::new() else {
        return ptr::null_mut();
    };

    let system = lb_core::System::new();
    {
        let _guard = runtime.enter();
        if system.reconfig(&cfg).is_err() {
            return ptr::null_mut();
        }
    }
    let worker = Mutex::new(system.spawn_worker());
    let handle = Arc::new(Handle { _runtime: runtime, worker });

    *ACTIVE.lock() = Some(Arc::clone(&handle));
    Box::into_raw(Box::new(handle)).cast::<c_void>()
}

/// Retires the coordinator `handle` points at: drops the caller's `Arc`
/// reference and, if it is still the active coordinator, clears the slot
/// `lb_lookup` reads from, shutting down every health-check task once the
/// last reference drops.
///
/// # Safety
///
/// `handle` must be a pointer previously returned by
/// [`lb_coordinator_new`], not yet freed.
#[no_mangle]
pub unsafe extern "C" fn lb_coordinator_free(handle: *mut c_void) {
    if handle.is_null() {
        return;
    }
    let boxed = unsafe { Box::from_raw(handle.cast::<Arc<Handle>>()) };
    let mut active = ACTIVE.lock();
    if let Some(current) = active.as_ref() {
        if Arc::ptr_eq(current, &boxed) {
            *active = None;
        }
    }
    drop(boxed);
}

/// Looks up the backend for a 5-tuple and copies its IP into `out`.
/// Returns the number of bytes written, or `-1` if there is no running
/// coordinator, the addresses are malformed, or no backend is available.
///
/// # Safety
///
/// `src_ip`/`dst_ip` must point to at least `src_ip_len`/`dst_ip_len`
/// readable bytes; `out` must point to at least `out_len` writable bytes.
#[allow(clippy::too_many_arguments)]
#[no_mangle]
pub unsafe extern "C" fn lb_lookup(
    src_ip: *const u8,
    src_ip_len: u8,
    dst_ip: *const u8,
    dst_ip_len: u8,
    src_port: u16,
    dst_port: u16,
    proto: u16,
    out: *mut u8,
    out_len: u32,
) -> i32 {
    if src_ip.is_null() || dst_ip.is_null() || out.is_null() {
        return -1;
    }
    let family = match (src_ip_len, dst_ip_len) {
        (4, 4) => lb_core::AddressFamily::Ipv4,
        (16, 16) => lb_core::AddressFamily::Ipv6,
        _ => return -1,
    };

    let src = unsafe { slice::from_raw_parts(src_ip, src_ip_len as usize) };
    let dst = unsafe { slice::from_raw_parts(dst_ip, dst_ip_len as usize) };
    let tuple = lb_core::FiveTuple::new(family, src, dst, src_port, dst_port, proto);

    let guard = ACTIVE.lock();
    let Some(handle) = guard.as_ref() else {
        return -1;
    };
    let mut worker = handle.worker.lock();
    let Some(backend) = worker.lookup(&tuple) else {
        return -1;
    };

    if backend.ip.len() > out_len as usize {
        return -1;
    }
    let out_slice = unsafe { slice::from_raw_parts_mut(out, backend.ip.len()) };
    out_slice.copy_from_slice(&backend.ip);
    backend.ip.len() as i32
}
