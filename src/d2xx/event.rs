//! The per-handle RX event.
//!
//! The vendor driver signals a host-OS event object whenever at least
//! one byte lands in a device's receive queue. On Windows that object
//! is a kernel event from `CreateEventW`; the Unix builds of the
//! vendor library instead expect a pointer to its `EVENT_HANDLE`
//! struct (a pthread condition variable, mutex and flag) and signal
//! the condition variable. Both are "a wait-one handle that fires
//! when data is queued", which is all the backend needs.

use std::ffi::c_void;
use std::fmt;

/// A wait-one handle the vendor driver signals on RX data arrival.
pub trait RxEvent: fmt::Debug {
    /// Waits up to `timeout_ms` for a signal. A signal delivered while
    /// nobody is waiting is lost; callers poll on a short timeout.
    fn wait(&self, timeout_ms: u32) -> bool;

    /// The value handed to `FT_SetEventNotification`.
    fn as_raw(&self) -> *mut c_void;
}

#[cfg(windows)]
type CreateEventWFn = unsafe extern "system" fn(
    *mut c_void,
    i32,
    i32,
    *const u16,
) -> *mut c_void;
#[cfg(windows)]
type WaitForSingleObjectFn =
    unsafe extern "system" fn(*mut c_void, u32) -> u32;
#[cfg(windows)]
type CloseHandleFn = unsafe extern "system" fn(*mut c_void) -> i32;

#[cfg(windows)]
const WAIT_OBJECT_0: u32 = 0;

/// The event entry points of `kernel32.dll`, loaded alongside the
/// vendor library.
#[cfg(windows)]
pub struct Kernel32 {
    create_event_w: CreateEventWFn,
    wait_for_single_object: WaitForSingleObjectFn,
    close_handle: CloseHandleFn,
    _lib: libloading::Library,
}

#[cfg(windows)]
impl fmt::Debug for Kernel32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel32").finish_non_exhaustive()
    }
}

#[cfg(windows)]
impl Kernel32 {
    pub fn load() -> Result<Self, libloading::Error> {
        // SAFETY: kernel32 is already mapped into every Win32 process;
        // the signatures are from the Win32 API reference
        unsafe {
            let lib = libloading::Library::new("kernel32.dll")?;
            let create_event_w = *lib.get(b"CreateEventW\0")?;
            let wait_for_single_object =
                *lib.get(b"WaitForSingleObject\0")?;
            let close_handle = *lib.get(b"CloseHandle\0")?;
            Ok(Self {
                create_event_w,
                wait_for_single_object,
                close_handle,
                _lib: lib,
            })
        }
    }

    /// Creates an auto-reset, initially unsignaled event.
    pub fn create_rx_event(&self) -> WindowsRxEvent {
        // SAFETY: all-null arguments request an anonymous auto-reset
        // event; a null result leaves every later wait unsignaled
        let handle = unsafe {
            (self.create_event_w)(
                std::ptr::null_mut(),
                0,
                0,
                std::ptr::null(),
            )
        };
        WindowsRxEvent {
            handle,
            wait: self.wait_for_single_object,
            close: self.close_handle,
        }
    }
}

#[cfg(windows)]
pub struct WindowsRxEvent {
    handle: *mut c_void,
    wait: WaitForSingleObjectFn,
    close: CloseHandleFn,
}

#[cfg(windows)]
impl RxEvent for WindowsRxEvent {
    fn wait(&self, timeout_ms: u32) -> bool {
        if self.handle.is_null() {
            return false;
        }
        // SAFETY: handle came from CreateEventW and is closed only in drop
        unsafe { (self.wait)(self.handle, timeout_ms) == WAIT_OBJECT_0 }
    }

    fn as_raw(&self) -> *mut c_void {
        self.handle
    }
}

#[cfg(windows)]
impl Drop for WindowsRxEvent {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            // SAFETY: last use of the handle
            unsafe {
                (self.close)(self.handle);
            }
        }
    }
}

#[cfg(windows)]
impl fmt::Debug for WindowsRxEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WindowsRxEvent({:p})", self.handle)
    }
}

/// Layout of `EVENT_HANDLE` from the Unix `ftd2xx.h`.
#[cfg(unix)]
#[repr(C)]
#[allow(non_snake_case, dead_code)] // iVar is driver-side state
struct EventHandle {
    eCondVar: libc::pthread_cond_t,
    eMutex: libc::pthread_mutex_t,
    iVar: libc::c_int,
}

#[cfg(unix)]
pub struct PosixRxEvent {
    // Boxed: the driver holds the address for the life of the handle
    inner: Box<std::cell::UnsafeCell<EventHandle>>,
}

#[cfg(unix)]
impl PosixRxEvent {
    pub fn new() -> Self {
        Self {
            inner: Box::new(std::cell::UnsafeCell::new(EventHandle {
                eCondVar: libc::PTHREAD_COND_INITIALIZER,
                eMutex: libc::PTHREAD_MUTEX_INITIALIZER,
                iVar: 0,
            })),
        }
    }
}

#[cfg(unix)]
impl Default for PosixRxEvent {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
impl RxEvent for PosixRxEvent {
    fn wait(&self, timeout_ms: u32) -> bool {
        let eh = self.inner.get();
        // SAFETY: statically initialized pthread primitives at a
        // stable address; the driver only signals, never re-locks
        // across our wait
        unsafe {
            libc::pthread_mutex_lock(&mut (*eh).eMutex);
            let mut ts: libc::timespec = std::mem::zeroed();
            libc::clock_gettime(libc::CLOCK_REALTIME, &mut ts);
            ts.tv_sec += (timeout_ms / 1000) as libc::time_t;
            ts.tv_nsec += ((timeout_ms % 1000) * 1_000_000) as libc::c_long;
            if ts.tv_nsec >= 1_000_000_000 {
                ts.tv_sec += 1;
                ts.tv_nsec -= 1_000_000_000;
            }
            let rc = libc::pthread_cond_timedwait(
                &mut (*eh).eCondVar,
                &mut (*eh).eMutex,
                &ts,
            );
            libc::pthread_mutex_unlock(&mut (*eh).eMutex);
            rc == 0
        }
    }

    fn as_raw(&self) -> *mut c_void {
        self.inner.get() as *mut c_void
    }
}

#[cfg(unix)]
impl fmt::Debug for PosixRxEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PosixRxEvent({:p})", self.inner.get())
    }
}
