//! Windows low-level hooks and `SendInput` injection.
//!
//! [`WindowsHookPlatform`] owns a dedicated Win32 message-loop thread running
//! at `THREAD_PRIORITY_TIME_CRITICAL`.  `WH_KEYBOARD_LL` / `WH_MOUSE_LL` hooks
//! are installed on that thread, because the OS calls a low-level hook on the
//! thread that installed it and only while that thread pumps messages.
//!
//! Install requests from other threads are queued and the loop is woken with
//! a thread message.  An install requested from inside a hook callback runs
//! inline, since the loop thread is busy running that callback.
//!
//! Each hook procedure copies the `KBDLLHOOKSTRUCT` / `MSLLHOOKSTRUCT` into a
//! [`RawHookEvent`] and hands it to the callback registered for its device.
//! The original `wParam`/`lParam` are kept in a thread-local for the duration
//! of the callback so [`HookPlatform::call_next`] can pass the real invocation
//! on with `CallNextHookEx`.
//!
//! # Safety
//!
//! This module uses `unsafe` code exclusively for Windows API FFI calls.
//! All `unsafe` blocks are annotated with `// SAFETY:` comments.

#![cfg(target_os = "windows")]

use std::cell::Cell;
use std::ffi::c_void;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use inputgate_core::{
    DeviceClass, KeyCode, KeyPhase, KeyboardPayload, MouseButton, Point, PointerPayload, RawHookEvent, RawPayload,
};
use tracing::{debug, warn};
use windows::Win32::Foundation::{HINSTANCE, LPARAM, LRESULT, POINT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Threading::{
    GetCurrentThread, GetCurrentThreadId, SetThreadPriority, THREAD_PRIORITY_TIME_CRITICAL,
};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT, KEYBD_EVENT_FLAGS, KEYEVENTF_EXTENDEDKEY,
    KEYEVENTF_KEYUP, MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MIDDLEDOWN, MOUSEEVENTF_MIDDLEUP,
    MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP, MOUSEEVENTF_XDOWN, MOUSEEVENTF_XUP, MOUSEINPUT, MOUSE_EVENT_FLAGS,
    VIRTUAL_KEY,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetCursorPos, GetMessageW, PeekMessageW, PostThreadMessageW, SetCursorPos,
    SetWindowsHookExW, UnhookWindowsHookEx, HHOOK, KBDLLHOOKSTRUCT, MSG, MSLLHOOKSTRUCT, PM_NOREMOVE,
    WH_KEYBOARD_LL, WH_MOUSE_LL, WINDOWS_HOOK_ID, WM_APP, WM_QUIT,
};

use crate::application::{
    HookCallback, HookError, HookHandle, HookPlatform, InjectError, KeyInjector, PointerControl, PointerError,
};

/// Wakes the loop thread to drain pending install requests.
const WM_INSTALL_REQUEST: u32 = WM_APP + 1;

/// How long a caller waits for the loop thread to install a hook.
const INSTALL_TIMEOUT: Duration = Duration::from_secs(5);

const XBUTTON1: u32 = 0x0001;
const XBUTTON2: u32 = 0x0002;

type HookProc = unsafe extern "system" fn(i32, WPARAM, LPARAM) -> LRESULT;

/// Callbacks of the currently installed hooks.  The hook procedures are plain
/// `extern "system"` functions, so they can only reach them through statics.
static KEYBOARD_CALLBACK: Mutex<Option<HookCallback>> = Mutex::new(None);
static POINTER_CALLBACK: Mutex<Option<HookCallback>> = Mutex::new(None);

/// The hook invocation currently being processed on this thread.
#[derive(Clone, Copy)]
struct Invocation {
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
}

thread_local! {
    static CURRENT: Cell<Option<Invocation>> = const { Cell::new(None) };
}

struct InstallRequest {
    device: DeviceClass,
    reply: Sender<Result<HookHandle, HookError>>,
}

/// [`HookPlatform`] backed by `SetWindowsHookExW`.
///
/// Hook callbacks are stored process-wide, so a process should create at
/// most one of these.
pub struct WindowsHookPlatform {
    thread_id: u32,
    requests: Sender<InstallRequest>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl WindowsHookPlatform {
    /// Starts the hook message-loop thread.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::UnsupportedPlatform`] if the thread cannot be
    /// started.
    pub fn new() -> Result<Self, HookError> {
        let (requests, pending) = mpsc::channel::<InstallRequest>();
        let (ready_tx, ready_rx) = mpsc::channel::<u32>();

        let worker = thread::Builder::new()
            .name("inputgate-hook-loop".to_string())
            .spawn(move || run_hook_loop(pending, ready_tx))
            .map_err(|e| HookError::UnsupportedPlatform(format!("cannot start hook thread: {e}")))?;

        let thread_id = ready_rx
            .recv()
            .map_err(|_| HookError::UnsupportedPlatform("hook thread exited during startup".to_string()))?;
        debug!(thread_id, "hook message loop started");

        Ok(Self {
            thread_id,
            requests,
            worker: Mutex::new(Some(worker)),
        })
    }

    fn request_install(&self, device: DeviceClass) -> Result<HookHandle, HookError> {
        let failed = |reason: String| HookError::InstallFailed { device, reason };

        let (reply, response) = mpsc::channel();
        self.requests
            .send(InstallRequest { device, reply })
            .map_err(|_| failed("hook thread has exited".to_string()))?;

        // SAFETY: posting a thread message has no memory-safety preconditions.
        unsafe { PostThreadMessageW(self.thread_id, WM_INSTALL_REQUEST, WPARAM(0), LPARAM(0)) }
            .map_err(|e| failed(e.to_string()))?;

        response
            .recv_timeout(INSTALL_TIMEOUT)
            .map_err(|_| failed("hook thread did not respond".to_string()))?
    }

    fn on_hook_thread(&self) -> bool {
        // SAFETY: GetCurrentThreadId is always safe to call.
        unsafe { GetCurrentThreadId() == self.thread_id }
    }
}

impl HookPlatform for WindowsHookPlatform {
    fn install(&self, device: DeviceClass, callback: HookCallback) -> Result<HookHandle, HookError> {
        *lock(slot(device)) = Some(callback);

        let result = if self.on_hook_thread() {
            set_hook(device)
        } else {
            self.request_install(device)
        };
        if result.is_err() {
            *lock(slot(device)) = None;
        }
        result
    }

    fn uninstall(&self, device: DeviceClass, handle: HookHandle) -> Result<(), HookError> {
        // SAFETY: the handle was returned by SetWindowsHookExW in set_hook.
        let result = unsafe { UnhookWindowsHookEx(HHOOK(handle.as_raw() as *mut c_void)) };
        *lock(slot(device)) = None;
        result.map_err(|e| HookError::UninstallFailed {
            device,
            reason: e.to_string(),
        })
    }

    fn call_next(&self, _handle: Option<HookHandle>, _raw: &RawHookEvent) -> isize {
        match CURRENT.with(Cell::get) {
            // SAFETY: the parameters are those of the hook invocation still
            // running on this thread.
            Some(inv) => unsafe { CallNextHookEx(None, inv.n_code, inv.w_param, inv.l_param).0 },
            None => 0,
        }
    }
}

impl Drop for WindowsHookPlatform {
    fn drop(&mut self) {
        // SAFETY: posting a thread message has no memory-safety preconditions.
        if let Err(e) = unsafe { PostThreadMessageW(self.thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) } {
            warn!(error = %e, "failed to stop hook message loop");
            return;
        }
        if self.on_hook_thread() {
            return;
        }
        if let Some(worker) = lock(&self.worker).take() {
            let _ = worker.join();
        }
    }
}

fn slot(device: DeviceClass) -> &'static Mutex<Option<HookCallback>> {
    match device {
        DeviceClass::Keyboard => &KEYBOARD_CALLBACK,
        DeviceClass::Pointer => &POINTER_CALLBACK,
    }
}

/// Installs the hook for `device` on the calling thread.
fn set_hook(device: DeviceClass) -> Result<HookHandle, HookError> {
    let (id, proc): (WINDOWS_HOOK_ID, HookProc) = match device {
        DeviceClass::Keyboard => (WH_KEYBOARD_LL, keyboard_hook_proc),
        DeviceClass::Pointer => (WH_MOUSE_LL, pointer_hook_proc),
    };

    // SAFETY: querying the handle of the running executable has no
    // preconditions.
    let module = unsafe { GetModuleHandleW(None) }.ok().map(HINSTANCE::from);

    // SAFETY: proc is a valid hook procedure for this hook type and lives
    // for the whole process.
    unsafe { SetWindowsHookExW(id, Some(proc), module, 0) }
        .map(|hook| HookHandle::from_raw(hook.0 as usize))
        .map_err(|e| HookError::InstallFailed {
            device,
            reason: e.to_string(),
        })
}

/// Entry point for the dedicated Win32 message loop thread.
fn run_hook_loop(pending: Receiver<InstallRequest>, ready: Sender<u32>) {
    let mut msg = MSG::default();

    // SAFETY: plain Win32 calls on the current thread.  PeekMessageW creates
    // the message queue so that PostThreadMessageW cannot race it.
    let thread_id = unsafe {
        if let Err(e) = SetThreadPriority(GetCurrentThread(), THREAD_PRIORITY_TIME_CRITICAL) {
            warn!(error = %e, "could not raise hook thread priority");
        }
        let _ = PeekMessageW(&mut msg, None, 0, 0, PM_NOREMOVE);
        GetCurrentThreadId()
    };
    if ready.send(thread_id).is_err() {
        return;
    }

    // Win32 message loop – blocks until WM_QUIT is posted
    loop {
        // SAFETY: standard GetMessage loop; msg is a valid out pointer.
        let status = unsafe { GetMessageW(&mut msg, None, 0, 0) };
        if status.0 <= 0 {
            break;
        }
        if msg.message == WM_INSTALL_REQUEST {
            while let Ok(request) = pending.try_recv() {
                let _ = request.reply.send(set_hook(request.device));
            }
            continue;
        }
        // SAFETY: msg was filled in by GetMessageW.
        unsafe {
            DispatchMessageW(&msg);
        }
    }
    debug!("hook message loop exited");
}

/// Runs the registered callback with the invocation recorded for call_next.
fn invoke(device: DeviceClass, raw: &RawHookEvent, n_code: i32, w_param: WPARAM, l_param: LPARAM) -> LRESULT {
    let callback = lock(slot(device)).clone();
    let Some(callback) = callback else {
        // SAFETY: forwarding the unmodified invocation.
        return unsafe { CallNextHookEx(None, n_code, w_param, l_param) };
    };

    let previous = CURRENT.with(|c| {
        c.replace(Some(Invocation {
            n_code,
            w_param,
            l_param,
        }))
    });
    let result = callback(raw);
    CURRENT.with(|c| c.set(previous));
    LRESULT(result)
}

/// Low-level keyboard hook callback.
///
/// # Safety
///
/// Called by Windows from the hook message loop thread. It must return
/// quickly or the OS removes the hook.
unsafe extern "system" fn keyboard_hook_proc(n_code: i32, w_param: WPARAM, l_param: LPARAM) -> LRESULT {
    if n_code < 0 {
        // SAFETY: Must call CallNextHookEx when n_code < 0.
        return CallNextHookEx(None, n_code, w_param, l_param);
    }

    // SAFETY: l_param points to a KBDLLHOOKSTRUCT when n_code >= 0.
    let kbs = &*(l_param.0 as *const KBDLLHOOKSTRUCT);
    let raw = RawHookEvent {
        code: n_code,
        message: w_param.0 as u32,
        payload: RawPayload::Keyboard(KeyboardPayload {
            vk_code: kbs.vkCode,
            scan_code: kbs.scanCode,
            flags: kbs.flags.0,
            time: kbs.time,
        }),
    };
    invoke(DeviceClass::Keyboard, &raw, n_code, w_param, l_param)
}

/// Low-level mouse hook callback.
///
/// # Safety
///
/// Called by Windows from the hook message loop thread; must return quickly.
unsafe extern "system" fn pointer_hook_proc(n_code: i32, w_param: WPARAM, l_param: LPARAM) -> LRESULT {
    if n_code < 0 {
        // SAFETY: Must call CallNextHookEx when n_code < 0.
        return CallNextHookEx(None, n_code, w_param, l_param);
    }

    // SAFETY: l_param points to a MSLLHOOKSTRUCT when n_code >= 0.
    let mhs = &*(l_param.0 as *const MSLLHOOKSTRUCT);
    let raw = RawHookEvent {
        code: n_code,
        message: w_param.0 as u32,
        payload: RawPayload::Pointer(PointerPayload {
            x: mhs.pt.x,
            y: mhs.pt.y,
            mouse_data: mhs.mouseData,
            flags: mhs.flags,
            time: mhs.time,
        }),
    };
    invoke(DeviceClass::Pointer, &raw, n_code, w_param, l_param)
}

// ── Injection ─────────────────────────────────────────────────────────────────

/// [`KeyInjector`] using `SendInput`.  Injected keys pass through the
/// installed keyboard hook flagged as injected.
#[derive(Debug, Default)]
pub struct WindowsKeyInjector;

impl WindowsKeyInjector {
    pub fn new() -> Self {
        Self
    }
}

impl KeyInjector for WindowsKeyInjector {
    fn inject(&self, key: KeyCode, phase: KeyPhase) -> Result<(), InjectError> {
        let mut flags = KEYBD_EVENT_FLAGS(0);
        if phase == KeyPhase::Up {
            flags |= KEYEVENTF_KEYUP;
        }
        if is_extended(key) {
            flags |= KEYEVENTF_EXTENDEDKEY;
        }

        let input = INPUT {
            r#type: INPUT_KEYBOARD,
            Anonymous: INPUT_0 {
                ki: KEYBDINPUT {
                    wVk: VIRTUAL_KEY(u16::from(key.vk())),
                    wScan: 0,
                    dwFlags: flags,
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        };
        send(&[input]).map_err(InjectError::Platform)
    }
}

/// Keys that need `KEYEVENTF_EXTENDEDKEY` to be told apart from their
/// numpad twins.
fn is_extended(key: KeyCode) -> bool {
    matches!(
        key,
        KeyCode::PAGE_UP
            | KeyCode::PAGE_DOWN
            | KeyCode::END
            | KeyCode::HOME
            | KeyCode::LEFT
            | KeyCode::UP
            | KeyCode::RIGHT
            | KeyCode::DOWN
            | KeyCode::INSERT
            | KeyCode::DELETE
            | KeyCode::LEFT_WIN
            | KeyCode::RIGHT_WIN
            | KeyCode::RIGHT_CONTROL
            | KeyCode::RIGHT_ALT
    )
}

/// [`PointerControl`] using `GetCursorPos`, `SetCursorPos` and `SendInput`.
#[derive(Debug, Default)]
pub struct WindowsPointerControl;

impl WindowsPointerControl {
    pub fn new() -> Self {
        Self
    }
}

impl PointerControl for WindowsPointerControl {
    fn position(&self) -> Result<Point, PointerError> {
        let mut pt = POINT::default();
        // SAFETY: pt is a valid out pointer.
        unsafe { GetCursorPos(&mut pt) }.map_err(|e| PointerError::Platform(e.to_string()))?;
        Ok(Point::new(pt.x, pt.y))
    }

    fn set_position(&self, point: Point) -> Result<(), PointerError> {
        // SAFETY: SetCursorPos has no memory-safety preconditions.
        unsafe { SetCursorPos(point.x, point.y) }.map_err(|e| PointerError::Platform(e.to_string()))
    }

    fn click(&self, button: MouseButton) -> Result<(), PointerError> {
        let (down, up, data) = match button {
            MouseButton::Left => (MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP, 0),
            MouseButton::Right => (MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP, 0),
            MouseButton::Middle => (MOUSEEVENTF_MIDDLEDOWN, MOUSEEVENTF_MIDDLEUP, 0),
            MouseButton::X1 => (MOUSEEVENTF_XDOWN, MOUSEEVENTF_XUP, XBUTTON1),
            MouseButton::X2 => (MOUSEEVENTF_XDOWN, MOUSEEVENTF_XUP, XBUTTON2),
        };
        send(&[mouse_input(down, data), mouse_input(up, data)]).map_err(PointerError::Platform)
    }
}

fn mouse_input(flags: MOUSE_EVENT_FLAGS, mouse_data: u32) -> INPUT {
    INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx: 0,
                dy: 0,
                mouseData: mouse_data,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

/// Sends `inputs` as one uninterrupted batch.
fn send(inputs: &[INPUT]) -> Result<(), String> {
    // SAFETY: inputs are fully initialised INPUT structures.
    let sent = unsafe { SendInput(inputs, std::mem::size_of::<INPUT>() as i32) };
    if sent as usize == inputs.len() {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error().to_string())
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
