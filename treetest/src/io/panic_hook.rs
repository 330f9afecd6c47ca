//! Panic capture for test bodies.
//!
//! A process-wide hook is installed once. While the current thread is inside
//! `catching`, the hook records the panic location and backtrace for the engine
//! instead of printing; otherwise it defers to the previously installed hook.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::panic;
use std::sync::Once;

/// Location and stack of the most recent panic caught on this thread.
#[derive(Debug)]
pub struct PanicRecord {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub backtrace: Backtrace,
}

thread_local! {
    static CAPTURING: Cell<bool> = const { Cell::new(false) };
    static LAST_PANIC: RefCell<Option<PanicRecord>> = const { RefCell::new(None) };
}

static INSTALL: Once = Once::new();

fn install() {
    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if !CAPTURING.with(Cell::get) {
                previous(info);
                return;
            }
            let record = info.location().map(|location| PanicRecord {
                file: location.file().to_string(),
                line: location.line(),
                column: location.column(),
                backtrace: Backtrace::force_capture(),
            });
            LAST_PANIC.with(|slot| *slot.borrow_mut() = record);
        }));
    });
}

/// Run `f` with panic capture enabled on this thread.
pub fn catching<T>(f: impl FnOnce() -> T) -> T {
    install();
    LAST_PANIC.with(|slot| slot.borrow_mut().take());
    let was_capturing = CAPTURING.with(|flag| flag.replace(true));
    let _reset = ResetCapture(was_capturing);
    f()
}

struct ResetCapture(bool);

impl Drop for ResetCapture {
    fn drop(&mut self) {
        CAPTURING.with(|flag| flag.set(self.0));
    }
}

/// Take the record left by the last captured panic, if any.
pub fn take_last() -> Option<PanicRecord> {
    LAST_PANIC.with(|slot| slot.borrow_mut().take())
}

/// Render a panic payload as text.
pub fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
