//! Panic hook that routes panics into the run log.
//!
//! Panics on conversion workers are caught and turned into fallback
//! outcomes, so for those threads the hook only logs. Anywhere else the
//! previous hook still runs and the panic reaches the console.

use crate::conversion::WORKER_THREAD_PREFIX;
use std::panic::PanicHookInfo;

pub fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let thread = std::thread::current();
        let name = thread.name().unwrap_or("<unnamed>");
        tracing::error!(
            thread = name,
            location = %location(info),
            message = %payload(info),
            "panic"
        );
        if !name.starts_with(WORKER_THREAD_PREFIX) {
            previous(info);
        }
    }));
}

fn location(info: &PanicHookInfo<'_>) -> String {
    info.location()
        .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
        .unwrap_or_else(|| "unknown".to_string())
}

fn payload(info: &PanicHookInfo<'_>) -> String {
    if let Some(s) = info.payload().downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = info.payload().downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}
