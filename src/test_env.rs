// Environment variables are process global: tests that touch them take a lock

use std::{
    env,
    ffi::OsString,
    panic::{self, AssertUnwindSafe},
    sync::{Mutex, PoisonError},
};

lazy_static! {
    static ref ENV_LOCK: Mutex<()> = Mutex::new(());
}

fn apply(key: &str, value: Option<impl AsRef<std::ffi::OsStr>>) {
    match value {
        Some(value) => env::set_var(key, value),
        None => env::remove_var(key),
    }
}

/// Runs `f` with `vars` set (`None` unsets), then puts the old values back,
/// also when `f` panics.
pub(crate) fn with_env<F: FnOnce()>(vars: &[(&str, Option<&str>)], f: F) {
    let _lock = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);

    let previous: Vec<(&str, Option<OsString>)> =
        vars.iter().map(|(key, _)| (*key, env::var_os(key))).collect();
    for (key, value) in vars {
        apply(key, *value);
    }

    let outcome = panic::catch_unwind(AssertUnwindSafe(f));

    for (key, value) in previous {
        apply(key, value);
    }
    if let Err(payload) = outcome {
        panic::resume_unwind(payload);
    }
}
