use triage_protocol::StackFrame;

const PLACEHOLDER_FUNCTIONS: &[&str] = &["[Runtime]", "[ManagedMethod]"];
const PLACEHOLDER_PREFIXES: &[&str] = &["[JIT Code @", "[Native Code @"];

// Matched against the lowercased function text. Order is precedence.
const MONITOR_MARKERS: &[&str] = &[
    "monitor.wait",
    "monitor.enter",
    "monitor.reliableenter",
    "monitor.tryenter",
    "awarelock",
    "syncblock",
    "objectnative::wait",
];
const WAIT_HANDLE_MARKERS: &[&str] = &[
    "waithandle",
    "waitone",
    "waitany",
    "waitall",
    "waitforsingleobject",
    "waitformultipleobjects",
    "resetevent",
    "ntwaitfor",
    "eventwait",
];
const SLEEP_MARKERS: &[&str] = &["sleep", "sleepex", "delayexecution"];
const JOIN_MARKERS: &[&str] = &["thread.join", "pthread_join", "threadjoin"];
const NATIVE_BLOCKING_MARKERS: &[&str] = &[
    "futex",
    "pthread_cond_",
    "pthread_mutex_lock",
    "pthread_rwlock_",
    "lll_lock",
    "epoll_wait",
    "__poll",
    "sys_poll",
    "sem_wait",
    "semop",
    "__select",
    "nanosleep_nocancel",
    "read_nocancel",
    "recvmsg",
    "accept4",
];

pub const WAIT_KIND_MONITOR: &str = "monitor";
pub const WAIT_KIND_WAIT_HANDLE: &str = "wait-handle";
pub const WAIT_KIND_SLEEP: &str = "sleep";
pub const WAIT_KIND_JOIN: &str = "join";
pub const WAIT_KIND_NATIVE_SYSCALL: &str = "native-syscall";
pub const WAIT_KIND_WAIT: &str = "wait";

/// False for synthetic glue frames the engine inserts where it has no real
/// function name.
pub fn is_meaningful(frame: &StackFrame) -> bool {
    let function = frame.function_text().trim();
    if function.is_empty() {
        return false;
    }
    if PLACEHOLDER_FUNCTIONS.contains(&function) {
        return false;
    }
    !PLACEHOLDER_PREFIXES
        .iter()
        .any(|prefix| function.starts_with(prefix))
}

/// First meaningful frame of the stack, as `(index, frame)`.
pub fn first_meaningful(stack: &[StackFrame]) -> Option<(usize, &StackFrame)> {
    stack.iter().enumerate().find(|(_, f)| is_meaningful(f))
}

/// Classifies what kind of blocking point a frame represents, if any.
pub fn wait_kind(frame: &StackFrame) -> Option<&'static str> {
    let function = frame.function_text().to_lowercase();
    if function.is_empty() {
        return None;
    }
    let hit = |markers: &[&str]| markers.iter().any(|m| function.contains(m));

    if hit(MONITOR_MARKERS) {
        return Some(WAIT_KIND_MONITOR);
    }
    if hit(WAIT_HANDLE_MARKERS) {
        return Some(WAIT_KIND_WAIT_HANDLE);
    }
    if hit(SLEEP_MARKERS) {
        return Some(WAIT_KIND_SLEEP);
    }
    if hit(JOIN_MARKERS) {
        return Some(WAIT_KIND_JOIN);
    }
    if hit(NATIVE_BLOCKING_MARKERS) {
        return Some(WAIT_KIND_NATIVE_SYSCALL);
    }
    if function.contains("wait") && !function.contains("await") {
        return Some(if frame.is_managed {
            WAIT_KIND_WAIT
        } else {
            WAIT_KIND_NATIVE_SYSCALL
        });
    }
    None
}

/// `"<module>: <function>"`, or just the function when the module is blank.
pub fn normalize_frame(frame: &StackFrame) -> String {
    let module = frame.module_text().trim();
    let function = frame.function_text().trim();
    if module.is_empty() {
        function.to_string()
    } else {
        format!("{module}: {function}").trim().to_string()
    }
}
