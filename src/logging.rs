//! Log macros. Forwarded to `defmt` on the target, evaluated and dropped on
//! the host so the logic modules build and test without a global logger.

macro_rules! log_at {
    ($level:ident, $fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(target_os = "none")]
        defmt::$level!($fmt $(, $arg)*);
        #[cfg(not(target_os = "none"))]
        let _ = ($(&$arg,)*);
    }};
}

macro_rules! trace {
    ($($t:tt)*) => { $crate::logging::log_at!(trace, $($t)*) };
}

macro_rules! debug {
    ($($t:tt)*) => { $crate::logging::log_at!(debug, $($t)*) };
}

macro_rules! info {
    ($($t:tt)*) => { $crate::logging::log_at!(info, $($t)*) };
}

// `warn` itself would clash with the built-in lint attribute on re-export.
macro_rules! warning {
    ($($t:tt)*) => { $crate::logging::log_at!(warn, $($t)*) };
}

#[allow(unused_imports)]
pub(crate) use {debug, info, log_at, trace, warning};
