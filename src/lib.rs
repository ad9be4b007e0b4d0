pub mod error;
pub mod graph;
pub mod log;

/// Prints crawl and optimizer tracing when the `debug_graph` feature is on;
/// compiles to nothing otherwise.
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {{
        #[cfg(feature = "debug_graph")]
        {
            eprintln!($($arg)*);
        }
    }};
}
