// Composition root and background machinery. Everything the daemon does
// outside an HTTP request lives here: config, state construction, the
// recovery loop, the processing workers, and cooperative shutdown.

mod config;
mod error;
mod files;
mod logging;
mod recovery;
mod scheduler;
mod state;

pub use config::{
    DaemonConfig, EmbeddingConfig, LimitsConfig, LogConfig, ProcessingConfig, RecoveryConfig,
    RetrievalConfig, ServerConfig, SummarizerConfig, resolve_data_dir,
};
pub use error::{Error, Result};
pub use files::{derive_port, remove_runtime_files, write_pid_file, write_port_file};
pub use logging::init_logging;
pub use recovery::{RecoveryReport, run_recovery_loop, run_recovery_pass};
pub use scheduler::Scheduler;
pub use state::DaemonState;
