//! Infrastructure layer: PID file storage and OS process control.

pub mod os;
pub mod pidfile;

pub use os::SystemProcessControl;
pub use pidfile::PidFile;
