//! UseCase 層のエラー型定義

use std::{io, path::PathBuf};

use thiserror::Error;

/// 致命的なエラー（CLI は非ゼロで終了する）
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to start '{}': {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("PID file '{}': {source}", path.display())]
    PidFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
