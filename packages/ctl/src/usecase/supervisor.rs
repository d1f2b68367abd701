//! UseCase: サーバープロセスのライフサイクル管理
//!
//! 起動・停止・再起動・状態確認を PID ファイルと OS のプロセス制御
//! （`ProcessControl`）の組み合わせで実装します。状態はプロセス内に保持せず、
//! 毎回 PID ファイルと生存確認から再構築します。

use std::time::Duration;

use crate::{
    domain::{
        LaunchMode, Launched, PidRecord, ProcessControl, ServerCommand, ServerProcessState,
        SignalKind,
    },
    infrastructure::PidFile,
};

use super::{
    error::SupervisorError,
    outcome::{NotRunningReason, RestartOutcome, StartOutcome, StatusReport, StopOutcome},
};

/// 停止処理（SIGTERM → SIGKILL）のタイミング
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopPolicy {
    /// 生存確認の間隔
    pub poll_interval: Duration,
    /// エスカレーション前（および後）の生存確認の回数
    pub max_polls: u32,
    /// 再起動時の停止から起動までの待ち時間
    pub settle_delay: Duration,
}

impl Default for StopPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            max_polls: 10,
            settle_delay: Duration::from_secs(1),
        }
    }
}

/// PID ファイルで識別される単一サーバープロセスのスーパーバイザー
pub struct Supervisor<P> {
    control: P,
    pid_file: PidFile,
    policy: StopPolicy,
}

impl<P: ProcessControl> Supervisor<P> {
    pub fn new(control: P, pid_file: PidFile) -> Self {
        Self {
            control,
            pid_file,
            policy: StopPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: StopPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn pid_file(&self) -> &PidFile {
        &self.pid_file
    }

    /// PID ファイルと OS から見た現在の状態
    pub fn state(&self) -> ServerProcessState {
        match self.running_pid() {
            Some(_) => ServerProcessState::Running,
            None => ServerProcessState::NotRunning,
        }
    }

    /// 起動中のサーバーが無ければサーバーを起動
    ///
    /// # Errors
    ///
    /// 起動に失敗した場合、またはデタッチ起動したサーバーの PID を記録できない
    /// 場合（起動したプロセスには終了を依頼します）にエラーを返します。
    pub async fn start(
        &self,
        command: &ServerCommand,
        mode: &LaunchMode,
    ) -> Result<StartOutcome, SupervisorError> {
        if let Some(pid) = self.running_pid() {
            tracing::info!("Server already running with PID {}", pid);
            return Ok(StartOutcome::AlreadyRunning { pid });
        }

        self.transition(ServerProcessState::NotRunning, ServerProcessState::Starting);
        let launched = match self.control.spawn(command, mode).await {
            Ok(launched) => launched,
            Err(source) => {
                tracing::error!("Failed to spawn '{}': {}", command.program.display(), source);
                self.transition(ServerProcessState::Starting, ServerProcessState::NotRunning);
                return Err(SupervisorError::Spawn {
                    program: command.program.clone(),
                    source,
                });
            }
        };

        match launched {
            Launched::Detached { pid } => {
                if let Err(source) = self.pid_file.write(pid) {
                    tracing::error!(
                        "Failed to record PID {} in '{}': {}",
                        pid,
                        self.pid_file.path().display(),
                        source
                    );
                    self.control.signal(pid, SignalKind::Graceful);
                    self.transition(ServerProcessState::Starting, ServerProcessState::NotRunning);
                    return Err(self.pid_file_error(source));
                }
                self.transition(ServerProcessState::Starting, ServerProcessState::Running);
                Ok(StartOutcome::Detached { pid })
            }
            Launched::Exited { code } => {
                tracing::info!("Foreground server exited with {:?}", code);
                self.transition(ServerProcessState::Starting, ServerProcessState::NotRunning);
                Ok(StartOutcome::Exited { code })
            }
        }
    }

    /// 記録されたサーバーを停止
    ///
    /// SIGTERM を送り一定回数まで終了を待ち、終了しなければ SIGKILL を 1 回だけ送ります。
    ///
    /// # Errors
    ///
    /// PID ファイルを削除できない場合のみエラーを返します。
    pub async fn stop(&self) -> Result<StopOutcome, SupervisorError> {
        let pid = match self.pid_file.read() {
            PidRecord::Missing => {
                return Ok(StopOutcome::NotRunning(NotRunningReason::NoPidFile));
            }
            PidRecord::Invalid => {
                tracing::warn!("Invalid PID file '{}', removing", self.pid_file.path().display());
                self.remove_pid_file()?;
                return Ok(StopOutcome::NotRunning(NotRunningReason::InvalidPid));
            }
            PidRecord::Pid(pid) => pid,
        };

        if !self.control.probe(pid) {
            tracing::warn!("Process {} not found, removing stale PID file", pid);
            self.remove_pid_file()?;
            return Ok(StopOutcome::NotRunning(NotRunningReason::ProcessNotFound(pid)));
        }

        self.transition(ServerProcessState::Running, ServerProcessState::Stopping);
        if !self.control.signal(pid, SignalKind::Graceful) {
            tracing::warn!("Could not deliver graceful signal to PID {}", pid);
        }

        let mut forced = false;
        if !self.wait_for_exit(pid).await {
            tracing::warn!("Server {} did not terminate gracefully, forcing shutdown", pid);
            self.control.signal(pid, SignalKind::Forceful);
            forced = true;
            if !self.wait_for_exit(pid).await {
                tracing::error!("Server {} still alive after forceful signal", pid);
            }
        }

        self.remove_pid_file()?;
        self.transition(ServerProcessState::Stopping, ServerProcessState::NotRunning);
        Ok(StopOutcome::Terminated { pid, forced })
    }

    /// 完全に停止し、少し待ってから起動
    pub async fn restart(
        &self,
        command: &ServerCommand,
        mode: &LaunchMode,
    ) -> Result<RestartOutcome, SupervisorError> {
        let stop = self.stop().await?;
        tokio::time::sleep(self.policy.settle_delay).await;
        let start = self.start(command, mode).await?;
        Ok(RestartOutcome { stop, start })
    }

    /// 状態確認（読み取り専用。古い PID ファイルは報告するが削除しない）
    pub async fn status(&self) -> StatusReport {
        match self.pid_file.read() {
            PidRecord::Missing => StatusReport::NotRunning(NotRunningReason::NoPidFile),
            PidRecord::Invalid => StatusReport::NotRunning(NotRunningReason::InvalidPid),
            PidRecord::Pid(pid) if self.control.probe(pid) => StatusReport::Running {
                pid,
                snapshot: self.control.snapshot(pid).await,
            },
            PidRecord::Pid(pid) => StatusReport::NotRunning(NotRunningReason::ProcessNotFound(pid)),
        }
    }

    fn running_pid(&self) -> Option<u32> {
        match self.pid_file.read() {
            PidRecord::Pid(pid) if self.control.probe(pid) => Some(pid),
            _ => None,
        }
    }

    /// プロセスが終了すれば `true`、`max_polls` 回確認しても生存していれば `false`
    async fn wait_for_exit(&self, pid: u32) -> bool {
        for attempt in 1..=self.policy.max_polls {
            tokio::time::sleep(self.policy.poll_interval).await;
            if !self.control.probe(pid) {
                return true;
            }
            tracing::debug!(
                "Waiting for PID {} to exit ({}/{})",
                pid,
                attempt,
                self.policy.max_polls
            );
        }
        false
    }

    fn remove_pid_file(&self) -> Result<(), SupervisorError> {
        self.pid_file
            .remove()
            .map_err(|source| self.pid_file_error(source))
    }

    fn pid_file_error(&self, source: std::io::Error) -> SupervisorError {
        SupervisorError::PidFile {
            path: self.pid_file.path().to_path_buf(),
            source,
        }
    }

    fn transition(&self, from: ServerProcessState, to: ServerProcessState) {
        debug_assert!(
            from.can_transition_to(to),
            "invalid server state transition: {} -> {}",
            from,
            to
        );
        tracing::debug!("Server state: {} -> {}", from, to);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MockProcessControl, ProcessSnapshot};
    use async_trait::async_trait;
    use mockall::predicate::eq;
    use std::{
        collections::HashSet,
        io,
        path::PathBuf,
        sync::{
            Arc, Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    fn test_policy() -> StopPolicy {
        StopPolicy {
            poll_interval: Duration::from_millis(1),
            max_polls: 3,
            settle_delay: Duration::from_millis(1),
        }
    }

    fn create_test_pidfile() -> (tempfile::TempDir, PidFile) {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = PidFile::new(dir.path().join("agora-server.pid"));
        (dir, pid_file)
    }

    fn create_test_command() -> ServerCommand {
        ServerCommand {
            program: PathBuf::from("/opt/agora/agora-server"),
            host: "127.0.0.1".to_string(),
            port: 8080,
            workers: None,
            config: None,
        }
    }

    fn detached_mode() -> LaunchMode {
        LaunchMode::Detached {
            log: PathBuf::from("/tmp/agora-server.log"),
        }
    }

    fn create_supervisor<P: ProcessControl>(control: P, pid_file: PidFile) -> Supervisor<P> {
        Supervisor::new(control, pid_file).with_policy(test_policy())
    }

    #[tokio::test]
    async fn test_stop_without_pid_file_sends_no_signal() {
        // テスト項目: PID ファイルが無い場合はシグナルを送らずに NotRunning を返す
        // given (前提条件):
        let (_dir, pid_file) = create_test_pidfile();
        let mut control = MockProcessControl::new();
        control.expect_signal().never();
        control.expect_probe().never();
        let supervisor = create_supervisor(control, pid_file);

        // when (操作):
        let outcome = supervisor.stop().await.unwrap();

        // then (期待する結果):
        assert_eq!(outcome, StopOutcome::NotRunning(NotRunningReason::NoPidFile));
    }

    #[tokio::test]
    async fn test_stop_with_invalid_pid_removes_file() {
        // テスト項目: PID ファイルの内容が不正な場合はファイルを削除する
        // given (前提条件):
        let (_dir, pid_file) = create_test_pidfile();
        std::fs::write(pid_file.path(), "not-a-pid").unwrap();
        let mut control = MockProcessControl::new();
        control.expect_signal().never();
        let supervisor = create_supervisor(control, pid_file.clone());

        // when (操作):
        let outcome = supervisor.stop().await.unwrap();

        // then (期待する結果):
        assert_eq!(outcome, StopOutcome::NotRunning(NotRunningReason::InvalidPid));
        assert_eq!(pid_file.read(), PidRecord::Missing);
    }

    #[tokio::test]
    async fn test_stop_with_stale_pid_removes_file() {
        // テスト項目: PID のプロセスが存在しない場合は古い PID ファイルを削除する
        // given (前提条件):
        let (_dir, pid_file) = create_test_pidfile();
        pid_file.write(31337).unwrap();
        let mut control = MockProcessControl::new();
        control.expect_probe().with(eq(31337)).return_const(false);
        control.expect_signal().never();
        let supervisor = create_supervisor(control, pid_file.clone());

        // when (操作):
        let outcome = supervisor.stop().await.unwrap();

        // then (期待する結果):
        assert_eq!(
            outcome,
            StopOutcome::NotRunning(NotRunningReason::ProcessNotFound(31337))
        );
        assert_eq!(pid_file.read(), PidRecord::Missing);
    }

    #[tokio::test]
    async fn test_stop_graceful_termination() {
        // テスト項目: SIGTERM で終了した場合は SIGKILL を送らない
        // given (前提条件): 最初の生存確認のみ true
        let (_dir, pid_file) = create_test_pidfile();
        pid_file.write(500).unwrap();
        let probes = AtomicUsize::new(0);
        let mut control = MockProcessControl::new();
        control
            .expect_probe()
            .with(eq(500))
            .returning(move |_| probes.fetch_add(1, Ordering::SeqCst) == 0);
        control
            .expect_signal()
            .with(eq(500), eq(SignalKind::Graceful))
            .times(1)
            .return_const(true);
        control
            .expect_signal()
            .with(eq(500), eq(SignalKind::Forceful))
            .never();
        let supervisor = create_supervisor(control, pid_file.clone());

        // when (操作):
        let outcome = supervisor.stop().await.unwrap();

        // then (期待する結果):
        assert_eq!(outcome, StopOutcome::Terminated { pid: 500, forced: false });
        assert_eq!(pid_file.read(), PidRecord::Missing);
    }

    #[tokio::test]
    async fn test_stop_escalates_exactly_once_for_unresponsive_process() {
        // テスト項目: SIGTERM に応答しないプロセスには SIGKILL を 1 回だけ送り、PID ファイルを削除する
        // given (前提条件): プロセスは常に生存しているように見える
        let (_dir, pid_file) = create_test_pidfile();
        pid_file.write(600).unwrap();
        let mut control = MockProcessControl::new();
        control.expect_probe().with(eq(600)).return_const(true);
        control
            .expect_signal()
            .with(eq(600), eq(SignalKind::Graceful))
            .times(1)
            .return_const(true);
        control
            .expect_signal()
            .with(eq(600), eq(SignalKind::Forceful))
            .times(1)
            .return_const(true);
        let supervisor = create_supervisor(control, pid_file.clone());

        // when (操作):
        let outcome = supervisor.stop().await.unwrap();

        // then (期待する結果):
        assert_eq!(outcome, StopOutcome::Terminated { pid: 600, forced: true });
        assert_eq!(pid_file.read(), PidRecord::Missing);
    }

    #[tokio::test]
    async fn test_start_when_already_running_does_not_spawn() {
        // テスト項目: 既に起動中の場合は新しいプロセスを起動しない
        // given (前提条件):
        let (_dir, pid_file) = create_test_pidfile();
        pid_file.write(700).unwrap();
        let mut control = MockProcessControl::new();
        control.expect_probe().with(eq(700)).return_const(true);
        control.expect_spawn().never();
        let supervisor = create_supervisor(control, pid_file.clone());

        // when (操作):
        let outcome = supervisor
            .start(&create_test_command(), &detached_mode())
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(outcome, StartOutcome::AlreadyRunning { pid: 700 });
        assert_eq!(pid_file.read(), PidRecord::Pid(700));
    }

    #[tokio::test]
    async fn test_start_detached_records_pid() {
        // テスト項目: デタッチ起動では PID ファイルに PID が記録される
        // given (前提条件):
        let (_dir, pid_file) = create_test_pidfile();
        let mut control = MockProcessControl::new();
        control
            .expect_spawn()
            .times(1)
            .returning(|_, _| Ok(Launched::Detached { pid: 4242 }));
        control.expect_probe().with(eq(4242)).return_const(true);
        let supervisor = create_supervisor(control, pid_file.clone());

        // when (操作):
        let outcome = supervisor
            .start(&create_test_command(), &detached_mode())
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(outcome, StartOutcome::Detached { pid: 4242 });
        assert_eq!(pid_file.read(), PidRecord::Pid(4242));
        assert_eq!(supervisor.state(), ServerProcessState::Running);
    }

    #[tokio::test]
    async fn test_start_over_stale_pid_file() {
        // テスト項目: 古い PID ファイルがあっても起動でき、PID が上書きされる
        // given (前提条件):
        let (_dir, pid_file) = create_test_pidfile();
        pid_file.write(11).unwrap();
        let mut control = MockProcessControl::new();
        control.expect_probe().with(eq(11)).return_const(false);
        control
            .expect_spawn()
            .times(1)
            .returning(|_, _| Ok(Launched::Detached { pid: 12 }));
        let supervisor = create_supervisor(control, pid_file.clone());

        // when (操作):
        let outcome = supervisor
            .start(&create_test_command(), &detached_mode())
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(outcome, StartOutcome::Detached { pid: 12 });
        assert_eq!(pid_file.read(), PidRecord::Pid(12));
    }

    #[tokio::test]
    async fn test_start_spawn_failure_is_fatal() {
        // テスト項目: 起動に失敗した場合はエラーを返し、PID ファイルは作成されない
        // given (前提条件):
        let (_dir, pid_file) = create_test_pidfile();
        let mut control = MockProcessControl::new();
        control
            .expect_spawn()
            .returning(|_, _| Err(io::Error::new(io::ErrorKind::NotFound, "no such binary")));
        let supervisor = create_supervisor(control, pid_file.clone());

        // when (操作):
        let result = supervisor
            .start(&create_test_command(), &detached_mode())
            .await;

        // then (期待する結果):
        assert!(matches!(result, Err(SupervisorError::Spawn { .. })));
        assert_eq!(pid_file.read(), PidRecord::Missing);
    }

    #[tokio::test]
    async fn test_start_pid_write_failure_signals_orphan() {
        // テスト項目: PID の記録に失敗した場合は起動したプロセスに終了を依頼してエラーを返す
        // given (前提条件): PID ファイルのパスがディレクトリになっている
        let dir = tempfile::tempdir().unwrap();
        let pid_path = dir.path().join("pid-is-a-directory");
        std::fs::create_dir(&pid_path).unwrap();
        let mut control = MockProcessControl::new();
        control
            .expect_spawn()
            .returning(|_, _| Ok(Launched::Detached { pid: 77 }));
        control
            .expect_signal()
            .with(eq(77), eq(SignalKind::Graceful))
            .times(1)
            .return_const(true);
        let supervisor = create_supervisor(control, PidFile::new(pid_path));

        // when (操作):
        let result = supervisor
            .start(&create_test_command(), &detached_mode())
            .await;

        // then (期待する結果):
        assert!(matches!(result, Err(SupervisorError::PidFile { .. })));
    }

    #[tokio::test]
    async fn test_start_foreground_reports_exit_code() {
        // テスト項目: フォアグラウンド起動では終了コードを返し、PID ファイルは作成されない
        // given (前提条件):
        let (_dir, pid_file) = create_test_pidfile();
        let mut control = MockProcessControl::new();
        control
            .expect_spawn()
            .withf(|_, mode| matches!(mode, LaunchMode::Foreground))
            .returning(|_, _| Ok(Launched::Exited { code: Some(3) }));
        let supervisor = create_supervisor(control, pid_file.clone());

        // when (操作):
        let outcome = supervisor
            .start(&create_test_command(), &LaunchMode::Foreground)
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(outcome, StartOutcome::Exited { code: Some(3) });
        assert_eq!(pid_file.read(), PidRecord::Missing);
    }

    #[tokio::test]
    async fn test_status_running_includes_snapshot() {
        // テスト項目: 起動中の場合は PID とリソース情報を返す
        // given (前提条件):
        let (_dir, pid_file) = create_test_pidfile();
        pid_file.write(800).unwrap();
        let snapshot = ProcessSnapshot {
            cpu_percent: 1.5,
            memory_bytes: 32 * 1024 * 1024,
            start_time: 1_700_000_000,
        };
        let mut control = MockProcessControl::new();
        control.expect_probe().with(eq(800)).return_const(true);
        control
            .expect_snapshot()
            .with(eq(800))
            .return_const(Some(snapshot.clone()));
        let supervisor = create_supervisor(control, pid_file);

        // when (操作):
        let report = supervisor.status().await;

        // then (期待する結果):
        assert_eq!(
            report,
            StatusReport::Running {
                pid: 800,
                snapshot: Some(snapshot)
            }
        );
    }

    #[tokio::test]
    async fn test_status_does_not_remove_stale_pid_file() {
        // テスト項目: 状態確認は古い PID ファイルを報告するが削除しない
        // given (前提条件):
        let (_dir, pid_file) = create_test_pidfile();
        pid_file.write(900).unwrap();
        let mut control = MockProcessControl::new();
        control.expect_probe().with(eq(900)).return_const(false);
        control.expect_snapshot().never();
        let supervisor = create_supervisor(control, pid_file.clone());

        // when (操作):
        let report = supervisor.status().await;

        // then (期待する結果):
        assert_eq!(
            report,
            StatusReport::NotRunning(NotRunningReason::ProcessNotFound(900))
        );
        assert_eq!(pid_file.read(), PidRecord::Pid(900));
    }

    #[tokio::test]
    async fn test_status_without_pid_file() {
        // テスト項目: PID ファイルが無い場合は NoPidFile を返す
        // given (前提条件):
        let (_dir, pid_file) = create_test_pidfile();
        let control = MockProcessControl::new();
        let supervisor = create_supervisor(control, pid_file);

        // when (操作):
        let report = supervisor.status().await;

        // then (期待する結果):
        assert_eq!(report, StatusReport::NotRunning(NotRunningReason::NoPidFile));
        assert_eq!(supervisor.state(), ServerProcessState::NotRunning);
    }

    /// 操作の順序を記録するテスト用のプロセステーブル
    struct SpyControl {
        pid_file: PidFile,
        alive: Mutex<HashSet<u32>>,
        events: Arc<Mutex<Vec<String>>>,
        next_pid: u32,
    }

    #[async_trait]
    impl ProcessControl for SpyControl {
        async fn spawn(&self, _command: &ServerCommand, _mode: &LaunchMode) -> io::Result<Launched> {
            let alive = self.alive.lock().unwrap().len();
            let pid_file_present = self.pid_file.read() != PidRecord::Missing;
            self.events
                .lock()
                .unwrap()
                .push(format!("spawn alive={} pid_file={}", alive, pid_file_present));
            self.alive.lock().unwrap().insert(self.next_pid);
            Ok(Launched::Detached { pid: self.next_pid })
        }

        fn signal(&self, pid: u32, kind: SignalKind) -> bool {
            self.events
                .lock()
                .unwrap()
                .push(format!("signal {} {:?}", pid, kind));
            self.alive.lock().unwrap().remove(&pid)
        }

        fn probe(&self, pid: u32) -> bool {
            self.alive.lock().unwrap().contains(&pid)
        }

        async fn snapshot(&self, _pid: u32) -> Option<ProcessSnapshot> {
            None
        }
    }

    #[tokio::test]
    async fn test_restart_stops_completely_before_starting() {
        // テスト項目: 再起動は旧プロセスの終了と PID ファイル削除が完了してから起動する
        // given (前提条件):
        let (_dir, pid_file) = create_test_pidfile();
        pid_file.write(100).unwrap();
        let events = Arc::new(Mutex::new(Vec::new()));
        let control = SpyControl {
            pid_file: pid_file.clone(),
            alive: Mutex::new(HashSet::from([100])),
            events: Arc::clone(&events),
            next_pid: 200,
        };
        let supervisor = create_supervisor(control, pid_file.clone());

        // when (操作):
        let outcome = supervisor
            .restart(&create_test_command(), &detached_mode())
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(
            outcome,
            RestartOutcome {
                stop: StopOutcome::Terminated { pid: 100, forced: false },
                start: StartOutcome::Detached { pid: 200 },
            }
        );
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                "signal 100 Graceful".to_string(),
                "spawn alive=0 pid_file=false".to_string(),
            ]
        );
        assert_eq!(pid_file.read(), PidRecord::Pid(200));
    }

    #[tokio::test]
    async fn test_restart_when_not_running_just_starts() {
        // テスト項目: 停止中の再起動は停止処理を省略して起動する
        // given (前提条件):
        let (_dir, pid_file) = create_test_pidfile();
        let events = Arc::new(Mutex::new(Vec::new()));
        let control = SpyControl {
            pid_file: pid_file.clone(),
            alive: Mutex::new(HashSet::new()),
            events: Arc::clone(&events),
            next_pid: 300,
        };
        let supervisor = create_supervisor(control, pid_file);

        // when (操作):
        let outcome = supervisor
            .restart(&create_test_command(), &detached_mode())
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(outcome.stop, StopOutcome::NotRunning(NotRunningReason::NoPidFile));
        assert_eq!(outcome.start, StartOutcome::Detached { pid: 300 });
        assert_eq!(events.lock().unwrap().len(), 1);
    }
}
