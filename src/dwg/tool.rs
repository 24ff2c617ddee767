//! 外部変換ツール（dwgread / dwg2dxf）の実行

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io::{Read, Seek, SeekFrom};
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// 終了待ちのポーリング間隔
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// ツール実行エラー
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{program} の起動に失敗: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} が異常終了 ({status}): {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("{program} が {timeout:?} 以内に終了しませんでした")]
    TimedOut { program: String, timeout: Duration },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// 正常終了したツールの出力
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stderr: String,
}

/// タイムアウト付きで実行する外部コマンド
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: OsString,
    timeout: Duration,
}

impl ToolCommand {
    pub fn new(program: impl Into<OsString>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// コマンドを実行し、終了コードで成否を判定する
    ///
    /// タイムアウトした場合はプロセスを kill して回収する。
    pub fn run<I, S>(&self, args: I) -> Result<ToolOutput, ToolError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let program = self.program.to_string_lossy().into_owned();

        // stderr はパイプが詰まらないよう一時ファイルで受ける
        let mut stderr_file = tempfile::tempfile()?;

        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr_file.try_clone()?));

        #[cfg(windows)]
        cmd.creation_flags(0x08000000); // CREATE_NO_WINDOW

        debug!("実行: {} {:?}", program, cmd.get_args().collect::<Vec<_>>());

        let mut child = cmd.spawn().map_err(|source| ToolError::Spawn {
            program: program.clone(),
            source,
        })?;

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if started.elapsed() > self.timeout {
                warn!("{} がタイムアウトしました ({:?})", program, self.timeout);
                let _ = child.kill();
                let _ = child.wait();
                return Err(ToolError::TimedOut {
                    program,
                    timeout: self.timeout,
                });
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        stderr_file.seek(SeekFrom::Start(0))?;
        let mut raw = Vec::new();
        stderr_file.read_to_end(&mut raw)?;
        let stderr = String::from_utf8_lossy(&raw).into_owned();

        if !status.success() {
            return Err(ToolError::Failed {
                program,
                status,
                stderr,
            });
        }

        Ok(ToolOutput { stderr })
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())
    }
}

#[cfg(windows)]
trait CommandExt {
    fn creation_flags(&mut self, flags: u32) -> &mut Self;
}

#[cfg(windows)]
impl CommandExt for Command {
    fn creation_flags(&mut self, flags: u32) -> &mut Self {
        use std::os::windows::process::CommandExt as WinCommandExt;
        WinCommandExt::creation_flags(self, flags)
    }
}
