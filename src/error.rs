//! 错误类型

use thiserror::Error;

/// 中继引擎对外暴露的错误
#[derive(Debug, Error)]
pub enum RelayError {
    /// 随机 transfer id 多次碰撞，放弃本条通知
    #[error("transfer id allocation exhausted after {attempts} attempts")]
    IdExhausted { attempts: u32 },

    /// 设备通道写入失败（原样上抛）
    #[error("device channel error: {0}")]
    Channel(#[source] anyhow::Error),

    /// 会话已停止
    #[error("relay session is closed")]
    SessionClosed,

    /// 配置文件无法读取或解析
    #[error("config error: {0}")]
    Config(String),
}

pub type RelayResult<T> = Result<T, RelayError>;
