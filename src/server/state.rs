use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::server::ServerCommand;
use crate::config::{ConfDir, SearchOptions};
use crate::db::SqliteRepository;
use crate::extract::NpyExtractor;
use crate::service::QueryService;

/// 应用状态
pub struct AppState {
    /// 查询服务，持有当前索引
    pub service: QueryService<SqliteRepository>,
    /// 查询描述符解码
    pub extractor: NpyExtractor,
    /// 搜索配置选项
    pub search: SearchOptions,
    /// 索引文件路径
    pub index_path: PathBuf,
    /// 保存索引时使用的临时文件路径
    pub index_tmp: PathBuf,
    /// 鉴权 token
    pub token: String,
    /// 视频文件目录，挂载在 /videos 下
    pub video_dir: Option<PathBuf>,
    /// 视频访问地址的前缀
    pub base_url: Option<String>,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(repo: SqliteRepository, conf_dir: &ConfDir, opts: ServerCommand) -> Arc<Self> {
        Arc::new(AppState {
            service: QueryService::new(Arc::new(repo), (&opts.search).into()),
            extractor: NpyExtractor::new(opts.search.dim),
            search: opts.search,
            index_path: conf_dir.index(),
            index_tmp: conf_dir.index_tmp(),
            token: opts.token,
            video_dir: opts.video_dir,
            base_url: opts.base_url,
        })
    }

    /// 视频的访问地址
    ///
    /// 优先使用 base-url，否则在提供视频文件时使用请求的 Host 拼出 /videos 下的地址。
    /// 位于视频目录内的源路径会转换为相对路径。
    pub fn video_url(&self, path: &str, host: Option<&str>) -> Option<String> {
        let base = match (&self.base_url, &self.video_dir, host) {
            (Some(base), _, _) => base.trim_end_matches('/').to_string(),
            (None, Some(_), Some(host)) => format!("http://{host}/videos"),
            _ => return None,
        };
        let relative = self
            .video_dir
            .as_deref()
            .and_then(|dir| Path::new(path).strip_prefix(dir).ok())
            .and_then(|p| p.to_str())
            .unwrap_or(path);
        Some(format!("{}/{}", base, relative.trim_start_matches('/')))
    }
}
