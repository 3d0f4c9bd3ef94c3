use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use clap::{Parser, Subcommand};
use directories::ProjectDirs;

use crate::cli::*;
use crate::service::QueryOptions;

static CONF_DIR: LazyLock<ConfDir> = LazyLock::new(|| {
    let path = ProjectDirs::from("", "vidsearch", "vidsearch")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".vidsearch"));
    ConfDir { path }
});

#[derive(Parser, Debug, Clone)]
pub struct IngestOptions {
    /// 每个时间窗口包含的帧数，每个窗口只保留一个代表描述符
    #[arg(short, long, value_name = "N", default_value_t = 6, value_parser = clap::value_parser!(u32).range(1..))]
    pub window_size: u32,
    /// 描述符维度，不填则使用第一个描述符的维度
    #[arg(long, value_name = "D")]
    pub dim: Option<usize>,
}

#[derive(Parser, Debug, Clone)]
pub struct SearchOptions {
    /// 返回的视频数量
    #[arg(long, value_name = "COUNT", default_value_t = 3)]
    pub count: usize,
    /// 初次查询的近邻数量为 COUNT * FACTOR，结果不足时自动扩大；不填则直接查询全部语料
    #[arg(long, value_name = "FACTOR")]
    pub overfetch: Option<usize>,
    /// 描述符维度，索引或查询维度不一致时报错
    #[arg(long, value_name = "D")]
    pub dim: Option<usize>,
}

impl From<&SearchOptions> for QueryOptions {
    fn from(opts: &SearchOptions) -> Self {
        Self { overfetch: opts.overfetch, expected_dim: opts.dim }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "vidsearch", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// vidsearch 配置文件目录
    #[arg(short, long, default_value_t = CONF_DIR.clone())]
    pub conf_dir: ConfDir,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 添加视频的逐帧描述符到数据库
    Add(AddCommand),
    /// 使用数据库中的全部窗口描述符构建索引
    Build(BuildCommand),
    /// 从索引中搜索视频
    Search(SearchCommand),
    /// 启动 HTTP 搜索服务
    Server(ServerCommand),
    /// 显示数据库与索引信息
    Info(InfoCommand),
}

#[derive(Debug, Clone)]
pub struct ConfDir {
    path: PathBuf,
}

impl ConfDir {
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// 返回数据库文件的路径
    pub fn database(&self) -> PathBuf {
        self.path.join("vidsearch.db")
    }

    /// 返回索引文件的路径
    pub fn index(&self) -> PathBuf {
        self.path.join("index.kdt")
    }

    /// 返回保存索引时使用的临时文件路径
    pub fn index_tmp(&self) -> PathBuf {
        self.path.join("index.kdt.tmp")
    }
}

impl FromStr for ConfDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { path: PathBuf::from(s) })
    }
}

impl std::fmt::Display for ConfDir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_opts() {
        let opts =
            Opts::parse_from(["vidsearch", "-c", "/tmp/conf", "search", "q.npy", "--count", "5"]);
        assert_eq!(opts.conf_dir.database(), Path::new("/tmp/conf/vidsearch.db"));
        assert_eq!(opts.conf_dir.index(), Path::new("/tmp/conf/index.kdt"));
        let SubCommand::Search(cmd) = opts.subcmd else { panic!("应当解析为 search") };
        assert_eq!(cmd.search.count, 5);
        assert_eq!(cmd.search.overfetch, None);
    }

    #[test]
    fn test_window_size() {
        let opts = Opts::parse_from(["vidsearch", "add", "videos"]);
        let SubCommand::Add(cmd) = opts.subcmd else { panic!("应当解析为 add") };
        assert_eq!(cmd.ingest.window_size, 6);
        assert!(Opts::try_parse_from(["vidsearch", "add", "videos", "-w", "0"]).is_err());
    }
}
