use std::path::PathBuf;

use anyhow::anyhow;
use clap::Parser;
use log::{error, info, warn};
use prometheus::{BasicAuthentication, labels};
use rand::distr::{Alphanumeric, SampleString};
use tokio::net::TcpListener;
use tokio::task::{block_in_place, spawn_blocking};
use tokio::time::{Duration, sleep};

use crate::cli::SubCommandExtend;
use crate::config::SearchOptions;
use crate::db::SqliteRepository;
use crate::{Opts, server};

#[derive(Parser, Debug, Clone)]
pub struct ServerCommand {
    #[command(flatten)]
    pub search: SearchOptions,
    /// 监听地址
    #[arg(long, default_value = "127.0.0.1:8000")]
    pub addr: String,
    /// 请求验证 token，不填则随机生成
    #[arg(long, default_value_t = String::new())]
    pub token: String,
    /// 视频文件目录，设置后在 /videos 下提供视频文件
    #[arg(long, value_name = "DIR")]
    pub video_dir: Option<PathBuf>,
    /// 搜索结果中视频地址的前缀，不填则使用请求的 Host 拼出 /videos 下的地址
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,
    /// prometheus 主动推送地址
    #[arg(long, value_name = "URL")]
    pub prometheus_push: Option<String>,
    /// 自定义 instance 标签值
    #[arg(long, value_name = "NAME")]
    pub prometheus_instance: Option<String>,
    /// prometheus 认证信息，格式为 username:password
    #[arg(long, value_name = "AUTH")]
    pub prometheus_auth: Option<String>,
}

impl SubCommandExtend for ServerCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let repo = SqliteRepository::open(opts.conf_dir.database()).await?;

        let mut self_clone = self.clone();
        if self_clone.token.is_empty() {
            self_clone.token = Alphanumeric.sample_string(&mut rand::rng(), 32);
            info!("鉴权 token: {}", self_clone.token);
        }

        // 创建应用状态
        let state = server::AppState::new(repo, &opts.conf_dir, self_clone);
        if state.index_path.exists() {
            block_in_place(|| state.service.load(&state.index_path))?;
        } else {
            warn!("索引文件 {} 不存在，请先构建索引", state.index_path.display());
        }

        // 创建应用
        let app = server::create_app(state);

        if let Some(url) = self.prometheus_push.clone() {
            let instance = self.prometheus_instance.clone().unwrap_or_else(|| self.addr.clone());
            let auth = match &self.prometheus_auth {
                Some(s) => {
                    let (username, password) =
                        s.split_once(':').ok_or_else(|| anyhow!("无效的认证信息: {}", s))?;
                    Some((username.to_string(), password.to_string()))
                }
                None => None,
            };
            tokio::spawn(async move {
                loop {
                    let metric_families = prometheus::gather();
                    let url = url.clone();
                    let instance = instance.clone();
                    let auth = auth.clone();
                    let r = spawn_blocking(move || {
                        prometheus::push_metrics(
                            "vidsearch",
                            labels! {
                                "instance".to_string() => instance.clone(),
                            },
                            &url,
                            metric_families,
                            auth.map(|(username, password)| BasicAuthentication {
                                username,
                                password,
                            }),
                        )
                    })
                    .await;
                    match r {
                        Ok(Err(e)) => error!("推送指标失败: {e}"),
                        Err(e) => error!("推送指标任务异常退出: {e}"),
                        Ok(Ok(())) => {}
                    }
                    sleep(Duration::from_secs(30)).await;
                }
            });
        }

        // 启动服务器
        info!("服务器启动：http://{}", &self.addr);
        let listener = TcpListener::bind(&self.addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
