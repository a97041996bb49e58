// BiliSub - Bilibili metadata and subtitle client
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


use anyhow::{Context, Result};
use bilisub_core::api::{BiliClient, ClientConfig, Credentials};
use bilisub_core::api::subtitle::to_srt;
use bilisub_core::codec::VideoId;
use bilisub_core::error::BiliError;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "bilisub-cli")]
#[command(about = "Fetch Bilibili video info and subtitles", long_about = None)]
struct Cli {
    #[command(flatten)]
    auth: AuthArgs,

    /// Request timeout in seconds
    #[arg(long, global = true, default_value_t = 10)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

/// Cookies copied from a logged-in browser session on bilibili.com
#[derive(Args)]
struct AuthArgs {
    #[arg(long, env = "BILI_SESSDATA", global = true, hide_env_values = true)]
    sessdata: Option<String>,
    #[arg(long, env = "BILI_JCT", global = true, hide_env_values = true)]
    bili_jct: Option<String>,
    #[arg(long, env = "BILI_BUVID3", global = true, hide_env_values = true)]
    buvid3: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Srt,
}

#[derive(Subcommand)]
enum Commands {
    /// Print both forms of a video id (offline)
    Convert {
        /// BV id, av id, bare number or video URL
        id: String,
    },
    /// Show which credentials are configured
    Status,
    /// Show title, owner, duration and stats
    Info { id: String },
    /// List the parts of a video
    Pages { id: String },
    /// List subtitle tracks of one part
    Tracks {
        id: String,
        #[arg(short, long, default_value_t = 1)]
        page: usize,
    },
    /// Print the subtitles of one part
    Text {
        id: String,
        #[arg(short, long, default_value_t = 1)]
        page: usize,
        /// Language tag substring, e.g. zh, en
        #[arg(short, long, default_value = "zh")]
        lang: String,
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

impl Cli {
    fn client(&self) -> Result<BiliClient> {
        let credentials = Credentials::from_options(
            self.auth.sessdata.clone(),
            self.auth.bili_jct.clone(),
            self.auth.buvid3.clone(),
        )
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

        let config = ClientConfig::builder()
            .timeout(Duration::from_secs(self.timeout))
            .build();
        BiliClient::with_config(credentials, config).context("Failed to create client")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Convert { id } => {
            let (aid, bvid) = VideoId::parse(id)?.normalize()?;
            println!("av{}", aid);
            println!("{}", bvid);
        }
        Commands::Status => {
            let status = cli.client()?.credentials_status();
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Info { id } => {
            let client = cli.client()?;
            let info = client.get_video_info(&VideoId::parse(id)?).await?;
            println!("{} ({} / av{})", info.title, info.bvid, info.aid);
            println!("Owner:    {}", info.owner.name);
            println!("Duration: {}s", info.duration);
            if let Some(published) = info.published_at() {
                println!("Published: {}", published.format("%Y-%m-%d %H:%M:%S UTC"));
            }
            println!(
                "Views: {}  Likes: {}  Coins: {}  Favorites: {}",
                info.stat.view, info.stat.like, info.stat.coin, info.stat.favorite
            );
            println!("Pages:    {}", info.pages.len());
        }
        Commands::Pages { id } => {
            let client = cli.client()?;
            for page in client.get_video_pages(&VideoId::parse(id)?).await? {
                println!("P{:<3} cid={:<12} {:>5}s  {}", page.page, page.cid, page.duration, page.part);
            }
        }
        Commands::Tracks { id, page } => {
            let client = cli.client()?;
            let video_id = VideoId::parse(id)?;
            let pages = client.get_video_pages(&video_id).await?;
            let part = pages
                .get(page.wrapping_sub(1))
                .with_context(|| format!("Page {} does not exist ({} pages)", page, pages.len()))?;
            let tracks = client.get_subtitle_tracks(&video_id, part.cid).await?;
            if tracks.is_empty() {
                println!("No subtitles");
            }
            for track in tracks {
                println!("{:<8} {}", track.lan, track.lan_doc);
            }
        }
        Commands::Text { id, page, lang, format } => {
            let client = cli.client()?;
            let video_id = VideoId::parse(id)?;
            let output = match format {
                OutputFormat::Text => client
                    .get_subtitle_text(&video_id, *page, lang)
                    .await
                    .map(|text| format!("{}\n", text)),
                OutputFormat::Srt => client
                    .get_subtitle_fragments(&video_id, *page, lang)
                    .await
                    .map(|fragments| to_srt(&fragments))
                    .and_then(|srt| {
                        if srt.is_empty() {
                            Err(BiliError::NoSubtitlesAvailable)
                        } else {
                            Ok(srt)
                        }
                    }),
            }
            .map_err(|e| anyhow::anyhow!(e.user_message()))?;
            print!("{}", output);
        }
    }

    Ok(())
}
