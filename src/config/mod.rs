use std::env;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    /// 托管存储的根地址，例如 https://xyz.example.co
    pub store_url: String,
    pub store_api_key: String,
    /// http | memory，memory 仅用于本地运行和测试
    pub store_mode: String,
    /// 分享链接的前端来源，拼成 <origin>/list/<groupId>
    pub public_origin: String,
    pub sync_channel_capacity: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        Ok(Config {
            server_host: env::var("SERVER_HOST")?,
            server_port: env::var("SERVER_PORT")?.parse().unwrap_or(3000),
            api_base_uri: env::var("API_BASE_URI").unwrap_or_else(|_| "/api".into()),
            store_url: env::var("STORE_URL")?,
            store_api_key: env::var("STORE_API_KEY").unwrap_or_default(),
            store_mode: env::var("STORE_MODE").unwrap_or_else(|_| "http".into()),
            public_origin: env::var("PUBLIC_ORIGIN")?,
            sync_channel_capacity: env::var("SYNC_CHANNEL_CAPACITY")
                .unwrap_or_default()
                .parse()
                .unwrap_or(64),
        })
    }

    pub fn share_link(&self, group_id: &str) -> String {
        format!("{}/list/{}", self.public_origin.trim_end_matches('/'), group_id)
    }
}
