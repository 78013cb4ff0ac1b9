use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;

use crate::config::Config;

use super::{
    ChangeEvent, GroupPatch, GroupRecord, NewGroup, NewPlace, PlacePatch, PlaceRecord,
    RemoteStore, StoreError, Subscription,
};

/// 托管存储的 HTTP 客户端。行操作走 `/rest/v1/<table>`（等值过滤），
/// 实时变更走 `/realtime/v1/changes` 的流式 NDJSON 响应
pub struct HttpStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    channel_capacity: usize,
}

/// 实时通道的线格式，一行一个 JSON 对象
#[derive(Debug, Deserialize)]
struct WireEvent {
    event: String,
    #[serde(default)]
    record: Option<PlaceRecord>,
    #[serde(default)]
    old_id: Option<String>,
}

/// 从累积缓冲中取出下一整行；没有完整行时返回 None，半行留在缓冲里等下一个分片
fn next_line(buf: &mut Vec<u8>) -> Option<String> {
    let pos = buf.iter().position(|&b| b == b'\n')?;
    let line: Vec<u8> = buf.drain(..=pos).collect();
    Some(String::from_utf8_lossy(&line).trim().to_string())
}

/// 解析一行变更事件。空行、坏 JSON、字段不全的行都只记日志并跳过，
/// 不中断整条通道
fn decode_change_line(line: &str) -> Option<ChangeEvent> {
    if line.is_empty() {
        return None;
    }
    let event = match serde_json::from_str::<WireEvent>(line) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!("Skipping malformed change event: {}", e);
            return None;
        }
    };
    match (event.event.as_str(), event.record, event.old_id) {
        ("INSERT", Some(record), _) => Some(ChangeEvent::Inserted(record)),
        ("UPDATE", Some(record), _) => Some(ChangeEvent::Updated(record)),
        ("DELETE", _, Some(id)) => Some(ChangeEvent::Deleted { id }),
        _ => {
            tracing::debug!("Skipping incomplete change event: {}", line);
            None
        }
    }
}

impl HttpStore {
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.store_url.trim_end_matches('/').to_string(),
            api_key: config.store_api_key.clone(),
            channel_capacity: config.sync_channel_capacity,
        }
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = self.api_key.parse() {
            headers.insert("apikey", value);
        }
        headers
    }

    fn rows_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = resp.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound);
        }
        Err(StoreError::Status {
            code: status.as_u16(),
            message,
        })
    }

    /// 写操作带 `Prefer: return=representation`，存储端以单元素数组返回受影响的行
    async fn one_row<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, StoreError> {
        let mut rows: Vec<T> = Self::check(resp).await?.json().await?;
        match rows.pop() {
            Some(row) => Ok(row),
            None => Err(StoreError::NotFound),
        }
    }
}

#[async_trait]
impl RemoteStore for HttpStore {
    async fn create_group(&self, group: NewGroup) -> Result<GroupRecord, StoreError> {
        let resp = self
            .client
            .post(self.rows_url("groups"))
            .headers(self.headers())
            .header("Prefer", "return=representation")
            .json(&group)
            .send()
            .await?;
        Self::one_row(resp).await
    }

    async fn fetch_group(&self, group_id: &str) -> Result<Option<GroupRecord>, StoreError> {
        let resp = self
            .client
            .get(self.rows_url("groups"))
            .headers(self.headers())
            .query(&[("id", format!("eq.{}", group_id))])
            .send()
            .await?;
        let mut rows: Vec<GroupRecord> = Self::check(resp).await?.json().await?;
        Ok(rows.pop())
    }

    async fn update_group(
        &self,
        group_id: &str,
        patch: GroupPatch,
    ) -> Result<GroupRecord, StoreError> {
        let resp = self
            .client
            .patch(self.rows_url("groups"))
            .headers(self.headers())
            .header("Prefer", "return=representation")
            .query(&[("id", format!("eq.{}", group_id))])
            .json(&patch)
            .send()
            .await?;
        Self::one_row(resp).await
    }

    async fn fetch_places(&self, group_id: &str) -> Result<Vec<PlaceRecord>, StoreError> {
        let resp = self
            .client
            .get(self.rows_url("places"))
            .headers(self.headers())
            .query(&[("groupid", format!("eq.{}", group_id))])
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    async fn insert_place(&self, place: NewPlace) -> Result<PlaceRecord, StoreError> {
        let resp = self
            .client
            .post(self.rows_url("places"))
            .headers(self.headers())
            .header("Prefer", "return=representation")
            .json(&place)
            .send()
            .await?;
        Self::one_row(resp).await
    }

    async fn update_place(
        &self,
        place_id: &str,
        patch: PlacePatch,
    ) -> Result<PlaceRecord, StoreError> {
        let resp = self
            .client
            .patch(self.rows_url("places"))
            .headers(self.headers())
            .header("Prefer", "return=representation")
            .query(&[("id", format!("eq.{}", place_id))])
            .json(&patch)
            .send()
            .await?;
        Self::one_row(resp).await
    }

    async fn delete_place(&self, place_id: &str) -> Result<(), StoreError> {
        let resp = self
            .client
            .delete(self.rows_url("places"))
            .headers(self.headers())
            .query(&[("id", format!("eq.{}", place_id))])
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn subscribe(&self, group_id: &str) -> Result<Subscription, StoreError> {
        let resp = self
            .client
            .get(format!("{}/realtime/v1/changes", self.base_url))
            .headers(self.headers())
            .query(&[
                ("table", "places".to_string()),
                ("groupid", format!("eq.{}", group_id)),
            ])
            .send()
            .await?;
        let resp = Self::check(resp).await?;

        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let group = group_id.to_string();
        let task = tokio::spawn(async move {
            let mut stream = resp.bytes_stream();
            let mut buf: Vec<u8> = Vec::new();
            'feed: while let Some(chunk) = stream.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        tracing::warn!("Change feed for group {} closed: {}", group, e);
                        break;
                    }
                };
                buf.extend_from_slice(&chunk);
                while let Some(line) = next_line(&mut buf) {
                    let Some(event) = decode_change_line(&line) else {
                        continue;
                    };
                    if tx.send(event).await.is_err() {
                        // 接收端已关闭视图
                        break 'feed;
                    }
                }
            }
        });

        Ok(Subscription::new(rx, task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert_line(id: &str) -> String {
        format!(
            r#"{{"event":"INSERT","record":{{"id":"{}","groupid":"g1","title":"Tower","visited":false,"member":"A"}}}}"#,
            id
        )
    }

    #[test]
    fn next_line_waits_for_a_full_line_across_chunks() {
        let mut buf: Vec<u8> = Vec::new();
        let line = insert_line("p1");
        let (head, tail) = line.as_bytes().split_at(line.len() / 2);

        buf.extend_from_slice(head);
        assert!(next_line(&mut buf).is_none());

        buf.extend_from_slice(tail);
        buf.push(b'\n');
        assert_eq!(next_line(&mut buf).unwrap(), line);
        assert!(buf.is_empty());
    }

    #[test]
    fn next_line_splits_multiple_lines_in_one_chunk() {
        let mut buf = format!("{}\n{}\n", insert_line("p1"), insert_line("p2")).into_bytes();
        assert_eq!(next_line(&mut buf).unwrap(), insert_line("p1"));
        assert_eq!(next_line(&mut buf).unwrap(), insert_line("p2"));
        assert!(next_line(&mut buf).is_none());
    }

    #[test]
    fn decode_maps_insert_and_update_to_events() {
        match decode_change_line(&insert_line("p1")) {
            Some(ChangeEvent::Inserted(record)) => {
                assert_eq!(record.id, "p1");
                assert_eq!(record.group_id, "g1");
                assert!(!record.favorite);
            }
            other => panic!("unexpected decode result: {:?}", other),
        }

        let line = insert_line("p1").replace("INSERT", "UPDATE");
        assert!(matches!(
            decode_change_line(&line),
            Some(ChangeEvent::Updated(_))
        ));
    }

    #[test]
    fn decode_handles_delete_without_record() {
        let line = r#"{"event":"DELETE","old_id":"p9"}"#;
        match decode_change_line(line) {
            Some(ChangeEvent::Deleted { id }) => assert_eq!(id, "p9"),
            other => panic!("unexpected decode result: {:?}", other),
        }
    }

    #[test]
    fn decode_skips_empty_and_malformed_lines() {
        assert!(decode_change_line("").is_none());
        assert!(decode_change_line("not json").is_none());
        // 坏行之后的好行照常解析
        assert!(decode_change_line(&insert_line("p2")).is_some());
    }

    #[test]
    fn decode_skips_events_with_missing_fields() {
        // INSERT 缺 record，DELETE 缺 old_id
        assert!(decode_change_line(r#"{"event":"INSERT"}"#).is_none());
        assert!(decode_change_line(r#"{"event":"DELETE"}"#).is_none());
        // 未知事件类型同样跳过
        assert!(decode_change_line(r#"{"event":"TRUNCATE","old_id":"p1"}"#).is_none());
    }
}
