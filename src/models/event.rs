//! 存储触发事件
//!
//! 支持两种负载：Cloud Audit Log 信封与旧版 Pub/Sub 信封，统一归一为 `(bucket, name)`。

use serde_json::Value;

use crate::config::Config;

/// 归一化后的存储事件
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StorageEvent {
    pub bucket: Option<String>,
    pub object_name: Option<String>,
}

impl StorageEvent {
    /// 从事件负载中提取桶名与对象名
    ///
    /// 存在 `protoPayload` 时按 Audit Log 解析；否则按 Pub/Sub 的
    /// `message.attributes.{bucketId, objectId}` 解析。
    pub fn from_json(payload: &Value) -> Self {
        if payload.get("protoPayload").is_some() {
            let bucket = str_at(payload, &["resource", "labels", "bucket_name"]);
            let object_name = str_at(payload, &["protoPayload", "resourceName"]).and_then(
                |resource_name| {
                    resource_name
                        .split_once("/objects/")
                        .map(|(_, name)| name.to_string())
                },
            );
            return Self {
                bucket,
                object_name,
            };
        }

        Self {
            bucket: str_at(payload, &["message", "attributes", "bucketId"]),
            object_name: str_at(payload, &["message", "attributes", "objectId"]),
        }
    }

    /// 桶名与对象名都存在时返回对象名
    pub fn object(&self) -> Option<&str> {
        match (&self.bucket, &self.object_name) {
            (Some(bucket), Some(name)) if !bucket.is_empty() && !name.is_empty() => Some(name),
            _ => None,
        }
    }
}

fn str_at(value: &Value, path: &[&str]) -> Option<String> {
    path.iter()
        .try_fold(value, |v, key| v.get(*key))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// 对象应当交给哪个阶段处理
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectRoute {
    /// 阶段 A：解析原始题库
    Extract,
    /// 阶段 B：生成解释
    Explain,
    /// 不处理，附带原因
    Ignore(&'static str),
}

impl ObjectRoute {
    /// 根据对象路径前缀路由
    pub fn for_object(name: &str, config: &Config) -> Self {
        if is_temporary(name) {
            return ObjectRoute::Ignore("Temporary artifact");
        }
        if name.starts_with(&config.input_prefix) {
            return ObjectRoute::Extract;
        }
        if name.starts_with(&config.clean_prefix) {
            if name.ends_with("_clean.txt") || name.ends_with(".err.txt") {
                return ObjectRoute::Ignore("Output artifact");
            }
            return ObjectRoute::Explain;
        }
        ObjectRoute::Ignore("Not in input or clean folder")
    }
}

fn is_temporary(name: &str) -> bool {
    let basename = name.rsplit('/').next().unwrap_or(name);
    basename.is_empty() || basename.starts_with('.') || basename.ends_with(".tmp")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_audit_log_event() {
        let payload = json!({
            "resource": {"labels": {"bucket_name": "exam-bucket"}},
            "protoPayload": {"resourceName": "projects/_/buckets/exam-bucket/objects/input/az900.txt"}
        });
        let event = StorageEvent::from_json(&payload);
        assert_eq!(event.bucket.as_deref(), Some("exam-bucket"));
        assert_eq!(event.object(), Some("input/az900.txt"));
    }

    #[test]
    fn test_audit_log_without_objects_segment() {
        let payload = json!({
            "resource": {"labels": {"bucket_name": "exam-bucket"}},
            "protoPayload": {"resourceName": "projects/_/buckets/exam-bucket"}
        });
        let event = StorageEvent::from_json(&payload);
        assert_eq!(event.object_name, None);
        assert_eq!(event.object(), None);
    }

    #[test]
    fn test_pubsub_event() {
        let payload = json!({
            "message": {"attributes": {"bucketId": "b", "objectId": "clean/az900.json"}}
        });
        let event = StorageEvent::from_json(&payload);
        assert_eq!(event.object(), Some("clean/az900.json"));
    }

    #[test]
    fn test_empty_event() {
        let event = StorageEvent::from_json(&json!({}));
        assert_eq!(event, StorageEvent::default());
        assert_eq!(event.object(), None);
    }

    #[test]
    fn test_routing() {
        let config = Config::default();
        assert_eq!(
            ObjectRoute::for_object("input/a.txt", &config),
            ObjectRoute::Extract
        );
        assert_eq!(
            ObjectRoute::for_object("clean/a.json", &config),
            ObjectRoute::Explain
        );
        assert!(matches!(
            ObjectRoute::for_object("clean/a_clean.txt", &config),
            ObjectRoute::Ignore(_)
        ));
        assert!(matches!(
            ObjectRoute::for_object("clean/a.txt.err.txt", &config),
            ObjectRoute::Ignore(_)
        ));
        assert!(matches!(
            ObjectRoute::for_object("input/.a.txt.swp", &config),
            ObjectRoute::Ignore(_)
        ));
        assert!(matches!(
            ObjectRoute::for_object("explained/a.json.txt", &config),
            ObjectRoute::Ignore(_)
        ));
    }
}
