use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;

/// Shared inputs of one pipeline run (`query`, `file_path`, ...)
#[derive(Clone, Debug)]
pub struct Context {
    data: Arc<DashMap<String, Value>>,
}

impl Context {
    pub fn new() -> Self {
        Self {
            data: Arc::new(DashMap::new()),
        }
    }

    pub async fn set(&self, key: impl Into<String>, value: impl serde::Serialize) {
        let key = key.into();
        match serde_json::to_value(value) {
            Ok(value) => {
                self.data.insert(key, value);
            }
            Err(e) => tracing::warn!(%key, "Skipping context value that failed to serialize: {}", e),
        }
    }

    pub async fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_sync(key)
    }

    pub fn get_sync<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub async fn remove(&self, key: &str) -> Option<Value> {
        self.data.remove(key).map(|(_, v)| v)
    }

    pub async fn clear(&self) {
        self.data.clear();
    }

    /// Replace `{key}` placeholders with string values from the context.
    /// Unknown keys and non-string values are left as written.
    pub fn interpolate(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            match after.find('}') {
                Some(end) => {
                    let key = &after[..end];
                    match self.data.get(key).and_then(|v| v.as_str().map(str::to_owned)) {
                        Some(value) => out.push_str(&value),
                        None => {
                            out.push('{');
                            out.push_str(key);
                            out.push('}');
                        }
                    }
                    rest = &after[end + 1..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn interpolate_known_and_unknown_keys() {
        let context = Context::new();
        context.set("query", "How is my iron?").await;
        context.set("count", 3).await;

        assert_eq!(
            context.interpolate("Answer {query} for {name} ({count})"),
            "Answer How is my iron? for {name} ({count})"
        );
        assert_eq!(context.interpolate("no placeholders"), "no placeholders");
        assert_eq!(context.interpolate("dangling {query"), "dangling {query");
    }

    #[tokio::test]
    async fn get_returns_none_on_type_mismatch() {
        let context = Context::new();
        context.set("file_path", "data/sample.pdf").await;

        let as_string: Option<String> = context.get("file_path").await;
        let as_number: Option<u32> = context.get("file_path").await;

        assert_eq!(as_string.as_deref(), Some("data/sample.pdf"));
        assert!(as_number.is_none());
    }
}
