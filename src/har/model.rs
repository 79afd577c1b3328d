//! HAR 1.2 struct model. Only the fields this crate reads are required; everything
//! else round-trips through `Option`/`serde_json::Value` so a real-world capture
//! (which always carries far more than the spec) still parses.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Har {
    pub log: Log,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub started_date_time: Option<String>,
    pub request: Request,
    pub response: Response,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    #[serde(default = "default_method")]
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    pub query_string: Option<Vec<QueryParam>>,
    pub post_data: Option<PostData>,
}

fn default_method() -> String {
    "GET".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    #[serde(default)]
    pub status: i32,
    #[serde(default)]
    pub content: Content,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    pub mime_type: Option<String>,
    pub text: Option<String>,
    pub encoding: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct QueryParam {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostData {
    pub mime_type: Option<String>,
    pub text: Option<String>,
}

/// One entry in a browser-exported cookie snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub expires: Option<String>,
    #[serde(default, alias = "httpOnly")]
    pub http_only: Option<bool>,
    pub secure: Option<bool>,
    #[serde(default, alias = "sameSite")]
    pub same_site: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::Har;

    #[test]
    fn parses_minimal_har() {
        let json = r#"
        {
          "log": {
            "entries": [
              {
                "startedDateTime": "2024-01-15T10:30:00.000Z",
                "request": {
                  "method": "GET",
                  "url": "https://example.com/",
                  "headers": []
                },
                "response": {
                  "status": 200,
                  "content": {}
                }
              }
            ]
          }
        }
        "#;

        let har: Har = serde_json::from_str(json).expect("HAR should parse");
        assert_eq!(har.log.entries.len(), 1);
        assert_eq!(har.log.entries[0].request.method, "GET");
    }

    #[test]
    fn defaults_missing_method_to_get() {
        let json = r#"
        {
          "log": {
            "entries": [
              {
                "request": { "url": "https://example.com/x", "headers": [] },
                "response": { "status": 200, "content": {} }
              }
            ]
          }
        }
        "#;
        let har: Har = serde_json::from_str(json).expect("HAR should parse");
        assert_eq!(har.log.entries[0].request.method, "GET");
    }
}
